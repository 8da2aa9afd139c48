//! A driver with no database behind it.
//!
//! Every call is logged at info level and succeeds. Useful for trying out the
//! connection front-end and for exercising the service without a backend.

use crate::driver::{Driver, NO_ERROR};
use crate::error::Result;
use crate::row::Row;
use crate::statement::Statement;

/// Driver that logs what it would do and returns no data.
#[derive(Debug, Default)]
pub struct EmptyDriver {
    target: Option<String>,
}

impl EmptyDriver {
    /// The target passed to the last `open`, if still open.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

impl Driver for EmptyDriver {
    fn name(&self) -> &'static str {
        "empty"
    }

    fn is_open(&self) -> bool {
        self.target.is_some()
    }

    fn open(&mut self, target: &str) -> Result<()> {
        tracing::info!(target_name = target, "empty driver: open");
        self.target = Some(target.to_owned());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        tracing::info!("empty driver: close");
        self.target = None;
        Ok(())
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement> {
        tracing::info!(sql, "empty driver: prepare");
        Ok(Statement::new(sql, Vec::new(), Vec::new()))
    }

    fn prepare_multiple(&mut self, source: &str) -> Result<Vec<Statement>> {
        tracing::info!(sql = source, "empty driver: prepare multiple");
        Ok(vec![Statement::new(source, Vec::new(), Vec::new())])
    }

    fn step(&mut self, statement: &mut Statement) -> Result<Option<Row>> {
        tracing::info!(sql = statement.sql(), "empty driver: step");
        statement.finish();
        Ok(None)
    }

    fn last_error(&self) -> String {
        NO_ERROR.to_string()
    }
}
