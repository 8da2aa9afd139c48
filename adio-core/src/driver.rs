//! The backend seam.
//!
//! A [`Driver`] is the blocking, single-connection state of one database
//! backend. [`Connection`](crate::Connection) wraps it, runs its blocking
//! methods either inline or on the [`DatabaseService`](crate::DatabaseService)
//! worker pool, and adds the generic operations built from them.

use crate::error::Result;
use crate::row::Row;
use crate::statement::Statement;

/// Message reported by [`Driver::last_error`] when nothing has failed.
pub const NO_ERROR: &str = "not an error";

/// A database backend.
pub trait Driver: Send + 'static {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Returns `true` while a database handle is open.
    fn is_open(&self) -> bool;

    /// Opens `target`, closing any handle that is already open.
    fn open(&mut self, target: &str) -> Result<()>;

    /// Closes the handle. Closing a closed driver succeeds.
    fn close(&mut self) -> Result<()>;

    /// Compiles exactly one statement.
    fn prepare(&mut self, sql: &str) -> Result<Statement>;

    /// Compiles every statement in `source`, in order.
    fn prepare_multiple(&mut self, source: &str) -> Result<Vec<Statement>>;

    /// Runs every statement in `source` to completion, discarding rows.
    ///
    /// The default compiles the whole script before running any of it.
    /// Backends whose compiler checks the schema should run each statement
    /// as soon as it is compiled instead.
    fn execute(&mut self, source: &str) -> Result<()> {
        for mut statement in self.prepare_multiple(source)? {
            while self.step(&mut statement)?.is_some() {}
        }
        Ok(())
    }

    /// Advances the statement's cursor, starting a new execution when none
    /// is running. Returns `None` once the execution has no rows left.
    fn step(&mut self, statement: &mut Statement) -> Result<Option<Row>>;

    /// Message describing the most recent failure, or [`NO_ERROR`].
    fn last_error(&self) -> String;
}
