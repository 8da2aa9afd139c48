//! Prepared statements.
//!
//! A [`Statement`] is owned by the caller and carries everything a driver
//! learned while compiling the query: parameter metadata, output columns,
//! the current bindings, and the state of the running execution.
//!
//! Drivers that hold per-statement resources, such as a live database
//! cursor, key them on [`Statement::id`] and release them once
//! [`Statement::liveness`] stops upgrading.

use crate::error::{Error, Result};
use crate::sql::Params;
use crate::value::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Cursor {
    /// Not executing; the next step starts a new execution.
    #[default]
    Idle,
    /// Executing; the driver produces the remaining rows.
    Running,
    /// The last execution ran out of rows.
    Done,
}

/// A compiled query together with its bindings and cursor.
///
/// Cloning yields an independent statement with its own identity and no
/// running execution.
#[derive(Debug, Default)]
pub struct Statement {
    id: u64,
    alive: Arc<()>,
    sql: String,
    parameter_names: Vec<Option<String>>,
    columns: Vec<String>,
    bindings: Vec<Value>,
    cursor: Cursor,
}

impl Statement {
    /// Creates a statement handle.
    ///
    /// `parameter_names` has one entry per parameter, `None` for anonymous
    /// (`?`) parameters. Drivers call this from `prepare`.
    pub fn new(
        sql: impl Into<String>,
        parameter_names: Vec<Option<String>>,
        columns: Vec<String>,
    ) -> Self {
        let bindings = vec![Value::Null; parameter_names.len()];
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            alive: Arc::new(()),
            sql: sql.into(),
            parameter_names,
            columns,
            bindings,
            cursor: Cursor::Idle,
        }
    }

    /// Identity drivers key per-statement state on. Unique per handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// A handle that stops upgrading once this statement is dropped.
    pub fn liveness(&self) -> Weak<()> {
        Arc::downgrade(&self.alive)
    }

    /// The SQL text this statement was prepared from.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of bindable parameters.
    pub fn parameter_count(&self) -> usize {
        self.parameter_names.len()
    }

    /// Name of the 1-based parameter `index`, including its prefix character.
    pub fn parameter_name(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.parameter_names.get(i))
            .and_then(|n| n.as_deref())
    }

    /// Names of the output columns.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Current parameter values, in index order.
    pub fn bindings(&self) -> &[Value] {
        &self.bindings
    }

    /// Binds `value` to the 1-based parameter `index`.
    pub fn bind(&mut self, index: usize, value: impl Into<Value>) -> Result<&mut Self> {
        let count = self.parameter_count();
        if index == 0 || index > count {
            return Err(Error::ParameterOutOfRange { index, count });
        }
        self.bindings[index - 1] = value.into();
        self.reset();
        Ok(self)
    }

    /// Binds `value` to the parameter called `name`, e.g. `":color"`.
    pub fn bind_named(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let index = self
            .parameter_names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .ok_or_else(|| Error::NoSuchParameter(name.to_owned()))?;
        self.bind(index + 1, value)
    }

    /// Binds a positional parameter list starting at index 1.
    pub fn bind_all(&mut self, params: impl Params) -> Result<&mut Self> {
        for (i, value) in params.into_values().into_iter().enumerate() {
            self.bind(i + 1, value)?;
        }
        Ok(self)
    }

    /// Resets every parameter to `NULL`.
    pub fn clear_bindings(&mut self) {
        self.bindings.iter_mut().for_each(|v| *v = Value::Null);
        self.reset();
    }

    /// Returns `true` once the last execution has handed out all its rows.
    pub fn is_done(&self) -> bool {
        matches!(self.cursor, Cursor::Done)
    }

    /// Returns `true` while an execution is in progress.
    pub fn is_executing(&self) -> bool {
        matches!(self.cursor, Cursor::Running)
    }

    /// Drops any in-progress execution.
    pub fn reset(&mut self) {
        self.cursor = Cursor::Idle;
    }

    /// Marks an execution as started. Used by drivers.
    pub fn begin(&mut self) {
        self.cursor = Cursor::Running;
    }

    /// Marks the current execution as out of rows. Used by drivers.
    pub fn finish(&mut self) {
        self.cursor = Cursor::Done;
    }
}

impl Clone for Statement {
    fn clone(&self) -> Self {
        let mut copy = Self::new(
            self.sql.clone(),
            self.parameter_names.clone(),
            self.columns.clone(),
        );
        copy.bindings.clone_from(&self.bindings);
        if self.cursor == Cursor::Done {
            copy.cursor = Cursor::Done;
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hats_by_color() -> Statement {
        Statement::new(
            "SELECT type FROM hats WHERE color = :color AND size > ?",
            vec![Some(":color".into()), None],
            vec!["type".into()],
        )
    }

    #[test]
    fn test_bind_positional() {
        let mut st = hats_by_color();
        assert_eq!(st.parameter_count(), 2);
        st.bind(1, "black").unwrap().bind(2, 7).unwrap();
        assert!(st.bindings()[0] == "black");
        assert!(st.bindings()[1] == 7);

        assert!(matches!(
            st.bind(0, 1),
            Err(Error::ParameterOutOfRange { index: 0, count: 2 })
        ));
        assert!(matches!(
            st.bind(3, 1),
            Err(Error::ParameterOutOfRange { index: 3, count: 2 })
        ));
    }

    #[test]
    fn test_bind_named() {
        let mut st = hats_by_color();
        st.bind_named(":color", "green").unwrap();
        assert!(st.bindings()[0] == "green");
        assert_eq!(st.parameter_name(1), Some(":color"));
        assert_eq!(st.parameter_name(2), None);

        let err = st.bind_named(":size", 3).unwrap_err();
        assert_eq!(err.to_string(), "No such parameter: :size");
    }

    #[test]
    fn test_bind_all_and_clear() {
        let mut st = hats_by_color();
        st.bind_all(("black", 9)).unwrap();
        assert!(st.bindings()[1] == 9);
        st.clear_bindings();
        assert!(st.bindings().iter().all(Value::is_null));

        assert!(st.bind_all(("a", 1, 2)).is_err());
    }

    #[test]
    fn test_cursor_lifecycle() {
        let mut st = hats_by_color();
        assert!(!st.is_executing());
        st.begin();
        assert!(st.is_executing());
        assert!(!st.is_done());
        st.finish();
        assert!(!st.is_executing());
        assert!(st.is_done());

        // Rebinding throws away the finished execution.
        st.bind(2, 1).unwrap();
        assert!(!st.is_done());
        assert!(!st.is_executing());
    }

    #[test]
    fn test_identity() {
        let mut st = hats_by_color();
        st.bind(2, 4).unwrap();
        st.begin();
        let liveness = st.liveness();

        let copy = st.clone();
        assert_ne!(copy.id(), st.id());
        assert!(!copy.is_executing());
        assert!(copy.bindings()[1] == 4);

        assert!(liveness.upgrade().is_some());
        drop(st);
        assert!(liveness.upgrade().is_none());
    }
}
