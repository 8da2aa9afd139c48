//! SQLite backend built on `rusqlite`.
//!
//! Every [`Statement`] handed out by this driver has a compiled SQLite
//! statement kept inside the driver, keyed by [`Statement::id`]. Each step
//! advances it by one row, so results are never buffered. Compiled
//! statements whose [`Statement`] was dropped are finalized on the next
//! `prepare`, and all of them on `close`.

mod cursor;

use crate::driver::{Driver, NO_ERROR};
use crate::error::{Error, Result, SqliteErrc};
use crate::row::Row;
use crate::statement::Statement;
use crate::value::{system_time_to_nanos, Value};
use cursor::Cursor;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ffi::CString;

/// A SQLite database connection.
#[derive(Debug, Default)]
pub struct Sqlite {
    cursors: HashMap<u64, Cursor>,
    db: Option<rusqlite::Connection>,
    last_error: Option<String>,
}

impl Sqlite {
    /// Rowid of the most recent successful insert.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        Ok(self.db()?.last_insert_rowid())
    }

    /// Rows modified by the most recent insert, update or delete.
    pub fn changes(&self) -> Result<u64> {
        Ok(self.db()?.changes() as u64)
    }

    /// The underlying `rusqlite` connection, while open.
    pub fn handle(&self) -> Option<&rusqlite::Connection> {
        self.db.as_ref()
    }

    fn db(&self) -> Result<&rusqlite::Connection> {
        self.db.as_ref().ok_or(Error::NotConnected)
    }

    /// Remembers the outcome of an operation for [`Driver::last_error`].
    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        self.last_error = match &result {
            Ok(_) => None,
            Err(Error::Sqlite { message, .. }) => Some(message.clone()),
            Err(e) => Some(e.to_string()),
        };
        result
    }

    fn compile(&mut self, sql: &str) -> Result<Statement> {
        let db = self.db.as_ref().ok_or(Error::NotConnected)?;
        let Some(cursor) = Cursor::compile(db, sql)? else {
            return Ok(Statement::new(sql, Vec::new(), Vec::new()));
        };

        let statement = Statement::new(sql, cursor.parameter_names(), cursor.column_names());
        self.cursors.retain(|_, cursor| !cursor.is_orphaned());
        self.cursors.insert(statement.id(), cursor.owned_by(&statement));
        Ok(statement)
    }

    /// The compiled form of `statement`, compiling it here if this driver has
    /// not seen it. The flag is `true` for a fresh compile.
    fn cursor(&mut self, statement: &Statement) -> Result<Option<(&mut Cursor, bool)>> {
        let db = self.db.as_ref().ok_or(Error::NotConnected)?;
        match self.cursors.entry(statement.id()) {
            Entry::Occupied(entry) => Ok(Some((entry.into_mut(), false))),
            Entry::Vacant(entry) => Ok(Cursor::compile(db, statement.sql())?
                .map(|cursor| (entry.insert(cursor.owned_by(statement)), true))),
        }
    }

    fn advance(&mut self, statement: &mut Statement) -> Result<Option<Row>> {
        let Some((cursor, fresh)) = self.cursor(statement)? else {
            // Blank SQL compiles to nothing and yields no rows
            statement.finish();
            return Ok(None);
        };

        if fresh || !statement.is_executing() {
            cursor.start(statement.bindings())?;
            statement.begin();
        }
        match cursor.step() {
            Ok(None) => {
                statement.finish();
                Ok(None)
            }
            Ok(row) => Ok(row),
            Err(e) => {
                // A failed execution starts over on the next step
                statement.reset();
                Err(e)
            }
        }
    }
}

impl Driver for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn is_open(&self) -> bool {
        self.db.is_some()
    }

    fn open(&mut self, target: &str) -> Result<()> {
        self.close()?;
        let result = rusqlite::Connection::open(target).map_err(sqlite_error);
        let db = self.record(result)?;
        tracing::debug!(path = target, "opened sqlite database");
        self.db = Some(db);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Compiled statements must be finalized before their connection closes
        self.cursors.clear();
        let Some(db) = self.db.take() else {
            return Ok(());
        };
        let result = db.close().map_err(|(_, e)| sqlite_error(e));
        self.record(result)
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement> {
        let result = self.compile(sql);
        self.record(result)
    }

    fn prepare_multiple(&mut self, source: &str) -> Result<Vec<Statement>> {
        let result = split_statements(source)
            .into_iter()
            .map(|sql| self.compile(sql))
            .collect();
        self.record(result)
    }

    fn execute(&mut self, source: &str) -> Result<()> {
        // Later statements may depend on tables the earlier ones create
        for sql in split_statements(source) {
            let mut statement = self.prepare(sql)?;
            while self.step(&mut statement)?.is_some() {}
        }
        Ok(())
    }

    fn step(&mut self, statement: &mut Statement) -> Result<Option<Row>> {
        let result = self.advance(statement);
        self.record(result)
    }

    fn last_error(&self) -> String {
        self.last_error.clone().unwrap_or_else(|| NO_ERROR.to_string())
    }
}

impl Drop for Sqlite {
    fn drop(&mut self) {
        self.cursors.clear();
    }
}

/// The SQLite form of a bound value.
fn value_ref(value: &Value) -> Result<ValueRef<'_>> {
    Ok(match value {
        Value::Null => ValueRef::Null,
        Value::Integer(i) => ValueRef::Integer(*i),
        Value::Real(f) => ValueRef::Real(*f),
        Value::Text(s) => ValueRef::Text(s.as_bytes()),
        Value::Blob(b) => ValueRef::Blob(b),
        Value::DateTime(t) => ValueRef::Integer(system_time_to_nanos(*t)?),
    })
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        value_ref(self)
            .map(ToSqlOutput::Borrowed)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
    }
}

/// Converts a column read. TEXT that is not valid UTF-8 comes back as a blob
/// of its raw bytes.
fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => match std::str::from_utf8(t) {
            Ok(s) => Value::Text(s.to_owned()),
            Err(_) => Value::Blob(t.to_vec()),
        },
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

fn sqlite_error(e: rusqlite::Error) -> Error {
    let code = match &e {
        rusqlite::Error::SqliteFailure(err, _) => err.extended_code,
        _ => SqliteErrc::Error.code(),
    };
    Error::Sqlite {
        code,
        message: e.to_string(),
    }
}

/// Splits a script into its statements, dropping empty ones.
///
/// A `;` ends a statement only where SQLite agrees the text so far is
/// complete, which keeps semicolons inside literals, comments and trigger
/// bodies in place.
fn split_statements(source: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    for (end, _) in source.match_indices(';') {
        let candidate = &source[start..=end];
        if is_complete(candidate) {
            if !is_blank(candidate) {
                statements.push(candidate.trim());
            }
            start = end + 1;
        }
    }

    let tail = &source[start..];
    if !is_blank(tail) {
        statements.push(tail.trim());
    }
    statements
}

fn is_complete(sql: &str) -> bool {
    let Ok(sql) = CString::new(sql) else {
        return false;
    };
    // SAFETY: `sql` is NUL-terminated and outlives the call.
    unsafe { rusqlite::ffi::sqlite3_complete(sql.as_ptr()) != 0 }
}

/// Whether `sql` holds nothing but whitespace, comments and semicolons.
fn is_blank(mut sql: &str) -> bool {
    loop {
        sql = sql.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.split_once('\n').map_or("", |(_, after)| after);
        } else if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, after)| after);
        } else {
            return sql.is_empty();
        }
    }
}
