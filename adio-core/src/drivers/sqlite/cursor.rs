//! Compiled SQLite statements, stepped one row at a time.
//!
//! `rusqlite` statements borrow their connection, so they cannot outlive a
//! single call into the driver. A [`Cursor`] owns the raw `sqlite3_stmt`
//! instead, which lets an execution stay open between steps.

use super::{column_value, value_ref};
use crate::error::{Error, Result, SqliteErrc};
use crate::row::Row;
use crate::statement::Statement;
use crate::value::Value;
use rusqlite::ffi;
use rusqlite::types::ValueRef;
use std::ffi::{c_char, c_int, CStr};
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::Weak;

/// A compiled statement owned by a [`Sqlite`](super::Sqlite) driver.
#[derive(Debug)]
pub(super) struct Cursor {
    db: NonNull<ffi::sqlite3>,
    stmt: NonNull<ffi::sqlite3_stmt>,
    owner: Weak<()>,
}

// SAFETY: the statement and the connection it belongs to are owned by one
// driver, which only touches them through `&mut self`.
unsafe impl Send for Cursor {}

impl Cursor {
    /// Compiles the first statement in `sql`.
    ///
    /// Returns `None` when `sql` holds no statement, only whitespace or
    /// comments.
    pub(super) fn compile(conn: &rusqlite::Connection, sql: &str) -> Result<Option<Self>> {
        // SAFETY: the handle stays valid while `conn` is open, and the driver
        // finalizes every cursor before closing it.
        let db = unsafe { conn.handle() };
        let db = NonNull::new(db).ok_or(Error::NotConnected)?;
        let len = c_int::try_from(sql.len()).map_err(|_| Error::Sqlite {
            code: SqliteErrc::TooBig.code(),
            message: "SQL text is too long".to_string(),
        })?;

        let mut stmt = ptr::null_mut();
        // SAFETY: `sql` is valid for `len` bytes and needs no terminator.
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                db.as_ptr(),
                sql.as_ptr().cast::<c_char>(),
                len,
                &mut stmt,
                ptr::null_mut(),
            )
        };
        if rc != ffi::SQLITE_OK {
            return Err(last_error(db));
        }

        Ok(NonNull::new(stmt).map(|stmt| Self {
            db,
            stmt,
            owner: Weak::new(),
        }))
    }

    /// Ties this cursor's lifetime to `statement`.
    pub(super) fn owned_by(mut self, statement: &Statement) -> Self {
        self.owner = statement.liveness();
        self
    }

    /// Whether the statement this cursor belongs to has been dropped.
    pub(super) fn is_orphaned(&self) -> bool {
        self.owner.strong_count() == 0
    }

    /// Names of the parameters, `None` for anonymous ones.
    pub(super) fn parameter_names(&self) -> Vec<Option<String>> {
        // SAFETY: `stmt` is a live statement.
        let count = unsafe { ffi::sqlite3_bind_parameter_count(self.stmt.as_ptr()) };
        (1..=count)
            .map(|i| {
                // SAFETY: `i` is within the parameter range.
                let name = unsafe { ffi::sqlite3_bind_parameter_name(self.stmt.as_ptr(), i) };
                text(name)
            })
            .collect()
    }

    /// Names of the output columns.
    pub(super) fn column_names(&self) -> Vec<String> {
        (0..self.column_count())
            .map(|i| {
                // SAFETY: `i` is within the column range.
                let name = unsafe { ffi::sqlite3_column_name(self.stmt.as_ptr(), i) };
                text(name).unwrap_or_default()
            })
            .collect()
    }

    /// Rewinds to the first row and binds `bindings` from index 1.
    pub(super) fn start(&mut self, bindings: &[Value]) -> Result<()> {
        // SAFETY: `stmt` is a live statement. Reset only repeats the last
        // step's error, which was already reported.
        unsafe {
            ffi::sqlite3_reset(self.stmt.as_ptr());
            ffi::sqlite3_clear_bindings(self.stmt.as_ptr());
        }
        for (i, value) in bindings.iter().enumerate() {
            let index = c_int::try_from(i + 1).map_err(|_| Error::ParameterOutOfRange {
                index: i + 1,
                count: bindings.len(),
            })?;
            self.bind(index, value_ref(value)?)?;
        }
        Ok(())
    }

    fn bind(&mut self, index: c_int, value: ValueRef<'_>) -> Result<()> {
        let stmt = self.stmt.as_ptr();
        // SAFETY: `stmt` is a live statement; text and blob payloads are
        // copied by SQLite before the call returns.
        let rc = unsafe {
            match value {
                ValueRef::Null => ffi::sqlite3_bind_null(stmt, index),
                ValueRef::Integer(i) => ffi::sqlite3_bind_int64(stmt, index, i),
                ValueRef::Real(r) => ffi::sqlite3_bind_double(stmt, index, r),
                ValueRef::Text(t) => ffi::sqlite3_bind_text(
                    stmt,
                    index,
                    t.as_ptr().cast::<c_char>(),
                    payload_len(t)?,
                    ffi::SQLITE_TRANSIENT(),
                ),
                ValueRef::Blob(b) => ffi::sqlite3_bind_blob(
                    stmt,
                    index,
                    b.as_ptr().cast(),
                    payload_len(b)?,
                    ffi::SQLITE_TRANSIENT(),
                ),
            }
        };
        if rc != ffi::SQLITE_OK {
            return Err(last_error(self.db));
        }
        Ok(())
    }

    /// Advances by one row.
    pub(super) fn step(&mut self) -> Result<Option<Row>> {
        // SAFETY: `stmt` is a live statement.
        match unsafe { ffi::sqlite3_step(self.stmt.as_ptr()) } {
            ffi::SQLITE_ROW => Ok(Some(self.row())),
            ffi::SQLITE_DONE => Ok(None),
            _ => Err(last_error(self.db)),
        }
    }

    fn column_count(&self) -> c_int {
        // SAFETY: `stmt` is a live statement.
        unsafe { ffi::sqlite3_column_count(self.stmt.as_ptr()) }
    }

    fn row(&self) -> Row {
        let values = (0..self.column_count())
            .map(|i| column_value(self.column(i)))
            .collect();
        Row::new(values)
    }

    /// Borrows column `i` of the current row, valid until the next step.
    fn column(&self, i: c_int) -> ValueRef<'_> {
        let stmt = self.stmt.as_ptr();
        // SAFETY: `stmt` sits on a row and `i` is within the column range.
        // Payloads are read after their type is fixed and before any step.
        unsafe {
            match ffi::sqlite3_column_type(stmt, i) {
                ffi::SQLITE_INTEGER => ValueRef::Integer(ffi::sqlite3_column_int64(stmt, i)),
                ffi::SQLITE_FLOAT => ValueRef::Real(ffi::sqlite3_column_double(stmt, i)),
                ffi::SQLITE_TEXT => {
                    let data = ffi::sqlite3_column_text(stmt, i);
                    ValueRef::Text(payload(data.cast(), ffi::sqlite3_column_bytes(stmt, i)))
                }
                ffi::SQLITE_BLOB => {
                    let data = ffi::sqlite3_column_blob(stmt, i);
                    ValueRef::Blob(payload(data.cast(), ffi::sqlite3_column_bytes(stmt, i)))
                }
                _ => ValueRef::Null,
            }
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        // SAFETY: `stmt` is live and never used again.
        unsafe {
            ffi::sqlite3_finalize(self.stmt.as_ptr());
        }
    }
}

/// Builds an [`Error::Sqlite`] from the connection's most recent failure.
fn last_error(db: NonNull<ffi::sqlite3>) -> Error {
    // SAFETY: `db` is an open connection.
    let (code, message) = unsafe {
        (
            ffi::sqlite3_extended_errcode(db.as_ptr()),
            text(ffi::sqlite3_errmsg(db.as_ptr())),
        )
    };
    Error::Sqlite {
        code,
        message: message.unwrap_or_else(|| SqliteErrc::describe(code).to_string()),
    }
}

fn text(s: *const c_char) -> Option<String> {
    if s.is_null() {
        return None;
    }
    // SAFETY: SQLite returns NUL-terminated strings.
    let s = unsafe { CStr::from_ptr(s) };
    Some(s.to_string_lossy().into_owned())
}

/// # Safety
///
/// `data` must point to `len` readable bytes, or be null.
unsafe fn payload<'a>(data: *const u8, len: c_int) -> &'a [u8] {
    match usize::try_from(len) {
        // SAFETY: upheld by the caller.
        Ok(len) if len > 0 && !data.is_null() => unsafe { slice::from_raw_parts(data, len) },
        _ => &[],
    }
}

fn payload_len(bytes: &[u8]) -> Result<c_int> {
    c_int::try_from(bytes.len()).map_err(|_| Error::Sqlite {
        code: SqliteErrc::TooBig.code(),
        message: SqliteErrc::TooBig.to_string(),
    })
}
