//! Error types shared by every driver.

use std::fmt;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by connections, drivers and the database service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation needed an open database handle.
    #[error("Not connected to a database")]
    NotConnected,

    /// A value was read back as the wrong type.
    #[error("{0}")]
    InvalidAccess(String),

    /// A row was read into a shape of a different width.
    #[error("Cannot read a row of width {actual} into a value of width {expected}")]
    RowWidth {
        /// Width the reader wanted.
        expected: usize,
        /// Width of the row.
        actual: usize,
    },

    /// Positional parameter outside `1..=count`.
    #[error("Parameter index {index} out of range (statement has {count} parameters)")]
    ParameterOutOfRange {
        /// Requested 1-based index.
        index: usize,
        /// Parameters in the statement.
        count: usize,
    },

    /// Named parameter that the statement does not declare.
    #[error("No such parameter: {0}")]
    NoSuchParameter(String),

    /// Failure reported by SQLite.
    #[error("{}: {message}", describe_code(.code))]
    Sqlite {
        /// Extended SQLite result code.
        code: i32,
        /// Message from the database handle.
        message: String,
    },

    /// A datetime too far from the Unix epoch to store as `i64` nanoseconds.
    #[error("Datetime is outside the range of i64 nanoseconds since the Unix epoch")]
    DateTimeOutOfRange,

    /// The worker pool is gone, so async work can no longer be scheduled.
    #[error("Database service has shut down")]
    ServiceShutdown,

    /// A task panicked on a worker thread before producing its result.
    #[error("Database task panicked on a worker thread")]
    WorkerPanicked,

    /// Operating system I/O failure (thread spawning and similar).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Builds an [`Error::InvalidAccess`] for a typed read of a mismatched value.
    pub(crate) fn invalid_access(wanted: &str, actual: &str) -> Self {
        Self::InvalidAccess(format!(
            "Cannot get a {wanted} value from a non-{wanted} value object (Type is {actual})"
        ))
    }

    /// The SQLite result code behind this error, if it came from SQLite.
    ///
    /// Extended codes are returned as-is when known, otherwise they collapse
    /// to their primary code.
    pub fn sqlite_code(&self) -> Option<SqliteErrc> {
        match self {
            Self::Sqlite { code, .. } => SqliteErrc::from_code(*code)
                .or_else(|| SqliteErrc::from_code(code & 0xff)),
            _ => None,
        }
    }

    /// Whether this error carries the given SQLite primary result code.
    pub fn is_sqlite(&self, errc: SqliteErrc) -> bool {
        self.sqlite_code().map(SqliteErrc::primary) == Some(errc.primary())
    }
}

fn describe_code(code: &i32) -> &'static str {
    SqliteErrc::describe(*code)
}

macro_rules! sqlite_codes {
    ($($name:ident = $code:literal,)*) => {
        /// SQLite result codes, primary and extended.
        ///
        /// See the SQLite documentation for the meaning of each one.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum SqliteErrc {
            $(
                #[allow(missing_docs)]
                $name = $code,
            )*
        }

        impl SqliteErrc {
            /// Looks up a numeric result code.
            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $($code => Some(Self::$name),)*
                    _ => None,
                }
            }
        }
    };
}

sqlite_codes! {
    Ok = 0,
    Error = 1,
    Internal = 2,
    Perm = 3,
    Abort = 4,
    Busy = 5,
    Locked = 6,
    NoMemory = 7,
    Readonly = 8,
    Interrupt = 9,
    IoErr = 10,
    Corrupt = 11,
    NotFound = 12,
    Full = 13,
    CantOpen = 14,
    Protocol = 15,
    Empty = 16,
    Schema = 17,
    TooBig = 18,
    Constraint = 19,
    Mismatch = 20,
    Misuse = 21,
    NoLfs = 22,
    Auth = 23,
    Format = 24,
    Range = 25,
    NotADatabase = 26,
    Notice = 27,
    Warning = 28,
    Row = 100,
    Done = 101,

    BusyRecovery = 261,
    LockedSharedCache = 262,
    ReadonlyRecovery = 264,
    IoErrRead = 266,
    CorruptVtab = 267,
    CantOpenNoTempDirectory = 270,
    ConstraintCheck = 275,
    NoticeRecoverWal = 283,
    WarningAutoindex = 284,
    AbortRollback = 516,
    BusySnapshot = 517,
    ReadonlyCantLock = 520,
    IoErrShortRead = 522,
    CantOpenIsDirectory = 526,
    ConstraintCommitHook = 531,
    NoticeRecoverRollback = 539,
    ReadonlyRollback = 776,
    IoErrWrite = 778,
    CantOpenFullPath = 782,
    ConstraintForeignKey = 787,
    IoErrFsync = 1034,
    ReadonlyDbMoved = 1032,
    CantOpenConvertPath = 1038,
    ConstraintFunction = 1043,
    IoErrDirFsync = 1290,
    ConstraintNotNull = 1299,
    IoErrTruncate = 1546,
    ConstraintPrimaryKey = 1555,
    IoErrFstat = 1802,
    ConstraintTrigger = 1811,
    IoErrUnlock = 2058,
    ConstraintUnique = 2067,
    IoErrRdLock = 2314,
    ConstraintVtab = 2323,
    IoErrDelete = 2570,
    ConstraintRowid = 2579,
    IoErrBlocked = 2826,
    IoErrNoMem = 3082,
    IoErrAccess = 3338,
    IoErrCheckReservedLock = 3594,
    IoErrLock = 3850,
    IoErrClose = 4106,
    IoErrDirClose = 4362,
    IoErrShmOpen = 4618,
    IoErrShmSize = 4874,
    IoErrShmLock = 5130,
    IoErrShmMap = 5386,
    IoErrSeek = 5642,
    IoErrDeleteNoent = 5898,
    IoErrMmap = 6154,
    IoErrGetTempPath = 6410,
    IoErrConvertPath = 6666,
}

impl SqliteErrc {
    /// Numeric value of the code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// The primary code an extended code belongs to.
    pub fn primary(self) -> Self {
        Self::from_code(self.code() & 0xff).unwrap_or(self)
    }

    /// Human readable text for a numeric result code, as SQLite phrases it.
    pub fn describe(code: i32) -> &'static str {
        match code & 0xff {
            0 => "not an error",
            1 => "SQL logic error",
            2 => "internal logic error",
            3 => "access permission denied",
            4 => "query aborted",
            5 => "database is locked",
            6 => "database table is locked",
            7 => "out of memory",
            8 => "attempt to write a readonly database",
            9 => "interrupted",
            10 => "disk I/O error",
            11 => "database disk image is malformed",
            12 => "unknown operation",
            13 => "database or disk is full",
            14 => "unable to open database file",
            15 => "locking protocol",
            17 => "database schema has changed",
            18 => "string or blob too big",
            19 => "constraint failed",
            20 => "datatype mismatch",
            21 => "bad parameter or other API misuse",
            22 => "large file support is disabled",
            23 => "authorization denied",
            25 => "column index out of range",
            26 => "file is not a database",
            27 => "notification message",
            28 => "warning message",
            100 => "another row available",
            101 => "no more rows available",
            _ => "unknown error",
        }
    }
}

impl fmt::Display for SqliteErrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::describe(self.code()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_code_lookup() {
        assert_eq!(SqliteErrc::from_code(14), Some(SqliteErrc::CantOpen));
        assert_eq!(SqliteErrc::from_code(2067), Some(SqliteErrc::ConstraintUnique));
        assert_eq!(SqliteErrc::from_code(9999), None);
        assert_eq!(SqliteErrc::ConstraintUnique.primary(), SqliteErrc::Constraint);
        assert_eq!(SqliteErrc::Busy.primary(), SqliteErrc::Busy);
    }

    #[test]
    fn test_error_sqlite_code() {
        let err = Error::Sqlite {
            code: 2067,
            message: "UNIQUE constraint failed: t.id".into(),
        };
        assert_eq!(err.sqlite_code(), Some(SqliteErrc::ConstraintUnique));
        assert!(err.is_sqlite(SqliteErrc::Constraint));
        assert!(err.to_string().contains("constraint failed"));

        assert_eq!(Error::NotConnected.sqlite_code(), None);
    }

    #[test]
    fn test_invalid_access_message() {
        let err = Error::invalid_access("text", "integral");
        assert_eq!(
            err.to_string(),
            "Cannot get a text value from a non-text value object (Type is integral)"
        );
    }
}
