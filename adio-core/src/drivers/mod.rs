//! Concrete database backends.

pub mod empty;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use empty::EmptyDriver;
#[cfg(feature = "sqlite")]
pub use sqlite::Sqlite;
