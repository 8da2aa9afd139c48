//! adio - asynchronous database access on tokio
//!
//! A [`Connection`] wraps a blocking database [`Driver`] and runs its work on
//! the worker threads of a shared [`DatabaseService`], so async callers never
//! block their runtime. Results come back as [`Row`]s of dynamically typed
//! [`Value`]s and convert into Rust types through [`FromRow`] and [`FromValue`].
//!
//! ```no_run
//! # async fn demo() -> adio_core::Result<()> {
//! use adio_core::{drivers::Sqlite, Connection, DatabaseService};
//!
//! let service = DatabaseService::default();
//! let conn = Connection::<Sqlite>::new(&service);
//! conn.open("hats.db").await?;
//! conn.execute("CREATE TABLE IF NOT EXISTS hats (kind TEXT, size INTEGER)").await?;
//!
//! let mut st = conn.prepare("SELECT kind, size FROM hats WHERE size > ?").await?;
//! st.bind(1, 6)?;
//! let hats: Vec<(String, i64)> = conn.query(&mut st).await?;
//! # let _ = hats;
//! # Ok(())
//! # }
//! ```

/// Host topology and worker thread placement
pub mod arch;

pub mod connection;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod row;
pub mod service;
pub mod sql;
pub mod statement;
pub mod value;

pub use connection::Connection;
pub use driver::{Driver, NO_ERROR};
pub use error::{Error, Result, SqliteErrc};
pub use row::{FromRow, Row};
pub use service::{DatabaseService, ServiceConfig, ServiceStats};
pub use sql::{
    create_container, for_each, ignore_results, into_container, Params, Program, ProgramOutput,
    Query, RowHandler, Sql,
};
pub use statement::Statement;
pub use value::{FromValue, Value, ValueType};
