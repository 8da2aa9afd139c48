//! The connection front-end.
//!
//! Every operation comes in two forms. The `_blocking` form runs the driver
//! on the calling thread. The async form runs it on the connection's
//! [`DatabaseService`] and resolves on the caller's runtime.
//!
//! Async operations on a [`Statement`] move it to the worker and back. If
//! such a future is dropped before it completes, the statement is left in
//! its default, empty state.

use crate::driver::Driver;
use crate::error::Result;
use crate::row::{FromRow, Row};
use crate::service::DatabaseService;
use crate::sql::{Program, ProgramOutput, Query, RowHandler};
use crate::statement::Statement;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A database connection bound to a [`DatabaseService`].
///
/// Operations on one connection are serialized; separate connections on the
/// same service run in parallel.
pub struct Connection<D: Driver> {
    service: DatabaseService,
    driver: Arc<Mutex<D>>,
}

impl<D: Driver + Default> Connection<D> {
    /// Creates a closed connection.
    pub fn new(service: &DatabaseService) -> Self {
        Self::with_driver(service, D::default())
    }
}

impl<D: Driver> Connection<D> {
    /// Creates a connection around an existing driver.
    pub fn with_driver(service: &DatabaseService, driver: D) -> Self {
        Self {
            service: service.clone(),
            driver: Arc::new(Mutex::new(driver)),
        }
    }

    /// The service async operations run on.
    pub fn service(&self) -> &DatabaseService {
        &self.service
    }

    /// Locks the driver for backend-specific calls.
    ///
    /// Blocks while an async operation holds the driver.
    pub fn ext(&self) -> MutexGuard<'_, D> {
        lock(&self.driver)
    }

    /// Whether a database is open.
    pub fn is_open(&self) -> bool {
        self.ext().is_open()
    }

    /// Message describing the most recent failure.
    pub fn last_error(&self) -> String {
        self.ext().last_error()
    }

    /// Opens `target`, closing any database that is already open.
    pub fn open_blocking(&self, target: &str) -> Result<()> {
        open(&mut *self.ext(), target)
    }

    /// Closes the database.
    pub fn close_blocking(&self) -> Result<()> {
        self.ext().close()
    }

    /// Compiles one statement.
    pub fn prepare_blocking(&self, sql: &str) -> Result<Statement> {
        self.ext().prepare(sql)
    }

    /// Compiles every statement in `source`.
    pub fn prepare_multiple_blocking(&self, source: &str) -> Result<Vec<Statement>> {
        self.ext().prepare_multiple(source)
    }

    /// Runs every statement in `sql` to completion, discarding rows.
    pub fn execute_blocking(&self, sql: &str) -> Result<()> {
        self.ext().execute(sql)
    }

    /// Runs `statement` to completion from the start, discarding rows.
    pub fn execute_statement_blocking(&self, statement: &mut Statement) -> Result<()> {
        execute_statement(&mut *self.ext(), statement)
    }

    /// Fetches the next row of `statement`, starting an execution if needed.
    pub fn step_blocking(&self, statement: &mut Statement) -> Result<Option<Row>> {
        self.ext().step(statement)
    }

    /// Runs `statement` from the start and collects every row as `T`.
    pub fn query_blocking<T: FromRow>(&self, statement: &mut Statement) -> Result<Vec<T>> {
        query_rows(&mut *self.ext(), statement)
    }

    /// Runs `program`, feeding every row to its handler.
    pub fn run_blocking<H: RowHandler>(
        &self,
        program: Program<H>,
    ) -> Result<ProgramOutput<H::Output>> {
        run_program(&mut *self.ext(), program)
    }

    /// Async form of [`open_blocking`](Self::open_blocking).
    pub async fn open(&self, target: &str) -> Result<()> {
        let target = target.to_owned();
        self.on_worker(move |d| open(d, &target)).await
    }

    /// Async form of [`close_blocking`](Self::close_blocking).
    pub async fn close(&self) -> Result<()> {
        self.on_worker(|d| d.close()).await
    }

    /// Async form of [`prepare_blocking`](Self::prepare_blocking).
    pub async fn prepare(&self, sql: &str) -> Result<Statement> {
        let sql = sql.to_owned();
        self.on_worker(move |d| d.prepare(&sql)).await
    }

    /// Async form of [`prepare_multiple_blocking`](Self::prepare_multiple_blocking).
    pub async fn prepare_multiple(&self, source: &str) -> Result<Vec<Statement>> {
        let source = source.to_owned();
        self.on_worker(move |d| d.prepare_multiple(&source)).await
    }

    /// Async form of [`execute_blocking`](Self::execute_blocking).
    pub async fn execute(&self, sql: &str) -> Result<()> {
        let sql = sql.to_owned();
        self.on_worker(move |d| d.execute(&sql)).await
    }

    /// Async form of [`execute_statement_blocking`](Self::execute_statement_blocking).
    pub async fn execute_statement(&self, statement: &mut Statement) -> Result<()> {
        self.with_statement(statement, execute_statement).await
    }

    /// Async form of [`step_blocking`](Self::step_blocking).
    pub async fn step(&self, statement: &mut Statement) -> Result<Option<Row>> {
        self.with_statement(statement, |d, st| d.step(st)).await
    }

    /// Async form of [`query_blocking`](Self::query_blocking).
    pub async fn query<T>(&self, statement: &mut Statement) -> Result<Vec<T>>
    where
        T: FromRow + Send + 'static,
    {
        self.with_statement(statement, query_rows).await
    }

    /// Async form of [`run_blocking`](Self::run_blocking).
    pub async fn run<H>(&self, program: Program<H>) -> Result<ProgramOutput<H::Output>>
    where
        H: RowHandler + Send + 'static,
        H::Output: Send + 'static,
    {
        self.on_worker(move |d| run_program(d, program)).await
    }

    /// Runs `f` with the driver locked on a worker thread.
    async fn on_worker<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut D) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let driver = Arc::clone(&self.driver);
        self.service.spawn(move || f(&mut *lock(&driver))).await?
    }

    /// Moves `statement` to a worker, runs `f` on it, and puts it back.
    async fn with_statement<T, F>(&self, statement: &mut Statement, f: F) -> Result<T>
    where
        F: FnOnce(&mut D, &mut Statement) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut moved = std::mem::take(statement);
        let (moved, result) = self
            .on_worker(move |d| {
                let result = f(d, &mut moved);
                Ok((moved, result))
            })
            .await?;
        *statement = moved;
        result
    }
}

impl<D: Driver> std::fmt::Debug for Connection<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

fn lock<D>(driver: &Mutex<D>) -> MutexGuard<'_, D> {
    driver.lock().unwrap_or_else(PoisonError::into_inner)
}

fn open<D: Driver>(driver: &mut D, target: &str) -> Result<()> {
    driver.open(target)?;
    tracing::debug!(driver = driver.name(), target_name = target, "connection opened");
    Ok(())
}

fn execute_statement<D: Driver>(driver: &mut D, statement: &mut Statement) -> Result<()> {
    statement.reset();
    while driver.step(statement)?.is_some() {}
    Ok(())
}

fn query_rows<D: Driver, T: FromRow>(driver: &mut D, statement: &mut Statement) -> Result<Vec<T>> {
    statement.reset();
    let mut out = Vec::new();
    while let Some(row) = driver.step(statement)? {
        out.push(row.as_()?);
    }
    Ok(out)
}

fn run_program<D: Driver, H: RowHandler>(
    driver: &mut D,
    program: Program<H>,
) -> Result<ProgramOutput<H::Output>> {
    let (query, mut handler) = program.into_parts();
    let (mut statement, from_statement) = match query {
        Query::Sql(sql) => (driver.prepare(sql.as_str())?, false),
        Query::Statement(statement) => (statement, true),
    };

    statement.reset();
    while let Some(row) = driver.step(&mut statement)? {
        handler.on_row(row)?;
    }

    Ok(ProgramOutput {
        output: handler.finish(),
        statement: from_statement.then_some(statement),
    })
}
