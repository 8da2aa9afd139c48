//! SQL text, parameter lists, and result handling programs.

use crate::error::Result;
use crate::row::{FromRow, Row};
use crate::statement::Statement;
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;

/// Text known to contain SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sql(String);

impl Sql {
    /// Wraps a query string.
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    /// The query text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwraps the query text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for Sql {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Sql {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&String> for Sql {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

impl fmt::Display for Sql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A positional parameter list.
pub trait Params {
    /// The parameter values in index order.
    fn into_values(self) -> Vec<Value>;
}

impl Params for () {
    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }
}

impl Params for Vec<Value> {
    fn into_values(self) -> Vec<Value> {
        self
    }
}

impl<T: Into<Value>, const N: usize> Params for [T; N] {
    fn into_values(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

macro_rules! tuple_params {
    ($($name:ident),+) => {
        impl<$($name: Into<Value>),+> Params for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_values(self) -> Vec<Value> {
                let ($($name,)+) = self;
                vec![$($name.into()),+]
            }
        }
    };
}

tuple_params!(A);
tuple_params!(A, B);
tuple_params!(A, B, C);
tuple_params!(A, B, C, D);
tuple_params!(A, B, C, D, E);
tuple_params!(A, B, C, D, E, F);
tuple_params!(A, B, C, D, E, F, G);
tuple_params!(A, B, C, D, E, F, G, H);

/// Receives the rows a query produces.
pub trait RowHandler {
    /// What the handler yields once the query has finished.
    type Output;

    /// Called once per row, in order.
    fn on_row(&mut self, row: Row) -> Result<()>;

    /// Called after the last row.
    fn finish(self) -> Self::Output;
}

/// Handler that discards every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreResults;

impl RowHandler for IgnoreResults {
    type Output = ();

    fn on_row(&mut self, _row: Row) -> Result<()> {
        Ok(())
    }

    fn finish(self) {}
}

/// Discards every row.
pub fn ignore_results() -> IgnoreResults {
    IgnoreResults
}

/// Handler that appends converted rows to a borrowed container.
pub struct IntoContainer<'a, C> {
    container: &'a mut C,
}

impl<C> RowHandler for IntoContainer<'_, C>
where
    C: Extend<<C as IntoIterator>::Item> + IntoIterator,
    C::Item: FromRow,
{
    type Output = ();

    fn on_row(&mut self, row: Row) -> Result<()> {
        let item = row.as_::<C::Item>()?;
        self.container.extend(std::iter::once(item));
        Ok(())
    }

    fn finish(self) {}
}

/// Appends every row, converted to the container's item type, to `container`.
pub fn into_container<C>(container: &mut C) -> IntoContainer<'_, C> {
    IntoContainer { container }
}

/// Handler that builds a new container from the rows.
pub struct CreateContainer<C> {
    container: C,
}

impl<C> RowHandler for CreateContainer<C>
where
    C: Extend<<C as IntoIterator>::Item> + IntoIterator,
    C::Item: FromRow,
{
    type Output = C;

    fn on_row(&mut self, row: Row) -> Result<()> {
        let item = row.as_::<C::Item>()?;
        self.container.extend(std::iter::once(item));
        Ok(())
    }

    fn finish(self) -> C {
        self.container
    }
}

/// Collects every row into a fresh `C`.
pub fn create_container<C: Default>() -> CreateContainer<C> {
    CreateContainer {
        container: C::default(),
    }
}

/// Handler that calls a closure with each converted row.
pub struct ForEach<T, F> {
    f: F,
    _row: PhantomData<fn(T)>,
}

impl<T: FromRow, F: FnMut(T)> RowHandler for ForEach<T, F> {
    type Output = ();

    fn on_row(&mut self, row: Row) -> Result<()> {
        (self.f)(row.as_::<T>()?);
        Ok(())
    }

    fn finish(self) {}
}

/// Calls `f` with every row converted to `T`.
pub fn for_each<T: FromRow, F: FnMut(T)>(f: F) -> ForEach<T, F> {
    ForEach {
        f,
        _row: PhantomData,
    }
}

/// What a [`Program`] runs.
#[derive(Debug, Clone)]
pub enum Query {
    /// SQL text, prepared when the program runs.
    Sql(Sql),
    /// A statement prepared earlier, with its bindings.
    Statement(Statement),
}

impl From<Sql> for Query {
    fn from(sql: Sql) -> Self {
        Self::Sql(sql)
    }
}

impl From<&str> for Query {
    fn from(sql: &str) -> Self {
        Self::Sql(sql.into())
    }
}

impl From<String> for Query {
    fn from(sql: String) -> Self {
        Self::Sql(sql.into())
    }
}

impl From<Statement> for Query {
    fn from(st: Statement) -> Self {
        Self::Statement(st)
    }
}

/// A query paired with the handler that receives its rows.
pub struct Program<H> {
    query: Query,
    handler: H,
}

impl<H: RowHandler> Program<H> {
    /// Pairs `query` with `handler`.
    pub fn new(query: impl Into<Query>, handler: H) -> Self {
        Self {
            query: query.into(),
            handler,
        }
    }

    /// The query this program runs.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Splits the program into its parts.
    pub fn into_parts(self) -> (Query, H) {
        (self.query, self.handler)
    }
}

/// What running a [`Program`] produces.
#[derive(Debug)]
pub struct ProgramOutput<T> {
    /// The handler's output.
    pub output: T,
    /// The statement the program ran, returned for reuse. `None` when the
    /// program was built from SQL text.
    pub statement: Option<Statement>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Row> {
        vec![
            Row::new(vec![Value::from(12), Value::from("I am a string")]),
            Row::new(vec![Value::from(4), Value::from("I am a different string")]),
        ]
    }

    fn feed<H: RowHandler>(mut handler: H) -> Result<H::Output> {
        for row in rows() {
            handler.on_row(row)?;
        }
        Ok(handler.finish())
    }

    #[test]
    fn test_sql_text() {
        let s = Sql::from("SELECT 1");
        assert_eq!(s.as_str(), "SELECT 1");
        assert_eq!(s.to_string(), "SELECT 1");
        assert_eq!(Sql::new(String::from("x")).into_string(), "x");
    }

    #[test]
    fn test_params() {
        assert!((12, "hats").into_values() == vec![Value::from(12), Value::from("hats")]);
        assert_eq!([1, 2, 3].into_values().len(), 3);
        assert!(().into_values().is_empty());
    }

    #[test]
    fn test_into_container() {
        let mut out: Vec<(i64, String)> = Vec::new();
        feed(into_container(&mut out)).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], (12, "I am a string".to_string()));
        assert_eq!(out[1].0, 4);
    }

    #[test]
    fn test_create_container() {
        let out: Vec<Row> = feed(create_container()).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[1][1] == "I am a different string");
    }

    #[test]
    fn test_for_each_and_conversion_failure() {
        let mut seen = 0;
        feed(for_each(|(n, _s): (i64, String)| seen += n)).unwrap();
        assert_eq!(seen, 16);

        // Rows are two columns wide, not one
        assert!(feed(create_container::<Vec<i64>>()).is_err());
    }

    #[test]
    fn test_program_parts() {
        let program = Program::new("SELECT * FROM hats", ignore_results());
        assert!(matches!(program.query(), Query::Sql(s) if s.as_str() == "SELECT * FROM hats"));
        let (query, _handler) = program.into_parts();
        assert!(matches!(query, Query::Sql(_)));
    }
}
