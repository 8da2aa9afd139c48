//! Result rows.

use crate::error::{Error, Result};
use crate::value::{FromValue, Value};
use std::ops::Index;
use std::time::SystemTime;

/// One row produced by a query, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Creates a row from its column values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` for a row with no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column `n`, if present.
    pub fn get(&self, n: usize) -> Option<&Value> {
        self.values.get(n)
    }

    /// Column `n` converted to `T`.
    pub fn get_as<T: FromValue>(&self, n: usize) -> Result<T> {
        match self.values.get(n) {
            Some(v) => v.get(),
            None => Err(Error::RowWidth {
                expected: n + 1,
                actual: self.len(),
            }),
        }
    }

    /// Reads the whole row as `T`.
    pub fn as_<T: FromRow>(&self) -> Result<T> {
        T::from_row(self)
    }

    /// Iterates over the column values.
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    /// Consumes the row, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    fn check_width(&self, expected: usize) -> Result<()> {
        if self.len() == expected {
            Ok(())
        } else {
            Err(Error::RowWidth {
                expected,
                actual: self.len(),
            })
        }
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, n: usize) -> &Value {
        &self.values[n]
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Adapts a whole [`Row`] into a Rust type.
///
/// Scalars read from rows of width one, tuples read column by column and
/// require the exact width.
pub trait FromRow: Sized {
    /// Performs the conversion.
    fn from_row(row: &Row) -> Result<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.clone())
    }
}

impl FromRow for Vec<Value> {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.values.clone())
    }
}

macro_rules! scalar_from_row {
    ($($t:ty),*) => {
        $(
            impl FromRow for $t {
                fn from_row(row: &Row) -> Result<Self> {
                    row.check_width(1)?;
                    row[0].get()
                }
            }
        )*
    };
}

scalar_from_row!(
    Value, i8, u8, i16, u16, i32, u32, i64, u64, isize, usize, bool, f32, f64, String, Vec<u8>,
    SystemTime
);

impl<T: FromValue> FromRow for Option<T> {
    fn from_row(row: &Row) -> Result<Self> {
        row.check_width(1)?;
        row[0].get()
    }
}

macro_rules! tuple_from_row {
    ($width:literal => $($name:ident : $idx:tt),+) => {
        impl<$($name: FromValue),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row) -> Result<Self> {
                row.check_width($width)?;
                Ok(($(row[$idx].get::<$name>()?,)+))
            }
        }
    };
}

tuple_from_row!(1 => A: 0);
tuple_from_row!(2 => A: 0, B: 1);
tuple_from_row!(3 => A: 0, B: 1, C: 2);
tuple_from_row!(4 => A: 0, B: 1, C: 2, D: 3);
tuple_from_row!(5 => A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_from_row!(6 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
tuple_from_row!(7 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
tuple_from_row!(8 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);
