//! Dynamically typed database values.
//!
//! A [`Value`] is what drivers hand back for every column and what callers
//! bind into statement parameters. Conversions to Rust types go through the
//! [`FromValue`] adaptor trait; conversions from Rust types go through
//! `From<T> for Value`.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The type of a database value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueType {
    /// SQL `NULL`.
    Null,
    /// 64-bit signed integer.
    Integer,
    /// Double precision float.
    Real,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Blob,
    /// Point in time.
    DateTime,
}

impl ValueType {
    /// Short name used in conversion error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer => "integral",
            Self::Real => "real",
            Self::Text => "text",
            Self::Blob => "blob",
            Self::DateTime => "datetime",
        }
    }
}

/// A single database value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// SQL `NULL`.
    #[default]
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// Double precision float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
    /// Point in time.
    DateTime(SystemTime),
}

impl Value {
    /// Returns the type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Null,
            Self::Integer(_) => ValueType::Integer,
            Self::Real(_) => ValueType::Real,
            Self::Text(_) => ValueType::Text,
            Self::Blob(_) => ValueType::Blob,
            Self::DateTime(_) => ValueType::DateTime,
        }
    }

    /// Returns the name of this value's type.
    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    /// Returns `true` for SQL `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Converts this value to `T`.
    ///
    /// Fails with [`Error::InvalidAccess`] when the stored type does not
    /// match the base type `T` is adapted from.
    pub fn get<T: FromValue>(&self) -> Result<T> {
        T::from_value(self)
    }

    /// Borrows the text payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrows the blob payload.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Fails with [`Error::InvalidAccess`] unless this value is of type `wanted`.
    fn expect_type(&self, wanted: ValueType) -> Result<()> {
        if self.value_type() == wanted {
            Ok(())
        } else {
            Err(Error::invalid_access(wanted.name(), self.type_name()))
        }
    }
}

/// Converts a timestamp to nanoseconds relative to the Unix epoch.
///
/// Fails with [`Error::DateTimeOutOfRange`] outside roughly 1677 to 2262.
pub(crate) fn system_time_to_nanos(t: SystemTime) -> Result<i64> {
    let nanos = match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i128::try_from(d.as_nanos()),
        Err(e) => i128::try_from(e.duration().as_nanos()).map(|n| -n),
    };
    nanos
        .ok()
        .and_then(|n| i64::try_from(n).ok())
        .ok_or(Error::DateTimeOutOfRange)
}

/// Inverse of [`system_time_to_nanos`].
pub(crate) fn nanos_to_system_time(nanos: i64) -> SystemTime {
    if nanos >= 0 {
        UNIX_EPOCH + Duration::from_nanos(nanos as u64)
    } else {
        UNIX_EPOCH - Duration::from_nanos(nanos.unsigned_abs())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Real(a), Self::Real(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let by_type = self.value_type().cmp(&other.value_type());
        if by_type != Ordering::Equal {
            return Some(by_type);
        }
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Integer(a), Self::Integer(b)) => a.partial_cmp(b),
            (Self::Real(a), Self::Real(b)) => a.partial_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.partial_cmp(b),
            (Self::Blob(a), Self::Blob(b)) => a.partial_cmp(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

macro_rules! compare_with {
    ($($t:ty => $variant:ident($conv:expr)),* $(,)?) => {
        $(
            impl PartialEq<$t> for Value {
                fn eq(&self, other: &$t) -> bool {
                    match self {
                        Self::$variant(v) => *v == $conv(other),
                        _ => false,
                    }
                }
            }

            impl PartialOrd<$t> for Value {
                fn partial_cmp(&self, other: &$t) -> Option<Ordering> {
                    self.partial_cmp(&Value::from(other.clone()))
                }
            }
        )*
    };
}

compare_with! {
    i64 => Integer(|v: &i64| *v),
    i32 => Integer(|v: &i32| i64::from(*v)),
    f64 => Real(|v: &f64| *v),
    String => Text(|v: &String| v.clone()),
    &str => Text(|v: &&str| v.to_string()),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
            Self::Blob(b) => write!(f, "{{{} bytes of data}}", b.len()),
            Self::DateTime(t) => match t.duration_since(UNIX_EPOCH) {
                Ok(d) => write!(f, "{}.{:09}s", d.as_secs(), d.subsec_nanos()),
                Err(e) => {
                    let d = e.duration();
                    write!(f, "-{}.{:09}s", d.as_secs(), d.subsec_nanos())
                }
            },
        }
    }
}

// Conversions into `Value`

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

macro_rules! integer_into_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self::Integer(v as i64)
                }
            }
        )*
    };
}

integer_into_value!(i8, u8, i16, u16, i32, u32, u64, isize, usize);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Real(f64::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Blob(v.to_vec())
    }
}

impl From<SystemTime> for Value {
    fn from(v: SystemTime) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

// Conversions out of `Value`

/// Adapts a [`Value`] into a Rust type.
///
/// Implement this (together with `From<T> for Value`) to read and bind your
/// own types. `Option<T>` is the nullable form of any adaptor: `NULL` reads
/// as `None`.
pub trait FromValue: Sized {
    /// Performs the conversion.
    fn from_value(value: &Value) -> Result<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Integer(i) => Ok(*i),
            other => Err(Error::invalid_access(ValueType::Integer.name(), other.type_name())),
        }
    }
}

macro_rules! integer_from_value {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> Result<Self> {
                    i64::from_value(value).map(|i| i as $t)
                }
            }
        )*
    };
}

integer_from_value!(i8, u8, i16, u16, i32, u32, u64, isize, usize);

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        i64::from_value(value).map(|i| i != 0)
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Real(r) => Ok(*r),
            other => Err(Error::invalid_access(ValueType::Real.name(), other.type_name())),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        f64::from_value(value).map(|r| r as f32)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        value.expect_type(ValueType::Text)?;
        Ok(value.as_str().unwrap_or_default().to_owned())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        value.expect_type(ValueType::Blob)?;
        Ok(value.as_bytes().unwrap_or_default().to_vec())
    }
}

impl FromValue for SystemTime {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::DateTime(t) => Ok(*t),
            // SQLite has no datetime column type; timestamps come back as nanoseconds.
            Value::Integer(nanos) => Ok(nanos_to_system_time(*nanos)),
            other => Err(Error::invalid_access(ValueType::DateTime.name(), other.type_name())),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}
