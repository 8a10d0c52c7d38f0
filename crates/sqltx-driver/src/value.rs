//! Parameter and cell value descriptors.
//!
//! The core layers treat values as opaque: a statement travels to the
//! driver together with an ordered list of [`SqlValue`] descriptors, and
//! result cells come back in the same representation. [`ToSql`] and
//! [`FromSql`] are the mechanical conversion seams for application types.

use bytes::Bytes;
use thiserror::Error;

/// An opaque SQL value descriptor.
///
/// Used both for statement parameters and for result cells.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value (any driver-side integer width).
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Opaque binary value.
    Bytes(Bytes),
}

impl SqlValue {
    /// Check whether this value is SQL NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// A short name for the value's type, for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }
}

/// Error converting a [`SqlValue`] into a Rust type.
#[derive(Debug, Error)]
pub enum TypeError {
    /// The value's type does not match the requested Rust type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The Rust-side expectation.
        expected: &'static str,
        /// What the value actually was.
        actual: String,
    },

    /// A NULL value was converted into a non-optional type.
    #[error("unexpected NULL value")]
    UnexpectedNull,
}

/// Convert a Rust value into a [`SqlValue`] parameter descriptor.
pub trait ToSql {
    /// Produce the driver-facing descriptor for this value.
    fn to_sql(&self) -> SqlValue;
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> SqlValue {
        self.clone()
    }
}

impl ToSql for bool {
    fn to_sql(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }
}

impl ToSql for i16 {
    fn to_sql(&self) -> SqlValue {
        SqlValue::Int(i64::from(*self))
    }
}

impl ToSql for i32 {
    fn to_sql(&self) -> SqlValue {
        SqlValue::Int(i64::from(*self))
    }
}

impl ToSql for i64 {
    fn to_sql(&self) -> SqlValue {
        SqlValue::Int(*self)
    }
}

impl ToSql for f32 {
    fn to_sql(&self) -> SqlValue {
        SqlValue::Float(f64::from(*self))
    }
}

impl ToSql for f64 {
    fn to_sql(&self) -> SqlValue {
        SqlValue::Float(*self)
    }
}

impl ToSql for &str {
    fn to_sql(&self) -> SqlValue {
        SqlValue::Text((*self).to_string())
    }
}

impl ToSql for String {
    fn to_sql(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl ToSql for Bytes {
    fn to_sql(&self) -> SqlValue {
        SqlValue::Bytes(self.clone())
    }
}

impl<T: ToSql> ToSql for Option<T> {
    fn to_sql(&self) -> SqlValue {
        match self {
            Some(v) => v.to_sql(),
            None => SqlValue::Null,
        }
    }
}

/// Convert a [`SqlValue`] result cell into a Rust value.
pub trait FromSql: Sized {
    /// Convert from a non-NULL value; NULL is a [`TypeError::UnexpectedNull`].
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError>;

    /// Convert treating NULL as `None`.
    fn from_sql_nullable(value: &SqlValue) -> Result<Option<Self>, TypeError> {
        match value {
            SqlValue::Null => Ok(None),
            v => Self::from_sql(v).map(Some),
        }
    }
}

fn mismatch(expected: &'static str, value: &SqlValue) -> TypeError {
    TypeError::TypeMismatch {
        expected,
        actual: value.type_name().to_string(),
    }
}

impl FromSql for bool {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Bool(v) => Ok(*v),
            SqlValue::Null => Err(TypeError::UnexpectedNull),
            v => Err(mismatch("bool", v)),
        }
    }
}

impl FromSql for i64 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Int(v) => Ok(*v),
            SqlValue::Null => Err(TypeError::UnexpectedNull),
            v => Err(mismatch("int", v)),
        }
    }
}

impl FromSql for i32 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        let wide = i64::from_sql(value)?;
        i32::try_from(wide).map_err(|_| TypeError::TypeMismatch {
            expected: "i32",
            actual: format!("int {wide} out of range"),
        })
    }
}

impl FromSql for f64 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Float(v) => Ok(*v),
            SqlValue::Null => Err(TypeError::UnexpectedNull),
            v => Err(mismatch("float", v)),
        }
    }
}

impl FromSql for String {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Text(v) => Ok(v.clone()),
            SqlValue::Null => Err(TypeError::UnexpectedNull),
            v => Err(mismatch("text", v)),
        }
    }
}

impl FromSql for Bytes {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Bytes(v) => Ok(v.clone()),
            SqlValue::Null => Err(TypeError::UnexpectedNull),
            v => Err(mismatch("bytes", v)),
        }
    }
}

impl<T: FromSql> FromSql for Option<T> {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        T::from_sql_nullable(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_int() {
        let v = 42i32.to_sql();
        assert_eq!(v, SqlValue::Int(42));
        assert_eq!(i32::from_sql(&v).unwrap(), 42);
        assert_eq!(i64::from_sql(&v).unwrap(), 42);
    }

    #[test]
    fn test_int_narrowing_out_of_range() {
        let v = SqlValue::Int(i64::from(i32::MAX) + 1);
        assert!(i32::from_sql(&v).is_err());
    }

    #[test]
    fn test_option_null_handling() {
        assert_eq!(Option::<i32>::from_sql(&SqlValue::Null).unwrap(), None);
        assert_eq!(
            Option::<i32>::from_sql(&SqlValue::Int(7)).unwrap(),
            Some(7)
        );
        assert_eq!(None::<i32>.to_sql(), SqlValue::Null);
    }

    #[test]
    fn test_null_into_non_optional_fails() {
        assert!(matches!(
            String::from_sql(&SqlValue::Null),
            Err(TypeError::UnexpectedNull)
        ));
    }

    #[test]
    fn test_mismatch_reports_actual_type() {
        let err = i64::from_sql(&SqlValue::Text("x".into())).unwrap_err();
        assert!(err.to_string().contains("text"));
    }
}
