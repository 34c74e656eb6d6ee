use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single column value of a query result row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::UInt(_) | Value::Float(_))
    }

    /// Raw bytes used when two values are not both numeric.
    fn raw_bytes(&self) -> Vec<u8> {
        match self {
            Value::Null => Vec::new(),
            Value::Int(v) => v.to_string().into_bytes(),
            Value::UInt(v) => v.to_string().into_bytes(),
            Value::Float(v) => v.to_string().into_bytes(),
            Value::Text(v) => v.as_bytes().to_vec(),
            Value::Bytes(v) => v.clone(),
        }
    }

    /// Compares two values the way the database orders them.
    ///
    /// `Null` sorts before everything else and equals only `Null`. Numeric values compare
    /// numerically across integer widths and floats. Every other combination compares the raw
    /// bytes, so `Text` and `Bytes` holding the same bytes are equal.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::UInt(a), Value::UInt(b)) => a.cmp(b),
            (Value::Int(a), Value::UInt(b)) => i128::from(*a).cmp(&i128::from(*b)),
            (Value::UInt(a), Value::Int(b)) => i128::from(*a).cmp(&i128::from(*b)),
            (Value::Text(a), Value::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (a, b) = (a.as_f64(), b.as_f64());
                // -0.0 equals 0.0, NaN still gets a total order.
                if a == b {
                    Ordering::Equal
                } else {
                    a.total_cmp(&b)
                }
            }
            (a, b) => a.raw_bytes().cmp(&b.raw_bytes()),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Value::Int(v) => *v as f64,
            Value::UInt(v) => *v as f64,
            Value::Float(v) => *v,
            _ => f64::NAN,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "'{v}'"),
            Value::Bytes(v) => write!(f, "'{}'", String::from_utf8_lossy(v)),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::UInt(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One row of a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the first `key_column_count` values, or the whole row if it is shorter.
    pub fn key(&self, key_column_count: usize) -> &[Value] {
        &self.values[..key_column_count.min(self.values.len())]
    }

    /// Returns the values following the first `key_column_count` ones.
    pub fn non_key(&self, key_column_count: usize) -> &[Value] {
        &self.values[key_column_count.min(self.values.len())..]
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            fmt::Display::fmt(value, f)?;
        }
        f.write_str("]")
    }
}

/// Compares two value slices lexicographically with [`Value::compare`].
///
/// A shorter slice that is a prefix of a longer one sorts first.
pub fn compare_values(left: &[Value], right: &[Value]) -> Ordering {
    for (l, r) in left.iter().zip(right.iter()) {
        match l.compare(r) {
            Ordering::Equal => continue,
            ordering => return ordering,
        }
    }

    left.len().cmp(&right.len())
}

/// Type of a result column as reported by the query service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Int64,
    Uint64,
    Float64,
    VarChar,
    VarBinary,
}

/// Name and type of a result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnField {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnField {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sorts_first() {
        assert_eq!(Value::Null.compare(&Value::Int(-5)), Ordering::Less);
        assert_eq!(Value::Text("a".into()).compare(&Value::Null), Ordering::Greater);
        assert_eq!(Value::Null, Value::Null);
    }

    #[test]
    fn numeric_values_compare_across_widths() {
        assert_eq!(Value::Int(-1).compare(&Value::UInt(0)), Ordering::Less);
        assert_eq!(Value::UInt(u64::MAX).compare(&Value::Int(i64::MAX)), Ordering::Greater);
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_eq!(Value::Float(2.5).compare(&Value::Int(3)), Ordering::Less);
    }

    #[test]
    fn signed_zeros_are_equal() {
        assert_eq!(Value::Float(-0.0), Value::Float(0.0));
        assert_eq!(Value::Float(-0.0), Value::Int(0));
        assert_eq!(Value::Float(-0.5).compare(&Value::Float(0.0)), Ordering::Less);
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn text_and_bytes_compare_bytewise() {
        assert_eq!(Value::Text("abc".into()), Value::Bytes(b"abc".to_vec()));
        assert_eq!(
            Value::Text("B".into()).compare(&Value::Text("a".into())),
            Ordering::Less
        );
        // Non numeric comparisons fall back to the textual form of numbers.
        assert_eq!(Value::Int(10).compare(&Value::Text("9".into())), Ordering::Less);
    }

    #[test]
    fn compare_values_is_lexicographic() {
        let a = [Value::Int(1), Value::Text("b".into())];
        let b = [Value::Int(1), Value::Text("c".into())];
        let c = [Value::Int(2)];

        assert_eq!(compare_values(&a, &b), Ordering::Less);
        assert_eq!(compare_values(&b, &c), Ordering::Less);
        assert_eq!(compare_values(&a, &a), Ordering::Equal);
        assert_eq!(compare_values(&a[..1], &a), Ordering::Less);
    }

    #[test]
    fn row_key_and_non_key_split() {
        let row = Row::new(vec![Value::Int(1), Value::Int(2), "x".into()]);

        assert_eq!(row.key(2), &[Value::Int(1), Value::Int(2)]);
        assert_eq!(row.non_key(2), &[Value::Text("x".into())]);
        assert_eq!(row.key(5).len(), 3);
        assert!(row.non_key(5).is_empty());
        assert_eq!(row.to_string(), "[1, 2, 'x']");
    }
}
