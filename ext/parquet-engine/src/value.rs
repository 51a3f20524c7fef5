use bytes::Bytes;
use indexmap::IndexMap;
use jiff::civil::Date;
use ordered_float::OrderedFloat;
use std::sync::Arc;

use crate::error::{ParquetError, Result};

const UNIX_EPOCH_DATE: Date = jiff::civil::date(1970, 1, 1);

/// A logical value tree as consumed by the writer and produced by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParquetValue {
    // Numeric types
    Int32(i32),
    Int64(i64),
    Float32(OrderedFloat<f32>),
    Float64(OrderedFloat<f64>),

    // Basic types
    Boolean(bool),
    String(Arc<str>),
    Bytes(Bytes),
    Uuid(uuid::Uuid),

    // Date/Time types
    Date32(i32),     // Days since epoch
    TimeMillis(i32), // Time of day in milliseconds since midnight
    TimeMicros(i64), // Time of day in microseconds since midnight
    TimestampMillis(i64),
    TimestampMicros(i64),

    Decimal128(i128, i8), // value, scale

    // Complex types
    List(Vec<ParquetValue>),
    Map(Vec<(ParquetValue, ParquetValue)>), // Using Vec of tuples for deterministic ordering
    Record(IndexMap<Arc<str>, ParquetValue>), // For struct/record types, preserves field order

    // Null value
    Null,
}

impl std::hash::Hash for ParquetValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ParquetValue::Int32(i) => i.hash(state),
            ParquetValue::Int64(i) => i.hash(state),
            ParquetValue::Float32(f) => f.hash(state),
            ParquetValue::Float64(f) => f.hash(state),
            ParquetValue::Boolean(b) => b.hash(state),
            ParquetValue::String(s) => s.hash(state),
            ParquetValue::Bytes(b) => b.hash(state),
            ParquetValue::Uuid(u) => u.hash(state),
            ParquetValue::Date32(d) => d.hash(state),
            ParquetValue::TimeMillis(t) => t.hash(state),
            ParquetValue::TimeMicros(t) => t.hash(state),
            ParquetValue::TimestampMillis(ts) => ts.hash(state),
            ParquetValue::TimestampMicros(ts) => ts.hash(state),
            ParquetValue::Decimal128(d, scale) => {
                d.hash(state);
                scale.hash(state);
            }
            ParquetValue::List(l) => l.hash(state),
            ParquetValue::Map(m) => m.hash(state),
            ParquetValue::Record(r) => {
                // IndexMap preserves insertion order, so hash is deterministic
                for (k, v) in r {
                    k.hash(state);
                    v.hash(state);
                }
            }
            ParquetValue::Null => 0_i32.hash(state),
        }
    }
}

impl ParquetValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, ParquetValue::Null)
    }

    /// Get the type name of the value
    pub fn type_name(&self) -> &'static str {
        match self {
            ParquetValue::Int32(_) => "Int32",
            ParquetValue::Int64(_) => "Int64",
            ParquetValue::Float32(_) => "Float32",
            ParquetValue::Float64(_) => "Float64",
            ParquetValue::Boolean(_) => "Boolean",
            ParquetValue::String(_) => "String",
            ParquetValue::Bytes(_) => "Bytes",
            ParquetValue::Uuid(_) => "Uuid",
            ParquetValue::Date32(_) => "Date32",
            ParquetValue::TimeMillis(_) => "TimeMillis",
            ParquetValue::TimeMicros(_) => "TimeMicros",
            ParquetValue::TimestampMillis(_) => "TimestampMillis",
            ParquetValue::TimestampMicros(_) => "TimestampMicros",
            ParquetValue::Decimal128(_, _) => "Decimal128",
            ParquetValue::List(_) => "List",
            ParquetValue::Map(_) => "Map",
            ParquetValue::Record(_) => "Record",
            ParquetValue::Null => "Null",
        }
    }

    /// Build a record from `(name, value)` pairs, keeping their order.
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<Arc<str>>,
        I: IntoIterator<Item = (K, ParquetValue)>,
    {
        ParquetValue::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn from_date(date: Date) -> Result<Self> {
        let span = UNIX_EPOCH_DATE
            .until((jiff::Unit::Day, date))
            .map_err(|e| ParquetError::conversion(format!("date out of range: {}", e)))?;
        Ok(ParquetValue::Date32(span.get_days()))
    }

    pub fn from_timestamp_micros(ts: jiff::Timestamp) -> Self {
        ParquetValue::TimestampMicros(ts.as_microsecond())
    }

    pub fn from_timestamp_millis(ts: jiff::Timestamp) -> Self {
        ParquetValue::TimestampMillis(ts.as_millisecond())
    }

    /// Interpret a `Date32` value as a civil date.
    pub fn as_date(&self) -> Result<Date> {
        match self {
            ParquetValue::Date32(days) => {
                let span = jiff::Span::new()
                    .try_days(*days)
                    .map_err(|e| ParquetError::conversion(e.to_string()))?;
                UNIX_EPOCH_DATE
                    .checked_add(span)
                    .map_err(|e| ParquetError::conversion(e.to_string()))
            }
            other => Err(ParquetError::conversion(format!(
                "cannot interpret {} as a date",
                other.type_name()
            ))),
        }
    }

    /// Interpret a timestamp value as an instant.
    pub fn as_timestamp(&self) -> Result<jiff::Timestamp> {
        let ts = match self {
            ParquetValue::TimestampMillis(ms) => jiff::Timestamp::from_millisecond(*ms),
            ParquetValue::TimestampMicros(us) => jiff::Timestamp::from_microsecond(*us),
            other => {
                return Err(ParquetError::conversion(format!(
                    "cannot interpret {} as a timestamp",
                    other.type_name()
                )))
            }
        };
        ts.map_err(|e| ParquetError::conversion(e.to_string()))
    }
}

impl From<bool> for ParquetValue {
    fn from(v: bool) -> Self {
        ParquetValue::Boolean(v)
    }
}

impl From<i32> for ParquetValue {
    fn from(v: i32) -> Self {
        ParquetValue::Int32(v)
    }
}

impl From<i64> for ParquetValue {
    fn from(v: i64) -> Self {
        ParquetValue::Int64(v)
    }
}

impl From<f64> for ParquetValue {
    fn from(v: f64) -> Self {
        ParquetValue::Float64(OrderedFloat(v))
    }
}

impl From<&str> for ParquetValue {
    fn from(v: &str) -> Self {
        ParquetValue::String(Arc::from(v))
    }
}

impl From<String> for ParquetValue {
    fn from(v: String) -> Self {
        ParquetValue::String(Arc::from(v))
    }
}

impl<T: Into<ParquetValue>> From<Option<T>> for ParquetValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParquetValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_creation() {
        let v = ParquetValue::Int32(42);
        assert_eq!(v, ParquetValue::Int32(42));
        assert!(!v.is_null());
        assert_eq!(v.type_name(), "Int32");
    }

    #[test]
    fn test_null_value() {
        let v = ParquetValue::from(None::<i32>);
        assert!(v.is_null());
        assert_eq!(v.type_name(), "Null");
    }

    #[test]
    fn test_float_equality() {
        let v1 = ParquetValue::Float32(OrderedFloat(3.5));
        let v2 = ParquetValue::Float32(OrderedFloat(3.5));
        assert_eq!(v1, v2);
    }

    #[test]
    fn test_record_keeps_field_order() {
        let rec = ParquetValue::record([("b", ParquetValue::from(1)), ("a", ParquetValue::from(2))]);
        match rec {
            ParquetValue::Record(fields) => {
                let names: Vec<&str> = fields.keys().map(|k| k.as_ref()).collect();
                assert_eq!(names, vec!["b", "a"]);
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_date_conversion() {
        let date = jiff::civil::date(2024, 3, 1);
        let value = ParquetValue::from_date(date).unwrap();
        assert_eq!(value, ParquetValue::Date32(19783));
        assert_eq!(value.as_date().unwrap(), date);

        let before_epoch = ParquetValue::Date32(-1);
        assert_eq!(before_epoch.as_date().unwrap(), jiff::civil::date(1969, 12, 31));
    }

    #[test]
    fn test_timestamp_conversion() {
        let ts = jiff::Timestamp::from_second(1_700_000_000).unwrap();
        let micros = ParquetValue::from_timestamp_micros(ts);
        assert_eq!(micros, ParquetValue::TimestampMicros(1_700_000_000_000_000));
        assert_eq!(micros.as_timestamp().unwrap(), ts);

        let millis = ParquetValue::from_timestamp_millis(ts);
        assert_eq!(millis.as_timestamp().unwrap(), ts);
        assert!(ParquetValue::Int32(1).as_timestamp().is_err());
    }

    #[test]
    fn test_hash_consistency() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(ParquetValue::Int32(42));
        set.insert(ParquetValue::String(Arc::from("hello")));

        assert!(set.contains(&ParquetValue::Int32(42)));
        assert!(set.contains(&ParquetValue::String(Arc::from("hello"))));
        assert!(!set.contains(&ParquetValue::Int32(43)));
    }
}
