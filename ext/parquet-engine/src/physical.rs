//! Physical storage values and their mapping to logical values.

use bytes::Bytes;
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{ParquetError, Result};
use crate::schema::PrimitiveType;
use crate::value::ParquetValue;

/// Physical types of the container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalType {
    Boolean,
    Int32,
    Int64,
    Float,
    Double,
    ByteArray,
    FixedLenByteArray(i32),
}

impl PhysicalType {
    pub fn to_thrift(self) -> parquet::format::Type {
        use parquet::format::Type;
        match self {
            PhysicalType::Boolean => Type::BOOLEAN,
            PhysicalType::Int32 => Type::INT32,
            PhysicalType::Int64 => Type::INT64,
            PhysicalType::Float => Type::FLOAT,
            PhysicalType::Double => Type::DOUBLE,
            PhysicalType::ByteArray => Type::BYTE_ARRAY,
            PhysicalType::FixedLenByteArray(_) => Type::FIXED_LEN_BYTE_ARRAY,
        }
    }

    pub fn from_thrift(ty: parquet::format::Type, type_length: Option<i32>) -> Result<Self> {
        use parquet::format::Type;
        Ok(match ty {
            Type::BOOLEAN => PhysicalType::Boolean,
            Type::INT32 => PhysicalType::Int32,
            Type::INT64 => PhysicalType::Int64,
            Type::FLOAT => PhysicalType::Float,
            Type::DOUBLE => PhysicalType::Double,
            Type::BYTE_ARRAY => PhysicalType::ByteArray,
            Type::FIXED_LEN_BYTE_ARRAY => {
                let len = type_length.ok_or_else(|| {
                    ParquetError::invalid_file("fixed length byte array without a type length")
                })?;
                if len <= 0 {
                    return Err(ParquetError::invalid_file(format!(
                        "fixed length byte array with type length {}",
                        len
                    )));
                }
                PhysicalType::FixedLenByteArray(len)
            }
            other => {
                return Err(ParquetError::unsupported_encoding(format!(
                    "physical type {:?}",
                    other
                )))
            }
        })
    }

    /// Fixed width in bytes of a PLAIN-encoded value, if any
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            PhysicalType::Boolean | PhysicalType::ByteArray => None,
            PhysicalType::Int32 | PhysicalType::Float => Some(4),
            PhysicalType::Int64 | PhysicalType::Double => Some(8),
            PhysicalType::FixedLenByteArray(len) => usize::try_from(len).ok(),
        }
    }
}

/// A single non-null value as stored in a column chunk
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhysicalValue {
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    ByteArray(Bytes),
    FixedLenByteArray(Bytes),
}

impl PhysicalValue {
    pub fn physical_type(&self) -> PhysicalType {
        match self {
            PhysicalValue::Boolean(_) => PhysicalType::Boolean,
            PhysicalValue::Int32(_) => PhysicalType::Int32,
            PhysicalValue::Int64(_) => PhysicalType::Int64,
            PhysicalValue::Float(_) => PhysicalType::Float,
            PhysicalValue::Double(_) => PhysicalType::Double,
            PhysicalValue::ByteArray(_) => PhysicalType::ByteArray,
            PhysicalValue::FixedLenByteArray(b) => PhysicalType::FixedLenByteArray(b.len() as i32),
        }
    }

    /// Size of the value once PLAIN encoded, booleans counted as one byte
    pub fn plain_size(&self) -> usize {
        match self {
            PhysicalValue::Boolean(_) => 1,
            PhysicalValue::Int32(_) | PhysicalValue::Float(_) => 4,
            PhysicalValue::Int64(_) | PhysicalValue::Double(_) => 8,
            PhysicalValue::ByteArray(b) => 4 + b.len(),
            PhysicalValue::FixedLenByteArray(b) => b.len(),
        }
    }

    /// Floating point NaN never takes part in min/max
    pub fn is_nan(&self) -> bool {
        match self {
            PhysicalValue::Float(f) => f.is_nan(),
            PhysicalValue::Double(f) => f.is_nan(),
            _ => false,
        }
    }

    /// PLAIN bytes without the length prefix, as stored in column statistics
    pub fn to_stat_bytes(&self) -> Vec<u8> {
        match self {
            PhysicalValue::Boolean(b) => vec![*b as u8],
            PhysicalValue::Int32(v) => v.to_le_bytes().to_vec(),
            PhysicalValue::Int64(v) => v.to_le_bytes().to_vec(),
            PhysicalValue::Float(v) => v.0.to_le_bytes().to_vec(),
            PhysicalValue::Double(v) => v.0.to_le_bytes().to_vec(),
            PhysicalValue::ByteArray(b) | PhysicalValue::FixedLenByteArray(b) => b.to_vec(),
        }
    }

    pub fn from_stat_bytes(physical_type: PhysicalType, bytes: &[u8]) -> Result<Self> {
        let wrong = || {
            ParquetError::invalid_file(format!(
                "statistics value of {} bytes does not fit {:?}",
                bytes.len(),
                physical_type
            ))
        };
        Ok(match physical_type {
            PhysicalType::Boolean => PhysicalValue::Boolean(*bytes.first().ok_or_else(wrong)? != 0),
            PhysicalType::Int32 => {
                PhysicalValue::Int32(i32::from_le_bytes(bytes.try_into().map_err(|_| wrong())?))
            }
            PhysicalType::Int64 => {
                PhysicalValue::Int64(i64::from_le_bytes(bytes.try_into().map_err(|_| wrong())?))
            }
            PhysicalType::Float => PhysicalValue::Float(OrderedFloat(f32::from_le_bytes(
                bytes.try_into().map_err(|_| wrong())?,
            ))),
            PhysicalType::Double => PhysicalValue::Double(OrderedFloat(f64::from_le_bytes(
                bytes.try_into().map_err(|_| wrong())?,
            ))),
            PhysicalType::ByteArray => PhysicalValue::ByteArray(Bytes::copy_from_slice(bytes)),
            PhysicalType::FixedLenByteArray(_) => {
                PhysicalValue::FixedLenByteArray(Bytes::copy_from_slice(bytes))
            }
        })
    }
}

/// Compare two values of the same column under the column's sort order.
pub fn compare(primitive: PrimitiveType, a: &PhysicalValue, b: &PhysicalValue) -> Ordering {
    match (a, b) {
        (PhysicalValue::Boolean(x), PhysicalValue::Boolean(y)) => x.cmp(y),
        (PhysicalValue::Int32(x), PhysicalValue::Int32(y)) => x.cmp(y),
        (PhysicalValue::Int64(x), PhysicalValue::Int64(y)) => x.cmp(y),
        (PhysicalValue::Float(x), PhysicalValue::Float(y)) => x.cmp(y),
        (PhysicalValue::Double(x), PhysicalValue::Double(y)) => x.cmp(y),
        (PhysicalValue::ByteArray(x), PhysicalValue::ByteArray(y))
        | (PhysicalValue::FixedLenByteArray(x), PhysicalValue::FixedLenByteArray(y)) => {
            if primitive.is_signed() {
                compare_twos_complement(x, y)
            } else {
                x.cmp(y)
            }
        }
        // Mixed types never share a column
        _ => Ordering::Equal,
    }
}

fn compare_twos_complement(a: &[u8], b: &[u8]) -> Ordering {
    if let (Ok(x), Ok(y)) = (decode_decimal(a), decode_decimal(b)) {
        return x.cmp(&y);
    }
    let negative = |v: &[u8]| v.first().is_some_and(|byte| byte & 0x80 != 0);
    match (negative(a), negative(b)) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
    }
}

fn violation(path: &str, primitive: PrimitiveType, value: &ParquetValue) -> ParquetError {
    ParquetError::schema_violation(
        path,
        format!(
            "{} value does not fit a {} column",
            value.type_name(),
            primitive.type_name()
        ),
    )
}

/// Convert a non-null logical value into its physical representation.
pub fn to_physical(
    path: &str,
    primitive: PrimitiveType,
    value: &ParquetValue,
) -> Result<PhysicalValue> {
    to_stored(path, primitive, primitive.physical_type(), value)
}

/// Like [`to_physical`], for a column stored as `stored` rather than the
/// default storage of its type.
pub fn to_stored(
    path: &str,
    primitive: PrimitiveType,
    stored: PhysicalType,
    value: &ParquetValue,
) -> Result<PhysicalValue> {
    let physical = match (primitive, value) {
        (PrimitiveType::Boolean, ParquetValue::Boolean(b)) => PhysicalValue::Boolean(*b),
        (PrimitiveType::Int32, ParquetValue::Int32(v)) => PhysicalValue::Int32(*v),
        (PrimitiveType::Int64, ParquetValue::Int64(v)) => PhysicalValue::Int64(*v),
        (PrimitiveType::Int64, ParquetValue::Int32(v)) => PhysicalValue::Int64(*v as i64),
        (PrimitiveType::Float32, ParquetValue::Float32(v)) => PhysicalValue::Float(*v),
        (PrimitiveType::Float64, ParquetValue::Float64(v)) => PhysicalValue::Double(*v),
        (PrimitiveType::Float64, ParquetValue::Float32(v)) => {
            PhysicalValue::Double(OrderedFloat(v.0 as f64))
        }
        (
            PrimitiveType::String | PrimitiveType::Enum | PrimitiveType::Json,
            ParquetValue::String(s),
        ) => PhysicalValue::ByteArray(Bytes::copy_from_slice(s.as_bytes())),
        (PrimitiveType::Binary, ParquetValue::Bytes(b)) => PhysicalValue::ByteArray(b.clone()),
        (PrimitiveType::Binary, ParquetValue::String(s)) => {
            PhysicalValue::ByteArray(Bytes::copy_from_slice(s.as_bytes()))
        }
        (PrimitiveType::Uuid, ParquetValue::Uuid(u)) => {
            PhysicalValue::FixedLenByteArray(Bytes::copy_from_slice(u.as_bytes()))
        }
        (PrimitiveType::Uuid, ParquetValue::String(s)) => {
            let parsed = uuid::Uuid::parse_str(s).map_err(|e| {
                ParquetError::schema_violation(path, format!("invalid uuid '{}': {}", s, e))
            })?;
            PhysicalValue::FixedLenByteArray(Bytes::copy_from_slice(parsed.as_bytes()))
        }
        (PrimitiveType::Date, ParquetValue::Date32(d)) => PhysicalValue::Int32(*d),
        (PrimitiveType::TimeMillis, ParquetValue::TimeMillis(t)) => PhysicalValue::Int32(*t),
        (PrimitiveType::TimeMicros, ParquetValue::TimeMicros(t)) => PhysicalValue::Int64(*t),
        (PrimitiveType::TimestampMillis, ParquetValue::TimestampMillis(t)) => {
            PhysicalValue::Int64(*t)
        }
        (PrimitiveType::TimestampMicros, ParquetValue::TimestampMicros(t)) => {
            PhysicalValue::Int64(*t)
        }
        (PrimitiveType::Decimal(precision, scale), ParquetValue::Decimal128(v, s)) => {
            if *s != scale {
                return Err(ParquetError::schema_violation(
                    path,
                    format!("decimal scale {} does not match column scale {}", s, scale),
                ));
            }
            encode_decimal(path, precision, stored, *v)?
        }
        (PrimitiveType::FixedLenByteArray(len), ParquetValue::Bytes(b)) => {
            if b.len() != len as usize {
                return Err(ParquetError::schema_violation(
                    path,
                    format!("expected {} bytes, got {}", len, b.len()),
                ));
            }
            PhysicalValue::FixedLenByteArray(b.clone())
        }
        (primitive, value) => return Err(violation(path, primitive, value)),
    };
    Ok(physical)
}

fn encode_decimal(
    path: &str,
    precision: u8,
    stored: PhysicalType,
    unscaled: i128,
) -> Result<PhysicalValue> {
    let limit = 10i128.pow(precision as u32);
    if unscaled <= -limit || unscaled >= limit {
        return Err(ParquetError::schema_violation(
            path,
            format!("decimal {} exceeds precision {}", unscaled, precision),
        ));
    }
    let overflow = || {
        ParquetError::schema_violation(
            path,
            format!("decimal {} does not fit {:?}", unscaled, stored),
        )
    };
    let bytes = unscaled.to_be_bytes();
    Ok(match stored {
        PhysicalType::Int32 => PhysicalValue::Int32(i32::try_from(unscaled).map_err(|_| overflow())?),
        PhysicalType::Int64 => PhysicalValue::Int64(i64::try_from(unscaled).map_err(|_| overflow())?),
        PhysicalType::FixedLenByteArray(width) => {
            let width = usize::try_from(width)
                .ok()
                .filter(|w| (1..=16).contains(w))
                .ok_or_else(overflow)?;
            let truncated = &bytes[16 - width..];
            if decode_decimal(truncated)? != unscaled {
                return Err(overflow());
            }
            PhysicalValue::FixedLenByteArray(Bytes::copy_from_slice(truncated))
        }
        PhysicalType::ByteArray => {
            // Shortest two's complement form that keeps the sign
            let width = (1..=16)
                .find(|w| decode_decimal(&bytes[16 - w..]).is_ok_and(|v| v == unscaled))
                .unwrap_or(16);
            PhysicalValue::ByteArray(Bytes::copy_from_slice(&bytes[16 - width..]))
        }
        other => {
            return Err(ParquetError::internal(format!(
                "decimal stored as {:?}",
                other
            )))
        }
    })
}

fn decode_decimal(bytes: &[u8]) -> Result<i128> {
    if bytes.is_empty() || bytes.len() > 16 {
        return Err(ParquetError::conversion(format!(
            "decimal of {} bytes",
            bytes.len()
        )));
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut buf = [fill; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(i128::from_be_bytes(buf))
}

/// Convert a stored value back into the logical value of its column.
pub fn from_physical(primitive: PrimitiveType, value: PhysicalValue) -> Result<ParquetValue> {
    let logical = match (primitive, value) {
        (PrimitiveType::Boolean, PhysicalValue::Boolean(b)) => ParquetValue::Boolean(b),
        (PrimitiveType::Int32, PhysicalValue::Int32(v)) => ParquetValue::Int32(v),
        (PrimitiveType::Int64, PhysicalValue::Int64(v)) => ParquetValue::Int64(v),
        (PrimitiveType::Float32, PhysicalValue::Float(v)) => ParquetValue::Float32(v),
        (PrimitiveType::Float64, PhysicalValue::Double(v)) => ParquetValue::Float64(v),
        (
            PrimitiveType::String | PrimitiveType::Enum | PrimitiveType::Json,
            PhysicalValue::ByteArray(b),
        ) => ParquetValue::String(Arc::from(std::str::from_utf8(&b)?)),
        (PrimitiveType::Binary, PhysicalValue::ByteArray(b)) => ParquetValue::Bytes(b),
        (PrimitiveType::Uuid, PhysicalValue::FixedLenByteArray(b)) => ParquetValue::Uuid(
            uuid::Uuid::from_slice(&b).map_err(|e| ParquetError::conversion(e.to_string()))?,
        ),
        (PrimitiveType::Date, PhysicalValue::Int32(d)) => ParquetValue::Date32(d),
        (PrimitiveType::TimeMillis, PhysicalValue::Int32(t)) => ParquetValue::TimeMillis(t),
        (PrimitiveType::TimeMicros, PhysicalValue::Int64(t)) => ParquetValue::TimeMicros(t),
        (PrimitiveType::TimestampMillis, PhysicalValue::Int64(t)) => {
            ParquetValue::TimestampMillis(t)
        }
        (PrimitiveType::TimestampMicros, PhysicalValue::Int64(t)) => {
            ParquetValue::TimestampMicros(t)
        }
        (PrimitiveType::Decimal(_, scale), PhysicalValue::Int32(v)) => {
            ParquetValue::Decimal128(v as i128, scale)
        }
        (PrimitiveType::Decimal(_, scale), PhysicalValue::Int64(v)) => {
            ParquetValue::Decimal128(v as i128, scale)
        }
        (
            PrimitiveType::Decimal(_, scale),
            PhysicalValue::FixedLenByteArray(b) | PhysicalValue::ByteArray(b),
        ) => ParquetValue::Decimal128(decode_decimal(&b)?, scale),
        (PrimitiveType::FixedLenByteArray(_), PhysicalValue::FixedLenByteArray(b)) => {
            ParquetValue::Bytes(b)
        }
        (primitive, value) => {
            return Err(ParquetError::conversion(format!(
                "cannot read {:?} as {}",
                value.physical_type(),
                primitive.type_name()
            )))
        }
    };
    Ok(logical)
}
