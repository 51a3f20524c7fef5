use bytes::Bytes;
use ordered_float::OrderedFloat;

use super::bit_util::{BitReader, BitWriter};
use crate::error::{ParquetError, Result};
use crate::physical::{PhysicalType, PhysicalValue};

/// PLAIN-encode values of a single physical type.
pub fn encode(physical_type: PhysicalType, values: &[PhysicalValue]) -> Result<Vec<u8>> {
    if physical_type == PhysicalType::Boolean {
        let mut writer = BitWriter::new();
        for value in values {
            match value {
                PhysicalValue::Boolean(b) => writer.put_value(*b as u64, 1),
                other => return Err(mismatch(physical_type, other)),
            }
        }
        return Ok(writer.finish());
    }

    let mut out = Vec::with_capacity(values.iter().map(PhysicalValue::plain_size).sum());
    for value in values {
        match (physical_type, value) {
            (PhysicalType::Int32, PhysicalValue::Int32(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (PhysicalType::Int64, PhysicalValue::Int64(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (PhysicalType::Float, PhysicalValue::Float(v)) => {
                out.extend_from_slice(&v.0.to_le_bytes())
            }
            (PhysicalType::Double, PhysicalValue::Double(v)) => {
                out.extend_from_slice(&v.0.to_le_bytes())
            }
            (PhysicalType::ByteArray, PhysicalValue::ByteArray(b)) => {
                out.extend_from_slice(&(b.len() as u32).to_le_bytes());
                out.extend_from_slice(b);
            }
            (PhysicalType::FixedLenByteArray(len), PhysicalValue::FixedLenByteArray(b))
                if b.len() == len as usize =>
            {
                out.extend_from_slice(b)
            }
            (_, other) => return Err(mismatch(physical_type, other)),
        }
    }
    Ok(out)
}

fn mismatch(physical_type: PhysicalType, value: &PhysicalValue) -> ParquetError {
    ParquetError::internal(format!(
        "cannot PLAIN encode {:?} as {:?}",
        value.physical_type(),
        physical_type
    ))
}

/// Decode `count` PLAIN values from `buf`.
pub fn decode(buf: &Bytes, physical_type: PhysicalType, count: usize) -> Result<Vec<PhysicalValue>> {
    let mut out = Vec::with_capacity(count.min(buf.len().saturating_mul(8)));

    if physical_type == PhysicalType::Boolean {
        let mut reader = BitReader::new(buf);
        for _ in 0..count {
            out.push(PhysicalValue::Boolean(reader.get_value(1)? == 1));
        }
        return Ok(out);
    }

    let mut pos = 0usize;
    let take = |pos: &mut usize, len: usize| -> Result<Bytes> {
        let end = pos.checked_add(len).filter(|end| *end <= buf.len()).ok_or_else(|| {
            ParquetError::truncated(*pos as u64, len as u64, buf.len().saturating_sub(*pos) as u64)
        })?;
        let slice = buf.slice(*pos..end);
        *pos = end;
        Ok(slice)
    };

    for _ in 0..count {
        let value = match physical_type {
            PhysicalType::Int32 => {
                PhysicalValue::Int32(i32::from_le_bytes(fixed::<4>(&take(&mut pos, 4)?)))
            }
            PhysicalType::Int64 => {
                PhysicalValue::Int64(i64::from_le_bytes(fixed::<8>(&take(&mut pos, 8)?)))
            }
            PhysicalType::Float => PhysicalValue::Float(OrderedFloat(f32::from_le_bytes(
                fixed::<4>(&take(&mut pos, 4)?),
            ))),
            PhysicalType::Double => PhysicalValue::Double(OrderedFloat(f64::from_le_bytes(
                fixed::<8>(&take(&mut pos, 8)?),
            ))),
            PhysicalType::ByteArray => {
                let len = u32::from_le_bytes(fixed::<4>(&take(&mut pos, 4)?)) as usize;
                PhysicalValue::ByteArray(take(&mut pos, len)?)
            }
            PhysicalType::FixedLenByteArray(len) => {
                let len = usize::try_from(len).map_err(|_| {
                    ParquetError::invalid_file(format!("fixed length {} is negative", len))
                })?;
                PhysicalValue::FixedLenByteArray(take(&mut pos, len)?)
            }
            PhysicalType::Boolean => {
                return Err(ParquetError::internal("booleans are decoded bit-packed"))
            }
        };
        out.push(value);
    }
    Ok(out)
}

fn fixed<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
