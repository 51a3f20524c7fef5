//! RLE / bit-packed hybrid encoding used for levels, dictionary indices and
//! RLE booleans.
//!
//! A stream is a sequence of runs, each prefixed by a ULEB128 header. An even
//! header `n << 1` is an RLE run of `n` copies of one value stored in
//! `ceil(bit_width / 8)` little-endian bytes. An odd header `g << 1 | 1` is a
//! bit-packed run of `g * 8` values, packed LSB-first.

use super::bit_util::{ceil_div, read_uleb128, uleb128_len, write_uleb128, BitReader, BitWriter};
use crate::error::{ParquetError, Result};

/// Shortest repeat worth an RLE run
const MIN_RLE_RUN: usize = 8;

/// Size of `count` values written as one bit-packed run
pub fn bit_packed_size(count: usize, bit_width: u8) -> usize {
    let groups = ceil_div(count, 8);
    uleb128_len(((groups as u64) << 1) | 1) + groups * bit_width as usize
}

/// Upper bound on the size of [`encode`]'s output
pub fn max_encoded_size(count: usize, bit_width: u8) -> usize {
    if count == 0 {
        0
    } else {
        bit_packed_size(count, bit_width)
    }
}

/// Encode `values` with the hybrid scheme.
///
/// Repeats of at least eight values become RLE runs and the rest is bit-packed.
/// The output never exceeds [`max_encoded_size`]: when the hybrid layout would
/// be larger, a single bit-packed run is written instead.
pub fn encode(values: &[u64], bit_width: u8) -> Vec<u8> {
    if values.is_empty() {
        return Vec::new();
    }
    let hybrid = encode_hybrid(values, bit_width);
    if hybrid.len() <= bit_packed_size(values.len(), bit_width) {
        hybrid
    } else {
        let mut out = Vec::new();
        write_bit_packed(&mut out, values, bit_width);
        out
    }
}

fn encode_hybrid(values: &[u64], bit_width: u8) -> Vec<u8> {
    let mut out = Vec::new();
    let mut pending: Vec<u64> = Vec::new();
    let mut i = 0;

    while i < values.len() {
        let value = values[i];
        let mut run = values[i..].iter().take_while(|v| **v == value).count();

        if run >= MIN_RLE_RUN {
            // Bit-packed runs must hold whole groups, so top up from the repeat
            let short = (8 - pending.len() % 8) % 8;
            pending.extend(std::iter::repeat(value).take(short));
            i += short;
            run -= short;

            if run >= MIN_RLE_RUN {
                write_bit_packed(&mut out, &pending, bit_width);
                pending.clear();
                write_rle(&mut out, value, run, bit_width);
            } else {
                pending.extend(std::iter::repeat(value).take(run));
            }
        } else {
            pending.extend(std::iter::repeat(value).take(run));
        }
        i += run;
    }

    write_bit_packed(&mut out, &pending, bit_width);
    out
}

fn write_rle(out: &mut Vec<u8>, value: u64, count: usize, bit_width: u8) {
    write_uleb128(out, (count as u64) << 1);
    let width = ceil_div(bit_width as usize, 8);
    out.extend_from_slice(&value.to_le_bytes()[..width]);
}

fn write_bit_packed(out: &mut Vec<u8>, values: &[u64], bit_width: u8) {
    if values.is_empty() {
        return;
    }
    let groups = ceil_div(values.len(), 8);
    write_uleb128(out, ((groups as u64) << 1) | 1);
    let mut writer = BitWriter::new();
    for value in values {
        writer.put_value(*value, bit_width);
    }
    // Pad the final group with zeros
    for _ in values.len()..groups * 8 {
        writer.put_value(0, bit_width);
    }
    out.extend_from_slice(&writer.finish());
}

/// Decode exactly `count` values from a hybrid stream.
pub fn decode(buf: &[u8], bit_width: u8, count: usize) -> Result<Vec<u64>> {
    if bit_width > 64 {
        return Err(ParquetError::invalid_file(format!(
            "bit width {} is out of range",
            bit_width
        )));
    }
    // `count` comes from a page header, so only reserve what the input can back
    let mut out = Vec::with_capacity(count.min(buf.len().saturating_mul(8)));
    let mut pos = 0;

    while out.len() < count {
        let header = read_uleb128(buf, &mut pos)?;
        let remaining = count - out.len();

        if header & 1 == 0 {
            let run = (header >> 1) as usize;
            let width = ceil_div(bit_width as usize, 8);
            let bytes = buf.get(pos..pos + width).ok_or_else(|| {
                ParquetError::truncated(pos as u64, width as u64, buf.len().saturating_sub(pos) as u64)
            })?;
            let mut le = [0u8; 8];
            le[..width].copy_from_slice(bytes);
            pos += width;
            let value = u64::from_le_bytes(le);
            out.extend(std::iter::repeat(value).take(run.min(remaining)));
        } else {
            let groups = (header >> 1) as usize;
            let overflow = || {
                ParquetError::invalid_file(format!(
                    "bit-packed run of {} groups at offset {} is out of range",
                    groups, pos
                ))
            };
            let byte_len = groups.checked_mul(bit_width as usize).ok_or_else(overflow)?;
            let run = groups.checked_mul(8).ok_or_else(overflow)?.min(remaining);
            let available = buf.len().saturating_sub(pos);
            // The last run of a stream may be cut short after its final used value
            let needed = ceil_div(run * bit_width as usize, 8);
            if available < needed {
                return Err(ParquetError::truncated(
                    pos as u64,
                    needed as u64,
                    available as u64,
                ));
            }
            let mut reader = BitReader::new(&buf[pos..pos + byte_len.min(available)]);
            for _ in 0..run {
                out.push(reader.get_value(bit_width)?);
            }
            pos += byte_len.min(available);
        }
    }
    Ok(out)
}

/// Encode levels or indices prefixed with their 4-byte little-endian length.
pub fn encode_with_length(values: &[u64], bit_width: u8) -> Vec<u8> {
    let body = encode(values, bit_width);
    let mut out = Vec::with_capacity(body.len() + 4);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// Decode a length-prefixed stream, returning the values and the bytes consumed.
pub fn decode_with_length(buf: &[u8], bit_width: u8, count: usize) -> Result<(Vec<u64>, usize)> {
    let prefix: [u8; 4] = buf
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| ParquetError::truncated(0, 4, buf.len() as u64))?;
    let len = u32::from_le_bytes(prefix) as usize;
    let body = buf
        .get(4..4 + len)
        .ok_or_else(|| ParquetError::truncated(4, len as u64, buf.len().saturating_sub(4) as u64))?;
    Ok((decode(body, bit_width, count)?, 4 + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rle_run() {
        let values = vec![1u64; 100];
        let encoded = encode(&values, 1);
        // header (100 << 1) = 200 as varint, then one value byte
        assert_eq!(encoded, vec![0xC8, 0x01, 0x01]);
        assert_eq!(decode(&encoded, 1, 100).unwrap(), values);
    }

    #[test]
    fn test_bit_packed_run() {
        let values: Vec<u64> = (0..8).collect();
        let encoded = encode(&values, 3);
        assert_eq!(encoded, vec![0x03, 0b1000_1000, 0b1100_0110, 0b1111_1010]);
        assert_eq!(decode(&encoded, 3, 8).unwrap(), values);
    }

    #[test]
    fn test_mixed_runs() {
        let mut values: Vec<u64> = vec![0, 1, 2, 3, 1];
        values.extend(std::iter::repeat(2).take(30));
        values.extend([3, 0, 1]);
        let encoded = encode(&values, 2);
        assert!(encoded.len() <= max_encoded_size(values.len(), 2));
        assert_eq!(decode(&encoded, 2, values.len()).unwrap(), values);
    }

    #[test]
    fn test_zero_bit_width() {
        let values = vec![0u64; 17];
        let encoded = encode(&values, 0);
        assert_eq!(decode(&encoded, 0, 17).unwrap(), values);
    }

    #[test]
    fn test_never_exceeds_bit_packed_size() {
        // Alternating short repeats defeat RLE runs
        let mut values = Vec::new();
        for i in 0..64u64 {
            values.extend(std::iter::repeat(i % 2).take(8));
            values.extend([0, 1, 0, 1, 0, 1, 0, 1]);
        }
        let encoded = encode(&values, 1);
        assert!(encoded.len() <= max_encoded_size(values.len(), 1));
        assert_eq!(decode(&encoded, 1, values.len()).unwrap(), values);
    }

    #[test]
    fn test_truncated_stream() {
        let encoded = encode(&(0..64u64).collect::<Vec<_>>(), 6);
        let err = decode(&encoded[..10], 6, 64).unwrap_err();
        assert!(matches!(err, ParquetError::TruncatedInput { offset: 1, .. }));
    }

    #[test]
    fn test_oversized_bit_packed_header() {
        // Header 0xFFFF_FFFF_FFFF_FFFF | 1 claims more groups than memory could hold
        let mut hostile = vec![0xFF; 9];
        hostile.push(0x01);
        let err = decode(&hostile, 8, 10).unwrap_err();
        assert!(matches!(err, ParquetError::InvalidFile(_)), "{:?}", err);

        // A plausible group count that the buffer cannot back
        let err = decode(&[0x81, 0x01, 0xAA], 8, 10).unwrap_err();
        assert!(matches!(err, ParquetError::TruncatedInput { .. }), "{:?}", err);
    }

    #[test]
    fn test_huge_count_with_short_input() {
        let encoded = encode(&[1u64; 16], 1);
        assert!(decode(&encoded, 1, usize::MAX / 2).is_err());
    }

    #[test]
    fn test_length_prefixed() {
        let values: Vec<u64> = vec![0, 1, 1, 0, 1];
        let mut encoded = encode_with_length(&values, 1);
        encoded.extend_from_slice(b"trailing");
        let (decoded, used) = decode_with_length(&encoded, 1, values.len()).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(&encoded[used..], b"trailing");
    }
}
