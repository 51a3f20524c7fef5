use crate::error::{ParquetError, Result};

/// Number of bits needed to represent `max`
pub fn num_required_bits(max: u64) -> u8 {
    (64 - max.leading_zeros()) as u8
}

pub fn ceil_div(value: usize, divisor: usize) -> usize {
    value.div_ceil(divisor)
}

/// Append `value` as an unsigned LEB128 varint
pub fn write_uleb128(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub fn uleb128_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Read an unsigned LEB128 varint starting at `*pos`, advancing it
pub fn read_uleb128(buf: &[u8], pos: &mut usize) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *buf
            .get(*pos)
            .ok_or_else(|| ParquetError::truncated(*pos as u64, 1, 0))?;
        *pos += 1;
        if shift > 63 {
            return Err(ParquetError::invalid_file("varint longer than 64 bits"));
        }
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

/// Packs values LSB-first into a byte buffer
#[derive(Debug, Default)]
pub struct BitWriter {
    buffer: Vec<u8>,
    bit_offset: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_value(&mut self, value: u64, num_bits: u8) {
        for bit in 0..num_bits as usize {
            if self.bit_offset % 8 == 0 {
                self.buffer.push(0);
            }
            if (value >> bit) & 1 == 1 {
                let last = self.buffer.len() - 1;
                self.buffer[last] |= 1 << (self.bit_offset % 8);
            }
            self.bit_offset += 1;
        }
    }

    pub fn bytes_written(&self) -> usize {
        self.buffer.len()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Reads values packed LSB-first
pub struct BitReader<'a> {
    buffer: &'a [u8],
    bit_offset: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            bit_offset: 0,
        }
    }

    pub fn get_value(&mut self, num_bits: u8) -> Result<u64> {
        let end = self.bit_offset + num_bits as usize;
        if end > self.buffer.len() * 8 {
            return Err(ParquetError::truncated(
                (self.bit_offset / 8) as u64,
                ceil_div(end, 8) as u64 - (self.bit_offset / 8) as u64,
                (self.buffer.len() - self.bit_offset / 8) as u64,
            ));
        }
        let mut value = 0u64;
        for bit in 0..num_bits as usize {
            let pos = self.bit_offset + bit;
            if (self.buffer[pos / 8] >> (pos % 8)) & 1 == 1 {
                value |= 1 << bit;
            }
        }
        self.bit_offset = end;
        Ok(value)
    }

    /// Bytes touched so far, rounding a partial byte up
    pub fn bytes_consumed(&self) -> usize {
        ceil_div(self.bit_offset, 8)
    }
}
