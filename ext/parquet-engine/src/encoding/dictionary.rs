use ahash::RandomState;
use indexmap::IndexSet;

use super::bit_util::num_required_bits;
use super::{plain, rle};
use crate::error::{ParquetError, Result};
use crate::physical::{PhysicalType, PhysicalValue};

/// Insertion-ordered mapping from distinct values to dictionary indices
#[derive(Debug, Clone)]
pub struct DictionaryEncoder {
    physical_type: PhysicalType,
    entries: IndexSet<PhysicalValue, RandomState>,
    plain_size: usize,
}

impl DictionaryEncoder {
    pub fn new(physical_type: PhysicalType) -> Self {
        Self {
            physical_type,
            entries: IndexSet::with_hasher(RandomState::new()),
            plain_size: 0,
        }
    }

    /// Index of `value`, adding it on first sight
    pub fn insert(&mut self, value: &PhysicalValue) -> u64 {
        if let Some(index) = self.entries.get_index_of(value) {
            return index as u64;
        }
        self.plain_size += value.plain_size();
        self.entries.insert_full(value.clone()).0 as u64
    }

    pub fn contains(&self, value: &PhysicalValue) -> bool {
        self.entries.contains(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// PLAIN size of the dictionary page payload
    pub fn plain_size(&self) -> usize {
        self.plain_size
    }

    /// Bits per index in data pages
    pub fn bit_width(&self) -> u8 {
        num_required_bits(self.entries.len().saturating_sub(1) as u64).max(1)
    }

    /// PLAIN-encoded dictionary page payload
    pub fn write_dictionary(&self) -> Result<Vec<u8>> {
        let values: Vec<PhysicalValue> = self.entries.iter().cloned().collect();
        plain::encode(self.physical_type, &values)
    }
}

/// Data page payload for dictionary indices: one bit-width byte, then the hybrid stream
pub fn encode_indices(indices: &[u64], bit_width: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + rle::max_encoded_size(indices.len(), bit_width));
    out.push(bit_width);
    out.extend_from_slice(&rle::encode(indices, bit_width));
    out
}

pub fn decode_indices(buf: &[u8], count: usize) -> Result<Vec<u64>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let (bit_width, body) = buf
        .split_first()
        .ok_or_else(|| ParquetError::truncated(0, 1, 0))?;
    if *bit_width > 32 {
        return Err(ParquetError::invalid_file(format!(
            "dictionary index bit width {}",
            bit_width
        )));
    }
    rle::decode(body, *bit_width, count)
}

/// Look every index up in `dictionary`.
pub fn resolve(dictionary: &[PhysicalValue], indices: &[u64]) -> Result<Vec<PhysicalValue>> {
    indices
        .iter()
        .map(|index| {
            dictionary.get(*index as usize).cloned().ok_or_else(|| {
                ParquetError::invalid_file(format!(
                    "dictionary index {} out of range for {} entries",
                    index,
                    dictionary.len()
                ))
            })
        })
        .collect()
}
