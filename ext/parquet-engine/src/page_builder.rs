//! Batching of shredded records into size-bounded pages.

use std::collections::HashSet;

use ahash::RandomState;
use bytes::Bytes;
use tracing::{debug, trace};

use crate::compression::PageCodec;
use crate::dremel::ShreddedColumn;
use crate::encoding::bit_util::{ceil_div, num_required_bits};
use crate::encoding::dictionary::{encode_indices, DictionaryEncoder};
use crate::encoding::{plain, rle, Encoding};
use crate::error::Result;
use crate::page::{Page, PageKind, PageSet};
use crate::physical::{PhysicalType, PhysicalValue};
use crate::schema::ColumnDescriptor;
use crate::writer::WriterOptions;

/// Upper-bound estimates of uncompressed data page sizes
#[derive(Debug, Clone, Copy)]
pub struct PageSizeCalculator {
    page_size: usize,
}

impl PageSizeCalculator {
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// One length-prefixed level stream; absent when the maximum level is 0
    pub fn levels_size(&self, count: usize, max_level: i16) -> usize {
        if max_level == 0 {
            0
        } else {
            4 + rle::max_encoded_size(count, num_required_bits(max_level as u64))
        }
    }

    /// PLAIN values, given the sum of their [`PhysicalValue::plain_size`]
    pub fn plain_values_size(&self, physical_type: PhysicalType, count: usize, plain_bytes: usize) -> usize {
        match physical_type {
            PhysicalType::Boolean => ceil_div(count, 8),
            _ => plain_bytes,
        }
    }

    pub fn dictionary_values_size(&self, count: usize, bit_width: u8) -> usize {
        1 + rle::max_encoded_size(count, bit_width)
    }

    /// Size of a data page holding `triples` level entries and `values` present values
    pub fn estimate(
        &self,
        column: &ColumnDescriptor,
        triples: usize,
        values: usize,
        plain_bytes: usize,
        dictionary_bit_width: Option<u8>,
    ) -> usize {
        let values_size = match dictionary_bit_width {
            Some(bit_width) => self.dictionary_values_size(values, bit_width),
            None => self.plain_values_size(column.physical_type(), values, plain_bytes),
        };
        values_size
            + self.levels_size(triples, column.max_rep_level)
            + self.levels_size(triples, column.max_def_level)
    }

    pub fn exceeds(&self, estimate: usize) -> bool {
        estimate > self.page_size
    }
}

/// How values of the open page are encoded
#[derive(Debug, Clone)]
enum ValueMode {
    Dictionary(DictionaryEncoder),
    /// PLAIN values, keeping the dictionary of pages sealed before the fallback
    Plain(Option<DictionaryEncoder>),
}

/// Builds the pages of one leaf column chunk as records arrive.
///
/// Only the open page is held as values; sealed pages are kept encoded and
/// compressed. Values start out dictionary encoded and switch to PLAIN for the
/// rest of the chunk once the dictionary stops paying off. The switch never
/// goes back.
#[derive(Debug, Clone)]
pub struct PagesBuilder {
    column: ColumnDescriptor,
    calculator: PageSizeCalculator,
    dictionary_size_fraction: f64,
    mode: ValueMode,
    open: ShreddedColumn,
    open_indices: Vec<u64>,
    open_plain_bytes: usize,
    chunk_values: usize,
    chunk_plain_bytes: usize,
    data_pages: Vec<Page>,
    dictionary_pages: usize,
    sealed_bytes: usize,
}

impl PagesBuilder {
    pub fn new(column: &ColumnDescriptor, options: &WriterOptions) -> Self {
        let mode = if options.dictionary_enabled && column.physical_type() != PhysicalType::Boolean {
            ValueMode::Dictionary(DictionaryEncoder::new(column.physical_type()))
        } else {
            ValueMode::Plain(None)
        };
        Self {
            column: column.clone(),
            calculator: PageSizeCalculator::new(options.page_size),
            dictionary_size_fraction: options.dictionary_size_fraction,
            mode,
            open: ShreddedColumn::new(column.max_def_level),
            open_indices: Vec::new(),
            open_plain_bytes: 0,
            chunk_values: 0,
            chunk_plain_bytes: 0,
            data_pages: Vec::new(),
            dictionary_pages: 0,
            sealed_bytes: 0,
        }
    }

    pub fn calculator(&self) -> &PageSizeCalculator {
        &self.calculator
    }

    /// Level triples of the open page
    pub fn buffered_triples(&self) -> usize {
        self.open.len()
    }

    /// Bytes held by sealed pages, the dictionary and the open page
    pub fn memory_size(&self) -> usize {
        let dictionary = match &self.mode {
            ValueMode::Dictionary(encoder) | ValueMode::Plain(Some(encoder)) => encoder.plain_size(),
            ValueMode::Plain(None) => 0,
        };
        self.sealed_bytes + dictionary + self.open_estimate()
    }

    /// Add one record, sealing the open page first when the record would
    /// push it past the threshold.
    pub fn add_record(&mut self, record: ShreddedColumn, codec: &mut PageCodec) -> Result<()> {
        self.make_room(&record, codec)?;
        self.push(record);
        Ok(())
    }

    /// Seal whatever `record` needs sealed before it can be pushed.
    ///
    /// This only moves buffered triples into pages, so a caller may run it for
    /// every leaf of a row before pushing any of them.
    pub fn make_room(&mut self, record: &ShreddedColumn, codec: &mut PageCodec) -> Result<()> {
        let record_bytes: usize = record.values.iter().map(PhysicalValue::plain_size).sum();

        let mut bit_width = None;
        if let ValueMode::Dictionary(encoder) = &self.mode {
            let (entries, bytes) = new_entries(encoder, &record.values);
            if encoder.plain_size() + bytes > self.max_dictionary_bytes() {
                debug!(
                    column = %self.column.path_string(),
                    entries = encoder.len() + entries,
                    dictionary_bytes = encoder.plain_size() + bytes,
                    "Dictionary outgrew its budget, using PLAIN"
                );
                self.fall_back(codec)?;
            } else {
                let last = (encoder.len() + entries).saturating_sub(1);
                bit_width = Some(num_required_bits(last as u64).max(1));
            }
        }

        let estimate = self.calculator.estimate(
            &self.column,
            self.open.len() + record.len(),
            self.open.values.len() + record.values.len(),
            self.open_plain_bytes + record_bytes,
            bit_width,
        );
        if !self.open.is_empty() && self.calculator.exceeds(estimate) {
            self.seal(codec)?;
        }
        Ok(())
    }

    /// Append `record` to the open page without any size check
    pub fn push(&mut self, mut record: ShreddedColumn) {
        let record_bytes: usize = record.values.iter().map(PhysicalValue::plain_size).sum();
        if let ValueMode::Dictionary(encoder) = &mut self.mode {
            self.open_indices
                .extend(record.values.iter().map(|value| encoder.insert(value)));
        }
        self.chunk_values += record.values.len();
        self.chunk_plain_bytes += record_bytes;
        self.open_plain_bytes += record_bytes;
        self.open.append(&mut record);
    }

    /// Seal the open page and emit the chunk's pages.
    pub fn finish(mut self, codec: &mut PageCodec) -> Result<PageSet> {
        if !self.open.is_empty() {
            self.seal(codec)?;
        }
        let dictionary = match std::mem::replace(&mut self.mode, ValueMode::Plain(None)) {
            ValueMode::Dictionary(encoder) | ValueMode::Plain(Some(encoder)) if self.dictionary_pages > 0 => {
                Some(encoder)
            }
            _ => None,
        };
        let dictionary_page = match dictionary {
            Some(encoder) => Some(self.dictionary_page(&encoder, codec)?),
            None => None,
        };
        Ok(PageSet {
            dictionary_page,
            data_pages: self.data_pages,
        })
    }

    fn max_dictionary_bytes(&self) -> usize {
        (self.calculator.page_size() as f64 * self.dictionary_size_fraction) as usize
    }

    fn open_estimate(&self) -> usize {
        let bit_width = match &self.mode {
            ValueMode::Dictionary(encoder) => Some(encoder.bit_width()),
            ValueMode::Plain(_) => None,
        };
        self.calculator.estimate(
            &self.column,
            self.open.len(),
            self.open.values.len(),
            self.open_plain_bytes,
            bit_width,
        )
    }

    /// Whether the dictionary still pays off for the values seen so far
    fn dictionary_pays_off(&self, encoder: &DictionaryEncoder) -> bool {
        let fraction = self.dictionary_size_fraction;
        let max_entries = (self.chunk_values as f64 * fraction) as usize;
        if encoder.is_empty() || encoder.len() > max_entries {
            debug!(
                column = %self.column.path_string(),
                entries = encoder.len(),
                values = self.chunk_values,
                "Cardinality too high for dictionary, using PLAIN"
            );
            return false;
        }
        if encoder.plain_size() as f64 > self.chunk_plain_bytes as f64 * fraction {
            debug!(
                column = %self.column.path_string(),
                dictionary_bytes = encoder.plain_size(),
                plain_bytes = self.chunk_plain_bytes,
                "Dictionary saves too little, using PLAIN"
            );
            return false;
        }
        true
    }

    /// Switch the rest of the chunk to PLAIN and re-split the open page.
    fn fall_back(&mut self, codec: &mut PageCodec) -> Result<()> {
        let encoder = match std::mem::replace(&mut self.mode, ValueMode::Plain(None)) {
            ValueMode::Dictionary(encoder) => encoder,
            plain => {
                self.mode = plain;
                return Ok(());
            }
        };
        if self.dictionary_pages > 0 {
            self.mode = ValueMode::Plain(Some(encoder));
        }

        let open = std::mem::replace(&mut self.open, ShreddedColumn::new(self.column.max_def_level));
        self.open_indices.clear();
        self.open_plain_bytes = 0;
        self.chunk_values -= open.values.len();
        self.chunk_plain_bytes -= open.values.iter().map(PhysicalValue::plain_size).sum::<usize>();
        for record in split_records(open) {
            self.make_room(&record, codec)?;
            self.push(record);
        }
        Ok(())
    }

    fn seal(&mut self, codec: &mut PageCodec) -> Result<()> {
        if let ValueMode::Dictionary(encoder) = &self.mode {
            if !self.dictionary_pays_off(encoder) {
                self.fall_back(codec)?;
                if self.open.is_empty() {
                    return Ok(());
                }
            }
        }

        let mut buf = Vec::new();
        for (levels, max_level) in [
            (&self.open.rep_levels, self.column.max_rep_level),
            (&self.open.def_levels, self.column.max_def_level),
        ] {
            if max_level > 0 {
                let levels: Vec<u64> = levels.iter().map(|l| *l as u64).collect();
                buf.extend_from_slice(&rle::encode_with_length(
                    &levels,
                    num_required_bits(max_level as u64),
                ));
            }
        }

        let encoding = match &self.mode {
            ValueMode::Dictionary(encoder) => {
                buf.extend_from_slice(&encode_indices(&self.open_indices, encoder.bit_width()));
                self.dictionary_pages += 1;
                Encoding::RleDictionary
            }
            ValueMode::Plain(_) => {
                buf.extend_from_slice(&plain::encode(self.column.physical_type(), &self.open.values)?);
                Encoding::Plain
            }
        };

        let compressed = codec.compress(&buf)?;
        trace!(
            column = %self.column.path_string(),
            values = self.open.len(),
            uncompressed = buf.len(),
            compressed = compressed.len(),
            "Sealed data page"
        );

        self.sealed_bytes += compressed.len();
        self.data_pages.push(Page {
            kind: PageKind::Data,
            encoding,
            num_values: self.open.len(),
            uncompressed_size: buf.len(),
            data: Bytes::from(compressed),
        });
        self.open = ShreddedColumn::new(self.column.max_def_level);
        self.open_indices.clear();
        self.open_plain_bytes = 0;
        Ok(())
    }

    fn dictionary_page(&self, encoder: &DictionaryEncoder, codec: &mut PageCodec) -> Result<Page> {
        let buf = encoder.write_dictionary()?;
        let compressed = codec.compress(&buf)?;
        trace!(
            column = %self.column.path_string(),
            entries = encoder.len(),
            uncompressed = buf.len(),
            "Sealed dictionary page"
        );
        Ok(Page {
            kind: PageKind::Dictionary,
            encoding: Encoding::PlainDictionary,
            num_values: encoder.len(),
            uncompressed_size: buf.len(),
            data: Bytes::from(compressed),
        })
    }
}

/// Entries and PLAIN bytes `values` would add to `encoder`
fn new_entries(encoder: &DictionaryEncoder, values: &[PhysicalValue]) -> (usize, usize) {
    let mut seen = HashSet::with_hasher(RandomState::new());
    values
        .iter()
        .filter(|value| !encoder.contains(value) && seen.insert(*value))
        .fold((0, 0), |(entries, bytes), value| (entries + 1, bytes + value.plain_size()))
}

/// Cut a triple stream at every repetition level 0
fn split_records(column: ShreddedColumn) -> Vec<ShreddedColumn> {
    let mut records: Vec<ShreddedColumn> = Vec::new();
    let mut values = column.values.into_iter();
    for (rep, def) in column.rep_levels.into_iter().zip(column.def_levels) {
        if rep == 0 || records.is_empty() {
            records.push(ShreddedColumn::new(column.max_def_level));
        }
        let value = if def == column.max_def_level { values.next() } else { None };
        if let Some(record) = records.last_mut() {
            record.push(value, rep, def);
        }
    }
    records
}
