//! Row group construction and decoding.
//!
//! [`RowGroupWriter`] pages shredded rows for every leaf column as they arrive
//! and turns them into an [`EncodedRowGroup`], which does not depend on any
//! output and can therefore be built on another thread. Only
//! [`EncodedRowGroup::append_to`] touches the sink.
//!
//! [`RowGroupReader`] reads column chunks back through a [`ByteSource`] and
//! feeds them to the record assembler.

use bytes::Bytes;
use parquet::basic::Compression;
use parquet::format::{PageHeader, PageType};
use tracing::{debug, trace, warn};

use crate::compression::PageCodec;
use crate::dremel::{shred_row, RecordAssembler, ShreddedColumn};
use crate::encoding::bit_util::num_required_bits;
use crate::encoding::dictionary::{decode_indices, resolve};
use crate::encoding::{plain, rle};
use crate::error::{ParquetError, Result};
use crate::io::{ByteSink, ByteSource};
use crate::metadata::{read_thrift, write_thrift, ColumnChunkDescriptor, RowGroupDescriptor};
use crate::page::{PageKind, PageSet};
use crate::page_builder::PagesBuilder;
use crate::physical::{PhysicalType, PhysicalValue};
use crate::schema::{ColumnDescriptor, Schema};
use crate::statistics::{ColumnChunkStatistics, StatisticsSummary};
use crate::value::ParquetValue;
use crate::writer::WriterOptions;

struct ColumnBuffer {
    pages: PagesBuilder,
    num_values: u64,
    statistics: ColumnChunkStatistics,
}

/// Accumulates the rows of one row group
///
/// Every leaf seals its pages as rows arrive, so only one open page of values
/// per leaf is buffered at a time.
pub struct RowGroupWriter {
    columns: Vec<ColumnDescriptor>,
    num_fields: usize,
    options: WriterOptions,
    buffers: Vec<ColumnBuffer>,
    codec: PageCodec,
    num_rows: usize,
}

impl RowGroupWriter {
    pub fn new(schema: &Schema, options: &WriterOptions) -> Self {
        let columns = schema.columns();
        let buffers = columns
            .iter()
            .map(|c| ColumnBuffer {
                pages: PagesBuilder::new(c, options),
                num_values: 0,
                statistics: ColumnChunkStatistics::new(c.primitive_type),
            })
            .collect();
        Self {
            columns,
            num_fields: schema.fields().len(),
            options: options.clone(),
            buffers,
            codec: PageCodec::deferred(options.compression),
            num_rows: 0,
        }
    }

    /// Shred one row into the buffers.
    ///
    /// A row that violates the schema is rejected as a whole and leaves the
    /// buffers untouched.
    pub fn add_row(&mut self, row: &[ParquetValue]) -> Result<()> {
        if row.len() != self.num_fields {
            return Err(ParquetError::schema(format!(
                "Row has {} values but schema has {} fields",
                row.len(),
                self.num_fields
            )));
        }

        let shredded = shred_row(&self.columns, row)?;
        // Sealing keeps every triple, so the row stays all-or-nothing
        for (buffer, column) in self.buffers.iter_mut().zip(&shredded) {
            buffer.pages.make_room(column, &mut self.codec)?;
        }
        for (buffer, column) in self.buffers.iter_mut().zip(shredded) {
            for (value, _, _) in column.triples() {
                buffer.statistics.add(value);
            }
            buffer.num_values += column.len() as u64;
            buffer.pages.push(column);
        }
        self.num_rows += 1;
        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Bytes held for this row group: sealed pages, dictionaries and open pages
    pub fn estimated_size(&self) -> usize {
        self.buffers.iter().map(|b| b.pages.memory_size()).sum()
    }

    /// Level triples across all leaves that are not sealed into a page yet
    pub fn buffered_triples(&self) -> usize {
        self.buffers.iter().map(|b| b.pages.buffered_triples()).sum()
    }

    /// Seal the open pages and collect every column chunk.
    ///
    /// The writer is left as it was, so a failed encode loses nothing.
    pub fn encode(&self) -> Result<EncodedRowGroup> {
        let mut codec = PageCodec::deferred(self.options.compression);
        let mut chunks = Vec::with_capacity(self.columns.len());
        for (column, buffer) in self.columns.iter().zip(&self.buffers) {
            chunks.push(EncodedColumnChunk {
                path: column.path.iter().map(|s| s.to_string()).collect(),
                physical_type: column.physical_type(),
                num_values: buffer.num_values,
                statistics: buffer.statistics.summary(),
                pages: buffer.pages.clone().finish(&mut codec)?,
            });
        }
        Ok(EncodedRowGroup {
            num_rows: self.num_rows,
            codec: self.options.compression,
            columns: chunks,
        })
    }
}

/// The pages of one column chunk, ready to be appended
#[derive(Debug, Clone)]
pub struct EncodedColumnChunk {
    pub path: Vec<String>,
    pub physical_type: PhysicalType,
    pub num_values: u64,
    pub statistics: StatisticsSummary,
    pub pages: PageSet,
}

/// A fully encoded row group that has not been placed in a file yet
#[derive(Debug, Clone)]
pub struct EncodedRowGroup {
    num_rows: usize,
    codec: Compression,
    columns: Vec<EncodedColumnChunk>,
}

impl EncodedRowGroup {
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn columns(&self) -> &[EncodedColumnChunk] {
        &self.columns
    }

    /// Append every column chunk to `sink` and describe where it landed.
    pub fn append_to<S: ByteSink + ?Sized>(&self, sink: &mut S) -> Result<RowGroupDescriptor> {
        let file_offset = sink.current_length();
        let mut columns = Vec::with_capacity(self.columns.len());

        for chunk in &self.columns {
            let mut dictionary_page_offset = None;
            let mut data_page_offset = None;
            let mut total_compressed_size = 0u64;
            let mut total_uncompressed_size = 0u64;

            for page in chunk.pages.pages() {
                let header = write_thrift(&page.to_thrift()?)?;
                let offset = sink.append(&header)?;
                sink.append(&page.data)?;
                match page.kind {
                    PageKind::Dictionary => dictionary_page_offset = Some(offset),
                    PageKind::Data => {
                        data_page_offset.get_or_insert(offset);
                    }
                }
                total_compressed_size += (header.len() + page.compressed_size()) as u64;
                total_uncompressed_size += (header.len() + page.uncompressed_size) as u64;
            }

            let data_page_offset = data_page_offset.ok_or_else(|| {
                ParquetError::internal(format!("column chunk '{}' has no data page", chunk.path.join(".")))
            })?;

            columns.push(ColumnChunkDescriptor {
                path: chunk.path.clone(),
                physical_type: chunk.physical_type,
                encodings: chunk.pages.encodings(),
                encoding_stats: chunk.pages.encoding_stats(),
                codec: self.codec,
                num_values: chunk.num_values,
                data_page_offset,
                dictionary_page_offset,
                total_compressed_size,
                total_uncompressed_size,
                statistics: Some(chunk.statistics.clone()),
            });
        }

        let descriptor = RowGroupDescriptor {
            num_rows: self.num_rows as u64,
            file_offset,
            total_byte_size: columns.iter().map(|c| c.total_uncompressed_size).sum(),
            total_compressed_size: columns.iter().map(|c| c.total_compressed_size).sum(),
            columns,
        };
        debug!(
            rows = descriptor.num_rows,
            bytes = descriptor.total_compressed_size,
            offset = file_offset,
            "Wrote row group"
        );
        Ok(descriptor)
    }
}

/// Reads the column chunks of one row group
pub struct RowGroupReader<'a, S: ByteSource + ?Sized> {
    source: &'a S,
    schema: &'a Schema,
    columns: Vec<ColumnDescriptor>,
    descriptor: &'a RowGroupDescriptor,
}

impl<'a, S: ByteSource + ?Sized> RowGroupReader<'a, S> {
    pub fn new(source: &'a S, schema: &'a Schema, descriptor: &'a RowGroupDescriptor) -> Result<Self> {
        let columns = schema.columns();
        if columns.len() != descriptor.columns.len() {
            return Err(ParquetError::invalid_file(format!(
                "row group has {} column chunks, schema has {} leaves",
                descriptor.columns.len(),
                columns.len()
            )));
        }
        Ok(Self {
            source,
            schema,
            columns,
            descriptor,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.descriptor.num_rows as usize
    }

    pub fn metadata(&self) -> &RowGroupDescriptor {
        self.descriptor
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Decode the full triple stream of the leaf column at `index`.
    pub fn read_column(&self, index: usize) -> Result<ShreddedColumn> {
        let column = self.columns.get(index).ok_or_else(|| {
            ParquetError::invalid_argument(format!("no leaf column at index {}", index))
        })?;
        let chunk = &self.descriptor.columns[index];
        let (offset, length) = chunk.byte_range();
        let length = usize::try_from(length)
            .map_err(|_| ParquetError::invalid_file(format!("column chunk of {} bytes", length)))?;
        let bytes = self.source.read(offset, length)?;

        ChunkDecoder {
            column,
            chunk,
            base_offset: offset,
            codec: PageCodec::new(chunk.codec)?,
            dictionary: None,
            out: ShreddedColumn::new(column.max_def_level),
        }
        .decode(bytes)
    }

    /// Lazily assemble every row.
    pub fn rows(&self) -> Result<RecordAssembler> {
        let all: Vec<usize> = (0..self.schema.fields().len()).collect();
        self.rows_with_projection(&all)
    }

    /// Lazily assemble rows holding only the top-level fields at `fields`.
    pub fn rows_with_projection(&self, fields: &[usize]) -> Result<RecordAssembler> {
        let mut leaves = Vec::new();
        for field in fields {
            for (index, column) in self.columns.iter().enumerate() {
                if column.root_field == *field {
                    leaves.push(self.read_column(index)?);
                }
            }
        }
        RecordAssembler::with_projection(self.schema, fields, leaves, self.num_rows())
    }
}

/// Walks the pages of one column chunk
struct ChunkDecoder<'a> {
    column: &'a ColumnDescriptor,
    chunk: &'a ColumnChunkDescriptor,
    base_offset: u64,
    codec: PageCodec,
    dictionary: Option<Vec<PhysicalValue>>,
    out: ShreddedColumn,
}

impl ChunkDecoder<'_> {
    fn decode(mut self, bytes: Bytes) -> Result<ShreddedColumn> {
        let mut pos = 0usize;
        while pos < bytes.len() && (self.out.len() as u64) < self.chunk.num_values {
            let page_offset = self.base_offset + pos as u64;
            let (header, header_len) = read_thrift::<PageHeader>(&bytes[pos..], page_offset)?;
            pos += header_len;

            let compressed_size = page_size(header.compressed_page_size)?;
            let uncompressed_size = page_size(header.uncompressed_page_size)?;
            if pos + compressed_size > bytes.len() {
                return Err(ParquetError::truncated(
                    self.base_offset + pos as u64,
                    compressed_size as u64,
                    (bytes.len() - pos) as u64,
                ));
            }
            let payload = bytes.slice(pos..pos + compressed_size);
            pos += compressed_size;

            match header.type_ {
                PageType::DICTIONARY_PAGE => self.dictionary_page(&header, &payload, uncompressed_size)?,
                PageType::DATA_PAGE => self.data_page_v1(&header, &payload, uncompressed_size)?,
                PageType::DATA_PAGE_V2 => self.data_page_v2(&header, payload, uncompressed_size)?,
                PageType::INDEX_PAGE => {
                    trace!(column = %self.column.path_string(), offset = page_offset, "Skipping index page")
                }
                other => warn!(
                    column = %self.column.path_string(),
                    page_type = other.0,
                    offset = page_offset,
                    "Skipping unknown page type"
                ),
            }
        }

        if self.out.len() as u64 != self.chunk.num_values {
            return Err(ParquetError::invalid_file(format!(
                "column chunk '{}' declares {} values, its pages hold {}",
                self.column.path_string(),
                self.chunk.num_values,
                self.out.len()
            )));
        }
        Ok(self.out)
    }

    fn dictionary_page(&mut self, header: &PageHeader, payload: &[u8], uncompressed_size: usize) -> Result<()> {
        let dict = header.dictionary_page_header.as_ref().ok_or_else(|| {
            ParquetError::invalid_file("dictionary page without a dictionary header")
        })?;
        use parquet::format::Encoding as E;
        if dict.encoding != E::PLAIN && dict.encoding != E::PLAIN_DICTIONARY {
            return Err(ParquetError::unsupported_encoding(format!(
                "dictionary page encoded as {:?}",
                dict.encoding
            )));
        }
        let data = Bytes::from(self.codec.decompress(payload, uncompressed_size)?);
        let count = page_size(dict.num_values)?;
        self.dictionary = Some(plain::decode(&data, self.column.physical_type(), count)?);
        Ok(())
    }

    fn data_page_v1(&mut self, header: &PageHeader, payload: &[u8], uncompressed_size: usize) -> Result<()> {
        let page = header
            .data_page_header
            .as_ref()
            .ok_or_else(|| ParquetError::invalid_file("data page without a data page header"))?;
        let count = page_size(page.num_values)?;
        let data = Bytes::from(self.codec.decompress(payload, uncompressed_size)?);

        let mut pos = 0;
        let mut levels = Vec::with_capacity(2);
        for (max_level, encoding) in [
            (self.column.max_rep_level, page.repetition_level_encoding),
            (self.column.max_def_level, page.definition_level_encoding),
        ] {
            if max_level == 0 {
                levels.push(vec![0; count]);
                continue;
            }
            if encoding != parquet::format::Encoding::RLE {
                return Err(ParquetError::unsupported_encoding(format!(
                    "levels encoded as {:?}",
                    encoding
                )));
            }
            let bit_width = num_required_bits(max_level as u64);
            let (decoded, used) = rle::decode_with_length(&data[pos..], bit_width, count)?;
            pos += used;
            levels.push(self.levels(decoded, max_level)?);
        }
        let def_levels = levels.pop().unwrap_or_default();
        let rep_levels = levels.pop().unwrap_or_default();

        self.push(rep_levels, def_levels, page.encoding, data.slice(pos..))
    }

    fn data_page_v2(&mut self, header: &PageHeader, payload: Bytes, uncompressed_size: usize) -> Result<()> {
        let page = header
            .data_page_header_v2
            .as_ref()
            .ok_or_else(|| ParquetError::invalid_file("data page v2 without its header"))?;
        let count = page_size(page.num_values)?;
        let rep_len = page_size(page.repetition_levels_byte_length)?;
        let def_len = page_size(page.definition_levels_byte_length)?;
        if rep_len + def_len > payload.len() {
            return Err(ParquetError::truncated(
                self.base_offset,
                (rep_len + def_len) as u64,
                payload.len() as u64,
            ));
        }

        let mut levels = Vec::with_capacity(2);
        for (max_level, range) in [
            (self.column.max_rep_level, 0..rep_len),
            (self.column.max_def_level, rep_len..rep_len + def_len),
        ] {
            if max_level == 0 {
                levels.push(vec![0; count]);
            } else {
                let bit_width = num_required_bits(max_level as u64);
                let decoded = rle::decode(&payload[range], bit_width, count)?;
                levels.push(self.levels(decoded, max_level)?);
            }
        }
        let def_levels = levels.pop().unwrap_or_default();
        let rep_levels = levels.pop().unwrap_or_default();

        let values = payload.slice(rep_len + def_len..);
        let values = if page.is_compressed.unwrap_or(true) {
            let values_size = uncompressed_size.checked_sub(rep_len + def_len).ok_or_else(|| {
                ParquetError::invalid_file("data page v2 levels exceed the page size")
            })?;
            Bytes::from(self.codec.decompress(&values, values_size)?)
        } else {
            values
        };

        self.push(rep_levels, def_levels, page.encoding, values)
    }

    fn levels(&self, decoded: Vec<u64>, max_level: i16) -> Result<Vec<i16>> {
        decoded
            .into_iter()
            .map(|level| {
                if level > max_level as u64 {
                    Err(ParquetError::malformed(
                        self.column.path_string(),
                        format!("level {} above maximum {}", level, max_level),
                    ))
                } else {
                    Ok(level as i16)
                }
            })
            .collect()
    }

    fn push(
        &mut self,
        rep_levels: Vec<i16>,
        def_levels: Vec<i16>,
        encoding: parquet::format::Encoding,
        values: Bytes,
    ) -> Result<()> {
        use parquet::format::Encoding as E;
        let present = def_levels
            .iter()
            .filter(|d| **d == self.column.max_def_level)
            .count();
        let physical_type = self.column.physical_type();

        let decoded = match encoding {
            E::PLAIN => plain::decode(&values, physical_type, present)?,
            E::PLAIN_DICTIONARY | E::RLE_DICTIONARY => {
                let dictionary = self.dictionary.as_ref().ok_or_else(|| {
                    ParquetError::invalid_file(format!(
                        "dictionary-encoded page in '{}' without a dictionary page",
                        self.column.path_string()
                    ))
                })?;
                resolve(dictionary, &decode_indices(&values, present)?)?
            }
            E::RLE if physical_type == PhysicalType::Boolean => {
                let (bits, _) = rle::decode_with_length(&values, 1, present)?;
                bits.into_iter().map(|b| PhysicalValue::Boolean(b == 1)).collect()
            }
            other => {
                return Err(ParquetError::unsupported_encoding(format!(
                    "{:?} values in '{}'",
                    other,
                    self.column.path_string()
                )))
            }
        };

        self.out.rep_levels.extend(rep_levels);
        self.out.def_levels.extend(def_levels);
        self.out.values.extend(decoded);
        Ok(())
    }
}

fn page_size(value: i32) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| ParquetError::invalid_file(format!("negative page size or count {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::TrackedWrite;
    use crate::schema::{PrimitiveType, Repetition, SchemaBuilder, SchemaNode};

    fn schema() -> Schema {
        SchemaBuilder::new()
            .with_root(SchemaNode::Struct {
                name: "root".to_string(),
                repetition: Repetition::Required,
                fields: vec![
                    SchemaNode::Primitive {
                        name: "id".to_string(),
                        primitive_type: PrimitiveType::Int32,
                        repetition: Repetition::Required,
                    },
                    SchemaNode::List {
                        name: "tags".to_string(),
                        repetition: Repetition::Optional,
                        item: Box::new(SchemaNode::Primitive {
                            name: "element".to_string(),
                            primitive_type: PrimitiveType::String,
                            repetition: Repetition::Required,
                        }),
                    },
                ],
            })
            .build()
            .unwrap()
    }

    fn rows() -> Vec<Vec<ParquetValue>> {
        (0..50)
            .map(|i| {
                let tags = match i % 3 {
                    0 => ParquetValue::Null,
                    1 => ParquetValue::List(vec![]),
                    _ => ParquetValue::List(vec!["a".into(), "b".into()]),
                };
                vec![ParquetValue::Int32(i), tags]
            })
            .collect()
    }

    fn written(options: &WriterOptions) -> (Vec<u8>, RowGroupDescriptor) {
        let schema = schema();
        let mut writer = RowGroupWriter::new(&schema, options);
        for row in rows() {
            writer.add_row(&row).unwrap();
        }
        let encoded = writer.encode().unwrap();
        let mut sink = TrackedWrite::new(Vec::new());
        sink.append(b"PAR1").unwrap();
        let descriptor = encoded.append_to(&mut sink).unwrap();
        (sink.into_inner(), descriptor)
    }

    #[test]
    fn test_write_then_read_row_group() {
        let schema = schema();
        let (bytes, descriptor) = written(&WriterOptions::default());
        assert_eq!(descriptor.num_rows, 50);
        assert_eq!(descriptor.file_offset, 4);
        assert_eq!(descriptor.columns[0].data_page_offset, 4);
        assert_eq!(
            descriptor.total_compressed_size,
            bytes.len() as u64 - 4
        );

        let source = Bytes::from(bytes);
        let reader = RowGroupReader::new(&source, &schema, &descriptor).unwrap();
        let read: Vec<_> = reader.rows().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(read, rows());
    }

    #[test]
    fn test_dictionary_chunk_offsets() {
        let (_, descriptor) = written(&WriterOptions::default());
        let tags = &descriptor.columns[1];
        let dictionary = tags.dictionary_page_offset.unwrap();
        assert!(dictionary < tags.data_page_offset);
        assert_eq!(tags.start_offset(), dictionary);
        assert_eq!(tags.num_values, 50 + 16);
        assert_eq!(tags.statistics.as_ref().unwrap().null_count, 34);
    }

    #[test]
    fn test_rejected_row_leaves_no_trace() {
        let schema = schema();
        let mut writer = RowGroupWriter::new(&schema, &WriterOptions::default());
        writer.add_row(&[1.into(), ParquetValue::Null]).unwrap();
        let err = writer
            .add_row(&[ParquetValue::Null, ParquetValue::List(vec!["x".into()])])
            .unwrap_err();
        assert!(matches!(err, ParquetError::SchemaViolation { .. }));
        assert!(writer.add_row(&[1.into()]).is_err());
        assert_eq!(writer.num_rows(), 1);

        let encoded = writer.encode().unwrap();
        assert_eq!(encoded.columns()[1].num_values, 1);
    }

    #[test]
    fn test_encode_leaves_writer_usable() {
        let schema = schema();
        let mut writer = RowGroupWriter::new(&schema, &WriterOptions::default());
        let rows = rows();
        for row in &rows[..20] {
            writer.add_row(row).unwrap();
        }
        let first = writer.encode().unwrap();
        for row in &rows[20..] {
            writer.add_row(row).unwrap();
        }
        let second = writer.encode().unwrap();
        assert_eq!(first.num_rows(), 20);
        assert_eq!(second.num_rows(), 50);

        let mut sink = TrackedWrite::new(Vec::new());
        sink.append(b"PAR1").unwrap();
        let descriptor = second.append_to(&mut sink).unwrap();
        let source = Bytes::from(sink.into_inner());
        let reader = RowGroupReader::new(&source, &schema, &descriptor).unwrap();
        let read: Vec<_> = reader.rows().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(read, rows);
    }

    #[test]
    fn test_unusable_codec_fails_at_encode() {
        let schema = schema();
        let options = WriterOptions {
            compression: Compression::LZO,
            ..WriterOptions::default()
        };
        let mut writer = RowGroupWriter::new(&schema, &options);
        writer.add_row(&[1.into(), ParquetValue::Null]).unwrap();
        assert!(matches!(writer.encode(), Err(ParquetError::UnsupportedCodec(_))));
        assert_eq!(writer.num_rows(), 1);
    }

    #[test]
    fn test_read_single_column() {
        let schema = schema();
        let (bytes, descriptor) = written(&WriterOptions::default());
        let source = Bytes::from(bytes);
        let reader = RowGroupReader::new(&source, &schema, &descriptor).unwrap();
        let ids = reader.read_column(0).unwrap();
        assert_eq!(ids.len(), 50);
        assert_eq!(ids.values[49], PhysicalValue::Int32(49));
        assert!(ids.def_levels.iter().all(|d| *d == 0));
        assert!(reader.read_column(2).is_err());
    }

    #[test]
    fn test_truncated_chunk() {
        let schema = schema();
        let (bytes, descriptor) = written(&WriterOptions::default());
        let cut = Bytes::from(bytes[..bytes.len() - 3].to_vec());
        let reader = RowGroupReader::new(&cut, &schema, &descriptor).unwrap();
        assert!(matches!(
            reader.read_column(1),
            Err(ParquetError::TruncatedInput { .. })
        ));
    }
}
