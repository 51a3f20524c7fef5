//! Core Parquet writing functionality

use crate::compression::PageCodec;
use crate::io::{ByteSink, TrackedWrite};
use crate::metadata::{encode_footer, FileMetadata, RowGroupDescriptor, FORMAT_VERSION, MAGIC};
use crate::row_group::{EncodedRowGroup, RowGroupWriter};
use crate::{ParquetError, ParquetValue, Result, Schema, SchemaBuilder};
use parquet::basic::Compression;
use std::io::Write;
use tracing::debug;

// Default configuration constants
pub const DEFAULT_ROW_GROUP_SIZE: usize = 1024 * 1024;
pub const DEFAULT_MEMORY_THRESHOLD: usize = 100 * 1024 * 1024; // 100MB
pub const DEFAULT_PAGE_SIZE: usize = 1024 * 1024;
pub const DEFAULT_DICTIONARY_SIZE_FRACTION: f64 = 0.5;

/// Settings shared by every row group of a file
#[derive(Debug, Clone, PartialEq)]
pub struct WriterOptions {
    pub compression: Compression,
    /// Rows per row group before it is sealed
    pub row_group_size: usize,
    /// Buffered bytes per row group before it is sealed
    pub memory_threshold: usize,
    /// Uncompressed data page threshold in bytes
    pub page_size: usize,
    pub dictionary_enabled: bool,
    /// Share of the page size, and of the plain-encoded chunk, a dictionary may take
    pub dictionary_size_fraction: f64,
    pub created_by: String,
    pub key_value_metadata: Vec<(String, String)>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZE,
            dictionary_enabled: true,
            dictionary_size_fraction: DEFAULT_DICTIONARY_SIZE_FRACTION,
            created_by: format!("parquet-engine version {}", env!("CARGO_PKG_VERSION")),
            key_value_metadata: Vec::new(),
        }
    }
}

impl WriterOptions {
    fn validate(&self) -> Result<()> {
        if self.row_group_size == 0 {
            return Err(ParquetError::invalid_argument("row group size must be positive"));
        }
        if self.page_size == 0 {
            return Err(ParquetError::invalid_argument("page size must be positive"));
        }
        if !(self.dictionary_size_fraction > 0.0 && self.dictionary_size_fraction <= 1.0) {
            return Err(ParquetError::invalid_argument(format!(
                "dictionary size fraction must be within (0, 1], got {}",
                self.dictionary_size_fraction
            )));
        }
        Ok(())
    }
}

/// Builder for creating a configured Writer
#[derive(Debug, Clone, Default)]
pub struct WriterBuilder {
    options: WriterOptions,
}

impl WriterBuilder {
    /// Create a new WriterBuilder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression algorithm
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.options.compression = compression;
        self
    }

    /// Set the maximum number of rows per row group
    pub fn with_row_group_size(mut self, rows: usize) -> Self {
        self.options.row_group_size = rows;
        self
    }

    /// Set the memory threshold for flushing
    pub fn with_memory_threshold(mut self, threshold: usize) -> Self {
        self.options.memory_threshold = threshold;
        self
    }

    /// Set the data page size threshold
    pub fn with_page_size(mut self, bytes: usize) -> Self {
        self.options.page_size = bytes;
        self
    }

    pub fn with_dictionary_enabled(mut self, enabled: bool) -> Self {
        self.options.dictionary_enabled = enabled;
        self
    }

    pub fn with_dictionary_size_fraction(mut self, fraction: f64) -> Self {
        self.options.dictionary_size_fraction = fraction;
        self
    }

    pub fn with_created_by<S: Into<String>>(mut self, created_by: S) -> Self {
        self.options.created_by = created_by.into();
        self
    }

    /// Add a key/value pair to the footer
    pub fn with_key_value_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.options.key_value_metadata.push((key.into(), value.into()));
        self
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Build a Writer with the configured settings
    pub fn build<W: Write>(self, writer: W, schema: Schema) -> Result<Writer<W>> {
        self.options.validate()?;
        // Unusable codecs fail here, before anything is written
        PageCodec::new(self.options.compression)?;
        let schema = SchemaBuilder::new().with_root(schema.root).build()?;

        let mut sink = TrackedWrite::new(writer);
        sink.append(MAGIC)?;

        Ok(Writer {
            current: RowGroupWriter::new(&schema, &self.options),
            sink,
            schema,
            options: self.options,
            row_groups: Vec::new(),
            total_rows_written: 0,
        })
    }
}

/// Core Parquet writer that works with any type implementing Write
pub struct Writer<W: Write> {
    sink: TrackedWrite<W>,
    schema: Schema,
    options: WriterOptions,
    current: RowGroupWriter,
    row_groups: Vec<RowGroupDescriptor>,
    total_rows_written: u64,
}

impl<W: Write> Writer<W> {
    /// Create a new writer with default settings
    pub fn new(writer: W, schema: Schema) -> Result<Self> {
        WriterBuilder::new().build(writer, schema)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Write a batch of rows to the Parquet file
    ///
    /// Each row is a vector of values corresponding to the schema fields
    pub fn write_rows(&mut self, rows: Vec<Vec<ParquetValue>>) -> Result<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    /// Write a single row to the Parquet file
    ///
    /// Rows are buffered in the current row group, which is sealed once it
    /// reaches the row count or memory threshold
    pub fn write_row(&mut self, row: Vec<ParquetValue>) -> Result<()> {
        self.current.add_row(&row)?;

        if self.current.num_rows() >= self.options.row_group_size
            || self.current.estimated_size() >= self.options.memory_threshold
        {
            self.flush()?;
        }
        Ok(())
    }

    /// Write columns to the Parquet file
    ///
    /// Each element is a tuple of (column_name, values)
    pub fn write_columns(&mut self, columns: Vec<(String, Vec<ParquetValue>)>) -> Result<()> {
        if columns.is_empty() {
            return Ok(());
        }

        // Verify column names match schema
        let fields = self.schema.fields();
        if columns.len() != fields.len() {
            return Err(ParquetError::schema(format!(
                "Provided {} columns but schema has {} fields",
                columns.len(),
                fields.len()
            )));
        }

        // Sort columns to match schema order
        let mut ordered = Vec::with_capacity(fields.len());
        for field in fields {
            let (_, values) = columns
                .iter()
                .find(|(name, _)| name == field.name())
                .ok_or_else(|| ParquetError::schema(format!("Missing column: {}", field.name())))?;
            ordered.push(values);
        }

        let num_rows = ordered[0].len();
        if let Some(values) = ordered.iter().find(|v| v.len() != num_rows) {
            return Err(ParquetError::schema(format!(
                "Columns differ in length: {} and {}",
                num_rows,
                values.len()
            )));
        }

        for i in 0..num_rows {
            let row = ordered.iter().map(|values| values[i].clone()).collect();
            self.write_row(row)?;
        }
        Ok(())
    }

    /// Start an independent row group for this file's schema and options.
    ///
    /// Several can be filled and encoded concurrently, then appended in
    /// order with [`Writer::append_row_group`].
    pub fn new_row_group(&self) -> RowGroupWriter {
        RowGroupWriter::new(&self.schema, &self.options)
    }

    /// Append an encoded row group after everything written so far.
    ///
    /// Rows buffered through `write_row` are sealed first, so row groups land
    /// in arrival order.
    pub fn append_row_group(&mut self, row_group: EncodedRowGroup) -> Result<()> {
        self.flush()?;
        self.append_encoded(row_group)
    }

    fn append_encoded(&mut self, row_group: EncodedRowGroup) -> Result<()> {
        if row_group.num_rows() == 0 {
            return Ok(());
        }
        let leaves = self.schema.columns().len();
        if row_group.columns().len() != leaves {
            return Err(ParquetError::invalid_argument(format!(
                "row group has {} column chunks, schema has {} leaves",
                row_group.columns().len(),
                leaves
            )));
        }
        let descriptor = row_group.append_to(&mut self.sink)?;
        self.total_rows_written += descriptor.num_rows;
        self.row_groups.push(descriptor);
        Ok(())
    }

    /// Seal the buffered rows into a row group
    pub fn flush(&mut self) -> Result<()> {
        if self.current.is_empty() {
            return Ok(());
        }
        // Buffered rows stay in place until their row group is encoded
        let encoded = self.current.encode()?;
        self.current = self.new_row_group();
        self.append_encoded(encoded)?;
        self.sink.flush()
    }

    /// Rows sealed into row groups so far
    pub fn rows_written(&self) -> u64 {
        self.total_rows_written
    }

    /// Close the writer, writing the footer
    pub fn close(mut self) -> Result<FileMetadata> {
        self.flush()?;

        let metadata = FileMetadata {
            version: FORMAT_VERSION,
            schema: self.schema,
            num_rows: self.total_rows_written,
            row_groups: self.row_groups,
            key_value_metadata: self
                .options
                .key_value_metadata
                .into_iter()
                .map(|(k, v)| (k, Some(v)))
                .collect(),
            created_by: Some(self.options.created_by),
        };

        let footer = encode_footer(&metadata)?;
        self.sink.append(&footer)?;
        self.sink.append(&(footer.len() as u32).to_le_bytes())?;
        self.sink.append(MAGIC)?;
        self.sink.flush()?;

        debug!(
            row_groups = metadata.row_groups.len(),
            rows = metadata.num_rows,
            footer_len = footer.len(),
            file_len = self.sink.current_length(),
            "Wrote footer"
        );
        Ok(metadata)
    }
}
