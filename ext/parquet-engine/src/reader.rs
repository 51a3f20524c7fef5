//! Core Parquet reading functionality

use crate::dremel::RecordAssembler;
use crate::io::{ByteSource, FileSource};
use crate::metadata::{read_footer, FileMetadata};
use crate::row_group::RowGroupReader;
use crate::{ParquetError, ParquetValue, Result, Schema};
use std::path::Path;
use tracing::trace;

/// Core Parquet reader over any random-access byte source
///
/// The footer is parsed once in [`Reader::new`]. Reads never mutate the
/// source, so a reader can be shared across threads.
#[derive(Debug, Clone)]
pub struct Reader<S> {
    source: S,
    metadata: FileMetadata,
}

impl Reader<FileSource> {
    /// Open the file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(FileSource::new(path)?)
    }
}

impl<S: ByteSource> Reader<S> {
    /// Create a new reader, validating the magic bytes and parsing the footer
    pub fn new(source: S) -> Result<Self> {
        let metadata = read_footer(&source)?;
        Ok(Self { source, metadata })
    }

    /// Get the Parquet file metadata
    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    pub fn schema(&self) -> &Schema {
        &self.metadata.schema
    }

    pub fn num_rows(&self) -> u64 {
        self.metadata.num_rows
    }

    pub fn num_row_groups(&self) -> usize {
        self.metadata.row_groups.len()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Reader for the row group at `index`
    pub fn row_group(&self, index: usize) -> Result<RowGroupReader<'_, S>> {
        let descriptor = self.metadata.row_groups.get(index).ok_or_else(|| {
            ParquetError::invalid_argument(format!(
                "row group {} out of range, file has {}",
                index,
                self.num_row_groups()
            ))
        })?;
        RowGroupReader::new(&self.source, &self.metadata.schema, descriptor)
    }

    /// Read rows from the Parquet file
    ///
    /// Returns an iterator over rows where each row is a vector of ParquetValues.
    /// Row groups are decoded one at a time as the iterator advances.
    pub fn read_rows(&self) -> RowIter<'_, S> {
        RowIter::new(self, (0..self.schema().fields().len()).collect())
    }

    /// Read rows with column projection
    ///
    /// Only the leaves under the named top-level fields are decoded. Fields
    /// come back in schema order regardless of the order requested.
    pub fn read_rows_with_projection(&self, columns: &[String]) -> Result<RowIter<'_, S>> {
        let mut fields = Vec::with_capacity(columns.len());
        for name in columns {
            let index = self.schema().field_index(name).ok_or_else(|| {
                ParquetError::invalid_argument(format!("Unknown column: {}", name))
            })?;
            fields.push(index);
        }
        fields.sort_unstable();
        fields.dedup();
        Ok(RowIter::new(self, fields))
    }
}

/// Lazy row iterator across all row groups of a file
///
/// Stops after the first error.
pub struct RowIter<'a, S> {
    reader: &'a Reader<S>,
    fields: Vec<usize>,
    next_row_group: usize,
    current: Option<RecordAssembler>,
    finished: bool,
}

impl<'a, S: ByteSource> RowIter<'a, S> {
    fn new(reader: &'a Reader<S>, fields: Vec<usize>) -> Self {
        Self {
            reader,
            fields,
            next_row_group: 0,
            current: None,
            finished: false,
        }
    }

    /// Top-level field indices each row carries
    pub fn fields(&self) -> &[usize] {
        &self.fields
    }

    fn advance(&mut self) -> Result<Option<Vec<ParquetValue>>> {
        loop {
            if let Some(assembler) = self.current.as_mut() {
                if let Some(row) = assembler.next_record()? {
                    return Ok(Some(row));
                }
                self.current = None;
            }
            if self.next_row_group >= self.reader.num_row_groups() {
                return Ok(None);
            }
            let index = self.next_row_group;
            self.next_row_group += 1;
            let row_group = self.reader.row_group(index)?;
            trace!(row_group = index, rows = row_group.num_rows(), "Reading row group");
            self.current = Some(row_group.rows_with_projection(&self.fields)?);
        }
    }
}

impl<S: ByteSource> Iterator for RowIter<'_, S> {
    type Item = Result<Vec<ParquetValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.advance() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
