//! Encoded pages as they are laid out inside a column chunk.

use bytes::Bytes;
use parquet::format::{
    DataPageHeader, DictionaryPageHeader, PageEncodingStats, PageHeader, PageType,
};

use crate::encoding::Encoding;
use crate::error::{ParquetError, Result};
use crate::metadata::write_thrift;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Dictionary,
    Data,
}

/// One compressed page plus the facts its header records
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub kind: PageKind,
    /// Value encoding; levels of data pages are always RLE
    pub encoding: Encoding,
    /// Dictionary entries, or level triples for data pages
    pub num_values: usize,
    pub uncompressed_size: usize,
    /// Compressed payload
    pub data: Bytes,
}

impl Page {
    pub fn compressed_size(&self) -> usize {
        self.data.len()
    }

    pub fn to_thrift(&self) -> Result<PageHeader> {
        let num_values = header_field(self.num_values, "value count")?;
        let (page_type, data_header, dictionary_header) = match self.kind {
            PageKind::Dictionary => (
                PageType::DICTIONARY_PAGE,
                None,
                Some(DictionaryPageHeader {
                    num_values,
                    encoding: self.encoding.to_thrift(),
                    is_sorted: None,
                }),
            ),
            PageKind::Data => (
                PageType::DATA_PAGE,
                Some(DataPageHeader {
                    num_values,
                    encoding: self.encoding.to_thrift(),
                    definition_level_encoding: Encoding::Rle.to_thrift(),
                    repetition_level_encoding: Encoding::Rle.to_thrift(),
                    statistics: None,
                }),
                None,
            ),
        };
        Ok(PageHeader {
            type_: page_type,
            uncompressed_page_size: header_field(self.uncompressed_size, "uncompressed size")?,
            compressed_page_size: header_field(self.compressed_size(), "compressed size")?,
            crc: None,
            data_page_header: data_header,
            index_page_header: None,
            dictionary_page_header: dictionary_header,
            data_page_header_v2: None,
        })
    }

    /// Serialized header followed by the payload
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = write_thrift(&self.to_thrift()?)?;
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}

/// Page header fields are i32 in the format
fn header_field(value: usize, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| {
        ParquetError::invalid_argument(format!("page {} {} does not fit a page header", what, value))
    })
}

/// The pages of one column chunk: at most one dictionary page, then data pages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSet {
    pub dictionary_page: Option<Page>,
    pub data_pages: Vec<Page>,
}

impl PageSet {
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.dictionary_page.iter().chain(&self.data_pages)
    }

    /// Distinct encodings used by the chunk, values first, levels last
    pub fn encodings(&self) -> Vec<Encoding> {
        let mut out = Vec::new();
        for page in self.pages() {
            if !out.contains(&page.encoding) {
                out.push(page.encoding);
            }
        }
        if !self.data_pages.is_empty() && !out.contains(&Encoding::Rle) {
            out.push(Encoding::Rle);
        }
        out
    }

    /// Page counts per (page type, encoding)
    pub fn encoding_stats(&self) -> Vec<PageEncodingStats> {
        let mut out: Vec<PageEncodingStats> = Vec::new();
        for page in self.pages() {
            let page_type = match page.kind {
                PageKind::Dictionary => PageType::DICTIONARY_PAGE,
                PageKind::Data => PageType::DATA_PAGE,
            };
            let encoding = page.encoding.to_thrift();
            match out
                .iter_mut()
                .find(|s| s.page_type == page_type && s.encoding == encoding)
            {
                Some(stats) => stats.count += 1,
                None => out.push(PageEncodingStats::new(page_type, encoding, 1)),
            }
        }
        out
    }
}
