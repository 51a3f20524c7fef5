//! Value and level encodings of the container format.

pub mod bit_util;
pub mod dictionary;
pub mod plain;
pub mod rle;

use crate::error::{ParquetError, Result};

/// Encodings this engine reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Plain,
    PlainDictionary,
    Rle,
    RleDictionary,
}

impl Encoding {
    pub fn to_thrift(self) -> parquet::format::Encoding {
        use parquet::format::Encoding as E;
        match self {
            Encoding::Plain => E::PLAIN,
            Encoding::PlainDictionary => E::PLAIN_DICTIONARY,
            Encoding::Rle => E::RLE,
            Encoding::RleDictionary => E::RLE_DICTIONARY,
        }
    }

    pub fn from_thrift(encoding: parquet::format::Encoding) -> Result<Self> {
        use parquet::format::Encoding as E;
        match encoding {
            E::PLAIN => Ok(Encoding::Plain),
            E::PLAIN_DICTIONARY => Ok(Encoding::PlainDictionary),
            E::RLE => Ok(Encoding::Rle),
            E::RLE_DICTIONARY => Ok(Encoding::RleDictionary),
            other => Err(ParquetError::unsupported_encoding(format!("{:?}", other))),
        }
    }

    /// Whether data page values are dictionary indices
    pub fn is_dictionary(self) -> bool {
        matches!(self, Encoding::PlainDictionary | Encoding::RleDictionary)
    }
}
