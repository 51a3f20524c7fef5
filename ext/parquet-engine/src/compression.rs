//! Page compression on top of the codec implementations of the `parquet` crate.

use parquet::basic::Compression;
use parquet::compression::{create_codec, Codec, CodecOptionsBuilder};

use crate::error::{ParquetError, Result};

/// A reusable compressor/decompressor for one codec
pub struct PageCodec {
    compression: Compression,
    codec: Option<Box<dyn Codec>>,
    resolved: bool,
}

impl std::fmt::Debug for PageCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCodec")
            .field("compression", &self.compression)
            .finish()
    }
}

impl PageCodec {
    /// Resolve a codec, failing fast for codecs that cannot be used.
    pub fn new(compression: Compression) -> Result<Self> {
        let mut codec = Self::deferred(compression);
        codec.resolve()?;
        Ok(codec)
    }

    /// A codec that is resolved by its first use, so an unusable codec only
    /// fails once a page is actually compressed.
    pub fn deferred(compression: Compression) -> Self {
        Self {
            compression,
            codec: None,
            resolved: false,
        }
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    fn resolve(&mut self) -> Result<Option<&mut Box<dyn Codec>>> {
        if !self.resolved {
            let options = CodecOptionsBuilder::default().build();
            self.codec = create_codec(self.compression, &options)
                .map_err(|e| ParquetError::unsupported_codec(format!("{}: {}", self.compression, e)))?;
            self.resolved = true;
        }
        Ok(self.codec.as_mut())
    }

    pub fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        match self.resolve()? {
            None => Ok(input.to_vec()),
            Some(codec) => {
                let mut out = Vec::new();
                codec.compress(input, &mut out)?;
                Ok(out)
            }
        }
    }

    /// Decompress `input`, which must expand to exactly `uncompressed_size` bytes.
    pub fn decompress(&mut self, input: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
        let out = match self.resolve()? {
            None => input.to_vec(),
            // Empty pages carry no codec frame worth trusting
            Some(_) if uncompressed_size == 0 => Vec::new(),
            Some(codec) => {
                let mut out = Vec::with_capacity(uncompressed_size);
                codec.decompress(input, &mut out, Some(uncompressed_size))?;
                out
            }
        };
        if out.len() != uncompressed_size {
            return Err(ParquetError::invalid_file(format!(
                "{} page expanded to {} bytes, header declares {}",
                self.compression,
                out.len(),
                uncompressed_size
            )));
        }
        Ok(out)
    }
}

/// Compress `input` with `compression`.
pub fn compress(compression: Compression, input: &[u8]) -> Result<Vec<u8>> {
    PageCodec::new(compression)?.compress(input)
}

/// Reverse [`compress`], checking the expected output size.
pub fn decompress(compression: Compression, input: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
    PageCodec::new(compression)?.decompress(input, uncompressed_size)
}

/// Map a footer codec identifier onto a usable codec.
pub fn codec_from_thrift(codec: parquet::format::CompressionCodec) -> Result<Compression> {
    Compression::try_from(codec)
        .map_err(|_| ParquetError::unsupported_codec(format!("codec id {}", codec.0)))
}

/// Parse a codec name such as `snappy` or `zstd(3)`.
pub fn parse_codec(name: &str) -> Result<Compression> {
    name.parse::<Compression>()
        .map_err(|e| ParquetError::unsupported_codec(format!("{}: {}", name, e)))
}
