//! Byte stores the engine reads from and appends to.
//!
//! Reading is offset-addressed and never mutates the source, so a single
//! source can be shared by any number of concurrent readers. Writing is
//! append-only.

use bytes::Bytes;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ParquetError, Result};

/// Random-access, read-only byte store
pub trait ByteSource: Send + Sync {
    /// Total length in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read exactly `length` bytes at `offset`.
    ///
    /// A range running past the end fails with [`ParquetError::TruncatedInput`].
    fn read(&self, offset: u64, length: usize) -> Result<Bytes>;
}

fn check_range(offset: u64, length: usize, total: u64) -> Result<()> {
    if offset.saturating_add(length as u64) > total {
        return Err(ParquetError::truncated(
            offset,
            length as u64,
            total.saturating_sub(offset),
        ));
    }
    Ok(())
}

impl ByteSource for Bytes {
    fn len(&self) -> u64 {
        Bytes::len(self) as u64
    }

    fn read(&self, offset: u64, length: usize) -> Result<Bytes> {
        check_range(offset, length, ByteSource::len(self))?;
        let start = offset as usize;
        Ok(self.slice(start..start + length))
    }
}

impl ByteSource for Vec<u8> {
    fn len(&self) -> u64 {
        Vec::len(self) as u64
    }

    fn read(&self, offset: u64, length: usize) -> Result<Bytes> {
        check_range(offset, length, ByteSource::len(self))?;
        let start = offset as usize;
        Ok(Bytes::copy_from_slice(&self[start..start + length]))
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Arc<S> {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn read(&self, offset: u64, length: usize) -> Result<Bytes> {
        (**self).read(offset, length)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &S {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn read(&self, offset: u64, length: usize) -> Result<Bytes> {
        (**self).read(offset, length)
    }
}

/// File-backed source that opens the file for every read
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    file_len: u64,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        Ok(FileSource { path, file_len })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.file_len
    }

    fn read(&self, offset: u64, length: usize) -> Result<Bytes> {
        check_range(offset, length, self.file_len)?;
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buf = vec![0; length];
        file.read_exact(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ParquetError::truncated(offset, length as u64, 0)
            } else {
                ParquetError::Io(e)
            }
        })?;
        Ok(Bytes::from(buf))
    }
}

/// Append-only byte sink
pub trait ByteSink {
    /// Append `bytes`, returning the offset they start at
    fn append(&mut self, bytes: &[u8]) -> Result<u64>;

    /// Number of bytes appended so far
    fn current_length(&self) -> u64;
}

/// Wraps any [`Write`] and tracks how many bytes went through it
#[derive(Debug)]
pub struct TrackedWrite<W: Write> {
    inner: W,
    bytes_written: u64,
}

impl<W: Write> TrackedWrite<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink for TrackedWrite<W> {
    fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.bytes_written;
        self.inner.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(offset)
    }

    fn current_length(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_source() {
        let source = Bytes::from_static(b"PAR1data");
        assert_eq!(ByteSource::len(&source), 8);
        assert_eq!(source.read(4, 4).unwrap(), Bytes::from_static(b"data"));
        assert!(matches!(
            source.read(6, 4),
            Err(ParquetError::TruncatedInput {
                offset: 6,
                expected: 4,
                available: 2
            })
        ));
    }

    #[test]
    fn test_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let source = FileSource::new(file.path()).unwrap();
        assert_eq!(source.len(), 10);
        assert_eq!(source.read(3, 3).unwrap(), Bytes::from_static(b"345"));
        assert!(source.read(8, 3).is_err());
    }

    #[test]
    fn test_tracked_write() {
        let mut sink = TrackedWrite::new(Vec::new());
        assert_eq!(sink.append(b"PAR1").unwrap(), 0);
        assert_eq!(sink.append(b"abc").unwrap(), 4);
        assert_eq!(sink.current_length(), 7);
        assert_eq!(sink.into_inner(), b"PAR1abc".to_vec());
    }
}
