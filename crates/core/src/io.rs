//! Byte source/sink abstraction (§6.7, §9) used by FileSend's chunk source,
//! PatternSend's prefix loader, and FileReceive's sink.
//!
//! The host application that originated this design read from Android's
//! `Uri`/`DocumentFile`/`ContentResolver` types; neither belongs in a
//! portable library, so every streaming operation here is expressed against
//! these two traits instead, with a `std::fs::File`-backed implementation
//! for desktop/host use.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A sequential, seekable byte source.
pub trait ByteSource: Send {
    /// Reads up to `buf.len()` bytes, returning the count actually read (`0`
    /// at end of stream), mirroring [`std::io::Read::read`].
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// The total length of the source, if known in advance.
    fn len(&self) -> io::Result<u64>;

    /// Whether the source is empty.
    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// A sequential byte sink.
pub trait ByteSink: Send {
    /// Writes `buf` in full, or returns an error.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Flushes any buffered bytes to the underlying medium.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A [`ByteSource`] reading from an open [`File`].
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    /// Opens `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    /// Wraps an already-open file, seeking it to the start.
    pub fn from_file(mut file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;
        Ok(Self { file, len })
    }
}

impl ByteSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.len)
    }
}

/// A [`ByteSink`] appending to a created [`File`].
pub struct FileSink {
    file: File,
}

impl FileSink {
    /// Creates (or truncates) `path` for writing.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self { file: File::create(path)? })
    }

    /// Wraps an already-open file.
    #[must_use]
    pub const fn from_file(file: File) -> Self {
        Self { file }
    }
}

impl ByteSink for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// A [`ByteSource`] over an in-memory byte slice, for pattern prefixes and
/// tests that have no need to touch the filesystem.
pub struct MemorySource {
    bytes: Vec<u8>,
    position: usize,
}

impl MemorySource {
    /// Wraps `bytes` as a source, starting at offset `0`.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, position: 0 }
    }
}

impl ByteSource for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.bytes[self.position..];
        let count = remaining.len().min(buf.len());
        buf[..count].copy_from_slice(&remaining[..count]);
        self.position += count;
        Ok(count)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.bytes.len() as u64)
    }
}

/// A [`ByteSink`] collecting written bytes in memory, for tests.
#[derive(Default)]
pub struct MemorySink {
    bytes: Vec<u8>,
}

impl MemorySink {
    /// Builds an empty sink.
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// The bytes written so far.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl ByteSink for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }
}

/// Reads an entire [`ByteSource`] into memory, used by PatternSend to load
/// its fixed-length prefix block.
pub fn read_exact_from_source(source: &mut dyn ByteSource, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let read = source.read(&mut buf[filled..])?;
        if read == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "source shorter than requested length"));
        }
        filled += read;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_reads_then_reports_eof() {
        let mut source = MemorySource::new(vec![1, 2, 3]);
        let mut buf = [0u8; 2];
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(source.read(&mut buf).unwrap(), 1);
        assert_eq!(source.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn memory_sink_accumulates_writes() {
        let mut sink = MemorySink::new();
        sink.write(b"ab").unwrap();
        sink.write(b"cd").unwrap();
        assert_eq!(sink.into_bytes(), b"abcd");
    }

    #[test]
    fn read_exact_from_source_errors_when_too_short() {
        let mut source = MemorySource::new(vec![1, 2]);
        assert!(read_exact_from_source(&mut source, 5).is_err());
    }

    #[test]
    fn file_source_and_sink_round_trip() {
        let temp = ble_link_test_support::temp_file_with_contents(b"payload");
        let mut source = FileSource::open(temp.path()).unwrap();
        assert_eq!(source.len().unwrap(), 7);
        let mut buf = [0u8; 7];
        assert_eq!(source.read(&mut buf).unwrap(), 7);
        assert_eq!(&buf, b"payload");
    }
}
