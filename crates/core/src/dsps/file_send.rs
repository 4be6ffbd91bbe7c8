//! File Send (C7): splits a [`ByteSource`] into chunks and feeds them out
//! either all at once (low priority) or one per timer tick, per §4.5.

use std::io;

use crate::io::ByteSource;

/// A chunked file transfer in progress.
pub struct FileSend {
    source: Box<dyn ByteSource>,
    chunk_size: usize,
    total_chunks: usize,
    sent_chunks: usize,
    period_ms: u64,
    complete: bool,
}

impl FileSend {
    /// Builds a `FileSend` over `source`, chunked at `chunk_size` bytes.
    ///
    /// `period_ms == 0` means all chunks should be enqueued at once (low
    /// priority); otherwise a timer should call [`Self::next_chunk`] once per
    /// tick.
    pub fn new(source: Box<dyn ByteSource>, chunk_size: usize, period_ms: u64) -> io::Result<Self> {
        let len = source.len()?;
        let total_chunks = len.div_ceil(chunk_size.max(1) as u64) as usize;
        Ok(Self {
            source,
            chunk_size: chunk_size.max(1),
            total_chunks,
            sent_chunks: 0,
            period_ms,
            complete: total_chunks == 0,
        })
    }

    /// Total number of chunks this file will be split into.
    #[must_use]
    pub const fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    /// Number of chunks sent so far.
    #[must_use]
    pub const fn sent_chunks(&self) -> usize {
        self.sent_chunks
    }

    /// The configured per-tick period; `0` means "enqueue everything at once".
    #[must_use]
    pub const fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Whether every chunk has been produced.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Reads and returns the next chunk, updating progress counters.
    ///
    /// Intended to run from the GATT op's `on_execute` hook (§3), so
    /// progress reflects the moment the write actually leaves the queue.
    /// Returns `Ok(None)` once the source is exhausted.
    pub fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.complete {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            let read = self.source.read(&mut buf[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        if filled == 0 {
            self.complete = true;
            return Ok(None);
        }
        buf.truncate(filled);
        self.sent_chunks += 1;
        if self.sent_chunks >= self.total_chunks {
            self.complete = true;
        }
        Ok(Some(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemorySource;

    #[test]
    fn splits_into_ceiling_chunks() {
        let mut send = FileSend::new(Box::new(MemorySource::new(vec![0u8; 10])), 3, 0).unwrap();
        assert_eq!(send.total_chunks(), 4);

        let mut sizes = Vec::new();
        while let Some(chunk) = send.next_chunk().unwrap() {
            sizes.push(chunk.len());
        }
        assert_eq!(sizes, vec![3, 3, 3, 1]);
        assert!(send.is_complete());
        assert_eq!(send.sent_chunks(), 4);
    }

    #[test]
    fn empty_source_is_immediately_complete() {
        let send = FileSend::new(Box::new(MemorySource::new(Vec::new())), 10, 0).unwrap();
        assert!(send.is_complete());
        assert_eq!(send.total_chunks(), 0);
    }
}
