//! File Receive (C9): the `{AwaitingHeader, Receiving}` state machine that
//! matches the DSPS file header incrementally and streams the declared
//! payload into a sink, validating CRC-32 if the header provided one (§4.7).

use std::io;

use ble_link_checksums::Crc32;
use ble_link_protocol::header::{HeaderMatch, try_match};

use crate::error::FileReceiveError;
use crate::io::ByteSink;

/// Which half of the state machine a [`FileReceive`] is in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReceiveState {
    /// Accumulating bytes into the rolling header buffer.
    AwaitingHeader,
    /// Streaming payload bytes into the sink.
    Receiving,
}

/// Outcome of feeding bytes into a [`FileReceive`].
pub struct FeedOutcome {
    /// Bytes written to the sink by this call (may be `0` while still
    /// accumulating the header).
    pub bytes_written: usize,
    /// Set once `bytes_received == size`: the file name and whether the
    /// computed CRC matched the declared one (`None` if no CRC was declared).
    pub finished: Option<(String, Option<bool>)>,
}

/// A file transfer being received over DSPS (§3 FileReceive, §4.7).
pub struct FileReceive {
    state: ReceiveState,
    header_buffer: Vec<u8>,
    name: String,
    declared_size: u64,
    expected_crc: Option<u32>,
    crc: Crc32,
    bytes_received: u64,
    sink: Option<Box<dyn ByteSink>>,
}

impl FileReceive {
    /// Builds a receiver awaiting its header.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ReceiveState::AwaitingHeader,
            header_buffer: Vec::new(),
            name: String::new(),
            declared_size: 0,
            expected_crc: None,
            crc: Crc32::new(),
            bytes_received: 0,
            sink: None,
        }
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> ReceiveState {
        self.state
    }

    /// Feeds `bytes` from one Server-TX notification into the state machine.
    ///
    /// `open_sink` is called exactly once, with the parsed file name, the
    /// instant the header is matched, to allocate the output sink (§9: this
    /// replaces the source device's Android-specific file APIs).
    pub fn feed(
        &mut self,
        bytes: &[u8],
        open_sink: impl FnOnce(&str) -> io::Result<Box<dyn ByteSink>>,
    ) -> Result<FeedOutcome, FileReceiveError> {
        match self.state {
            ReceiveState::AwaitingHeader => self.feed_header(bytes, open_sink),
            ReceiveState::Receiving => self.feed_payload(bytes),
        }
    }

    fn feed_header(
        &mut self,
        bytes: &[u8],
        open_sink: impl FnOnce(&str) -> io::Result<Box<dyn ByteSink>>,
    ) -> Result<FeedOutcome, FileReceiveError> {
        self.header_buffer.extend_from_slice(bytes);

        match try_match(&self.header_buffer) {
            HeaderMatch::Incomplete => Ok(FeedOutcome { bytes_written: 0, finished: None }),
            HeaderMatch::Invalid => {
                self.header_buffer.clear();
                Err(FileReceiveError::InvalidSize)
            }
            HeaderMatch::Matched(header) => {
                self.name = header.name;
                self.declared_size = header.size;
                self.expected_crc = header.crc;
                self.crc = Crc32::new();
                self.bytes_received = 0;
                let sink = open_sink(&self.name).map_err(FileReceiveError::Io)?;
                self.sink = Some(sink);
                self.state = ReceiveState::Receiving;

                let trailing = self.header_buffer[header.header_len..].to_vec();
                self.header_buffer.clear();
                if trailing.is_empty() {
                    Ok(FeedOutcome { bytes_written: 0, finished: None })
                } else {
                    self.feed_payload(&trailing)
                }
            }
        }
    }

    fn feed_payload(&mut self, bytes: &[u8]) -> Result<FeedOutcome, FileReceiveError> {
        let remaining = (self.declared_size - self.bytes_received) as usize;
        let take = bytes.len().min(remaining);
        let chunk = &bytes[..take];

        if let Some(sink) = self.sink.as_mut() {
            sink.write(chunk).map_err(FileReceiveError::Io)?;
        }
        self.crc.update(chunk);
        self.bytes_received += take as u64;

        let finished = if self.bytes_received >= self.declared_size {
            let ok = self.expected_crc.map(|expected| self.crc.finalize() == expected);
            self.state = ReceiveState::AwaitingHeader;
            Some((self.name.clone(), ok))
        } else {
            None
        };

        Ok(FeedOutcome { bytes_written: take, finished })
    }

    /// Bytes received toward the current (or just-finished) file.
    #[must_use]
    pub const fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// The declared size of the current (or just-finished) file.
    #[must_use]
    pub const fn declared_size(&self) -> u64 {
        self.declared_size
    }
}

impl Default for FileReceive {
    fn default() -> Self {
        Self::new()
    }
}
