//! DSPS Engine (C6): binary stream chunking, RX notification handling, and
//! flow control (§4.4). Owns no transport/scheduler state directly — it
//! decides what should happen and the session carries it out, mirroring how
//! the CodeLess engine stays pure.

pub mod file_receive;
pub mod file_send;
pub mod pattern_send;

use std::collections::VecDeque;

/// XON: resume transmission.
pub const FLOW_XON: u8 = 0x01;
/// XOFF: pause transmission.
pub const FLOW_XOFF: u8 = 0x02;

/// What `DspsEngine::send` decided to do with one logical payload.
pub struct SendOutcome {
    /// Chunks ready to enqueue onto the transport now (TX flow was on).
    pub to_enqueue: Vec<Vec<u8>>,
    /// Chunks that could not be sent or buffered and were dropped (pending
    /// buffer was full while TX flow was off).
    pub dropped_chunks: usize,
}

/// What arrived on the Server-TX notification, and what the session should
/// do with it (§4.4 RX).
pub struct RxOutcome {
    /// The raw bytes received.
    pub data: Vec<u8>,
    /// Bytes to echo back, if echo is enabled.
    pub echo: Option<Vec<u8>>,
}

/// Chunking, pending-buffer, and flow-control state for the DSPS protocol.
pub struct DspsEngine {
    chunk_size: usize,
    pending_buffer: VecDeque<Vec<u8>>,
    pending_max: usize,
    tx_flow_on: bool,
    echo: bool,
}

impl DspsEngine {
    /// Builds an engine with the given initial chunk size, pending-buffer
    /// cap, and RX echo setting. TX flow starts on (the peer has not yet
    /// sent an XOFF).
    #[must_use]
    pub fn new(chunk_size: usize, pending_max: usize, echo: bool) -> Self {
        Self {
            chunk_size,
            pending_buffer: VecDeque::new(),
            pending_max,
            tx_flow_on: true,
            echo,
        }
    }

    /// The current chunk size ceiling.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Raises (or lowers) the chunk size, e.g. after an MTU change.
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size;
    }

    /// Whether TX flow is currently on (the peer has not asserted XOFF).
    #[must_use]
    pub const fn tx_flow_on(&self) -> bool {
        self.tx_flow_on
    }

    /// Number of chunks currently held in the pending buffer.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending_buffer.len()
    }

    /// Splits `bytes` into chunks no larger than `min(chunk_size, self.chunk_size)`
    /// and, for each, either queues it for immediate send or buffers/drops it
    /// per current TX flow state (§4.4 TX).
    pub fn send(&mut self, bytes: &[u8], chunk_size: usize) -> SendOutcome {
        let effective = chunk_size.min(self.chunk_size).max(1);
        let mut to_enqueue = Vec::new();
        let mut dropped_chunks = 0;

        for chunk in bytes.chunks(effective) {
            if self.tx_flow_on {
                to_enqueue.push(chunk.to_vec());
            } else if self.pending_buffer.len() < self.pending_max {
                self.pending_buffer.push_back(chunk.to_vec());
            } else {
                dropped_chunks += 1;
                tracing::warn!(pending_max = self.pending_max, "dropping DSPS chunk: pending buffer full while TX flow is off");
            }
        }

        SendOutcome { to_enqueue, dropped_chunks }
    }

    /// Applies a flow-control notification byte from the peer's DSPS Flow
    /// characteristic. Returns `Some(now_on)` if TX flow changed state.
    pub fn on_flow_notification(&mut self, byte: u8) -> Option<bool> {
        let now_on = match byte {
            FLOW_XON => true,
            FLOW_XOFF => false,
            _ => return None,
        };
        if now_on == self.tx_flow_on {
            return None;
        }
        self.tx_flow_on = now_on;
        Some(now_on)
    }

    /// Removes every buffered chunk and returns them in order, to be
    /// re-enqueued once TX flow resumes (§4.4 `resume_dsps`).
    pub fn take_pending(&mut self) -> Vec<Vec<u8>> {
        self.pending_buffer.drain(..).collect()
    }

    /// Pushes already-chunked payloads back onto the front of the pending
    /// buffer, in order, ahead of anything buffered since. Used by
    /// `pause_dsps(keep=true)` to restore chunks pulled off the GATT queue
    /// (§4.4) without re-splitting them.
    pub fn requeue_front(&mut self, chunks: Vec<Vec<u8>>) {
        for chunk in chunks.into_iter().rev() {
            self.pending_buffer.push_front(chunk);
        }
    }

    /// Handles a Server-TX notification: optionally echoes the bytes back.
    #[must_use]
    pub fn on_notification(&self, data: Vec<u8>) -> RxOutcome {
        let echo = self.echo.then(|| data.clone());
        RxOutcome { data, echo }
    }

    /// Payload to write to the Flow characteristic to request `on` (XON) or
    /// pause (XOFF) the peer's TX.
    #[must_use]
    pub const fn flow_payload(on: bool) -> [u8; 1] {
        [if on { FLOW_XON } else { FLOW_XOFF }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_clamps_to_configured_chunk_size() {
        let mut engine = DspsEngine::new(4, 8, false);
        let outcome = engine.send(&[0u8; 10], 100);
        assert_eq!(outcome.to_enqueue.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 2]);
    }

    #[test]
    fn xoff_buffers_then_xon_releases_for_resume() {
        let mut engine = DspsEngine::new(4, 8, false);
        engine.on_flow_notification(FLOW_XOFF);
        let outcome = engine.send(&[0u8; 8], 4);
        assert!(outcome.to_enqueue.is_empty());
        assert_eq!(engine.pending_len(), 2);

        let changed = engine.on_flow_notification(FLOW_XON);
        assert_eq!(changed, Some(true));
        let pending = engine.take_pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(engine.pending_len(), 0);
    }

    #[test]
    fn pending_buffer_full_drops_with_diagnostic() {
        let mut engine = DspsEngine::new(4, 1, false);
        engine.on_flow_notification(FLOW_XOFF);
        let outcome = engine.send(&[0u8; 8], 4);
        assert_eq!(outcome.dropped_chunks, 1);
        assert_eq!(engine.pending_len(), 1);
    }

    #[test]
    fn echo_reflects_received_bytes() {
        let engine = DspsEngine::new(20, 8, true);
        let outcome = engine.on_notification(vec![1, 2, 3]);
        assert_eq!(outcome.echo, Some(vec![1, 2, 3]));
    }
}
