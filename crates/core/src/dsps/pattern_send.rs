//! Pattern Send (C8): a periodic counter-suffixed packet generator (§4.6).
//!
//! Convention decision (§9 Open Questions — pattern counter indexing): the
//! counter is 0-based and `sent_count` always reflects the suffix most
//! recently emitted, matching Scenario S4's observed sequence
//! `0000, 0001, …, 9999, 0000, 0001` starting from the very first packet.

use std::io;

use crate::io::{ByteSource, read_exact_from_source};

/// A periodic pattern-packet generator in progress.
pub struct PatternSend {
    prefix: Vec<u8>,
    digits: usize,
    trailer: Vec<u8>,
    period_ms: u64,
    counter: u64,
    pattern_max: u64,
    sent_count: u64,
    active: bool,
}

impl PatternSend {
    /// Builds a generator: loads a prefix block of
    /// `chunk_size - digits - trailer.len()` bytes from `prefix_source`, then
    /// emits `prefix || ascii_decimal(counter, digits) || trailer` once per
    /// [`Self::next_packet`] call, with `counter` wrapping modulo `10^digits`.
    pub fn new(
        prefix_source: &mut dyn ByteSource,
        chunk_size: usize,
        digits: usize,
        trailer: Vec<u8>,
        period_ms: u64,
    ) -> io::Result<Self> {
        let prefix_len = chunk_size.checked_sub(digits + trailer.len()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "chunk_size too small for digits + trailer")
        })?;
        let prefix = read_exact_from_source(prefix_source, prefix_len)?;
        let pattern_max = 10u64.checked_pow(u32::try_from(digits).unwrap_or(u32::MAX)).unwrap_or(u64::MAX);
        Ok(Self {
            prefix,
            digits,
            trailer,
            period_ms,
            counter: 0,
            pattern_max,
            sent_count: 0,
            active: true,
        })
    }

    /// The configured timer period.
    #[must_use]
    pub const fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// The suffix value most recently emitted by [`Self::next_packet`].
    #[must_use]
    pub const fn sent_count(&self) -> u64 {
        self.sent_count
    }

    /// Whether the generator is still running (not [`Self::stop`]ped).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Produces the next packet and advances the counter.
    pub fn next_packet(&mut self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(self.prefix.len() + self.digits + self.trailer.len());
        packet.extend_from_slice(&self.prefix);
        packet.extend(format!("{:0width$}", self.counter, width = self.digits).into_bytes());
        packet.extend_from_slice(&self.trailer);

        self.sent_count = self.counter;
        self.counter = (self.counter + 1) % self.pattern_max;
        packet
    }

    /// Stops the generator; idempotent.
    pub fn stop(&mut self) {
        self.active = false;
    }
}
