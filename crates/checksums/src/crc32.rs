const POLYNOMIAL: u32 = 0xEDB8_8320;

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut byte = 0usize;
    while byte < 256 {
        let mut crc = byte as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[byte] = crc;
        byte += 1;
    }
    table
}

static TABLE: [u32; 256] = build_table();

/// Streaming CRC-32 digest (IEEE 802.3 / ISO 3309, the "zlib" CRC-32).
///
/// Mirrors the accumulator shape of a classic rolling-checksum implementation:
/// state is carried across calls to [`update`](Self::update) so bytes can be
/// fed in as they arrive off the wire, rather than requiring the full buffer
/// up front.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Crc32 {
    state: u32,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    /// Creates a fresh digest in its initial state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: 0xFFFF_FFFF,
        }
    }

    /// Feeds additional bytes into the digest.
    ///
    /// # Examples
    ///
    /// ```
    /// use ble_link_checksums::Crc32;
    ///
    /// let mut crc = Crc32::new();
    /// crc.update(b"12");
    /// crc.update(b"34");
    /// assert_eq!(crc.finalize(), 0x9BE3_E0A3);
    /// ```
    pub fn update(&mut self, bytes: &[u8]) {
        let mut state = self.state;
        for &byte in bytes {
            let index = ((state ^ u32::from(byte)) & 0xFF) as usize;
            state = (state >> 8) ^ TABLE[index];
        }
        self.state = state;
    }

    /// Returns the digest of all bytes observed so far.
    ///
    /// Calling this repeatedly without an intervening [`update`](Self::update)
    /// returns the same value; it does not consume or reset the accumulator.
    #[must_use]
    pub const fn finalize(&self) -> u32 {
        self.state ^ 0xFFFF_FFFF
    }

    /// Convenience one-shot digest over a complete byte slice.
    #[must_use]
    pub fn of(bytes: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(bytes);
        crc.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::Crc32;

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(Crc32::of(b""), 0);
    }

    #[test]
    fn known_vector_1234() {
        assert_eq!(Crc32::of(b"1234"), 0x9BE3_E0A3);
    }

    #[test]
    fn known_vector_check_string() {
        // Standard CRC-32 check value for the nine ASCII bytes "123456789".
        assert_eq!(Crc32::of(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let one_shot = Crc32::of(b"the quick brown fox");
        let mut incremental = Crc32::new();
        incremental.update(b"the quick ");
        incremental.update(b"brown fox");
        assert_eq!(incremental.finalize(), one_shot);
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut crc = Crc32::new();
        crc.update(b"abc");
        assert_eq!(crc.finalize(), crc.finalize());
    }
}
