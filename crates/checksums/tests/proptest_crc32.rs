//! Proptest-based property coverage for the streaming CRC-32 digest.
//!
//! The digest is fed payload bytes as they arrive off the wire, in whatever
//! chunk sizes the transport happens to deliver, so the core property that
//! matters is that the incremental accumulator agrees with a one-shot digest
//! no matter how the same bytes are split across `update` calls.

use ble_link_checksums::Crc32;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Crc32::of over the whole buffer matches an incremental digest fed the
    /// same bytes split at an arbitrary point.
    #[test]
    fn incremental_matches_one_shot_at_any_split(
        data in prop::collection::vec(any::<u8>(), 0..=512),
        split in 0usize..=512,
    ) {
        let split = split.min(data.len());
        let one_shot = Crc32::of(&data);

        let mut incremental = Crc32::new();
        incremental.update(&data[..split]);
        incremental.update(&data[split..]);
        prop_assert_eq!(incremental.finalize(), one_shot);
    }

    /// Splitting into arbitrarily many pieces (one `update` per byte) still
    /// agrees with the one-shot digest.
    #[test]
    fn incremental_matches_one_shot_byte_by_byte(
        data in prop::collection::vec(any::<u8>(), 0..=256),
    ) {
        let one_shot = Crc32::of(&data);

        let mut incremental = Crc32::new();
        for byte in &data {
            incremental.update(std::slice::from_ref(byte));
        }
        prop_assert_eq!(incremental.finalize(), one_shot);
    }

    /// finalize() never mutates state: calling it repeatedly between updates
    /// returns the same value, and a later update still produces the same
    /// result as if finalize() had never been called in between.
    #[test]
    fn finalize_does_not_consume_state(
        first in prop::collection::vec(any::<u8>(), 0..=128),
        second in prop::collection::vec(any::<u8>(), 0..=128),
    ) {
        let mut crc = Crc32::new();
        crc.update(&first);
        let peek = crc.finalize();
        prop_assert_eq!(peek, crc.finalize());
        crc.update(&second);

        let mut combined = Vec::with_capacity(first.len() + second.len());
        combined.extend_from_slice(&first);
        combined.extend_from_slice(&second);
        prop_assert_eq!(crc.finalize(), Crc32::of(&combined));
    }
}
