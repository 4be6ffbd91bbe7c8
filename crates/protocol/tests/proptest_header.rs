//! Proptest-based fuzz coverage for the DSPS file-receive header parser.
//!
//! `try_match` runs over untrusted bytes arriving off the wire one
//! notification at a time, so it must never panic regardless of what has
//! accumulated in the buffer so far — complete garbage, a truncated prefix,
//! or a header whose fields are individually well-formed but assembled in
//! an unexpected way.

use ble_link_protocol::header::{HeaderMatch, try_match};
use proptest::prelude::*;

fn arbitrary_bytes(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

mod arbitrary_input {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        /// try_match must not panic on any byte sequence, matched or not.
        #[test]
        fn try_match_never_panics(data in arbitrary_bytes(256)) {
            let _ = try_match(&data);
        }

        /// Feeding the same buffer one extra byte at a time must not panic,
        /// mirroring how bytes actually arrive off the wire.
        #[test]
        fn incremental_feed_never_panics(data in arbitrary_bytes(256)) {
            let mut buffer = Vec::new();
            for &byte in &data {
                buffer.push(byte);
                match try_match(&buffer) {
                    HeaderMatch::Invalid => break,
                    HeaderMatch::Matched(_) | HeaderMatch::Incomplete => {}
                }
            }
        }

        /// A buffer that exceeds the prelude budget without ever containing
        /// a `name:` marker is always rejected, never left `Incomplete`.
        #[test]
        fn long_noise_without_marker_is_invalid(
            noise in prop::collection::vec(1u8..=255u8, 120..=256),
        ) {
            // Keep every byte outside 'n'/'N' so no partial "name:" marker
            // can be lurking at the tail of the window.
            let filtered: Vec<u8> = noise
                .into_iter()
                .map(|b| if b == b'n' || b == b'N' { b'x' } else { b })
                .collect();
            prop_assert_eq!(try_match(&filtered), HeaderMatch::Invalid);
        }
    }
}

mod matched_roundtrip {
    use super::*;

    fn hex8(value: u32) -> String {
        format!("{value:08x}")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// A well-formed header with an `END` terminator always matches and
        /// reports the exact fields that were written, regardless of name
        /// and size chosen within the grammar's limits.
        #[test]
        fn well_formed_header_matches(
            name in "[A-Za-z0-9_.-]{1,32}",
            size in 0u64..=999_999_999u64,
            crc in any::<u32>(),
            trailing in arbitrary_bytes(16),
        ) {
            let mut buffer = format!("Name: {name} Size: {size} CRC: {} END ", hex8(crc)).into_bytes();
            buffer.extend_from_slice(&trailing);

            match try_match(&buffer) {
                HeaderMatch::Matched(header) => {
                    prop_assert_eq!(header.name, name);
                    prop_assert_eq!(header.size, size);
                    prop_assert_eq!(header.crc, Some(crc));
                    prop_assert_eq!(&buffer[header.header_len..], trailing.as_slice());
                }
                other => prop_assert!(false, "expected a match, got {other:?}"),
            }
        }

        /// Same as above but without the optional CRC field.
        #[test]
        fn well_formed_header_without_crc_matches(
            name in "[A-Za-z0-9_.-]{1,32}",
            size in 0u64..=999_999_999u64,
        ) {
            let buffer = format!("Name: {name} Size: {size} END ").into_bytes();
            match try_match(&buffer) {
                HeaderMatch::Matched(header) => {
                    prop_assert_eq!(header.name, name);
                    prop_assert_eq!(header.size, size);
                    prop_assert_eq!(header.crc, None);
                }
                other => prop_assert!(false, "expected a match, got {other:?}"),
            }
        }
    }
}
