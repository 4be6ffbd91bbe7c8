//! # Overview
//!
//! `ble_link_checksums` provides the CRC-32 digest used to validate DSPS
//! file-receive transfers. The algorithm is byte-for-byte compatible with the
//! standard "CRC-32" used by zlib (IEEE 802.3 / ISO 3309 polynomial, reflected
//! input and output, initial value `0xFFFF_FFFF`, final XOR `0xFFFF_FFFF`), so
//! a digest computed here matches whatever the peer device embeds in a DSPS
//! file header.
//!
//! # Design
//!
//! [`Crc32`] accumulates bytes incrementally, mirroring the shape of a
//! streaming hasher: bytes arrive as they are read off the wire, well before
//! the declared size is known to be correct, so the digest has to update one
//! chunk at a time rather than hash a complete buffer.
//!
//! # Invariants
//!
//! - [`Crc32::update`] never panics and accepts any slice length, including
//!   zero.
//! - [`Crc32::finalize`] is idempotent: calling it multiple times without an
//!   intervening `update` returns the same value.
//!
//! # Examples
//!
//! ```
//! use ble_link_checksums::Crc32;
//!
//! let mut crc = Crc32::new();
//! crc.update(b"1234");
//! assert_eq!(crc.finalize(), 0x9BE3_E0A3);
//! ```

mod crc32;

pub use crc32::Crc32;
