//! # Overview
//!
//! `ble_link_protocol` implements the wire-level rules for both protocols
//! carried over the CodeLess/DSPS GATT service pair:
//!
//! - [`codeless`] frames outgoing AT-style command text and decodes incoming
//!   text into lines, matching upstream CodeLess byte-for-byte (US-ASCII,
//!   configurable line terminator, optional trailing NUL).
//! - [`header`] parses the DSPS file-receive header (`Name: … Size: … [CRC:
//!   …] END`/NUL) out of a growing byte buffer, incrementally, the way bytes
//!   actually arrive off a GATT notification stream.
//!
//! # Design
//!
//! Neither module depends on an async runtime or on the [`ble_link_transport`]
//! trait: this crate is pure parsing/framing logic, callable from a
//! synchronous test as easily as from the engine's event loop.
//!
//! # Invariants
//!
//! - [`codeless::decode_lines`] never panics on arbitrary bytes; invalid
//!   US-ASCII is replaced byte-for-byte via [`u8::is_ascii`] filtering rather
//!   than failing the whole decode.
//! - [`header::try_match`] is a pure function of its input buffer: calling it
//!   twice with the same bytes returns the same [`header::HeaderMatch`].
//!
//! [`ble_link_transport`]: https://docs.rs/ble-link-transport

pub mod codeless;
pub mod header;
