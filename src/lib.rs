//! # Overview
//!
//! `ble_link` is the top-level facade over the workspace: it re-exports the
//! session engine from [`ble_link_core`] together with the wire-level and
//! transport crates most callers need, so a consumer can depend on this one
//! crate instead of assembling the workspace members itself.
//!
//! # Design
//!
//! All real logic lives in [`ble_link_core`]; this crate adds no behavior of
//! its own. See that crate's documentation for the session engine, and
//! [`ble_link_transport`]/[`ble_link_protocol`] for the traits a concrete BLE
//! stack implements and the wire framing it carries.

pub use ble_link_checksums as checksums;
pub use ble_link_core::*;
pub use ble_link_protocol as protocol;
pub use ble_link_transport as transport;
