//! # Overview
//!
//! `ble_link_transport` defines the boundary between the CodeLess/DSPS engine
//! and a concrete BLE stack. The engine never touches a GATT client directly;
//! it enqueues [`GattOp`] values against the [`Transport`] trait and learns
//! the outcome, along with peer notifications, through [`TransportEvent`]
//! values delivered on whatever channel the embedder wires up.
//!
//! # Design
//!
//! [`Transport`] is intentionally narrow and non-blocking: every method
//! starts an operation and returns immediately, tagged with the [`OpId`] the
//! caller supplied so the eventual [`TransportEvent::Complete`] can be
//! matched back to the op that triggered it. This mirrors how a real GATT
//! client (service discovery, MTU negotiation, notifications) is driven from
//! callbacks rather than blocking calls.
//!
//! No concrete BLE implementation lives in this crate. [`ble_link_test_support`]
//! ships the only implementation, an in-memory fake used by the engine's own
//! test suite; real stacks (e.g. btleplug, a platform BLE bridge) implement
//! [`Transport`] outside this workspace.
//!
//! [`ble_link_test_support`]: https://docs.rs/ble-link-test-support

mod characteristic;
mod error;
mod op;
mod transport;

pub use characteristic::Characteristic;
pub use error::TransportOpError;
pub use op::{GattOp, GattOpKind, OpId, OpOutcome, Priority};
pub use transport::{Transport, TransportEvent};
