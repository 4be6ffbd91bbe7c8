//! # Overview
//!
//! `ble_link_core` is the session engine sitting behind the top-level
//! `ble-link` crate: it owns every stateful piece of the CodeLess/DSPS link
//! other than the transport itself.
//!
//! - [`scheduler`] serializes every GATT operation the session issues.
//! - [`mode`] tracks the Command/Binary exclusivity rule and drives the
//!   BINREQ/BINREQACK/BINEXIT/BINEXITACK handshake.
//! - [`registry`] and [`codeless`] parse, dispatch, and answer CodeLess
//!   command traffic.
//! - [`dsps`] chunks outgoing binary payloads, tracks flow control, and
//!   assembles inbound file transfers.
//! - [`stats`] samples DSPS receive throughput.
//! - [`config`] assembles the validated, immutable [`SessionConfig`] every
//!   other module reads from.
//! - [`event`] and [`error`] are the typed vocabulary the rest of the crate
//!   speaks: what happened, and what went wrong.
//! - [`session`] is the public entry point, [`PeerSession`], wiring all of
//!   the above to a [`ble_link_transport::Transport`].
//!
//! # Design
//!
//! Every state machine below `session` is pure: it takes bytes or events in
//! and returns actions out, untouched by I/O, so each can be driven
//! synchronously from a test. [`session::PeerSession`] is the one place that
//! owns the transport, the scheduler, and a clock, and is responsible for
//! turning the pure modules' decisions into actual GATT operations.
//!
//! [`SessionConfig`]: config::SessionConfig
//! [`PeerSession`]: session::PeerSession

pub mod codeless;
pub mod config;
pub mod dsps;
pub mod error;
pub mod event;
pub mod io;
pub mod mode;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod stats;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use error::{ErrorKind, SessionError};
pub use event::{ConnectionState, Event, EventSink};
pub use mode::Mode;
pub use session::PeerSession;
