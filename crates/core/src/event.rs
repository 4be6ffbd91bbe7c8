//! The typed event taxonomy (§6.5) delivered to whatever [`EventSink`] the
//! embedder supplies to a [`crate::session::PeerSession`].

use crate::error::ErrorKind;
use crate::mode::Mode;

/// Connection lifecycle state, mirroring the Peer Session data model (§3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    /// No transport activity in progress.
    Disconnected,
    /// The transport is establishing a link.
    Connecting,
    /// The link is up; GATT service discovery has not finished.
    Connected,
    /// Characteristics are being resolved.
    ServiceDiscovery,
    /// The session is fully usable.
    Ready,
}

/// Outcome of a completed outbound CodeLess command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutcome {
    /// The command's textual identifier.
    pub identifier: String,
    /// Response lines accumulated before the terminator, in receive order.
    pub lines: Vec<String>,
    /// The peer's error code (`ECnnn`), if the command failed with one.
    pub error_code: Option<String>,
}

/// A command line received from the peer while no pending outbound command
/// owns the identifier, and the registry marks it as host-handled.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostCommand {
    /// The command's textual identifier.
    pub identifier: String,
    /// Raw argument text following `=`, if any.
    pub args: Option<String>,
}

/// Everything a [`crate::session::PeerSession`] can report to an observer.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Connection state changed.
    Connection(ConnectionState),
    /// GATT service discovery progressed or finished.
    ServiceDiscovery,
    /// The session reached `Ready`.
    Ready,
    /// The link's CodeLess/DSPS mode changed.
    Mode(Mode),
    /// The peer requested entry into Binary mode and `host_binary_request` is set;
    /// the host must call `accept_binary_mode_request`.
    BinaryModeRequest,
    /// A recoverable error condition, classified by [`ErrorKind`].
    Error(ErrorKind),
    /// An outbound command completed successfully.
    CommandSuccess(CommandOutcome),
    /// An outbound command completed with a peer-reported error.
    CommandError(CommandOutcome),
    /// A line was received while no command was pending, and a command was
    /// constructed and handled entirely by the library.
    InboundCommand(String),
    /// A line was received while no command was pending, and the registry
    /// marks the identifier as host-handled.
    HostCommand(HostCommand),
    /// A line crossed the wire; emitted only when `line_events` is enabled.
    CodelessLine {
        /// `true` for outbound text, `false` for inbound.
        outbound: bool,
        /// The line text.
        text: String,
    },
    /// Bytes arrived on the DSPS Server-TX characteristic.
    DspsRxData(Vec<u8>),
    /// The peer's DSPS Flow characteristic changed TX flow state.
    DspsTxFlowControl {
        /// `true` if the peer just asserted XON (flow resumed).
        on: bool,
    },
    /// The local DSPS Flow write changed the peer-facing RX flow state.
    DspsRxFlowControl {
        /// `true` if RX flow was just turned on.
        on: bool,
    },
    /// A FileSend chunk was handed to the transport.
    DspsFileChunk {
        /// Chunks sent so far, including this one.
        sent_chunks: usize,
        /// Total chunks in the file.
        total_chunks: usize,
    },
    /// A FileSend operation failed to read its source.
    DspsFileError(String),
    /// A PatternSend packet was handed to the transport.
    DspsPatternChunk {
        /// The numeric suffix just sent.
        counter: u64,
    },
    /// A PatternSend operation failed to load its prefix.
    DspsPatternFileError(String),
    /// Payload bytes were appended to an active FileReceive's sink.
    DspsRxFileData {
        /// Bytes written to the sink by this event.
        bytes_written: usize,
        /// Total bytes written to the sink so far.
        bytes_total: usize,
    },
    /// A FileReceive finished; if the header declared a CRC, `ok` reports
    /// whether the computed CRC matched.
    DspsRxFileCrc {
        /// The received file's name, from the header.
        name: String,
        /// `None` if the header omitted a CRC; otherwise whether it matched.
        ok: Option<bool>,
    },
    /// A periodic statistics sample for session-level DSPS RX throughput.
    DspsStats {
        /// Bytes per second over the last interval.
        speed_bytes_per_sec: f64,
    },
}

/// An observer of [`Event`]s from a [`crate::session::PeerSession`].
///
/// Implemented by the embedder; the session has no global listener registry
/// (§9 Design Notes — Event bus).
pub trait EventSink: Send {
    /// Delivers one event. Must not block for long: it runs on the session's
    /// worker thread.
    fn on_event(&mut self, event: Event);
}

impl<F: FnMut(Event) + Send> EventSink for F {
    fn on_event(&mut self, event: Event) {
        self(event);
    }
}
