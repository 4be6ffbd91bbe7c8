//! Crate-wide error taxonomy: one `thiserror`-derived type per component
//! boundary, plus [`ErrorKind`], the coarse classification carried by
//! [`crate::event::Event::Error`] for consumers that observe events rather
//! than `Result`s.

use thiserror::Error;

use ble_link_transport::TransportOpError;

/// Coarse error classification delivered via `Event::Error`, mirroring §6.5.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// A command or streaming operation was attempted before the session reached `Ready`.
    NotReady,
    /// A command could not be parsed or had invalid arguments.
    InvalidCommand,
    /// A command's prefix did not match any recognized form.
    InvalidPrefix,
    /// The operation is not permitted in the session's current mode.
    OperationNotAllowed,
    /// The transport reported a GATT operation failure.
    GattOperation,
    /// Service discovery / characteristic resolution failed.
    InitServices,
}

/// Error returned by synchronous, local-validation entry points on
/// [`crate::session::PeerSession`].
///
/// Every path that can fail this way also emits the matching
/// `Event::Error(ErrorKind)`, so callers may use whichever of `Result` or
/// event observation fits their control flow.
#[derive(Debug, Error)]
pub enum SessionError {
    /// See [`ConfigError`].
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// See [`RegistryError`].
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// See [`FramingError`].
    #[error(transparent)]
    Framing(#[from] FramingError),
    /// See [`FileReceiveError`].
    #[error(transparent)]
    FileReceive(#[from] FileReceiveError),
    /// The underlying transport failed a dispatched operation.
    #[error(transparent)]
    Transport(#[from] TransportOpError),
    /// The session is not ready to accept this operation.
    #[error("session is not ready: {0}")]
    NotReady(&'static str),
    /// The operation is not permitted in the session's current mode.
    #[error("operation not allowed in current mode: {0}")]
    OperationNotAllowed(&'static str),
}

impl SessionError {
    /// The coarse [`ErrorKind`] this error maps to, for callers that bridge
    /// `Result`-based and event-based error handling.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Registry(_) => ErrorKind::InvalidCommand,
            Self::Framing(FramingError::InvalidPrefix(_)) => ErrorKind::InvalidPrefix,
            Self::Framing(_) => ErrorKind::InvalidCommand,
            Self::FileReceive(_) => ErrorKind::InvalidCommand,
            Self::Transport(_) => ErrorKind::GattOperation,
            Self::NotReady(_) => ErrorKind::NotReady,
            Self::OperationNotAllowed(_) => ErrorKind::OperationNotAllowed,
        }
    }
}

/// Error building a [`crate::config::SessionConfig`].
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ConfigError {
    /// `default_dsps_chunk_size` exceeds `mtu - 3`.
    #[error("default DSPS chunk size {chunk_size} exceeds mtu ({mtu}) - 3")]
    ChunkSizeExceedsMtu {
        /// The configured chunk size.
        chunk_size: usize,
        /// The configured MTU.
        mtu: u16,
    },
    /// `dsps_pending_max` was set to zero, which can never buffer anything.
    #[error("dsps_pending_max must be greater than zero")]
    ZeroPendingMax,
    /// `mtu` was set below the minimum usable value (23, the BLE default).
    #[error("mtu {0} is below the minimum usable value of 23")]
    MtuTooSmall(u16),
}

/// Error from command construction or framing in the CodeLess engine.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum FramingError {
    /// The command text did not carry a recognized CodeLess prefix.
    #[error("unrecognized CodeLess prefix in '{0}'")]
    InvalidPrefix(String),
    /// The command's arguments failed validation for its identifier.
    #[error("invalid arguments for command '{identifier}': {reason}")]
    InvalidArguments {
        /// The command identifier.
        identifier: String,
        /// Why the arguments were rejected.
        reason: String,
    },
}

/// Error looking up or constructing a command from the [`crate::registry::CommandRegistry`].
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RegistryError {
    /// No command is registered under this identifier.
    #[error("command not supported: {0}")]
    UnknownIdentifier(String),
    /// The identifier was recognized but the line could not be parsed into a command.
    #[error("invalid command: {0}")]
    Unparseable(String),
}

/// Error from the file-receive state machine.
#[derive(Debug, Error)]
pub enum FileReceiveError {
    /// The declared `Size:` field could not be parsed as a number.
    #[error("file receive header has an invalid size field")]
    InvalidSize,
    /// A file receive was already in progress when a new header was matched.
    #[error("a file receive is already in progress")]
    AlreadyReceiving,
    /// The sink could not be opened or written to.
    #[error("file receive sink I/O failed")]
    Io(#[source] std::io::Error),
}
