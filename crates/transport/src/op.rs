use std::fmt;

use crate::characteristic::Characteristic;

/// Opaque identifier correlating a dispatched [`GattOp`] with its eventual
/// [`TransportEvent::Complete`](crate::TransportEvent::Complete).
///
/// Issued by the scheduler; the transport only ever echoes the value back.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct OpId(u64);

impl OpId {
    /// Wraps a raw id. Scheduler-internal; transports should treat this as opaque.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id, for logging.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Two-level scheduling priority. See the scheduler's priority rule: with
/// priority enabled, high-priority ops form a queue prefix and low-priority
/// ops a suffix; a new high-priority op is inserted at that boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Priority {
    /// User-initiated or protocol-critical writes (CodeLess commands, DSPS chunks).
    High,
    /// Bulk streaming writes that may be delayed behind higher-priority traffic.
    Low,
}

/// The operation a [`GattOp`] performs, independent of priority and hooks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GattOpKind {
    /// Read a characteristic's current value.
    ReadCharacteristic(Characteristic),
    /// Write a characteristic and wait for the peer's write response.
    WriteCharacteristic {
        /// Target characteristic.
        characteristic: Characteristic,
        /// Payload to write.
        payload: Vec<u8>,
    },
    /// Write a characteristic without requesting a response (write-command).
    WriteCommand {
        /// Target characteristic.
        characteristic: Characteristic,
        /// Payload to write.
        payload: Vec<u8>,
    },
    /// Read a descriptor's current value.
    ReadDescriptor(Characteristic),
    /// Write a descriptor (e.g. a CCCD to enable notifications).
    WriteDescriptor {
        /// Characteristic whose descriptor is targeted.
        characteristic: Characteristic,
        /// Payload to write.
        payload: Vec<u8>,
    },
    /// Request the transport negotiate an MTU with the peer.
    RequestMtu(u16),
}

/// A single unit of scheduled GATT work.
///
/// Carries an optional `on_execute` hook, invoked by the scheduler
/// immediately before the op is handed to the transport. Streaming layers use
/// the hook to emit progress events and update byte counters at the moment a
/// chunk actually leaves the queue, rather than when it was enqueued.
pub struct GattOp {
    /// Id assigned by the scheduler when the op is enqueued.
    pub id: OpId,
    /// What the op does.
    pub kind: GattOpKind,
    /// Scheduling priority.
    pub priority: Priority,
    /// Invoked once, right before dispatch to the transport.
    pub on_execute: Option<Box<dyn FnOnce() + Send>>,
}

impl GattOp {
    /// Builds an op with no `on_execute` hook.
    #[must_use]
    pub fn new(id: OpId, kind: GattOpKind, priority: Priority) -> Self {
        Self {
            id,
            kind,
            priority,
            on_execute: None,
        }
    }

    /// Attaches an `on_execute` hook, replacing any previous one.
    #[must_use]
    pub fn with_on_execute(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_execute = Some(Box::new(hook));
        self
    }

    /// Runs and clears the `on_execute` hook, if any. Idempotent: a second
    /// call is a no-op.
    pub fn fire_on_execute(&mut self) {
        if let Some(hook) = self.on_execute.take() {
            hook();
        }
    }
}

impl fmt::Debug for GattOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GattOp")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("on_execute", &self.on_execute.is_some())
            .finish()
    }
}

/// Successful result of a completed [`GattOp`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OpOutcome {
    /// Bytes read from a characteristic or descriptor.
    Value(Vec<u8>),
    /// A write (with or without response) completed.
    Written,
    /// The transport granted this MTU (which may differ from what was requested).
    MtuGranted(u16),
}
