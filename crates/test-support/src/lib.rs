//! In-memory [`Transport`] fake used by the engine's own test suite and by
//! integration tests exercising full sessions end to end.
//!
//! [`FakeTransport`] never talks to real hardware: every call is recorded in
//! dispatch order, and the test drives completions and notifications back
//! in by hand through [`FakeTransport::complete`] and
//! [`FakeTransport::notify`]. This lets a scenario test assert both on what
//! the engine tried to do (via [`FakeTransport::dispatched`]) and on how it
//! reacts to a scripted sequence of GATT events.

use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};

use ble_link_transport::{Characteristic, OpId, OpOutcome, Transport, TransportEvent, TransportOpError};

/// One call the engine made against the fake, recorded for ordering assertions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DispatchedOp {
    /// `Transport::read_characteristic`.
    ReadCharacteristic { id: OpId, characteristic: Characteristic },
    /// `Transport::write_characteristic`.
    WriteCharacteristic {
        id: OpId,
        characteristic: Characteristic,
        payload: Vec<u8>,
    },
    /// `Transport::write_command`.
    WriteCommand {
        id: OpId,
        characteristic: Characteristic,
        payload: Vec<u8>,
    },
    /// `Transport::read_descriptor`.
    ReadDescriptor { id: OpId, characteristic: Characteristic },
    /// `Transport::write_descriptor`.
    WriteDescriptor {
        id: OpId,
        characteristic: Characteristic,
        payload: Vec<u8>,
    },
    /// `Transport::request_mtu`.
    RequestMtu { id: OpId, mtu: u16 },
}

impl DispatchedOp {
    /// The op id every variant carries.
    #[must_use]
    pub const fn id(&self) -> OpId {
        match self {
            Self::ReadCharacteristic { id, .. }
            | Self::WriteCharacteristic { id, .. }
            | Self::WriteCommand { id, .. }
            | Self::ReadDescriptor { id, .. }
            | Self::WriteDescriptor { id, .. }
            | Self::RequestMtu { id, .. } => *id,
        }
    }
}

/// A scripted, non-blocking [`Transport`] implementation.
///
/// Construct with [`FakeTransport::new`], hand the returned [`Receiver`] to
/// whatever drives the engine's event loop under test, and call
/// [`FakeTransport::complete`] / [`FakeTransport::notify`] to push the
/// [`TransportEvent`]s a real stack would have delivered asynchronously.
pub struct FakeTransport {
    events: Sender<TransportEvent>,
    dispatched: Arc<Mutex<Vec<DispatchedOp>>>,
}

/// A cheap, cloneable handle onto a [`FakeTransport`]'s shared state.
///
/// Once a `FakeTransport` is boxed up as a `dyn Transport` and handed to the
/// component under test, the test itself needs another way to inspect what
/// was dispatched and to push completions/notifications back in. Get one
/// with [`FakeTransport::handle`] before moving the transport away.
#[derive(Clone)]
pub struct FakeTransportHandle {
    events: Sender<TransportEvent>,
    dispatched: Arc<Mutex<Vec<DispatchedOp>>>,
}

impl FakeTransport {
    /// Builds a fake transport together with the receiving end of its event channel.
    #[must_use]
    pub fn new() -> (Self, Receiver<TransportEvent>) {
        let (tx, rx) = channel();
        (
            Self {
                events: tx,
                dispatched: Arc::new(Mutex::new(Vec::new())),
            },
            rx,
        )
    }

    /// A cloneable handle retaining access to this transport's recorded ops
    /// and event sender, for use after this transport has been moved into
    /// whatever owns it as a `dyn Transport`.
    #[must_use]
    pub fn handle(&self) -> FakeTransportHandle {
        FakeTransportHandle {
            events: self.events.clone(),
            dispatched: self.dispatched.clone(),
        }
    }

    /// The ops dispatched so far, in call order.
    #[must_use]
    pub fn dispatched(&self) -> Vec<DispatchedOp> {
        self.dispatched.lock().unwrap().clone()
    }

    /// Delivers a `Complete` event for `id`, as if the peer had just
    /// finished the corresponding operation.
    pub fn complete(&self, id: OpId, result: Result<OpOutcome, TransportOpError>) {
        let _ = self.events.send(TransportEvent::Complete { id, result });
    }

    /// Convenience for the common case: completes `id` with `OpOutcome::Written`.
    pub fn complete_write(&self, id: OpId) {
        self.complete(id, Ok(OpOutcome::Written));
    }

    /// Delivers an unsolicited notification on `characteristic`.
    pub fn notify(&self, characteristic: Characteristic, data: impl Into<Vec<u8>>) {
        let _ = self.events.send(TransportEvent::Notification {
            characteristic,
            data: data.into(),
        });
    }

    /// Delivers an MTU change not tied to a specific op.
    pub fn mtu_changed(&self, mtu: u16) {
        let _ = self.events.send(TransportEvent::MtuChanged(mtu));
    }

    /// Delivers a disconnect; no further events should be expected after this.
    pub fn disconnect(&self) {
        let _ = self.events.send(TransportEvent::Disconnected);
    }

    fn record(&mut self, op: DispatchedOp) {
        self.dispatched.lock().unwrap().push(op);
    }
}

impl FakeTransportHandle {
    /// The ops dispatched so far, in call order.
    #[must_use]
    pub fn dispatched(&self) -> Vec<DispatchedOp> {
        self.dispatched.lock().unwrap().clone()
    }

    /// Delivers a `Complete` event for `id`.
    pub fn complete(&self, id: OpId, result: Result<OpOutcome, TransportOpError>) {
        let _ = self.events.send(TransportEvent::Complete { id, result });
    }

    /// Completes `id` with `OpOutcome::Written`.
    pub fn complete_write(&self, id: OpId) {
        self.complete(id, Ok(OpOutcome::Written));
    }

    /// Delivers an unsolicited notification on `characteristic`.
    pub fn notify(&self, characteristic: Characteristic, data: impl Into<Vec<u8>>) {
        let _ = self.events.send(TransportEvent::Notification {
            characteristic,
            data: data.into(),
        });
    }

    /// Delivers an MTU change not tied to a specific op.
    pub fn mtu_changed(&self, mtu: u16) {
        let _ = self.events.send(TransportEvent::MtuChanged(mtu));
    }

    /// Delivers a disconnect.
    pub fn disconnect(&self) {
        let _ = self.events.send(TransportEvent::Disconnected);
    }
}

impl Transport for FakeTransport {
    fn read_characteristic(&mut self, id: OpId, characteristic: Characteristic) {
        self.record(DispatchedOp::ReadCharacteristic { id, characteristic });
    }

    fn write_characteristic(&mut self, id: OpId, characteristic: Characteristic, payload: &[u8]) {
        self.record(DispatchedOp::WriteCharacteristic {
            id,
            characteristic,
            payload: payload.to_vec(),
        });
    }

    fn write_command(&mut self, id: OpId, characteristic: Characteristic, payload: &[u8]) {
        self.record(DispatchedOp::WriteCommand {
            id,
            characteristic,
            payload: payload.to_vec(),
        });
    }

    fn read_descriptor(&mut self, id: OpId, characteristic: Characteristic) {
        self.record(DispatchedOp::ReadDescriptor { id, characteristic });
    }

    fn write_descriptor(&mut self, id: OpId, characteristic: Characteristic, payload: &[u8]) {
        self.record(DispatchedOp::WriteDescriptor {
            id,
            characteristic,
            payload: payload.to_vec(),
        });
    }

    fn request_mtu(&mut self, id: OpId, mtu: u16) {
        self.record(DispatchedOp::RequestMtu { id, mtu });
    }
}

/// Writes `contents` to a fresh temporary file and returns the open handle
/// positioned at the start, for exercising `ByteSource`/`ByteSink`
/// implementations without touching the real filesystem tree.
///
/// # Panics
///
/// Panics if the temporary file cannot be created or written to; this is a
/// test helper and such failures indicate a broken test environment, not a
/// condition under test.
#[must_use]
pub fn temp_file_with_contents(contents: &[u8]) -> tempfile::NamedTempFile {
    use std::io::{Seek, SeekFrom, Write};

    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(contents).expect("write temp file contents");
    file.seek(SeekFrom::Start(0)).expect("rewind temp file");
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use ble_link_transport::{GattOp, GattOpKind, Priority};

    #[test]
    fn dispatch_records_calls_in_order() {
        let (mut transport, _events) = FakeTransport::new();
        let op_a = GattOp::new(
            OpId::new(1),
            GattOpKind::WriteCommand {
                characteristic: Characteristic::CodelessInbound,
                payload: b"AT\r\n\0".to_vec(),
            },
            Priority::High,
        );
        let op_b = GattOp::new(OpId::new(2), GattOpKind::RequestMtu(247), Priority::Low);

        transport.dispatch(op_a.id, &op_a.kind);
        transport.dispatch(op_b.id, &op_b.kind);

        assert_eq!(transport.dispatched().len(), 2);
        assert_eq!(transport.dispatched()[0].id(), OpId::new(1));
        assert_eq!(transport.dispatched()[1].id(), OpId::new(2));
    }

    #[test]
    fn complete_and_notify_reach_the_receiver() {
        let (transport, events) = FakeTransport::new();
        transport.complete_write(OpId::new(7));
        transport.notify(Characteristic::DspsFlow, vec![0x01]);

        match events.recv().unwrap() {
            TransportEvent::Complete { id, result } => {
                assert_eq!(id, OpId::new(7));
                assert_eq!(result, Ok(OpOutcome::Written));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match events.recv().unwrap() {
            TransportEvent::Notification { characteristic, data } => {
                assert_eq!(characteristic, Characteristic::DspsFlow);
                assert_eq!(data, vec![0x01]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
