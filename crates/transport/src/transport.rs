use crate::characteristic::Characteristic;
use crate::error::TransportOpError;
use crate::op::{GattOpKind, OpId, OpOutcome};

/// Something that happened on the link, delivered back to the engine.
///
/// The engine never blocks waiting for these; it polls (or is pushed) a
/// stream of `TransportEvent`s from whatever channel the embedder wires the
/// concrete transport through.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransportEvent {
    /// A previously-dispatched op finished, successfully or not.
    Complete {
        /// The op this result belongs to.
        id: OpId,
        /// `Ok` with the op's result, or the transport failure.
        result: Result<OpOutcome, TransportOpError>,
    },
    /// The peer pushed a notification on a characteristic the session is
    /// subscribed to (CodeLess Flow, DSPS Server-TX, DSPS Flow).
    Notification {
        /// Characteristic the notification arrived on.
        characteristic: Characteristic,
        /// Notified payload.
        data: Vec<u8>,
    },
    /// The link's MTU changed, independent of an explicit op completing
    /// (some stacks renegotiate MTU during service discovery).
    MtuChanged(u16),
    /// The underlying connection was lost. No further `TransportEvent`s will
    /// follow for this session.
    Disconnected,
}

/// Non-blocking GATT operation driver.
///
/// Every method starts the operation and returns immediately; the outcome
/// arrives later as a [`TransportEvent::Complete`] tagged with the `id` the
/// caller supplied. Implementations must preserve the `id` verbatim — the
/// scheduler uses it only to correlate, never to infer ordering.
pub trait Transport: Send {
    /// Reads a characteristic's current value.
    fn read_characteristic(&mut self, id: OpId, characteristic: Characteristic);

    /// Writes a characteristic and requests a peer acknowledgement.
    fn write_characteristic(&mut self, id: OpId, characteristic: Characteristic, payload: &[u8]);

    /// Writes a characteristic without requesting an acknowledgement.
    fn write_command(&mut self, id: OpId, characteristic: Characteristic, payload: &[u8]);

    /// Reads a descriptor's current value.
    fn read_descriptor(&mut self, id: OpId, characteristic: Characteristic);

    /// Writes a descriptor (e.g. to enable notifications).
    fn write_descriptor(&mut self, id: OpId, characteristic: Characteristic, payload: &[u8]);

    /// Requests the transport negotiate the given MTU with the peer.
    fn request_mtu(&mut self, id: OpId, mtu: u16);

    /// Convenience dispatcher matching on [`GattOpKind`]; the default
    /// implementation forwards to the specific method for each variant, so
    /// implementors only need the methods above.
    fn dispatch(&mut self, id: OpId, kind: &GattOpKind) {
        match kind {
            GattOpKind::ReadCharacteristic(characteristic) => {
                self.read_characteristic(id, *characteristic);
            }
            GattOpKind::WriteCharacteristic {
                characteristic,
                payload,
            } => self.write_characteristic(id, *characteristic, payload),
            GattOpKind::WriteCommand {
                characteristic,
                payload,
            } => self.write_command(id, *characteristic, payload),
            GattOpKind::ReadDescriptor(characteristic) => {
                self.read_descriptor(id, *characteristic);
            }
            GattOpKind::WriteDescriptor {
                characteristic,
                payload,
            } => self.write_descriptor(id, *characteristic, payload),
            GattOpKind::RequestMtu(mtu) => self.request_mtu(id, *mtu),
        }
    }
}
