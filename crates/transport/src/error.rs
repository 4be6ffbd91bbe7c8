use thiserror::Error;

use crate::characteristic::Characteristic;

/// Failure reported by the transport for a single GATT operation.
///
/// The scheduler never interprets the cause beyond surfacing it; it dequeues
/// the failed operation, emits `Error(GattOperation)`, and runs the op's
/// error hook.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum TransportOpError {
    /// The operation targeted a specific characteristic.
    #[error("gatt operation on {characteristic:?} failed: {message}")]
    OnCharacteristic {
        /// The characteristic the failing operation targeted.
        characteristic: Characteristic,
        /// Transport-supplied failure description.
        message: String,
    },
    /// The operation had no specific characteristic (e.g. an MTU request).
    #[error("gatt operation failed: {message}")]
    Unscoped {
        /// Transport-supplied failure description.
        message: String,
    },
}

impl TransportOpError {
    /// Builds an error tied to a specific characteristic.
    #[must_use]
    pub fn new(characteristic: Characteristic, message: impl Into<String>) -> Self {
        Self::OnCharacteristic {
            characteristic,
            message: message.into(),
        }
    }

    /// Builds an error with no specific characteristic (e.g. an MTU request failure).
    #[must_use]
    pub fn without_characteristic(message: impl Into<String>) -> Self {
        Self::Unscoped { message: message.into() }
    }

    /// The characteristic the failing operation targeted, if any.
    #[must_use]
    pub const fn characteristic(&self) -> Option<Characteristic> {
        match self {
            Self::OnCharacteristic { characteristic, .. } => Some(*characteristic),
            Self::Unscoped { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_characteristic_when_present() {
        let error = TransportOpError::new(Characteristic::DspsFlow, "write timed out");
        assert_eq!(
            error.to_string(),
            "gatt operation on DspsFlow failed: write timed out"
        );
        assert_eq!(error.characteristic(), Some(Characteristic::DspsFlow));
    }

    #[test]
    fn display_omits_characteristic_when_absent() {
        let error = TransportOpError::without_characteristic("mtu negotiation failed");
        assert_eq!(error.to_string(), "gatt operation failed: mtu negotiation failed");
        assert_eq!(error.characteristic(), None);
    }
}
