//! Mode Controller (C5): the {Command, Binary} state machine gating which
//! traffic is legal on the link, and the BINREQ/BINREQACK/BINEXIT/BINEXITACK
//! handshake that drives transitions.

/// The link's exclusive traffic mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// Only CodeLess traffic is permitted (subject to configuration).
    Command,
    /// Only DSPS traffic is permitted (subject to configuration).
    Binary,
}

/// Tracks the current [`Mode`] and whether a local or peer-initiated
/// handshake is in flight.
///
/// Transitions happen only on successful send or receive of the
/// corresponding handshake command (§4.2); `ModeController` itself never
/// writes to the transport — the session drives the handshake commands
/// through the CodeLess engine and reports outcomes back here.
#[derive(Debug)]
pub struct ModeController {
    mode: Mode,
    send_binary_request: bool,
    host_binary_request: bool,
    awaiting_peer_ack: bool,
}

impl ModeController {
    /// Builds a controller starting in `initial`, configured per §6.4's
    /// `mode_change_send_binary_request` / `host_binary_request` knobs.
    #[must_use]
    pub const fn new(initial: Mode, send_binary_request: bool, host_binary_request: bool) -> Self {
        Self {
            mode: initial,
            send_binary_request,
            host_binary_request,
            awaiting_peer_ack: false,
        }
    }

    /// The controller's current mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether a peer `BINREQ` is waiting on host approval
    /// (`accept_binary_mode_request`).
    #[must_use]
    pub const fn host_binary_request(&self) -> bool {
        self.host_binary_request
    }

    /// Decides what a local `set_mode(target)` call should do.
    ///
    /// Returns `None` if already in `target` (idempotent no-op, per the Mode
    /// idempotence property). Otherwise returns the handshake command the
    /// caller should send.
    #[must_use]
    pub fn request(&mut self, target: Mode) -> Option<HandshakeCommand> {
        if self.mode == target {
            return None;
        }
        match target {
            Mode::Binary if self.send_binary_request => {
                self.awaiting_peer_ack = true;
                Some(HandshakeCommand::BinReq)
            }
            Mode::Binary => Some(HandshakeCommand::BinReqAck),
            Mode::Command => Some(HandshakeCommand::BinExit),
        }
    }

    /// Called when a handshake command either was sent successfully by the
    /// host or received successfully from the peer; applies the
    /// corresponding transition, returning the new mode if it changed.
    pub fn on_handshake(&mut self, command: HandshakeCommand) -> Option<Mode> {
        let previous = self.mode;
        match command {
            HandshakeCommand::BinReq => {
                // Sending BINREQ alone does not change mode; only the ACK does.
            }
            HandshakeCommand::BinReqAck => {
                self.awaiting_peer_ack = false;
                self.mode = Mode::Binary;
            }
            HandshakeCommand::BinExit | HandshakeCommand::BinExitAck => {
                self.awaiting_peer_ack = false;
                self.mode = Mode::Command;
            }
        }
        (self.mode != previous).then_some(self.mode)
    }

    /// Whether a peer's inbound `BINREQ` should be escalated to the host via
    /// `Event::BinaryModeRequest` (`true`) or auto-acked immediately (`false`).
    #[must_use]
    pub const fn should_escalate_peer_request(&self) -> bool {
        self.host_binary_request
    }
}

/// One of the four mode-handshake commands (§6.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HandshakeCommand {
    /// `AT+BINREQ`: request entry into Binary mode.
    BinReq,
    /// `AT+BINREQACK`: acknowledge entry into Binary mode.
    BinReqAck,
    /// `AT+BINEXIT`: request exit back to Command mode.
    BinExit,
    /// `AT+BINEXITACK`: acknowledge exit back to Command mode.
    BinExitAck,
}

impl HandshakeCommand {
    /// The CodeLess identifier text for this command (without prefix).
    #[must_use]
    pub const fn identifier(self) -> &'static str {
        match self {
            Self::BinReq => "BINREQ",
            Self::BinReqAck => "BINREQACK",
            Self::BinExit => "BINEXIT",
            Self::BinExitAck => "BINEXITACK",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_mode_to_current_is_a_noop() {
        let mut controller = ModeController::new(Mode::Command, true, false);
        assert_eq!(controller.request(Mode::Command), None);
    }

    #[test]
    fn entering_binary_sends_binreq_when_configured() {
        let mut controller = ModeController::new(Mode::Command, true, false);
        assert_eq!(controller.request(Mode::Binary), Some(HandshakeCommand::BinReq));
        assert_eq!(controller.mode(), Mode::Command);
        assert_eq!(controller.on_handshake(HandshakeCommand::BinReqAck), Some(Mode::Binary));
        assert_eq!(controller.mode(), Mode::Binary);
    }

    #[test]
    fn entering_binary_sends_direct_ack_when_not_configured() {
        let mut controller = ModeController::new(Mode::Command, false, false);
        assert_eq!(controller.request(Mode::Binary), Some(HandshakeCommand::BinReqAck));
    }

    #[test]
    fn exiting_binary_sends_binexit_and_transitions_on_ack() {
        let mut controller = ModeController::new(Mode::Binary, true, false);
        assert_eq!(controller.request(Mode::Command), Some(HandshakeCommand::BinExit));
        assert_eq!(controller.on_handshake(HandshakeCommand::BinExitAck), Some(Mode::Command));
    }

    #[test]
    fn second_set_mode_after_transition_is_noop() {
        let mut controller = ModeController::new(Mode::Command, true, false);
        controller.request(Mode::Binary);
        controller.on_handshake(HandshakeCommand::BinReqAck);
        assert_eq!(controller.request(Mode::Binary), None);
    }
}
