//! Sample [`super::CommandSpec`] implementations: the four mode commands
//! plus a representative ping/device-info/GPIO trio covering every registry
//! code path (library-handled with and without arguments, and host-handled).

use super::{CommandSpec, ResponseSink};

macro_rules! mode_command {
    ($name:ident, $identifier:literal) => {
        /// Mode-handshake command; see §6.2.
        #[derive(Default)]
        pub struct $name;

        impl CommandSpec for $name {
            fn identifier(&self) -> &str {
                $identifier
            }

            fn is_mode_command(&self) -> bool {
                true
            }

            fn process_inbound(&self, _args: Option<&str>, sink: &mut dyn ResponseSink) {
                sink.send_success(None);
            }
        }
    };
}

mode_command!(BinReqCommand, "BINREQ");
mode_command!(BinReqAckCommand, "BINREQACK");
mode_command!(BinExitCommand, "BINEXIT");
mode_command!(BinExitAckCommand, "BINEXITACK");

/// `PING` — library-handled, takes no arguments, always succeeds.
#[derive(Default)]
pub struct PingCommand;

impl CommandSpec for PingCommand {
    fn identifier(&self) -> &str {
        "PING"
    }

    fn process_inbound(&self, _args: Option<&str>, sink: &mut dyn ResponseSink) {
        sink.send_success(None);
    }
}

/// `DEVINFO` — library-handled, replies with a fixed device string.
#[derive(Default)]
pub struct DeviceInfoCommand;

impl CommandSpec for DeviceInfoCommand {
    fn identifier(&self) -> &str {
        "DEVINFO"
    }

    fn process_inbound(&self, _args: Option<&str>, sink: &mut dyn ResponseSink) {
        sink.send_success(Some("ble-link-core"));
    }
}

/// `GPIO` — host-handled: registered with `host_handled = true`, so the
/// engine never calls `process_inbound` for it; it is surfaced as
/// `Event::HostCommand` instead. The implementation below exists only to
/// satisfy the trait and is never reached in normal operation.
#[derive(Default)]
pub struct GpioSetCommand;

impl CommandSpec for GpioSetCommand {
    fn identifier(&self) -> &str {
        "GPIO"
    }

    fn process_inbound(&self, _args: Option<&str>, sink: &mut dyn ResponseSink) {
        sink.send_error("GPIO is host-handled; this path should be unreachable");
    }
}
