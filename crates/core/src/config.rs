//! Configuration (C13): every knob in §6.4 as a field on [`SessionConfig`],
//! assembled through [`SessionConfigBuilder`] with one setter group per
//! concern, mirroring how the teacher splits its client-config builder
//! across per-concern modules (framing, argument policy, flow control,
//! priority, logging here, in place of the teacher's network/performance/
//! preservation split).

use crate::error::ConfigError;
use crate::mode::Mode;

/// The BLE default MTU before any negotiation (§6.1).
pub const DEFAULT_MTU: u16 = 23;
/// Minimum usable MTU; anything below leaves no room for a GATT header.
pub const MIN_MTU: u16 = 23;
/// Default statistics sampling interval (§4.8).
pub const DEFAULT_STATS_INTERVAL_MS: u64 = 1000;

/// Immutable, validated session configuration.
///
/// Built only through [`SessionConfigBuilder::build`]; to reconfigure a
/// session, build a new `SessionConfig` and construct a new session — there
/// is no global/static config and no in-place mutation (§4.11).
#[derive(Clone, Debug)]
pub struct SessionConfig {
    // Framing (§4.3 Framing)
    pub(crate) append_end_of_line: bool,
    pub(crate) end_of_line: String,
    pub(crate) trailing_zero: bool,
    pub(crate) single_write_response: bool,
    pub(crate) empty_line_before_ok: bool,
    pub(crate) empty_line_before_error: bool,
    pub(crate) line_events: bool,

    // Argument-checking policy (§4.3 Argument-checking policies)
    pub(crate) disallow_invalid_parsed_command: bool,
    pub(crate) disallow_invalid_command: bool,
    pub(crate) disallow_invalid_prefix: bool,
    pub(crate) auto_add_prefix: bool,

    // MTU / DSPS chunking
    pub(crate) request_mtu: bool,
    pub(crate) mtu: u16,
    pub(crate) default_dsps_chunk_size: usize,
    pub(crate) dsps_chunk_size_increase_to_mtu: bool,
    pub(crate) dsps_pending_max: usize,
    pub(crate) default_dsps_rx_flow: bool,
    pub(crate) set_flow_control_on_connection: bool,
    pub(crate) dsps_echo: bool,

    // Scheduler priority
    pub(crate) gatt_queue_priority: bool,
    pub(crate) gatt_dequeue_before_processing: bool,

    // Mode controller
    pub(crate) initial_mode: Mode,
    pub(crate) host_binary_request: bool,
    pub(crate) mode_change_send_binary_request: bool,
    pub(crate) allow_inbound_binary_in_command_mode: bool,
    pub(crate) allow_outbound_binary_in_command_mode: bool,
    pub(crate) allow_inbound_command_in_binary_mode: bool,
    pub(crate) allow_outbound_command_in_binary_mode: bool,

    // Statistics
    pub(crate) dsps_stats: bool,
    pub(crate) dsps_stats_interval_ms: u64,
}

impl SessionConfig {
    /// Starts a new [`SessionConfigBuilder`] with §6.4's defaults.
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// The negotiated (or default) MTU.
    #[must_use]
    pub const fn mtu(&self) -> u16 {
        self.mtu
    }

    /// The DSPS chunk size currently configured, before any MTU-driven raise.
    #[must_use]
    pub const fn default_dsps_chunk_size(&self) -> usize {
        self.default_dsps_chunk_size
    }

    /// Maximum chunk payload for the given `mtu` (`mtu - 3`, the ATT header overhead).
    #[must_use]
    pub const fn chunk_ceiling_for_mtu(mtu: u16) -> usize {
        (mtu as usize).saturating_sub(3)
    }
}

/// Validating builder for [`SessionConfig`].
#[derive(Clone, Debug)]
pub struct SessionConfigBuilder {
    append_end_of_line: bool,
    end_of_line: String,
    trailing_zero: bool,
    single_write_response: bool,
    empty_line_before_ok: bool,
    empty_line_before_error: bool,
    line_events: bool,
    disallow_invalid_parsed_command: bool,
    disallow_invalid_command: bool,
    disallow_invalid_prefix: bool,
    auto_add_prefix: bool,
    request_mtu: bool,
    mtu: u16,
    default_dsps_chunk_size: usize,
    dsps_chunk_size_increase_to_mtu: bool,
    dsps_pending_max: usize,
    default_dsps_rx_flow: bool,
    set_flow_control_on_connection: bool,
    dsps_echo: bool,
    gatt_queue_priority: bool,
    gatt_dequeue_before_processing: bool,
    initial_mode: Mode,
    host_binary_request: bool,
    mode_change_send_binary_request: bool,
    allow_inbound_binary_in_command_mode: bool,
    allow_outbound_binary_in_command_mode: bool,
    allow_inbound_command_in_binary_mode: bool,
    allow_outbound_command_in_binary_mode: bool,
    dsps_stats: bool,
    dsps_stats_interval_ms: u64,
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self {
            append_end_of_line: true,
            end_of_line: "\r\n".to_string(),
            trailing_zero: true,
            single_write_response: false,
            empty_line_before_ok: false,
            empty_line_before_error: false,
            line_events: false,
            disallow_invalid_parsed_command: false,
            disallow_invalid_command: false,
            disallow_invalid_prefix: false,
            auto_add_prefix: false,
            request_mtu: true,
            mtu: DEFAULT_MTU,
            default_dsps_chunk_size: 20,
            dsps_chunk_size_increase_to_mtu: true,
            dsps_pending_max: 64,
            default_dsps_rx_flow: true,
            set_flow_control_on_connection: true,
            dsps_echo: false,
            gatt_queue_priority: true,
            gatt_dequeue_before_processing: false,
            initial_mode: Mode::Command,
            host_binary_request: false,
            mode_change_send_binary_request: true,
            allow_inbound_binary_in_command_mode: false,
            allow_outbound_binary_in_command_mode: false,
            allow_inbound_command_in_binary_mode: false,
            allow_outbound_command_in_binary_mode: false,
            dsps_stats: true,
            dsps_stats_interval_ms: DEFAULT_STATS_INTERVAL_MS,
        }
    }
}

/// Generates `#[must_use] pub const fn` chainable setters, matching the
/// teacher's `builder_setter!` convention.
macro_rules! setter {
    ($(#[$attr:meta])* $field:ident: $ty:ty) => {
        $(#[$attr])*
        #[must_use]
        pub const fn $field(mut self, value: $ty) -> Self {
            self.$field = value;
            self
        }
    };
}

impl SessionConfigBuilder {
    // --- Framing (§4.3 Framing, §6.4 "Outbound framing") ---

    setter!(
        /// Whether a line terminator is appended after outbound command text.
        append_end_of_line: bool
    );

    /// Sets the line terminator appended to outbound command text.
    #[must_use]
    pub fn end_of_line(mut self, value: impl Into<String>) -> Self {
        self.end_of_line = value.into();
        self
    }

    setter!(
        /// Whether a trailing NUL byte is appended after outbound command text.
        trailing_zero: bool
    );
    setter!(
        /// Whether inbound response lines are merged into one write with the terminator.
        single_write_response: bool
    );
    setter!(
        /// Whether an empty line is emitted before an outbound `OK`.
        empty_line_before_ok: bool
    );
    setter!(
        /// Whether an empty line is emitted before an outbound `ERROR`.
        empty_line_before_error: bool
    );
    setter!(
        /// Whether per-line `CodelessLine` events are emitted.
        line_events: bool
    );

    // --- Argument-checking policy (§4.3 Argument-checking policies) ---

    setter!(
        /// Drops commands parsed from inbound text whose arguments fail validation.
        disallow_invalid_parsed_command: bool
    );
    setter!(
        /// Drops programmatically-constructed commands whose arguments fail validation.
        disallow_invalid_command: bool
    );
    setter!(
        /// Drops commands missing a recognized CodeLess prefix.
        disallow_invalid_prefix: bool
    );
    setter!(
        /// Prepends `AT` to parsed commands that are missing a prefix.
        auto_add_prefix: bool
    );

    // --- MTU / DSPS chunking (§6.1, §6.4) ---

    setter!(
        /// Whether to auto-negotiate the MTU after service discovery.
        request_mtu: bool
    );
    setter!(
        /// The MTU to request (and the initial chunk ceiling before negotiation).
        mtu: u16
    );
    setter!(
        /// Initial DSPS chunk size, used until the MTU changes.
        default_dsps_chunk_size: usize
    );
    setter!(
        /// Whether an MTU increase raises the DSPS chunk size to `mtu - 3`.
        dsps_chunk_size_increase_to_mtu: bool
    );
    setter!(
        /// Maximum buffered chunks while DSPS TX flow is off.
        dsps_pending_max: usize
    );
    setter!(
        /// RX flow state (XON/XOFF) written on connect, if `set_flow_control_on_connection`.
        default_dsps_rx_flow: bool
    );
    setter!(
        /// Whether to push the RX flow state at connect time.
        set_flow_control_on_connection: bool
    );
    setter!(
        /// Whether DSPS RX bytes are echoed back to the peer.
        dsps_echo: bool
    );

    // --- Scheduler priority (§4.1) ---

    setter!(
        /// Enables the scheduler's two-tier high/low priority queue.
        gatt_queue_priority: bool
    );
    setter!(
        /// Dispatches the next queued op before the current completion is processed.
        gatt_dequeue_before_processing: bool
    );

    // --- Mode controller (§4.2) ---

    setter!(
        /// The mode a new session starts in.
        initial_mode: Mode
    );
    setter!(
        /// Escalates a peer `BINREQ` to the host via `Event::BinaryModeRequest`.
        host_binary_request: bool
    );
    setter!(
        /// Whether local entry into Binary mode sends `BINREQ` (vs. a direct `BINREQACK`).
        mode_change_send_binary_request: bool
    );
    setter!(
        /// Allows inbound DSPS traffic while in Command mode.
        allow_inbound_binary_in_command_mode: bool
    );
    setter!(
        /// Allows outbound DSPS traffic while in Command mode.
        allow_outbound_binary_in_command_mode: bool
    );
    setter!(
        /// Allows inbound non-mode CodeLess traffic while in Binary mode.
        allow_inbound_command_in_binary_mode: bool
    );
    setter!(
        /// Allows outbound non-mode CodeLess traffic while in Binary mode.
        allow_outbound_command_in_binary_mode: bool
    );

    // --- Statistics (§4.8) ---

    setter!(
        /// Enables the periodic DSPS statistics sampler.
        dsps_stats: bool
    );
    setter!(
        /// Statistics sampling interval, in milliseconds.
        dsps_stats_interval_ms: u64
    );

    /// Validates and finalizes the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MtuTooSmall`] if `mtu < 23`,
    /// [`ConfigError::ChunkSizeExceedsMtu`] if `default_dsps_chunk_size > mtu - 3`
    /// (Scenario S7), or [`ConfigError::ZeroPendingMax`] if `dsps_pending_max == 0`.
    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        if self.mtu < MIN_MTU {
            return Err(ConfigError::MtuTooSmall(self.mtu));
        }
        let ceiling = SessionConfig::chunk_ceiling_for_mtu(self.mtu);
        if self.default_dsps_chunk_size > ceiling {
            return Err(ConfigError::ChunkSizeExceedsMtu {
                chunk_size: self.default_dsps_chunk_size,
                mtu: self.mtu,
            });
        }
        if self.dsps_pending_max == 0 {
            return Err(ConfigError::ZeroPendingMax);
        }

        Ok(SessionConfig {
            append_end_of_line: self.append_end_of_line,
            end_of_line: self.end_of_line,
            trailing_zero: self.trailing_zero,
            single_write_response: self.single_write_response,
            empty_line_before_ok: self.empty_line_before_ok,
            empty_line_before_error: self.empty_line_before_error,
            line_events: self.line_events,
            disallow_invalid_parsed_command: self.disallow_invalid_parsed_command,
            disallow_invalid_command: self.disallow_invalid_command,
            disallow_invalid_prefix: self.disallow_invalid_prefix,
            auto_add_prefix: self.auto_add_prefix,
            request_mtu: self.request_mtu,
            mtu: self.mtu,
            default_dsps_chunk_size: self.default_dsps_chunk_size,
            dsps_chunk_size_increase_to_mtu: self.dsps_chunk_size_increase_to_mtu,
            dsps_pending_max: self.dsps_pending_max,
            default_dsps_rx_flow: self.default_dsps_rx_flow,
            set_flow_control_on_connection: self.set_flow_control_on_connection,
            dsps_echo: self.dsps_echo,
            gatt_queue_priority: self.gatt_queue_priority,
            gatt_dequeue_before_processing: self.gatt_dequeue_before_processing,
            initial_mode: self.initial_mode,
            host_binary_request: self.host_binary_request,
            mode_change_send_binary_request: self.mode_change_send_binary_request,
            allow_inbound_binary_in_command_mode: self.allow_inbound_binary_in_command_mode,
            allow_outbound_binary_in_command_mode: self.allow_outbound_binary_in_command_mode,
            allow_inbound_command_in_binary_mode: self.allow_inbound_command_in_binary_mode,
            allow_outbound_command_in_binary_mode: self.allow_outbound_command_in_binary_mode,
            dsps_stats: self.dsps_stats,
            dsps_stats_interval_ms: self.dsps_stats_interval_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = SessionConfig::builder().build().unwrap();
        assert_eq!(config.mtu, DEFAULT_MTU);
        assert_eq!(config.dsps_stats_interval_ms, DEFAULT_STATS_INTERVAL_MS);
        assert!(config.append_end_of_line);
        assert_eq!(config.end_of_line, "\r\n");
        assert!(config.trailing_zero);
    }

    #[test]
    fn scenario_s7_chunk_size_exceeding_mtu_is_rejected() {
        let error = SessionConfig::builder()
            .mtu(23)
            .default_dsps_chunk_size(100)
            .build()
            .unwrap_err();
        assert_eq!(error, ConfigError::ChunkSizeExceedsMtu { chunk_size: 100, mtu: 23 });
    }

    #[test]
    fn zero_pending_max_is_rejected() {
        let error = SessionConfig::builder().dsps_pending_max(0).build().unwrap_err();
        assert_eq!(error, ConfigError::ZeroPendingMax);
    }

    #[test]
    fn mtu_below_minimum_is_rejected() {
        let error = SessionConfig::builder().mtu(10).build().unwrap_err();
        assert_eq!(error, ConfigError::MtuTooSmall(10));
    }
}
