//! CodeLess Engine (C4): correlates outbound commands with their responses,
//! decodes inbound lines per §4.3's receive grammars, and produces the
//! outbound bytes and [`Event`]s the session should act on.
//!
//! The engine never touches the transport directly — it is a pure state
//! machine over lines in, actions out, matching how the teacher keeps its
//! transfer-protocol state machines free of I/O so they can be driven
//! synchronously in tests.

mod grammar;

use std::sync::Arc;

use ble_link_protocol::codeless::{FramingConfig, Prefix, assemble, assemble_custom, decode_lines};

use crate::config::SessionConfig;
use crate::error::{FramingError, SessionError};
use crate::event::{CommandOutcome, Event, HostCommand};
use crate::registry::{CommandRegistry, CommandSpec, ResponseSink};

use grammar::{classify_line, extract_error_code, LineClass};

/// An in-flight outbound or inbound command (§3 Pending Command / Inbound Command).
struct Pending {
    identifier: String,
    command: Box<dyn CommandSpec>,
    lines: Vec<String>,
}

/// One outcome of feeding a line (or starting a command) into [`CodelessEngine`].
pub enum CodelessAction {
    /// Bytes that should be written to the CodeLess Inbound characteristic.
    WriteOutbound(Vec<u8>),
    /// An event the session should forward to its [`crate::event::EventSink`].
    Emit(Event),
}

/// Correlation state and receive grammar for the CodeLess protocol.
pub struct CodelessEngine {
    registry: Arc<CommandRegistry>,
    pending_out: Option<Pending>,
    pending_in: Option<Pending>,
    inbound_ready_count: u32,
    parse_buffer: Vec<String>,
}

impl CodelessEngine {
    /// Builds an engine backed by `registry`.
    #[must_use]
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self {
            registry,
            pending_out: None,
            pending_in: None,
            inbound_ready_count: 0,
            parse_buffer: Vec::new(),
        }
    }

    /// Whether an outbound command is currently awaiting a response.
    #[must_use]
    pub const fn has_pending_outbound(&self) -> bool {
        self.pending_out.is_some()
    }

    /// Count of CodeLess Flow notifications observed since the last read,
    /// incremented by [`Self::on_flow_notification`].
    #[must_use]
    pub const fn inbound_ready_count(&self) -> u32 {
        self.inbound_ready_count
    }

    /// Records a CodeLess Flow data-ready notification; the session should
    /// follow up with a read of the Outbound characteristic.
    pub fn on_flow_notification(&mut self) {
        self.inbound_ready_count += 1;
    }

    /// Called once the session's queued read of the Outbound characteristic
    /// completes, to acknowledge the ready-count was consumed.
    pub fn on_outbound_read_consumed(&mut self) {
        self.inbound_ready_count = self.inbound_ready_count.saturating_sub(1);
    }

    /// Assembles the literal two-byte `AT` ping used by Scenario S1. Bypasses
    /// the registry: the bare ping carries no identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotReady`] if a command is already pending.
    pub fn start_ping(&mut self, config: &SessionConfig) -> Result<Vec<u8>, SessionError> {
        if self.pending_out.is_some() {
            return Err(SessionError::NotReady("a command is already pending"));
        }
        self.pending_out = Some(Pending {
            identifier: String::new(),
            command: Box::new(crate::registry::PingCommand),
            lines: Vec::new(),
        });
        Ok(assemble(Prefix::Bare, "", None, &framing_config(config)))
    }

    /// Starts sending `identifier[=args]`, constructing the correlating
    /// [`CommandSpec`] from the registry.
    ///
    /// Returns `Ok(None)` when `identifier` is unrecognized and
    /// `disallow_invalid_command` is set: the attempt is dropped rather than
    /// surfaced as an error (§4.3 Argument-checking policies).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotReady`] if a command is already pending, or
    /// a [`SessionError::Registry`]/[`SessionError::Framing`] error from
    /// construction or validation.
    pub fn start_command(
        &mut self,
        identifier: &str,
        args: Option<&str>,
        config: &SessionConfig,
    ) -> Result<Option<Vec<u8>>, SessionError> {
        if self.pending_out.is_some() {
            return Err(SessionError::NotReady("a command is already pending"));
        }
        if identifier.is_empty() {
            return Err(FramingError::InvalidPrefix(identifier.to_string()).into());
        }
        let (command, _host_handled) = match self.registry.construct(identifier) {
            Ok(pair) => pair,
            Err(err) => {
                return if config.disallow_invalid_command { Ok(None) } else { Err(err.into()) };
            }
        };
        let prefix = if command.is_mode_command() { Prefix::Local } else { Prefix::Remote };
        let bytes = assemble(prefix, identifier, args, &framing_config(config));
        self.pending_out = Some(Pending {
            identifier: identifier.to_string(),
            command,
            lines: Vec::new(),
        });
        Ok(Some(bytes))
    }

    /// Sends verbatim text with no prefix/identifier wrapping applied
    /// (Custom commands, §4.3 Framing).
    #[must_use]
    pub fn assemble_custom(text: &str, config: &SessionConfig) -> Vec<u8> {
        assemble_custom(text, &framing_config(config))
    }

    /// Decodes a raw characteristic payload into lines and feeds each
    /// through the receive grammar, returning the resulting actions in order.
    pub fn on_inbound_payload(&mut self, payload: &[u8], config: &SessionConfig) -> Vec<CodelessAction> {
        let mut actions = Vec::new();
        for line in decode_lines(payload) {
            if config.line_events {
                actions.push(CodelessAction::Emit(Event::CodelessLine { outbound: false, text: line.clone() }));
            }
            actions.extend(self.on_line(&line, config));
        }
        actions
    }

    fn on_line(&mut self, line: &str, config: &SessionConfig) -> Vec<CodelessAction> {
        if self.pending_out.is_some() {
            self.on_line_with_pending(line)
        } else {
            self.on_line_without_pending(line, config)
        }
    }

    /// Receive grammar per line, with a pending outbound command (§4.3).
    fn on_line_with_pending(&mut self, line: &str) -> Vec<CodelessAction> {
        let mut actions = Vec::new();

        match classify_line(line) {
            LineClass::Empty => {
                // The generic per-line event (`on_inbound_payload`) already
                // covers this line when `line_events` is set; don't duplicate it.
                if !self.parse_buffer.is_empty() {
                    self.parse_buffer.push(String::new());
                }
            }
            LineClass::Ok => {
                let mut pending = self.pending_out.take().expect("checked by caller");
                for buffered in self.parse_buffer.drain(..) {
                    pending.command.parse_response(&buffered);
                    pending.lines.push(buffered);
                }
                actions.push(CodelessAction::Emit(Event::CommandSuccess(CommandOutcome {
                    identifier: pending.identifier,
                    lines: pending.lines,
                    error_code: None,
                })));
            }
            LineClass::Error => {
                let pending = self.pending_out.take().expect("checked by caller");
                let (error_code, messages) = split_error_lines(self.parse_buffer.drain(..).collect());
                actions.push(CodelessAction::Emit(Event::CommandError(CommandOutcome {
                    identifier: pending.identifier,
                    lines: messages,
                    error_code,
                })));
            }
            LineClass::PotentialError => {
                self.parse_buffer.push(line.to_string());
            }
            LineClass::Other => {
                let pending = self.pending_out.as_mut().expect("checked by caller");
                if self.parse_buffer.is_empty() && pending.command.parse_partial_response(line) {
                    pending.command.parse_response(line);
                    pending.lines.push(line.to_string());
                    let pending = self.pending_out.take().expect("just matched");
                    actions.push(CodelessAction::Emit(Event::CommandSuccess(CommandOutcome {
                        identifier: pending.identifier,
                        lines: pending.lines,
                        error_code: None,
                    })));
                } else {
                    self.parse_buffer.push(line.to_string());
                }
            }
        }

        actions
    }

    /// Receive grammar per line, with no pending outbound command (§4.3).
    fn on_line_without_pending(&mut self, line: &str, config: &SessionConfig) -> Vec<CodelessAction> {
        if line.is_empty() {
            return Vec::new();
        }

        if Prefix::strip(line).is_none() && !config.auto_add_prefix && config.disallow_invalid_prefix {
            return Vec::new();
        }

        let (identifier, args) = split_identifier_args(line);
        let Ok((command, host_handled)) = self.registry.construct(&identifier) else {
            if config.disallow_invalid_parsed_command {
                return Vec::new();
            }
            return vec![CodelessAction::WriteOutbound(Self::error_response(
                "Command not supported",
                config,
            ))];
        };

        if self.pending_in.is_some() {
            // The engine refuses to start a second inbound command until the
            // first is replied to (§3 invariant); drop silently.
            return Vec::new();
        }

        if host_handled {
            self.pending_in = Some(Pending { identifier: identifier.clone(), command, lines: Vec::new() });
            return vec![CodelessAction::Emit(Event::HostCommand(HostCommand {
                identifier,
                args: args.map(str::to_string),
            }))];
        }

        let mut sink = BufferingSink::default();
        command.process_inbound(args, &mut sink);

        let mut actions = vec![CodelessAction::Emit(Event::InboundCommand(identifier))];
        actions.extend(sink.into_writes(config).into_iter().map(CodelessAction::WriteOutbound));
        actions
    }

    /// Completes a host-handled inbound command with the host's chosen
    /// outcome, producing the bytes to write back to the peer.
    ///
    /// No-op (returns `None`) if no host-handled command is pending.
    pub fn respond_to_host_command(&mut self, success: bool, body: Option<&str>, config: &SessionConfig) -> Option<Vec<Vec<u8>>> {
        self.pending_in.take()?;
        let mut sink = BufferingSink::default();
        if success {
            sink.send_success(body);
        } else {
            sink.send_error(body.unwrap_or("error"));
        }
        Some(sink.into_writes(config))
    }

    fn error_response(body: &str, config: &SessionConfig) -> Vec<u8> {
        assemble_custom(&format!("ERROR: {body}"), &framing_config(config))
    }

    /// Completes a pending outbound command locally with a transport failure
    /// (§4.9: a failed write to the Inbound characteristic fails the pending
    /// command with a GATT operation error rather than waiting for a peer
    /// response that will never arrive).
    pub fn fail_pending_outbound(&mut self) -> Option<Event> {
        let pending = self.pending_out.take()?;
        self.parse_buffer.clear();
        Some(Event::CommandError(CommandOutcome {
            identifier: pending.identifier,
            lines: Vec::new(),
            error_code: Some("GATT_OPERATION_ERROR".to_string()),
        }))
    }

    /// Clears a pending inbound command without replying, used when the
    /// outbound write carrying its response fails.
    pub fn drop_pending_inbound(&mut self) {
        self.pending_in = None;
    }
}

fn split_identifier_args(line: &str) -> (String, Option<&str>) {
    let body = Prefix::strip(line).map_or(line, |(_, rest)| rest);
    match body.split_once('=') {
        Some((identifier, args)) => (identifier.to_string(), Some(args)),
        None => (body.to_string(), None),
    }
}

fn split_error_lines(lines: Vec<String>) -> (Option<String>, Vec<String>) {
    let mut error_code = None;
    let mut messages = Vec::new();
    for line in lines {
        if let Some(code) = extract_error_code(&line) {
            error_code = Some(code);
        }
        messages.push(line);
    }
    (error_code, messages)
}

fn framing_config(config: &SessionConfig) -> FramingConfig {
    FramingConfig {
        append_end_of_line: config.append_end_of_line,
        end_of_line: config.end_of_line.clone(),
        trailing_zero: config.trailing_zero,
    }
}

/// Accumulates `send_response`/`send_success`/`send_error` calls from a
/// library-handled inbound command into one outbound write (§4.3 Responses,
/// single-write mode).
#[derive(Default)]
struct BufferingSink {
    lines: Vec<String>,
    terminator: Option<String>,
}

impl ResponseSink for BufferingSink {
    fn send_response(&mut self, body: &str) {
        self.lines.push(body.to_string());
    }

    fn send_success(&mut self, body: Option<&str>) {
        if let Some(body) = body {
            self.lines.push(body.to_string());
        }
        self.terminator = Some("OK".to_string());
    }

    fn send_error(&mut self, body: &str) {
        self.lines.push(body.to_string());
        self.terminator = Some("ERROR".to_string());
    }
}

impl BufferingSink {
    /// Turns the accumulated lines into one or more outbound writes,
    /// honoring `single_write_response` and `empty_line_before_{ok,error}`
    /// (§4.3 Responses).
    fn into_writes(mut self, config: &SessionConfig) -> Vec<Vec<u8>> {
        if let Some(terminator) = self.terminator.take() {
            let pad = match terminator.as_str() {
                "OK" => config.empty_line_before_ok,
                "ERROR" => config.empty_line_before_error,
                _ => false,
            };
            if pad {
                self.lines.push(String::new());
            }
            self.lines.push(terminator);
        }

        if config.single_write_response {
            vec![assemble_custom(&self.lines.join("\n"), &framing_config(config))]
        } else {
            self.lines
                .into_iter()
                .map(|line| assemble_custom(&line, &framing_config(config)))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CommandRegistry;

    fn engine() -> CodelessEngine {
        CodelessEngine::new(Arc::new(CommandRegistry::with_defaults()))
    }

    #[test]
    fn scenario_s1_echo_ping() {
        let config = SessionConfig::builder().build().unwrap();
        let mut engine = engine();
        let bytes = engine.start_ping(&config).unwrap();
        assert_eq!(bytes, vec![0x41, 0x54, 0x0D, 0x0A, 0x00]);

        let actions = engine.on_inbound_payload(b"\r\nOK\r\n\0", &config);
        let events: Vec<_> = actions
            .into_iter()
            .filter_map(|action| match action {
                CodelessAction::Emit(event) => Some(event),
                CodelessAction::WriteOutbound(_) => None,
            })
            .collect();
        assert!(matches!(events.last(), Some(Event::CommandSuccess(outcome)) if outcome.identifier.is_empty()));
        assert!(!engine.has_pending_outbound());
    }

    #[test]
    fn error_with_code_completes_as_command_error() {
        let config = SessionConfig::builder().build().unwrap();
        let mut engine = engine();
        engine.start_command("DEVINFO", None, &config).unwrap();

        let actions = engine.on_inbound_payload(b"EC042: bad state\r\nERROR\r\n", &config);
        let event = actions.into_iter().find_map(|action| match action {
            CodelessAction::Emit(event @ Event::CommandError(_)) => Some(event),
            _ => None,
        });
        match event {
            Some(Event::CommandError(outcome)) => assert_eq!(outcome.error_code.as_deref(), Some("EC042")),
            other => panic!("expected CommandError, got {other:?}"),
        }
    }

    #[test]
    fn unknown_inbound_identifier_replies_command_not_supported() {
        let config = SessionConfig::builder().build().unwrap();
        let mut engine = engine();
        let actions = engine.on_inbound_payload(b"ATrNOPE\r\n", &config);
        let wrote = actions.into_iter().any(|action| matches!(
            action,
            CodelessAction::WriteOutbound(bytes) if String::from_utf8_lossy(&bytes).contains("Command not supported")
        ));
        assert!(wrote);
    }

    #[test]
    fn host_handled_identifier_emits_host_command_event() {
        let config = SessionConfig::builder().build().unwrap();
        let mut engine = engine();
        let actions = engine.on_inbound_payload(b"ATrGPIO=1,1\r\n", &config);
        assert!(actions.iter().any(|action| matches!(
            action,
            CodelessAction::Emit(Event::HostCommand(command)) if command.identifier == "GPIO" && command.args.as_deref() == Some("1,1")
        )));
    }

    #[test]
    fn empty_line_with_pending_command_emits_exactly_one_event() {
        // A single space has no `\r`/`\n` to normalize, so `decode_lines`
        // yields exactly one (trimmed-empty) line, isolating the case from
        // `decode_lines`' own multi-blank splitting behavior around CRLF.
        let config = SessionConfig::builder().line_events(true).build().unwrap();
        let mut engine = engine();
        engine.start_command("DEVINFO", None, &config).unwrap();

        let actions = engine.on_inbound_payload(b" ", &config);
        let blank_events = actions
            .iter()
            .filter(|action| matches!(action, CodelessAction::Emit(Event::CodelessLine { text, .. }) if text.is_empty()))
            .count();
        assert_eq!(blank_events, 1);
    }

    #[test]
    fn disallow_invalid_parsed_command_drops_instead_of_replying() {
        let config = SessionConfig::builder().disallow_invalid_parsed_command(true).build().unwrap();
        let mut engine = engine();
        let actions = engine.on_inbound_payload(b"ATrNOPE\r\n", &config);
        assert!(actions.is_empty());
    }

    #[test]
    fn disallow_invalid_prefix_drops_unprefixed_line() {
        let config = SessionConfig::builder().disallow_invalid_prefix(true).build().unwrap();
        let mut engine = engine();
        let actions = engine.on_inbound_payload(b"PING\r\n", &config);
        assert!(actions.is_empty());
    }

    #[test]
    fn auto_add_prefix_overrides_disallow_invalid_prefix() {
        let config = SessionConfig::builder()
            .disallow_invalid_prefix(true)
            .auto_add_prefix(true)
            .build()
            .unwrap();
        let mut engine = engine();
        let actions = engine.on_inbound_payload(b"PING\r\n", &config);
        assert!(actions.iter().any(|action| matches!(action, CodelessAction::Emit(Event::InboundCommand(id)) if id == "PING")));
    }

    #[test]
    fn disallow_invalid_command_drops_unknown_outbound_identifier() {
        let config = SessionConfig::builder().disallow_invalid_command(true).build().unwrap();
        let mut engine = engine();
        let bytes = engine.start_command("NOPE", None, &config).unwrap();
        assert!(bytes.is_none());
        assert!(!engine.has_pending_outbound());
    }

    #[test]
    fn empty_line_before_ok_pads_response() {
        let config = SessionConfig::builder().empty_line_before_ok(true).single_write_response(true).build().unwrap();
        let mut engine = engine();
        let actions = engine.on_inbound_payload(b"ATrPING\r\n", &config);
        let write = actions.into_iter().find_map(|action| match action {
            CodelessAction::WriteOutbound(bytes) => Some(bytes),
            CodelessAction::Emit(_) => None,
        });
        let text = String::from_utf8_lossy(&write.expect("a write should have been produced")).into_owned();
        assert!(text.starts_with("\r\nOK\r\n"), "expected an empty line padded before OK, got {text:?}");
    }

    #[test]
    fn single_write_response_false_splits_padding_into_separate_writes() {
        let config = SessionConfig::builder()
            .single_write_response(false)
            .empty_line_before_ok(true)
            .build()
            .unwrap();
        let mut engine = engine();
        let actions = engine.on_inbound_payload(b"ATrPING\r\n", &config);
        let writes = actions
            .into_iter()
            .filter(|action| matches!(action, CodelessAction::WriteOutbound(_)))
            .count();
        // The empty padding line and the `OK` terminator become two writes
        // instead of one batched write.
        assert_eq!(writes, 2);
    }
}
