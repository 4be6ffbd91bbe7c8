//! Session Orchestrator (C12): [`PeerSession`], the composition root tying
//! the scheduler, mode controller, CodeLess engine, and DSPS engine to a
//! concrete [`Transport`] and [`EventSink`] (§4.10).
//!
//! `PeerSession` owns no threads of its own — the teacher's worker-thread
//! split (§5) lives in whatever the embedder wires up; this type is driven
//! synchronously from [`Self::handle_transport_event`] and the various
//! `tick_*`/`start_*` entry points, matching how the engine's lower layers
//! are all pure state machines with no I/O of their own.

use std::collections::HashSet;
use std::io;
use std::time::Duration;

use ble_link_transport::{
    Characteristic, GattOp, GattOpKind, OpId, OpOutcome, Priority, Transport, TransportEvent, TransportOpError,
};

use crate::codeless::{CodelessAction, CodelessEngine};
use crate::config::SessionConfig;
use crate::dsps::file_receive::FileReceive;
use crate::dsps::file_send::FileSend;
use crate::dsps::pattern_send::PatternSend;
use crate::dsps::DspsEngine;
use crate::error::{ErrorKind, SessionError};
use crate::event::{ConnectionState, Event, EventSink};
use crate::io::{ByteSink, ByteSource};
use crate::mode::{HandshakeCommand, Mode, ModeController};
use crate::registry::CommandRegistry;
use crate::scheduler::{Completion, Scheduler};
use crate::stats::StatsSampler;

use std::sync::Arc;

/// A periodic [`FileSend`], paused/resumed without tracking a resume point:
/// pausing just stops [`PeerSession::tick_file_send`] from touching it.
struct ActiveFileSend {
    op: FileSend,
    active: bool,
}

/// A periodic [`PatternSend`], paused/resumed the same way as [`ActiveFileSend`].
struct ActivePatternSend {
    op: PatternSend,
    active: bool,
}

/// The composition root binding one BLE link's worth of protocol state to a
/// [`Transport`] and an [`EventSink`] (§3 Peer Session, §4.10).
pub struct PeerSession {
    config: SessionConfig,
    transport: Box<dyn Transport>,
    events: Box<dyn EventSink>,
    scheduler: Scheduler,
    mode: ModeController,
    registry: Arc<CommandRegistry>,
    codeless: CodelessEngine,
    dsps: DspsEngine,
    stats: StatsSampler,
    stats_active: bool,
    connection: ConnectionState,
    mtu: u16,
    next_id: u64,
    startup_remaining: HashSet<OpId>,
    startup_failed: bool,
    file_send: Option<ActiveFileSend>,
    pattern_send: Option<ActivePatternSend>,
    file_receive: Option<FileReceive>,
    sink_opener: Option<Box<dyn Fn(&str) -> io::Result<Box<dyn ByteSink>> + Send>>,
}

impl PeerSession {
    /// Builds a session over `transport`, starting `Disconnected`.
    #[must_use]
    pub fn new(
        transport: Box<dyn Transport>,
        registry: CommandRegistry,
        config: SessionConfig,
        events: Box<dyn EventSink>,
    ) -> Self {
        let registry = Arc::new(registry);
        let mtu = config.mtu();
        Self {
            dsps: DspsEngine::new(config.default_dsps_chunk_size, config.dsps_pending_max, config.dsps_echo),
            codeless: CodelessEngine::new(registry.clone()),
            registry,
            mode: ModeController::new(config.initial_mode, config.mode_change_send_binary_request, config.host_binary_request),
            scheduler: Scheduler::new(config.gatt_queue_priority, config.gatt_dequeue_before_processing),
            stats: StatsSampler::new(Duration::from_millis(config.dsps_stats_interval_ms)),
            stats_active: false,
            config,
            transport,
            events,
            connection: ConnectionState::Disconnected,
            mtu,
            next_id: 0,
            startup_remaining: HashSet::new(),
            startup_failed: false,
            file_send: None,
            pattern_send: None,
            file_receive: None,
            sink_opener: None,
        }
    }

    /// The current connection lifecycle state.
    #[must_use]
    pub const fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    /// The current link mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode.mode()
    }

    /// The negotiated (or configured) MTU.
    #[must_use]
    pub const fn mtu(&self) -> u16 {
        self.mtu
    }

    // --- Connection lifecycle (§4.10) ---

    /// Drives GATT-level setup assuming the transport is already physically
    /// connected: enables notifications, pushes initial DSPS RX flow state,
    /// and requests the MTU, reaching `Ready` once every startup op completes.
    pub fn connect(&mut self) {
        self.startup_failed = false;
        self.connection = ConnectionState::Connected;
        self.emit(Event::Connection(ConnectionState::Connected));
        self.connection = ConnectionState::ServiceDiscovery;
        self.emit(Event::Connection(ConnectionState::ServiceDiscovery));
        self.emit(Event::ServiceDiscovery);

        let mut ops = Vec::new();
        for characteristic in [Characteristic::CodelessFlow, Characteristic::DspsServerTx, Characteristic::DspsFlow] {
            let id = self.next_op_id();
            self.startup_remaining.insert(id);
            ops.push(GattOp::new(
                id,
                GattOpKind::WriteDescriptor { characteristic, payload: vec![0x01, 0x00] },
                Priority::High,
            ));
        }
        self.scheduler.enqueue_many(ops, &mut *self.transport);

        if self.config.set_flow_control_on_connection {
            let on = self.config.default_dsps_rx_flow;
            self.emit(Event::DspsRxFlowControl { on });
            let id = self.next_op_id();
            self.startup_remaining.insert(id);
            let payload = DspsEngine::flow_payload(on).to_vec();
            let op = GattOp::new(
                id,
                GattOpKind::WriteCharacteristic { characteristic: Characteristic::DspsFlow, payload },
                Priority::High,
            );
            self.scheduler.enqueue(op, &mut *self.transport);
        }

        if self.config.request_mtu {
            let id = self.next_op_id();
            self.startup_remaining.insert(id);
            let op = GattOp::new(id, GattOpKind::RequestMtu(self.config.mtu()), Priority::High);
            self.scheduler.enqueue(op, &mut *self.transport);
        }

        if self.startup_remaining.is_empty() {
            self.finish_startup();
        }
    }

    /// Resets all session state back to `Disconnected`. Any active
    /// streaming operation is abandoned.
    pub fn disconnect(&mut self) {
        self.connection = ConnectionState::Disconnected;
        self.scheduler = Scheduler::new(self.config.gatt_queue_priority, self.config.gatt_dequeue_before_processing);
        self.mode = ModeController::new(self.config.initial_mode, self.config.mode_change_send_binary_request, self.config.host_binary_request);
        self.codeless = CodelessEngine::new(self.registry.clone());
        self.dsps = DspsEngine::new(self.config.default_dsps_chunk_size, self.config.dsps_pending_max, self.config.dsps_echo);
        self.stats = StatsSampler::new(Duration::from_millis(self.config.dsps_stats_interval_ms));
        self.stats_active = false;
        self.startup_remaining.clear();
        self.startup_failed = false;
        self.file_send = None;
        self.pattern_send = None;
        self.file_receive = None;
        self.sink_opener = None;
        self.mtu = self.config.mtu();
        self.emit(Event::Connection(ConnectionState::Disconnected));
    }

    /// Cancels any in-progress streaming operation without tearing down the
    /// connection itself.
    pub fn stop(&mut self) {
        self.file_send = None;
        self.pattern_send = None;
        self.file_receive = None;
        self.sink_opener = None;
    }

    // --- CodeLess commands (§4.10, §6.2) ---

    /// Sends the bare two-byte `AT` ping (Scenario S1).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::OperationNotAllowed`] in Binary mode (unless
    /// configured to allow it), or whatever [`CodelessEngine::start_ping`] reports.
    pub fn ping(&mut self) -> Result<(), SessionError> {
        self.check_outbound_command_allowed()?;
        let bytes = self.codeless.start_ping(&self.config).inspect_err(|err| self.emit(Event::Error(err.kind())))?;
        self.dispatch_codeless_write(bytes);
        Ok(())
    }

    /// Sends `identifier[=args]` through the command registry.
    ///
    /// # Errors
    ///
    /// See [`Self::ping`]; also fails if a command is already pending or the
    /// identifier is unknown.
    pub fn send_command(&mut self, identifier: &str, args: Option<&str>) -> Result<(), SessionError> {
        self.check_outbound_command_allowed()?;
        let bytes = self
            .codeless
            .start_command(identifier, args, &self.config)
            .inspect_err(|err| self.emit(Event::Error(err.kind())))?;
        if let Some(bytes) = bytes {
            self.dispatch_codeless_write(bytes);
        }
        Ok(())
    }

    /// Completes a pending host-handled inbound command (`Event::HostCommand`).
    pub fn respond_to_host_command(&mut self, success: bool, body: Option<&str>) {
        if let Some(writes) = self.codeless.respond_to_host_command(success, body, &self.config) {
            for bytes in writes {
                self.dispatch_codeless_write(bytes);
            }
        }
    }

    /// Requests a transition to `target`, sending whichever handshake
    /// command applies (§4.2). A no-op if already in `target`.
    ///
    /// # Errors
    ///
    /// See [`Self::ping`].
    pub fn set_mode(&mut self, target: Mode) -> Result<(), SessionError> {
        let Some(handshake) = self.mode.request(target) else {
            return Ok(());
        };
        self.send_handshake(handshake)
    }

    /// Answers a peer `BINREQ` that was escalated via `Event::BinaryModeRequest`
    /// (`host_binary_request` configured) by sending `BINREQACK`.
    ///
    /// # Errors
    ///
    /// See [`Self::ping`].
    pub fn accept_binary_mode_request(&mut self) -> Result<(), SessionError> {
        self.send_handshake(HandshakeCommand::BinReqAck)
    }

    fn send_handshake(&mut self, handshake: HandshakeCommand) -> Result<(), SessionError> {
        let bytes = self
            .codeless
            .start_command(handshake.identifier(), None, &self.config)
            .inspect_err(|err| self.emit(Event::Error(err.kind())))?;
        if let Some(bytes) = bytes {
            self.dispatch_codeless_write(bytes);
        }
        Ok(())
    }

    fn check_outbound_command_allowed(&mut self) -> Result<(), SessionError> {
        if self.mode.mode() == Mode::Binary && !self.config.allow_outbound_command_in_binary_mode {
            self.emit(Event::Error(ErrorKind::OperationNotAllowed));
            return Err(SessionError::OperationNotAllowed("CodeLess commands are not allowed in Binary mode"));
        }
        Ok(())
    }

    // --- DSPS (§4.10, §4.4-§4.7) ---

    /// Sends `bytes` over DSPS, chunked per the configured/negotiated chunk size.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::OperationNotAllowed`] in Command mode unless
    /// `allow_outbound_binary_in_command_mode` is set.
    pub fn dsps_send(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        if self.mode.mode() == Mode::Command && !self.config.allow_outbound_binary_in_command_mode {
            self.emit(Event::Error(ErrorKind::OperationNotAllowed));
            return Err(SessionError::OperationNotAllowed("DSPS send is not allowed in Command mode"));
        }
        self.enqueue_dsps_payload(bytes, Priority::High);
        Ok(())
    }

    /// Starts sending `source` over DSPS.
    ///
    /// With `period_ms == 0`, every chunk is produced and enqueued
    /// immediately (batch, low priority); otherwise one chunk is produced
    /// per [`Self::tick_file_send`] call.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotReady`] if a file send is already running.
    pub fn start_file_send(&mut self, source: Box<dyn ByteSource>, period_ms: u64) -> Result<(), SessionError> {
        if self.file_send.is_some() {
            return Err(SessionError::NotReady("a file send is already in progress"));
        }
        let mut send = match FileSend::new(source, self.dsps.chunk_size(), period_ms) {
            Ok(send) => send,
            Err(err) => {
                self.emit(Event::DspsFileError(err.to_string()));
                return Err(SessionError::NotReady("failed to open file send source"));
            }
        };

        if period_ms == 0 {
            loop {
                match send.next_chunk() {
                    Ok(Some(chunk)) => {
                        let event = Event::DspsFileChunk { sent_chunks: send.sent_chunks(), total_chunks: send.total_chunks() };
                        self.enqueue_dsps_payload_with_event(&chunk, Priority::Low, event);
                    }
                    Ok(None) => break,
                    Err(err) => {
                        self.emit(Event::DspsFileError(err.to_string()));
                        break;
                    }
                }
            }
        } else {
            self.file_send = Some(ActiveFileSend { op: send, active: true });
        }
        Ok(())
    }

    /// Produces and enqueues the next chunk of an in-progress periodic file
    /// send. No-op if none is running or it is paused.
    pub fn tick_file_send(&mut self) {
        let Some(active) = self.file_send.as_mut() else { return };
        if !active.active {
            return;
        }
        match active.op.next_chunk() {
            Ok(Some(chunk)) => {
                let event = Event::DspsFileChunk { sent_chunks: active.op.sent_chunks(), total_chunks: active.op.total_chunks() };
                let complete = active.op.is_complete();
                self.enqueue_dsps_payload_with_event(&chunk, Priority::High, event);
                if complete {
                    self.file_send = None;
                }
            }
            Ok(None) => self.file_send = None,
            Err(err) => {
                self.emit(Event::DspsFileError(err.to_string()));
                self.file_send = None;
            }
        }
    }

    /// Cancels an in-progress file send.
    pub fn stop_file_send(&mut self) {
        self.file_send = None;
    }

    /// Starts a periodic counter-suffixed pattern send (§4.6), reading the
    /// fixed prefix block from `prefix_source` up front.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotReady`] if a pattern send is already
    /// running or the prefix could not be read.
    pub fn start_pattern_send(
        &mut self,
        prefix_source: &mut dyn ByteSource,
        digits: usize,
        trailer: Vec<u8>,
        period_ms: u64,
    ) -> Result<(), SessionError> {
        if self.pattern_send.is_some() {
            return Err(SessionError::NotReady("a pattern send is already in progress"));
        }
        let pattern = match PatternSend::new(prefix_source, self.dsps.chunk_size(), digits, trailer, period_ms) {
            Ok(pattern) => pattern,
            Err(err) => {
                self.emit(Event::DspsPatternFileError(err.to_string()));
                return Err(SessionError::NotReady("failed to load pattern prefix"));
            }
        };
        self.pattern_send = Some(ActivePatternSend { op: pattern, active: true });
        Ok(())
    }

    /// Produces and enqueues the next packet of an in-progress pattern send.
    pub fn tick_pattern_send(&mut self) {
        let Some(active) = self.pattern_send.as_mut() else { return };
        if !active.active {
            return;
        }
        let packet = active.op.next_packet();
        let counter = active.op.sent_count();
        self.enqueue_dsps_payload_with_event(&packet, Priority::High, Event::DspsPatternChunk { counter });
    }

    /// Cancels an in-progress pattern send.
    pub fn stop_pattern_send(&mut self) {
        if let Some(active) = self.pattern_send.as_mut() {
            active.op.stop();
        }
        self.pattern_send = None;
    }

    /// Arms file receive: the next DSPS header that matches starts a
    /// transfer, opening a sink via `open_sink` for each file's declared name.
    pub fn start_file_receive(&mut self, open_sink: impl Fn(&str) -> io::Result<Box<dyn ByteSink>> + Send + 'static) {
        self.file_receive = Some(FileReceive::new());
        self.sink_opener = Some(Box::new(open_sink));
    }

    fn enqueue_dsps_payload(&mut self, bytes: &[u8], priority: Priority) {
        let chunk_size = self.dsps.chunk_size();
        let outcome = self.dsps.send(bytes, chunk_size);
        for chunk in outcome.to_enqueue {
            let op = self.build_dsps_chunk_op(chunk, priority);
            self.scheduler.enqueue(op, &mut *self.transport);
        }
    }

    fn enqueue_dsps_payload_with_event(&mut self, bytes: &[u8], priority: Priority, event: Event) {
        self.enqueue_dsps_payload(bytes, priority);
        self.emit(event);
    }

    fn build_dsps_chunk_op(&mut self, payload: Vec<u8>, priority: Priority) -> GattOp {
        let id = self.next_op_id();
        GattOp::new(id, GattOpKind::WriteCommand { characteristic: Characteristic::DspsServerRx, payload }, priority)
    }

    /// Drains queued DSPS chunks back into the pending buffer (`keep=true`)
    /// or drops them (`keep=false`), and pauses periodic file/pattern sends
    /// (§4.4 `pause_dsps`). The op currently in flight is left alone.
    fn pause_dsps(&mut self, keep: bool) {
        if keep {
            let drained = self.scheduler.drain_queued(is_dsps_chunk);
            let chunks: Vec<Vec<u8>> = drained
                .into_iter()
                .filter_map(|op| match op.kind {
                    GattOpKind::WriteCommand { payload, .. } => Some(payload),
                    _ => None,
                })
                .collect();
            self.dsps.requeue_front(chunks);
        } else {
            self.scheduler.retain_queued(|kind| !is_dsps_chunk(kind));
        }
        if let Some(active) = self.file_send.as_mut() {
            active.active = false;
        }
        if let Some(active) = self.pattern_send.as_mut() {
            active.active = false;
        }
    }

    /// Re-enqueues any chunks buffered by `pause_dsps(keep=true)` and resumes
    /// periodic file/pattern sends (§4.4 `resume_dsps`).
    fn resume_dsps(&mut self) {
        let pending = self.dsps.take_pending();
        if !pending.is_empty() {
            let ops: Vec<GattOp> = pending.into_iter().map(|chunk| self.build_dsps_chunk_op(chunk, Priority::High)).collect();
            self.scheduler.enqueue_many(ops, &mut *self.transport);
        }
        if let Some(active) = self.file_send.as_mut() {
            active.active = true;
        }
        if let Some(active) = self.pattern_send.as_mut() {
            active.active = true;
        }
    }

    // --- Statistics (§4.8) ---

    /// Advances the DSPS RX throughput sampler by `elapsed`, emitting
    /// `Event::DspsStats` once per configured interval. No-op if statistics
    /// are disabled or the link is not currently in Binary mode.
    pub fn tick_stats(&mut self, elapsed: Duration) {
        if !self.config.dsps_stats || !self.stats_active {
            return;
        }
        if let Some(speed) = self.stats.advance(elapsed) {
            self.emit(Event::DspsStats { speed_bytes_per_sec: speed });
        }
    }

    // --- Transport event dispatch ---

    /// Routes one [`TransportEvent`] to the appropriate internal handler.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Complete { id, result } => self.handle_complete(id, result),
            TransportEvent::Notification { characteristic, data } => self.handle_notification(characteristic, data),
            TransportEvent::MtuChanged(mtu) => self.update_mtu(mtu),
            TransportEvent::Disconnected => self.disconnect(),
        }
    }

    fn handle_complete(&mut self, id: OpId, result: Result<OpOutcome, TransportOpError>) {
        let was_startup = self.startup_remaining.remove(&id);
        let outcome_for_routing = result.clone();
        let Some(finished) = self.scheduler.on_complete(Completion { id, result }, &mut *self.transport) else {
            return;
        };

        match outcome_for_routing {
            Ok(outcome) => self.handle_op_success(finished, outcome),
            Err(err) => self.handle_op_failure(finished, err, was_startup),
        }

        if was_startup && self.startup_remaining.is_empty() && self.connection != ConnectionState::Disconnected && !self.startup_failed {
            self.finish_startup();
        }
    }

    fn handle_op_success(&mut self, op: GattOp, outcome: OpOutcome) {
        match (op.kind, outcome) {
            (GattOpKind::ReadCharacteristic(Characteristic::CodelessOutbound), OpOutcome::Value(bytes)) => {
                self.codeless.on_outbound_read_consumed();
                let actions = self.codeless.on_inbound_payload(&bytes, &self.config);
                self.process_codeless_actions(actions);
            }
            (GattOpKind::RequestMtu(_), OpOutcome::MtuGranted(mtu)) => self.update_mtu(mtu),
            _ => {}
        }
    }

    fn handle_op_failure(&mut self, op: GattOp, err: TransportOpError, was_startup: bool) {
        tracing::warn!(error = %err, "GATT operation failed");
        self.emit(Event::Error(ErrorKind::GattOperation));
        if was_startup {
            // A CCCD write, flow-control push, or the initial MTU request
            // failed during service discovery: the session must not reach
            // `Ready` once the remaining startup ops drain (§4.9, §6.5).
            self.startup_failed = true;
            self.emit(Event::Error(ErrorKind::InitServices));
        }
        if matches!(op.kind, GattOpKind::WriteCharacteristic { characteristic: Characteristic::CodelessInbound, .. }) {
            if self.codeless.has_pending_outbound() {
                if let Some(event) = self.codeless.fail_pending_outbound() {
                    self.emit(event);
                }
            } else {
                self.codeless.drop_pending_inbound();
            }
        }
    }

    fn handle_notification(&mut self, characteristic: Characteristic, data: Vec<u8>) {
        match characteristic {
            Characteristic::CodelessFlow => self.handle_codeless_flow_notification(),
            Characteristic::DspsServerTx => self.handle_dsps_notification(data),
            Characteristic::DspsFlow => {
                if let Some(&byte) = data.first() {
                    self.handle_dsps_flow_notification(byte);
                }
            }
            _ => {}
        }
    }

    fn handle_codeless_flow_notification(&mut self) {
        self.codeless.on_flow_notification();
        let id = self.next_op_id();
        let op = GattOp::new(id, GattOpKind::ReadCharacteristic(Characteristic::CodelessOutbound), Priority::High);
        self.scheduler.enqueue(op, &mut *self.transport);
    }

    fn handle_dsps_notification(&mut self, data: Vec<u8>) {
        if self.mode.mode() == Mode::Command && !self.config.allow_inbound_binary_in_command_mode {
            return;
        }
        let outcome = self.dsps.on_notification(data);
        if let Some(echo) = outcome.echo {
            self.enqueue_dsps_payload(&echo, Priority::High);
        }
        self.stats.record_bytes(outcome.data.len() as u64);

        if let (Some(mut receive), Some(opener)) = (self.file_receive.take(), self.sink_opener.take()) {
            match receive.feed(&outcome.data, |name| opener(name)) {
                Ok(feed) => {
                    let bytes_total = receive.bytes_received() as usize;
                    let finished = feed.finished;
                    if feed.bytes_written > 0 {
                        self.emit(Event::DspsRxFileData { bytes_written: feed.bytes_written, bytes_total });
                    }
                    if let Some((name, ok)) = finished {
                        self.emit(Event::DspsRxFileCrc { name, ok });
                    } else {
                        self.file_receive = Some(receive);
                        self.sink_opener = Some(opener);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "DSPS file receive header rejected");
                    self.emit(Event::Error(ErrorKind::InvalidCommand));
                }
            }
        }

        self.emit(Event::DspsRxData(outcome.data));
    }

    fn handle_dsps_flow_notification(&mut self, byte: u8) {
        if let Some(on) = self.dsps.on_flow_notification(byte) {
            self.emit(Event::DspsTxFlowControl { on });
            if on {
                self.resume_dsps();
            } else {
                self.pause_dsps(true);
            }
        }
    }

    fn update_mtu(&mut self, mtu: u16) {
        self.mtu = mtu;
        if self.config.dsps_chunk_size_increase_to_mtu {
            self.dsps.set_chunk_size(SessionConfig::chunk_ceiling_for_mtu(mtu));
        }
    }

    fn finish_startup(&mut self) {
        self.connection = ConnectionState::Ready;
        self.emit(Event::Connection(ConnectionState::Ready));
        self.emit(Event::Ready);
    }

    /// Dispatches every [`CodelessAction`] produced by decoding an inbound
    /// payload, in order, applying the Binary-mode inbound-command gate and
    /// driving mode transitions off handshake identifiers (§4.2, §4.9).
    fn process_codeless_actions(&mut self, actions: Vec<CodelessAction>) {
        let mut suppress_next_write = false;
        for action in actions {
            match action {
                CodelessAction::WriteOutbound(bytes) => {
                    if suppress_next_write {
                        suppress_next_write = false;
                    } else {
                        self.dispatch_codeless_write(bytes);
                    }
                }
                CodelessAction::Emit(Event::InboundCommand(identifier)) => {
                    if self.mode.mode() == Mode::Binary
                        && !self.config.allow_inbound_command_in_binary_mode
                        && handshake_from_identifier(&identifier).is_none()
                    {
                        self.codeless.drop_pending_inbound();
                        self.emit(Event::Error(ErrorKind::OperationNotAllowed));
                        suppress_next_write = true;
                        continue;
                    }
                    self.handle_inbound_command(&identifier);
                    self.emit(Event::InboundCommand(identifier));
                }
                CodelessAction::Emit(Event::CommandSuccess(outcome)) => {
                    if let Some(handshake) = handshake_from_identifier(&outcome.identifier) {
                        if let Some(new_mode) = self.mode.on_handshake(handshake) {
                            self.on_mode_changed(new_mode);
                        }
                    }
                    self.emit(Event::CommandSuccess(outcome));
                }
                CodelessAction::Emit(event) => self.emit(event),
            }
        }
    }

    /// Reacts to an inbound command identifier once it is known to be
    /// allowed in the current mode: applies the mode-handshake side effects
    /// for the peer-initiated half of the BINREQ/BINEXIT exchange.
    fn handle_inbound_command(&mut self, identifier: &str) {
        if identifier == "BINREQ" {
            if self.mode.should_escalate_peer_request() {
                self.emit(Event::BinaryModeRequest);
            } else if let Err(err) = self.send_handshake(HandshakeCommand::BinReqAck) {
                tracing::warn!(error = %err, "failed to auto-acknowledge BINREQ");
            }
        } else if let Some(handshake) = handshake_from_identifier(identifier) {
            if let Some(new_mode) = self.mode.on_handshake(handshake) {
                self.on_mode_changed(new_mode);
            }
        }
    }

    /// Applies §4.2's mode-transition side effects: dropping queued non-mode
    /// CodeLess writes on entry to Binary, and starting/stopping statistics
    /// and DSPS streaming in step with the mode.
    fn on_mode_changed(&mut self, new_mode: Mode) {
        match new_mode {
            Mode::Binary => {
                self.scheduler.retain_queued(|kind| {
                    !matches!(kind, GattOpKind::WriteCharacteristic { characteristic: Characteristic::CodelessInbound, .. })
                });
                self.stats_active = true;
                self.resume_dsps();
            }
            Mode::Command => {
                self.stats_active = false;
                self.pause_dsps(false);
            }
        }
        self.emit(Event::Mode(new_mode));
    }

    fn dispatch_codeless_write(&mut self, bytes: Vec<u8>) {
        let id = self.next_op_id();
        let op = GattOp::new(
            id,
            GattOpKind::WriteCharacteristic { characteristic: Characteristic::CodelessInbound, payload: bytes },
            Priority::High,
        );
        self.scheduler.enqueue(op, &mut *self.transport);
    }

    fn next_op_id(&mut self) -> OpId {
        let id = OpId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn emit(&mut self, event: Event) {
        self.events.on_event(event);
    }
}

fn handshake_from_identifier(identifier: &str) -> Option<HandshakeCommand> {
    match identifier {
        "BINREQ" => Some(HandshakeCommand::BinReq),
        "BINREQACK" => Some(HandshakeCommand::BinReqAck),
        "BINEXIT" => Some(HandshakeCommand::BinExit),
        "BINEXITACK" => Some(HandshakeCommand::BinExitAck),
        _ => None,
    }
}

fn is_dsps_chunk(kind: &GattOpKind) -> bool {
    matches!(kind, GattOpKind::WriteCommand { characteristic: Characteristic::DspsServerRx, .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ble_link_test_support::FakeTransport;
    use std::sync::mpsc::Receiver;
    use std::sync::{Arc as StdArc, Mutex};

    fn captured_events() -> (StdArc<Mutex<Vec<Event>>>, Box<dyn EventSink>) {
        let events = StdArc::new(Mutex::new(Vec::new()));
        let clone = events.clone();
        let sink: Box<dyn EventSink> = Box::new(move |event: Event| clone.lock().unwrap().push(event));
        (events, sink)
    }

    fn connect_to_ready(session: &mut PeerSession, events_rx: &Receiver<TransportEvent>, handle: &ble_link_test_support::FakeTransportHandle) {
        session.connect();
        for (id, outcome) in [
            (0u64, Ok(OpOutcome::Written)),
            (1, Ok(OpOutcome::Written)),
            (2, Ok(OpOutcome::Written)),
            (3, Ok(OpOutcome::Written)),
            (4, Ok(OpOutcome::MtuGranted(247))),
        ] {
            handle.complete(OpId::new(id), outcome);
            session.handle_transport_event(events_rx.recv().unwrap());
        }
    }

    #[test]
    fn connect_reaches_ready_after_startup_completes() {
        let (transport, events_rx) = FakeTransport::new();
        let handle = transport.handle();
        let (captured, sink) = captured_events();
        let config = SessionConfig::builder().build().unwrap();
        let registry = CommandRegistry::with_defaults();
        let mut session = PeerSession::new(Box::new(transport), registry, config, sink);

        connect_to_ready(&mut session, &events_rx, &handle);

        assert_eq!(session.connection_state(), ConnectionState::Ready);
        assert_eq!(session.mtu(), 247);
        let events = captured.lock().unwrap();
        assert!(events.iter().any(|event| matches!(event, Event::Ready)));
    }

    #[test]
    fn scenario_s2_mode_toggle_via_peer_binreqack() {
        let (transport, events_rx) = FakeTransport::new();
        let handle = transport.handle();
        let (captured, sink) = captured_events();
        let config = SessionConfig::builder().build().unwrap();
        let registry = CommandRegistry::with_defaults();
        let mut session = PeerSession::new(Box::new(transport), registry, config, sink);

        connect_to_ready(&mut session, &events_rx, &handle);
        assert_eq!(session.connection_state(), ConnectionState::Ready);

        // Host asks for Binary mode; default config sends BINREQ first.
        session.set_mode(Mode::Binary).unwrap();
        // id 5: our outbound BINREQ write completes.
        handle.complete_write(OpId::new(5));
        session.handle_transport_event(events_rx.recv().unwrap());
        assert_eq!(session.mode(), Mode::Command, "BINREQ alone must not flip the mode");

        // Peer's data-ready notification triggers a read of CodelessOutbound (id 6),
        // which returns the peer's "OK" reply to our BINREQ.
        handle.notify(Characteristic::CodelessFlow, vec![0x01]);
        session.handle_transport_event(events_rx.recv().unwrap());
        handle.complete(OpId::new(6), Ok(OpOutcome::Value(b"\r\nOK\r\n".to_vec())));
        session.handle_transport_event(events_rx.recv().unwrap());
        assert_eq!(session.mode(), Mode::Command, "the BINREQ response terminator does not flip mode either");

        // The peer now sends its own AT+BINREQACK command inbound.
        handle.notify(Characteristic::CodelessFlow, vec![0x01]);
        session.handle_transport_event(events_rx.recv().unwrap());
        handle.complete(OpId::new(7), Ok(OpOutcome::Value(b"AT+BINREQACK\r\n".to_vec())));
        session.handle_transport_event(events_rx.recv().unwrap());

        assert_eq!(session.mode(), Mode::Binary);
        let events = captured.lock().unwrap();
        let mode_events: Vec<_> = events.iter().filter(|event| matches!(event, Event::Mode(_))).collect();
        assert_eq!(mode_events.len(), 1);
        drop(events);

        // A second identical request is an idempotent no-op: no new handshake dispatched.
        let dispatched_before = handle.dispatched().len();
        session.set_mode(Mode::Binary).unwrap();
        assert_eq!(handle.dispatched().len(), dispatched_before);
    }

    #[test]
    fn scenario_s3_flow_control_pause_and_resume() {
        let (transport, events_rx) = FakeTransport::new();
        let handle = transport.handle();
        let (_captured, sink) = captured_events();
        let config = SessionConfig::builder().default_dsps_chunk_size(20).build().unwrap();
        let registry = CommandRegistry::with_defaults();
        let mut session = PeerSession::new(Box::new(transport), registry, config, sink);

        session.connect();
        for (id, outcome) in [
            (0u64, Ok(OpOutcome::Written)),
            (1, Ok(OpOutcome::Written)),
            (2, Ok(OpOutcome::Written)),
            (3, Ok(OpOutcome::Written)),
            (4, Ok(OpOutcome::MtuGranted(23))),
        ] {
            handle.complete(OpId::new(id), outcome);
            session.handle_transport_event(events_rx.recv().unwrap());
        }

        // 50 bytes at chunk size 20 -> chunks of 20, 20, 10; batch (period_ms=0)
        // enqueues all three immediately, the first (id 5) dispatches right away.
        let source: Box<dyn ByteSource> = Box::new(crate::io::MemorySource::new(vec![7u8; 50]));
        session.start_file_send(source, 0).unwrap();
        assert_eq!(handle.dispatched().len(), 6, "startup (5) + first chunk dispatched");

        // XOFF arrives while chunk 5 is still in flight: the two queued chunks
        // (ids 6, 7) are pulled off the GATT queue into the pending buffer.
        handle.notify(Characteristic::DspsFlow, vec![0x02]);
        session.handle_transport_event(events_rx.recv().unwrap());

        // Completing the in-flight chunk must not cause a new chunk to dispatch.
        let dispatched_before = handle.dispatched().len();
        handle.complete_write(OpId::new(5));
        session.handle_transport_event(events_rx.recv().unwrap());
        assert_eq!(handle.dispatched().len(), dispatched_before, "no new chunk reaches the transport while paused");

        // XON releases the buffered chunks, re-enqueued and dispatched in order.
        handle.notify(Characteristic::DspsFlow, vec![0x01]);
        session.handle_transport_event(events_rx.recv().unwrap());
        let dispatched = handle.dispatched();
        let last = dispatched.last().unwrap();
        match last {
            ble_link_test_support::DispatchedOp::WriteCommand { payload, .. } => assert_eq!(payload.len(), 20),
            other => panic!("expected a resumed DSPS chunk write, got {other:?}"),
        }
    }
}
