// MIT License - Copyright (c) 2026 Peter Wright

//! Connection manager: owns the transport and runs the reader, writer and
//! keep-alive work on one supervisor task.
//!
//! Inbound lines are framed, decoded, folded into the [`Alarm`] model and
//! fanned out to observers, strictly in arrival order. Outbound commands
//! go through a FIFO queue with a configurable overflow policy. A
//! periodic refresh issues the `Sxx` probes needed to reconstruct state
//! the panel will not push. When the transport drops, state is marked
//! unknown and the connection is retried with jittered exponential
//! backoff.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{broadcast, watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::alarm::{Alarm, AlarmChange, ArmingMode, ArmingState, PanelInfo, ZoneState};
use crate::config::{ClientConfig, Endpoint, OverflowPolicy};
use crate::constants::S20_PROBE_LIMIT;
use crate::error::{NessError, Result};
use crate::event::{Event, StatusPayload};
use crate::packet::Packet;
use crate::protocol::Command;
use crate::subscription::{
    CallbackRegistry, ClientEvent, Disposer, StateChange, Subscription, ZoneChange,
};
use crate::transport::{Connection, SerialConnection, TcpConnection};

/// Asynchronous client for a Ness D8x/D16x/D32x panel.
///
/// # Example
///
/// ```no_run
/// use ness_client::{Client, ClientConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::new(ClientConfig::tcp("192.168.1.20", 2401).build());
///     client.connect().await?;
///
///     let mut zones = client.zone_changes();
///     tokio::spawn(async move {
///         while let Some(change) = zones.next().await {
///             println!("zone change: {change:?}");
///         }
///     });
///
///     client.arm_away(Some("1234"))?;
///
///     tokio::signal::ctrl_c().await?;
///     client.close().await?;
///     Ok(())
/// }
/// ```
pub struct Client {
    inner: Arc<ClientInner>,
    connection: StdMutex<Option<Box<dyn Connection>>>,
    supervisor: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

struct ClientInner {
    config: ClientConfig,
    alarm: RwLock<Alarm>,
    queue: CommandQueue,
    /// Taken on close so subscriber streams terminate.
    channels: StdMutex<Option<Channels>>,
    event_callbacks: CallbackRegistry<ClientEvent>,
    state_callbacks: CallbackRegistry<StateChange>,
    zone_callbacks: CallbackRegistry<ZoneChange>,
    closed: AtomicBool,
    /// Startup `S20` probes that have gone unanswered, across reconnects.
    s20_unanswered: AtomicU8,
}

struct Channels {
    event_tx: broadcast::Sender<ClientEvent>,
    state_tx: broadcast::Sender<StateChange>,
    zone_tx: broadcast::Sender<ZoneChange>,
}

/// Per-connection bookkeeping, reset on every reconnect.
struct Session {
    version_probed: bool,
    s20_startup_probed: bool,
    infer_probed: bool,
}

enum SessionEnd {
    Shutdown,
    Lost,
}

impl Client {
    /// Build a client for the configured endpoint. Nothing happens until
    /// [`connect`](Self::connect).
    pub fn new(config: ClientConfig) -> Self {
        let connection: Box<dyn Connection> = match &config.endpoint {
            Endpoint::Tcp { host, port } => Box::new(TcpConnection::new(host.clone(), *port)),
            Endpoint::Serial { path } => Box::new(SerialConnection::new(path.clone())),
        };
        Self::with_connection(config, connection)
    }

    /// Build a client over an externally supplied transport. The
    /// configured endpoint is ignored.
    pub fn with_connection(config: ClientConfig, connection: Box<dyn Connection>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let mut alarm = Alarm::new(config.infer_arming_state);
        alarm.set_notify_first_zone_change(config.notify_first_zone_change);
        let inner = ClientInner {
            alarm: RwLock::new(alarm),
            queue: CommandQueue::new(config.command_queue_capacity, config.overflow_policy),
            channels: StdMutex::new(Some(Channels {
                event_tx: broadcast::channel(config.event_buffer).0,
                state_tx: broadcast::channel(config.event_buffer).0,
                zone_tx: broadcast::channel(config.event_buffer).0,
            })),
            event_callbacks: CallbackRegistry::new(),
            state_callbacks: CallbackRegistry::new(),
            zone_callbacks: CallbackRegistry::new(),
            closed: AtomicBool::new(false),
            s20_unanswered: AtomicU8::new(0),
            config,
        };
        Self {
            inner: Arc::new(inner),
            connection: StdMutex::new(Some(connection)),
            supervisor: tokio::sync::Mutex::new(None),
            shutdown_tx,
        }
    }

    /// Establish the transport and start the reader/writer/keep-alive
    /// loop. Idempotent while connected.
    pub async fn connect(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(NessError::Closed);
        }

        let mut supervisor = self.supervisor.lock().await;
        if supervisor.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }

        let mut connection = self
            .connection
            .lock()
            .expect("connection slot poisoned")
            .take()
            .ok_or(NessError::Closed)?;

        match timeout(self.inner.config.connect_timeout, connection.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                *self.connection.lock().expect("connection slot poisoned") = Some(connection);
                return Err(err);
            }
            Err(_) => {
                *self.connection.lock().expect("connection slot poisoned") = Some(connection);
                return Err(NessError::ConnectTimeout);
            }
        }

        let inner = self.inner.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        *supervisor = Some(tokio::spawn(run(inner, connection, shutdown_rx)));
        Ok(())
    }

    /// Graceful shutdown: drain queued commands up to the configured
    /// deadline, stop all tasks, release the transport. After this
    /// resolves no task remains scheduled and further sends fail with
    /// [`NessError::Closed`].
    pub async fn close(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(true);

        if let Some(task) = self.supervisor.lock().await.take() {
            let _ = task.await;
        }
        // Never connected: release the idle transport.
        if let Some(mut connection) = self
            .connection
            .lock()
            .expect("connection slot poisoned")
            .take()
        {
            let _ = connection.close().await;
        }
        // Closing the channels ends every subscription stream.
        self.inner.channels.lock().expect("channels poisoned").take();
        Ok(())
    }

    /// Enqueue a raw keypad string.
    pub fn send_command(&self, keys: &str) -> Result<()> {
        self.submit(Command::Keys {
            keys: keys.to_string(),
        })
    }

    /// Arm in away mode, optionally with a user code.
    pub fn arm_away(&self, code: Option<&str>) -> Result<()> {
        self.submit(Command::ArmAway {
            code: code.map(String::from),
        })
    }

    /// Arm in home mode, optionally with a user code.
    pub fn arm_home(&self, code: Option<&str>) -> Result<()> {
        self.submit(Command::ArmHome {
            code: code.map(String::from),
        })
    }

    /// Disarm with a user code.
    pub fn disarm(&self, code: &str) -> Result<()> {
        self.submit(Command::Disarm {
            code: code.to_string(),
        })
    }

    /// Raise a panic alarm with a user code.
    pub fn panic(&self, code: &str) -> Result<()> {
        self.submit(Command::Panic {
            code: code.to_string(),
        })
    }

    /// Switch auxiliary output 1-8 on or off.
    pub fn aux(&self, output: u8, state: bool) -> Result<()> {
        self.submit(Command::Aux { output, on: state })
    }

    /// Enqueue the full suite of status probes (zones, miscellaneous
    /// alarms, arming).
    pub fn update_status(&self) -> Result<()> {
        for id in [0, 20, 13, 14] {
            self.submit(Command::StatusRequest { id })?;
        }
        Ok(())
    }

    fn submit(&self, command: Command) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(NessError::Closed);
        }
        command.validate()?;
        self.inner.queue.push(command.to_wire_string())
    }

    /// Lazy sequence of every decoded message and decode error.
    pub fn events(&self) -> Subscription<ClientEvent> {
        self.subscribe(|channels| &channels.event_tx)
    }

    /// Lazy sequence of arming state transitions.
    pub fn state_changes(&self) -> Subscription<StateChange> {
        self.subscribe(|channels| &channels.state_tx)
    }

    /// Lazy sequence of zone state transitions.
    pub fn zone_changes(&self) -> Subscription<ZoneChange> {
        self.subscribe(|channels| &channels.zone_tx)
    }

    fn subscribe<T: Clone>(
        &self,
        select: impl Fn(&Channels) -> &broadcast::Sender<T>,
    ) -> Subscription<T> {
        let channels = self.inner.channels.lock().expect("channels poisoned");
        match channels.as_ref() {
            Some(channels) => Subscription::new(select(channels).subscribe()),
            // Already closed: a subscription that ends immediately.
            None => Subscription::new(broadcast::channel(1).1),
        }
    }

    /// Register a callback for every decoded message; returns a disposer.
    pub fn on_event(&self, handler: impl Fn(&ClientEvent) + Send + Sync + 'static) -> Disposer {
        self.inner.event_callbacks.register(handler)
    }

    /// Register a callback for arming state transitions.
    pub fn on_state_change(
        &self,
        handler: impl Fn(&StateChange) + Send + Sync + 'static,
    ) -> Disposer {
        self.inner.state_callbacks.register(handler)
    }

    /// Register a callback for zone state transitions.
    pub fn on_zone_change(
        &self,
        handler: impl Fn(&ZoneChange) + Send + Sync + 'static,
    ) -> Disposer {
        self.inner.zone_callbacks.register(handler)
    }

    /// Current arming state.
    pub async fn arming_state(&self) -> ArmingState {
        self.inner.alarm.read().await.arming_state()
    }

    /// The mode selected by the last arm event, if any.
    pub async fn arming_mode(&self) -> Option<ArmingMode> {
        self.inner.alarm.read().await.arming_mode()
    }

    /// Current state of one zone (1-based).
    pub async fn zone_state(&self, zone: u8) -> ZoneState {
        self.inner.alarm.read().await.zone_state(zone)
    }

    /// Current state of every addressable zone.
    pub async fn zone_states(&self) -> Vec<ZoneState> {
        self.inner.alarm.read().await.zone_states().to_vec()
    }

    /// Panel model and version, once an `S17` reply has been seen.
    pub async fn panel_info(&self) -> Option<PanelInfo> {
        self.inner.alarm.read().await.panel_info().cloned()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Supervisor: alternates between connected sessions and reconnection
/// until shutdown.
async fn run(
    inner: Arc<ClientInner>,
    mut connection: Box<dyn Connection>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if !connection.connected()
            && !reconnect(&inner, connection.as_mut(), &mut shutdown_rx).await
        {
            break;
        }

        inner.emit_event(ClientEvent::Connected);
        match session(&inner, connection.as_mut(), &mut shutdown_rx).await {
            SessionEnd::Shutdown => break,
            SessionEnd::Lost => {
                warn!("Connection to panel lost");
                inner.emit_event(ClientEvent::Disconnected);
                let changes = inner.alarm.write().await.mark_unknown();
                inner.emit_changes(changes);
                let _ = connection.close().await;
            }
        }
    }

    drain_queue(&inner, connection.as_mut()).await;
    let _ = connection.close().await;
    debug!("Supervisor stopped");
}

/// Retry the transport with jittered exponential backoff. Returns false
/// if shutdown was requested instead.
async fn reconnect(
    inner: &ClientInner,
    connection: &mut dyn Connection,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> bool {
    let mut attempt = 0u32;
    loop {
        if *shutdown_rx.borrow_and_update() {
            return false;
        }
        match timeout(inner.config.connect_timeout, connection.connect()).await {
            Ok(Ok(())) => {
                info!("Reconnected to panel");
                return true;
            }
            Ok(Err(err)) => warn!("Failed to connect: {err}"),
            Err(_) => warn!("Connect attempt timed out"),
        }

        let delay = backoff_delay(&inner.config, attempt);
        attempt += 1;
        debug!("Retrying in {:.1}s", delay.as_secs_f64());
        tokio::select! {
            _ = sleep(delay) => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return false;
                }
            }
        }
    }
}

fn backoff_delay(config: &ClientConfig, attempt: u32) -> Duration {
    let exp = config.backoff_base.saturating_mul(1u32 << attempt.min(16));
    let capped = exp.min(config.backoff_cap);
    // +/-20% so a fleet of clients does not reconnect in lockstep.
    capped.mul_f64(rand::thread_rng().gen_range(0.8..=1.2))
}

enum Wake {
    Shutdown,
    Stale,
    Refresh,
    Command(String),
    Line(Result<Option<String>>),
}

/// One connected session: read, write and refresh until the link drops or
/// shutdown is requested.
async fn session(
    inner: &ClientInner,
    connection: &mut dyn Connection,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let keepalive = inner.config.effective_keepalive_timeout();
    let mut refresh = tokio::time::interval(inner.config.update_interval);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut session = Session {
        version_probed: false,
        s20_startup_probed: false,
        infer_probed: false,
    };
    let mut last_recv = Instant::now();

    loop {
        if *shutdown_rx.borrow_and_update() {
            return SessionEnd::Shutdown;
        }

        let wake = tokio::select! {
            _ = shutdown_rx.changed() => Wake::Shutdown,
            _ = tokio::time::sleep_until(last_recv + keepalive) => Wake::Stale,
            // The first tick fires immediately, issuing the initial
            // refresh as soon as the connection is up.
            _ = refresh.tick() => Wake::Refresh,
            command = inner.queue.pop() => Wake::Command(command),
            line = connection.readline() => Wake::Line(line),
        };

        match wake {
            Wake::Shutdown => {
                if *shutdown_rx.borrow() {
                    return SessionEnd::Shutdown;
                }
            }
            Wake::Stale => {
                warn!(
                    "No data from panel for {:.0}s, connection appears stale",
                    keepalive.as_secs_f64()
                );
                return SessionEnd::Lost;
            }
            Wake::Refresh => request_refresh(inner, &mut session).await,
            Wake::Command(command) => {
                let payload = Packet::user_interface_request(0, command.as_str()).encode() + "\r\n";
                debug!("Sending payload: {payload:?}");
                if let Err(err) = connection.write_all(payload.as_bytes()).await {
                    warn!("Write failed: {err}");
                    // Retain the command for the next connection.
                    inner.queue.push_front(command);
                    return SessionEnd::Lost;
                }
            }
            Wake::Line(Ok(Some(line))) => {
                last_recv = Instant::now();
                if !line.is_empty() {
                    process_line(inner, &line, &mut session).await;
                }
            }
            Wake::Line(Ok(None)) => {
                debug!("Panel closed the connection");
                return SessionEnd::Lost;
            }
            Wake::Line(Err(err)) => {
                warn!("Read failed: {err}");
                return SessionEnd::Lost;
            }
        }
    }
}

/// Queue the periodic probe suite: unsealed zones, miscellaneous alarms,
/// arming, plus the version once per connection. `S20` is probed once at
/// session start while the panel's width is unknown, and suppressed
/// entirely after [`S20_PROBE_LIMIT`] silent probes.
async fn request_refresh(inner: &ClientInner, session: &mut Session) {
    let expanded = inner.alarm.read().await.is_expanded();
    debug!("Requesting state refresh");
    inner.queue.push_internal("S00");
    if expanded {
        inner.queue.push_internal("S20");
    } else if !session.s20_startup_probed
        && inner.s20_unanswered.load(Ordering::SeqCst) < S20_PROBE_LIMIT
    {
        session.s20_startup_probed = true;
        inner.s20_unanswered.fetch_add(1, Ordering::SeqCst);
        inner.queue.push_internal("S20");
    }
    inner.queue.push_internal("S13");
    inner.queue.push_internal("S14");
    if !session.version_probed {
        session.version_probed = true;
        inner.queue.push_internal("S17");
    }
}

/// Decode one line and feed it through the model and out to observers.
async fn process_line(inner: &ClientInner, line: &str, session: &mut Session) {
    debug!("Decoding line: {line:?}");
    let (packet, checksum_error) =
        match Packet::decode_with(line, inner.config.validate_checksums) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("Failed to decode packet: {err}");
                inner.emit_event(ClientEvent::DecodeError(err));
                return;
            }
        };
    if let Some(err) = checksum_error {
        // Lenient mode: the packet still flows, with an error marker
        // delivered alongside it.
        warn!("Checksum mismatch tolerated: {err}");
        inner.emit_event(ClientEvent::DecodeError(err));
    }

    let event = match Event::decode(&packet) {
        Ok(event) => event,
        Err(err) => {
            warn!("Failed to decode payload: {err}");
            inner.emit_event(ClientEvent::DecodeError(err));
            return;
        }
    };

    // A zones-17-32 reply (empty or not) proves S20 is being answered.
    if let Event::StatusUpdate(update) = &event {
        if matches!(update.payload, StatusPayload::Zones { base: 17, .. }) {
            inner.s20_unanswered.store(0, Ordering::SeqCst);
        }
    }

    let changes = inner.alarm.write().await.handle_event(&event);
    let zone_changed = changes
        .iter()
        .any(|change| matches!(change, AlarmChange::Zone { .. }));

    inner.emit_event(ClientEvent::Event(event));
    inner.emit_changes(changes);

    // Zone activity before any arming information: probe rather than
    // guess.
    if inner.config.infer_arming_state && zone_changed && !session.infer_probed {
        let arming_unknown =
            inner.alarm.read().await.arming_state() == ArmingState::Unknown;
        if arming_unknown {
            debug!("Zone change with unknown arming state; requesting snapshot");
            session.infer_probed = true;
            inner.queue.push_internal("S14");
        }
    }
}

/// Best-effort drain of queued commands before the transport closes.
async fn drain_queue(inner: &ClientInner, connection: &mut dyn Connection) {
    if !connection.connected() {
        return;
    }
    let deadline = Instant::now() + inner.config.shutdown_timeout;
    while let Some(command) = inner.queue.try_pop() {
        let payload = Packet::user_interface_request(0, command.as_str()).encode() + "\r\n";
        match tokio::time::timeout_at(deadline, connection.write_all(payload.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!("Write failed during drain: {err}");
                return;
            }
            Err(_) => {
                warn!("Shutdown deadline reached with commands still queued");
                return;
            }
        }
    }
}

impl ClientInner {
    fn emit_event(&self, event: ClientEvent) {
        self.event_callbacks.emit(&event);
        let channels = self.channels.lock().expect("channels poisoned");
        if let Some(channels) = channels.as_ref() {
            let _ = channels.event_tx.send(event);
        }
    }

    fn emit_changes(&self, changes: Vec<AlarmChange>) {
        for change in changes {
            match change {
                AlarmChange::State { state, mode } => {
                    let change = StateChange { state, mode };
                    self.state_callbacks.emit(&change);
                    let channels = self.channels.lock().expect("channels poisoned");
                    if let Some(channels) = channels.as_ref() {
                        let _ = channels.state_tx.send(change);
                    }
                }
                AlarmChange::Zone { zone, state } => {
                    let change = ZoneChange { zone, state };
                    self.zone_callbacks.emit(&change);
                    let channels = self.channels.lock().expect("channels poisoned");
                    if let Some(channels) = channels.as_ref() {
                        let _ = channels.zone_tx.send(change);
                    }
                }
            }
        }
    }
}

/// FIFO of outbound wire keystrings with a bounded capacity and an
/// explicit overflow policy.
struct CommandQueue {
    entries: StdMutex<VecDeque<String>>,
    notify: Notify,
    capacity: Option<usize>,
    policy: OverflowPolicy,
}

impl CommandQueue {
    fn new(capacity: Option<usize>, policy: OverflowPolicy) -> Self {
        Self {
            entries: StdMutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity,
            policy,
        }
    }

    fn push(&self, command: String) -> Result<()> {
        {
            let mut entries = self.entries.lock().expect("command queue poisoned");
            if let Some(capacity) = self.capacity {
                if entries.len() >= capacity {
                    match self.policy {
                        OverflowPolicy::DropOldest => {
                            let dropped = entries.pop_front();
                            warn!("Command queue full, dropping {dropped:?}");
                        }
                        OverflowPolicy::Reject => return Err(NessError::QueueFull),
                    }
                }
            }
            entries.push_back(command);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Internal probes are best-effort; overflow only warns.
    fn push_internal(&self, command: &str) {
        if self.push(command.to_string()).is_err() {
            warn!("Command queue full, skipping {command}");
        }
    }

    /// Requeue at the head after a failed write. Bypasses the capacity
    /// bound so retained intent is never silently lost.
    fn push_front(&self, command: String) {
        self.entries
            .lock()
            .expect("command queue poisoned")
            .push_front(command);
        self.notify.notify_one();
    }

    fn try_pop(&self) -> Option<String> {
        self.entries
            .lock()
            .expect("command queue poisoned")
            .pop_front()
    }

    async fn pop(&self) -> String {
        loop {
            if let Some(command) = self.try_pop() {
                return command;
            }
            self.notify.notified().await;
        }
    }
}
