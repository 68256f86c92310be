//! Multiplexed AMI client over one connection

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::{
    actions::{self, Originate},
    buffer::FrameReader,
    command::{Action, ActionIdGenerator},
    constants::{
        DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_EVENT_MASK, DEFAULT_TIMEOUT_MS, MAX_EVENT_QUEUE_SIZE,
    },
    error::{AmiError, AmiResult},
    headers::AmiHeader,
    protocol::{parse_routable, ErrorResponse},
    record::Record,
    session::{list_step, AmiSession, ListStep},
    transport::{TcpSendHalf, TcpTransport, Transport, TransportRecv, TransportSend},
};

/// A parsed frame as handed from the reader task to a waiter.
type Routed = (Record, Option<ErrorResponse>);

fn into_result((record, error): Routed) -> AmiResult<Record> {
    match error {
        Some(err) => Err(err.into()),
        None => Ok(record),
    }
}

/// Connection status for the AMI client
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionStatus {
    /// The reader task is running.
    Connected,
    /// The reader task has stopped.
    Disconnected(DisconnectReason),
}

/// Reason for disconnection
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DisconnectReason {
    /// Transport error (the error is not Clone, so only its message is kept)
    IoError(String),
    /// Input violated framing: a frame or buffer over its size limit
    ProtocolError(String),
    /// The peer closed the connection
    ConnectionClosed,
    /// Client called disconnect()
    ClientRequested,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::IoError(msg) => write!(f, "I/O error: {}", msg),
            DisconnectReason::ProtocolError(msg) => write!(f, "protocol error: {}", msg),
            DisconnectReason::ConnectionClosed => write!(f, "connection closed"),
            DisconnectReason::ClientRequested => write!(f, "client requested disconnect"),
        }
    }
}

/// Options for AMI connection configuration.
///
/// Use [`Default::default()`] for standard settings.
#[derive(Debug, Clone)]
pub struct AmiConnectOptions {
    /// Capacity of the channel delivering unclaimed events. Default: 1000.
    pub event_queue_size: usize,
    /// TCP connect timeout. Default: 2 seconds.
    pub connect_timeout: Duration,
    /// Initial response timeout for actions, see
    /// [`AmiClient::set_command_timeout`]. Default: 5 seconds.
    pub command_timeout: Duration,
    /// Event mask sent with `Login`. Default: `on`.
    pub events: String,
}

impl Default for AmiConnectOptions {
    fn default() -> Self {
        Self {
            event_queue_size: MAX_EVENT_QUEUE_SIZE,
            connect_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            events: DEFAULT_EVENT_MASK.to_string(),
        }
    }
}

/// A registered [`AmiClient::wait_for_event`] call.
struct EventWaiter {
    event: String,
    needles: Vec<String>,
    tx: oneshot::Sender<Routed>,
}

impl EventWaiter {
    fn matches(&self, event: &str, text: &str) -> bool {
        self.event == event
            && self
                .needles
                .iter()
                .all(|n| text.contains(n.as_str()))
    }
}

/// Shared state between AmiClient and the reader task
struct SharedState {
    /// In-flight requests by ActionID
    pending: Mutex<HashMap<String, mpsc::UnboundedSender<Routed>>>,
    /// Event waiters in registration order
    event_waiters: Mutex<Vec<EventWaiter>>,
    ids: ActionIdGenerator,
    /// Command response timeout in milliseconds (0 = disabled)
    command_timeout_ms: AtomicU64,
    /// Set when events have been dropped due to a full queue
    event_overflow: AtomicBool,
    /// Total count of dropped events
    dropped_event_count: AtomicU64,
    /// Set by disconnect() so the reader reports ClientRequested
    closing: AtomicBool,
}

/// AMI client handle (Clone + Send)
///
/// Any number of tasks may send actions and wait for events at once. A
/// background reader task routes each frame to the waiter it belongs to:
/// responses by `ActionID`, events to the first matching
/// [`wait_for_event`](Self::wait_for_event) call, and everything else to the
/// [`AmiEventStream`].
pub struct AmiClient<W = TcpSendHalf> {
    writer: Arc<Mutex<W>>,
    shared: Arc<SharedState>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl<W> Clone for AmiClient<W> {
    fn clone(&self) -> Self {
        Self {
            writer: self
                .writer
                .clone(),
            shared: self
                .shared
                .clone(),
            status_rx: self
                .status_rx
                .clone(),
        }
    }
}

impl<W> std::fmt::Debug for AmiClient<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiClient")
            .field("status", &*self.status_rx.borrow())
            .finish()
    }
}

/// Event stream receiver (!Clone)
///
/// Receives events no [`AmiClient::wait_for_event`] call claimed.
///
/// An `Err(AmiError::QueueFull)` item means events were dropped because the
/// application fell behind; [`AmiClient::dropped_event_count`] has the exact
/// count. An event frame carrying `Response: Error` arrives as
/// `Err(AmiError::Protocol)`.
pub struct AmiEventStream {
    rx: mpsc::Receiver<AmiResult<Record>>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl std::fmt::Debug for AmiEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiEventStream")
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Try to send an event (or error) to the application via try_send.
///
/// If the channel is full, drop the item, set the overflow flag, and
/// increment the dropped counter. Before each dispatch, check the overflow
/// flag and attempt to deliver a QueueFull error notification first.
/// Returns false once the stream has been dropped.
fn dispatch_event(
    event_tx: &mpsc::Sender<AmiResult<Record>>,
    shared: &SharedState,
    item: AmiResult<Record>,
) -> bool {
    if shared
        .event_overflow
        .load(Ordering::Relaxed)
    {
        match event_tx.try_send(Err(AmiError::QueueFull)) {
            Ok(()) => {
                shared
                    .event_overflow
                    .store(false, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return false,
            Err(mpsc::error::TrySendError::Full(_)) => {}
        }
    }

    match event_tx.try_send(item) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Closed(_)) => false,
        Err(mpsc::error::TrySendError::Full(_)) => {
            shared
                .event_overflow
                .store(true, Ordering::Relaxed);
            shared
                .dropped_event_count
                .fetch_add(1, Ordering::Relaxed);
            warn!("Event queue full, dropping event");
            true
        }
    }
}

/// Deliver one frame to whoever is waiting for it.
async fn route_frame(text: &str, shared: &SharedState, event_tx: &mpsc::Sender<AmiResult<Record>>) {
    let (record, error) = parse_routable(text);
    if record.is_empty() {
        trace!("[RECV] Dropping frame without fields");
        return;
    }

    let mut frame = (record, error);
    let action_id = frame
        .0
        .get(AmiHeader::ActionId)
        .to_string();
    if !action_id.is_empty() {
        let mut pending = shared
            .pending
            .lock()
            .await;
        if let Some(tx) = pending.get(&action_id) {
            match tx.send(frame) {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    trace!("[RECV] Request {} was abandoned", action_id);
                    pending.remove(&action_id);
                    frame = returned;
                }
            }
        }
    }

    let Some(event) = frame
        .0
        .event()
    else {
        debug!(
            "[RECV] Dropping response for ActionID {:?} with no pending request",
            action_id
        );
        return;
    };
    let mut waiters = shared
        .event_waiters
        .lock()
        .await;
    waiters.retain(|w| !w.tx.is_closed());
    let found = waiters
        .iter()
        .position(|w| w.matches(event, text));
    let claimed = found.map(|pos| waiters.remove(pos));
    drop(waiters);

    if let Some(waiter) = claimed {
        match waiter
            .tx
            .send(frame)
        {
            Ok(()) => return,
            Err(returned) => frame = returned,
        }
    }

    if !dispatch_event(event_tx, shared, into_result(frame)) {
        trace!("[RECV] Event stream dropped, discarding event");
    }
}

/// Background reader loop
async fn reader_loop<R: TransportRecv>(
    reader: R,
    frames: FrameReader,
    shared: Arc<SharedState>,
    status_tx: watch::Sender<ConnectionStatus>,
    event_tx: mpsc::Sender<AmiResult<Record>>,
) {
    let result = std::panic::AssertUnwindSafe(reader_loop_inner(
        reader,
        frames,
        shared.clone(),
        &event_tx,
    ));
    let reason = match futures_util::FutureExt::catch_unwind(result).await {
        Ok(reason) => reason,
        Err(_) => {
            tracing::error!("reader task panicked");
            DisconnectReason::IoError("reader task panicked".to_string())
        }
    };
    info!("[RECV] Reader stopped: {}", reason);
    let _ = status_tx.send(ConnectionStatus::Disconnected(reason));

    // Waiters registered before this point see their sender dropped; later
    // ones observe the status change.
    shared
        .pending
        .lock()
        .await
        .clear();
    shared
        .event_waiters
        .lock()
        .await
        .clear();
    // Closing the event stream last means a consumer that sees it end also
    // sees the final status.
    drop(event_tx);
}

async fn reader_loop_inner<R: TransportRecv>(
    mut reader: R,
    mut frames: FrameReader,
    shared: Arc<SharedState>,
    event_tx: &mpsc::Sender<AmiResult<Record>>,
) -> DisconnectReason {
    loop {
        // Drain complete frames before reading more
        match frames.next_frame() {
            Ok(Some(text)) => {
                route_frame(&text, &shared, event_tx).await;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Framing error: {}", e);
                return DisconnectReason::ProtocolError(e.to_string());
            }
        }

        match reader
            .recv()
            .await
        {
            Ok(chunk) => {
                if let Err(e) = frames.push(&chunk) {
                    warn!("Buffer error: {}", e);
                    return DisconnectReason::ProtocolError(e.to_string());
                }
            }
            Err(AmiError::ConnectionClosed) => {
                if shared
                    .closing
                    .load(Ordering::Relaxed)
                {
                    return DisconnectReason::ClientRequested;
                }
                info!("Connection closed (EOF)");
                return DisconnectReason::ConnectionClosed;
            }
            Err(e) => {
                warn!("Read error: {}", e);
                return DisconnectReason::IoError(e.to_string());
            }
        }
    }
}

impl AmiClient {
    /// Connect to the manager interface and log in.
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
        secret: &str,
    ) -> AmiResult<(Self, AmiEventStream)> {
        Self::connect_with_options(host, port, username, secret, AmiConnectOptions::default()).await
    }

    /// Connect and log in with custom options
    ///
    /// The banner and login response must each arrive within the command
    /// timeout.
    pub async fn connect_with_options(
        host: &str,
        port: u16,
        username: &str,
        secret: &str,
        options: AmiConnectOptions,
    ) -> AmiResult<(Self, AmiEventStream)> {
        info!("Connecting to Asterisk at {}:{}", host, port);

        let transport = TcpTransport::connect(host, port, options.connect_timeout).await?;
        let mut session = AmiSession::new(transport);

        let limit = options.command_timeout;
        let timeout_ms = limit.as_millis() as u64;
        let version = timeout(limit, session.read_banner())
            .await
            .map_err(|_| AmiError::Timeout { timeout_ms })??;
        timeout(limit, session.login(username, secret, &options.events))
            .await
            .map_err(|_| AmiError::Timeout { timeout_ms })??;

        info!(
            "Successfully connected and authenticated to Asterisk (AMI {})",
            version
        );
        Ok(session.into_client(options))
    }
}

impl<W: TransportSend + 'static> AmiClient<W> {
    /// Spawn the reader task over a connected transport.
    ///
    /// Nothing is sent: log in with [`login`](Self::login) if the transport
    /// is not yet authenticated. Must be called within a tokio runtime.
    pub fn from_transport<T>(transport: T, options: AmiConnectOptions) -> (Self, AmiEventStream)
    where
        T: Transport<SendHalf = W>,
    {
        Self::from_parts(
            transport,
            FrameReader::new(),
            ActionIdGenerator::new(),
            options,
        )
    }

    pub(crate) fn from_parts<T>(
        transport: T,
        frames: FrameReader,
        ids: ActionIdGenerator,
        options: AmiConnectOptions,
    ) -> (Self, AmiEventStream)
    where
        T: Transport<SendHalf = W>,
    {
        let queue_size = options
            .event_queue_size
            .max(1);

        let (read_half, write_half) = transport.into_split();

        let shared = Arc::new(SharedState {
            pending: Mutex::new(HashMap::new()),
            event_waiters: Mutex::new(Vec::new()),
            ids,
            command_timeout_ms: AtomicU64::new(options.command_timeout.as_millis() as u64),
            event_overflow: AtomicBool::new(false),
            dropped_event_count: AtomicU64::new(0),
            closing: AtomicBool::new(false),
        });

        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connected);
        let status_rx2 = status_tx.subscribe();
        let (event_tx, event_rx) = mpsc::channel(queue_size);

        tokio::spawn(reader_loop(
            read_half,
            frames,
            shared.clone(),
            status_tx,
            event_tx,
        ));

        let client = AmiClient {
            writer: Arc::new(Mutex::new(write_half)),
            shared,
            status_rx,
        };

        let stream = AmiEventStream {
            rx: event_rx,
            status_rx: status_rx2,
        };

        (client, stream)
    }

    fn ensure_connected(&self) -> AmiResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(AmiError::NotConnected)
        }
    }

    async fn write(&self, action: &Action, wire: &str) -> AmiResult<()> {
        debug!("[SEND] {}", action);
        let mut writer = self
            .writer
            .lock()
            .await;
        writer
            .send(wire)
            .await
    }

    /// Register a response channel for `action_id`.
    async fn register(&self, action_id: &str) -> AmiResult<mpsc::UnboundedReceiver<Routed>> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut pending = self
                .shared
                .pending
                .lock()
                .await;
            pending.retain(|_, tx| !tx.is_closed());
            if pending.contains_key(action_id) {
                return Err(AmiError::InvalidField {
                    name: AmiHeader::ActionId.to_string(),
                    reason: format!("{:?} is already in flight", action_id),
                });
            }
            pending.insert(action_id.to_string(), tx);
        }
        // The reader sets the status before clearing registrations, so a
        // registration that raced with shutdown is caught here.
        self.ensure_connected()?;
        Ok(rx)
    }

    async fn unregister(&self, action_id: &str) {
        self.shared
            .pending
            .lock()
            .await
            .remove(action_id);
    }

    /// Next correlated frame, bounded by the command timeout.
    async fn next_routed(&self, rx: &mut mpsc::UnboundedReceiver<Routed>) -> AmiResult<Routed> {
        let timeout_ms = self
            .shared
            .command_timeout_ms
            .load(Ordering::Relaxed);
        let next = if timeout_ms == 0 {
            rx.recv()
                .await
        } else {
            timeout(Duration::from_millis(timeout_ms), rx.recv())
                .await
                .map_err(|_| AmiError::Timeout { timeout_ms })?
        };
        next.ok_or(AmiError::WaiterClosed)
    }

    /// Send an action and wait for its response.
    ///
    /// An action without an `ActionID` gets a generated one. A `Response:
    /// Error` reply is returned as [`AmiError::Protocol`]. The wait is
    /// bounded by the command timeout.
    ///
    /// ```rust,no_run
    /// # async fn example(client: &asterisk_ami_tokio::AmiClient) -> Result<(), asterisk_ami_tokio::AmiError> {
    /// use asterisk_ami_tokio::Action;
    ///
    /// let reply = client
    ///     .send_action(Action::new("Getvar").field("Variable", "GLOBAL_FOO"))
    ///     .await?;
    /// println!("{}", reply.get("Value"));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send_action(&self, mut action: Action) -> AmiResult<Record> {
        self.ensure_connected()?;
        if action
            .id()
            .is_empty()
        {
            action.set_action_id(
                self.shared
                    .ids
                    .next_id(),
            );
        }
        let wire = action.to_wire_format()?;

        let mut rx = self
            .register(action.id())
            .await?;
        let result = async {
            self.write(&action, &wire)
                .await?;
            self.next_routed(&mut rx)
                .await
        }
        .await;
        self.unregister(action.id())
            .await;

        let record = into_result(result?)?;
        debug!("Received response: {}", record.get(AmiHeader::Response));
        Ok(record)
    }

    /// Write an action without waiting for anything.
    ///
    /// No `ActionID` is added; a reply to an untracked action is dropped.
    pub async fn send_action_no_reply(&self, action: Action) -> AmiResult<()> {
        self.ensure_connected()?;
        let wire = action.to_wire_format()?;
        self.write(&action, &wire)
            .await
    }

    /// Wait for an `event` whose frame text contains every string in `needles`.
    ///
    /// Waiters are matched in registration order and each frame satisfies at
    /// most one. There is no timeout; drop the future to give up.
    ///
    /// ```rust,no_run
    /// # async fn example(client: &asterisk_ami_tokio::AmiClient) -> Result<(), asterisk_ami_tokio::AmiError> {
    /// let hangup = client
    ///     .wait_for_event("Hangup", &["PJSIP/100-"])
    ///     .await?;
    /// println!("cause {}", hangup.get("Cause"));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn wait_for_event(&self, event: &str, needles: &[&str]) -> AmiResult<Record> {
        self.ensure_connected()?;
        let (tx, rx) = oneshot::channel();
        {
            let mut waiters = self
                .shared
                .event_waiters
                .lock()
                .await;
            waiters.retain(|w| !w.tx.is_closed());
            waiters.push(EventWaiter {
                event: event.to_string(),
                needles: needles
                    .iter()
                    .map(|n| n.to_string())
                    .collect(),
                tx,
            });
        }
        self.ensure_connected()?;

        match rx.await {
            Ok(frame) => into_result(frame),
            Err(_) => Err(AmiError::WaiterClosed),
        }
    }

    /// Send a list action and collect its `accumulate` events until
    /// `complete` arrives.
    ///
    /// Each correlated frame must arrive within the command timeout. A
    /// `Response: Error` reply fails the call; any other non-`Success`
    /// response ends the list early.
    pub async fn request_list(
        &self,
        mut action: Action,
        accumulate: &str,
        complete: &str,
    ) -> AmiResult<Vec<Record>> {
        self.ensure_connected()?;
        if action
            .id()
            .is_empty()
        {
            action.set_action_id(
                self.shared
                    .ids
                    .next_id(),
            );
        }
        let wire = action.to_wire_format()?;

        let mut rx = self
            .register(action.id())
            .await?;
        let result = async {
            self.write(&action, &wire)
                .await?;
            let mut items = Vec::new();
            loop {
                let record = into_result(
                    self.next_routed(&mut rx)
                        .await?,
                )?;
                match list_step(&record, accumulate, complete) {
                    ListStep::Item => items.push(record),
                    ListStep::Done => return Ok::<_, AmiError>(items),
                    ListStep::Skip => {}
                }
            }
        }
        .await;
        self.unregister(action.id())
            .await;

        if let Ok(items) = &result {
            debug!("[LIST] {} finished with {} items", action.name(), items.len());
        }
        result
    }

    /// Log in on a transport that is not yet authenticated.
    pub async fn login(&self, username: &str, secret: &str, events: &str) -> AmiResult<Record> {
        match self
            .send_action(actions::login(username, secret, events))
            .await
        {
            Ok(record) => {
                info!("[AUTH] Logged in as {}", username);
                Ok(record)
            }
            Err(AmiError::Protocol(resp)) => Err(AmiError::auth_failed(resp.message())),
            Err(e) => Err(e),
        }
    }

    /// Send `Logoff`. The switch answers `Goodbye` and closes the connection.
    pub async fn logoff(&self) -> AmiResult<Record> {
        self.send_action(actions::logoff())
            .await
    }

    /// `Ping` the switch.
    pub async fn ping(&self) -> AmiResult<Record> {
        self.send_action(actions::ping())
            .await
    }

    /// Actions this login may use, one field per action.
    pub async fn list_commands(&self) -> AmiResult<Record> {
        self.send_action(actions::list_commands())
            .await
    }

    /// Originate a call.
    ///
    /// With `is_async` set the response only acknowledges the request; wait
    /// for the `OriginateResponse` event to learn the outcome.
    pub async fn originate(&self, originate: &Originate) -> AmiResult<Record> {
        self.send_action(originate.into_action()?)
            .await
    }

    /// Hang up `channel`, optionally with a Q.850 cause.
    pub async fn hangup(&self, channel: &str, cause: Option<u32>) -> AmiResult<Record> {
        self.send_action(actions::hangup(channel, cause))
            .await
    }

    /// Change the event mask: `on`, `off`, or a list of classes.
    pub async fn event_flow(&self, mask: &str) -> AmiResult<Record> {
        let record = self
            .send_action(actions::events(mask))
            .await?;
        info!("Event mask set to {}", mask);
        Ok(record)
    }

    /// Run a CLI command. Output lines are in the `Output` field.
    pub async fn command(&self, cli: &str) -> AmiResult<Record> {
        self.send_action(actions::command(cli))
            .await
    }

    /// Number of events dropped due to a full event queue.
    pub fn dropped_event_count(&self) -> u64 {
        self.shared
            .dropped_event_count
            .load(Ordering::Relaxed)
    }

    /// Set the response timeout for actions. Zero disables it.
    ///
    /// For [`request_list`](Self::request_list) the timeout applies to each
    /// correlated frame, not to the whole list.
    pub fn set_command_timeout(&self, duration: Duration) {
        self.shared
            .command_timeout_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Whether the connection is alive (not yet disconnected).
    pub fn is_connected(&self) -> bool {
        matches!(
            *self
                .status_rx
                .borrow(),
            ConnectionStatus::Connected
        )
    }

    /// Current connection status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        self.status_rx
            .borrow()
            .clone()
    }

    /// Close the write side of the connection.
    ///
    /// The reader task stops once the peer closes its side, reporting
    /// [`DisconnectReason::ClientRequested`]. Send [`logoff`](Self::logoff)
    /// first for a clean session end.
    pub async fn disconnect(&self) -> AmiResult<()> {
        info!("Client requested disconnect");
        self.shared
            .closing
            .store(true, Ordering::Relaxed);
        let mut writer = self
            .writer
            .lock()
            .await;
        writer
            .close()
            .await
    }
}

impl AmiEventStream {
    /// Receive the next event, or None once the reader task has stopped and
    /// every queued event was received.
    ///
    /// Returns `Err(AmiError::QueueFull)` once per overflow episode.
    pub async fn recv(&mut self) -> Option<AmiResult<Record>> {
        self.rx
            .recv()
            .await
    }

    /// Whether the connection is alive (not yet disconnected).
    pub fn is_connected(&self) -> bool {
        matches!(
            *self
                .status_rx
                .borrow(),
            ConnectionStatus::Connected
        )
    }

    /// Current connection status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        self.status_rx
            .borrow()
            .clone()
    }
}

impl futures_util::Stream for AmiEventStream {
    type Item = AmiResult<Record>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx
            .poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_frame;
    use crate::transport::{StreamSend, StreamTransport};
    use futures_util::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, WriteHalf};

    type DuplexClient = AmiClient<StreamSend<WriteHalf<DuplexStream>>>;

    /// Server side of an in-memory connection.
    struct FakeSwitch {
        stream: DuplexStream,
        frames: FrameReader,
    }

    impl FakeSwitch {
        async fn next_action(&mut self) -> Record {
            loop {
                if let Some(text) = self
                    .frames
                    .next_frame()
                    .unwrap()
                {
                    return parse_frame(&text).unwrap();
                }
                let mut buf = [0u8; 1024];
                let n = self
                    .stream
                    .read(&mut buf)
                    .await
                    .unwrap();
                assert!(n > 0, "client closed the connection");
                self.frames
                    .push(&buf[..n])
                    .unwrap();
            }
        }

        async fn write(&mut self, text: &str) {
            self.stream
                .write_all(text.as_bytes())
                .await
                .unwrap();
        }
    }

    fn pair(options: AmiConnectOptions) -> (DuplexClient, AmiEventStream, FakeSwitch) {
        let (client_side, server_side) = tokio::io::duplex(64 * 1024);
        let (client, events) = AmiClient::from_transport(StreamTransport::new(client_side), options);
        let switch = FakeSwitch {
            stream: server_side,
            frames: FrameReader::new(),
        };
        (client, events, switch)
    }

    #[tokio::test]
    async fn interleaved_responses_reach_their_callers() {
        let (client, _events, mut switch) = pair(AmiConnectOptions::default());

        let c1 = client.clone();
        let first = tokio::spawn(async move {
            c1.send_action(Action::new("Getvar").action_id("a").field("Variable", "X"))
                .await
        });
        let id_a = switch
            .next_action()
            .await;
        let c2 = client.clone();
        let second = tokio::spawn(async move {
            c2.send_action(Action::new("Getvar").action_id("b").field("Variable", "Y"))
                .await
        });
        let id_b = switch
            .next_action()
            .await;
        assert_eq!(id_a.action_id(), Some("a"));
        assert_eq!(id_b.action_id(), Some("b"));

        switch
            .write("Response: Success\r\nActionID: b\r\nValue: from-b\r\n\r\nResponse: Success\r\nActionID: a\r\nValue: from-a\r\n\r\n")
            .await;

        let a = first
            .await
            .unwrap()
            .unwrap();
        let b = second
            .await
            .unwrap()
            .unwrap();
        assert_eq!(a.get("Value"), "from-a");
        assert_eq!(b.get("Value"), "from-b");
    }

    #[tokio::test]
    async fn event_waiter_and_correlator_both_complete() {
        let (client, mut events, mut switch) = pair(AmiConnectOptions::default());

        let waiter = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .wait_for_event("DialBegin", &["+1213", "+1714"])
                    .await
            })
        };
        let pinger = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .send_action(actions::ping().action_id("p"))
                    .await
            })
        };
        switch
            .next_action()
            .await;

        switch
            .write("Event: DialBegin\r\nCallerIDNum: +1213\r\nDestExten: +1999\r\n\r\n")
            .await;
        switch
            .write("Response: Success\r\nActionID: p\r\nPing: Pong\r\n\r\n")
            .await;
        switch
            .write("Event: DialBegin\r\nCallerIDNum: +1213\r\nDestExten: +1714\r\n\r\n")
            .await;

        let pong = pinger
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pong.get("Ping"), "Pong");
        let dial = waiter
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dial.get("DestExten"), "+1714");

        // The unclaimed DialBegin went to the stream.
        let unclaimed = events
            .next()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unclaimed.get("DestExten"), "+1999");
    }

    #[tokio::test]
    async fn generated_action_id_is_sent() {
        let (client, _events, mut switch) = pair(AmiConnectOptions::default());
        let task = tokio::spawn(async move {
            client
                .ping()
                .await
        });
        let action = switch
            .next_action()
            .await;
        let id = action
            .action_id()
            .unwrap()
            .to_string();
        assert!(!id.is_empty());
        switch
            .write(&format!("Response: Success\r\nActionID: {}\r\n\r\n", id))
            .await;
        assert_eq!(
            task.await
                .unwrap()
                .unwrap()
                .response(),
            Some("Success")
        );
    }

    #[tokio::test]
    async fn error_response_is_protocol_error() {
        let (client, _events, mut switch) = pair(AmiConnectOptions::default());
        let task = tokio::spawn(async move {
            client
                .hangup("PJSIP/nope", None)
                .await
        });
        let id = switch
            .next_action()
            .await
            .get("ActionID")
            .to_string();
        switch
            .write(&format!(
                "Response: Error\r\nActionID: {}\r\nMessage: No such channel\r\n\r\n",
                id
            ))
            .await;
        let err = task
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(
            err.error_response()
                .unwrap()
                .message(),
            "No such channel"
        );
    }

    #[tokio::test]
    async fn login_rejection_is_auth_failed() {
        let (client, _events, mut switch) = pair(AmiConnectOptions::default());
        let task = tokio::spawn(async move {
            client
                .login("admin", "wrong", "off")
                .await
        });
        let login = switch
            .next_action()
            .await;
        assert_eq!(login.get("Secret"), "wrong");
        switch
            .write(&format!(
                "Response: Error\r\nActionID: {}\r\nMessage: Authentication failed\r\n\r\n",
                login.get("ActionID")
            ))
            .await;
        assert!(matches!(
            task.await
                .unwrap(),
            Err(AmiError::AuthFailed { .. })
        ));
    }

    #[tokio::test]
    async fn request_list_collects_correlated_events() {
        let (client, mut events, mut switch) = pair(AmiConnectOptions::default());
        let task = tokio::spawn(async move {
            let (acc, done) = actions::CORE_SHOW_CHANNELS_EVENTS;
            client
                .request_list(actions::core_show_channels(), acc.as_str(), done.as_str())
                .await
        });
        let id = switch
            .next_action()
            .await
            .get("ActionID")
            .to_string();
        switch
            .write(&format!(
                "Response: Success\r\nActionID: {id}\r\nEventList: start\r\n\r\n\
                 Event: CoreShowChannel\r\nActionID: {id}\r\nChannel: SIP/1\r\n\r\n\
                 Event: Newchannel\r\nChannel: SIP/9\r\n\r\n\
                 Event: CoreShowChannel\r\nActionID: {id}\r\nChannel: SIP/2\r\n\r\n\
                 Event: CoreShowChannelsComplete\r\nActionID: {id}\r\nListItems: 2\r\n\r\n"
            ))
            .await;

        let items = task
            .await
            .unwrap()
            .unwrap();
        let channels: Vec<_> = items
            .iter()
            .map(|r| r.get("Channel"))
            .collect();
        assert_eq!(channels, ["SIP/1", "SIP/2"]);
        assert_eq!(
            events
                .recv()
                .await
                .unwrap()
                .unwrap()
                .get("Channel"),
            "SIP/9"
        );
    }

    #[tokio::test]
    async fn events_after_response_reach_the_stream() {
        let (client, mut events, mut switch) = pair(AmiConnectOptions::default());
        let task = tokio::spawn(async move {
            client
                .originate(&Originate {
                    channel: "Local/100@default".into(),
                    application: Some("Wait".into()),
                    data: Some("1".into()),
                    is_async: Some(true),
                    ..Default::default()
                })
                .await
        });
        let id = switch
            .next_action()
            .await
            .get("ActionID")
            .to_string();
        switch
            .write(&format!(
                "Response: Success\r\nActionID: {id}\r\nMessage: Originate successfully queued\r\n\r\n"
            ))
            .await;
        task.await
            .unwrap()
            .unwrap();

        switch
            .write(&format!(
                "Event: OriginateResponse\r\nActionID: {id}\r\nResponse: Success\r\n\r\n"
            ))
            .await;
        let event = events
            .recv()
            .await
            .unwrap()
            .unwrap();
        assert!(event.is_event("OriginateResponse"));
    }

    #[tokio::test]
    async fn non_utf8_event_keeps_the_connection() {
        let (client, mut events, mut switch) = pair(AmiConnectOptions::default());
        // Polled first, so the waiter is registered before anything is written.
        let (hangup, ()) = tokio::join!(client.wait_for_event("Hangup", &[]), async {
            switch
                .stream
                .write_all(b"Event: Newchannel\r\nCallerIDName: Jos\xe9\r\n\r\n")
                .await
                .unwrap();
            switch
                .write("Event: Hangup\r\nChannel: SIP/1\r\n\r\n")
                .await;
        });
        let hangup = hangup.unwrap();
        assert_eq!(hangup.get("Channel"), "SIP/1");
        let newchannel = events
            .recv()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(newchannel.get("CallerIDName"), "Jos\u{fffd}");
        assert!(client.is_connected());

        let pinger = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .send_action(actions::ping().action_id("after"))
                    .await
            })
        };
        switch
            .next_action()
            .await;
        switch
            .write("Response: Success\r\nActionID: after\r\nPing: Pong\r\n\r\n")
            .await;
        let pong = pinger
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pong.get("Ping"), "Pong");
    }

    #[tokio::test]
    async fn full_queue_counts_dropped_events() {
        let options = AmiConnectOptions {
            event_queue_size: 1,
            ..Default::default()
        };
        let (client, mut events, mut switch) = pair(options);
        let task = tokio::spawn(async move {
            let r = client
                .send_action(actions::ping().action_id("sync"))
                .await;
            (client, r)
        });
        switch
            .next_action()
            .await;
        switch
            .write("Event: A\r\n\r\nEvent: B\r\n\r\nEvent: C\r\n\r\nResponse: Success\r\nActionID: sync\r\n\r\n")
            .await;
        let (client, r) = task
            .await
            .unwrap();
        r.unwrap();

        assert_eq!(client.dropped_event_count(), 2);
        assert!(events
            .recv()
            .await
            .unwrap()
            .unwrap()
            .is_event("A"));
    }

    #[tokio::test]
    async fn eof_fails_pending_waiters() {
        let (client, mut events, mut switch) = pair(AmiConnectOptions::default());
        let task = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .ping()
                    .await
            })
        };
        switch
            .next_action()
            .await;
        drop(switch);

        assert!(matches!(
            task.await
                .unwrap(),
            Err(AmiError::WaiterClosed)
        ));
        assert!(events
            .recv()
            .await
            .is_none());
        assert_eq!(
            client.status(),
            ConnectionStatus::Disconnected(DisconnectReason::ConnectionClosed)
        );
        assert!(matches!(
            client
                .ping()
                .await,
            Err(AmiError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn command_timeout_applies() {
        let (client, _events, mut switch) = pair(AmiConnectOptions::default());
        client.set_command_timeout(Duration::from_millis(50));
        let task = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .ping()
                    .await
            })
        };
        switch
            .next_action()
            .await;
        assert!(matches!(
            task.await
                .unwrap(),
            Err(AmiError::Timeout { timeout_ms: 50 })
        ));
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn dropped_wait_releases_its_registration() {
        let (client, mut events, mut switch) = pair(AmiConnectOptions::default());
        let waiter = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .wait_for_event("Hangup", &[])
                    .await
            })
        };
        tokio::task::yield_now().await;
        waiter.abort();
        let _ = waiter.await;

        switch
            .write("Event: Hangup\r\nChannel: SIP/1\r\n\r\n")
            .await;
        assert!(events
            .recv()
            .await
            .unwrap()
            .unwrap()
            .is_event("Hangup"));
    }

    #[tokio::test]
    async fn duplicate_action_id_rejected() {
        let (client, _events, mut switch) = pair(AmiConnectOptions::default());
        let first = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .send_action(actions::ping().action_id("dup"))
                    .await
            })
        };
        switch
            .next_action()
            .await;
        assert!(matches!(
            client
                .send_action(actions::ping().action_id("dup"))
                .await,
            Err(AmiError::InvalidField { .. })
        ));
        switch
            .write("Response: Success\r\nActionID: dup\r\n\r\n")
            .await;
        first
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn disconnect_reports_client_requested() {
        let (client, _events, mut switch) = pair(AmiConnectOptions::default());
        client
            .disconnect()
            .await
            .unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(
            switch
                .stream
                .read(&mut buf)
                .await
                .unwrap(),
            0
        );
        drop(switch);

        let mut status = client
            .status_rx
            .clone();
        status
            .wait_for(|s| *s != ConnectionStatus::Connected)
            .await
            .unwrap();
        assert_eq!(
            client.status(),
            ConnectionStatus::Disconnected(DisconnectReason::ClientRequested)
        );
    }

    #[tokio::test]
    async fn connect_reads_banner_and_logs_in() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap();
        let port = listener
            .local_addr()
            .unwrap()
            .port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener
                .accept()
                .await
                .unwrap();
            let mut switch = StreamTransport::new(stream);
            switch
                .send("Asterisk Call Manager/5.0.1\r\n")
                .await
                .unwrap();
            let mut frames = FrameReader::new();
            let login = loop {
                if let Some(text) = frames
                    .next_frame()
                    .unwrap()
                {
                    break parse_frame(&text).unwrap();
                }
                let chunk = switch
                    .recv()
                    .await
                    .unwrap();
                frames
                    .push(&chunk)
                    .unwrap();
            };
            assert_eq!(login.get("Action"), "Login");
            assert_eq!(login.get("Username"), "admin");
            assert_eq!(login.get("Events"), "on");
            switch
                .send(&format!(
                    "Response: Success\r\nActionID: {}\r\nMessage: Authentication accepted\r\n\r\nEvent: FullyBooted\r\nStatus: Fully Booted\r\n\r\n",
                    login.get("ActionID")
                ))
                .await
                .unwrap();
            switch
        });

        let (client, mut events) = AmiClient::connect("127.0.0.1", port, "admin", "s3cret")
            .await
            .unwrap();
        assert!(client.is_connected());

        // Bytes after the login response were handed over to the reader task.
        let booted = events
            .recv()
            .await
            .unwrap()
            .unwrap();
        assert!(booted.is_event("FullyBooted"));
        let _switch = server
            .await
            .unwrap();
    }

    #[test]
    fn test_connection_status_eq() {
        assert_eq!(ConnectionStatus::Connected, ConnectionStatus::Connected);
        assert_ne!(
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected(DisconnectReason::ConnectionClosed)
        );
        assert_eq!(
            DisconnectReason::IoError("boom".into()).to_string(),
            "I/O error: boom"
        );
    }
}
