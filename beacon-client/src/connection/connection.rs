use beacon_core::sdp::strip_bandwidth_tias;
use beacon_core::{
    CandidateInit, ClientMessage, ConnectionOptions, DisconnectReason, OfferConfig, ServerMessage,
    SignalError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, trace, warn};

use crate::connection::callbacks::{CallbackRegistry, TrackPacketHandler};
use crate::connection::negotiation;
use crate::engine::{EngineEvent, IceState, PeerEngine, PeerEngineFactory, WebrtcEngineFactory};
use crate::transport::{INBOUND_QUEUE_CAPACITY, SignalTransport};

/// Engine close is asynchronous underneath; teardown polls the signaling
/// state on this interval instead of blocking on it.
const ENGINE_CLOSE_POLL: Duration = Duration::from_millis(400);
const ENGINE_CLOSE_ATTEMPTS: u32 = 25;

const ENGINE_EVENT_CAPACITY: usize = 32;

/// Lifecycle of one signaling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport, no engine. The only state `connect()` accepts.
    Idle,
    /// Transport established, connect message sent.
    SocketOpen,
    /// At least one offer or update is in flight.
    Negotiating,
    /// ICE reported connected.
    Active,
    /// Teardown in progress.
    Closing,
}

struct Session {
    /// Bumped on every `connect()`. Tasks spawned for a session carry the
    /// epoch they were born under; teardown and negotiation commits no-op
    /// once the session has moved on, so a stale task can never kill or
    /// mutate a successor session.
    epoch: u64,
    state: SessionState,
    transport: Option<Arc<SignalTransport>>,
    engine: Option<Arc<dyn PeerEngine>>,
    engine_tx: Option<mpsc::Sender<EngineEvent>>,
    connection_id: String,
    client_id: String,
    server_version: String,
    answer_sent: bool,
    opened: bool,
    ice_state: IceState,
    callbacks: CallbackRegistry,
}

impl Session {
    fn new() -> Self {
        Self {
            epoch: 0,
            state: SessionState::Idle,
            transport: None,
            engine: None,
            engine_tx: None,
            connection_id: String::new(),
            client_id: String::new(),
            server_version: String::new(),
            answer_sent: false,
            opened: false,
            ice_state: IceState::New,
            callbacks: CallbackRegistry::new(),
        }
    }
}

struct ConnectionInner {
    options: ConnectionOptions,
    factory: Arc<dyn PeerEngineFactory>,
    session: Mutex<Session>,
}

/// The connection engine: owns the session state machine, the dispatch loop
/// and teardown. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Builds a connection using the `webrtc`-crate peer engine.
    pub fn new(options: ConnectionOptions) -> Self {
        Self::with_engine_factory(options, Arc::new(WebrtcEngineFactory))
    }

    /// Builds a connection with a caller-supplied peer engine factory.
    pub fn with_engine_factory(
        options: ConnectionOptions,
        factory: Arc<dyn PeerEngineFactory>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                options,
                factory,
                session: Mutex::new(Session::new()),
            }),
        }
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.inner.options
    }

    pub async fn state(&self) -> SessionState {
        self.inner.session.lock().await.state
    }

    /// Connection id assigned by the server, empty before the first offer.
    pub async fn connection_id(&self) -> String {
        self.inner.session.lock().await.connection_id.clone()
    }

    pub async fn client_id(&self) -> String {
        self.inner.session.lock().await.client_id.clone()
    }

    pub async fn server_version(&self) -> String {
        self.inner.session.lock().await.server_version.clone()
    }

    // ------------------------------------------------------------------
    // Callback registration
    // ------------------------------------------------------------------

    /// Called once when the peer engine is first instantiated.
    pub async fn on_open(&self, f: impl Fn() + Send + Sync + 'static) {
        self.inner.session.lock().await.callbacks.on_open = Arc::new(f);
    }

    /// Called once per transition of ICE into connected.
    pub async fn on_connect(&self, f: impl Fn() + Send + Sync + 'static) {
        self.inner.session.lock().await.callbacks.on_connect = Arc::new(f);
    }

    /// Called exactly once per teardown with the reason that caused it.
    pub async fn on_disconnect(
        &self,
        f: impl Fn(DisconnectReason, Option<SignalError>) + Send + Sync + 'static,
    ) {
        self.inner.session.lock().await.callbacks.on_disconnect = Arc::new(f);
    }

    /// Called for every media packet read from an inbound track.
    pub async fn on_track_packet(
        &self,
        f: impl Fn(&beacon_core::TrackInfo, beacon_core::MediaPacket) + Send + Sync + 'static,
    ) {
        self.inner.session.lock().await.callbacks.on_track_packet = Arc::new(f);
    }

    /// Called with every `notify` event payload, forwarded verbatim.
    pub async fn on_notify(
        &self,
        f: impl Fn(beacon_core::NotifyPayload) + Send + Sync + 'static,
    ) {
        self.inner.session.lock().await.callbacks.on_notify = Arc::new(f);
    }

    /// Called with every `push` payload, forwarded verbatim.
    pub async fn on_push(&self, f: impl Fn(serde_json::Value) + Send + Sync + 'static) {
        self.inner.session.lock().await.callbacks.on_push = Arc::new(f);
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Opens the signaling socket, starts the read and dispatch tasks and
    /// sends the connect message. Fails if a session already exists in any
    /// form; one `Connection` manages exactly one concurrent session.
    pub async fn connect(&self) -> Result<(), SignalError> {
        let (transport, mut reader) = {
            let session = self.inner.session.lock().await;
            if session.state != SessionState::Idle
                || session.transport.is_some()
                || session.engine.is_some()
            {
                return Err(SignalError::AlreadyConnected);
            }
            drop(session);

            SignalTransport::connect(&self.inner.options.signal_url).await?
        };
        let transport = Arc::new(transport);

        let (msg_tx, msg_rx) = mpsc::channel::<Vec<u8>>(INBOUND_QUEUE_CAPACITY);
        let (engine_tx, engine_rx) = mpsc::channel::<EngineEvent>(ENGINE_EVENT_CAPACITY);

        let epoch = {
            let mut session = self.inner.session.lock().await;
            // A racing connect may have won while the socket was opening.
            if session.state != SessionState::Idle || session.transport.is_some() {
                transport.close().await;
                return Err(SignalError::AlreadyConnected);
            }
            session.epoch += 1;
            session.transport = Some(Arc::clone(&transport));
            session.engine_tx = Some(engine_tx);
            session.state = SessionState::SocketOpen;
            session.epoch
        };

        // Read task: sole writer into the message queue, closes it by
        // dropping the sender on any read failure.
        tokio::spawn(async move {
            loop {
                match reader.receive().await {
                    Ok(raw) => {
                        if msg_tx.send(raw).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "read task stopping");
                        break;
                    }
                }
            }
        });

        tokio::spawn(self.clone().run_dispatch(epoch, msg_rx, engine_rx));

        if let Err(e) = transport.send_json(&self.connect_message()).await {
            // Session never really started; reset without notifying.
            self.teardown(epoch, DisconnectReason::SocketClosed, None, false)
                .await;
            return Err(e);
        }
        info!(
            channel = %self.inner.options.channel_id,
            role = %self.inner.options.role,
            "connect message sent"
        );
        Ok(())
    }

    /// Tears the session down: best-effort disconnect message, engine close,
    /// transport close, state reset, callbacks reset. Safe to call from any
    /// task, at any time, any number of times.
    pub async fn disconnect(&self) {
        let epoch = self.inner.session.lock().await.epoch;
        self.teardown(epoch, DisconnectReason::LocalClose, None, true)
            .await;
    }

    pub(crate) async fn fail(
        &self,
        epoch: u64,
        reason: DisconnectReason,
        error: Option<SignalError>,
    ) {
        self.teardown(epoch, reason, error, true).await;
    }

    pub(crate) async fn track_packet_handler(&self) -> TrackPacketHandler {
        Arc::clone(&self.inner.session.lock().await.callbacks.on_track_packet)
    }

    // ------------------------------------------------------------------
    // Dispatch loop
    // ------------------------------------------------------------------

    /// Single consumer of the message queue and engine events. All state
    /// transitions and callback invocations run here, in arrival order.
    async fn run_dispatch(
        self,
        epoch: u64,
        mut msg_rx: mpsc::Receiver<Vec<u8>>,
        mut engine_rx: mpsc::Receiver<EngineEvent>,
    ) {
        loop {
            tokio::select! {
                msg = msg_rx.recv() => match msg {
                    Some(raw) => {
                        if let Err(err) = self.handle_message(epoch, &raw).await {
                            warn!(error = %err, "dispatch failed, tearing down");
                            let reason = reason_for(&err);
                            self.teardown(epoch, reason, Some(err), true).await;
                            break;
                        }
                    }
                    None => {
                        debug!("message queue closed");
                        self.teardown(epoch, DisconnectReason::SocketClosed, None, true)
                            .await;
                        break;
                    }
                },
                evt = engine_rx.recv() => match evt {
                    Some(event) => {
                        if self.handle_engine_event(epoch, event).await.is_break() {
                            break;
                        }
                    }
                    // Sender dropped only on teardown; nothing left to drive.
                    None => break,
                },
            }
        }
        trace!("dispatch loop exited");
    }

    async fn handle_message(&self, epoch: u64, raw: &[u8]) -> Result<(), SignalError> {
        let message: ServerMessage = serde_json::from_slice(raw).map_err(|e| {
            debug!(raw = %String::from_utf8_lossy(raw), "undecodable message");
            SignalError::Protocol(e.to_string())
        })?;

        match message {
            ServerMessage::Ping { .. } => {
                // Keepalive probe; losing the reply is the read path's problem.
                if let Err(e) = self.send(&ClientMessage::Pong { stats: None }).await {
                    debug!(error = %e, "pong not delivered");
                }
                Ok(())
            }
            ServerMessage::Offer {
                version,
                client_id,
                connection_id,
                sdp,
                config,
            } => {
                self.handle_offer(epoch, version, client_id, connection_id, sdp, config)
                    .await
            }
            ServerMessage::Update { sdp } => self.handle_update(sdp).await,
            ServerMessage::Candidate(candidate) => {
                self.handle_remote_candidate(candidate).await;
                Ok(())
            }
            ServerMessage::Notify(payload) => {
                let handler = {
                    let session = self.inner.session.lock().await;
                    Arc::clone(&session.callbacks.on_notify)
                };
                handler(payload);
                Ok(())
            }
            ServerMessage::Push(payload) => {
                let handler = {
                    let session = self.inner.session.lock().await;
                    Arc::clone(&session.callbacks.on_push)
                };
                handler(payload);
                Ok(())
            }
        }
    }

    /// First offer instantiates the engine (and fires *open*); a later offer
    /// on a live session replaces the engine without firing *open* again.
    async fn handle_offer(
        &self,
        epoch: u64,
        version: String,
        client_id: String,
        connection_id: String,
        sdp: String,
        config: OfferConfig,
    ) -> Result<(), SignalError> {
        let sdp = strip_bandwidth_tias(&sdp);

        let (engine_tx, previous) = {
            let mut session = self.inner.session.lock().await;
            let tx = session
                .engine_tx
                .clone()
                .ok_or_else(|| SignalError::Protocol("offer outside a session".into()))?;
            (tx, session.engine.take())
        };
        if let Some(old) = previous {
            debug!("replacing peer engine for renegotiation offer");
            if let Err(e) = old.close().await {
                trace!(error = %e, "old engine close failed");
            }
        }

        let engine = self
            .inner
            .factory
            .create(&self.inner.options, &config, engine_tx)
            .await?;

        let answer_sdp = match self.negotiate_offer(&engine, &sdp).await {
            Ok(answer) => answer,
            Err(e) => {
                if let Err(close_err) = engine.close().await {
                    trace!(error = %close_err, "engine close after failed offer");
                }
                return Err(e);
            }
        };

        let session_id = connection_id.clone();
        let (open_handler, answer_message, transport) = {
            let mut session = self.inner.session.lock().await;
            // A teardown may have completed while negotiation was awaiting
            // the factory; committing now would resurrect a dead session.
            let live = matches!(
                session.state,
                SessionState::SocketOpen | SessionState::Negotiating | SessionState::Active
            );
            if session.epoch != epoch || !live {
                drop(session);
                debug!("session ended during negotiation, discarding engine");
                if let Err(e) = engine.close().await {
                    trace!(error = %e, "discarded engine close failed");
                }
                return Ok(());
            }
            session.engine = Some(engine);
            session.state = SessionState::Negotiating;
            session.server_version = version;
            session.client_id = client_id;
            session.connection_id = connection_id;

            let message = if session.answer_sent {
                ClientMessage::Update { sdp: answer_sdp }
            } else {
                ClientMessage::Answer { sdp: answer_sdp }
            };
            session.answer_sent = true;

            let open_handler = if session.opened {
                None
            } else {
                session.opened = true;
                Some(Arc::clone(&session.callbacks.on_open))
            };
            (open_handler, message, session.transport.clone())
        };

        if let Some(handler) = open_handler {
            handler();
        }

        let Some(transport) = transport else {
            return Err(SignalError::Transport("transport gone".into()));
        };
        transport.send_json(&answer_message).await?;
        info!(connection_id = %session_id, "answer sent");
        Ok(())
    }

    async fn negotiate_offer(
        &self,
        engine: &Arc<dyn PeerEngine>,
        sdp: &str,
    ) -> Result<String, SignalError> {
        negotiation::register_transceivers(engine, &self.inner.options).await?;
        engine.set_remote_description(sdp).await?;
        engine.create_answer().await
    }

    /// Server-driven renegotiation. The local description commit is always
    /// reported as `update` here; the first `answer` went out in
    /// `handle_offer`.
    async fn handle_update(&self, sdp: String) -> Result<(), SignalError> {
        let (engine, transport) = {
            let session = self.inner.session.lock().await;
            (session.engine.clone(), session.transport.clone())
        };
        let Some(engine) = engine else {
            debug!("update before any offer, ignored");
            return Ok(());
        };

        engine.set_remote_description(&sdp).await?;
        let answer_sdp = engine.create_answer().await?;

        let Some(transport) = transport else {
            return Err(SignalError::Transport("transport gone".into()));
        };
        transport
            .send_json(&ClientMessage::Update { sdp: answer_sdp })
            .await?;
        debug!("renegotiation answer sent as update");
        Ok(())
    }

    async fn handle_remote_candidate(&self, candidate: CandidateInit) {
        if !self.inner.options.trickle_ice {
            debug!("remote candidate ignored, trickle ice disabled");
            return;
        }
        let engine = self.inner.session.lock().await.engine.clone();
        let Some(engine) = engine else {
            debug!("remote candidate before any offer, ignored");
            return;
        };
        if let Err(e) = engine.add_remote_candidate(candidate).await {
            warn!(error = %e, "failed to add remote candidate");
        }
    }

    async fn handle_engine_event(&self, epoch: u64, event: EngineEvent) -> std::ops::ControlFlow<()> {
        match event {
            EngineEvent::IceState(state) => self.handle_ice_state(epoch, state).await,
            EngineEvent::Track(track) => {
                let engine = self.inner.session.lock().await.engine.clone();
                let Some(engine) = engine else {
                    warn!("track event without an engine, dropped");
                    return std::ops::ControlFlow::Continue(());
                };
                negotiation::spawn_track_tasks(self.clone(), epoch, engine, track);
                std::ops::ControlFlow::Continue(())
            }
            EngineEvent::LocalCandidate(candidate) => {
                self.send_local_candidate(candidate).await;
                std::ops::ControlFlow::Continue(())
            }
        }
    }

    async fn handle_ice_state(&self, epoch: u64, state: IceState) -> std::ops::ControlFlow<()> {
        let connect_handler = {
            let mut session = self.inner.session.lock().await;
            // Repeated identical states carry no transition.
            if session.ice_state == state {
                return std::ops::ControlFlow::Continue(());
            }
            session.ice_state = state;
            debug!(?state, "ice state transition");

            match state {
                IceState::Connected => {
                    session.state = SessionState::Active;
                    Some(Arc::clone(&session.callbacks.on_connect))
                }
                _ => None,
            }
        };

        match state {
            IceState::Connected => {
                if let Some(handler) = connect_handler {
                    handler();
                }
                std::ops::ControlFlow::Continue(())
            }
            IceState::Disconnected | IceState::Failed => {
                self.teardown(epoch, DisconnectReason::IceFailed, Some(SignalError::Ice), true)
                    .await;
                std::ops::ControlFlow::Break(())
            }
            _ => std::ops::ControlFlow::Continue(()),
        }
    }

    /// Trickle: wrap a locally discovered candidate and send it right away.
    /// Best-effort; a lost candidate only costs a connectivity option.
    async fn send_local_candidate(&self, candidate: CandidateInit) {
        if !self.inner.options.trickle_ice {
            return;
        }
        if let Err(e) = self.send(&ClientMessage::Candidate(candidate)).await {
            debug!(error = %e, "local candidate not delivered");
        }
    }

    async fn send(&self, message: &ClientMessage) -> Result<(), SignalError> {
        let transport = self.inner.session.lock().await.transport.clone();
        match transport {
            Some(transport) => transport.send_json(message).await,
            None => Ok(()),
        }
    }

    fn connect_message(&self) -> ClientMessage {
        let options = &self.inner.options;
        ClientMessage::Connect {
            client: crate::CLIENT_VERSION.to_string(),
            environment: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            role: options.role,
            channel_id: options.channel_id.clone(),
            client_id: options.client_id.clone(),
            metadata: options.metadata.clone(),
            multistream: options.multistream,
            simulcast: options.simulcast,
            audio: options.audio,
            video: options.video.clone(),
            sdp: String::new(),
        }
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// The single teardown path. Whoever moves the session out of a live
    /// state runs the cleanup and fires the disconnect callback; everyone
    /// else sees `Idle`/`Closing` and returns, which keeps the callback at
    /// exactly one invocation under concurrent teardown.
    async fn teardown(
        &self,
        epoch: u64,
        reason: DisconnectReason,
        error: Option<SignalError>,
        notify: bool,
    ) {
        let (transport, engine, disconnect_handler) = {
            let mut session = self.inner.session.lock().await;
            if session.epoch != epoch {
                trace!(%reason, "teardown skipped, session epoch moved on");
                return;
            }
            if session.state == SessionState::Idle || session.state == SessionState::Closing {
                trace!(%reason, "teardown skipped, already idle or closing");
                return;
            }
            session.state = SessionState::Closing;

            let transport = session.transport.take();
            let engine = session.engine.take();
            session.engine_tx = None;
            session.connection_id.clear();
            session.client_id.clear();
            session.server_version.clear();
            session.answer_sent = false;
            session.opened = false;
            session.ice_state = IceState::New;

            let handler = Arc::clone(&session.callbacks.on_disconnect);
            session.callbacks.reset();
            (transport, engine, handler)
        };

        info!(%reason, "tearing down session");

        if let Some(transport) = &transport {
            // Courtesy notification; teardown never blocks on it.
            if let Err(e) = transport.send_json(&ClientMessage::Disconnect).await {
                trace!(error = %e, "disconnect message not delivered");
            }
        }

        if let Some(engine) = engine {
            close_engine(engine).await;
        }

        if let Some(transport) = transport {
            transport.close().await;
        }

        self.inner.session.lock().await.state = SessionState::Idle;

        if notify {
            disconnect_handler(reason, error);
        }
    }
}

/// Closes the engine and polls its closed-state a bounded number of times.
async fn close_engine(engine: Arc<dyn PeerEngine>) {
    if engine.signaling_closed() {
        return;
    }
    if let Err(e) = engine.close().await {
        debug!(error = %e, "engine close failed");
    }
    for _ in 0..ENGINE_CLOSE_ATTEMPTS {
        if engine.signaling_closed() {
            return;
        }
        tokio::time::sleep(ENGINE_CLOSE_POLL).await;
    }
    warn!("peer engine did not reach closed state, abandoning it");
}

fn reason_for(error: &SignalError) -> DisconnectReason {
    match error {
        SignalError::Transport(_) => DisconnectReason::SocketClosed,
        SignalError::Protocol(_) => DisconnectReason::ProtocolError,
        SignalError::Negotiation(_) => DisconnectReason::NegotiationFailed,
        SignalError::Ice => DisconnectReason::IceFailed,
        SignalError::AlreadyConnected => DisconnectReason::ProtocolError,
    }
}
