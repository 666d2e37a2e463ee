//! The session manager: single-writer holder of session state, driven by
//! transport events and operator restarts.

use std::{
    sync::{Arc, RwLock as StdRwLock},
    time::Duration,
};

use {
    async_trait::async_trait,
    tokio::sync::{RwLock, mpsc},
    tracing::{debug, error, info, warn},
};

use wabridge_transport::{
    Error as TransportError, InboundMessage, Outbound, Transport, TransportEvent,
    TransportLauncher,
};

use crate::{
    render,
    state::{PairingArtifact, SessionState, SessionStatus},
};

/// Delay between a restart request and re-initialization of the transport.
const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(2);

/// Capacity of the transport event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Consumer of inbound messages (implemented by the message router).
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, message: InboundMessage);
}

/// Owns the session lifecycle: status, pairing artifact, connected
/// identity, and the current transport instance.
///
/// Cheap to clone (a handful of `Arc`s); background tasks hold their own
/// clone. The state lock is a `std` lock never held across an await point;
/// the transport handle lives behind a tokio lock because teardown is
/// async.
#[derive(Clone)]
pub struct SessionManager {
    state: Arc<StdRwLock<SessionState>>,
    transport: Arc<RwLock<Option<Arc<dyn Transport>>>>,
    launcher: Arc<dyn TransportLauncher>,
    handler: Arc<StdRwLock<Option<Arc<dyn InboundHandler>>>>,
    restart_delay: Duration,
}

impl SessionManager {
    pub fn new(launcher: Arc<dyn TransportLauncher>) -> Self {
        Self {
            state: Arc::new(StdRwLock::new(SessionState::default())),
            transport: Arc::new(RwLock::new(None)),
            launcher,
            handler: Arc::new(StdRwLock::new(None)),
            restart_delay: DEFAULT_RESTART_DELAY,
        }
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    // ── State reads ─────────────────────────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        self.state.read().unwrap_or_else(|e| e.into_inner()).status
    }

    pub fn pairing(&self) -> Option<PairingArtifact> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .pairing
            .clone()
    }

    pub fn identity(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .identity
            .clone()
    }

    pub fn connected(&self) -> bool {
        self.status() == SessionStatus::Connected
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Register the inbound handler and bring the transport up.
    ///
    /// Called once at boot (after the startup grace period); restarts reuse
    /// the registered handler.
    pub async fn start(&self, handler: Arc<dyn InboundHandler>) {
        *self.handler.write().unwrap_or_else(|e| e.into_inner()) = Some(handler);
        self.start_transport().await;
    }

    /// Apply a transport lifecycle event to the session state.
    ///
    /// Infallible: every lifecycle event has a defined transition, and
    /// anything else is ignored.
    pub fn apply_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::PairingIssued { token } => {
                info!("pairing code issued, waiting for scan");
                {
                    let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                    state.status = SessionStatus::Connecting;
                    state.pairing = Some(PairingArtifact::new(token.clone()));
                }
                self.spawn_qr_render(token);
            },
            TransportEvent::Authenticated => {
                info!("whatsapp session authenticated");
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.status = SessionStatus::Connected;
            },
            TransportEvent::Ready { identity } => {
                info!(number = ?identity, "whatsapp session ready");
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.status = SessionStatus::Connected;
                state.pairing = None;
                if identity.is_some() {
                    state.identity = identity;
                }
            },
            TransportEvent::AuthFailed { reason } => {
                error!(reason, "whatsapp authentication failed");
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.status = SessionStatus::Error;
                state.pairing = None;
            },
            TransportEvent::Disconnected { reason } => {
                warn!(reason, "whatsapp session disconnected");
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.status = SessionStatus::Disconnected;
                state.identity = None;
            },
            TransportEvent::Message(_) => {
                // Not a lifecycle event; the event loop routes messages to
                // the inbound handler before they reach here.
                debug!("ignoring message event in lifecycle handler");
            },
        }
    }

    /// Tear down the transport, reset state, and schedule re-initialization.
    ///
    /// Never fails: teardown problems are logged and the restart proceeds.
    /// Each call schedules exactly one re-initialization.
    pub async fn restart(&self) {
        info!("session restart requested");

        let current = self.transport.write().await.take();
        if let Some(transport) = current {
            transport.destroy().await;
        }

        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.status = SessionStatus::Disconnected;
            state.pairing = None;
            state.identity = None;
        }

        let manager = self.clone();
        let delay = self.restart_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.start_transport().await;
        });
    }

    /// Destroy the transport without scheduling a re-initialization.
    /// Used on process shutdown; idempotent.
    pub async fn shutdown(&self) {
        let current = self.transport.write().await.take();
        if let Some(transport) = current {
            transport.destroy().await;
        }
    }

    /// Send a text message through the current transport.
    ///
    /// Fails with [`TransportError::NotReady`] unless the session is
    /// connected and a transport is present.
    pub async fn send_text(&self, to: &str, text: &str) -> wabridge_transport::Result<()> {
        if !self.connected() {
            return Err(TransportError::NotReady);
        }
        let transport = self.transport.read().await.clone();
        let Some(transport) = transport else {
            return Err(TransportError::NotReady);
        };
        transport.send_text(to, text).await?;
        info!(to, preview = %text_preview(text), "message sent");
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────────────

    async fn start_transport(&self) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.spawn_event_loop(rx);

        match self.launcher.launch(tx).await {
            Ok(transport) => {
                *self.transport.write().await = Some(transport);
                info!("whatsapp transport initialized");
            },
            Err(e) => {
                error!(error = %e, "failed to initialize whatsapp transport");
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.status = SessionStatus::Error;
            },
        }
    }

    /// Single entry point for transport events: lifecycle events mutate the
    /// session state; each message is routed on its own task so a slow
    /// downstream call never blocks the loop or unrelated messages.
    fn spawn_event_loop(&self, mut events: mpsc::Receiver<TransportEvent>) {
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    TransportEvent::Message(message) => {
                        let handler = manager
                            .handler
                            .read()
                            .unwrap_or_else(|e| e.into_inner())
                            .clone();
                        match handler {
                            Some(handler) => {
                                tokio::spawn(async move {
                                    handler.handle(message).await;
                                });
                            },
                            None => warn!("inbound message before handler registration, dropped"),
                        }
                    },
                    lifecycle => manager.apply_event(lifecycle),
                }
            }
            debug!("transport event channel closed");
        });
    }

    /// Render the QR image off the event path and fill it into the pairing
    /// artifact, unless pairing has moved on to a newer token meanwhile.
    fn spawn_qr_render(&self, token: String) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let rendered =
                tokio::task::spawn_blocking(move || (render::qr_data_url(&token), token)).await;
            let (result, token) = match rendered {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "qr render task failed");
                    return;
                },
            };
            match result {
                Ok(image) => {
                    let mut state = state.write().unwrap_or_else(|e| e.into_inner());
                    if let Some(pairing) = state.pairing.as_mut()
                        && pairing.token == token
                    {
                        pairing.image = Some(image);
                    }
                },
                Err(e) => error!(error = %e, "failed to render pairing qr image"),
            }
        });
    }
}

/// Outbound seam handed to the router and the control API: refuses sends
/// while the session is not connected.
pub struct SessionOutbound {
    manager: Arc<SessionManager>,
}

impl SessionOutbound {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Outbound for SessionOutbound {
    async fn send_text(&self, to: &str, text: &str) -> wabridge_transport::Result<()> {
        self.manager.send_text(to, text).await
    }
}

fn text_preview(text: &str) -> String {
    text.chars().take(50).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use {rstest::rstest, tokio::sync::Mutex};

    use super::*;

    struct MockTransport {
        destroyed: AtomicUsize,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl MockTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                destroyed: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Outbound for MockTransport {
        async fn send_text(&self, to: &str, text: &str) -> wabridge_transport::Result<()> {
            self.sent.lock().await.push((to.into(), text.into()));
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn destroy(&self) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockLauncher {
        launches: AtomicUsize,
        transport: Arc<MockTransport>,
    }

    impl MockLauncher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                launches: AtomicUsize::new(0),
                transport: MockTransport::new(),
            })
        }
    }

    #[async_trait]
    impl TransportLauncher for MockLauncher {
        async fn launch(
            &self,
            _events: mpsc::Sender<TransportEvent>,
        ) -> anyhow::Result<Arc<dyn Transport>> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::clone(&self.transport) as Arc<dyn Transport>)
        }
    }

    struct RecordingHandler {
        messages: Mutex<Vec<InboundMessage>>,
    }

    #[async_trait]
    impl InboundHandler for RecordingHandler {
        async fn handle(&self, message: InboundMessage) {
            self.messages.lock().await.push(message);
        }
    }

    fn manager() -> (Arc<SessionManager>, Arc<MockLauncher>) {
        let launcher = MockLauncher::new();
        let manager = Arc::new(
            SessionManager::new(Arc::clone(&launcher) as Arc<dyn TransportLauncher>)
                .with_restart_delay(Duration::from_millis(10)),
        );
        (manager, launcher)
    }

    fn pairing_issued(token: &str) -> TransportEvent {
        TransportEvent::PairingIssued {
            token: token.into(),
        }
    }

    #[rstest]
    #[case::pairing(vec![pairing_issued("T1")], SessionStatus::Connecting)]
    #[case::authenticated(vec![TransportEvent::Authenticated], SessionStatus::Connected)]
    #[case::ready(
        vec![TransportEvent::Ready { identity: Some("5511".into()) }],
        SessionStatus::Connected
    )]
    #[case::auth_failed(
        vec![pairing_issued("T1"), TransportEvent::AuthFailed { reason: "bad".into() }],
        SessionStatus::Error
    )]
    #[case::disconnect_after_ready(
        vec![
            TransportEvent::Ready { identity: Some("5511".into()) },
            TransportEvent::Disconnected { reason: "gone".into() },
        ],
        SessionStatus::Disconnected
    )]
    #[case::full_cycle(
        vec![
            pairing_issued("T1"),
            TransportEvent::Authenticated,
            TransportEvent::Ready { identity: None },
            TransportEvent::Disconnected { reason: "gone".into() },
        ],
        SessionStatus::Disconnected
    )]
    #[tokio::test]
    async fn transition_table(
        #[case] events: Vec<TransportEvent>,
        #[case] expected: SessionStatus,
    ) {
        let (manager, _) = manager();
        for event in events {
            manager.apply_event(event);
        }
        assert_eq!(manager.status(), expected);
    }

    #[tokio::test]
    async fn ready_clears_pairing_and_sets_identity() {
        let (manager, _) = manager();
        manager.apply_event(pairing_issued("T1"));
        assert_eq!(manager.pairing().map(|p| p.token), Some("T1".into()));

        manager.apply_event(TransportEvent::Ready {
            identity: Some("5511999990000".into()),
        });
        assert!(manager.pairing().is_none());
        assert_eq!(manager.identity(), Some("5511999990000".into()));

        manager.apply_event(TransportEvent::Disconnected {
            reason: "logout".into(),
        });
        assert!(manager.identity().is_none());
    }

    #[tokio::test]
    async fn auth_failure_clears_pairing() {
        let (manager, _) = manager();
        manager.apply_event(pairing_issued("T1"));
        manager.apply_event(TransportEvent::AuthFailed {
            reason: "mismatch".into(),
        });
        assert!(manager.pairing().is_none());
        assert_eq!(manager.status(), SessionStatus::Error);
    }

    #[tokio::test]
    async fn qr_image_fills_in_asynchronously() {
        let (manager, _) = manager();
        manager.apply_event(pairing_issued("T1"));

        // Token is visible immediately; a missing image just means the
        // render has not completed yet.
        let artifact = manager.pairing().unwrap();
        assert_eq!(artifact.token, "T1");

        let mut filled = None;
        for _ in 0..100 {
            if let Some(p) = manager.pairing()
                && p.image.is_some()
            {
                filled = p.image;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let image = filled.expect("qr image never rendered");
        assert!(image.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn stale_qr_render_does_not_resurrect_cleared_pairing() {
        let (manager, _) = manager();
        manager.apply_event(pairing_issued("T1"));
        // Session becomes ready before the render lands.
        manager.apply_event(TransportEvent::Ready { identity: None });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(manager.pairing().is_none());
        assert_eq!(manager.status(), SessionStatus::Connected);
    }

    #[tokio::test]
    async fn restart_twice_clears_state_and_schedules_one_reinit_each() {
        let (manager, launcher) = manager();
        let handler = Arc::new(RecordingHandler {
            messages: Mutex::new(Vec::new()),
        });
        manager.start(handler).await;
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);

        manager.apply_event(pairing_issued("T1"));
        manager.apply_event(TransportEvent::Ready {
            identity: Some("5511".into()),
        });

        manager.restart().await;
        manager.restart().await;

        assert!(manager.pairing().is_none());
        assert!(manager.identity().is_none());
        assert_eq!(manager.status(), SessionStatus::Disconnected);

        tokio::time::sleep(Duration::from_millis(100)).await;
        // One re-initialization per restart call, plus the initial start.
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn restart_without_transport_is_a_noop_teardown() {
        let (manager, launcher) = manager();
        manager.restart().await;
        assert_eq!(manager.status(), SessionStatus::Disconnected);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn send_fails_when_not_connected() {
        let (manager, _) = manager();
        let err = manager.send_text("5511@c.us", "hi").await.unwrap_err();
        assert!(matches!(err, TransportError::NotReady));
    }

    #[tokio::test]
    async fn send_goes_through_when_connected() {
        let (manager, launcher) = manager();
        let handler = Arc::new(RecordingHandler {
            messages: Mutex::new(Vec::new()),
        });
        manager.start(handler).await;
        manager.apply_event(TransportEvent::Ready { identity: None });

        manager.send_text("5511@c.us", "hi").await.unwrap();
        let sent = launcher.transport.sent.lock().await;
        assert_eq!(sent.as_slice(), &[("5511@c.us".to_string(), "hi".to_string())]);
    }

    #[tokio::test]
    async fn shutdown_destroys_transport_once() {
        let (manager, launcher) = manager();
        let handler = Arc::new(RecordingHandler {
            messages: Mutex::new(Vec::new()),
        });
        manager.start(handler).await;

        manager.shutdown().await;
        manager.shutdown().await;
        assert_eq!(launcher.transport.destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn messages_reach_the_handler_and_lifecycle_events_do_not() {
        let launcher = MockLauncher::new();
        let captured: Arc<StdRwLock<Option<mpsc::Sender<TransportEvent>>>> =
            Arc::new(StdRwLock::new(None));

        struct CapturingLauncher {
            inner: Arc<MockLauncher>,
            tx: Arc<StdRwLock<Option<mpsc::Sender<TransportEvent>>>>,
        }

        #[async_trait]
        impl TransportLauncher for CapturingLauncher {
            async fn launch(
                &self,
                events: mpsc::Sender<TransportEvent>,
            ) -> anyhow::Result<Arc<dyn Transport>> {
                *self.tx.write().unwrap() = Some(events.clone());
                self.inner.launch(events).await
            }
        }

        let manager = Arc::new(SessionManager::new(Arc::new(CapturingLauncher {
            inner: launcher,
            tx: Arc::clone(&captured),
        })));
        let handler = Arc::new(RecordingHandler {
            messages: Mutex::new(Vec::new()),
        });
        manager.start(Arc::clone(&handler) as Arc<dyn InboundHandler>).await;

        let tx = captured.read().unwrap().clone().unwrap();
        tx.send(TransportEvent::Ready { identity: None }).await.unwrap();
        tx.send(TransportEvent::Message(InboundMessage {
            from: "5511@c.us".into(),
            body: "hello".into(),
            kind: "chat".into(),
            from_me: false,
        }))
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.status(), SessionStatus::Connected);
        let messages = handler.messages.lock().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, "hello");
    }
}
