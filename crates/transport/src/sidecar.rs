//! Transport seams and their sidecar-backed implementations.

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use {
    async_trait::async_trait,
    tokio::sync::{Mutex, mpsc},
    tracing::{info, warn},
};

use crate::{
    error::{Error, Result},
    event::TransportEvent,
    link::SidecarLink,
    process::{SidecarProcess, SidecarProcessConfig, find_sidecar_dir, start_sidecar},
    types::ClientCommand,
};

/// Default port for the sidecar WebSocket server.
pub const DEFAULT_SIDECAR_PORT: u16 = 8055;

/// Connection attempts while waiting for a freshly spawned sidecar.
const CONNECT_ATTEMPTS: usize = 10;

/// Send messages out through the messaging network.
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send_text(&self, to: &str, text: &str) -> Result<()>;
}

/// A live transport: outbound sends plus teardown.
#[async_trait]
pub trait Transport: Outbound {
    /// Tear the transport down. Idempotent; never fails (teardown problems
    /// are logged and swallowed so restart/shutdown always proceed).
    async fn destroy(&self);
}

/// Creates transports. The session manager calls this at startup and again
/// after every restart, with a fresh event channel per transport instance.
#[async_trait]
pub trait TransportLauncher: Send + Sync {
    async fn launch(
        &self,
        events: mpsc::Sender<TransportEvent>,
    ) -> anyhow::Result<Arc<dyn Transport>>;
}

/// Settings for the sidecar-backed launcher.
#[derive(Debug, Clone)]
pub struct SidecarSettings {
    pub port: u16,
    /// Explicit sidecar directory; discovered when `None`.
    pub sidecar_dir: Option<PathBuf>,
    /// Where the client persists session credentials.
    pub auth_dir: Option<PathBuf>,
    /// Spawn the sidecar process ourselves. Disable to attach to an
    /// externally managed sidecar.
    pub auto_start: bool,
}

impl Default for SidecarSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_SIDECAR_PORT,
            sidecar_dir: None,
            auth_dir: None,
            auto_start: true,
        }
    }
}

/// Production transport: one sidecar process plus the WebSocket link to it.
pub struct SidecarTransport {
    link: SidecarLink,
    process: Mutex<Option<SidecarProcess>>,
    destroyed: AtomicBool,
}

#[async_trait]
impl Outbound for SidecarTransport {
    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        self.link
            .send(&ClientCommand::Send {
                to: to.to_string(),
                text: text.to_string(),
                request_id: uuid::Uuid::new_v4().to_string(),
            })
            .await
    }
}

#[async_trait]
impl Transport for SidecarTransport {
    async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("destroying whatsapp transport");
        self.link.close().await;
        let mut process = self.process.lock().await;
        if let Some(mut proc) = process.take() {
            proc.stop().await;
        }
    }
}

/// Launcher that spawns (or attaches to) the Node sidecar.
pub struct SidecarLauncher {
    settings: SidecarSettings,
}

impl SidecarLauncher {
    pub fn new(settings: SidecarSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl TransportLauncher for SidecarLauncher {
    async fn launch(
        &self,
        events: mpsc::Sender<TransportEvent>,
    ) -> anyhow::Result<Arc<dyn Transport>> {
        let process = if self.settings.auto_start {
            let sidecar_dir = find_sidecar_dir(self.settings.sidecar_dir.as_deref())?;
            let proc = start_sidecar(SidecarProcessConfig {
                sidecar_dir,
                port: self.settings.port,
                auth_dir: self.settings.auth_dir.clone(),
            })
            .await?;
            Some(proc)
        } else {
            None
        };

        let link =
            SidecarLink::connect_with_retry(self.settings.port, events, CONNECT_ATTEMPTS).await?;

        let auth_dir = self
            .settings
            .auth_dir
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        if let Err(e) = link.send(&ClientCommand::Login { auth_dir }).await {
            warn!(error = %e, "failed to request sidecar login");
        }

        Ok(Arc::new(SidecarTransport {
            link,
            process: Mutex::new(process),
            destroyed: AtomicBool::new(false),
        }))
    }
}
