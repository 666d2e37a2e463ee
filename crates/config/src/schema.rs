//! Config schema types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WabridgeConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub engine: EngineConfig,
    pub transport: TransportConfig,
    pub http: HttpClientConfig,
}

/// Control API listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// The SaaS backend holding number → conversation associations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".into(),
        }
    }
}

/// The conversation engine that produces replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000".into(),
        }
    }
}

/// WhatsApp Web sidecar transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Directory containing the sidecar; discovered when unset.
    pub sidecar_dir: Option<PathBuf>,
    /// Port of the sidecar's WebSocket server.
    pub sidecar_port: u16,
    /// Where the client persists session credentials.
    pub auth_dir: Option<PathBuf>,
    /// Spawn the sidecar process ourselves (disable to attach to an
    /// externally managed one).
    pub auto_start: bool,
    /// Grace period between API start and transport initialization.
    pub startup_delay_secs: u64,
    /// Delay before re-initializing the transport after a restart.
    pub restart_delay_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            sidecar_dir: None,
            sidecar_port: 8055,
            auth_dir: None,
            auto_start: true,
            startup_delay_secs: 5,
            restart_delay_secs: 2,
        }
    }
}

/// Outbound HTTP calls to the backend and the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Total per-request timeout. A hung collaborator stalls only the one
    /// message being routed, and only this long.
    pub request_timeout_secs: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
        }
    }
}

impl WabridgeConfig {
    /// Apply the environment overrides the deployment platform sets.
    ///
    /// `PORT`, `BACKEND_URL` and `CHAT_ENGINE_URL` take precedence over the
    /// config file, matching how the service has always been deployed.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            self.server.port = port;
        }
        if let Ok(url) = std::env::var("BACKEND_URL")
            && !url.is_empty()
        {
            self.backend.url = url;
        }
        if let Ok(url) = std::env::var("CHAT_ENGINE_URL")
            && !url.is_empty()
        {
            self.engine.url = url;
        }
    }
}
