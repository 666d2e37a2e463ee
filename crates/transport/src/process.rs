//! Sidecar process management.
//!
//! The sidecar is a small Node.js program wrapping the WhatsApp Web client
//! library; wabridge spawns one instance, forwards its log output into
//! `tracing`, and guarantees a teardown attempt on restart and shutdown.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use {
    anyhow::{Context, Result, bail},
    tokio::{
        io::{AsyncBufReadExt, BufReader},
        process::{Child, Command},
    },
    tracing::{debug, error, info, warn},
};

use crate::sidecar::DEFAULT_SIDECAR_PORT;

/// Handle to a running sidecar process.
pub struct SidecarProcess {
    child: Child,
    port: u16,
}

impl SidecarProcess {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Check if the process is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Gracefully stop the sidecar process.
    pub async fn stop(&mut self) {
        info!("stopping whatsapp sidecar process");

        // SIGTERM first so the client can persist session credentials.
        #[cfg(unix)]
        {
            use nix::{
                sys::signal::{Signal, kill},
                unistd::Pid,
            };

            if let Some(pid) = self.child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.kill().await;
        }

        match tokio::time::timeout(std::time::Duration::from_secs(5), self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(?status, "whatsapp sidecar process exited");
            },
            Ok(Err(e)) => {
                warn!(error = %e, "error waiting for sidecar process");
            },
            Err(_) => {
                warn!("sidecar process did not exit gracefully, killing");
                let _ = self.child.kill().await;
            },
        }
    }
}

impl Drop for SidecarProcess {
    fn drop(&mut self) {
        // kill_on_drop is set on the Command; just note it.
        if let Some(pid) = self.child.id() {
            debug!(pid, "dropping sidecar process handle");
        }
    }
}

/// Configuration for starting the sidecar process.
#[derive(Debug, Clone)]
pub struct SidecarProcessConfig {
    /// Directory containing the sidecar (with `package.json`).
    pub sidecar_dir: PathBuf,
    /// Port for the sidecar WebSocket server.
    pub port: u16,
    /// Directory where the client persists session credentials.
    pub auth_dir: Option<PathBuf>,
}

impl Default for SidecarProcessConfig {
    fn default() -> Self {
        Self {
            sidecar_dir: PathBuf::new(),
            port: DEFAULT_SIDECAR_PORT,
            auth_dir: None,
        }
    }
}

/// Find the sidecar directory.
///
/// Searches in order:
/// 1. Explicit path if provided
/// 2. `WABRIDGE_SIDECAR_DIR` environment variable
/// 3. Relative to the executable: `../sidecar/whatsapp-web`
/// 4. Development paths relative to the working directory
pub fn find_sidecar_dir(explicit_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        if path.join("package.json").exists() {
            return Ok(path.to_path_buf());
        }
        bail!(
            "sidecar directory does not exist or missing package.json: {}",
            path.display()
        );
    }

    if let Ok(dir) = std::env::var("WABRIDGE_SIDECAR_DIR") {
        let path = PathBuf::from(&dir);
        if path.join("package.json").exists() {
            return Ok(path);
        }
        warn!(path = %dir, "WABRIDGE_SIDECAR_DIR set but package.json not found");
    }

    if let Ok(exe_path) = std::env::current_exe()
        && let Some(exe_dir) = exe_path.parent()
    {
        for rel in ["../sidecar/whatsapp-web", "../../sidecar/whatsapp-web"] {
            let candidate = exe_dir.join(rel);
            if candidate.join("package.json").exists() {
                return Ok(candidate);
            }
        }
    }

    for rel_path in [
        "sidecar/whatsapp-web",
        "../sidecar/whatsapp-web",
        "../../sidecar/whatsapp-web",
    ] {
        let path = PathBuf::from(rel_path);
        if path.join("package.json").exists() {
            return Ok(path.canonicalize().unwrap_or(path));
        }
    }

    bail!(
        "whatsapp sidecar not found. Set WABRIDGE_SIDECAR_DIR or ensure \
         sidecar/whatsapp-web exists with package.json"
    )
}

/// Start the sidecar process.
pub async fn start_sidecar(config: SidecarProcessConfig) -> Result<SidecarProcess> {
    let sidecar_dir = &config.sidecar_dir;

    if !sidecar_dir.join("package.json").exists() {
        bail!(
            "whatsapp sidecar not found at {}",
            sidecar_dir.display()
        );
    }
    if !sidecar_dir.join("dist/index.js").exists() {
        bail!(
            "whatsapp sidecar is not built. Run `cd {} && npm install && npm run build` first.",
            sidecar_dir.display()
        );
    }

    info!(
        path = %sidecar_dir.display(),
        port = config.port,
        "starting whatsapp sidecar process"
    );

    let mut cmd = Command::new("node");
    cmd.arg("dist/index.js")
        .current_dir(sidecar_dir)
        .env("WABRIDGE_SIDECAR_PORT", config.port.to_string())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(auth_dir) = &config.auth_dir {
        cmd.env("WABRIDGE_AUTH_DIR", auth_dir);
    }

    let mut child = cmd.spawn().context("failed to spawn sidecar process")?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let reader = BufReader::new(stdout);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                forward_sidecar_log(&line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let reader = BufReader::new(stderr);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(target: "whatsapp_sidecar", "{}", line);
            }
        });
    }

    // Give the process a moment to fail fast on port conflicts etc.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    match child.try_wait() {
        Ok(Some(status)) => {
            bail!("sidecar process exited immediately with status: {status}");
        },
        Ok(None) => {},
        Err(e) => {
            bail!("failed to check sidecar process status: {e}");
        },
    }

    info!(port = config.port, "whatsapp sidecar process started");

    Ok(SidecarProcess {
        child,
        port: config.port,
    })
}

/// Forward one line of sidecar stdout into tracing, unwrapping the
/// sidecar's JSON logs when possible.
fn forward_sidecar_log(line: &str) {
    if line.starts_with('{')
        && let Ok(log) = serde_json::from_str::<serde_json::Value>(line)
    {
        let level = log.get("level").and_then(|v| v.as_u64()).unwrap_or(30);
        let msg = log.get("msg").and_then(|v| v.as_str()).unwrap_or(line);
        match level {
            10 | 20 => debug!(target: "whatsapp_sidecar", "{}", msg),
            30 => info!(target: "whatsapp_sidecar", "{}", msg),
            40 => warn!(target: "whatsapp_sidecar", "{}", msg),
            _ => error!(target: "whatsapp_sidecar", "{}", msg),
        }
        return;
    }
    info!(target: "whatsapp_sidecar", "{}", line);
}
