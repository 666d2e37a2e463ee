use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use {
    clap::{Parser, Subcommand},
    tracing::{error, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    wabridge_gateway::AppState,
    wabridge_routing::{AssociationClient, ConversationForwarder, MessageRouter},
    wabridge_session::{SessionManager, SessionOutbound},
    wabridge_transport::{Outbound, SidecarLauncher, SidecarSettings},
};

#[derive(Parser)]
#[command(name = "wabridge", about = "wabridge — WhatsApp bridge for the chat platform")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Explicit config file (overrides discovery).
    #[arg(long, global = true, env = "WABRIDGE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge (default when no subcommand is provided).
    Serve,
    /// Send a test message through a running bridge.
    Send {
        /// Recipient phone number.
        #[arg(long)]
        to: String,
        /// Message text.
        #[arg(short, long)]
        message: String,
        /// Base URL of the running bridge's control API.
        #[arg(long, default_value = "http://localhost:8080")]
        api_url: String,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "wabridge starting");

    match cli.command {
        None | Some(Commands::Serve) => serve(cli).await,
        Some(Commands::Send {
            to,
            message,
            api_url,
        }) => send_test(&to, &message, &api_url).await,
    }
}

async fn serve(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut cfg = wabridge_config::load_config(path)?;
            cfg.apply_env_overrides();
            cfg
        },
        None => wabridge_config::discover_and_load(),
    };

    // CLI args override config values.
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.request_timeout_secs))
        .build()?;

    let launcher = Arc::new(SidecarLauncher::new(SidecarSettings {
        port: config.transport.sidecar_port,
        sidecar_dir: config.transport.sidecar_dir.clone(),
        auth_dir: config.transport.auth_dir.clone(),
        auto_start: config.transport.auto_start,
    }));
    let session = Arc::new(
        SessionManager::new(launcher)
            .with_restart_delay(Duration::from_secs(config.transport.restart_delay_secs)),
    );
    let outbound: Arc<dyn Outbound> = Arc::new(SessionOutbound::new(Arc::clone(&session)));

    let associations = AssociationClient::new(http.clone(), config.backend.url.clone());
    let forwarder = ConversationForwarder::new(
        http.clone(),
        config.engine.url.clone(),
        Arc::clone(&outbound),
    );
    let router = Arc::new(MessageRouter::new(
        associations.clone(),
        forwarder,
        Arc::clone(&outbound),
    ));

    // The API starts listening immediately; the transport is brought up
    // after a grace period.
    let startup_delay = Duration::from_secs(config.transport.startup_delay_secs);
    {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            tokio::time::sleep(startup_delay).await;
            session.start(router).await;
        });
    }

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let state = AppState::new(Arc::clone(&session), associations, outbound);

    let server = tokio::spawn(wabridge_gateway::serve(state, addr));
    tokio::select! {
        result = server => {
            // The listener failing to bind is fatal; surface it.
            result??;
        },
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        },
    }

    // Guaranteed teardown attempt for the transport before exit.
    session.shutdown().await;
    info!("wabridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await;
                return;
            },
        };
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn send_test(to: &str, message: &str, api_url: &str) -> anyhow::Result<()> {
    let url = format!("{}/api/whatsapp/send-test", api_url.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(&url)
        .json(&serde_json::json!({ "phone_number": to, "message": message }))
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_success() {
        println!("{body}");
        Ok(())
    } else {
        anyhow::bail!("send failed ({status}): {body}")
    }
}
