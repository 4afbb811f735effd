use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nipgus_config::ConfigError;
use nipgus_server::{PanelCredentials, ServerError, ServerSettings};

/// Serve the NIP/GUS plugin bundle and its JSON panel endpoints
#[derive(Debug, Parser)]
#[command(name = "nipgus-server", version)]
struct Args {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "NIPGUS_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overriding `server.bind`
    #[arg(long, env = "NIPGUS_BIND")]
    bind: Option<SocketAddr>,

    /// Directory holding the plugin bundle, overriding `server.public_dir`
    #[arg(long)]
    public_dir: Option<PathBuf>,

    /// Directory holding the panel schema, overriding `server.panel_dir`
    #[arg(long)]
    panel_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_tracing(args.verbose);

    if let Err(err) = run(args).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<(), ServerError> {
    let path = args.config.unwrap_or_else(nipgus_config::config_path);
    let cfg = nipgus_config::load_config_from(&path)?;

    let addr = match args.bind {
        Some(addr) => addr,
        None => cfg.server.bind_addr()?,
    };
    let public_dir = args.public_dir.unwrap_or_else(|| cfg.server.public_dir.clone());
    let panel_dir = args.panel_dir.unwrap_or_else(|| cfg.server.panel_dir.clone());
    if panel_dir.starts_with(&public_dir) {
        return Err(ConfigError::Validation {
            field: "server.panel_dir".into(),
            reason: format!(
                "'{}' lies inside the public directory '{}'",
                panel_dir.display(),
                public_dir.display()
            ),
        }
        .into());
    }

    let password = match nipgus_config::resolve_panel_password(&cfg) {
        Ok(password) => Some(password),
        Err(ConfigError::NoCredentials { .. }) => {
            warn!("no panel password configured; the JSON panel endpoints will refuse every request");
            None
        }
        Err(e) => return Err(e.into()),
    };

    let app = nipgus_server::router(ServerSettings {
        public_dir: public_dir.clone(),
        panel_dir,
        panel: PanelCredentials::new(cfg.server.panel_username.clone(), password),
    });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    info!("Plugin static server running on {addr}");
    info!(public_dir = %public_dir.display(), "serving bundle");
    info!("Manifest URL: http://{addr}/manifest.json");
    info!("App bundle: http://{addr}/app.js");

    nipgus_server::serve(listener, app, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
