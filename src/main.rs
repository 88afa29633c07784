use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use copilot_gateway::auth::device;
use copilot_gateway::{api, config, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "copilot_gateway=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Login) => run_login(cfg).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    if cfg.default_credential.is_some() {
        tracing::info!("Pre-provisioned credential loaded from environment");
    }
    if cfg.client_id.is_none() {
        tracing::warn!("CLIENT_ID not set; /auth device login is disabled");
    }

    let state = Arc::new(AppState::new(cfg));
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Copilot gateway listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_login(cfg: config::Config) -> anyhow::Result<()> {
    let state = AppState::new(cfg);

    let authz = state.device.request_device_code().await?;
    println!(
        "Open https://github.com/login/device and enter the code: {}",
        authz.user_code
    );
    println!(
        "Waiting for authorization (polling every {}s, giving up after {} minutes)...",
        device::POLL_INTERVAL.as_secs(),
        device::POLL_CEILING.as_secs() / 60
    );

    let credential = state.device.wait_for_credential(&authz.device_code).await?;
    println!("Credential: {credential}");
    println!("Use it as:  Authorization: Bearer {credential}");
    Ok(())
}
