pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod entities;
pub mod maintenance;
pub mod services;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
pub use config::Config;
use maintenance::Maintenance;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder();
        for (key, value) in &config.observability.loki_labels {
            builder = builder.label(key, value)?;
        }
        let (layer, task) = builder.build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Daemon) => run_daemon(config, prometheus_handle).await,

        Some(Commands::Init) => cli::cmd_init(),

        Some(Commands::CreateAdmin {
            username,
            email,
            password,
        }) => cli::cmd_create_admin(&config, &username, &email, password).await,

        Some(Commands::SweepInactive) => cli::cmd_sweep_inactive(&config).await,

        None => run_daemon(config, prometheus_handle).await,
    }
}

async fn run_daemon(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        "Gamekeep v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let port = config.server.port;
    let api_state = api::create_app_state_from_config(config, prometheus_handle).await?;

    let maintenance = Maintenance::new(Arc::clone(&api_state.shared));
    let maintenance_handle = tokio::spawn(async move {
        if let Err(e) = maintenance.start().await {
            error!("Maintenance error: {}", e);
        }
    });

    let app = api::router(Arc::clone(&api_state)).await?;
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let server_handle = tokio::spawn(async move {
        info!("API server running at http://0.0.0.0:{}", port);
        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        {
            error!("API server error: {}", e);
        }
    });

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    maintenance_handle.abort();
    server_handle.abort();
    info!("Daemon stopped");

    Ok(())
}
