//! sandboxd — the agent-sandbox daemon
//!
//! Wiring only: parse arguments, load configuration, assemble the service,
//! serve the invocation surface until Ctrl-C, then run the orchestrated
//! shutdown.

use anyhow::Context;
use clap::Parser;
use sandbox_application::SandboxService;
use sandbox_domain::CapabilityConfig;
use sandbox_infrastructure::backends::build_backend;
use sandbox_infrastructure::config::{ConfigLoader, FileConfig};
use sandbox_infrastructure::tools::echo_operation;
use sandbox_presentation::{Cli, run_server};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<FileConfig> {
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).context("failed to load configuration")?
    };
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok(config)
}

async fn build_service(config: &FileConfig) -> anyhow::Result<SandboxService> {
    let echo_config = config
        .apis
        .get(sandbox_infrastructure::tools::ECHO)
        .cloned()
        .unwrap_or_else(CapabilityConfig::new);

    let mut builder = SandboxService::builder()
        .session_ttl(Duration::from_secs(config.server.session_ttl_seconds))
        .call_timeout(Duration::from_secs(config.server.call_timeout_seconds))
        .sweep_interval(Duration::from_secs(config.server.sweep_interval_seconds))
        .register_tool(echo_operation(), sandbox_infrastructure::tools::ECHO, echo_config)
        .context("failed to register built-in tools")?;

    for (resource_type, section) in &config.resources {
        if !section.enabled {
            continue;
        }
        let Some(implementation) = &section.implementation else {
            warn!(resource_type, "enabled resource declares no implementation, skipping");
            continue;
        };
        let backend = build_backend(implementation, resource_type, &section.config)
            .await
            .with_context(|| format!("failed to build backend for resource '{resource_type}'"))?;
        builder = builder
            .register_backend(backend, section.config.clone())
            .with_context(|| format!("failed to register resource '{resource_type}'"))?;
        info!(resource_type, implementation, "backend registered");
    }

    Ok(builder.build())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(%err, "failed to install SIGTERM handler, falling back to Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = load_config(&cli)?;
    let service = Arc::new(build_service(&config).await?);

    service.warmup(&config.warmup).await;
    service.start_sweeper();

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("shutdown signal received");
            shutdown.cancel();
        });
    }

    let addr = format!("{}:{}", config.server.listen_addr, config.server.port);
    run_server(Arc::clone(&service), &addr, shutdown)
        .await
        .with_context(|| format!("invocation surface failed on {addr}"))?;

    service.shutdown().await;
    Ok(())
}
