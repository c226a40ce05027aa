//! backflow - run one of the three pipeline services
//!
//! Every process reads the same configuration document and serves the
//! section for the service named on the command line:
//!
//! ```text
//! backflow a --config config/local.toml
//! backflow b --listen 127.0.0.1:9001
//! ```
//!
//! Environment variables such as `BACKFLOW__SERVICE_B__FAULT_PROBABILITY=0`
//! override file values.

use std::path::PathBuf;

use anyhow::Context;
use axum::Router;
use backflow_config::{validate_config, ConfigLoader, PipelineConfig, ENV_PREFIX};
use backflow_metrics::init_tracing;
use backflow_services::{ServiceA, ServiceB, ServiceC};
use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Which service this process runs
    #[arg(value_enum)]
    service: Service,

    /// Configuration file (TOML, YAML or JSON); defaults and environment otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen address of the selected service
    #[arg(long)]
    listen: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Service {
    A,
    B,
    C,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::from_file_with_env(path, ENV_PREFIX),
        None => ConfigLoader::from_env(),
    }
    .context("loading configuration")?;

    if let Some(listen) = args.listen {
        match args.service {
            Service::A => config.service_a.listen_addr = listen,
            Service::B => config.service_b.listen_addr = listen,
            Service::C => config.service_c.listen_addr = listen,
        }
    }

    validate_config(&config)?;
    init_tracing(&config.telemetry)?;

    match args.service {
        Service::A => run_a(&config).await,
        Service::B => run_b(&config).await,
        Service::C => run_c(&config).await,
    }
}

async fn run_a(config: &PipelineConfig) -> anyhow::Result<()> {
    let service = ServiceA::build(&config.service_a, config.telemetry.metrics_enabled)?;
    let (router, dispatcher) = service.into_parts();

    serve("service-a", &config.service_a.listen_addr, router).await?;

    let summary = dispatcher.shutdown().await?;
    info!(
        processed = summary.processed,
        abandoned = summary.abandoned,
        "Service A stopped"
    );
    Ok(())
}

async fn run_b(config: &PipelineConfig) -> anyhow::Result<()> {
    let router = ServiceB::build(&config.service_b, config.telemetry.metrics_enabled)?;
    serve("service-b", &config.service_b.listen_addr, router).await
}

async fn run_c(config: &PipelineConfig) -> anyhow::Result<()> {
    let router = ServiceC::build(&config.service_c, config.telemetry.metrics_enabled)?;
    serve("service-c", &config.service_c.listen_addr, router).await
}

async fn serve(name: &str, addr: &str, router: Router) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(service = name, addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(service = name, "Server stopped accepting requests");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
