//! Gatehouse gateway binary.
//!
//! Backend addresses come from `NOTIFICATION_SERVICE_HOST|PORT`,
//! `INVENTORY_SERVICE_HOST|PORT` and `AI_ML_SERVICE_HOST|PORT`.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use gatehouse_server::network::{GatewayServer, JwtVerifier, NetworkConfig};
use gatehouse_server::service::{ClientMultiplexer, GatewayConfig, GatewayRouter, TargetRegistry};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// HS256 secret used to verify bearer tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// Per-call timeout for backend requests, in milliseconds.
    #[arg(long, env = "CALL_TIMEOUT_MS", default_value_t = 5_000)]
    call_timeout_ms: u64,

    /// Outbound calls allowed in flight before new ones are shed.
    #[arg(long, env = "MAX_CONCURRENT_CALLS", default_value_t = 1_000)]
    max_concurrent_calls: u32,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// Comma-separated list of allowed CORS origins.
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let gateway = GatewayConfig {
        default_call_timeout_ms: args.call_timeout_ms,
        max_concurrent_calls: args.max_concurrent_calls,
        ..GatewayConfig::default()
    };
    let network = NetworkConfig {
        host: args.host,
        port: args.port,
        cors_origins: args.cors_origins,
        drain_timeout: Duration::from_secs(30),
        ..NetworkConfig::default()
    };

    let registry = TargetRegistry::from_env();
    for target in registry.iter() {
        info!(backend = %target, "backend registered");
    }
    let router = GatewayRouter::new(ClientMultiplexer::tcp(&registry, &gateway));

    let metrics = PrometheusBuilder::new().install_recorder()?;

    let mut server = GatewayServer::new(network, gateway, router, JwtVerifier::new(&args.jwt_secret))
        .with_metrics(metrics);
    let port = server.start().await?;
    info!(port, "gatehouse listening");

    server.serve(shutdown_signal()).await
}
