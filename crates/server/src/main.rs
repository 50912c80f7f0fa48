//! The quill server binary.
//!
//! Opens the catalog named by `--catalog`, wires the query engine, and
//! serves the HTTP front-end on `--addr`. Exits 0 on clean shutdown and
//! non-zero on a fatal startup error.

mod http;

use clap::Parser;
use quill_catalog::Site;
use quill_query::Engine;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "quill", about = "A query engine for JSON documents")]
struct Flags {
    /// HTTP listen address.
    #[arg(long, default_value = "0.0.0.0:8093")]
    addr: String,

    /// Catalog to serve, e.g. dir:/path/to/site.
    #[arg(long)]
    catalog: String,

    /// Default pool for statements that do not name one.
    #[arg(long, default_value = "default")]
    pool: String,

    /// Per-request timeout (e.g. 30s, 2m); a negative value disables it.
    #[arg(long, default_value = "-1", value_parser = parse_timeout)]
    query_timeout: Timeout,
}

#[derive(Clone, Debug)]
struct Timeout(Option<Duration>);

fn parse_timeout(raw: &str) -> Result<Timeout, String> {
    if raw.trim_start().starts_with('-') {
        return Ok(Timeout(None));
    }
    humantime::parse_duration(raw)
        .map(|d| Timeout(Some(d)))
        .map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let flags = Flags::parse();
    if let Err(err) = run(flags).await {
        error!(error = %err, "fatal");
        std::process::exit(1);
    }
}

async fn run(flags: Flags) -> anyhow::Result<()> {
    let site = quill_catalog::dir::open(&flags.catalog).await?;
    info!(catalog = %flags.catalog, pools = ?site.pool_names(), "catalog opened");

    let engine = Engine::new(site, flags.pool).with_timeout(flags.query_timeout.0);
    let router = http::router(http::AppState {
        engine: Arc::new(engine),
    });

    let listener = tokio::net::TcpListener::bind(&flags.addr).await?;
    info!(addr = %flags.addr, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
