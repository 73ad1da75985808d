//! This crate implements the aggregation server of the merged calendar view.
//!
//! The path and query string are `/parse?source=<ics_url>&start=<date>&end=<date>`. The response is
//! the list of events of the feed at `source` between `start` and `end`, as JSON.

use std::{net::SocketAddr, path::PathBuf};

use anyhow::{anyhow, Result};
use axum::{routing::get, Router};
use calmerge_core::ics_client::IcsClient;
use chrono_tz::Tz;
use clap::Parser;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod route;

#[derive(Debug, Parser)]
#[command(about)]
struct Arguments {
    /// the address to listen on
    #[arg(long, env = "CALMERGE_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,
    /// the IANA timezone of floating times and of the emitted events
    #[arg(long, env = "CALMERGE_TIMEZONE", default_value = "UTC")]
    timezone: String,
    /// serve the built frontend from this directory
    #[arg(long, env = "CALMERGE_STATIC_DIR")]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "calmerge_server=info,calmerge_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Arguments::parse();
    let timezone: Tz = args
        .timezone
        .parse()
        .map_err(|err| anyhow!("unknown timezone `{}`: {}", args.timezone, err))?;
    let app = app(IcsClient::new(timezone), args.static_dir);

    tracing::info!(addr = %args.bind, timezone = timezone.name(), "listening");
    axum::Server::bind(&args.bind)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

fn app(client: IcsClient, static_dir: Option<PathBuf>) -> Router {
    // The frontend is usually served from another port.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let mut router = Router::new().route("/parse", get(route::parse::handler));
    if let Some(static_dir) = static_dir {
        router = router.fallback_service(ServeDir::new(static_dir));
    }
    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(client)
}
