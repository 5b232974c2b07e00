use anyhow::Result;
use call_coach::{create_router, AppState, Config};
use clap::Parser;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "call-coach", about = "Realtime sales call coaching backend")]
struct Args {
    /// Configuration file to load (extension optional); environment
    /// variables prefixed CALL_COACH__ override it.
    #[arg(long, default_value = "config/call-coach")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    if cfg.transcription.api_key.is_none() {
        warn!("transcription api key missing, sessions will run without transcripts");
    }
    if cfg.analysis.api_key.is_none() {
        warn!("analysis api key missing, insights will be heuristic-only");
    }

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let state = AppState::new(cfg);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("websocket listening on ws://{addr}/ws");
    axum::serve(listener, app).await?;

    Ok(())
}
