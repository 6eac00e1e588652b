use anyhow::{Context, Result};
use clap::Parser;
use merkez_live::audio::AudioDeviceFactory;
use merkez_live::{create_router, AppState, Config, NatsLiveChannel};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "merkez-live", about = "Realtime voice session service")]
struct Cli {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/merkez-live")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Arc::new(Config::load(&cli.config)?);

    info!("{} starting", config.service.name);

    let channel = Arc::new(NatsLiveChannel::new(config.live.nats_url.clone()));
    let device = AudioDeviceFactory::create(&config.audio.device)?;
    let state = AppState::new(Arc::clone(&config), channel, device);

    let router = create_router(state.clone());
    let addr = format!("{}:{}", config.service.http.bind, config.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("listening on {} (audio device: {})", addr, config.audio.device);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("HTTP server failed")?;

    // Don't leave a live session holding the microphone on the way out
    if let Some(session) = state.live.write().await.take() {
        info!("closing live session {} on shutdown", session.session_id());
        session.close().await;
    }

    Ok(())
}
