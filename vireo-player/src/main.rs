//! Vireo player - standalone entry point
//!
//! Plays a single URL through the playback controller with the selected
//! backend. Useful for exercising the orchestration stack without a
//! library server; catalog interactions are no-ops.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vireo_common::config::resolve_setting;
use vireo_player::catalog::NoopCatalog;
use vireo_player::controller::{PlayParams, PlayerController};
use vireo_player::{create_backend, PlayerSettings};

/// Command-line arguments for vireo-player
#[derive(Parser, Debug)]
#[command(name = "vireo-player")]
#[command(about = "Playback engine driver for the Vireo media client")]
#[command(version)]
struct Args {
    /// Media URL or file to play
    url: String,

    /// Item identifier reported to the catalog service
    #[arg(long, default_value = "standalone")]
    item_id: String,

    /// Start position in milliseconds
    #[arg(long, default_value = "0")]
    start_position: u64,

    /// Engine binary
    #[arg(long, env = "VIREO_ENGINE", default_value = "mpv")]
    engine: PathBuf,

    /// Backend name (process, embedded)
    #[arg(long)]
    backend: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vireo_player=debug,vireo_common=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let settings = PlayerSettings {
        engine_binary: args.engine.clone(),
        backend_name: Some(resolve_setting(
            args.backend.as_deref(),
            vireo_player::settings::BACKEND_ENV_VAR,
            "backend",
            "process",
        )),
        ..PlayerSettings::default()
    };

    let backend = create_backend(settings.effective_backend_name().as_deref());
    info!("starting with '{}' backend", backend.name());

    let controller = PlayerController::new(backend, Arc::new(NoopCatalog), settings);
    let mut events = controller.subscribe_events();

    controller.play_url(PlayParams {
        url: args.url,
        item_id: args.item_id,
        start_position_ms: args.start_position,
        series_id: String::new(),
        season_id: String::new(),
        library_id: String::new(),
        framerate: 0.0,
        is_hdr: false,
    });

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => info!("{:?}", event),
                    Err(_) => break,
                }
            }
            _ = signal::ctrl_c() => {
                info!("received Ctrl+C, stopping playback");
                controller.stop();
                break;
            }
        }
    }

    Ok(())
}
