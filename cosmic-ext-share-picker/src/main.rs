mod cli;
mod config;
mod terminal;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cosmic_ext_share_core::engine::TrackConstraints;
use cosmic_ext_share_core::memory::{InMemoryConnection, InMemoryEngine, InMemoryTrack};
use cosmic_ext_share_core::picker::StaticThumbnails;
use cosmic_ext_share_core::store::LastSettingsStore;
use cosmic_ext_share_core::virtmic::NoVirtualMic;
use cosmic_ext_share_core::{
    DerivedQuality, FrameRate, Resolution, ShareCoordinator, Source, StreamClosed, StreamPick,
    VirtualMicBackend,
};
use std::path::Path;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::broadcast;
use tracing::{info, warn};

use cli::{Cli, Command};
use config::Config;
use terminal::TerminalPicker;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    cli::init_logging(&cli).context("Failed to initialize logging")?;

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path).context("Failed to load configuration")?;

    match cli.command {
        Command::Derive { resolution, fps } => {
            let resolution: Resolution = resolution.parse().map_err(|e| anyhow!("{}", e))?;
            let frame_rate: FrameRate = fps.parse().map_err(|e| anyhow!("{}", e))?;
            let quality = DerivedQuality::new(resolution, frame_rate);
            println!("{}", serde_json::to_string_pretty(&quality)?);
        }
        Command::DumpConfig => {
            println!("# {}", config_path.display());
            println!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to serialize config")?
            );
        }
        Command::Pick {
            sources,
            skip_picker,
            user_id,
            no_virtmic,
        } => {
            let use_virtmic = config.virtual_mic.enabled && !no_virtmic;
            run_picker(&config, &sources, skip_picker, user_id, use_virtmic).await?;
        }
    }

    Ok(())
}

fn load_sources(path: &Path) -> Result<Vec<Source>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read sources from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse sources in {}", path.display()))
}

/// Whether `pactl` can reach a sound server
#[cfg(target_os = "linux")]
async fn pactl_available() -> bool {
    tokio::process::Command::new("pactl")
        .arg("info")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(target_os = "linux")]
async fn virtual_mic_backend(enabled: bool) -> Arc<dyn VirtualMicBackend> {
    use cosmic_ext_share_core::virtmic::pactl::PactlVirtualMic;

    if !enabled {
        return Arc::new(NoVirtualMic);
    }
    if !pactl_available().await {
        warn!("pactl cannot reach a sound server, stream audio will fail to start");
    }
    Arc::new(PactlVirtualMic::new())
}

#[cfg(not(target_os = "linux"))]
async fn virtual_mic_backend(_enabled: bool) -> Arc<dyn VirtualMicBackend> {
    Arc::new(NoVirtualMic)
}

async fn run_picker(
    config: &Config,
    sources_path: &Path,
    skip_picker: bool,
    user_id: Option<String>,
    use_virtmic: bool,
) -> Result<()> {
    let sources = load_sources(sources_path)?;
    info!("Loaded {} capture sources", sources.len());

    // Stand-in call: one connection owned by the local user
    let engine = Arc::new(InMemoryEngine::new(user_id.clone()));
    if let Some(user) = &user_id {
        let connection = Arc::new(InMemoryConnection::new(user.clone()));
        connection.set_video_track(Arc::new(InMemoryTrack::new(TrackConstraints::default())));
        engine.add_connection(connection);
    }

    let backend = virtual_mic_backend(use_virtmic).await;
    let mut coordinator = ShareCoordinator::new(
        config.coordinator_config(),
        engine,
        backend,
        Arc::new(StaticThumbnails::new(&sources)),
    );
    if config.picker.remember_last_settings {
        coordinator = coordinator.with_settings_store(LastSettingsStore::default_location());
    }

    let (closed_tx, closed_rx) = broadcast::channel(16);
    let listener = coordinator.listen_for_stream_closures(closed_rx);

    let mut ui = TerminalPicker::new(BufReader::new(tokio::io::stdin()), tokio::io::stderr());
    let pick = match coordinator
        .open_screen_share_picker(sources, skip_picker, &mut ui)
        .await
    {
        Ok(pick) => pick,
        Err(e) if e.is_cancellation() => {
            info!("Screen share cancelled");
            return Ok(());
        }
        Err(e) => return Err(anyhow!(e.user_message())).context("Screen share failed"),
    };

    println!("{}", serde_json::to_string_pretty(&pick)?);

    if let Some(task) = coordinator.pending_reconcile().take() {
        task.join().await;
    }

    if let (Some(listener), Some(user)) = (listener, user_id) {
        if pick.settings.audio {
            wait_for_share_end(&pick, &user, &closed_tx).await?;
        }
        drop(closed_tx);
        if let Err(e) = listener.await {
            warn!("Stream listener ended abnormally: {}", e);
        }
    }

    Ok(())
}

/// Keep the virtual microphone up until Ctrl+C, then close the stream
async fn wait_for_share_end(
    pick: &StreamPick,
    user: &str,
    closed_tx: &broadcast::Sender<StreamClosed>,
) -> Result<()> {
    info!("Sharing {}, press Ctrl+C to stop", pick.id);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    let key = format!("share:{}:{}", pick.id, user);
    if closed_tx.send(StreamClosed::new(key)).is_err() {
        warn!("No listener for stream closure");
    }
    Ok(())
}
