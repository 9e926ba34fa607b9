use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use mediascene_core::{
    AppConfig, Event, EventKind, Media, MediaState, Scene, SimulatedEngine,
};
use tracing_subscriber::EnvFilter;

/// Ticks allowed for running items to report their stop before quitting.
const STOP_GRACE_TICKS: u64 = 20;

fn main() -> mediascene_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            uris,
            ticks,
            config,
        } => run_play(&uris, ticks, config.as_ref()),
        Commands::Step {
            uris,
            steps,
            step_ms,
            config,
        } => run_step(&uris, steps, Duration::from_millis(step_ms), config.as_ref()),
    }
}

fn load_config(path: Option<&PathBuf>) -> mediascene_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::from_json_file(path)
        }
        None => Ok(AppConfig::default()),
    }
}

fn open_scene(config: AppConfig, uris: &[String]) -> mediascene_core::Result<(Scene, Vec<Media>)> {
    let engine = Arc::new(SimulatedEngine::new(config.engine));
    let scene = Scene::new(config.scene, engine)?;
    let media = uris
        .iter()
        .map(|uri| Media::new(&scene, Some(uri)))
        .collect::<mediascene_core::Result<Vec<_>>>()?;
    for item in &media {
        if !item.start() {
            tracing::warn!(media = %item.id(), uri = ?item.uri(), "could not start");
        }
    }
    Ok((scene, media))
}

fn run_play(uris: &[String], ticks: u64, config: Option<&PathBuf>) -> mediascene_core::Result<()> {
    let config = load_config(config)?;
    tracing::info!(items = uris.len(), ticks, "starting real-time playback");
    let (scene, media) = open_scene(config, uris)?;

    let mut seen = 0;
    while seen < ticks {
        let Some(event) = scene.receive(true) else {
            continue;
        };
        match event.kind() {
            EventKind::Tick { .. } => seen += 1,
            EventKind::Quit => return Ok(()),
            _ => log_event(&event),
        }
    }

    for item in &media {
        item.stop();
    }
    let mut grace = 0;
    while grace < STOP_GRACE_TICKS && media.iter().any(is_busy) {
        let Some(event) = scene.receive(true) else {
            continue;
        };
        match event.kind() {
            EventKind::Tick { .. } => grace += 1,
            EventKind::Quit => break,
            _ => log_event(&event),
        }
    }

    scene.quit();
    tracing::info!(running_time = ?scene.running_time(), "playback finished");
    Ok(())
}

fn run_step(
    uris: &[String],
    steps: u64,
    step: Duration,
    config: Option<&PathBuf>,
) -> mediascene_core::Result<()> {
    let mut config = load_config(config)?;
    config.scene.lock_step = true;
    tracing::info!(items = uris.len(), steps, ?step, "starting lock-step playback");
    let (scene, media) = open_scene(config, uris)?;

    for index in 0..steps {
        if !scene.advance(step) {
            tracing::warn!(index, "step rejected, stopping early");
            break;
        }
        drain_events(&scene);
    }

    for item in &media {
        item.stop();
    }
    for _ in 0..STOP_GRACE_TICKS {
        drain_events(&scene);
        if !media.iter().any(is_busy) {
            break;
        }
        std::thread::sleep(step);
    }

    scene.quit();
    tracing::info!(running_time = ?scene.running_time(), "lock-step playback finished");
    Ok(())
}

fn drain_events(scene: &Scene) {
    while let Some(event) = scene.receive(false) {
        log_event(&event);
    }
}

fn is_busy(media: &Media) -> bool {
    !matches!(media.state(), MediaState::Stopped | MediaState::Disposed)
}

fn log_event(event: &Event) {
    match event.kind() {
        EventKind::Error { .. } => tracing::warn!(%event, "event"),
        EventKind::Tick { .. } => tracing::debug!(%event, "event"),
        _ => tracing::info!(%event, "event"),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Concurrent media scene player", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play items in real time until a number of ticks has elapsed.
    Play {
        /// Locators of the items to play.
        #[arg(required = true)]
        uris: Vec<String>,
        /// Number of scene ticks to run before stopping.
        #[arg(short, long, default_value_t = 5)]
        ticks: u64,
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Drive the scene clock by hand in lock-step mode.
    Step {
        /// Locators of the items to play.
        #[arg(required = true)]
        uris: Vec<String>,
        /// Number of steps to take.
        #[arg(short = 'n', long, default_value_t = 25)]
        steps: u64,
        /// Length of one step, in milliseconds.
        #[arg(long, default_value_t = 40)]
        step_ms: u64,
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
