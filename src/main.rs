//! CLI for reportage

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use reportage::audio::output::output_device_names;
use reportage::ui::{CommandProcessor, TransportHandler};
use reportage::{App, Catalog, ConfigManager, EngineEvent, ListenerPose};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// reportage - walk through a recorded interview with binaural audio
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,

    /// Config file (defaults to the user config directory)
    #[clap(short, long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List audio output devices
    Devices,
    /// List the scenes of a catalog
    List {
        /// Catalog file (.toml or .json)
        catalog: PathBuf,
    },
    /// Play one scene
    Play {
        /// Catalog file (.toml or .json)
        catalog: PathBuf,

        /// Scene id to load
        #[clap(long)]
        scene: String,

        /// Override the configured asset root
        #[clap(long)]
        asset_root: Option<String>,

        /// Orbit the listener around the scene
        #[clap(long)]
        walk: bool,

        /// Print events as JSON lines
        #[clap(long)]
        json: bool,
    },
}

/// Walk loop rate, roughly one pose per video frame
const WALK_PERIOD: Duration = Duration::from_millis(33);
const WALK_STEP: f32 = 0.01;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configure logging based on debug flag
    if args.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
        debug!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let config = match &args.config {
        Some(path) => ConfigManager::with_file(path),
        None => ConfigManager::new(),
    }
    .context("Failed to load config")?;

    match args.command {
        Commands::Devices => {
            let preferred = config.config().output_device();
            for name in output_device_names() {
                let marker = if preferred == Some(name.as_str()) { "*" } else { " " };
                println!("{} {}", marker, name);
            }
            Ok(())
        }
        Commands::List { catalog } => {
            let catalog = Catalog::load(&catalog)?;
            for entry in catalog.entries() {
                println!(
                    "{:<14} {} ({} segments, ~{}s)",
                    entry.id,
                    entry.title,
                    entry.segments.len(),
                    entry.nominal_duration_ms() / 1000
                );
            }
            Ok(())
        }
        Commands::Play {
            catalog,
            scene,
            asset_root,
            walk,
            json,
        } => {
            let mut engine_config = config.config().clone();
            if let Some(root) = asset_root {
                engine_config.asset_root = root;
            }
            let catalog = Catalog::load(&catalog)?;
            play(App::new(engine_config, catalog), &scene, walk, json).await
        }
    }
}

async fn play(mut app: App, scene: &str, walk: bool, json: bool) -> Result<()> {
    info!("Starting reportage");

    // Keep going without sound; events still flow
    match app.session_mut().enable_audio() {
        Ok(()) => {
            if let Some(output) = app.session().output() {
                println!(
                    "Playing through {} ({} Hz, {} ch)",
                    output.device_name(),
                    output.sample_rate(),
                    output.channels()
                );
            }
        }
        Err(e) => warn!("{}", e),
    }

    let mut events = app
        .session_mut()
        .take_events()
        .context("Event stream already taken")?;

    app.load_scene(scene)?;
    app.play().map_err(anyhow::Error::msg)?;

    let processor = CommandProcessor::new();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let mut walker = tokio::time::interval(WALK_PERIOD);
    let mut pose = app.config().listener_start;
    let mut angle = 0.0_f32;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };

                if let EngineEvent::SceneLoaded { listener_start, .. } = &event {
                    pose = app.place_listener(*listener_start);
                    angle = pose.x.atan2(pose.z);
                }
                // Echoes of our own walk would drown everything else
                let quiet = walk && matches!(event, EngineEvent::PoseChanged { .. });
                if !quiet {
                    print_event(&event, json)?;
                }
                if matches!(event, EngineEvent::QueueFinished) {
                    break;
                }
            }

            line = stdin.next_line(), if stdin_open => {
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        match processor.execute(&line, &mut app) {
                            Ok(message) => println!("{}", message),
                            Err(e) => println!("Error: {}", e),
                        }
                        if processor.parse(&line).map(|cmd| cmd.is_quit()).unwrap_or(false) {
                            break;
                        }
                    }
                    None => stdin_open = false,
                }
            }

            _ = walker.tick(), if walk => {
                angle += WALK_STEP;
                pose = orbit(pose, angle);
                if let Err(e) = app.move_listener(pose) {
                    debug!("Walk step skipped: {}", e);
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    app.shutdown().await?;
    Ok(())
}

/// Next pose on a circle around the origin, facing inwards.
fn orbit(current: ListenerPose, angle: f32) -> ListenerPose {
    let radius = current.x.hypot(current.z).max(1.0);
    ListenerPose::new(radius * angle.sin(), radius * angle.cos(), -angle)
}

fn print_event(event: &EngineEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        EngineEvent::SceneLoaded {
            scene_id, segments, ..
        } => println!("Scene {} loaded ({} segments)", scene_id, segments),
        EngineEvent::SegmentLoading { index } => println!("Loading segment {}...", index + 1),
        EngineEvent::SegmentStarted {
            index,
            speaker,
            label,
            duration_ms,
            source,
            ..
        } => println!(
            "▶ {} [{}] {} ({:.1}s, {:?})",
            index + 1,
            speaker,
            label,
            *duration_ms as f32 / 1000.0,
            source
        ),
        EngineEvent::Paused { index } => println!("Paused at segment {}", index + 1),
        EngineEvent::Stopped => println!("Stopped"),
        EngineEvent::QueueFinished => println!("End of interview"),
        EngineEvent::Progress {
            elapsed_ms,
            duration_ms,
            ..
        } => debug!("{:.1}/{:.1}s", *elapsed_ms as f32 / 1000.0, *duration_ms as f32 / 1000.0),
        EngineEvent::PoseChanged { pose } => println!(
            "Listener at ({:.1}, {:.1}) facing {:.0}°",
            pose.x,
            pose.z,
            pose.heading.to_degrees()
        ),
        EngineEvent::EmittersMoved { emitters } => debug!(
            "Speakers at A ({:.1}, {:.1}), B ({:.1}, {:.1})",
            emitters.a.x, emitters.a.z, emitters.b.x, emitters.b.z
        ),
        EngineEvent::BusLevelChanged { bus, level } => {
            println!("{} level {:.0}", bus, level * 100.0)
        }
        EngineEvent::AmbientStarted { source, nodes } => {
            println!("Ambient started ({:?}, {} nodes)", source, nodes)
        }
        EngineEvent::AmbientStopped { released } => debug!("Ambient stopped ({} nodes)", released),
        EngineEvent::OutputUnavailable { reason } => {
            println!("Audio output unavailable: {}", reason)
        }
    }
    Ok(())
}
