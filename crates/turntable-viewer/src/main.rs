//! Turntable Viewer - Main entry point
//!
//! Opens a window with a lit scene and one model spinning about its X and Y
//! axes. Press R to retry after a failed load.

use anyhow::{Context, Result};
use bevy::prelude::*;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use turntable_core::config::load_config;
use turntable_core::{ModelFormat, ModelLoader};
use turntable_scene::{LoadBridge, TurntablePlugin};

#[derive(Parser, Debug)]
#[command(name = "turntable-viewer")]
#[command(about = "Display a 3D model spinning in a lit scene")]
#[command(version)]
struct Args {
    /// Model location: local path, file:// URI, or http(s) URL
    #[arg(short, long)]
    url: String,

    /// Model format (gltf, obj, fbx, json)
    #[arg(short, long)]
    format: ModelFormat,

    /// Path to configuration file
    #[arg(short, long, default_value = "turntable.toml")]
    config: PathBuf,

    /// Start hidden; the model is not loaded until the view becomes visible
    #[arg(long)]
    hidden: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Turntable viewer v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;

    if args.hidden {
        config.viewer.visible = false;
    }

    info!(
        url = %args.url,
        format = %args.format,
        spin_increment = config.viewer.spin_increment,
        visible = config.viewer.visible,
        "Configuration loaded"
    );

    let loader = ModelLoader::new(&config.fetch).context("Failed to create HTTP client")?;
    let bridge = LoadBridge::new(loader).context("Failed to start load runtime")?;

    let exit = App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Turntable".to_string(),
                ..default()
            }),
            ..default()
        }))
        .insert_resource(ClearColor(Color::srgb(0.1, 0.1, 0.12)))
        .insert_resource(bridge)
        .add_plugins(TurntablePlugin {
            config,
            url: args.url,
            format: args.format,
        })
        .run();

    if let AppExit::Error(code) = exit {
        anyhow::bail!("Viewer exited with code {}", code);
    }

    Ok(())
}
