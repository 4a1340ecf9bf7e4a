use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use common::{StatusReport, ToolLocation};
use std::path::PathBuf;
use supervisor::{AppDirs, Config, ManagerError, Outcome, Settings, WallpaperManager};

#[derive(Parser)]
#[command(name = "video-wallpaper")]
#[command(about = "Play a video file as the desktop wallpaper", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file to use instead of ~/.config/video-wallpaper/config.toml
    #[arg(short, long, env = "VIDEO_WALLPAPER_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug details (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the player and its helpers are installed
    Check,

    /// Show the selected video, playback and autostart state
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Select the video file to play
    Select {
        /// Path to the video file
        path: PathBuf,
    },

    /// Start playback of the selected video
    Start {
        /// Select this video file first
        path: Option<PathBuf>,
    },

    /// Stop playback
    Stop,

    /// Start the wallpaper automatically on login
    Autostart {
        #[arg(value_enum)]
        state: Toggle,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        // Manager errors are already phrased as status text
        match e.downcast_ref::<ManagerError>() {
            Some(err) => eprintln!("✗ Error: {}", err),
            None => eprintln!("✗ Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let dirs = AppDirs::discover()?;
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load(&dirs)?,
    };

    let default_level = if cli.verbose {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    log::debug!(
        "video-wallpaper v{} (config root {})",
        env!("CARGO_PKG_VERSION"),
        dirs.config_dir.display()
    );

    let settings_path = dirs.settings_file();
    let mut settings = Settings::load(&settings_path);
    let mut manager =
        WallpaperManager::from_config(&config, &dirs)?.with_selection(settings.last_file.clone());

    // Missing tools are reported; the manager itself refuses the actions
    let init = manager.initialize();

    match cli.command {
        Commands::Check => {
            if let Err(ManagerError::MissingDependency(missing)) = &init {
                for tool in missing {
                    match &tool.location {
                        ToolLocation::SearchPath => println!("  {} (not found in PATH)", tool),
                        ToolLocation::File(path) => {
                            println!("  {} (expected at {})", tool, path.display())
                        }
                    }
                }
            }
            report(init)
        }
        Commands::Status { json } => {
            let status = manager.status_report();
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
            Ok(())
        }
        Commands::Select { path } => {
            warn_if_disabled(&init);
            report(manager.on_file_selected(&path))?;
            remember_selection(&manager, &mut settings, &settings_path)
        }
        Commands::Start { path } => {
            warn_if_disabled(&init);
            if let Some(path) = path {
                report(manager.on_file_selected(&path))?;
                remember_selection(&manager, &mut settings, &settings_path)?;
            }
            report(manager.on_start())
        }
        Commands::Stop => {
            warn_if_disabled(&init);
            report(manager.on_stop())
        }
        Commands::Autostart { state } => {
            warn_if_disabled(&init);
            report(manager.on_autostart_toggled(matches!(state, Toggle::On)))
        }
    }
}

fn report(outcome: Outcome) -> Result<()> {
    let message = outcome?;
    println!("✓ {}", message);
    Ok(())
}

fn warn_if_disabled(init: &Outcome) {
    if let Err(e) = init {
        log::warn!("{}", e);
    }
}

fn remember_selection(
    manager: &WallpaperManager,
    settings: &mut Settings,
    path: &std::path::Path,
) -> Result<()> {
    settings.last_file = manager.selected().map(|p| p.to_path_buf());
    settings
        .save(path)
        .with_context(|| format!("Failed to save settings to {}", path.display()))
}

fn print_status(status: &StatusReport) {
    println!("Video Wallpaper Status:");
    println!("  Version: {}", status.version);
    match &status.selected {
        Some(path) => println!("  Selected: {}", path.display()),
        None => println!("  Selected: (none)"),
    }
    println!("  Playback: {}", status.playback);
    match (&status.autostart.video, status.autostart.enabled) {
        (Some(video), true) => println!("  Autostart: enabled ({})", video.display()),
        _ => println!("  Autostart: disabled"),
    }
    if status.controls_enabled {
        println!("  Dependencies: all found");
    } else {
        println!(
            "  Dependencies: missing {}",
            common::format_missing(&status.missing_tools)
        );
    }
}
