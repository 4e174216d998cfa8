//! gridloop CLI
//!
//! Runs the looper against a synthetic camera and prints grid information.

use clap::{Parser, Subcommand};
use gridloop::{input, source::create_source, GridLayout, KeyQueue, LooperConfig, Session};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "gridloop")]
#[command(about = "Real-time grid video looper")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the looper (keys from stdin: +N press, -N release, q quit)
    Run {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Camera framerate override
        #[arg(short, long)]
        fps: Option<u32>,

        /// Stop after this many seconds
        #[arg(short, long)]
        seconds: Option<u64>,
    },

    /// Print the geometry of every grid cell
    Layout {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the default configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gridloop=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            fps,
            seconds,
        } => cmd_run(config, fps, seconds).await,
        Commands::Layout { config } => cmd_layout(config),
        Commands::Config => cmd_config(),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<LooperConfig> {
    Ok(match path {
        Some(path) => LooperConfig::load(path)?,
        None => LooperConfig::default(),
    })
}

async fn cmd_run(
    config: Option<PathBuf>,
    fps: Option<u32>,
    seconds: Option<u64>,
) -> anyhow::Result<()> {
    let mut config = load_config(config)?;
    if let Some(fps) = fps {
        config = config.with_capture_fps(fps);
    }

    println!("Starting gridloop {}...\n", gridloop::VERSION);
    println!("  Cells:    {}", config.grid.cells);
    println!("  Camera:   {} @ {}", config.capture.resolution, config.capture.framerate);
    println!("  Playback: {}", config.playback.framerate);
    println!("  Buffer:   {} frames per recording", config.capture.buffer_frames);
    println!("\nKeys: +N press, -N release (N = 1..{}), q quit", config.grid.cells);
    println!("Press Ctrl+C to stop\n");

    let source = create_source(&config.capture);
    let (keys_tx, keys) = KeyQueue::new(64);
    input::spawn_stdin_reader(keys_tx)?;

    let session = Session::new(config)?;
    let stop = session.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nStopping...");
            stop.stop();
        }
    });

    let stats = session
        .run(source, keys, seconds.map(Duration::from_secs))
        .await?;

    println!("\nStatistics:");
    println!("  Frames captured:      {}", stats.frames_captured);
    println!("  Frames composited:    {}", stats.frames_composited);
    println!("  Recordings completed: {}", stats.recordings_completed);
    println!("  Recordings aborted:   {}", stats.recordings_aborted);
    println!("  Branch frames dropped: {}", stats.branch_frames_dropped);
    println!("  Buffer overflows:     {}", stats.buffer_overflows);

    Ok(())
}

fn cmd_layout(config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let layout = GridLayout::from_config(&config.grid);

    println!("Grid layout");
    println!("===========\n");
    println!("Canvas: {}", layout.canvas_resolution());
    println!("Cell:   {}\n", layout.cell_resolution());
    println!("{:<6} {:>6} {:>6} {:>6} {:>6} {:>4}", "cell", "x", "y", "w", "h", "z");
    for (cell, g) in layout.iter() {
        let name = if cell == 0 {
            "live".to_string()
        } else {
            cell.to_string()
        };
        println!(
            "{:<6} {:>6} {:>6} {:>6} {:>6} {:>4}",
            name, g.x, g.y, g.width, g.height, g.z_order
        );
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    print!("{}", LooperConfig::default().to_toml_string()?);
    Ok(())
}
