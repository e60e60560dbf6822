use facelens::camera::{Camera, CameraStatus, FrameSource, NoCamera};
use facelens::cli::login;
use facelens::cli::{SvgChartWriter, TerminalConsole};
use facelens::common::{Config, DevMode};
use facelens::core::{Mode, SessionRunner};
use facelens::service::{AnalysisBackend, BackendClient};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Parser)]
#[command(name = "facelens")]
#[command(about = "Live face-shape and skin analysis from a local camera")]
struct Cli {
    /// Enable development mode (debug log file, saved captures and charts)
    #[arg(long, global = true)]
    dev: bool,

    /// Config file to use instead of the default search path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream frames and show the live face-shape readout
    Live,
    /// Wait for a stable pose, capture, and run skin analysis
    Skin,
    /// Log in and pick a feature from the menu
    Login {
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// List video capture devices
    Devices,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let dev_mode = DevMode::new(cli.dev)?;
    let uses_screen = !matches!(cli.command, Commands::Devices);
    setup_logging(&dev_mode, uses_screen);

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Live => run_session(Mode::Continuous, &config, &dev_mode),
        Commands::Skin => run_session(Mode::Gated, &config, &dev_mode),
        Commands::Login { username, password } => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stdout();

            let creds = login::login_interactive(&mut input, &mut output, username.as_deref(), password.as_deref())?;
            let feature = login::choose_feature(&mut input, &mut output, &creds)?;
            drop(input);

            tracing::info!("{} selected {}", creds.username, feature);
            run_session(feature.mode(), &config, &dev_mode)
        }
        Commands::Devices => list_devices(),
    }
}

fn run_session(mode: Mode, config: &Config, dev_mode: &DevMode) -> Result<()> {
    let backend: Arc<dyn AnalysisBackend> = Arc::new(BackendClient::new(&config.backend)?);

    let mut camera = Camera::open(&config.camera);
    let stream = match camera.as_mut() {
        Ok(camera) => {
            tracing::info!("Streaming from /dev/video{}", camera.index());
            camera.start_session().map_err(|e| e.to_string())
        }
        Err(e) => Err(e.to_string()),
    };

    match stream {
        Ok(stream) => drive(mode, config, dev_mode, backend, stream, CameraStatus::Ready),
        Err(reason) => drive(mode, config, dev_mode, backend, NoCamera, CameraStatus::Error(reason)),
    }
}

fn drive<F: FrameSource>(
    mode: Mode,
    config: &Config,
    dev_mode: &DevMode,
    backend: Arc<dyn AnalysisBackend>,
    frames: F,
    camera: CameraStatus,
) -> Result<()> {
    let charts = Box::new(SvgChartWriter::new(config.render.chart_path.clone(), dev_mode.clone()));
    let console = TerminalConsole::new(&config.render)?;

    let runner = SessionRunner::new(mode, config, frames, console, backend, charts, dev_mode.clone());
    let (session, console) = runner.run(camera)?;
    drop(console);

    if let Some(chart) = session.chart() {
        println!("Radar chart: {}", chart.path.display());
    }
    println!("{}", session.status());
    Ok(())
}

fn list_devices() -> Result<()> {
    let cameras = Camera::list_all()?;
    if cameras.is_empty() {
        println!("❌ No cameras found!");
        println!("\nTroubleshooting:");
        println!("  1. Check if a camera is connected");
        println!("  2. Ensure you have permission to access /dev/video*");
        return Ok(());
    }

    for camera in &cameras {
        println!("📷 /dev/video{}: {}", camera.index, camera.name);
        for format in &camera.formats {
            println!("   - {}", format);
        }
        if !camera.video_capture {
            println!("   (no video capture)");
        }
    }

    match Camera::detect_color_camera() {
        Ok(index) => println!("\n✅ device_index = 999 would select /dev/video{}", index),
        Err(e) => println!("\n⚠️  {}", e),
    }
    Ok(())
}

fn setup_logging(dev_mode: &DevMode, uses_screen: bool) {
    let level = if dev_mode.is_enabled() {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    // While the session screen owns the terminal, log lines go to a file.
    let log_path = if uses_screen || dev_mode.is_enabled() {
        dev_mode.log_file()
    } else {
        None
    };
    let opened = log_path.as_deref().map(open_log_file);

    match opened {
        Some(Ok(file)) => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_file(dev_mode.is_enabled())
            .with_line_number(dev_mode.is_enabled())
            .with_thread_ids(dev_mode.is_enabled())
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        Some(Err(e)) => {
            eprintln!("Cannot open log file: {}. Only errors will be shown.", e);
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::ERROR)
                .with_writer(io::stderr)
                .init();
        }
        None if uses_screen => tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_writer(io::stderr)
            .init(),
        None => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(io::stderr)
            .init(),
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
