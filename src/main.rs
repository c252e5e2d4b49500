//! Binary entrypoint for the media slideshow.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use media_slideshow::catalog::Catalog;
use media_slideshow::config::Configuration;
use media_slideshow::events::EventQueue;
use media_slideshow::pipeline::gst::GstEngine;
use media_slideshow::tasks::driver::build_driver;
use media_slideshow::tasks::signals::{spawn_close_bridge, spawn_shutdown_listener};
use media_slideshow::tasks::window::{ChromeOptions, run_windowed};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "media-slideshow",
    version,
    about = "Fullscreen image and video slideshow"
)]
struct Args {
    /// Directory containing images and videos
    #[arg(value_name = "DIRECTORY")]
    directory: Option<PathBuf>,
    /// Seconds to display each image (default: 5)
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,
    /// Search subdirectories recursively
    #[arg(short, long)]
    recursive: bool,
    /// Shuffle media files randomly
    #[arg(short, long)]
    shuffle: bool,
    /// Deterministic seed for the shuffled order
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
    /// Optional YAML config file; flags override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Run without a window of our own; sinks open their own
    #[arg(long)]
    windowless: bool,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(format!("media_slideshow={level}"))
            .add_directive("winit=warn".parse()?)
            .add_directive("gstreamer=warn".parse()?),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

fn load_configuration(args: &Args) -> Result<Configuration> {
    let mut cfg = match &args.config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(dir) = &args.directory {
        cfg.media_directory = Some(dir.clone());
    }
    if let Some(secs) = args.interval {
        cfg.image_interval = Duration::from_secs(secs);
    }
    cfg.recursive |= args.recursive;
    cfg.shuffle |= args.shuffle;
    if args.seed.is_some() {
        cfg.shuffle_seed = args.seed;
    }
    cfg.validated().context("invalid configuration values")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;
    let cfg = load_configuration(&args)?;

    let Some(root) = cfg.media_directory.clone() else {
        bail!("no media directory given (pass DIRECTORY or set media-directory)");
    };
    if cfg.recursive {
        info!(root = %root.display(), "searching recursively for media files");
    } else {
        info!(root = %root.display(), "looking for media files");
    }
    let catalog = Catalog::scan(&root, &cfg.scan_options(), cfg.playback_order())
        .context("failed to build media catalog")?;
    catalog.log_listing(cfg.listed_files);

    let engine = GstEngine::new(cfg.image_sink.clone())?;
    let cancel = CancellationToken::new();
    let listener = spawn_shutdown_listener(cancel.clone());

    let reason = if args.windowless {
        let queue = EventQueue::new();
        let mut driver = build_driver(catalog, engine, &queue, cfg.image_interval);
        let bridge = spawn_close_bridge(cancel.clone(), queue.sender());
        let reason = tokio::task::block_in_place(|| {
            driver.start(std::time::Instant::now());
            driver.run_blocking()
        });
        bridge.abort();
        reason
    } else {
        let chrome = ChromeOptions {
            cursor_hide_delay: cfg.cursor_hide_delay,
            focus_nudge: cfg.focus_nudge,
        };
        let interval = cfg.image_interval;
        let cancel = cancel.clone();
        // The window owns the main thread; the queue gets its waker first.
        run_windowed(EventQueue::new(), chrome, move |queue| {
            spawn_close_bridge(cancel, queue.sender());
            Ok(build_driver(catalog, engine, queue, interval))
        })
        .context("viewer failed")?
    };

    cancel.cancel();
    listener.abort();
    info!(%reason, "slideshow finished");
    if reason.is_failure() {
        bail!("{reason}");
    }
    Ok(())
}
