use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser};
use tokio::select;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rgb_mosaic::config::Configuration;
use rgb_mosaic::events::InputEvent;
use rgb_mosaic::render::glyphs::{FontPainter, load_font};
use rgb_mosaic::render::present::{Presenter, SnapshotPresenter};
use rgb_mosaic::render::worker::{self, RenderWorker};
use rgb_mosaic::source::{CameraAcquirer, ConfiguredAcquirer};
use rgb_mosaic::tasks::coordinator::{self, CoordinatorChannels};
use rgb_mosaic::tasks::frame_rate::{self, FrameRateCounter};
use rgb_mosaic::tasks::input;
use rgb_mosaic::viewport::InsetBounds;

#[derive(Debug, Parser)]
#[command(
    name = "rgb-mosaic",
    version,
    about = "Renders a video source as a mosaic of RGB channel digits"
)]
struct Args {
    /// Path to YAML config; built-in defaults when omitted
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Stop after this many frames (overrides pipeline.max-frames)
    #[arg(long, value_name = "N")]
    frames: Option<u64>,
    /// Write the rendered surface to this PNG (overrides snapshot.path)
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        frames,
        snapshot,
        verbose,
    } = Args::parse();
    init_tracing(verbose);

    let mut cfg = match &config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if frames.is_some() {
        cfg.pipeline.max_frames = frames;
    }
    if snapshot.is_some() {
        cfg.snapshot.path = snapshot;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::debug!("Configuration:\n{:#?}", cfg);

    let source = match ConfiguredAcquirer::new(cfg.source.clone()).acquire() {
        Ok(source) => source,
        Err(err) => {
            tracing::error!("failed to acquire video source: {err}");
            return Err(err).context("pipeline not started");
        }
    };

    let font = load_font(&cfg.render.font_families, cfg.render.font_path.as_deref())?;
    let render_worker = RenderWorker::new(FontPainter::new(font), cfg.render.glyph_tint);
    let presenter = cfg.snapshot.path.clone().map(|path| {
        tracing::info!(path = %path.display(), every = cfg.snapshot.every, "writing snapshots");
        Box::new(SnapshotPresenter::new(path, cfg.snapshot.every)) as Box<dyn Presenter>
    });

    // Coordinator <-> worker, input surface, minimap
    let (to_worker, inbox) = crossbeam_channel::unbounded();
    let (ready_tx, ready_rx) = mpsc::unbounded_channel();
    let (input_tx, input_rx) = mpsc::channel::<InputEvent>(32);
    let (inset_tx, inset_rx) = watch::channel(InsetBounds::default());

    let worker_handle = worker::spawn(render_worker, presenter, inbox, ready_tx)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }
    input::spawn_stdin_reader(input_tx, cancel.clone())?;

    let counter = FrameRateCounter::default();
    let mut tasks = JoinSet::new();

    tasks.spawn({
        let counter = counter.clone();
        let cancel = cancel.clone();
        let period = cfg.pipeline.frame_rate_interval;
        async move {
            frame_rate::run(counter, period, None, cancel)
                .await
                .context("frame-rate task failed")
        }
    });

    tasks.spawn(log_inset(inset_rx, cancel.clone()));

    let started = Instant::now();
    let channels = CoordinatorChannels {
        to_worker,
        ready: ready_rx,
        input: input_rx,
        inset: inset_tx,
    };
    let outcome = coordinator::run(cfg.clone(), source, channels, counter, cancel.clone())
        .await
        .context("coordinator failed");
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    let stats = tokio::task::spawn_blocking(move || worker_handle.join())
        .await
        .context("failed to join render worker")?
        .map_err(|_| anyhow!("render worker panicked"))?;
    let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);
    tracing::info!(
        frames = stats.frames,
        violations = stats.violations,
        elapsed = %humantime::format_duration(elapsed),
        "session ended"
    );

    outcome.map(|report| {
        if report.halted {
            tracing::warn!("video source failed during the session");
        }
    })
}

/// Logs the minimap insets whenever the viewport moves.
async fn log_inset(mut inset: watch::Receiver<InsetBounds>, cancel: CancellationToken) -> Result<()> {
    loop {
        select! {
            _ = cancel.cancelled() => break,
            changed = inset.changed() => {
                if changed.is_err() {
                    break;
                }
                let [left, right, top, bottom] = inset.borrow_and_update().percentages();
                tracing::debug!(%left, %right, %top, %bottom, "viewport inset");
            }
        }
    }
    Ok(())
}
