//! Pipeline coordinator: the ready-driven sample -> draw loop.
//!
//! Owns the frame source, sampler, viewport and filter values. Every
//! [`ReadySignal`] from the render worker triggers one sample and one draw;
//! input events mutate state in between and only take effect on the next
//! dispatch.

use anyhow::{Context, Result, bail};
use crossbeam_channel::Sender;
use tokio::select;
use tokio::sync::{mpsc, watch};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Configuration;
use crate::events::{DrawRequest, InputEvent, PixelBuffer, ReadySignal, WorkerMessage};
use crate::processing::adjust::FilterParams;
use crate::render::surface::Surface;
use crate::sampler::FrameSampler;
use crate::source::VideoFrameSource;
use crate::tasks::frame_rate::FrameRateCounter;
use crate::viewport::{InsetBounds, ViewportController, ViewportState};

/// Enforces a single outstanding draw and keeps the send/ack trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchGate {
    sent: u64,
    acknowledged: u64,
    max_outstanding: u64,
}

impl DispatchGate {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.outstanding() == 0
    }

    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.sent - self.acknowledged
    }

    /// Claims the slot for a draw. `false` if one is already outstanding.
    pub fn acquire(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.sent += 1;
        self.max_outstanding = self.max_outstanding.max(self.outstanding());
        true
    }

    /// Records a ready signal. Unsolicited signals are ignored.
    pub fn release(&mut self) -> bool {
        if self.outstanding() == 0 {
            return false;
        }
        self.acknowledged += 1;
        true
    }

    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent
    }

    #[must_use]
    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }

    #[must_use]
    pub fn max_outstanding(&self) -> u64 {
        self.max_outstanding
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No valid frame seen yet; the worker has no surface.
    AwaitingFrame,
    Running,
    /// The source failed; sampling stopped for good.
    Halted,
}

/// Endpoints the coordinator talks through.
pub struct CoordinatorChannels {
    pub to_worker: Sender<WorkerMessage>,
    pub ready: mpsc::UnboundedReceiver<ReadySignal>,
    pub input: mpsc::Receiver<InputEvent>,
    pub inset: watch::Sender<InsetBounds>,
}

/// What happened during a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorReport {
    pub gate: DispatchGate,
    /// Samples skipped because the source had no dimensions yet.
    pub skipped: u64,
    pub halted: bool,
    pub viewport: ViewportState,
    pub filter: FilterParams,
}

struct Coordinator {
    source: Box<dyn VideoFrameSource>,
    sampler: FrameSampler,
    viewport: ViewportController,
    filter: FilterParams,
    gate: DispatchGate,
    phase: Phase,
    skipped: u64,
    waiting_for_frame: bool,
    surface_size: (u32, u32),
    surface_scale: f32,
    minimap_width: f32,
    background: [u8; 4],
    to_worker: Sender<WorkerMessage>,
    inset: watch::Sender<InsetBounds>,
}

impl Coordinator {
    fn new(
        config: &Configuration,
        source: Box<dyn VideoFrameSource>,
        to_worker: Sender<WorkerMessage>,
        inset: watch::Sender<InsetBounds>,
    ) -> Self {
        let surface_size = config.display.surface_size();
        let viewport = ViewportController::new(
            surface_size.0,
            surface_size.1,
            config.viewport.cell_size,
            config.viewport.min_cell_size,
            config.viewport.max_cell_size,
        );
        Self {
            source,
            sampler: FrameSampler::default(),
            viewport,
            filter: config.filter,
            gate: DispatchGate::default(),
            phase: Phase::AwaitingFrame,
            skipped: 0,
            waiting_for_frame: true,
            surface_size,
            surface_scale: config.display.surface_scale,
            minimap_width: config.viewport.minimap_width,
            background: config.render.background,
            to_worker,
            inset,
        }
    }

    /// Samples and, if a frame is available, sends one draw.
    fn dispatch(&mut self) -> Result<()> {
        if self.phase == Phase::Halted || !self.gate.is_open() {
            return Ok(());
        }
        let pixels = match self.sampler.sample(self.source.as_mut(), self.filter) {
            Ok(Some(pixels)) => pixels,
            Ok(None) => {
                self.skipped += 1;
                self.waiting_for_frame = true;
                debug!(skipped = self.skipped, "source not ready; skipping dispatch");
                return Ok(());
            }
            Err(err) => {
                error!("video source failed; sampling halted: {err}");
                self.phase = Phase::Halted;
                self.waiting_for_frame = false;
                return Ok(());
            }
        };
        self.waiting_for_frame = false;

        if self.phase == Phase::AwaitingFrame {
            self.transfer_surface(&pixels)?;
        }
        if self.viewport.set_source(pixels.width(), pixels.height()) {
            self.publish_inset();
        }

        let state = self.viewport.current_state();
        let request = DrawRequest {
            pixels,
            cell_size: state.cell_size,
            offset_x: state.offset_x,
            offset_y: state.offset_y,
        };
        if !self.gate.acquire() {
            bail!("dispatch attempted with a draw outstanding");
        }
        self.to_worker
            .send(WorkerMessage::Draw(request))
            .context("render worker hung up")?;
        debug!(
            sent = self.gate.sent(),
            offset_x = state.offset_x,
            offset_y = state.offset_y,
            cell_size = state.cell_size,
            "draw dispatched"
        );
        Ok(())
    }

    fn transfer_surface(&mut self, first: &PixelBuffer) -> Result<()> {
        let (width, height) = self.surface_size;
        info!(
            width,
            height,
            source_width = first.width(),
            source_height = first.height(),
            "first frame available; transferring surface"
        );
        self.to_worker
            .send(WorkerMessage::InitSurface(Surface::new(
                width,
                height,
                self.background,
            )))
            .context("render worker hung up before setup")?;
        self.phase = Phase::Running;
        Ok(())
    }

    fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::Pan { dx, dy } => {
                self.viewport
                    .pan(dx * self.surface_scale, dy * self.surface_scale);
                self.publish_inset();
            }
            InputEvent::InsetDrag { dx, dy } => {
                self.viewport.drag_inset(dx, dy, self.minimap_width);
                self.publish_inset();
            }
            InputEvent::SetContrast(value) => self.filter.set_contrast(value),
            InputEvent::SetBrightness(value) => self.filter.set_brightness(value),
            InputEvent::SetCellSize(value) => {
                self.viewport.resize(value);
                self.publish_inset();
            }
        }
        debug!(?event, viewport = ?self.viewport.current_state(), "input applied");
    }

    fn publish_inset(&self) {
        self.inset.send_replace(self.viewport.current_state().inset());
    }

    fn report(&self) -> CoordinatorReport {
        CoordinatorReport {
            gate: self.gate,
            skipped: self.skipped,
            halted: self.phase == Phase::Halted,
            viewport: self.viewport.current_state(),
            filter: self.filter,
        }
    }
}

/// Runs the loop until cancelled, the worker goes away, or `max-frames` ready
/// signals have been received.
///
/// Dropping the worker sender on return is what stops the render thread.
pub async fn run(
    config: Configuration,
    source: Box<dyn VideoFrameSource>,
    channels: CoordinatorChannels,
    counter: FrameRateCounter,
    cancel: CancellationToken,
) -> Result<CoordinatorReport> {
    let CoordinatorChannels {
        to_worker,
        mut ready,
        mut input,
        inset,
    } = channels;
    let max_frames = config.pipeline.max_frames;
    let mut coordinator = Coordinator::new(&config, source, to_worker, inset);

    let mut retry = interval(config.pipeline.idle_retry);
    retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut input_open = true;

    loop {
        let waiting = coordinator.waiting_for_frame && coordinator.gate.is_open();
        select! {
            biased;
            _ = cancel.cancelled() => break,
            event = input.recv(), if input_open => match event {
                Some(event) => coordinator.apply(event),
                None => {
                    debug!("input surface closed");
                    input_open = false;
                }
            },
            signal = ready.recv() => {
                let Some(ReadySignal) = signal else {
                    warn!("render worker stopped; ending pipeline");
                    break;
                };
                if !coordinator.gate.release() {
                    warn!("unsolicited ready signal ignored");
                    continue;
                }
                counter.record_ready();
                if max_frames.is_some_and(|max| coordinator.gate.acknowledged() >= max) {
                    info!(frames = coordinator.gate.acknowledged(), "frame limit reached");
                    cancel.cancel();
                    break;
                }
                coordinator.dispatch()?;
            }
            _ = retry.tick(), if waiting => coordinator.dispatch()?,
        }
    }

    let report = coordinator.report();
    info!(
        sent = report.gate.sent(),
        acknowledged = report.gate.acknowledged(),
        skipped = report.skipped,
        halted = report.halted,
        "coordinator stopped"
    );
    Ok(report)
}
