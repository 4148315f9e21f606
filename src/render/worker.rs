//! The render worker: owns the surface and turns draw requests into glyphs.
//!
//! [`RenderWorker`] is the protocol state machine and rasterizer; [`spawn`]
//! runs it on its own thread behind a crossbeam inbox.
//!
//! ```text
//! Uninitialized --InitSurface--> Idle --Draw--> Drawing --complete--> Idle
//! ```

use std::sync::LazyLock;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, trace, warn};

use crate::config::GlyphTint;
use crate::error::ProtocolViolation;
use crate::events::{DrawRequest, ReadySignal, WorkerMessage};
use crate::render::glyphs::GlyphPainter;
use crate::render::present::Presenter;
use crate::render::surface::Surface;
use crate::viewport::VisibleWindow;

static CHANNEL_LABELS: LazyLock<Vec<String>> =
    LazyLock::new(|| (0..=u8::MAX).map(|v| v.to_string()).collect());

/// Glyph height as a fraction of the cell: three glyphs per cell.
pub const GLYPHS_PER_CELL: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Uninitialized,
    Idle,
    Drawing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub frames: u64,
    pub violations: u64,
}

pub struct RenderWorker<P> {
    state: WorkerState,
    surface: Option<Surface>,
    pending: Option<DrawRequest>,
    painter: P,
    tint: GlyphTint,
    stats: WorkerStats,
}

impl<P: GlyphPainter> RenderWorker<P> {
    pub fn new(painter: P, tint: GlyphTint) -> Self {
        Self {
            state: WorkerState::Uninitialized,
            surface: None,
            pending: None,
            painter,
            tint,
            stats: WorkerStats::default(),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// Applies one inbound message. Violations leave the worker untouched.
    pub fn handle(&mut self, message: WorkerMessage) -> Result<(), ProtocolViolation> {
        let outcome = match message {
            WorkerMessage::InitSurface(surface) => self.init_surface(surface),
            WorkerMessage::Draw(request) => self.accept_draw(request),
        };
        if outcome.is_err() {
            self.stats.violations += 1;
        }
        outcome
    }

    fn init_surface(&mut self, surface: Surface) -> Result<(), ProtocolViolation> {
        if self.state != WorkerState::Uninitialized {
            return Err(ProtocolViolation::SurfaceAlreadySet);
        }
        info!(
            width = surface.width(),
            height = surface.height(),
            "render worker received surface"
        );
        self.surface = Some(surface);
        self.state = WorkerState::Idle;
        Ok(())
    }

    fn accept_draw(&mut self, request: DrawRequest) -> Result<(), ProtocolViolation> {
        match self.state {
            WorkerState::Uninitialized => Err(ProtocolViolation::NotInitialized),
            WorkerState::Drawing => Err(ProtocolViolation::Busy),
            WorkerState::Idle => {
                self.pending = Some(request);
                self.state = WorkerState::Drawing;
                Ok(())
            }
        }
    }

    /// Rasterizes the accepted request. Returns the number of glyph stacks
    /// drawn; zero when there is nothing to draw.
    pub fn rasterize(&mut self) -> usize {
        if self.state != WorkerState::Drawing {
            return 0;
        }
        let (Some(surface), Some(request)) = (self.surface.as_mut(), self.pending.as_ref()) else {
            return 0;
        };
        draw_mosaic(surface, &mut self.painter, request, self.tint)
    }

    /// Finishes the current draw and yields the signal to send back.
    pub fn complete(&mut self) -> Option<ReadySignal> {
        if self.state != WorkerState::Drawing {
            return None;
        }
        self.pending = None;
        self.state = WorkerState::Idle;
        self.stats.frames += 1;
        Some(ReadySignal)
    }
}

/// Clears `surface` and draws every visible pixel of `request` as a stack of
/// three channel values.
pub fn draw_mosaic<P: GlyphPainter + ?Sized>(
    surface: &mut Surface,
    painter: &mut P,
    request: &DrawRequest,
    tint: GlyphTint,
) -> usize {
    surface.clear();

    let cell = request.cell_size;
    if !(cell > 0.0) {
        return 0;
    }
    let pixels = &request.pixels;
    let window = VisibleWindow::new(
        surface.width(),
        surface.height(),
        cell,
        request.offset_x,
        request.offset_y,
    );
    let Some((columns, rows)) = window.clip(pixels.width(), pixels.height()) else {
        return 0;
    };

    let glyph_height = cell / GLYPHS_PER_CELL;
    let half_cell = cell / 2.0;
    let width = pixels.width() as usize;
    let bytes = pixels.as_bytes();
    let mut drawn = 0;

    for y in rows {
        let top = (y as f32 - request.offset_y) * cell;
        let row_start = y as usize * width;
        for x in columns.clone() {
            let i = (row_start + x as usize) * 4;
            let (r, g, b) = (bytes[i], bytes[i + 1], bytes[i + 2]);
            let center_x = (x as f32 - request.offset_x) * cell + half_cell;

            painter.draw_text(
                surface,
                &CHANNEL_LABELS[r as usize],
                center_x,
                top,
                glyph_height,
                tint.red(r),
            );
            painter.draw_text(
                surface,
                &CHANNEL_LABELS[g as usize],
                center_x,
                top + glyph_height,
                glyph_height,
                tint.green(g),
            );
            painter.draw_text(
                surface,
                &CHANNEL_LABELS[b as usize],
                center_x,
                top + 2.0 * glyph_height,
                glyph_height,
                tint.blue(b),
            );
            drawn += 1;
        }
    }
    drawn
}

/// Runs `worker` on a dedicated thread until `inbox` disconnects.
///
/// A draw that is already waiting in the inbox when the current draw finishes
/// was sent before `ready` went out, so it is rejected as [`ProtocolViolation::Busy`].
pub fn spawn<P>(
    worker: RenderWorker<P>,
    presenter: Option<Box<dyn Presenter>>,
    inbox: Receiver<WorkerMessage>,
    ready: UnboundedSender<ReadySignal>,
) -> Result<JoinHandle<WorkerStats>>
where
    P: GlyphPainter + 'static,
{
    thread::Builder::new()
        .name("render-worker".into())
        .spawn(move || run_loop(worker, presenter, inbox, ready))
        .context("failed to spawn render worker thread")
}

fn run_loop<P: GlyphPainter>(
    mut worker: RenderWorker<P>,
    mut presenter: Option<Box<dyn Presenter>>,
    inbox: Receiver<WorkerMessage>,
    ready: UnboundedSender<ReadySignal>,
) -> WorkerStats {
    while let Ok(message) = inbox.recv() {
        if let Err(violation) = worker.handle(message) {
            warn!(%violation, "render worker dropped message");
            continue;
        }
        if worker.state() != WorkerState::Drawing {
            continue;
        }

        let drawn = worker.rasterize();
        trace!(cells = drawn, "frame rasterized");

        if let (Some(presenter), Some(surface)) = (presenter.as_mut(), worker.surface())
            && let Err(err) = presenter.present(surface)
        {
            warn!("failed to present surface: {err:#}");
        }

        while let Ok(early) = inbox.try_recv() {
            if let Err(violation) = worker.handle(early) {
                warn!(%violation, "render worker dropped message");
            }
        }

        if let Some(signal) = worker.complete()
            && ready.send(signal).is_err()
        {
            debug!("coordinator gone; render worker stopping");
            break;
        }
    }
    let stats = worker.stats();
    info!(
        frames = stats.frames,
        violations = stats.violations,
        "render worker stopped"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PixelBuffer;
    use crate::render::glyphs::RecordingPainter;

    fn request(width: u32, height: u32, cell: f32, ox: f32, oy: f32) -> DrawRequest {
        let pixels = vec![0u8; (width * height * 4) as usize];
        DrawRequest {
            pixels: PixelBuffer::new(width, height, pixels).unwrap(),
            cell_size: cell,
            offset_x: ox,
            offset_y: oy,
        }
    }

    #[test]
    fn draw_before_surface_is_rejected() {
        let mut worker = RenderWorker::new(RecordingPainter::default(), GlyphTint::default());
        let err = worker
            .handle(WorkerMessage::Draw(request(1, 1, 9.0, 0.0, 0.0)))
            .unwrap_err();
        assert_eq!(err, ProtocolViolation::NotInitialized);
        assert_eq!(worker.state(), WorkerState::Uninitialized);
        assert_eq!(worker.stats().violations, 1);
    }

    #[test]
    fn second_surface_is_rejected() {
        let mut worker = RenderWorker::new(RecordingPainter::default(), GlyphTint::default());
        worker
            .handle(WorkerMessage::InitSurface(Surface::new(4, 4, [0; 4])))
            .unwrap();
        let err = worker
            .handle(WorkerMessage::InitSurface(Surface::new(8, 8, [0; 4])))
            .unwrap_err();
        assert_eq!(err, ProtocolViolation::SurfaceAlreadySet);
        assert_eq!(worker.surface().unwrap().width(), 4);
    }

    #[test]
    fn draw_while_drawing_is_rejected_and_ignored() {
        let painter = RecordingPainter::default();
        let mut worker = RenderWorker::new(painter.clone(), GlyphTint::default());
        worker
            .handle(WorkerMessage::InitSurface(Surface::new(18, 9, [0; 4])))
            .unwrap();

        worker
            .handle(WorkerMessage::Draw(request(2, 1, 9.0, 0.0, 0.0)))
            .unwrap();
        let err = worker
            .handle(WorkerMessage::Draw(request(4, 4, 9.0, 1.0, 1.0)))
            .unwrap_err();
        assert_eq!(err, ProtocolViolation::Busy);

        assert_eq!(worker.rasterize(), 2);
        assert_eq!(worker.complete(), Some(ReadySignal));
        assert_eq!(worker.state(), WorkerState::Idle);
        // only the first request's two pixels were drawn
        assert_eq!(painter.runs().len(), 6);
        assert_eq!(worker.complete(), None);
    }

    #[test]
    fn window_excludes_pixels_outside_viewport() {
        let painter = RecordingPainter::default();
        let mut surface = Surface::new(640, 48, [0; 4]);
        let mut handle = painter.clone();
        let drawn = draw_mosaic(
            &mut surface,
            &mut handle,
            &request(64, 1, 24.0, 10.0, 0.0),
            GlyphTint::default(),
        );
        // x in [10, 37]
        assert_eq!(drawn, 28);
        let centers: Vec<f32> = painter
            .runs()
            .iter()
            .step_by(3)
            .map(|run| run.center_x)
            .collect();
        assert_eq!(centers.first(), Some(&12.0));
        assert_eq!(centers.last(), Some(&((37.0 - 10.0) * 24.0 + 12.0)));
    }

    #[test]
    fn tint_modes_color_glyphs() {
        let mut bytes = vec![0u8; 4];
        bytes[..3].copy_from_slice(&[200, 100, 50]);
        let req = DrawRequest {
            pixels: PixelBuffer::new(1, 1, bytes).unwrap(),
            cell_size: 9.0,
            offset_x: 0.0,
            offset_y: 0.0,
        };
        let mut surface = Surface::new(9, 9, [0; 4]);

        let mut painter = RecordingPainter::default();
        draw_mosaic(&mut surface, &mut painter, &req, GlyphTint::ChannelIntensity);
        let colors: Vec<[u8; 3]> = painter.take().into_iter().map(|r| r.color).collect();
        assert_eq!(colors, vec![[200, 0, 0], [0, 100, 0], [0, 0, 50]]);

        draw_mosaic(&mut surface, &mut painter, &req, GlyphTint::PureChannel);
        let colors: Vec<[u8; 3]> = painter.take().into_iter().map(|r| r.color).collect();
        assert_eq!(colors, vec![[255, 0, 0], [0, 255, 0], [0, 0, 255]]);
    }

    #[test]
    fn default_tint_keeps_zero_channels_visible() {
        let mut bytes = vec![255u8; 4];
        bytes[..3].copy_from_slice(&[255, 0, 128]);
        let req = DrawRequest {
            pixels: PixelBuffer::new(1, 1, bytes).unwrap(),
            cell_size: 9.0,
            offset_x: 0.0,
            offset_y: 0.0,
        };
        let mut surface = Surface::new(9, 9, [0, 0, 0, 255]);
        let mut painter = RecordingPainter::default();
        draw_mosaic(&mut surface, &mut painter, &req, GlyphTint::default());
        let runs: Vec<(String, [u8; 3])> = painter
            .take()
            .into_iter()
            .map(|r| (r.text, r.color))
            .collect();
        assert_eq!(
            runs,
            vec![
                ("255".to_string(), [255, 0, 0]),
                ("0".to_string(), [0, 255, 0]),
                ("128".to_string(), [0, 0, 255]),
            ]
        );
    }

    #[test]
    fn labels_cover_every_channel_value() {
        assert_eq!(CHANNEL_LABELS.len(), 256);
        assert_eq!(CHANNEL_LABELS[0], "0");
        assert_eq!(CHANNEL_LABELS[255], "255");
    }
}
