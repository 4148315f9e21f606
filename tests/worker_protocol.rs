use std::time::Duration;

use rgb_mosaic::config::GlyphTint;
use rgb_mosaic::events::{DrawRequest, PixelBuffer, ReadySignal, WorkerMessage};
use rgb_mosaic::render::glyphs::RecordingPainter;
use rgb_mosaic::render::surface::Surface;
use rgb_mosaic::render::worker::{self, RenderWorker};
use tokio::sync::mpsc;

fn draw(value: u8) -> WorkerMessage {
    let pixels = PixelBuffer::new(1, 1, vec![value, value, value, 255]).unwrap();
    WorkerMessage::Draw(DrawRequest {
        pixels,
        cell_size: 9.0,
        offset_x: 0.0,
        offset_y: 0.0,
    })
}

#[tokio::test]
async fn draw_sent_while_busy_is_rejected() {
    let painter = RecordingPainter::default();
    let (tx, inbox) = crossbeam_channel::unbounded();
    let (ready_tx, mut ready_rx) = mpsc::unbounded_channel();

    // both draws are queued before the worker finishes the first
    tx.send(WorkerMessage::InitSurface(Surface::new(9, 9, [0, 0, 0, 255])))
        .unwrap();
    tx.send(draw(7)).unwrap();
    tx.send(draw(200)).unwrap();

    let handle = worker::spawn(
        RenderWorker::new(painter.clone(), GlyphTint::default()),
        None,
        inbox,
        ready_tx,
    )
    .unwrap();

    let ready = tokio::time::timeout(Duration::from_secs(5), ready_rx.recv())
        .await
        .unwrap();
    assert_eq!(ready, Some(ReadySignal));

    drop(tx);
    let stats = tokio::task::spawn_blocking(move || handle.join().unwrap())
        .await
        .unwrap();
    assert_eq!(stats.frames, 1);
    assert_eq!(stats.violations, 1);
    assert!(ready_rx.recv().await.is_none());

    let texts: Vec<String> = painter.runs().into_iter().map(|r| r.text).collect();
    assert_eq!(texts, vec!["7", "7", "7"]);
}

#[tokio::test]
async fn draw_before_surface_is_dropped() {
    let painter = RecordingPainter::default();
    let (tx, inbox) = crossbeam_channel::unbounded();
    let (ready_tx, mut ready_rx) = mpsc::unbounded_channel();

    tx.send(draw(1)).unwrap();
    tx.send(WorkerMessage::InitSurface(Surface::new(9, 9, [0; 4])))
        .unwrap();
    tx.send(draw(2)).unwrap();
    drop(tx);

    let handle = worker::spawn(
        RenderWorker::new(painter.clone(), GlyphTint::default()),
        None,
        inbox,
        ready_tx,
    )
    .unwrap();
    let stats = tokio::task::spawn_blocking(move || handle.join().unwrap())
        .await
        .unwrap();

    assert_eq!(stats.violations, 1);
    assert_eq!(stats.frames, 1);
    assert_eq!(ready_rx.recv().await, Some(ReadySignal));
    assert!(painter.runs().iter().all(|r| r.text == "2"));
}
