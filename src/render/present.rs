use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use crate::render::surface::Surface;

/// Receives the surface after every completed draw, on the worker thread.
pub trait Presenter: Send {
    fn present(&mut self, surface: &Surface) -> Result<()>;
}

/// Writes the surface to a PNG every `every` frames, overwriting the file.
#[derive(Debug)]
pub struct SnapshotPresenter {
    path: PathBuf,
    every: u64,
    frames: u64,
}

impl SnapshotPresenter {
    #[must_use]
    pub fn new(path: PathBuf, every: u64) -> Self {
        Self {
            path,
            every: every.max(1),
            frames: 0,
        }
    }
}

impl Presenter for SnapshotPresenter {
    fn present(&mut self, surface: &Surface) -> Result<()> {
        self.frames += 1;
        if (self.frames - 1) % self.every != 0 {
            return Ok(());
        }
        surface.save_png(&self.path)?;
        debug!(frame = self.frames, path = %self.path.display(), "snapshot written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_first_frame_and_every_nth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mosaic.png");
        let mut presenter = SnapshotPresenter::new(path.clone(), 3);
        let surface = Surface::new(8, 4, [10, 20, 30, 255]);

        presenter.present(&surface).unwrap();
        assert!(path.exists());
        std::fs::remove_file(&path).unwrap();

        presenter.present(&surface).unwrap();
        presenter.present(&surface).unwrap();
        assert!(!path.exists());

        presenter.present(&surface).unwrap();
        let written = image::open(&path).unwrap().to_rgba8();
        assert_eq!(written.dimensions(), (8, 4));
        assert_eq!(written.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }
}
