//! Pannable window over the full-resolution mosaic.
//!
//! Offsets are measured in source pixels; `cell_size` converts them to surface
//! units. The controller is owned by the coordinator and only mutated by input
//! handlers, so it needs no synchronisation.

use tracing::debug;

/// Snapshot of the viewport, handed to the worker as part of each draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub offset_x: f32,
    pub offset_y: f32,
    pub cell_size: f32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub source_width: u32,
    pub source_height: u32,
}

impl ViewportState {
    /// Number of source pixels that fit across the surface.
    #[must_use]
    pub fn visible_columns(&self) -> f32 {
        self.canvas_width as f32 / self.cell_size
    }

    #[must_use]
    pub fn visible_rows(&self) -> f32 {
        self.canvas_height as f32 / self.cell_size
    }

    /// Inclusive `(min, max)` offsets for each axis. Both ends are equal when
    /// the source is narrower than the surface.
    #[must_use]
    pub fn offset_range(&self) -> ((f32, f32), (f32, f32)) {
        (
            axis_range(self.source_width, self.visible_columns()),
            axis_range(self.source_height, self.visible_rows()),
        )
    }

    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.offset_x = clamp_axis(self.offset_x, self.source_width, self.visible_columns());
        self.offset_y = clamp_axis(self.offset_y, self.source_height, self.visible_rows());
        self
    }

    /// Minimap projection: how far each edge of the viewport is inset from
    /// the matching edge of the source, as a fraction of the source.
    #[must_use]
    pub fn inset(&self) -> InsetBounds {
        if self.source_width == 0 || self.source_height == 0 {
            return InsetBounds::default();
        }
        let sw = self.source_width as f32;
        let sh = self.source_height as f32;
        InsetBounds {
            left: fraction(self.offset_x / sw),
            right: fraction(1.0 - (self.offset_x + self.visible_columns()) / sw),
            top: fraction(self.offset_y / sh),
            bottom: fraction(1.0 - (self.offset_y + self.visible_rows()) / sh),
        }
    }
}

fn fraction(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn axis_range(source: u32, visible: f32) -> (f32, f32) {
    if source == 0 {
        return (0.0, 0.0);
    }
    let upper = source as f32 - visible;
    if upper >= 0.0 {
        (0.0, upper)
    } else {
        // source narrower than the surface: pin it to the centre
        let centred = upper / 2.0;
        (centred, centred)
    }
}

/// Saturating clamp of one axis offset.
#[must_use]
pub fn clamp_axis(offset: f32, source: u32, visible: f32) -> f32 {
    let (min, max) = axis_range(source, visible);
    if !offset.is_finite() {
        return min;
    }
    offset.clamp(min, max)
}

/// Source-pixel index window the worker rasterizes. Both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleWindow {
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
}

impl VisibleWindow {
    #[must_use]
    pub fn new(
        surface_width: u32,
        surface_height: u32,
        cell_size: f32,
        offset_x: f32,
        offset_y: f32,
    ) -> Self {
        let columns = surface_width as f32 / cell_size;
        let rows = surface_height as f32 / cell_size;
        Self {
            x_min: offset_x.floor() as i64,
            x_max: (columns + offset_x).ceil() as i64,
            y_min: offset_y.floor() as i64,
            y_max: (rows + offset_y).ceil() as i64,
        }
    }

    #[must_use]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        (self.x_min..=self.x_max).contains(&x) && (self.y_min..=self.y_max).contains(&y)
    }

    /// The window intersected with a `width x height` source, as half-open
    /// ranges ready for iteration. `None` when nothing overlaps.
    #[must_use]
    pub fn clip(&self, width: u32, height: u32) -> Option<(std::ops::Range<u32>, std::ops::Range<u32>)> {
        let x0 = self.x_min.max(0);
        let y0 = self.y_min.max(0);
        let x1 = (self.x_max + 1).min(i64::from(width));
        let y1 = (self.y_max + 1).min(i64::from(height));
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32..x1 as u32, y0 as u32..y1 as u32))
    }
}

/// Edge insets of the viewport as fractions of the source, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InsetBounds {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl InsetBounds {
    /// CSS-style percentage strings in `left, right, top, bottom` order.
    #[must_use]
    pub fn percentages(&self) -> [String; 4] {
        [self.left, self.right, self.top, self.bottom].map(|v| format!("{}%", v * 100.0))
    }
}

/// Owns the viewport and keeps it inside valid bounds.
#[derive(Debug, Clone)]
pub struct ViewportController {
    state: ViewportState,
    min_cell_size: f32,
    max_cell_size: f32,
}

impl ViewportController {
    #[must_use]
    pub fn new(
        canvas_width: u32,
        canvas_height: u32,
        cell_size: f32,
        min_cell_size: f32,
        max_cell_size: f32,
    ) -> Self {
        let cell_size = cell_size.clamp(min_cell_size, max_cell_size);
        Self {
            state: ViewportState {
                offset_x: 0.0,
                offset_y: 0.0,
                cell_size,
                canvas_width,
                canvas_height,
                source_width: 0,
                source_height: 0,
            },
            min_cell_size,
            max_cell_size,
        }
    }

    #[must_use]
    pub fn current_state(&self) -> ViewportState {
        self.state
    }

    /// Records the source resolution. Returns `true` when it changed.
    pub fn set_source(&mut self, width: u32, height: u32) -> bool {
        if self.state.source_width == width && self.state.source_height == height {
            return false;
        }
        debug!(width, height, "viewport source resolution updated");
        self.state.source_width = width;
        self.state.source_height = height;
        self.state = self.state.clamped();
        true
    }

    /// Pans by a delta in surface units.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let cell = self.state.cell_size;
        if delta_x.is_finite() {
            self.state.offset_x += delta_x / cell;
        }
        if delta_y.is_finite() {
            self.state.offset_y += delta_y / cell;
        }
        self.state = self.state.clamped();
    }

    /// Moves the viewport with a drag on a minimap `minimap_width` units
    /// wide. The minimap keeps the source aspect, so one scale covers both axes.
    pub fn drag_inset(&mut self, delta_x: f32, delta_y: f32, minimap_width: f32) {
        if self.state.source_width == 0 || !(minimap_width > 0.0) {
            return;
        }
        let scale = self.state.source_width as f32 / minimap_width;
        if delta_x.is_finite() {
            self.state.offset_x += delta_x * scale;
        }
        if delta_y.is_finite() {
            self.state.offset_y += delta_y * scale;
        }
        self.state = self.state.clamped();
    }

    /// Changes the cell size and re-clamps the current offset.
    pub fn resize(&mut self, cell_size: f32) {
        if !cell_size.is_finite() {
            return;
        }
        self.state.cell_size = cell_size.clamp(self.min_cell_size, self.max_cell_size);
        self.state = self.state.clamped();
    }
}
