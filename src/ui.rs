//! UiFrame: a thin wrapper around a ratatui buffer that clamps drawing to the
//! visible area.
//!
//! Panels slide in from an edge, so their rectangles routinely hang partly
//! outside the terminal. Every draw call goes through the clipping here
//! instead of each renderer checking bounds.
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::Widget;

pub struct UiFrame<'a> {
    area: Rect,
    buffer: &'a mut Buffer,
}

impl<'a> UiFrame<'a> {
    pub fn new(frame: &'a mut Frame<'_>) -> Self {
        let area = frame.area();
        let buffer = frame.buffer_mut();
        Self { area, buffer }
    }

    /// Draw into an arbitrary buffer, e.g. an offscreen one in tests or the
    /// headless bench.
    pub fn from_parts(area: Rect, buffer: &'a mut Buffer) -> Self {
        Self { area, buffer }
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        self.buffer
    }

    fn clip_rect(&self, rect: Rect) -> Option<Rect> {
        let clipped = rect.intersection(self.area);
        if clipped.width == 0 || clipped.height == 0 {
            None
        } else {
            Some(clipped)
        }
    }

    pub fn render_widget<W>(&mut self, widget: W, area: Rect)
    where
        W: Widget,
    {
        if let Some(clipped) = self.clip_rect(area) {
            widget.render(clipped, self.buffer);
        }
    }

    /// Blank `rect` and paint it with `style`.
    pub fn fill(&mut self, rect: Rect, style: Style) {
        let Some(clipped) = self.clip_rect(rect) else {
            return;
        };
        for y in clipped.y..clipped.bottom() {
            for x in clipped.x..clipped.right() {
                if let Some(cell) = self.buffer.cell_mut((x, y)) {
                    cell.reset();
                    cell.set_symbol(" ");
                    cell.set_style(style);
                }
            }
        }
    }

    /// Restyle `rect` without touching its symbols.
    pub fn overlay(&mut self, rect: Rect, style: Style) {
        let Some(clipped) = self.clip_rect(rect) else {
            return;
        };
        for y in clipped.y..clipped.bottom() {
            for x in clipped.x..clipped.right() {
                if let Some(cell) = self.buffer.cell_mut((x, y)) {
                    cell.set_style(style);
                }
            }
        }
    }

    /// Copy cells from an offscreen buffer into `dest`, reading from
    /// (`src_x`, `src_y`) onward. Cells missing from `src` are skipped.
    pub fn blit_from(&mut self, src: &Buffer, src_x: u16, src_y: u16, dest: Rect) {
        let Some(clipped) = self.clip_rect(dest) else {
            return;
        };
        let skip_x = clipped.x - dest.x;
        let skip_y = clipped.y - dest.y;
        for dy in 0..clipped.height {
            for dx in 0..clipped.width {
                let from = (
                    src_x.saturating_add(skip_x + dx),
                    src_y.saturating_add(skip_y + dy),
                );
                let Some(cell) = src.cell(from) else {
                    continue;
                };
                if let Some(target) = self.buffer.cell_mut((clipped.x + dx, clipped.y + dy)) {
                    *target = cell.clone();
                }
            }
        }
    }

    /// Write `text` at (`x`, `y`), truncated to stay inside both `bounds`
    /// and the frame.
    pub fn set_string(&mut self, bounds: Rect, x: u16, y: u16, text: &str, style: Style) {
        if let Some(bounds) = self.clip_rect(bounds) {
            safe_set_string(self.buffer, bounds, x, y, text, style);
        }
    }
}

pub(crate) fn safe_set_string(
    buffer: &mut Buffer,
    bounds: Rect,
    x: u16,
    y: u16,
    text: &str,
    style: Style,
) {
    if bounds.width == 0 || bounds.height == 0 {
        return;
    }
    let max_x = bounds.x.saturating_add(bounds.width);
    let max_y = bounds.y.saturating_add(bounds.height);
    if x < bounds.x || x >= max_x || y < bounds.y || y >= max_y {
        return;
    }
    let available = max_x.saturating_sub(x);
    let text = truncate_to_width(text, available as usize);
    buffer.set_string(x, y, text, style);
}

pub(crate) fn truncate_to_width(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    value.chars().take(width).collect()
}
