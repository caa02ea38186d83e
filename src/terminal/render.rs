//! Panel geometry and drawing.
//!
//! A panel is drawn at full size into an offscreen buffer, then the slice
//! that is currently slid in gets copied onto the frame. Geometry helpers
//! work in the panel's local coordinates so hit-testing and drawing agree.

use std::sync::PoisonError;

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::{Block, Borders};

use crate::config::{PanelPosition, PanelSize};
use crate::footer::FooterAction;
use crate::surface::{Chrome, FooterContent, MountedPanel};
use crate::theme;
use crate::ui::{UiFrame, safe_set_string};

const CLOSE_GLYPH: &str = "×";
const MINIMIZE_GLYPH: &str = "_";
const MAX_FOOTER_VIEW_ROWS: u16 = 3;

/// Where a partially slid-in panel lands on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placement {
    /// Full panel size; the offscreen buffer is this big.
    pub full: Rect,
    /// Visible slice in screen coordinates.
    pub screen: Rect,
    /// Offset of the visible slice inside `full`.
    pub src_x: u16,
    pub src_y: u16,
}

impl Placement {
    /// Map a local rect to a screen rect, clipped to the visible slice.
    pub fn to_screen(&self, local: Rect) -> Option<Rect> {
        let visible = Rect::new(self.src_x, self.src_y, self.screen.width, self.screen.height);
        let clipped = local.intersection(visible);
        if clipped.width == 0 || clipped.height == 0 {
            return None;
        }
        Some(Rect::new(
            self.screen.x + (clipped.x - self.src_x),
            self.screen.y + (clipped.y - self.src_y),
            clipped.width,
            clipped.height,
        ))
    }
}

/// Geometry for a panel at `position` that is `shown` (0.0..=1.0) slid in.
pub(crate) fn placement(
    area: Rect,
    position: PanelPosition,
    size: PanelSize,
    shown: f32,
) -> Option<Placement> {
    let shown = shown.clamp(0.0, 1.0);
    let slide = |extent: u16| ((extent as f32) * shown).round() as u16;
    let placement = if position.is_horizontal() {
        let width = size.extent(position, area.width);
        let visible = slide(width).min(width);
        let full = Rect::new(0, 0, width, area.height);
        match position {
            PanelPosition::Left => Placement {
                full,
                screen: Rect::new(area.x, area.y, visible, area.height),
                src_x: width - visible,
                src_y: 0,
            },
            _ => Placement {
                full,
                screen: Rect::new(area.right() - visible, area.y, visible, area.height),
                src_x: 0,
                src_y: 0,
            },
        }
    } else {
        let height = size.extent(position, area.height);
        let visible = slide(height).min(height);
        let full = Rect::new(0, 0, area.width, height);
        match position {
            PanelPosition::Top => Placement {
                full,
                screen: Rect::new(area.x, area.y, area.width, visible),
                src_x: 0,
                src_y: height - visible,
            },
            _ => Placement {
                full,
                screen: Rect::new(area.x, area.bottom() - visible, area.width, visible),
                src_x: 0,
                src_y: 0,
            },
        }
    };
    if placement.screen.width == 0 || placement.screen.height == 0 {
        None
    } else {
        Some(placement)
    }
}

/// Regions of a panel in local coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PanelLayout {
    pub inner: Rect,
    pub header: Option<Rect>,
    pub close: Option<Rect>,
    pub minimize: Option<Rect>,
    pub body: Rect,
    pub footer: Option<Rect>,
    pub buttons: Vec<Rect>,
}

pub(crate) fn layout(full: Rect, chrome: &Chrome) -> PanelLayout {
    let inner = Block::default().borders(Borders::ALL).inner(full);
    let mut out = PanelLayout {
        inner,
        ..PanelLayout::default()
    };
    if inner.width == 0 || inner.height == 0 {
        return out;
    }
    let mut body = inner;

    if chrome.show_header {
        let header = Rect::new(inner.x, inner.y, inner.width, 1);
        let mut right = header.right();
        if chrome.show_close_button && right >= header.x + 2 {
            right -= 2;
            out.close = Some(Rect::new(right, header.y, 1, 1));
        }
        if chrome.minimizable && right >= header.x + 2 {
            right -= 2;
            out.minimize = Some(Rect::new(right, header.y, 1, 1));
        }
        out.header = Some(header);
        body.y += 1;
        body.height -= 1;
    }

    let footer_rows = match &chrome.footer {
        FooterContent::None => 0,
        FooterContent::Actions(actions) if actions.is_empty() => 0,
        FooterContent::Actions(_) => 1,
        FooterContent::View(view) => (view.lines(inner.width).len() as u16).min(MAX_FOOTER_VIEW_ROWS),
    };
    // The body keeps at least one row.
    let footer_rows = footer_rows.min(body.height.saturating_sub(1));
    if footer_rows > 0 {
        let footer = Rect::new(body.x, body.bottom() - footer_rows, body.width, footer_rows);
        if let FooterContent::Actions(actions) = &chrome.footer {
            out.buttons = footer_buttons(footer, actions);
        }
        out.footer = Some(footer);
        body.height -= footer_rows;
    }
    out.body = body;
    out
}

/// One rect per action, left to right, separated by a space. Buttons that
/// do not fit are dropped from the end.
pub(crate) fn footer_buttons(row: Rect, actions: &[FooterAction]) -> Vec<Rect> {
    let mut rects = Vec::with_capacity(actions.len());
    let mut x = row.x;
    for action in actions {
        let width = button_text(action).chars().count() as u16;
        if x.saturating_add(width) > row.right() {
            break;
        }
        rects.push(Rect::new(x, row.y, width, 1));
        x = x.saturating_add(width + 1);
    }
    rects
}

fn button_text(action: &FooterAction) -> String {
    format!(" {} ", action.caption())
}

/// Draw `chrome` and `body` into an offscreen buffer sized `layout`'s frame.
pub(crate) fn draw_panel(
    buffer: &mut Buffer,
    full: Rect,
    layout: &PanelLayout,
    chrome: &Chrome,
    body: &[String],
    focused: bool,
) {
    let border = if focused {
        theme::border_focused()
    } else {
        theme::border()
    };
    let mut frame = UiFrame::from_parts(full, buffer);
    frame.fill(full, theme::body());
    frame.render_widget(
        Block::default().borders(Borders::ALL).border_style(border),
        full,
    );
    let buffer = frame.buffer_mut();

    if let Some(header) = layout.header {
        let style = theme::header(focused);
        for x in header.x..header.right() {
            if let Some(cell) = buffer.cell_mut((x, header.y)) {
                cell.set_symbol(" ");
                cell.set_style(style);
            }
        }
        let title = chrome
            .header
            .as_ref()
            .and_then(|view| view.lines(header.width).into_iter().next())
            .unwrap_or_else(|| chrome.title.clone());
        let title_end = layout
            .minimize
            .or(layout.close)
            .map(|r| r.x)
            .unwrap_or(header.right());
        let title_area = Rect::new(header.x, header.y, title_end.saturating_sub(header.x), 1);
        safe_set_string(buffer, title_area, header.x + 1, header.y, &title, style);
        if let Some(rect) = layout.minimize {
            safe_set_string(buffer, rect, rect.x, rect.y, MINIMIZE_GLYPH, theme::header_button());
        }
        if let Some(rect) = layout.close {
            safe_set_string(buffer, rect, rect.x, rect.y, CLOSE_GLYPH, theme::header_button());
        }
    }

    for (row, line) in (layout.body.y..layout.body.bottom()).zip(body) {
        safe_set_string(buffer, layout.body, layout.body.x, row, line, theme::body());
    }

    if let Some(footer) = layout.footer {
        match &chrome.footer {
            FooterContent::Actions(actions) => {
                for (rect, action) in layout.buttons.iter().zip(actions) {
                    let style = theme::footer_button(
                        action.color.as_deref(),
                        action.disabled,
                        action.loading,
                    );
                    safe_set_string(buffer, *rect, rect.x, rect.y, &button_text(action), style);
                }
            }
            FooterContent::View(view) => {
                let lines = view.lines(footer.width);
                for (row, line) in (footer.y..footer.bottom()).zip(&lines) {
                    safe_set_string(buffer, footer, footer.x, row, line, theme::body());
                }
            }
            FooterContent::None => {}
        }
    }
}

/// Draw one mounted panel onto `frame`. Returns false when nothing was
/// visible.
pub(crate) fn draw_layer(
    frame: &mut UiFrame<'_>,
    area: Rect,
    panel: &MountedPanel,
    shown: f32,
    focused: bool,
) -> bool {
    let Some(chrome) = panel.chrome() else {
        return false;
    };
    let Some(placement) = placement(area, chrome.position, chrome.size, shown) else {
        return false;
    };
    let layout = layout(placement.full, &chrome);
    let body = panel
        .content
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .body(layout.body.width);
    let mut offscreen = Buffer::empty(placement.full);
    draw_panel(&mut offscreen, placement.full, &layout, &chrome, &body, focused);
    frame.blit_from(&offscreen, placement.src_x, placement.src_y, placement.screen);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PanelView;
    use crate::state::PanelState;

    fn chrome(footer: FooterContent) -> Chrome {
        Chrome {
            title: "Settings".to_string(),
            state: PanelState::Open,
            position: PanelPosition::Right,
            size: PanelSize::Cells(20),
            show_header: true,
            show_close_button: true,
            minimizable: true,
            header: None,
            footer,
        }
    }

    #[test]
    fn right_panel_slides_from_the_right_edge() {
        let area = Rect::new(0, 0, 100, 30);
        let half = placement(area, PanelPosition::Right, PanelSize::Cells(20), 0.5)
            .expect("half visible");
        assert_eq!(half.screen, Rect::new(90, 0, 10, 30));
        assert_eq!((half.src_x, half.src_y), (0, 0));
        assert_eq!(half.full, Rect::new(0, 0, 20, 30));
        assert!(placement(area, PanelPosition::Right, PanelSize::Cells(20), 0.0).is_none());
    }

    #[test]
    fn left_and_top_panels_show_their_trailing_slice() {
        let area = Rect::new(0, 0, 100, 30);
        let left = placement(area, PanelPosition::Left, PanelSize::Cells(20), 0.25)
            .expect("left");
        assert_eq!(left.screen, Rect::new(0, 0, 5, 30));
        assert_eq!(left.src_x, 15);
        let top = placement(area, PanelPosition::Top, PanelSize::Cells(10), 1.0).expect("top");
        assert_eq!(top.screen, Rect::new(0, 0, 100, 10));
        assert_eq!(top.src_y, 0);
    }

    #[test]
    fn layout_places_header_buttons_and_footer() {
        let full = Rect::new(0, 0, 20, 10);
        let actions = vec![FooterAction::new("Save"), FooterAction::new("Cancel")];
        let layout = layout(full, &chrome(FooterContent::Actions(actions)));
        assert_eq!(layout.header, Some(Rect::new(1, 1, 18, 1)));
        assert_eq!(layout.close, Some(Rect::new(17, 1, 1, 1)));
        assert_eq!(layout.minimize, Some(Rect::new(15, 1, 1, 1)));
        assert_eq!(layout.footer, Some(Rect::new(1, 8, 18, 1)));
        assert_eq!(
            layout.buttons,
            vec![Rect::new(1, 8, 6, 1), Rect::new(8, 8, 8, 1)]
        );
        assert_eq!(layout.body, Rect::new(1, 2, 18, 6));
    }

    #[test]
    fn footer_view_rows_are_capped() {
        let full = Rect::new(0, 0, 20, 12);
        let view = PanelView::from_fn("tall", |_| vec!["x".to_string(); 10]);
        let layout = layout(full, &chrome(FooterContent::View(view)));
        assert_eq!(layout.footer.map(|f| f.height), Some(MAX_FOOTER_VIEW_ROWS));
        assert!(layout.buttons.is_empty());
    }

    #[test]
    fn to_screen_clips_to_the_visible_slice() {
        let area = Rect::new(0, 0, 100, 30);
        let left = placement(area, PanelPosition::Left, PanelSize::Cells(20), 0.5)
            .expect("left");
        // Local column 12 sits two cells into the visible slice.
        assert_eq!(left.to_screen(Rect::new(12, 1, 1, 1)), Some(Rect::new(2, 1, 1, 1)));
        assert_eq!(left.to_screen(Rect::new(3, 1, 1, 1)), None);
    }
}
