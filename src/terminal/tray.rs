use std::sync::{Arc, Mutex, PoisonError};

use ratatui::layout::Rect;

use super::scene::{Scene, TabView, TrayView};
use crate::config::PanelPosition;
use crate::handle::PanelId;
use crate::tabs::{MinimizedTabRecord, TrayPresenter};
use crate::theme;
use crate::ui::UiFrame;

/// Mirrors the tab registry into the scene so the tray is drawn with the
/// panels.
pub struct TerminalTray {
    scene: Arc<Mutex<Scene>>,
}

impl TerminalTray {
    pub(crate) fn new(scene: Arc<Mutex<Scene>>) -> Self {
        Self { scene }
    }

    fn with_tray(&self, f: impl FnOnce(&mut TrayView)) {
        let mut scene = self.scene.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut scene.tray);
    }
}

impl TrayPresenter for TerminalTray {
    fn create_tray(&self) {
        self.with_tray(|tray| tray.present = true);
    }

    fn destroy_tray(&self) {
        self.with_tray(|tray| {
            tray.present = false;
            tray.tabs.clear();
        });
    }

    fn tabs_changed(&self, tabs: &[MinimizedTabRecord]) {
        let views: Vec<TabView> = tabs
            .iter()
            .map(|record| TabView {
                id: record.id.clone(),
                label: record.label(),
                position: record.position,
                standalone: record.presentation.standalone,
            })
            .collect();
        self.with_tray(|tray| tray.tabs = views);
    }
}

fn tab_width(tab: &TabView) -> u16 {
    (tab.label.chars().count() as u16).saturating_add(2)
}

/// Lay out tabs along the screen edges: panels minimized from the top go on
/// the top row, everything else on the bottom row, grouped left, center and
/// right by the edge they came from.
pub(crate) fn tab_rects(area: Rect, tray: &TrayView) -> Vec<(PanelId, Rect)> {
    if !tray.present || area.width == 0 || area.height == 0 {
        return Vec::new();
    }
    let group = |position: PanelPosition| -> Vec<&TabView> {
        tray.tabs.iter().filter(|t| t.position == position).collect()
    };
    let top_row = area.y;
    let bottom_row = area.bottom() - 1;
    let mut rects = Vec::new();

    let mut place = |tabs: Vec<&TabView>, row: u16, start: u16| {
        let mut x = start;
        for tab in tabs {
            let width = tab_width(tab);
            if x.saturating_add(width) > area.right() {
                break;
            }
            rects.push((tab.id.clone(), Rect::new(x, row, width, 1)));
            x = x.saturating_add(width + 1);
        }
    };
    let row_width = |tabs: &[&TabView]| -> u16 {
        tabs.iter()
            .map(|t| tab_width(t) + 1)
            .sum::<u16>()
            .saturating_sub(1)
    };

    let top = group(PanelPosition::Top);
    let top_start = area.x + area.width.saturating_sub(row_width(&top)) / 2;
    place(top, top_row, top_start);

    place(group(PanelPosition::Left), bottom_row, area.x);

    let bottom = group(PanelPosition::Bottom);
    let bottom_start = area.x + area.width.saturating_sub(row_width(&bottom)) / 2;
    place(bottom, bottom_row, bottom_start);

    let right = group(PanelPosition::Right);
    let right_start = area.right().saturating_sub(row_width(&right));
    place(right, bottom_row, right_start);

    rects
}

pub(crate) fn draw_tray(frame: &mut UiFrame<'_>, area: Rect, tray: &TrayView) {
    for (id, rect) in tab_rects(area, tray) {
        let Some(tab) = tray.tabs.iter().find(|t| t.id == id) else {
            continue;
        };
        let style = theme::tab(tab.standalone);
        frame.fill(rect, style);
        frame.set_string(rect, rect.x + 1, rect.y, &tab.label, style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(id: &str, position: PanelPosition) -> TabView {
        TabView {
            id: PanelId::from(id),
            label: id.to_string(),
            position,
            standalone: false,
        }
    }

    #[test]
    fn absent_tray_has_no_tabs() {
        let tray = TrayView {
            present: false,
            tabs: vec![tab("a", PanelPosition::Left)],
        };
        assert!(tab_rects(Rect::new(0, 0, 80, 24), &tray).is_empty());
    }

    #[test]
    fn tabs_group_by_edge() {
        let tray = TrayView {
            present: true,
            tabs: vec![
                tab("left", PanelPosition::Left),
                tab("right", PanelPosition::Right),
                tab("top", PanelPosition::Top),
            ],
        };
        let rects = tab_rects(Rect::new(0, 0, 80, 24), &tray);
        let find = |id: &str| {
            rects
                .iter()
                .find(|(tab, _)| tab.as_str() == id)
                .map(|(_, r)| *r)
                .expect("tab placed")
        };
        assert_eq!(find("left"), Rect::new(0, 23, 6, 1));
        assert_eq!(find("right"), Rect::new(73, 23, 7, 1));
        assert_eq!(find("top"), Rect::new(37, 0, 5, 1));
    }
}
