//! Ratatui rendering of the panel stack.
//!
//! [`TerminalHost`] owns a [`Scene`](scene::Scene) shared with every surface
//! and focus trap it creates. The application drives it with
//! [`tick`](TerminalHost::tick) and [`render`](TerminalHost::render) once per
//! frame; clicks are resolved through [`SurfaceHost::hit_test`].

mod render;
mod scene;
mod tray;

pub use tray::TerminalTray;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ratatui::layout::{Position, Rect};
use tokio::time::Instant;

use crate::config::ResolvedConfig;
use crate::error::{PanelError, PanelResult};
use crate::handle::PanelId;
use crate::surface::{
    FocusTrap, HitTarget, MountedPanel, RenderingSurface, SurfaceHost, Transition,
    TransitionDone,
};
use crate::tabs::TrayPresenter;
use crate::theme;
use crate::ui::UiFrame;
use scene::{Layer, Scene};

fn lock(scene: &Mutex<Scene>) -> MutexGuard<'_, Scene> {
    scene.lock().unwrap_or_else(PoisonError::into_inner)
}

fn complete_all(tokens: impl IntoIterator<Item = TransitionDone>) {
    for done in tokens {
        done.complete();
    }
}

#[derive(Clone)]
pub struct TerminalHost {
    scene: Arc<Mutex<Scene>>,
}

impl TerminalHost {
    pub fn new(area: Rect) -> Self {
        Self {
            scene: Arc::new(Mutex::new(Scene::new(area))),
        }
    }

    pub fn area(&self) -> Rect {
        lock(&self.scene).area
    }

    pub fn resize(&self, area: Rect) {
        lock(&self.scene).area = area;
    }

    /// Advance animations and acknowledge the ones that finished.
    pub fn tick(&self) {
        let finished = lock(&self.scene).tick(Instant::now());
        complete_all(finished);
    }

    pub fn is_animating(&self) -> bool {
        lock(&self.scene).is_animating()
    }

    /// Panel currently holding focus, if any.
    pub fn focused(&self) -> Option<PanelId> {
        lock(&self.scene).focused().cloned()
    }

    /// True while any open panel locks the background against scrolling.
    pub fn scroll_locked(&self) -> bool {
        lock(&self.scene).scroll_locked()
    }

    pub fn layer_count(&self) -> usize {
        lock(&self.scene).len()
    }

    /// Draw backdrops, panels and the tab tray over whatever the frame
    /// already holds.
    pub fn render(&self, frame: &mut UiFrame<'_>) {
        let snapshot = lock(&self.scene).snapshot();
        for layer in &snapshot.layers {
            if layer.backdrop {
                frame.overlay(snapshot.area, theme::backdrop());
            }
            if let Some(panel) = &layer.panel {
                render::draw_layer(frame, snapshot.area, panel, layer.shown, layer.focused);
            }
        }
        tray::draw_tray(frame, snapshot.area, &snapshot.tray);
    }
}

impl std::fmt::Debug for TerminalHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scene = lock(&self.scene);
        f.debug_struct("TerminalHost")
            .field("area", &scene.area)
            .field("layers", &scene.len())
            .finish()
    }
}

impl SurfaceHost for TerminalHost {
    fn create_surface(
        &self,
        id: &PanelId,
        config: &ResolvedConfig,
        z_index: i32,
    ) -> PanelResult<Box<dyn RenderingSurface>> {
        let mut scene = lock(&self.scene);
        if scene.layer_mut(id).is_some() {
            return Err(PanelError::surface(format!("layer `{}` already exists", id)));
        }
        scene.insert(Layer::new(
            id.clone(),
            z_index,
            config.position,
            config.size,
            config.has_backdrop,
        ));
        Ok(Box::new(TerminalSurface {
            id: id.clone(),
            scene: self.scene.clone(),
        }))
    }

    fn create_focus_trap(&self, id: &PanelId) -> Box<dyn FocusTrap> {
        Box::new(TerminalFocus {
            id: id.clone(),
            scene: self.scene.clone(),
            active: false,
        })
    }

    fn hit_test(&self, column: u16, row: u16) -> HitTarget {
        let snapshot = lock(&self.scene).snapshot();
        let point = Position::new(column, row);

        for (id, rect) in tray::tab_rects(snapshot.area, &snapshot.tray) {
            if rect.contains(point) {
                return HitTarget::Tab(id);
            }
        }

        for layer in snapshot.layers.iter().rev() {
            if let Some(target) = layer
                .panel
                .as_ref()
                .and_then(|panel| hit_panel(snapshot.area, panel, layer.shown, point))
            {
                return target;
            }
            if layer.backdrop {
                return HitTarget::Backdrop(layer.id.clone());
            }
        }
        HitTarget::Nothing
    }

    fn tray_presenter(&self) -> Option<Arc<dyn TrayPresenter>> {
        Some(Arc::new(TerminalTray::new(self.scene.clone())))
    }
}

fn hit_panel(area: Rect, panel: &MountedPanel, shown: f32, point: Position) -> Option<HitTarget> {
    let chrome = panel.chrome()?;
    let placement = render::placement(area, chrome.position, chrome.size, shown)?;
    if !placement.screen.contains(point) {
        return None;
    }
    let layout = render::layout(placement.full, &chrome);
    let hits = |local: Option<Rect>| {
        local
            .and_then(|r| placement.to_screen(r))
            .is_some_and(|r| r.contains(point))
    };
    let id = panel.id.clone();
    if hits(layout.close) {
        return Some(HitTarget::CloseButton(id));
    }
    if hits(layout.minimize) {
        return Some(HitTarget::MinimizeButton(id));
    }
    for (index, button) in layout.buttons.iter().enumerate() {
        if hits(Some(*button)) {
            return Some(HitTarget::FooterAction(id, index));
        }
    }
    Some(HitTarget::Body(id))
}

/// One panel's layer in the shared scene.
pub struct TerminalSurface {
    id: PanelId,
    scene: Arc<Mutex<Scene>>,
}

impl TerminalSurface {
    fn with_layer(&self, f: impl FnOnce(&mut Layer)) {
        if let Some(layer) = lock(&self.scene).layer_mut(&self.id) {
            f(layer);
        }
    }
}

impl RenderingSurface for TerminalSurface {
    fn mount(&mut self, panel: MountedPanel) -> PanelResult<()> {
        let mut scene = lock(&self.scene);
        let layer = scene
            .layer_mut(&self.id)
            .ok_or_else(|| PanelError::surface(format!("layer `{}` was disposed", self.id)))?;
        layer.mounted = Some(panel);
        Ok(())
    }

    fn begin_transition(&mut self, transition: Transition, done: TransitionDone) {
        let replaced = lock(&self.scene).begin_slide(
            &self.id,
            transition.phase,
            transition.duration,
            done,
            Instant::now(),
        );
        complete_all(replaced);
    }

    fn set_backdrop_interactive(&mut self, interactive: bool) {
        self.with_layer(|layer| layer.backdrop_interactive = interactive);
    }

    fn set_panel_visible(&mut self, visible: bool) {
        self.with_layer(|layer| layer.panel_visible = visible);
    }

    fn set_scroll_locked(&mut self, locked: bool) {
        lock(&self.scene).set_scroll_lock(&self.id, locked);
    }

    fn dispose(&mut self) {
        let pending = lock(&self.scene).remove(&self.id);
        tracing::trace!(panel_id = %self.id, "terminal layer disposed");
        complete_all(pending);
    }
}

pub struct TerminalFocus {
    id: PanelId,
    scene: Arc<Mutex<Scene>>,
    active: bool,
}

impl FocusTrap for TerminalFocus {
    fn activate(&mut self, auto_focus: bool) {
        lock(&self.scene).focus(&self.id, auto_focus);
        self.active = true;
    }

    fn deactivate(&mut self, restore: bool) {
        lock(&self.scene).release_focus(&self.id, restore);
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
