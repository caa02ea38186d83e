//! Shared visual state behind every terminal surface, focus trap and the tray.
//!
//! The scene holds plain data only. Anything that reaches into a panel
//! (chrome, content) is read from a [`SceneSnapshot`] after the scene lock is
//! released.

use std::collections::HashSet;
use std::time::Duration;

use ratatui::layout::Rect;
use tokio::time::Instant;

use crate::config::{PanelPosition, PanelSize};
use crate::handle::PanelId;
use crate::surface::{MountedPanel, TransitionDone, TransitionPhase};

#[derive(Debug)]
struct Slide {
    from: f32,
    to: f32,
    started: Instant,
    duration: Duration,
    phase: TransitionPhase,
    done: Option<TransitionDone>,
}

impl Slide {
    fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    fn value_at(&self, now: Instant) -> f32 {
        let t = self.progress(now);
        // Ease out: fast start, gentle landing.
        let eased = 1.0 - (1.0 - t) * (1.0 - t);
        self.from + (self.to - self.from) * eased
    }
}

#[derive(Debug)]
pub(crate) struct Layer {
    pub id: PanelId,
    pub z: i32,
    pub position: PanelPosition,
    pub size: PanelSize,
    pub has_backdrop: bool,
    pub backdrop_interactive: bool,
    pub panel_visible: bool,
    pub mounted: Option<MountedPanel>,
    /// How far the panel is slid in, 0.0 to 1.0.
    pub shown: f32,
    slide: Option<Slide>,
}

impl Layer {
    pub fn new(id: PanelId, z: i32, position: PanelPosition, size: PanelSize, has_backdrop: bool) -> Self {
        Self {
            id,
            z,
            position,
            size,
            has_backdrop,
            backdrop_interactive: false,
            panel_visible: true,
            mounted: None,
            shown: 0.0,
            slide: None,
        }
    }

    pub fn is_animating(&self) -> bool {
        self.slide.is_some()
    }

    fn draws_panel(&self) -> bool {
        self.panel_visible && self.mounted.is_some() && self.shown > 0.0
    }

    fn draws_backdrop(&self) -> bool {
        self.has_backdrop && self.backdrop_interactive
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TabView {
    pub id: PanelId,
    pub label: String,
    pub position: PanelPosition,
    pub standalone: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TrayView {
    pub present: bool,
    pub tabs: Vec<TabView>,
}

/// One layer as the renderer needs it.
#[derive(Debug, Clone)]
pub(crate) struct LayerSnapshot {
    pub id: PanelId,
    pub backdrop: bool,
    pub panel: Option<MountedPanel>,
    pub shown: f32,
    pub focused: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct SceneSnapshot {
    pub area: Rect,
    /// Bottom layer first.
    pub layers: Vec<LayerSnapshot>,
    pub tray: TrayView,
}

#[derive(Debug)]
pub(crate) struct Scene {
    pub area: Rect,
    layers: Vec<Layer>,
    focus_stack: Vec<PanelId>,
    focus_released: bool,
    scroll_locks: HashSet<PanelId>,
    pub tray: TrayView,
}

impl Scene {
    pub fn new(area: Rect) -> Self {
        Self {
            area,
            layers: Vec::new(),
            focus_stack: Vec::new(),
            focus_released: false,
            scroll_locks: HashSet::new(),
            tray: TrayView::default(),
        }
    }

    /// Insert keeping layers sorted by z; equal z stacks in insertion order.
    pub fn insert(&mut self, layer: Layer) {
        let at = self.layers.partition_point(|l| l.z <= layer.z);
        self.layers.insert(at, layer);
    }

    /// Drop the layer and any focus or scroll claims it held. Returns the
    /// pending transition token, if any, so the caller can complete it once
    /// the scene lock is released.
    pub fn remove(&mut self, id: &PanelId) -> Option<TransitionDone> {
        self.scroll_locks.remove(id);
        self.focus_stack.retain(|f| f != id);
        let index = self.layers.iter().position(|l| &l.id == id)?;
        let layer = self.layers.remove(index);
        layer.slide.and_then(|slide| slide.done)
    }

    pub fn layer_mut(&mut self, id: &PanelId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| &l.id == id)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Start sliding toward the phase's target. A slide already in flight is
    /// replaced; its token is returned for completion.
    pub fn begin_slide(
        &mut self,
        id: &PanelId,
        phase: TransitionPhase,
        duration: Duration,
        done: TransitionDone,
        now: Instant,
    ) -> Option<TransitionDone> {
        let Some(layer) = self.layer_mut(id) else {
            // Nothing to animate; acknowledge straight away.
            return Some(done);
        };
        let to = match phase {
            TransitionPhase::Enter | TransitionPhase::Restore => 1.0,
            TransitionPhase::Exit | TransitionPhase::Minimize => 0.0,
        };
        let replaced = layer.slide.take().and_then(|slide| slide.done);
        layer.slide = Some(Slide {
            from: layer.shown,
            to,
            started: now,
            duration,
            phase,
            done: Some(done),
        });
        replaced
    }

    /// Advance every slide to `now`. Returns the tokens of slides that
    /// finished.
    pub fn tick(&mut self, now: Instant) -> Vec<TransitionDone> {
        let mut finished = Vec::new();
        for layer in &mut self.layers {
            let Some(slide) = layer.slide.as_mut() else {
                continue;
            };
            layer.shown = slide.value_at(now);
            if slide.progress(now) < 1.0 {
                continue;
            }
            layer.shown = slide.to;
            if slide.phase == TransitionPhase::Minimize {
                layer.panel_visible = false;
            }
            if let Some(done) = slide.done.take() {
                finished.push(done);
            }
            layer.slide = None;
        }
        finished
    }

    pub fn is_animating(&self) -> bool {
        self.layers.iter().any(Layer::is_animating)
    }

    pub fn focus(&mut self, id: &PanelId, take_focus: bool) {
        if !take_focus {
            return;
        }
        self.focus_stack.retain(|f| f != id);
        self.focus_stack.push(id.clone());
        self.focus_released = false;
    }

    pub fn release_focus(&mut self, id: &PanelId, restore: bool) {
        let had_focus = self.focused() == Some(id);
        self.focus_stack.retain(|f| f != id);
        if had_focus && !restore {
            self.focus_released = true;
        }
    }

    pub fn focused(&self) -> Option<&PanelId> {
        if self.focus_released {
            None
        } else {
            self.focus_stack.last()
        }
    }

    pub fn set_scroll_lock(&mut self, id: &PanelId, locked: bool) {
        if locked {
            self.scroll_locks.insert(id.clone());
        } else {
            self.scroll_locks.remove(id);
        }
    }

    pub fn scroll_locked(&self) -> bool {
        !self.scroll_locks.is_empty()
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        let focused = self.focused();
        SceneSnapshot {
            area: self.area,
            layers: self
                .layers
                .iter()
                .filter(|l| l.draws_panel() || l.draws_backdrop())
                .map(|l| LayerSnapshot {
                    id: l.id.clone(),
                    backdrop: l.draws_backdrop(),
                    panel: if l.draws_panel() { l.mounted.clone() } else { None },
                    shown: l.shown,
                    focused: focused == Some(&l.id),
                })
                .collect(),
            tray: self.tray.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::WeakPanelHandle;

    fn layer(id: &str, z: i32) -> Layer {
        Layer::new(PanelId::from(id), z, PanelPosition::Right, PanelSize::Md, true)
    }

    fn token(phase: TransitionPhase) -> TransitionDone {
        TransitionDone::new(WeakPanelHandle::new(), phase)
    }

    #[test]
    fn layers_stay_sorted_by_z() {
        let mut scene = Scene::new(Rect::new(0, 0, 80, 24));
        scene.insert(layer("b", 1002));
        scene.insert(layer("a", 1001));
        scene.insert(layer("c", 1003));
        let order: Vec<i32> = scene.layers.iter().map(|l| l.z).collect();
        assert_eq!(order, [1001, 1002, 1003]);
    }

    #[test]
    fn slides_finish_and_hand_back_tokens() {
        let mut scene = Scene::new(Rect::new(0, 0, 80, 24));
        let id = PanelId::from("p");
        scene.insert(layer("p", 1));
        let start = Instant::now();
        let duration = Duration::from_millis(200);
        assert!(
            scene
                .begin_slide(&id, TransitionPhase::Enter, duration, token(TransitionPhase::Enter), start)
                .is_none()
        );
        assert!(scene.tick(start + Duration::from_millis(100)).is_empty());
        let halfway = scene.layer_mut(&id).map(|l| l.shown).unwrap_or_default();
        assert!(halfway > 0.5 && halfway < 1.0, "eased value {halfway}");

        let done = scene.tick(start + duration);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].phase(), TransitionPhase::Enter);
        assert!(!scene.is_animating());
    }

    #[test]
    fn minimize_hides_panel_when_finished() {
        let mut scene = Scene::new(Rect::new(0, 0, 80, 24));
        let id = PanelId::from("p");
        scene.insert(layer("p", 1));
        let now = Instant::now();
        scene.begin_slide(&id, TransitionPhase::Minimize, Duration::ZERO, token(TransitionPhase::Minimize), now);
        assert_eq!(scene.tick(now).len(), 1);
        let layer = scene.layer_mut(&id).expect("layer");
        assert!(!layer.panel_visible);
        assert_eq!(layer.shown, 0.0);
    }

    #[test]
    fn replacing_a_slide_returns_the_old_token() {
        let mut scene = Scene::new(Rect::new(0, 0, 80, 24));
        let id = PanelId::from("p");
        scene.insert(layer("p", 1));
        let now = Instant::now();
        let secs = Duration::from_secs(1);
        scene.begin_slide(&id, TransitionPhase::Enter, secs, token(TransitionPhase::Enter), now);
        let old = scene
            .begin_slide(&id, TransitionPhase::Exit, secs, token(TransitionPhase::Exit), now)
            .expect("replaced token");
        assert_eq!(old.phase(), TransitionPhase::Enter);
        let unknown = scene.begin_slide(
            &PanelId::from("missing"),
            TransitionPhase::Exit,
            secs,
            token(TransitionPhase::Exit),
            now,
        );
        assert!(unknown.is_some());
    }

    #[test]
    fn focus_returns_to_previous_panel_unless_released() {
        let mut scene = Scene::new(Rect::new(0, 0, 80, 24));
        let a = PanelId::from("a");
        let b = PanelId::from("b");
        scene.focus(&a, true);
        scene.focus(&b, true);
        assert_eq!(scene.focused(), Some(&b));
        scene.release_focus(&b, true);
        assert_eq!(scene.focused(), Some(&a));
        scene.release_focus(&a, false);
        assert_eq!(scene.focused(), None);
        scene.focus(&b, false);
        assert_eq!(scene.focused(), None);
    }

    #[test]
    fn scroll_lock_is_held_while_any_panel_claims_it() {
        let mut scene = Scene::new(Rect::new(0, 0, 80, 24));
        let a = PanelId::from("a");
        let b = PanelId::from("b");
        scene.set_scroll_lock(&a, true);
        scene.set_scroll_lock(&b, true);
        scene.set_scroll_lock(&a, false);
        assert!(scene.scroll_locked());
        scene.remove(&b);
        assert!(!scene.scroll_locked());
    }
}
