//! Contracts between the orchestration core and whatever draws panels.
//!
//! A [`SurfaceHost`] creates one [`RenderingSurface`] and one [`FocusTrap`]
//! per panel. Surfaces report the end of visual transitions by completing the
//! [`TransitionDone`] token they are handed; the core never assumes how long
//! a transition takes beyond its fallback deadline.

use std::sync::{Arc, Weak};
use std::time::Duration;

use crossterm::event::KeyEvent;

use crate::config::{PanelPosition, PanelSize, ResolvedConfig};
use crate::container::{InputOutcome, PanelContainer};
use crate::content::{PanelView, SharedContent};
use crate::error::PanelResult;
use crate::footer::FooterAction;
use crate::handle::{PanelId, WeakPanelHandle};
use crate::state::PanelState;
use crate::tabs::TrayPresenter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionPhase {
    /// Slide in after mount.
    Enter,
    /// Slide out before teardown.
    Exit,
    /// Slide out, keep mounted.
    Minimize,
    /// Slide back in after a minimize.
    Restore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub phase: TransitionPhase,
    pub position: PanelPosition,
    pub duration: Duration,
}

/// Completion token for one transition. Completing it is optional: the core
/// falls back to the configured animation duration when it never arrives.
#[derive(Debug)]
pub struct TransitionDone {
    panel: WeakPanelHandle,
    phase: TransitionPhase,
}

impl TransitionDone {
    pub(crate) fn new(panel: WeakPanelHandle, phase: TransitionPhase) -> Self {
        Self { panel, phase }
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn complete(self) {
        if let Some(handle) = self.panel.upgrade() {
            handle.transition_finished(self.phase);
        }
    }
}

/// Footer region after precedence has been applied.
#[derive(Debug, Clone, Default)]
pub enum FooterContent {
    #[default]
    None,
    View(PanelView),
    Actions(Vec<FooterAction>),
}

/// Everything a surface needs to draw the frame around hosted content.
#[derive(Debug, Clone)]
pub struct Chrome {
    pub title: String,
    pub state: PanelState,
    pub position: PanelPosition,
    pub size: PanelSize,
    pub show_header: bool,
    pub show_close_button: bool,
    pub minimizable: bool,
    pub header: Option<PanelView>,
    pub footer: FooterContent,
}

/// What a surface gets to show once content exists. Holds the container
/// weakly; once the panel is torn down every accessor turns inert.
#[derive(Clone)]
pub struct MountedPanel {
    pub id: PanelId,
    pub content: SharedContent,
    container: Weak<PanelContainer>,
}

impl MountedPanel {
    pub(crate) fn new(id: PanelId, content: SharedContent, container: &Arc<PanelContainer>) -> Self {
        Self {
            id,
            content,
            container: Arc::downgrade(container),
        }
    }

    pub fn chrome(&self) -> Option<Chrome> {
        self.container.upgrade().and_then(|c| c.chrome())
    }

    pub fn key(&self, key: &KeyEvent) -> InputOutcome {
        self.container
            .upgrade()
            .map(|c| c.handle_key(key))
            .unwrap_or(InputOutcome::Ignored)
    }
}

impl std::fmt::Debug for MountedPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountedPanel").field("id", &self.id).finish()
    }
}

/// One panel's presence in the visual tree: backdrop plus panel body.
pub trait RenderingSurface: Send {
    fn mount(&mut self, panel: MountedPanel) -> PanelResult<()>;
    fn begin_transition(&mut self, transition: Transition, done: TransitionDone);
    /// A non-interactive backdrop is hidden and lets clicks fall through.
    fn set_backdrop_interactive(&mut self, interactive: bool);
    fn set_panel_visible(&mut self, visible: bool);
    fn set_scroll_locked(&mut self, locked: bool);
    /// Remove everything from the visual tree. Called exactly once.
    fn dispose(&mut self);
}

/// Focus containment for one panel.
pub trait FocusTrap: Send {
    /// Confine focus to the panel; `auto_focus` moves focus into it.
    fn activate(&mut self, auto_focus: bool);
    /// Release focus, optionally handing it back to whatever had it before.
    fn deactivate(&mut self, restore: bool);
    fn is_active(&self) -> bool;
}

/// Where a pointer position landed, topmost layer first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitTarget {
    Nothing,
    Backdrop(PanelId),
    CloseButton(PanelId),
    MinimizeButton(PanelId),
    FooterAction(PanelId, usize),
    Body(PanelId),
    Tab(PanelId),
}

pub trait SurfaceHost: Send + Sync {
    fn create_surface(
        &self,
        id: &PanelId,
        config: &ResolvedConfig,
        z_index: i32,
    ) -> PanelResult<Box<dyn RenderingSurface>>;

    fn create_focus_trap(&self, id: &PanelId) -> Box<dyn FocusTrap>;

    fn hit_test(&self, _column: u16, _row: u16) -> HitTarget {
        HitTarget::Nothing
    }

    /// Visual tray for minimized tabs, when the host draws one.
    fn tray_presenter(&self) -> Option<Arc<dyn TrayPresenter>> {
        None
    }
}
