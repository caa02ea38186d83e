//! Presentation adapter between a [`PanelHandle`] and its rendering surface.
//!
//! The container owns the surface, the focus trap and the hosted content of
//! one panel. It reacts to every state transition of its handle, intercepts
//! the input that can close a panel, and resolves which footer to show. It
//! only holds a weak reference to the handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use crate::config::ResolvedConfig;
use crate::content::{PanelContent, SharedContent};
use crate::error::PanelResult;
use crate::events::{BackdropClick, StateChange};
use crate::footer::FooterActionRegistry;
use crate::handle::{LifecycleObserver, PanelHandle, PanelId, WeakPanelHandle};
use crate::state::PanelState;
use crate::surface::{
    Chrome, FocusTrap, FooterContent, MountedPanel, RenderingSurface, Transition,
    TransitionDone, TransitionPhase,
};

/// What the container did with a piece of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Ignored,
    Consumed,
    /// A close was started in the background.
    CloseRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FooterSource {
    Template,
    CallerButtons,
    CustomView,
    Registry,
    Empty,
}

pub struct PanelContainer {
    id: PanelId,
    panel: WeakPanelHandle,
    config: Arc<ResolvedConfig>,
    footer: FooterActionRegistry,
    surface: Mutex<Option<Box<dyn RenderingSurface>>>,
    focus: Mutex<Option<Box<dyn FocusTrap>>>,
    content: Mutex<Option<SharedContent>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PanelContainer {
    pub(crate) fn new(
        handle: &PanelHandle,
        surface: Box<dyn RenderingSurface>,
        focus: Box<dyn FocusTrap>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: handle.id().clone(),
            panel: handle.downgrade(),
            config: handle.shared_config(),
            footer: handle.footer().clone(),
            surface: Mutex::new(Some(surface)),
            focus: Mutex::new(Some(focus)),
            content: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &PanelId {
        &self.id
    }

    fn with_surface(&self, f: impl FnOnce(&mut dyn RenderingSurface)) {
        if let Some(surface) = locked(&self.surface).as_mut() {
            f(surface.as_mut());
        }
    }

    fn with_focus(&self, f: impl FnOnce(&mut dyn FocusTrap)) {
        if let Some(focus) = locked(&self.focus).as_mut() {
            f(focus.as_mut());
        }
    }

    fn transition(&self, phase: TransitionPhase) {
        let transition = Transition {
            phase,
            position: self.config.position,
            duration: self.config.animation_duration,
        };
        let done = TransitionDone::new(self.panel.clone(), phase);
        self.with_surface(|surface| surface.begin_transition(transition, done));
    }

    /// Hand freshly created content to the surface.
    pub(crate) fn mount(self: &Arc<Self>, content: Box<dyn PanelContent>) -> PanelResult<()> {
        let shared: SharedContent = Arc::new(Mutex::new(content));
        *locked(&self.content) = Some(shared.clone());
        let mounted = MountedPanel::new(self.id.clone(), shared, self);
        let mut surface = locked(&self.surface);
        match surface.as_mut() {
            Some(surface) => surface.mount(mounted),
            None => Ok(()),
        }
    }

    /// Entry reactions for the initial `opening` state.
    pub(crate) fn enter(&self) {
        self.with_focus(|focus| focus.activate(self.config.auto_focus));
        self.with_surface(|surface| {
            surface.set_scroll_locked(true);
            surface.set_backdrop_interactive(self.config.has_backdrop);
        });
        self.transition(TransitionPhase::Enter);
    }

    fn release_focus(&self) {
        self.with_focus(|focus| {
            if focus.is_active() {
                focus.deactivate(self.config.restore_focus);
            }
        });
    }

    fn on_minimized(&self) {
        self.with_surface(|surface| {
            surface.set_backdrop_interactive(false);
            surface.set_scroll_locked(false);
        });
        self.release_focus();
        self.transition(TransitionPhase::Minimize);
    }

    fn on_restored(&self) {
        self.with_surface(|surface| {
            surface.set_panel_visible(true);
            surface.set_backdrop_interactive(self.config.has_backdrop);
            surface.set_scroll_locked(true);
        });
        self.with_focus(|focus| focus.activate(self.config.auto_focus));
        self.transition(TransitionPhase::Restore);
    }

    fn on_closing(&self) {
        self.release_focus();
        self.with_surface(|surface| {
            surface.set_scroll_locked(false);
            surface.set_backdrop_interactive(false);
        });
        self.transition(TransitionPhase::Exit);
    }

    fn resolve_footer(&self, handle: &PanelHandle) -> (FooterSource, FooterContent) {
        if let Some(view) = handle.footer_template() {
            return (FooterSource::Template, FooterContent::View(view));
        }
        if !self.config.footer_buttons.is_empty() {
            return (
                FooterSource::CallerButtons,
                FooterContent::Actions(self.config.footer_buttons.clone()),
            );
        }
        if let Some(view) = self.footer.custom_footer() {
            return (FooterSource::CustomView, FooterContent::View(view));
        }
        let actions = self.footer.actions();
        if !actions.is_empty() {
            return (FooterSource::Registry, FooterContent::Actions(actions));
        }
        (FooterSource::Empty, FooterContent::None)
    }

    /// Footer to draw: footer template, then caller buttons, then a custom
    /// footer view registered by content, then registered actions.
    pub fn footer_content(&self) -> FooterContent {
        match self.panel.upgrade() {
            Some(handle) => self.resolve_footer(&handle).1,
            None => FooterContent::None,
        }
    }

    /// Snapshot of everything drawn around the content. `None` once the
    /// panel is gone.
    pub fn chrome(&self) -> Option<Chrome> {
        let handle = self.panel.upgrade()?;
        let (_, footer) = self.resolve_footer(&handle);
        Some(Chrome {
            title: handle.title(),
            state: handle.state(),
            position: self.config.position,
            size: self.config.size,
            show_header: self.config.show_header,
            show_close_button: self.config.show_close_button,
            minimizable: self.config.minimizable,
            header: handle.header_template(),
            footer,
        })
    }

    fn visible_handle(&self) -> Option<PanelHandle> {
        self.panel
            .upgrade()
            .filter(|handle| handle.state().is_visible())
    }

    pub fn handle_key(&self, key: &KeyEvent) -> InputOutcome {
        let Some(handle) = self.visible_handle() else {
            return InputOutcome::Ignored;
        };
        handle.events().key_pressed.emit(*key);
        if key.code == KeyCode::Esc
            && key.kind != KeyEventKind::Release
            && self.config.close_on_escape
        {
            spawn_close(handle);
            return InputOutcome::CloseRequested;
        }
        let content = locked(&self.content).clone();
        let consumed = content
            .map(|content| locked(&content).handle_key(key))
            .unwrap_or(false);
        if consumed {
            InputOutcome::Consumed
        } else {
            InputOutcome::Ignored
        }
    }

    pub fn backdrop_click(&self, column: u16, row: u16) -> InputOutcome {
        if !self.config.has_backdrop {
            return InputOutcome::Ignored;
        }
        let Some(handle) = self.visible_handle() else {
            return InputOutcome::Ignored;
        };
        handle
            .events()
            .backdrop_clicked
            .emit(BackdropClick { column, row });
        if self.config.close_on_backdrop_click {
            spawn_close(handle);
            InputOutcome::CloseRequested
        } else {
            InputOutcome::Consumed
        }
    }

    pub fn close_button(&self) -> InputOutcome {
        match self.visible_handle() {
            Some(handle) => {
                spawn_close(handle);
                InputOutcome::CloseRequested
            }
            None => InputOutcome::Ignored,
        }
    }

    pub fn minimize_button(&self) -> InputOutcome {
        match self.visible_handle() {
            Some(handle) if handle.minimize() => InputOutcome::Consumed,
            _ => InputOutcome::Ignored,
        }
    }

    /// Run the handler of the footer button at `index` in the background.
    pub fn invoke_footer(&self, index: usize) -> InputOutcome {
        let Some(handle) = self.visible_handle() else {
            return InputOutcome::Ignored;
        };
        match self.resolve_footer(&handle) {
            (FooterSource::Registry, _) => {
                let footer = self.footer.clone();
                spawn(async move {
                    footer.invoke(index).await;
                });
                InputOutcome::Consumed
            }
            (FooterSource::CallerButtons, FooterContent::Actions(actions)) => {
                match actions.get(index).filter(|a| a.is_actionable()) {
                    Some(action) => {
                        if let Some(handler) = action.handler.clone() {
                            spawn(async move { handler.run().await });
                        }
                        InputOutcome::Consumed
                    }
                    None => InputOutcome::Ignored,
                }
            }
            _ => InputOutcome::Ignored,
        }
    }

    fn teardown(&self) {
        if let Some(mut surface) = locked(&self.surface).take() {
            surface.dispose();
        }
        if let Some(mut focus) = locked(&self.focus).take()
            && focus.is_active()
        {
            focus.deactivate(self.config.restore_focus);
        }
        if let Some(content) = locked(&self.content).take() {
            locked(&content).destroy();
        }
        tracing::debug!(panel_id = %self.id, "panel container torn down");
    }
}

impl LifecycleObserver for PanelContainer {
    fn on_transition(&self, _panel: &PanelHandle, change: StateChange) {
        match (change.from, change.to) {
            (_, PanelState::Minimized) => self.on_minimized(),
            (PanelState::Minimized, PanelState::Open) => self.on_restored(),
            (_, PanelState::Closing) => self.on_closing(),
            _ => {}
        }
    }

    fn on_teardown(&self, _panel: &PanelHandle) {
        self.teardown();
    }
}

fn spawn<F>(future: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(future);
        }
        Err(_) => tracing::warn!("no async runtime available; panel input dropped"),
    }
}

fn spawn_close(handle: PanelHandle) {
    tracing::debug!(panel_id = %handle.id(), "close requested from input");
    spawn(async move {
        handle.close(None).await;
    });
}
