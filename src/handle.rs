//! The caller-held control object of one panel.
//!
//! A [`PanelHandle`] owns the panel's state machine, its state history and
//! its event streams. Everything that has to react to a transition (the
//! container, the orchestrator's stack) registers a [`LifecycleObserver`]
//! that is called synchronously inside the transition, before the public
//! `state_changed` event goes out.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use tokio::sync::{Notify, broadcast, watch};
use uuid::Uuid;

use crate::config::ResolvedConfig;
use crate::constants::UNTITLED_PANEL;
use crate::content::PanelView;
use crate::events::{BackdropClick, PanelClosed, PanelEvents, StateChange};
use crate::footer::FooterActionRegistry;
use crate::state::PanelState;
use crate::surface::TransitionPhase;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(String);

impl PanelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(format!("panel-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PanelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PanelId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PanelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// How a call to [`PanelHandle::close`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    /// The `prevent_close` hook vetoed; state is unchanged.
    Prevented,
    /// Another close (or a forced teardown) got there first.
    AlreadyClosed,
}

/// Synchronous hook into a handle's lifecycle.
pub(crate) trait LifecycleObserver: Send + Sync {
    fn on_transition(&self, panel: &PanelHandle, change: StateChange);

    /// Dispose resources. Runs once, after the exit wait and before `closed`.
    fn on_teardown(&self, _panel: &PanelHandle) {}
}

struct Lifecycle {
    state: PanelState,
    history: Vec<PanelState>,
    // set on the first entry into `Open`, whichever state it came from
    has_opened: bool,
    title: String,
    header_template: Option<PanelView>,
    footer_template: Option<PanelView>,
}

struct HandleInner {
    id: PanelId,
    config: Arc<ResolvedConfig>,
    footer: FooterActionRegistry,
    events: PanelEvents,
    lifecycle: Mutex<Lifecycle>,
    observers: Mutex<Vec<Arc<dyn LifecycleObserver>>>,
    // serializes close() callers so only one ever runs the teardown
    close_gate: tokio::sync::Mutex<()>,
    enter_ack: Notify,
    exit_ack: Notify,
    torn_down: AtomicBool,
    closed: watch::Sender<Option<Option<Value>>>,
}

#[derive(Clone)]
pub struct PanelHandle {
    inner: Arc<HandleInner>,
}

/// Non-owning reference to a panel, handed to content and containers.
#[derive(Clone, Default)]
pub struct WeakPanelHandle {
    inner: Weak<HandleInner>,
}

impl WeakPanelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upgrade(&self) -> Option<PanelHandle> {
        self.inner.upgrade().map(|inner| PanelHandle { inner })
    }
}

impl fmt::Debug for WeakPanelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(handle) => write!(f, "WeakPanelHandle({})", handle.id()),
            None => f.write_str("WeakPanelHandle(<dropped>)"),
        }
    }
}

impl PanelHandle {
    pub(crate) fn new(id: PanelId, config: Arc<ResolvedConfig>, footer: FooterActionRegistry) -> Self {
        let title = config
            .title
            .clone()
            .unwrap_or_else(|| UNTITLED_PANEL.to_string());
        let (closed, _) = watch::channel(None);
        Self {
            inner: Arc::new(HandleInner {
                id,
                lifecycle: Mutex::new(Lifecycle {
                    state: PanelState::Opening,
                    history: vec![PanelState::Opening],
                    has_opened: false,
                    title,
                    header_template: config.header_template.clone(),
                    footer_template: config.footer_template.clone(),
                }),
                config,
                footer,
                events: PanelEvents::new(),
                observers: Mutex::new(Vec::new()),
                close_gate: tokio::sync::Mutex::new(()),
                enter_ack: Notify::new(),
                exit_ack: Notify::new(),
                torn_down: AtomicBool::new(false),
                closed,
            }),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn observers(&self) -> Vec<Arc<dyn LifecycleObserver>> {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn add_observer(&self, observer: Arc<dyn LifecycleObserver>) {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub fn downgrade(&self) -> WeakPanelHandle {
        WeakPanelHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn id(&self) -> &PanelId {
        &self.inner.id
    }

    pub fn state(&self) -> PanelState {
        self.lifecycle().state
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.inner.config
    }

    pub(crate) fn shared_config(&self) -> Arc<ResolvedConfig> {
        self.inner.config.clone()
    }

    pub fn title(&self) -> String {
        self.lifecycle().title.clone()
    }

    pub fn header_template(&self) -> Option<PanelView> {
        self.lifecycle().header_template.clone()
    }

    pub fn footer_template(&self) -> Option<PanelView> {
        self.lifecycle().footer_template.clone()
    }

    pub fn footer(&self) -> &FooterActionRegistry {
        &self.inner.footer
    }

    pub fn is_minimized(&self) -> bool {
        self.state() == PanelState::Minimized
    }

    pub fn is_closed(&self) -> bool {
        self.state() == PanelState::Closed
    }

    /// Every state visited so far, starting with `opening`.
    pub fn state_history(&self) -> Vec<PanelState> {
        self.lifecycle().history.clone()
    }

    pub fn can_transition_to(&self, to: PanelState) -> bool {
        self.state().can_transition_to(to)
    }

    pub fn events(&self) -> &PanelEvents {
        &self.inner.events
    }

    pub fn on_opened(&self) -> broadcast::Receiver<()> {
        self.inner.events.opened.subscribe()
    }

    pub fn on_closed(&self) -> broadcast::Receiver<PanelClosed> {
        self.inner.events.closed.subscribe()
    }

    pub fn on_backdrop_click(&self) -> broadcast::Receiver<BackdropClick> {
        self.inner.events.backdrop_clicked.subscribe()
    }

    pub fn on_key(&self) -> broadcast::Receiver<crossterm::event::KeyEvent> {
        self.inner.events.key_pressed.subscribe()
    }

    pub fn on_close_prevented(&self) -> broadcast::Receiver<()> {
        self.inner.events.close_prevented.subscribe()
    }

    pub fn on_state_change(&self) -> broadcast::Receiver<StateChange> {
        self.inner.events.state_changed.subscribe()
    }

    /// Resolves with the close result once the panel is closed. Returns
    /// immediately for a panel that already is.
    pub async fn wait_closed(&self) -> Option<Value> {
        let mut rx = self.inner.closed.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(closed) => (*closed).clone().flatten(),
            Err(_) => None,
        }
    }

    pub fn update_title(&self, title: impl Into<String>) {
        self.lifecycle().title = title.into();
    }

    pub fn update_header_template(&self, view: Option<PanelView>) {
        self.lifecycle().header_template = view;
    }

    pub fn update_footer_template(&self, view: Option<PanelView>) {
        self.lifecycle().footer_template = view;
    }

    /// Move to `to` if the state machine allows it. A disallowed transition
    /// is logged and ignored.
    pub(crate) fn transition(&self, to: PanelState) -> bool {
        let (change, first_open) = {
            let mut lifecycle = self.lifecycle();
            let from = lifecycle.state;
            if !from.can_transition_to(to) {
                tracing::warn!(panel_id = %self.id(), %from, %to, "rejected panel state transition");
                return false;
            }
            lifecycle.state = to;
            lifecycle.history.push(to);
            let first_open = to == PanelState::Open && !lifecycle.has_opened;
            if first_open {
                lifecycle.has_opened = true;
            }
            (StateChange { from, to }, first_open)
        };
        tracing::debug!(panel_id = %self.id(), from = %change.from, to = %change.to, "panel state changed");

        for observer in self.observers() {
            observer.on_transition(self, change);
        }
        self.inner.events.state_changed.emit(change);
        if first_open {
            self.inner.events.opened.emit(());
        }
        true
    }

    /// Called by a surface's [`TransitionDone`](crate::surface::TransitionDone).
    pub(crate) fn transition_finished(&self, phase: TransitionPhase) {
        tracing::trace!(panel_id = %self.id(), ?phase, "transition acknowledged");
        match phase {
            TransitionPhase::Enter => self.inner.enter_ack.notify_one(),
            TransitionPhase::Exit => self.inner.exit_ack.notify_one(),
            TransitionPhase::Minimize | TransitionPhase::Restore => {}
        }
    }

    /// Wait for the surface to acknowledge a transition, or for the
    /// configured animation duration, whichever is first.
    async fn wait_for_ack(&self, ack: &Notify) {
        let deadline = self.inner.config.animation_duration;
        tokio::select! {
            _ = ack.notified() => {}
            _ = tokio::time::sleep(deadline) => {
                tracing::trace!(panel_id = %self.id(), ?deadline, "transition deadline elapsed");
            }
        }
    }

    /// Wait out the entry transition, then mark the panel open.
    pub(crate) async fn await_entry(&self) {
        self.wait_for_ack(&self.inner.enter_ack).await;
        self.mark_opened();
    }

    /// `opening -> open`. A no-op in any other state.
    pub fn mark_opened(&self) -> bool {
        self.state() == PanelState::Opening && self.transition(PanelState::Open)
    }

    /// Close the panel, passing `result` to `closed` subscribers.
    ///
    /// Consults `prevent_close` first, then waits for the exit transition
    /// before tearing down. Concurrent calls are serialized; only the first
    /// one performs the teardown.
    pub async fn close(&self, result: Option<Value>) -> CloseOutcome {
        let _gate = self.inner.close_gate.lock().await;
        if !self.state().is_closable() {
            return CloseOutcome::AlreadyClosed;
        }

        if let Some(prevent) = &self.inner.config.prevent_close {
            let allowed = prevent.allows_close().await;
            if !self.state().is_closable() {
                // torn down while the veto was pending
                return CloseOutcome::AlreadyClosed;
            }
            if !allowed {
                tracing::debug!(panel_id = %self.id(), "close prevented");
                self.inner.events.close_prevented.emit(());
                return CloseOutcome::Prevented;
            }
        }

        if !self.transition(PanelState::Closing) {
            return CloseOutcome::AlreadyClosed;
        }
        self.wait_for_ack(&self.inner.exit_ack).await;
        if self.state() != PanelState::Closing {
            // forced teardown finished the job while we waited
            return CloseOutcome::AlreadyClosed;
        }
        self.finish_close(result);
        CloseOutcome::Closed
    }

    /// Teardown without `prevent_close` and without waiting for the exit
    /// transition. Used when construction of the panel fails and on shutdown.
    pub fn force_close(&self) {
        match self.state() {
            PanelState::Closed => return,
            PanelState::Closing => {}
            _ => {
                self.transition(PanelState::Closing);
            }
        }
        tracing::debug!(panel_id = %self.id(), "forcing panel teardown");
        self.finish_close(None);
    }

    fn finish_close(&self, result: Option<Value>) {
        if !self.inner.torn_down.swap(true, Ordering::SeqCst) {
            for observer in self.observers() {
                observer.on_teardown(self);
            }
        }
        if !self.transition(PanelState::Closed) {
            return;
        }
        self.inner.events.closed.emit(PanelClosed {
            id: self.id().clone(),
            result: result.clone(),
        });
        self.inner.closed.send_replace(Some(result));
        self.inner.events.finalize_all();
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn minimize(&self) -> bool {
        if !self.inner.config.minimizable {
            tracing::debug!(panel_id = %self.id(), "panel is not minimizable");
            return false;
        }
        if !matches!(self.state(), PanelState::Opening | PanelState::Open) {
            return false;
        }
        self.transition(PanelState::Minimized)
    }

    pub fn restore(&self) -> bool {
        if self.state() != PanelState::Minimized {
            return false;
        }
        self.transition(PanelState::Open)
    }
}

impl PartialEq for PanelHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for PanelHandle {}

impl fmt::Debug for PanelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelHandle")
            .field("id", self.id())
            .field("state", &self.state())
            .finish()
    }
}
