//! The panel stack.
//!
//! [`PanelOrchestrator`] opens panels, keeps one [`StackEntry`] per live
//! panel, assigns z-indices, enforces the single-panel policy, turns a
//! repeated `open` of minimized content into a restore, and routes input to
//! the topmost panel. Construct one per application and call
//! [`shutdown`](PanelOrchestrator::shutdown) when done.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use crossterm::event::{Event, KeyEventKind, MouseButton, MouseEventKind};
use tokio::sync::broadcast::error::RecvError;

use crate::config::{PanelConfig, PanelDefaults, PanelPosition, resolve};
use crate::constants::BASE_Z_INDEX;
use crate::container::{InputOutcome, PanelContainer};
use crate::content::{ContentDescriptor, ContentHost, ContentKey, PanelContext};
use crate::error::{PanelError, PanelResult};
use crate::events::StateChange;
use crate::footer::FooterActionRegistry;
use crate::handle::{CloseOutcome, LifecycleObserver, PanelHandle, PanelId};
use crate::navigation::NavigationEvents;
use crate::state::PanelState;
use crate::surface::{HitTarget, SurfaceHost};
use crate::tabs::{MinimizedTabRecord, MinimizedTabRegistry};

struct StackEntry {
    handle: PanelHandle,
    container: Arc<PanelContainer>,
    content_key: Option<ContentKey>,
    state: PanelState,
    z_index: i32,
    created_at: DateTime<Utc>,
}

/// Read-only view of one stack entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StackEntryInfo {
    pub id: PanelId,
    pub title: String,
    pub state: PanelState,
    pub z_index: i32,
    pub position: PanelPosition,
    pub content_key: Option<ContentKey>,
    pub created_at: DateTime<Utc>,
}

struct OrchestratorInner {
    host: Arc<dyn SurfaceHost>,
    content_host: ContentHost,
    tabs: MinimizedTabRegistry,
    navigation: NavigationEvents,
    defaults: Mutex<PanelDefaults>,
    stack: Mutex<Vec<StackEntry>>,
}

impl OrchestratorInner {
    fn stack(&self) -> MutexGuard<'_, Vec<StackEntry>> {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_transition(&self, panel: &PanelHandle, change: StateChange) {
        if let Some(entry) = self.stack().iter_mut().find(|e| e.handle == *panel) {
            entry.state = change.to;
        }
        match (change.from, change.to) {
            (_, PanelState::Minimized) => {
                self.tabs.add_tab(tab_record(panel));
            }
            (PanelState::Minimized, _) => {
                self.tabs.remove_tab(panel.id());
            }
            (_, PanelState::Closed) => {
                self.stack().retain(|e| e.handle != *panel);
                self.tabs.remove_tab(panel.id());
                tracing::debug!(panel_id = %panel.id(), "panel removed from stack");
            }
            _ => {}
        }
    }
}

fn tab_record(panel: &PanelHandle) -> MinimizedTabRecord {
    let weak = panel.downgrade();
    MinimizedTabRecord::new(
        panel.id().clone(),
        panel.title(),
        panel.config().position,
        panel.config().minimized_tab.clone(),
        move || {
            if let Some(handle) = weak.upgrade() {
                handle.restore();
            }
        },
    )
}

/// Mirrors handle transitions into the stack and the tab registry.
struct StackObserver {
    inner: Weak<OrchestratorInner>,
}

impl LifecycleObserver for StackObserver {
    fn on_transition(&self, panel: &PanelHandle, change: StateChange) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_transition(panel, change);
        }
    }
}

#[derive(Clone)]
pub struct PanelOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl PanelOrchestrator {
    pub fn new(host: Arc<dyn SurfaceHost>) -> Self {
        Self::with_defaults(host, PanelDefaults::default())
    }

    pub fn with_defaults(host: Arc<dyn SurfaceHost>, defaults: PanelDefaults) -> Self {
        let tabs = MinimizedTabRegistry::new();
        if let Some(presenter) = host.tray_presenter() {
            tabs.set_presenter(presenter);
        }
        Self {
            inner: Arc::new(OrchestratorInner {
                host,
                content_host: ContentHost::new(),
                tabs,
                navigation: NavigationEvents::new(),
                defaults: Mutex::new(defaults),
                stack: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn defaults(&self) -> PanelDefaults {
        self.inner
            .defaults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the global defaults. Panels already open keep theirs.
    pub fn set_defaults(&self, defaults: PanelDefaults) {
        *self
            .inner
            .defaults
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = defaults;
    }

    pub fn tabs(&self) -> &MinimizedTabRegistry {
        &self.inner.tabs
    }

    pub fn navigation(&self) -> &NavigationEvents {
        &self.inner.navigation
    }

    /// Announce a route change to every panel listening for one.
    pub fn navigate(&self, route: impl Into<String>) -> usize {
        self.inner.navigation.navigate(route)
    }

    /// Open a panel hosting `content`.
    ///
    /// Re-opening content that sits minimized at the same position restores
    /// and returns the existing handle. With `allow_multiple` off, every
    /// live panel is closed (one after another) before the new one appears.
    pub async fn open(
        &self,
        content: ContentDescriptor,
        config: PanelConfig,
    ) -> PanelResult<PanelHandle> {
        if content.is_empty() {
            return Err(PanelError::MissingContent);
        }
        let resolved = resolve(&config, &self.defaults());
        let content_key = content.key();

        if let Some(handle) = self.find_minimized(content_key.as_ref(), resolved.position) {
            tracing::debug!(panel_id = %handle.id(), "restoring minimized panel instead of opening another");
            if !self.inner.tabs.restore_tab(handle.id()) {
                handle.restore();
            }
            return Ok(handle);
        }
        self.ensure_unique_id(resolved.id.as_deref())?;

        if !resolved.allow_multiple {
            for handle in self.get_all_panels() {
                if handle.close(None).await == CloseOutcome::Prevented {
                    tracing::debug!(panel_id = %handle.id(), "panel stayed open under single-panel policy");
                }
            }
            self.ensure_unique_id(resolved.id.as_deref())?;
        }

        let id = resolved
            .id
            .clone()
            .map(PanelId::from)
            .unwrap_or_else(PanelId::generate);
        let z_index = resolved.z_index.unwrap_or_else(|| self.next_z_index());
        let resolved = Arc::new(resolved);

        let surface = self.inner.host.create_surface(&id, &resolved, z_index)?;
        let focus = self.inner.host.create_focus_trap(&id);
        let footer = FooterActionRegistry::new();
        let handle = PanelHandle::new(id.clone(), resolved.clone(), footer.clone());
        let container = PanelContainer::new(&handle, surface, focus);
        handle.add_observer(container.clone());

        let ctx = PanelContext::new(handle.downgrade(), resolved.clone(), footer);
        let built = self
            .inner
            .content_host
            .create(&content, &ctx)
            .and_then(|hosted| {
                let title = hosted.title();
                container.mount(hosted).map(|_| title)
            });
        let content_title = match built {
            Ok(title) => title,
            Err(err) => {
                tracing::warn!(panel_id = %id, kind = %content.kind(), error = %err, "panel construction failed");
                handle.force_close();
                return Err(err);
            }
        };
        if resolved.title.is_none()
            && let Some(title) = content_title
        {
            handle.update_title(title);
        }

        self.inner.stack().push(StackEntry {
            handle: handle.clone(),
            container: container.clone(),
            content_key,
            state: handle.state(),
            z_index,
            created_at: Utc::now(),
        });
        handle.add_observer(Arc::new(StackObserver {
            inner: Arc::downgrade(&self.inner),
        }));
        container.enter();

        if resolved.close_on_route_change {
            self.close_on_navigation(&handle);
        }
        let entering = handle.downgrade();
        tokio::spawn(async move {
            if let Some(handle) = entering.upgrade() {
                handle.await_entry().await;
            }
        });

        tracing::debug!(panel_id = %id, z_index, position = %resolved.position, "panel opened");
        Ok(handle)
    }

    fn ensure_unique_id(&self, id: Option<&str>) -> PanelResult<()> {
        match id {
            Some(id) if self.get_panel(id).is_some() => Err(PanelError::DuplicateId(id.to_string())),
            _ => Ok(()),
        }
    }

    /// A minimized panel showing the same content at the same edge. The
    /// stack's view is cross-checked against the tab registry so stale
    /// entries are never resurrected.
    fn find_minimized(&self, key: Option<&ContentKey>, position: PanelPosition) -> Option<PanelHandle> {
        let key = key?;
        let candidates: Vec<PanelHandle> = self
            .inner
            .stack()
            .iter()
            .filter(|e| {
                e.state == PanelState::Minimized
                    && e.content_key.as_ref() == Some(key)
                    && e.handle.config().position == position
            })
            .map(|e| e.handle.clone())
            .collect();
        for handle in candidates {
            if handle.is_minimized() && self.inner.tabs.has_tab(handle.id()) {
                return Some(handle);
            }
            tracing::warn!(panel_id = %handle.id(), "stack and tab registry disagree about minimized panel");
        }
        None
    }

    fn next_z_index(&self) -> i32 {
        self.inner
            .stack()
            .iter()
            .map(|e| e.z_index)
            .max()
            .unwrap_or(BASE_Z_INDEX)
            .saturating_add(1)
    }

    /// Close `handle` on the first navigation while it is alive. The listener
    /// goes away with the panel.
    fn close_on_navigation(&self, handle: &PanelHandle) {
        let mut routes = self.inner.navigation.subscribe();
        let handle = handle.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = handle.wait_closed() => break,
                    received = routes.recv() => {
                        if let Err(RecvError::Closed) = received {
                            break;
                        }
                        if !handle.state().is_closable() {
                            break;
                        }
                        tracing::debug!(panel_id = %handle.id(), "closing panel on route change");
                        if handle.close(None).await != CloseOutcome::Prevented {
                            break;
                        }
                    }
                }
            }
        });
    }

    pub async fn close(&self, id: impl AsRef<str>) -> PanelResult<CloseOutcome> {
        let id = id.as_ref();
        let handle = self
            .get_panel(id)
            .ok_or_else(|| PanelError::UnknownPanel(id.to_string()))?;
        Ok(handle.close(None).await)
    }

    /// Close every panel, one after another. Returns how many closed.
    pub async fn close_all(&self) -> usize {
        let snapshot = self.get_all_panels();
        let mut closed = 0;
        for handle in snapshot {
            if handle.close(None).await == CloseOutcome::Closed {
                closed += 1;
            }
        }
        closed
    }

    pub fn get_panel(&self, id: impl AsRef<str>) -> Option<PanelHandle> {
        let id = id.as_ref();
        self.inner
            .stack()
            .iter()
            .find(|e| e.handle.id().as_str() == id)
            .map(|e| e.handle.clone())
    }

    /// Live panels, lowest z-index first.
    pub fn get_all_panels(&self) -> Vec<PanelHandle> {
        let mut entries: Vec<(i32, PanelHandle)> = self
            .inner
            .stack()
            .iter()
            .map(|e| (e.z_index, e.handle.clone()))
            .collect();
        entries.sort_by_key(|(z, _)| *z);
        entries.into_iter().map(|(_, h)| h).collect()
    }

    pub fn open_panels_count(&self) -> usize {
        self.inner.stack().len()
    }

    /// The visible panel with the highest z-index.
    pub fn top_panel(&self) -> Option<PanelHandle> {
        self.top_entry().map(|(handle, _)| handle)
    }

    fn top_entry(&self) -> Option<(PanelHandle, Arc<PanelContainer>)> {
        self.inner
            .stack()
            .iter()
            .filter(|e| e.state.is_visible())
            .max_by_key(|e| e.z_index)
            .map(|e| (e.handle.clone(), e.container.clone()))
    }

    fn container(&self, id: &PanelId) -> Option<Arc<PanelContainer>> {
        self.inner
            .stack()
            .iter()
            .find(|e| e.handle.id() == id)
            .map(|e| e.container.clone())
    }

    pub fn stack_snapshot(&self) -> Vec<StackEntryInfo> {
        let mut snapshot: Vec<StackEntryInfo> = self
            .inner
            .stack()
            .iter()
            .map(|e| StackEntryInfo {
                id: e.handle.id().clone(),
                title: e.handle.title(),
                state: e.state,
                z_index: e.z_index,
                position: e.handle.config().position,
                content_key: e.content_key.clone(),
                created_at: e.created_at,
            })
            .collect();
        snapshot.sort_by_key(|info| info.z_index);
        snapshot
    }

    /// Route a terminal event. Keys go to the topmost visible panel; left
    /// clicks are hit-tested by the surface host.
    pub fn dispatch_event(&self, event: &Event) -> InputOutcome {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => match self.top_entry() {
                Some((_, container)) => container.handle_key(key),
                None => InputOutcome::Ignored,
            },
            Event::Mouse(mouse) if matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left)) => {
                self.dispatch_click(mouse.column, mouse.row)
            }
            _ => InputOutcome::Ignored,
        }
    }

    fn dispatch_click(&self, column: u16, row: u16) -> InputOutcome {
        let target = self.inner.host.hit_test(column, row);
        tracing::trace!(column, row, ?target, "click");
        match target {
            HitTarget::Nothing => InputOutcome::Ignored,
            HitTarget::Backdrop(id) => match self.top_entry() {
                Some((top, container)) if *top.id() == id => container.backdrop_click(column, row),
                _ => InputOutcome::Ignored,
            },
            HitTarget::CloseButton(id) => self
                .container(&id)
                .map(|c| c.close_button())
                .unwrap_or(InputOutcome::Ignored),
            HitTarget::MinimizeButton(id) => self
                .container(&id)
                .map(|c| c.minimize_button())
                .unwrap_or(InputOutcome::Ignored),
            HitTarget::FooterAction(id, index) => self
                .container(&id)
                .map(|c| c.invoke_footer(index))
                .unwrap_or(InputOutcome::Ignored),
            HitTarget::Body(_) => InputOutcome::Consumed,
            HitTarget::Tab(id) => {
                if self.inner.tabs.restore_tab(&id) {
                    InputOutcome::Consumed
                } else {
                    InputOutcome::Ignored
                }
            }
        }
    }

    /// Tear down every panel immediately and forget all minimized tabs.
    pub fn shutdown(&self) {
        let panels = self.get_all_panels();
        tracing::debug!(panels = panels.len(), "shutting down panel orchestrator");
        for handle in panels {
            handle.force_close();
        }
        self.inner.tabs.clear_all();
    }
}

impl std::fmt::Debug for PanelOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelOrchestrator")
            .field("panels", &self.open_panels_count())
            .field("tabs", &self.inner.tabs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelPosition;
    use crate::content::{ComponentRef, PanelComponent, PanelContent};
    use crate::surface::{FocusTrap, MountedPanel, RenderingSurface, Transition, TransitionDone};

    struct NullSurface;

    impl RenderingSurface for NullSurface {
        fn mount(&mut self, _panel: MountedPanel) -> PanelResult<()> {
            Ok(())
        }
        fn begin_transition(&mut self, _transition: Transition, _done: TransitionDone) {}
        fn set_backdrop_interactive(&mut self, _interactive: bool) {}
        fn set_panel_visible(&mut self, _visible: bool) {}
        fn set_scroll_locked(&mut self, _locked: bool) {}
        fn dispose(&mut self) {}
    }

    struct NullFocus;

    impl FocusTrap for NullFocus {
        fn activate(&mut self, _auto_focus: bool) {}
        fn deactivate(&mut self, _restore: bool) {}
        fn is_active(&self) -> bool {
            false
        }
    }

    struct NullHost;

    impl SurfaceHost for NullHost {
        fn create_surface(
            &self,
            _id: &PanelId,
            _config: &crate::config::ResolvedConfig,
            _z_index: i32,
        ) -> PanelResult<Box<dyn RenderingSurface>> {
            Ok(Box::new(NullSurface))
        }

        fn create_focus_trap(&self, _id: &PanelId) -> Box<dyn FocusTrap> {
            Box::new(NullFocus)
        }
    }

    struct Notes;

    impl PanelContent for Notes {
        fn title(&self) -> Option<String> {
            Some("Notes".to_string())
        }

        fn body(&self, _width: u16) -> Vec<String> {
            vec!["notes".to_string()]
        }
    }

    impl PanelComponent for Notes {
        fn create(_ctx: &PanelContext) -> PanelResult<Self> {
            Ok(Notes)
        }
    }

    fn orchestrator() -> PanelOrchestrator {
        PanelOrchestrator::new(Arc::new(NullHost))
    }

    fn multi() -> PanelConfig {
        PanelConfig::new().with_allow_multiple(true)
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_missing_content_and_duplicate_ids() {
        let orch = orchestrator();
        let err = orch
            .open(ContentDescriptor::html("  "), PanelConfig::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PanelError::MissingContent));

        orch.open(ContentDescriptor::html("<p>a</p>"), multi().with_id("dup"))
            .await
            .expect("first");
        let err = orch
            .open(ContentDescriptor::html("<p>b</p>"), multi().with_id("dup"))
            .await
            .unwrap_err();
        assert!(matches!(err, PanelError::DuplicateId(id) if id == "dup"));
        assert_eq!(orch.open_panels_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn content_title_fills_in_missing_title() {
        let orch = orchestrator();
        let handle = orch
            .open(ContentDescriptor::component::<Notes>(), PanelConfig::new())
            .await
            .expect("open");
        assert_eq!(handle.title(), "Notes");

        let titled = orch
            .open(
                ContentDescriptor::component::<Notes>(),
                multi().with_title("Mine"),
            )
            .await
            .expect("open");
        assert_eq!(titled.title(), "Mine");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_content_is_torn_down() {
        let orch = orchestrator();
        let broken = ComponentRef::from_fn("Broken", |_| {
            Err(PanelError::content(crate::content::ContentKind::Component, "boom"))
        });
        let err = orch
            .open(ContentDescriptor::Component(broken), PanelConfig::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PanelError::ContentCreation { .. }));
        assert_eq!(orch.open_panels_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_z_index_is_kept_and_raises_the_ceiling() {
        let orch = orchestrator();
        let a = orch
            .open(ContentDescriptor::html("a"), multi().with_z_index(5000))
            .await
            .expect("a");
        let b = orch
            .open(ContentDescriptor::html("b"), multi())
            .await
            .expect("b");
        let snapshot = orch.stack_snapshot();
        assert_eq!(snapshot[0].id, *a.id());
        assert_eq!(snapshot[0].z_index, 5000);
        assert_eq!(snapshot[1].id, *b.id());
        assert_eq!(snapshot[1].z_index, 5001);
        assert_eq!(orch.top_panel(), Some(b));
    }

    #[tokio::test(start_paused = true)]
    async fn minimized_entries_are_mirrored() {
        let orch = orchestrator();
        let handle = orch
            .open(
                ContentDescriptor::component::<Notes>(),
                PanelConfig::new()
                    .with_minimizable(true)
                    .with_position(PanelPosition::Left),
            )
            .await
            .expect("open");
        assert!(handle.minimize());
        assert_eq!(orch.stack_snapshot()[0].state, PanelState::Minimized);
        assert_eq!(orch.tabs().tabs_by_position(PanelPosition::Left).len(), 1);
        assert!(orch.top_panel().is_none());

        // different edge: not a duplicate
        let other = orch
            .open(
                ContentDescriptor::component::<Notes>(),
                multi().with_position(PanelPosition::Right),
            )
            .await
            .expect("other");
        assert_ne!(other, handle);
        assert_eq!(orch.open_panels_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_panel_close_is_an_error() {
        let orch = orchestrator();
        assert!(matches!(
            orch.close("missing").await,
            Err(PanelError::UnknownPanel(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_forces_everything_closed() {
        let orch = orchestrator();
        let a = orch
            .open(ContentDescriptor::html("a"), multi().with_minimizable(true))
            .await
            .expect("a");
        orch.open(ContentDescriptor::html("b"), multi())
            .await
            .expect("b");
        a.minimize();
        orch.shutdown();
        assert_eq!(orch.open_panels_count(), 0);
        assert!(orch.tabs().is_empty());
        assert!(a.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn defaults_apply_to_new_panels_only() {
        let orch = orchestrator();
        let before = orch
            .open(ContentDescriptor::html("a"), multi())
            .await
            .expect("a");
        orch.set_defaults(PanelDefaults {
            position: Some(PanelPosition::Bottom),
            ..PanelDefaults::default()
        });
        let after = orch
            .open(ContentDescriptor::html("b"), multi())
            .await
            .expect("b");
        assert_eq!(before.config().position, PanelPosition::Right);
        assert_eq!(after.config().position, PanelPosition::Bottom);
        assert_eq!(orch.defaults().position, Some(PanelPosition::Bottom));
    }
}
