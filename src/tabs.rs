//! Registry of minimized panels and the tray that presents them.
//!
//! The tray is created lazily when the first tab arrives and torn down when
//! the last one leaves. Its lifetime is a two-state machine driven purely by
//! the record count, so rapid add/remove cycles never produce a second tray.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::config::{MinimizedTabConfig, PanelPosition};
use crate::handle::PanelId;

type RestoreFn = dyn Fn() + Send + Sync;

#[derive(Clone)]
pub struct MinimizedTabRecord {
    pub id: PanelId,
    pub title: String,
    pub position: PanelPosition,
    pub presentation: MinimizedTabConfig,
    restore: Arc<RestoreFn>,
}

impl MinimizedTabRecord {
    pub fn new<F>(
        id: PanelId,
        title: impl Into<String>,
        position: PanelPosition,
        presentation: MinimizedTabConfig,
        restore: F,
    ) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id,
            title: title.into(),
            position,
            presentation,
            restore: Arc::new(restore),
        }
    }

    /// Text shown on the tab: the custom label when set, else the title.
    pub fn label(&self) -> String {
        let label = self
            .presentation
            .label
            .clone()
            .unwrap_or_else(|| self.title.clone());
        match &self.presentation.icon {
            Some(icon) => format!("{} {}", icon, label),
            None => label,
        }
    }
}

impl fmt::Debug for MinimizedTabRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinimizedTabRecord")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("position", &self.position)
            .field("presentation", &self.presentation)
            .finish()
    }
}

/// Visual side of the registry. Called with the registry lock held, so
/// implementations must not call back into the registry.
pub trait TrayPresenter: Send + Sync {
    fn create_tray(&self);
    fn destroy_tray(&self);
    fn tabs_changed(&self, tabs: &[MinimizedTabRecord]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayState {
    Absent,
    Present,
}

struct TabsState {
    records: Vec<MinimizedTabRecord>,
    tray: TrayState,
    presenter: Option<Arc<dyn TrayPresenter>>,
}

impl TabsState {
    /// Bring the tray in line with the record count and notify the presenter.
    fn sync_tray(&mut self) {
        let wanted = if self.records.is_empty() {
            TrayState::Absent
        } else {
            TrayState::Present
        };
        if self.tray != wanted {
            tracing::debug!(tray = ?wanted, tabs = self.records.len(), "tray state changed");
            if let Some(presenter) = &self.presenter {
                match wanted {
                    TrayState::Present => presenter.create_tray(),
                    TrayState::Absent => presenter.destroy_tray(),
                }
            }
            self.tray = wanted;
        }
        if let Some(presenter) = &self.presenter {
            presenter.tabs_changed(&self.records);
        }
    }
}

struct TabsInner {
    state: Mutex<TabsState>,
    changes: watch::Sender<Vec<MinimizedTabRecord>>,
}

/// Process-wide registry of minimized panels. Clones share one registry.
#[derive(Clone)]
pub struct MinimizedTabRegistry {
    inner: Arc<TabsInner>,
}

impl MinimizedTabRegistry {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(TabsInner {
                state: Mutex::new(TabsState {
                    records: Vec::new(),
                    tray: TrayState::Absent,
                    presenter: None,
                }),
                changes,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, TabsState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &mut TabsState) {
        state.sync_tray();
        self.inner.changes.send_replace(state.records.clone());
    }

    /// Attach the visual tray. A tray that should already exist is created on
    /// the new presenter straight away.
    pub fn set_presenter(&self, presenter: Arc<dyn TrayPresenter>) {
        let mut state = self.state();
        if state.tray == TrayState::Present {
            presenter.create_tray();
            presenter.tabs_changed(&state.records);
        }
        state.presenter = Some(presenter);
    }

    /// Add a tab. A record whose id is already present is ignored; returns
    /// whether the record was added.
    pub fn add_tab(&self, record: MinimizedTabRecord) -> bool {
        let mut state = self.state();
        if state.records.iter().any(|r| r.id == record.id) {
            tracing::debug!(panel_id = %record.id, "tab already registered");
            return false;
        }
        tracing::debug!(panel_id = %record.id, position = %record.position, "tab added");
        state.records.push(record);
        self.publish(&mut state);
        true
    }

    pub fn remove_tab(&self, id: &PanelId) -> bool {
        let mut state = self.state();
        let before = state.records.len();
        state.records.retain(|r| &r.id != id);
        if state.records.len() == before {
            return false;
        }
        tracing::debug!(panel_id = %id, "tab removed");
        self.publish(&mut state);
        true
    }

    /// Remove the tab and run its restore callback. The callback runs after
    /// the registry lock is released, so it may re-enter the registry.
    pub fn restore_tab(&self, id: &PanelId) -> bool {
        let restore = {
            let mut state = self.state();
            let Some(index) = state.records.iter().position(|r| &r.id == id) else {
                return false;
            };
            let record = state.records.remove(index);
            self.publish(&mut state);
            record.restore
        };
        restore();
        true
    }

    pub fn tabs_by_position(&self, position: PanelPosition) -> Vec<MinimizedTabRecord> {
        self.state()
            .records
            .iter()
            .filter(|r| r.position == position)
            .cloned()
            .collect()
    }

    /// Drop every record without restoring anything.
    pub fn clear_all(&self) {
        let mut state = self.state();
        if state.records.is_empty() && state.tray == TrayState::Absent {
            return;
        }
        state.records.clear();
        self.publish(&mut state);
    }

    pub fn tabs(&self) -> Vec<MinimizedTabRecord> {
        self.state().records.clone()
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_tab(&self, id: &PanelId) -> bool {
        self.state().records.iter().any(|r| &r.id == id)
    }

    pub fn tray_present(&self) -> bool {
        self.state().tray == TrayState::Present
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<MinimizedTabRecord>> {
        self.inner.changes.subscribe()
    }
}

impl Default for MinimizedTabRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MinimizedTabRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("MinimizedTabRegistry")
            .field("tabs", &state.records.len())
            .field("tray", &state.tray)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTray {
        created: AtomicUsize,
        destroyed: AtomicUsize,
        last_len: AtomicUsize,
    }

    impl TrayPresenter for CountingTray {
        fn create_tray(&self) {
            self.created.fetch_add(1, Ordering::SeqCst);
        }

        fn destroy_tray(&self) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }

        fn tabs_changed(&self, tabs: &[MinimizedTabRecord]) {
            self.last_len.store(tabs.len(), Ordering::SeqCst);
        }
    }

    fn record(id: &str, position: PanelPosition) -> MinimizedTabRecord {
        MinimizedTabRecord::new(
            PanelId::from(id),
            id,
            position,
            MinimizedTabConfig::default(),
            || {},
        )
    }

    #[test]
    fn duplicate_add_is_ignored() {
        let registry = MinimizedTabRegistry::new();
        assert!(registry.add_tab(record("a", PanelPosition::Right)));
        assert!(!registry.add_tab(record("a", PanelPosition::Left)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.tabs()[0].position, PanelPosition::Right);
    }

    #[test]
    fn tray_follows_record_count() {
        let tray = Arc::new(CountingTray::default());
        let registry = MinimizedTabRegistry::new();
        registry.set_presenter(tray.clone());
        assert!(!registry.tray_present());

        for _ in 0..3 {
            registry.add_tab(record("a", PanelPosition::Right));
            registry.add_tab(record("b", PanelPosition::Left));
            registry.remove_tab(&PanelId::from("a"));
            registry.remove_tab(&PanelId::from("b"));
        }
        assert_eq!(tray.created.load(Ordering::SeqCst), 3);
        assert_eq!(tray.destroyed.load(Ordering::SeqCst), 3);
        assert!(!registry.tray_present());

        registry.add_tab(record("c", PanelPosition::Top));
        assert!(registry.tray_present());
        assert_eq!(tray.last_len.load(Ordering::SeqCst), 1);
        registry.clear_all();
        assert!(!registry.tray_present());
        assert_eq!(tray.destroyed.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn tabs_group_by_position() {
        let registry = MinimizedTabRegistry::new();
        registry.add_tab(record("a", PanelPosition::Right));
        registry.add_tab(record("b", PanelPosition::Left));
        registry.add_tab(record("c", PanelPosition::Right));
        let right: Vec<_> = registry
            .tabs_by_position(PanelPosition::Right)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(right, [PanelId::from("a"), PanelId::from("c")]);
        assert!(registry.tabs_by_position(PanelPosition::Bottom).is_empty());
    }

    #[test]
    fn restore_removes_record_then_calls_back() {
        let registry = MinimizedTabRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let reentrant = registry.clone();
        registry.add_tab(MinimizedTabRecord::new(
            PanelId::from("a"),
            "A",
            PanelPosition::Right,
            MinimizedTabConfig::default(),
            move || {
                // re-entering the registry must not deadlock
                assert!(!reentrant.has_tab(&PanelId::from("a")));
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));
        assert!(registry.restore_tab(&PanelId::from("a")));
        assert!(!registry.restore_tab(&PanelId::from("a")));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn label_prefers_custom_presentation() {
        let mut tab = record("a", PanelPosition::Right);
        assert_eq!(tab.label(), "a");
        tab.presentation.label = Some("Inbox".to_string());
        tab.presentation.icon = Some("@".to_string());
        assert_eq!(tab.label(), "@ Inbox");
    }

    #[test]
    fn subscribers_see_changes() {
        let registry = MinimizedTabRegistry::new();
        let mut rx = registry.subscribe();
        registry.add_tab(record("a", PanelPosition::Right));
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
