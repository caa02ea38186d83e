//! Footer actions registered by panel content.
//!
//! Each `open` creates a fresh [`FooterActionRegistry`] and hands it to the
//! hosted content through its context. The container only reads from it, so
//! the content decides what its footer offers without knowing how the
//! footer is drawn.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::content::PanelView;

type HandlerFn = dyn Fn() -> BoxFuture<'static, ()> + Send + Sync;

/// Click handler of a footer action. Synchronous handlers are wrapped in a
/// ready future so both kinds are awaited the same way.
#[derive(Clone)]
pub struct ActionHandler(Arc<HandlerFn>);

impl ActionHandler {
    pub fn sync<F>(handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self(Arc::new(move || {
            handler();
            futures::future::ready(()).boxed()
        }))
    }

    pub fn future<F, Fut>(handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self(Arc::new(move || handler().boxed()))
    }

    pub(crate) async fn run(&self) {
        (self.0)().await
    }

    fn same(&self, other: &ActionHandler) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ActionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ActionHandler(..)")
    }
}

#[derive(Debug, Clone, Default)]
pub struct FooterAction {
    pub label: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub variant: Option<String>,
    pub size: Option<String>,
    pub disabled: bool,
    pub loading: bool,
    pub handler: Option<ActionHandler>,
}

impl FooterAction {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn on_click<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handler = Some(ActionHandler::sync(handler));
        self
    }

    pub fn on_click_async<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handler = Some(ActionHandler::future(handler));
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Text shown on the button, icon first when there is one.
    pub fn caption(&self) -> String {
        match &self.icon {
            Some(icon) => format!("{} {}", icon, self.label),
            None => self.label.clone(),
        }
    }

    pub fn is_actionable(&self) -> bool {
        !self.disabled && !self.loading && self.handler.is_some()
    }

    fn apply(&mut self, patch: FooterActionPatch) {
        if let Some(label) = patch.label {
            self.label = label;
        }
        if let Some(icon) = patch.icon {
            self.icon = icon;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(variant) = patch.variant {
            self.variant = variant;
        }
        if let Some(size) = patch.size {
            self.size = size;
        }
        if let Some(disabled) = patch.disabled {
            self.disabled = disabled;
        }
        if let Some(loading) = patch.loading {
            self.loading = loading;
        }
        if let Some(handler) = patch.handler {
            self.handler = Some(handler);
        }
    }
}

/// Partial update for [`FooterActionRegistry::update`]. `None` leaves a field
/// alone; `Some(None)` clears an optional one.
#[derive(Debug, Clone, Default)]
pub struct FooterActionPatch {
    pub label: Option<String>,
    pub icon: Option<Option<String>>,
    pub color: Option<Option<String>>,
    pub variant: Option<Option<String>>,
    pub size: Option<Option<String>>,
    pub disabled: Option<bool>,
    pub loading: Option<bool>,
    pub handler: Option<ActionHandler>,
}

struct FooterInner {
    actions: watch::Sender<Vec<FooterAction>>,
    custom_footer: watch::Sender<Option<PanelView>>,
}

/// Per-panel registry of footer actions and an optional custom footer view.
/// Clones share the same registry.
#[derive(Clone)]
pub struct FooterActionRegistry {
    inner: Arc<FooterInner>,
}

impl FooterActionRegistry {
    pub fn new() -> Self {
        let (actions, _) = watch::channel(Vec::new());
        let (custom_footer, _) = watch::channel(None);
        Self {
            inner: Arc::new(FooterInner {
                actions,
                custom_footer,
            }),
        }
    }

    /// Replace the whole action list.
    pub fn register(&self, actions: Vec<FooterAction>) {
        self.inner.actions.send_replace(actions);
    }

    pub fn add(&self, action: FooterAction) {
        self.inner.actions.send_modify(|actions| actions.push(action));
    }

    /// Merge `patch` into the action at `index`. Returns false when there is
    /// no such action.
    pub fn update(&self, index: usize, patch: FooterActionPatch) -> bool {
        self.inner.actions.send_if_modified(|actions| match actions.get_mut(index) {
            Some(action) => {
                action.apply(patch);
                true
            }
            None => false,
        })
    }

    pub fn clear(&self) {
        self.inner.actions.send_replace(Vec::new());
    }

    pub fn actions(&self) -> Vec<FooterAction> {
        self.inner.actions.borrow().clone()
    }

    pub fn subscribe_actions(&self) -> watch::Receiver<Vec<FooterAction>> {
        self.inner.actions.subscribe()
    }

    pub fn set_custom_footer(&self, view: Option<PanelView>) {
        self.inner.custom_footer.send_replace(view);
    }

    pub fn custom_footer(&self) -> Option<PanelView> {
        self.inner.custom_footer.borrow().clone()
    }

    pub fn subscribe_custom_footer(&self) -> watch::Receiver<Option<PanelView>> {
        self.inner.custom_footer.subscribe()
    }

    /// Run the handler of the action at `index`, flagging it as loading
    /// while the handler is pending. Disabled, loading and handler-less
    /// actions are skipped. Returns whether a handler ran.
    pub async fn invoke(&self, index: usize) -> bool {
        let handler = {
            let actions = self.inner.actions.borrow();
            match actions.get(index) {
                Some(action) if action.is_actionable() => action.handler.clone(),
                _ => None,
            }
        };
        let Some(handler) = handler else {
            tracing::debug!(index, "footer action not actionable");
            return false;
        };
        self.update(
            index,
            FooterActionPatch {
                loading: Some(true),
                ..FooterActionPatch::default()
            },
        );
        let _loading = LoadingGuard {
            registry: self,
            index,
            handler: handler.clone(),
        };
        handler.run().await;
        true
    }

    /// Clear the loading flag, unless the action at `index` was replaced
    /// while its handler ran.
    fn finish_loading(&self, index: usize, handler: &ActionHandler) {
        self.inner.actions.send_if_modified(|actions| match actions.get_mut(index) {
            Some(action)
                if action.loading
                    && action.handler.as_ref().is_some_and(|h| h.same(handler)) =>
            {
                action.loading = false;
                true
            }
            _ => false,
        });
    }
}

/// Ends the loading state when a handler finishes, panics or is cancelled.
struct LoadingGuard<'a> {
    registry: &'a FooterActionRegistry,
    index: usize,
    handler: ActionHandler,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.registry.finish_loading(self.index, &self.handler);
    }
}

impl Default for FooterActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FooterActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FooterActionRegistry")
            .field("actions", &self.inner.actions.borrow().len())
            .field("custom_footer", &self.inner.custom_footer.borrow().is_some())
            .finish()
    }
}
