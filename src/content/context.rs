//! Injection context handed to panel content.
//!
//! `PanelContext` carries everything content may need from its surroundings:
//! the caller's data payload, a control reference to its own panel, the
//! resolved configuration, and the footer registry of this panel instance.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ResolvedConfig;
use crate::footer::FooterActionRegistry;
use crate::handle::{PanelHandle, WeakPanelHandle};

#[derive(Debug, Clone)]
pub struct PanelContext {
    data: Option<Value>,
    panel: WeakPanelHandle,
    config: Arc<ResolvedConfig>,
    footer: FooterActionRegistry,
}

impl PanelContext {
    pub(crate) fn new(
        panel: WeakPanelHandle,
        config: Arc<ResolvedConfig>,
        footer: FooterActionRegistry,
    ) -> Self {
        Self {
            data: config.data.clone(),
            panel,
            config,
            footer,
        }
    }

    /// A context that is not attached to any panel. Useful for exercising
    /// content in isolation.
    pub fn detached(data: Option<Value>) -> Self {
        Self {
            data,
            panel: WeakPanelHandle::new(),
            config: Arc::new(ResolvedConfig::default()),
            footer: FooterActionRegistry::new(),
        }
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Deserialize the data payload into a concrete type.
    pub fn data_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.data
            .as_ref()
            .and_then(|data| serde_json::from_value(data.clone()).ok())
    }

    /// The owning panel, while it is still alive. Content uses this to close
    /// or minimize itself.
    pub fn panel(&self) -> Option<PanelHandle> {
        self.panel.upgrade()
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn footer(&self) -> &FooterActionRegistry {
        &self.footer
    }
}
