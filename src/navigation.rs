//! Host navigation events ("route changes").
//!
//! Panels configured with `close_on_route_change` subscribe here and close on
//! the first navigation that arrives while they are still alive.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::constants::NAVIGATION_CAPACITY;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    pub route: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NavigationEvents {
    sender: broadcast::Sender<NavigationEvent>,
}

impl NavigationEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NAVIGATION_CAPACITY);
        Self { sender }
    }

    /// Announce a navigation. Returns how many listeners were notified.
    pub fn navigate(&self, route: impl Into<String>) -> usize {
        let event = NavigationEvent {
            route: route.into(),
            at: Utc::now(),
        };
        tracing::debug!(route = %event.route, "navigation");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NavigationEvents {
    fn default() -> Self {
        Self::new()
    }
}
