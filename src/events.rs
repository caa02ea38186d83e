//! Per-panel event streams.
//!
//! Each stream is a `tokio::sync::broadcast` channel that can be *finalized*:
//! dropping the sender completes every receiver (`RecvError::Closed`) once the
//! buffered values are drained. A receiver obtained after finalization is
//! already complete, so late subscribers never wait on a panel that is gone.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crossterm::event::KeyEvent;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::constants::EVENT_STREAM_CAPACITY;
use crate::handle::PanelId;
use crate::state::PanelState;

#[derive(Debug)]
pub struct EventStream<T> {
    name: &'static str,
    sender: Mutex<Option<broadcast::Sender<T>>>,
}

impl<T: Clone + Send + 'static> EventStream<T> {
    pub fn new(name: &'static str) -> Self {
        let (sender, _) = broadcast::channel(EVENT_STREAM_CAPACITY);
        Self {
            name,
            sender: Mutex::new(Some(sender)),
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<broadcast::Sender<T>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        match self.sender().as_ref() {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(1);
                drop(sender);
                receiver
            }
        }
    }

    /// Publish `value`; returns how many receivers saw it. Emitting on a
    /// finalized stream is a no-op.
    pub fn emit(&self, value: T) -> usize {
        self.sender()
            .as_ref()
            .and_then(|sender| sender.send(value).ok())
            .unwrap_or(0)
    }

    /// Complete the stream. Returns false if it was already complete.
    pub fn finalize(&self) -> bool {
        let finalized = self.sender().take().is_some();
        if finalized {
            tracing::trace!(stream = self.name, "event stream finalized");
        }
        finalized
    }

    pub fn is_finalized(&self) -> bool {
        self.sender().is_none()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender()
            .as_ref()
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: PanelState,
    pub to: PanelState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelClosed {
    pub id: PanelId,
    pub result: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackdropClick {
    pub column: u16,
    pub row: u16,
}

/// The full set of streams a panel exposes.
#[derive(Debug)]
pub struct PanelEvents {
    pub opened: EventStream<()>,
    pub closed: EventStream<PanelClosed>,
    pub backdrop_clicked: EventStream<BackdropClick>,
    pub key_pressed: EventStream<KeyEvent>,
    pub close_prevented: EventStream<()>,
    pub state_changed: EventStream<StateChange>,
}

impl PanelEvents {
    pub fn new() -> Self {
        Self {
            opened: EventStream::new("opened"),
            closed: EventStream::new("closed"),
            backdrop_clicked: EventStream::new("backdrop_clicked"),
            key_pressed: EventStream::new("key_pressed"),
            close_prevented: EventStream::new("close_prevented"),
            state_changed: EventStream::new("state_changed"),
        }
    }

    /// Complete every stream. `closed` goes last so a subscriber woken by the
    /// closed event finds all other streams already complete.
    pub fn finalize_all(&self) {
        self.opened.finalize();
        self.backdrop_clicked.finalize();
        self.key_pressed.finalize();
        self.close_prevented.finalize();
        self.state_changed.finalize();
        self.closed.finalize();
    }

    pub fn all_finalized(&self) -> bool {
        self.opened.is_finalized()
            && self.backdrop_clicked.is_finalized()
            && self.key_pressed.is_finalized()
            && self.close_prevented.is_finalized()
            && self.state_changed.is_finalized()
            && self.closed.is_finalized()
    }
}

impl Default for PanelEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    #[test]
    fn emit_reaches_existing_subscribers() {
        let stream = EventStream::<u32>::new("test");
        let mut rx = stream.subscribe();
        assert_eq!(stream.emit(7), 1);
        assert_eq!(rx.try_recv(), Ok(7));
    }

    #[test]
    fn finalize_completes_receivers_after_draining() {
        let stream = EventStream::<u32>::new("test");
        let mut rx = stream.subscribe();
        stream.emit(1);
        assert!(stream.finalize());
        assert!(!stream.finalize());
        assert_eq!(rx.try_recv(), Ok(1));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
        assert_eq!(stream.emit(2), 0);
    }

    #[tokio::test]
    async fn late_subscriber_is_already_complete() {
        let stream = EventStream::<u32>::new("test");
        stream.finalize();
        let mut rx = stream.subscribe();
        assert_eq!(rx.recv().await, Err(RecvError::Closed));
    }

    #[test]
    fn finalize_all_covers_every_stream() {
        let events = PanelEvents::new();
        assert!(!events.all_finalized());
        events.finalize_all();
        assert!(events.all_finalized());
    }
}
