use std::io;

use thiserror::Error;

use crate::content::ContentKind;

/// Errors surfaced synchronously from panel setup.
///
/// Lifecycle outcomes that are not failures (a prevented close, a rejected
/// state transition) are reported as values and events, never through this
/// type.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("panel content is required but nothing renderable was supplied")]
    MissingContent,
    #[error("a panel with id `{0}` is already open")]
    DuplicateId(String),
    #[error("failed to create {kind} content: {reason}")]
    ContentCreation { kind: ContentKind, reason: String },
    #[error("rendering surface error: {0}")]
    Surface(String),
    #[error("no panel with id `{0}`")]
    UnknownPanel(String),
    #[error("failed to read panel defaults: {0}")]
    ConfigIo(#[from] io::Error),
    #[error("invalid panel defaults: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl PanelError {
    pub fn content(kind: ContentKind, reason: impl Into<String>) -> Self {
        PanelError::ContentCreation {
            kind,
            reason: reason.into(),
        }
    }

    pub fn surface(reason: impl Into<String>) -> Self {
        PanelError::Surface(reason.into())
    }
}

pub type PanelResult<T> = Result<T, PanelError>;
