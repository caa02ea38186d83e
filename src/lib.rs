//! Slide-in side panels for terminal applications.
//!
//! A [`PanelOrchestrator`] keeps a stack of panels anchored to a screen edge.
//! Each panel is driven through a [`PanelHandle`]; its visual side lives
//! behind the [`SurfaceHost`] trait, with [`terminal::TerminalHost`] as the
//! ratatui implementation.

pub mod config;
pub mod constants;
pub mod container;
pub mod content;
pub mod drivers;
pub mod error;
pub mod event_loop;
pub mod events;
pub mod footer;
pub mod handle;
pub mod keybindings;
pub mod log_buffer;
pub mod navigation;
pub mod orchestrator;
pub mod state;
pub mod surface;
pub mod tabs;
pub mod terminal;
pub mod theme;
pub mod tracing_sub;
pub mod ui;

pub use config::{
    MinimizedTabConfig, PanelConfig, PanelDefaults, PanelPosition, PanelSize, PreventClose,
    ResolvedConfig,
};
pub use container::InputOutcome;
pub use content::{
    ComponentRef, ContentDescriptor, PanelComponent, PanelContent, PanelContext, PanelView,
    TemplateRef,
};
pub use error::{PanelError, PanelResult};
pub use events::{BackdropClick, PanelClosed, StateChange};
pub use footer::{FooterAction, FooterActionPatch, FooterActionRegistry};
pub use handle::{CloseOutcome, PanelHandle, PanelId, WeakPanelHandle};
pub use orchestrator::{PanelOrchestrator, StackEntryInfo};
pub use state::PanelState;
pub use surface::{FocusTrap, HitTarget, RenderingSurface, SurfaceHost};
pub use tabs::{MinimizedTabRecord, MinimizedTabRegistry, TrayPresenter};
