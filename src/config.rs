//! Panel configuration: caller-supplied fields, process-wide defaults, and the
//! resolved value a panel is opened with.
//!
//! Resolution is a field-by-field override, caller first, then the global
//! defaults, then the hardcoded fallbacks below. Neither input is modified.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    DEFAULT_ANIMATION_DURATION, SIZE_LG, SIZE_MD, SIZE_SM, SIZE_XL, SIZE_XS,
    VERTICAL_EXTENT_DIVISOR,
};
use crate::content::PanelView;
use crate::error::PanelResult;
use crate::footer::FooterAction;

/// Screen edge a panel slides in from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelPosition {
    Left,
    #[default]
    Right,
    Top,
    Bottom,
}

impl PanelPosition {
    pub const ALL: [PanelPosition; 4] = [
        PanelPosition::Left,
        PanelPosition::Right,
        PanelPosition::Top,
        PanelPosition::Bottom,
    ];

    /// Left and right panels slide horizontally and span the full height.
    pub fn is_horizontal(self) -> bool {
        matches!(self, PanelPosition::Left | PanelPosition::Right)
    }
}

impl fmt::Display for PanelPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PanelPosition::Left => "left",
            PanelPosition::Right => "right",
            PanelPosition::Top => "top",
            PanelPosition::Bottom => "bottom",
        };
        write!(f, "{}", s)
    }
}

/// Extent of the panel along its slide axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelSize {
    Xs,
    Sm,
    #[default]
    Md,
    Lg,
    Xl,
    Full,
    /// Explicit extent in terminal cells.
    Cells(u16),
    /// Percentage (0..=100) of the available extent.
    Percent(u16),
}

impl PanelSize {
    /// Resolve to a concrete number of cells for `position` given the
    /// `available` extent along the slide axis. Never exceeds `available`.
    pub fn extent(self, position: PanelPosition, available: u16) -> u16 {
        let token = |cells: u16| {
            if position.is_horizontal() {
                cells
            } else {
                (cells / VERTICAL_EXTENT_DIVISOR).max(1)
            }
        };
        let wanted = match self {
            PanelSize::Xs => token(SIZE_XS),
            PanelSize::Sm => token(SIZE_SM),
            PanelSize::Md => token(SIZE_MD),
            PanelSize::Lg => token(SIZE_LG),
            PanelSize::Xl => token(SIZE_XL),
            PanelSize::Full => available,
            PanelSize::Cells(cells) => cells,
            PanelSize::Percent(pct) => {
                let pct = pct.min(100) as u32;
                ((available as u32 * pct) / 100) as u16
            }
        };
        if available == 0 {
            0
        } else {
            wanted.clamp(1, available)
        }
    }
}

/// Presentation overrides for the tab a minimized panel leaves behind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimizedTabConfig {
    pub icon: Option<String>,
    pub label: Option<String>,
    pub class: Option<String>,
    /// Render the tab on its own instead of inside the shared tray.
    pub standalone: bool,
}

type PreventCloseFn = dyn Fn() -> BoxFuture<'static, bool> + Send + Sync;

/// Veto hook consulted before a panel starts closing. Resolving to `false`
/// keeps the panel in its current state.
#[derive(Clone)]
pub struct PreventClose(Arc<PreventCloseFn>);

impl PreventClose {
    pub fn sync<F>(check: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(move || {
            let allowed = check();
            async move { allowed }.boxed()
        }))
    }

    pub fn future<F, Fut>(check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self(Arc::new(move || check().boxed()))
    }

    pub async fn allows_close(&self) -> bool {
        (self.0)().await
    }
}

impl fmt::Debug for PreventClose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PreventClose(..)")
    }
}

/// Per-call configuration. Every field is optional; absent fields fall back
/// to the orchestrator's [`PanelDefaults`].
#[derive(Debug, Clone, Default)]
pub struct PanelConfig {
    pub id: Option<String>,
    pub title: Option<String>,
    pub position: Option<PanelPosition>,
    pub size: Option<PanelSize>,
    pub show_header: Option<bool>,
    pub show_close_button: Option<bool>,
    pub has_backdrop: Option<bool>,
    pub close_on_backdrop_click: Option<bool>,
    pub close_on_escape: Option<bool>,
    pub close_on_route_change: Option<bool>,
    pub prevent_close: Option<PreventClose>,
    pub auto_focus: Option<bool>,
    pub restore_focus: Option<bool>,
    pub minimizable: Option<bool>,
    pub minimized_tab: Option<MinimizedTabConfig>,
    pub z_index: Option<i32>,
    pub allow_multiple: Option<bool>,
    pub animation_duration: Option<Duration>,
    pub data: Option<Value>,
    pub footer_buttons: Option<Vec<FooterAction>>,
    pub header_template: Option<PanelView>,
    pub footer_template: Option<PanelView>,
}

impl PanelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_position(mut self, position: PanelPosition) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_size(mut self, size: PanelSize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_header(mut self, show: bool) -> Self {
        self.show_header = Some(show);
        self
    }

    pub fn with_close_button(mut self, show: bool) -> Self {
        self.show_close_button = Some(show);
        self
    }

    pub fn with_backdrop(mut self, backdrop: bool) -> Self {
        self.has_backdrop = Some(backdrop);
        self
    }

    pub fn with_close_on_backdrop_click(mut self, close: bool) -> Self {
        self.close_on_backdrop_click = Some(close);
        self
    }

    pub fn with_close_on_escape(mut self, close: bool) -> Self {
        self.close_on_escape = Some(close);
        self
    }

    pub fn with_close_on_route_change(mut self, close: bool) -> Self {
        self.close_on_route_change = Some(close);
        self
    }

    pub fn with_prevent_close(mut self, prevent: PreventClose) -> Self {
        self.prevent_close = Some(prevent);
        self
    }

    pub fn with_auto_focus(mut self, focus: bool) -> Self {
        self.auto_focus = Some(focus);
        self
    }

    pub fn with_restore_focus(mut self, restore: bool) -> Self {
        self.restore_focus = Some(restore);
        self
    }

    pub fn with_minimizable(mut self, minimizable: bool) -> Self {
        self.minimizable = Some(minimizable);
        self
    }

    pub fn with_minimized_tab(mut self, tab: MinimizedTabConfig) -> Self {
        self.minimized_tab = Some(tab);
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = Some(z_index);
        self
    }

    pub fn with_allow_multiple(mut self, allow: bool) -> Self {
        self.allow_multiple = Some(allow);
        self
    }

    pub fn with_animation_duration(mut self, duration: Duration) -> Self {
        self.animation_duration = Some(duration);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_footer_buttons(mut self, buttons: Vec<FooterAction>) -> Self {
        self.footer_buttons = Some(buttons);
        self
    }

    pub fn with_header_template(mut self, view: PanelView) -> Self {
        self.header_template = Some(view);
        self
    }

    pub fn with_footer_template(mut self, view: PanelView) -> Self {
        self.footer_template = Some(view);
        self
    }
}

/// Process-wide defaults, typically loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PanelDefaults {
    pub position: Option<PanelPosition>,
    pub size: Option<PanelSize>,
    pub show_header: Option<bool>,
    pub show_close_button: Option<bool>,
    pub has_backdrop: Option<bool>,
    pub close_on_backdrop_click: Option<bool>,
    pub close_on_escape: Option<bool>,
    pub close_on_route_change: Option<bool>,
    pub auto_focus: Option<bool>,
    pub restore_focus: Option<bool>,
    pub minimizable: Option<bool>,
    pub minimized_tab: Option<MinimizedTabConfig>,
    pub allow_multiple: Option<bool>,
    pub animation_duration_ms: Option<u64>,
}

impl PanelDefaults {
    /// Parse defaults from a JSON document.
    pub fn from_json(json: &str) -> PanelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load defaults from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> PanelResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

/// Fully merged configuration a panel runs with. Immutable after `open`.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub id: Option<String>,
    pub title: Option<String>,
    pub position: PanelPosition,
    pub size: PanelSize,
    pub show_header: bool,
    pub show_close_button: bool,
    pub has_backdrop: bool,
    pub close_on_backdrop_click: bool,
    pub close_on_escape: bool,
    pub close_on_route_change: bool,
    pub prevent_close: Option<PreventClose>,
    pub auto_focus: bool,
    pub restore_focus: bool,
    pub minimizable: bool,
    pub minimized_tab: MinimizedTabConfig,
    pub z_index: Option<i32>,
    pub allow_multiple: bool,
    pub animation_duration: Duration,
    pub data: Option<Value>,
    pub footer_buttons: Vec<FooterAction>,
    pub header_template: Option<PanelView>,
    pub footer_template: Option<PanelView>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        resolve(&PanelConfig::default(), &PanelDefaults::default())
    }
}

pub fn resolve(caller: &PanelConfig, defaults: &PanelDefaults) -> ResolvedConfig {
    let flag = |caller: Option<bool>, global: Option<bool>, fallback: bool| {
        caller.or(global).unwrap_or(fallback)
    };
    ResolvedConfig {
        id: caller.id.clone(),
        title: caller.title.clone(),
        position: caller.position.or(defaults.position).unwrap_or_default(),
        size: caller.size.or(defaults.size).unwrap_or_default(),
        show_header: flag(caller.show_header, defaults.show_header, true),
        show_close_button: flag(caller.show_close_button, defaults.show_close_button, true),
        has_backdrop: flag(caller.has_backdrop, defaults.has_backdrop, true),
        close_on_backdrop_click: flag(
            caller.close_on_backdrop_click,
            defaults.close_on_backdrop_click,
            true,
        ),
        close_on_escape: flag(caller.close_on_escape, defaults.close_on_escape, true),
        close_on_route_change: flag(
            caller.close_on_route_change,
            defaults.close_on_route_change,
            true,
        ),
        prevent_close: caller.prevent_close.clone(),
        auto_focus: flag(caller.auto_focus, defaults.auto_focus, true),
        restore_focus: flag(caller.restore_focus, defaults.restore_focus, true),
        minimizable: flag(caller.minimizable, defaults.minimizable, false),
        minimized_tab: caller
            .minimized_tab
            .clone()
            .or_else(|| defaults.minimized_tab.clone())
            .unwrap_or_default(),
        z_index: caller.z_index,
        allow_multiple: flag(caller.allow_multiple, defaults.allow_multiple, false),
        animation_duration: caller
            .animation_duration
            .or(defaults.animation_duration_ms.map(Duration::from_millis))
            .unwrap_or(DEFAULT_ANIMATION_DURATION),
        data: caller.data.clone(),
        footer_buttons: caller.footer_buttons.clone().unwrap_or_default(),
        header_template: caller.header_template.clone(),
        footer_template: caller.footer_template.clone(),
    }
}
