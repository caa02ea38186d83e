//! Shared crate-wide constants.

use std::time::Duration;

/// Exit/entry transition length used when neither the caller nor the global
/// defaults name one.
///
/// Teardown waits at most this long for the rendering surface to acknowledge
/// the exit transition, so it must match the surface's own slide duration or
/// destruction will visibly clip the animation.
pub const DEFAULT_ANIMATION_DURATION: Duration = Duration::from_millis(225);

/// Stacking base for auto-assigned z-indices. The first panel on an empty
/// stack receives `BASE_Z_INDEX + 1`.
pub const BASE_Z_INDEX: i32 = 1000;

/// Capacity of every per-panel broadcast stream. Subscribers that fall further
/// behind observe `RecvError::Lagged` rather than blocking the emitter.
pub const EVENT_STREAM_CAPACITY: usize = 64;

/// Capacity of the host navigation channel.
pub const NAVIGATION_CAPACITY: usize = 16;

/// Panel extent (cells along the slide axis) for each size token.
pub const SIZE_XS: u16 = 24;
pub const SIZE_SM: u16 = 32;
pub const SIZE_MD: u16 = 44;
pub const SIZE_LG: u16 = 60;
pub const SIZE_XL: u16 = 80;

/// Vertical panels (top/bottom) use a fraction of the horizontal extents
/// because terminal rows are roughly twice as tall as columns.
pub const VERTICAL_EXTENT_DIVISOR: u16 = 3;

/// Label shown on a minimized tab when the panel has no title.
pub const UNTITLED_PANEL: &str = "Untitled";
