//! Text renderers for published readings
//!
//! Pure functions from a `SpeedReading` plus display preferences to text;
//! nothing here touches the sampler or the terminal.

pub mod formatting;
pub mod notification;
pub mod overlay;

pub use formatting::{format_bytes, format_speed_compact, format_speed_line, format_speed_parts};
pub use notification::{Badge, NotificationContent, NotificationRenderer, build_notification};
pub use overlay::{overlay_lines, render_overlay};
