//! Notification content
//!
//! Builds the text of the persistent speed notification from a reading and the
//! notification preferences. `NotificationRenderer` remembers what it last
//! produced so callers only push an update when the content would change.

use std::fmt;

use crate::display::formatting::{format_speed_compact, format_speed_line, format_speed_parts};
use crate::sampler::SpeedReading;
use crate::settings::{DisplayMode, NotificationPrefs};

pub const TITLE: &str = "Network Speed";
pub const STATIC_BODY: &str = "Monitoring in background...";

/// The small glyph shown next to the notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Badge {
    /// Fixed app icon, no live value
    Static,
    /// Value above unit, e.g. `12` over `MB/s`
    Gauge { value: String, unit: &'static str },
    /// Compact status-bar text, e.g. `1.5M/s`
    ShortText(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: &'static str,
    pub body: String,
    pub badge: Badge,
}

impl fmt::Display for NotificationContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.badge {
            Badge::Static => write!(f, "[{}] {}", self.title, self.body),
            Badge::Gauge { value, unit } => write!(f, "[{} {}] {}", value, unit, self.body),
            Badge::ShortText(text) => write!(f, "[{}] {}", text, self.body),
        }
    }
}

fn badge_rate(reading: &SpeedReading, mode: DisplayMode) -> u64 {
    match mode {
        DisplayMode::Total => reading.total_bps(),
        DisplayMode::Upload => reading.upload_bps,
        DisplayMode::Download => reading.download_bps,
    }
}

pub fn build_notification(reading: &SpeedReading, prefs: &NotificationPrefs) -> NotificationContent {
    if !prefs.enabled {
        return NotificationContent {
            title: TITLE,
            body: STATIC_BODY.to_string(),
            badge: Badge::Static,
        };
    }

    if prefs.live_update {
        let up = format!("{}{}", prefs.text_up, format_speed_line(reading.upload_bps));
        let down = format!("{}{}", prefs.text_down, format_speed_line(reading.download_bps));
        let body = if prefs.up_first {
            format!("{up} {down}")
        } else {
            format!("{down} {up}")
        };
        return NotificationContent {
            title: TITLE,
            body,
            badge: Badge::ShortText(format_speed_compact(reading.total_bps())),
        };
    }

    let (value, unit) = format_speed_parts(badge_rate(reading, prefs.display_mode));
    NotificationContent {
        title: TITLE,
        body: format!(
            "RX {}  TX {}",
            format_speed_line(reading.download_bps),
            format_speed_line(reading.upload_bps)
        ),
        badge: Badge::Gauge { value, unit },
    }
}

/// Skips rebuilding when neither the reading nor the preferences changed
#[derive(Debug, Default)]
pub struct NotificationRenderer {
    last: Option<(SpeedReading, NotificationPrefs)>,
}

impl NotificationRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns fresh content, or `None` if it would equal the last one
    pub fn render(
        &mut self,
        reading: &SpeedReading,
        prefs: &NotificationPrefs,
    ) -> Option<NotificationContent> {
        if let Some((last_reading, last_prefs)) = &self.last {
            if last_reading == reading && last_prefs == prefs {
                return None;
            }
        }
        self.last = Some((*reading, prefs.clone()));
        Some(build_notification(reading, prefs))
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
