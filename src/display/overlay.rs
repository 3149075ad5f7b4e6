use crate::display::formatting::format_speed_line;
use crate::sampler::SpeedReading;
use crate::settings::OverlayPrefs;

/// The two overlay lines for a reading, ordered by `up_first`
pub fn overlay_lines(reading: &SpeedReading, prefs: &OverlayPrefs) -> [String; 2] {
    let up = format!("{}{}", prefs.text_up, format_speed_line(reading.upload_bps));
    let down = format!("{}{}", prefs.text_down, format_speed_line(reading.download_bps));

    if prefs.up_first { [up, down] } else { [down, up] }
}

/// Both overlay lines joined for single-line terminal output
pub fn render_overlay(reading: &SpeedReading, prefs: &OverlayPrefs) -> String {
    let [first, second] = overlay_lines(reading, prefs);
    format!("{first}  {second}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_first_by_default() {
        let lines = overlay_lines(&SpeedReading::new(2048, 512), &OverlayPrefs::default());
        assert_eq!(lines, ["▲ 512B/s".to_string(), "▼ 2KB/s".to_string()]);
    }

    #[test]
    fn test_custom_labels_and_order() {
        let prefs = OverlayPrefs {
            text_up: "U:".to_string(),
            text_down: "D:".to_string(),
            up_first: false,
        };
        assert_eq!(
            render_overlay(&SpeedReading::new(5 * 1024 * 1024, 0), &prefs),
            "D:5.0MB/s  U:0B/s"
        );
    }
}
