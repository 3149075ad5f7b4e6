//! Formatting utilities for transfer rates and byte counts
//!
//! All rate formatters take whole bytes per second and use binary (1024)
//! steps. Units switch one step early (at 1000 of the smaller unit) so the
//! value never needs four integer digits.

const KIB: f64 = 1024.0;

/// Splits a rate into its displayed value and unit
///
/// Used where value and unit are laid out separately, such as the
/// notification badge.
///
/// # Examples
///
/// ```
/// use pulse_meter::display::formatting::format_speed_parts;
///
/// assert_eq!(format_speed_parts(512), ("512".to_string(), "B/s"));
/// assert_eq!(format_speed_parts(2048), ("2".to_string(), "KB/s"));
/// assert_eq!(format_speed_parts(5 * 1024 * 1024), ("5.0".to_string(), "MB/s"));
/// ```
pub fn format_speed_parts(bytes_per_second: u64) -> (String, &'static str) {
    if bytes_per_second < 1024 {
        return (bytes_per_second.to_string(), "B/s");
    }

    let kb = bytes_per_second as f64 / KIB;
    if kb < 1000.0 {
        return (format!("{:.0}", kb), "KB/s");
    }

    let mb = kb / KIB;
    if mb < 1000.0 {
        let value = if mb < 10.0 {
            format!("{:.1}", mb)
        } else {
            format!("{:.0}", mb)
        };
        return (value, "MB/s");
    }

    (format!("{:.1}", mb / KIB), "GB/s")
}

/// Formats a rate as a single token, e.g. `"12KB/s"`
pub fn format_speed_line(bytes_per_second: u64) -> String {
    let (value, unit) = format_speed_parts(bytes_per_second);
    format!("{value}{unit}")
}

/// Narrow form used for status-bar style short text, e.g. `"1.5M/s"`
pub fn format_speed_compact(bytes_per_second: u64) -> String {
    if bytes_per_second < 1024 {
        return format!("{}B/s", bytes_per_second);
    }

    let kb = bytes_per_second as f64 / KIB;
    if kb < 1000.0 {
        return format!("{:.0}K/s", kb);
    }

    let mb = kb / KIB;
    if mb < 1000.0 {
        return if mb < 100.0 {
            format!("{:.1}M/s", mb)
        } else {
            format!("{:.0}M/s", mb)
        };
    }

    format!("{:.1}G/s", mb / KIB)
}

/// Formats byte values with appropriate units
///
/// Converts raw byte counts into human-readable format with appropriate
/// unit prefixes (B, KB, MB, GB, TB).
///
/// # Examples
///
/// ```
/// use pulse_meter::display::formatting::format_bytes;
///
/// assert_eq!(format_bytes(0), "0 B");
/// assert_eq!(format_bytes(1024), "1.00 KB");
/// assert_eq!(format_bytes(1_099_511_627_776), "1.00 TB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < KIB {
        format!("{:.0} B", bytes)
    } else if bytes < KIB * KIB {
        format!("{:.2} KB", bytes / KIB)
    } else if bytes < KIB * KIB * KIB {
        format!("{:.2} MB", bytes / (KIB * KIB))
    } else if bytes < KIB * KIB * KIB * KIB {
        format!("{:.2} GB", bytes / (KIB * KIB * KIB))
    } else {
        format!("{:.2} TB", bytes / (KIB * KIB * KIB * KIB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * MIB;

    #[test]
    fn test_format_speed_parts() {
        // Bytes are shown as exact integers
        assert_eq!(format_speed_parts(0), ("0".to_string(), "B/s"));
        assert_eq!(format_speed_parts(1023), ("1023".to_string(), "B/s"));

        // Kilobytes, no decimals
        assert_eq!(format_speed_parts(1024), ("1".to_string(), "KB/s"));
        assert_eq!(format_speed_parts(100 * 1024), ("100".to_string(), "KB/s"));
        assert_eq!(format_speed_parts(999 * 1024), ("999".to_string(), "KB/s"));

        // Switches to megabytes at 1000 KB
        assert_eq!(format_speed_parts(1000 * 1024), ("1.0".to_string(), "MB/s"));
        assert_eq!(format_speed_parts(3 * MIB + MIB / 2), ("3.5".to_string(), "MB/s"));
        assert_eq!(format_speed_parts(10 * MIB), ("10".to_string(), "MB/s"));
        assert_eq!(format_speed_parts(250 * MIB), ("250".to_string(), "MB/s"));

        // Gigabytes
        assert_eq!(format_speed_parts(1000 * MIB), ("1.0".to_string(), "GB/s"));
        assert_eq!(format_speed_parts(2 * GIB + GIB / 5), ("2.2".to_string(), "GB/s"));
    }

    #[test]
    fn test_format_speed_line() {
        assert_eq!(format_speed_line(512), "512B/s");
        assert_eq!(format_speed_line(20 * 1024), "20KB/s");
        assert_eq!(format_speed_line(5 * MIB), "5.0MB/s");
    }

    #[test]
    fn test_format_speed_compact() {
        assert_eq!(format_speed_compact(0), "0B/s");
        assert_eq!(format_speed_compact(900), "900B/s");
        assert_eq!(format_speed_compact(64 * 1024), "64K/s");
        assert_eq!(format_speed_compact(MIB + MIB / 2), "1.5M/s");
        // Keeps a decimal up to 100 MB
        assert_eq!(format_speed_compact(42 * MIB), "42.0M/s");
        assert_eq!(format_speed_compact(120 * MIB), "120M/s");
        assert_eq!(format_speed_compact(3 * GIB), "3.0G/s");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(MIB), "1.00 MB");
        assert_eq!(format_bytes(GIB + GIB / 2), "1.50 GB");
        assert_eq!(format_bytes(1_649_267_441_664), "1.50 TB");
    }

    #[test]
    fn test_huge_values_do_not_panic() {
        assert!(format_speed_line(u64::MAX).ends_with("GB/s"));
        assert!(format_speed_compact(u64::MAX).ends_with("G/s"));
        assert!(format_bytes(u64::MAX).ends_with("TB"));
    }
}
