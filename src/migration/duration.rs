//! Durations as written in registry configuration files
//!
//! The registry accepts Go duration strings ("30s", "1m30s", "500ms") and
//! bare integers counting nanoseconds.

use std::time::Duration;

/// Nanoseconds per unit suffix accepted by Go's `time.ParseDuration`
fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "\u{b5}s" | "\u{3bc}s" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60_000_000_000,
        "h" => 3_600_000_000_000,
        _ => return None,
    })
}

/// Parse a Go style duration string into std::time::Duration
///
/// Supported units: "ns", "us"/"µs", "ms", "s", "m", "h". Components may be
/// chained ("1h30m") and carry decimal fractions ("1.5s", ".5h"). A leading
/// "+" is accepted; negative durations are rejected.
///
/// # Returns
/// Some(Duration) if parse successful, None if invalid or overflowing
pub fn parse_go_duration(duration_str: &str) -> Option<Duration> {
    let trimmed = duration_str.trim();
    let mut rest = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if rest == "0" {
        return Some(Duration::ZERO);
    }
    if rest.is_empty() {
        return None;
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let int_part = &rest[..int_len];
        rest = &rest[int_len..];

        let mut frac_part = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(after_dot.len());
            frac_part = &after_dot[..frac_len];
            rest = &after_dot[frac_len..];
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let unit_len = rest
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = unit_nanos(&rest[..unit_len])?;
        rest = &rest[unit_len..];

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().ok()?
        };
        let mut component = whole.checked_mul(unit)?;

        // Digits past 18 cannot change a nanosecond count for units up to an hour
        let frac_digits = &frac_part[..frac_part.len().min(18)];
        if !frac_digits.is_empty() {
            let numerator: u128 = frac_digits.parse().ok()?;
            let scale = 10u128.pow(frac_digits.len() as u32);
            component = component.checked_add(numerator * unit / scale)?;
        }

        total = total.checked_add(component)?;
    }

    // Go durations are signed 64-bit nanosecond counts
    if total > i64::MAX as u128 {
        return None;
    }
    Some(Duration::from_nanos(total as u64))
}

/// `value / 10^precision` in decimal, trailing fraction zeros trimmed
fn decimal(value: u128, precision: u32) -> String {
    let scale = 10u128.pow(precision);
    let (whole, frac) = (value / scale, value % scale);
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0width$}", width = precision as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Format a duration the way Go's `time.Duration.String` does
///
/// Sub-second values use the largest unit below a second ("1.5ms");
/// longer values are written as hours, minutes and fractional seconds.
///
/// # Examples
/// ```ignore
/// assert_eq!(format_go_duration(Duration::from_secs(90)), "1m30s");
/// assert_eq!(format_go_duration(Duration::from_micros(1500)), "1.5ms");
/// assert_eq!(format_go_duration(Duration::ZERO), "0s");
/// ```
pub fn format_go_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }

    if nanos < 1_000_000_000 {
        let (precision, unit) = match nanos {
            0..=999 => (0, "ns"),
            1_000..=999_999 => (3, "\u{b5}s"),
            _ => (6, "ms"),
        };
        return format!("{}{unit}", decimal(nanos, precision));
    }

    let seconds = decimal(nanos % 60_000_000_000, 9);
    let total_minutes = nanos / 60_000_000_000;
    match (total_minutes / 60, total_minutes % 60) {
        (0, 0) => format!("{seconds}s"),
        (0, minutes) => format!("{minutes}m{seconds}s"),
        (hours, minutes) => format!("{hours}h{minutes}m{seconds}s"),
    }
}
