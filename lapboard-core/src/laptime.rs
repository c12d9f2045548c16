//! Lap-time text codec
//!
//! Timing data travels as fixed-width `MM:SS.mmm` strings. Anything that does
//! not match that exact shape parses to `f64::INFINITY`, so a single bad record
//! sorts last instead of aborting a whole leaderboard.

/// Placeholder rendered for values that cannot be ranked
pub const UNRANKABLE_DISPLAY: &str = "--:--.---";

/// Rendered for a zero or missing gap
pub const NO_GAP: &str = "-";

const ZERO_TIME: &str = "00:00.000";

/// Parse `MM:SS.mmm` into seconds.
///
/// Returns `f64::INFINITY` for every input that is not exactly two minute
/// digits, a colon, two second digits, a dot and three millisecond digits.
pub fn parse_seconds(text: &str) -> f64 {
    let bytes = text.as_bytes();
    if bytes.len() != 9 || bytes[2] != b':' || bytes[5] != b'.' {
        return f64::INFINITY;
    }

    let digits = [0, 1, 3, 4, 6, 7, 8];
    if !digits.iter().all(|&i| bytes[i].is_ascii_digit()) {
        return f64::INFINITY;
    }

    let num = |range: std::ops::Range<usize>| {
        bytes[range]
            .iter()
            .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'))
    };

    let minutes = num(0..2);
    let seconds = num(3..5);
    let millis = num(6..9);

    f64::from(minutes) * 60.0 + f64::from(seconds) + f64::from(millis) / 1000.0
}

/// Parse an optional lap-time field; `None` is unrankable.
pub fn parse_opt(text: Option<&str>) -> f64 {
    text.map_or(f64::INFINITY, parse_seconds)
}

/// Split a non-negative duration into (minutes, seconds, millis).
/// Rounds to whole milliseconds first: 29.999999 splits as (0, 30, 0).
fn split_millis(seconds: f64) -> (u64, u64, u64) {
    let total_ms = (seconds * 1000.0).round() as u64;
    (total_ms / 60_000, (total_ms / 1000) % 60, total_ms % 1000)
}

/// Format seconds as zero-padded `MM:SS.mmm`.
///
/// Zero, negative and non-finite inputs all format as `00:00.000`.
pub fn format_seconds(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return ZERO_TIME.to_string();
    }
    let (m, s, ms) = split_millis(seconds);
    format!("{:02}:{:02}.{:03}", m, s, ms)
}

/// Format a gap for display.
///
/// `None`, zero (after millisecond rounding) and non-finite gaps render as `-`.
/// Otherwise `+MM:SS.mmm`, shortened to `+SS.mmm` when under a minute.
/// Negative gaps keep their sign.
pub fn format_gap(delta: Option<f64>) -> String {
    let Some(delta) = delta.filter(|d| d.is_finite()) else {
        return NO_GAP.to_string();
    };

    let (m, s, ms) = split_millis(delta.abs());
    if m == 0 && s == 0 && ms == 0 {
        return NO_GAP.to_string();
    }

    let sign = if delta < 0.0 { '-' } else { '+' };
    if m == 0 {
        format!("{}{:02}.{:03}", sign, s, ms)
    } else {
        format!("{}{:02}:{:02}.{:03}", sign, m, s, ms)
    }
}

/// Normalized display text for a stored lap time, or the unrankable placeholder.
pub fn display_lap_time(text: Option<&str>) -> String {
    display_seconds(parse_opt(text))
}

/// Display text for already-parsed seconds, or the unrankable placeholder.
pub fn display_seconds(seconds: f64) -> String {
    if seconds.is_finite() {
        format_seconds(seconds)
    } else {
        UNRANKABLE_DISPLAY.to_string()
    }
}

/// Derive the average lap time text from a session's total time and lap count.
pub fn average_lap_time(total: Option<&str>, laps: Option<u32>) -> Option<String> {
    let laps = laps.filter(|&l| l > 0)?;
    let total = parse_opt(total);
    if !total.is_finite() {
        return None;
    }
    Some(format_seconds(total / f64::from(laps)))
}

/// Gap between two times; `+∞` when either side is unrankable.
pub fn gap(time: f64, reference: f64) -> f64 {
    if time.is_finite() && reference.is_finite() {
        time - reference
    } else {
        f64::INFINITY
    }
}
