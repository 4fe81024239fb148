use crate::error::{EngineError, Result};

/// Nanoseconds per second; chapter timestamps are stored in nanoseconds.
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

const FRACTION_DIGITS: usize = 9;

/// Parses a chapter timestamp `HH:MM:SS[.fraction]` into nanoseconds.
///
/// The fraction holds 1 to 9 digits and is right-padded to nanoseconds.
///
/// # Example
/// ```
/// use engine::parse_timestamp;
///
/// assert_eq!(parse_timestamp("00:01:02.5").expect("valid"), 62_500_000_000);
/// assert!(parse_timestamp("01:02").is_err());
/// ```
pub fn parse_timestamp(text: &str) -> Result<u64> {
    parse_parts(text.trim()).ok_or_else(|| EngineError::UnparsableTimestamp {
        value: text.to_string(),
    })
}

fn parse_parts(text: &str) -> Option<u64> {
    let mut parts = text.split(':');
    let hours = parse_digits(parts.next()?)?;
    let minutes = parse_digits(parts.next()?)?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (seconds, fraction) = match seconds_part.split_once('.') {
        Some((seconds, fraction)) => (parse_digits(seconds)?, parse_fraction(fraction)?),
        None => (parse_digits(seconds_part)?, 0),
    };

    let whole_seconds = hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?;
    whole_seconds
        .checked_mul(NANOS_PER_SECOND)?
        .checked_add(fraction)
}

fn parse_digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn parse_fraction(text: &str) -> Option<u64> {
    if text.len() > FRACTION_DIGITS {
        return None;
    }
    let value = parse_digits(text)?;
    Some(value * 10u64.pow((FRACTION_DIGITS - text.len()) as u32))
}

/// Formats nanoseconds as `HH:MM:SS.nnnnnnnnn`, the form written to chapter files.
///
/// # Example
/// ```
/// use engine::format_timestamp;
///
/// assert_eq!(format_timestamp(3_723_000_000_042), "01:02:03.000000042");
/// ```
pub fn format_timestamp(nanos: u64) -> String {
    let (hours, minutes, seconds) = split_seconds(nanos / NANOS_PER_SECOND);
    format!(
        "{hours:02}:{minutes:02}:{seconds:02}.{:09}",
        nanos % NANOS_PER_SECOND
    )
}

/// Formats nanoseconds with millisecond precision for display.
pub fn format_timestamp_millis(nanos: u64) -> String {
    let millis = nanos / 1_000_000;
    let (hours, minutes, seconds) = split_seconds(millis / 1000);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{:03}", millis % 1000)
}

fn split_seconds(total: u64) -> (u64, u64, u64) {
    (total / 3600, total / 60 % 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::{format_timestamp, format_timestamp_millis, parse_timestamp};
    use crate::EngineError;

    #[test]
    fn parse_without_fraction() {
        assert_eq!(
            parse_timestamp("01:00:00").expect("valid"),
            3_600_000_000_000
        );
    }

    #[test]
    fn parse_pads_short_fraction_to_nanoseconds() {
        assert_eq!(parse_timestamp("00:00:01.25").expect("valid"), 1_250_000_000);
        assert_eq!(
            parse_timestamp("00:00:00.000000001").expect("valid"),
            1
        );
    }

    #[test]
    fn parse_accepts_hours_beyond_two_digits() {
        assert_eq!(
            parse_timestamp("100:00:00").expect("valid"),
            360_000 * 1_000_000_000
        );
    }

    #[test]
    fn parse_rejects_malformed_values() {
        for input in [
            "",
            "00:00",
            "00:00:00:00",
            "aa:00:00",
            "00:-1:00",
            "00:00:00.",
            "00:00:00.1234567890",
            "00:00:0x",
        ] {
            let result = parse_timestamp(input);
            assert!(
                matches!(result, Err(EngineError::UnparsableTimestamp { .. })),
                "{input:?} must be rejected"
            );
        }
    }

    #[test]
    fn format_uses_nine_fraction_digits() {
        assert_eq!(format_timestamp(0), "00:00:00.000000000");
        assert_eq!(format_timestamp(90_500_000_000), "00:01:30.500000000");
    }

    #[test]
    fn format_millis_truncates_below_a_millisecond() {
        assert_eq!(format_timestamp_millis(3_723_456_999_999), "01:02:03.456");
    }

    #[test]
    fn formatted_timestamps_parse_back() {
        let nanos = 5_025_123_456_789;
        assert_eq!(
            parse_timestamp(&format_timestamp(nanos)).expect("valid"),
            nanos
        );
    }
}
