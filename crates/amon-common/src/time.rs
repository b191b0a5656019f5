//! Relative-time grammar for maintenance windows.
//!
//! `start` accepts an absolute ms-epoch integer or `"now"`. `end` accepts an
//! absolute ms-epoch integer or `"<N>m" | "<N>h" | "<N>d"` (minutes, hours,
//! days from now) with `N` in `[1, 1_000_000]`.

use crate::error::MasterError;
use serde::{Deserialize, Serialize};

pub const MS_PER_MINUTE: i64 = 60 * 1000;
pub const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

const MAX_RELATIVE_N: i64 = 1_000_000;

/// A point in time as it appears on the wire: either absolute milliseconds
/// since the epoch or a shorthand word resolved against "now".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSpec {
    Millis(i64),
    Word(String),
}

impl TimeSpec {
    /// Resolve a window start. `"now"` is the only accepted word.
    pub fn resolve_start(&self, now_ms: i64) -> Result<i64, MasterError> {
        match self {
            TimeSpec::Millis(ms) if *ms > 0 => Ok(*ms),
            TimeSpec::Millis(ms) => Err(MasterError::invalid(format!(
                "invalid \"start\": {ms} is not a positive ms-epoch time"
            ))),
            TimeSpec::Word(w) if w == "now" => Ok(now_ms),
            TimeSpec::Word(w) => Err(MasterError::invalid(format!(
                "invalid \"start\": \"{w}\" (expected ms-epoch integer or \"now\")"
            ))),
        }
    }

    /// Resolve a window end. Words are `"<N>m"`, `"<N>h"` or `"<N>d"`.
    pub fn resolve_end(&self, now_ms: i64) -> Result<i64, MasterError> {
        match self {
            TimeSpec::Millis(ms) if *ms > 0 => Ok(*ms),
            TimeSpec::Millis(ms) => Err(MasterError::invalid(format!(
                "invalid \"end\": {ms} is not a positive ms-epoch time"
            ))),
            TimeSpec::Word(w) => Ok(now_ms + parse_relative(w)?),
        }
    }
}

/// Parse `"<N>m" | "<N>h" | "<N>d"` into a millisecond offset.
pub fn parse_relative(s: &str) -> Result<i64, MasterError> {
    let err = || {
        MasterError::invalid(format!(
            "invalid \"end\": \"{s}\" (expected \"<N>m\", \"<N>h\" or \"<N>d\")"
        ))
    };

    if s.len() < 2 {
        return Err(err());
    }
    let (digits, unit) = s.split_at(s.len() - 1);
    let n: i64 = digits.parse().map_err(|_| err())?;
    if !(1..=MAX_RELATIVE_N).contains(&n) {
        return Err(err());
    }
    let per_unit = match unit {
        "m" => MS_PER_MINUTE,
        "h" => MS_PER_HOUR,
        "d" => MS_PER_DAY,
        _ => return Err(err()),
    };
    Ok(n * per_unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_now_resolves_to_now() {
        let spec = TimeSpec::Word("now".into());
        assert_eq!(spec.resolve_start(1_000_000).unwrap(), 1_000_000);
    }

    #[test]
    fn start_rejects_other_words() {
        let spec = TimeSpec::Word("yesterday".into());
        assert!(spec.resolve_start(1_000_000).is_err());
    }

    #[test]
    fn end_shorthand_units() {
        let now = 1_000_000;
        assert_eq!(
            TimeSpec::Word("1h".into()).resolve_end(now).unwrap(),
            4_600_000
        );
        assert_eq!(
            TimeSpec::Word("5m".into()).resolve_end(now).unwrap(),
            now + 5 * MS_PER_MINUTE
        );
        assert_eq!(
            TimeSpec::Word("2d".into()).resolve_end(now).unwrap(),
            now + 2 * MS_PER_DAY
        );
    }

    #[test]
    fn relative_bounds() {
        assert!(parse_relative("1m").is_ok());
        assert!(parse_relative("1000000m").is_ok());
        assert!(parse_relative("0m").is_err());
        assert!(parse_relative("-1m").is_err());
        assert!(parse_relative("1000001m").is_err());
        assert!(parse_relative("10x").is_err());
        assert!(parse_relative("m").is_err());
        assert!(parse_relative("").is_err());
    }

    #[test]
    fn absolute_times_pass_through() {
        assert_eq!(TimeSpec::Millis(42).resolve_start(0).unwrap(), 42);
        assert_eq!(TimeSpec::Millis(42).resolve_end(0).unwrap(), 42);
        assert!(TimeSpec::Millis(0).resolve_start(0).is_err());
        assert!(TimeSpec::Millis(-5).resolve_end(0).is_err());
    }
}
