//! Free-text number extraction for executor outputs
//!
//! Executors report confidence and cost as text. Both parsers return `None`
//! when nothing usable is found and leave the default to the caller.

use std::sync::OnceLock;

use regex::Regex;

/// Confidence assumed when the output has none or it cannot be read
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Cost assumed for a paid call whose output reports none
pub const DEFAULT_REPORTED_COST: f64 = 0.02;

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(%)?").expect("must be valid regex"))
}

fn dollar_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$?\s*(\d+(?:\.\d+)?)").expect("must be valid regex"))
}

/// Read a confidence in `[0, 1]` from text like `0.85`, `85%` or `85`
///
/// The first number wins. Values above 1 (or with a percent sign) are
/// treated as percentages; anything above 100 is rejected.
pub fn parse_confidence(text: &str) -> Option<f64> {
    let caps = number_regex().captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;

    let value = if caps.get(2).is_some() || value > 1.0 {
        value / 100.0
    } else {
        value
    };

    (0.0..=1.0).contains(&value).then_some(value)
}

/// Read a dollar amount from text like `$0.0123` or `cost: 0.5`
pub fn parse_dollars(text: &str) -> Option<f64> {
    let caps = dollar_regex().captures(text)?;
    caps.get(1)?.as_str().parse().ok().filter(|v: &f64| v.is_finite())
}
