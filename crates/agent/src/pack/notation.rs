//! Series/parallel pack notation.
//!
//! Grammar (case-insensitive), either segment order, at least one present:
//!
//! ```text
//! config  := segment segment?
//! segment := digits ("S" | "P")
//! ```
//!
//! An absent segment defaults to 1, so `"4P"` is one series group of four
//! cells in parallel. Zero counts, duplicate segments and anything else that
//! is not a segment are rejected.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use voltrag_core::PackError;

/// Series and parallel cell counts of a pack, both ≥ 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryConfig {
    pub series: u32,
    pub parallel: u32,
}

impl BatteryConfig {
    pub fn new(series: u32, parallel: u32) -> Result<Self, PackError> {
        if series == 0 || parallel == 0 {
            return Err(PackError::invalid(
                &format!("{series}S{parallel}P"),
                "cell counts must be at least 1",
            ));
        }
        Ok(Self { series, parallel })
    }

    /// S · P, saturating.
    pub fn total_cells(&self) -> u32 {
        self.series.saturating_mul(self.parallel)
    }
}

impl fmt::Display for BatteryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}S{}P", self.series, self.parallel)
    }
}

impl FromStr for BatteryConfig {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Parse a complete notation string such as `"2S3P"`, `"4p"` or `"3S"`.
pub fn parse(input: &str) -> Result<BatteryConfig, PackError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(PackError::invalid(input, "no series or parallel segment"));
    }

    let chars: Vec<char> = text.chars().collect();
    let mut series: Option<u32> = None;
    let mut parallel: Option<u32> = None;
    let mut i = 0;

    while i < chars.len() {
        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return Err(PackError::invalid(
                input,
                format!("expected a cell count at '{}'", chars[start]),
            ));
        }

        let digits: String = chars[start..i].iter().collect();
        let count: u32 = digits
            .parse()
            .map_err(|_| PackError::invalid(input, format!("cell count {digits} is too large")))?;
        if count == 0 {
            return Err(PackError::invalid(input, "cell counts must be at least 1"));
        }

        let slot = match chars.get(i).map(|c| c.to_ascii_uppercase()) {
            Some('S') => &mut series,
            Some('P') => &mut parallel,
            Some(c) => {
                return Err(PackError::invalid(
                    input,
                    format!("expected 'S' or 'P' after {digits}, found '{c}'"),
                ));
            }
            None => {
                return Err(PackError::invalid(
                    input,
                    format!("cell count {digits} is missing its 'S' or 'P' suffix"),
                ));
            }
        };
        if slot.is_some() {
            return Err(PackError::invalid(
                input,
                format!("duplicate '{}' segment", chars[i].to_ascii_uppercase()),
            ));
        }
        *slot = Some(count);
        i += 1;
    }

    BatteryConfig::new(series.unwrap_or(1), parallel.unwrap_or(1))
}

/// Largest series count accepted from a bare `<digits>S` token.
const MAX_LONE_SERIES: u32 = 200;

/// Words that mark a preceding bare `<digits>s` as a series count.
const SERIES_CONTEXT: &[&str] = &["pack", "series", "config", "battery"];

fn candidate_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)\b\d+[sp]\w*").ok())
        .as_ref()
}

fn notation_prefix() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)^\d+[sp]\d+[sp]").ok())
        .as_ref()
}

/// Find the first pack configuration in free text and parse it.
///
/// Tokens carrying both segments are configurations even when malformed
/// (`"2S3PX"` and `"2S0P"` yield an error). A bare series count such as
/// `"30s"` or `"18650s"` counts only with an uppercase `S` and a plausible
/// count, or when followed by a word like "pack" or "series".
///
/// Returns `None` when the text mentions no pack configuration.
pub fn detect(text: &str) -> Option<Result<BatteryConfig, PackError>> {
    let prefix = notation_prefix()?;
    for m in candidate_pattern()?.find_iter(text) {
        let token = m.as_str();
        match parse(token) {
            Ok(config) => {
                if is_bare_series(token) && !bare_series_is_marked(token, &text[m.end()..], config)
                {
                    continue;
                }
                return Some(Ok(config));
            }
            Err(e) if prefix.is_match(token) => return Some(Err(e)),
            Err(_) => continue,
        }
    }
    None
}

/// `<digits>s` with no parallel segment.
fn is_bare_series(token: &str) -> bool {
    token
        .strip_suffix(['s', 'S'])
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

fn bare_series_is_marked(token: &str, rest: &str, config: BatteryConfig) -> bool {
    let next_word = rest
        .trim_start()
        .split(|c: char| !c.is_alphanumeric())
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if SERIES_CONTEXT.iter().any(|w| next_word.starts_with(w)) {
        return true;
    }
    token.ends_with('S') && config.series <= MAX_LONE_SERIES
}
