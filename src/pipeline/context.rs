//! Context window retrieval.
//!
//! Given the raw document text and a chunk's character-number range, find
//! the substring that most plausibly contains those numbered descriptions.
//! Papers format character lists as numbered items ("7. Tail spine ...") or
//! table rows ("|7. ..."), frequently reusing the same integers elsewhere
//! (figure references, state symbols), so matching is by list-marker shape
//! and the window anchors on the occurrence geometry, not the first hit.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Slack added around the located markers, in characters.
///
/// Two variants are in use: `tight` keeps the window close to the markers,
/// `padded` trades tokens for safety against truncated final descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowProfile {
    pub leading_slack: usize,
    pub trailing_slack: usize,
}

impl WindowProfile {
    pub fn tight() -> Self {
        Self {
            leading_slack: 0,
            trailing_slack: 600,
        }
    }

    pub fn padded() -> Self {
        Self {
            leading_slack: 1000,
            trailing_slack: 1000,
        }
    }
}

impl Default for WindowProfile {
    fn default() -> Self {
        Self::padded()
    }
}

#[derive(Debug, Clone, Copy)]
enum MarkerStyle {
    /// "7." at start of text or after whitespace.
    Plain,
    /// "|7." — pipe-delimited table cells.
    Piped,
}

fn plain_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)\.").expect("valid marker regex"))
}

fn piped_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\|(\d+)\.").expect("valid marker regex"))
}

/// Byte positions of every in-range marker occurrence, keyed by number.
fn marker_positions(text: &str, start: u32, end: u32, style: MarkerStyle) -> HashMap<u32, Vec<usize>> {
    let pattern = match style {
        MarkerStyle::Plain => plain_pattern(),
        MarkerStyle::Piped => piped_pattern(),
    };

    let mut positions: HashMap<u32, Vec<usize>> = HashMap::new();
    for captures in pattern.captures_iter(text) {
        let whole = captures.get(0).expect("match 0 always present");

        if matches!(style, MarkerStyle::Plain) {
            let boundary_ok = text[..whole.start()]
                .chars()
                .next_back()
                .map_or(true, char::is_whitespace);
            if !boundary_ok {
                continue;
            }
        }

        let Ok(number) = captures[1].parse::<u32>() else {
            continue;
        };
        if number >= start && number <= end {
            positions.entry(number).or_default().push(whole.start());
        }
    }
    positions
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Extract the window of `text` expected to contain the numbered character
/// descriptions `start..=end`.
///
/// Tries the plain marker style first, then the piped variant. A style is
/// usable only when every number in the range has at least one occurrence.
/// The window runs from the first occurrence of `start`'s marker to the
/// occurrence of `end`'s marker closest to it (which tolerates the same
/// numbers appearing elsewhere in the paper), widened by the profile's
/// slack. When neither style covers the range, the whole text is returned
/// unchanged: over-inclusion is recoverable, truncation is not.
///
/// Pure function of its arguments; idempotent on the fallback path.
pub fn context_window<'a>(text: &'a str, start: u32, end: u32, profile: WindowProfile) -> &'a str {
    for style in [MarkerStyle::Plain, MarkerStyle::Piped] {
        let positions = marker_positions(text, start, end, style);

        let expected = (end - start + 1) as usize;
        if positions.len() < expected {
            continue;
        }

        let start_pos = positions[&start][0];
        let end_pos = closest_occurrence(&positions[&end], start_pos);

        let window_start = floor_char_boundary(text, start_pos.saturating_sub(profile.leading_slack));
        let window_end = ceil_char_boundary(
            text,
            end_pos.saturating_add(profile.trailing_slack).min(text.len()),
        );
        return &text[window_start..window_end];
    }

    text
}

/// The occurrence nearest to `anchor`; equidistant candidates resolve to the
/// later position, keeping the window running forward through the list.
fn closest_occurrence(occurrences: &[usize], anchor: usize) -> usize {
    *occurrences
        .iter()
        .min_by_key(|&&pos| (pos.abs_diff(anchor), std::cmp::Reverse(pos)))
        .expect("coverage check guarantees at least one occurrence")
}
