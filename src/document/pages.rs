//! Page-range grammar: `N`, `N-M`, or `N,M`, whitespace-tolerant.

use std::sync::OnceLock;

use regex::Regex;

use super::DocumentError;

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\d+)\s*(?:[-,]\s*(\d+)\s*)?$").expect("valid page range regex")
    })
}

/// Parse a page-range string into an inclusive, 1-based page list.
///
/// Accepts a single page (`"7"`), a dash range (`"3-4"`), or a comma range
/// (`"5, 12"`). Both endpoints are inclusive.
pub fn parse_page_range(input: &str) -> Result<Vec<u32>, DocumentError> {
    let captures = range_pattern()
        .captures(input)
        .ok_or_else(|| DocumentError::Format(input.to_string()))?;

    let start: u32 = captures[1]
        .parse()
        .map_err(|_| DocumentError::Format(input.to_string()))?;
    let end: u32 = match captures.get(2) {
        Some(m) => m
            .as_str()
            .parse()
            .map_err(|_| DocumentError::Format(input.to_string()))?,
        None => start,
    };

    if start > end {
        return Err(DocumentError::Range { start, end });
    }

    Ok((start..=end).collect())
}
