//! Document text source — the seam to PDF/DOCX converters.
//!
//! Conversion itself is an external concern; the pipeline only needs the
//! raw text of a page selection.

use super::DocumentError;

/// Supplies raw extractable text for a page selection.
pub trait DocumentSource: Send + Sync {
    /// Extract the concatenated text of the given 1-based pages.
    fn extract_text(&self, pages: &[u32]) -> Result<String, DocumentError>;
}

/// Pre-extracted plain text, paginated on form feeds.
///
/// Useful when the caller has already run a converter, and as the test
/// source. A document without form feeds is a single page.
pub struct PlainTextSource {
    pages: Vec<String>,
}

impl PlainTextSource {
    pub fn new(text: &str) -> Self {
        Self {
            pages: text.split('\u{0C}').map(str::to_string).collect(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl DocumentSource for PlainTextSource {
    fn extract_text(&self, pages: &[u32]) -> Result<String, DocumentError> {
        let mut text = String::new();
        for &page in pages {
            let idx = page
                .checked_sub(1)
                .map(|p| p as usize)
                .filter(|&p| p < self.pages.len())
                .ok_or(DocumentError::PageOutOfBounds {
                    page,
                    available: self.pages.len(),
                })?;
            text.push_str(&self.pages[idx]);
            text.push('\n');
        }
        Ok(text)
    }
}
