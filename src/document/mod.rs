pub mod pages;
pub mod source;

pub use pages::parse_page_range;
pub use source::{DocumentSource, PlainTextSource};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Invalid page range format: {0:?}")]
    Format(String),

    #[error("Invalid page range: start page {start} is after end page {end}")]
    Range { start: u32, end: u32 },

    #[error("Page {page} is out of bounds (document has {available} pages)")]
    PageOutOfBounds { page: u32, available: usize },
}
