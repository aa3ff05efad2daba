use crate::error::DocumentParseError;
use std::panic::{self, AssertUnwindSafe};

/// Turns raw document bytes into page text.
pub trait TextExtractor: Send + Sync {
    /// Text of every page, in document order. Image-only pages come back as
    /// empty strings.
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, DocumentParseError>;

    /// All pages concatenated in order, with no separator added.
    fn extract(&self, bytes: &[u8]) -> Result<String, DocumentParseError> {
        Ok(self.extract_pages(bytes)?.concat())
    }
}

/// PDF extractor backed by `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentProcessor;

impl DocumentProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for DocumentProcessor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, DocumentParseError> {
        if bytes.is_empty() {
            return Err(DocumentParseError::new("the file is empty"));
        }

        // pdf-extract panics on some malformed inputs instead of returning an error.
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(bytes)
        }));

        let pages = match result {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => return Err(DocumentParseError::new(e.to_string())),
            Err(_) => {
                return Err(DocumentParseError::new(
                    "the parser aborted on a malformed document",
                ))
            }
        };

        log::info!(
            "Extracted {} pages ({} chars)",
            pages.len(),
            pages.iter().map(|p| p.chars().count()).sum::<usize>()
        );
        Ok(pages)
    }
}

/// The form preview: the first `limit` characters, with `...` appended when
/// anything was cut.
pub fn preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
