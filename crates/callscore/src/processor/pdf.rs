use std::path::Path;

use crate::error::ProcessError;
use crate::processor::{DocumentFormat, DocumentProcessor};

pub struct PdfProcessor {
    max_pages: usize,
}

impl PdfProcessor {
    pub fn new(max_pages: usize) -> Self {
        Self { max_pages }
    }
}

impl DocumentProcessor for PdfProcessor {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.pdf").entered();

        let pdf_bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let doc = lopdf::Document::load_mem(&pdf_bytes)
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

        Ok(extract_text_from_pdf(&doc, self.max_pages))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}

/// Text of the first `max_pages` pages, pages joined by a space and all
/// whitespace runs collapsed.
fn extract_text_from_pdf(doc: &lopdf::Document, max_pages: usize) -> String {
    let mut parts = Vec::new();

    for (page_num, _) in doc.get_pages().into_iter().take(max_pages) {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => parts.push(page_text),
            Err(e) => {
                log::debug!("Skipping unreadable PDF page {}: {}", page_num, e);
                parts.push(String::new());
            }
        }
    }

    collapse_whitespace(&parts.join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
