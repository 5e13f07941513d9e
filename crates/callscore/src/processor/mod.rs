pub mod docx;
pub mod pdf;
pub mod text;

use std::path::Path;

use tracing::info_span;

use crate::error::ProcessError;

/// Maximum number of PDF pages decoded for a transcript.
pub const PDF_PAGE_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Docx,
    Pdf,
    Audio,
}

impl DocumentFormat {
    /// Maps a file extension (with or without the leading dot, any case) to
    /// a format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.trim_start_matches('.').to_lowercase();
        match extension.as_str() {
            "txt" | "md" => Some(DocumentFormat::Text),
            "docx" => Some(DocumentFormat::Docx),
            "pdf" => Some(DocumentFormat::Pdf),
            "mp3" | "wav" | "m4a" => Some(DocumentFormat::Audio),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, DocumentFormat::Audio)
    }
}

/// A decoder that turns one document format into plain text.
pub trait DocumentProcessor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ProcessError>;
    fn supports(&self, format: DocumentFormat) -> bool;
}

pub struct ProcessorRegistry {
    processors: Vec<Box<dyn DocumentProcessor>>,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        let processors: Vec<Box<dyn DocumentProcessor>> = vec![
            Box::new(text::TextProcessor::new()),
            Box::new(docx::DocxProcessor::new()),
            Box::new(pdf::PdfProcessor::new(PDF_PAGE_LIMIT)),
        ];

        Self { processors }
    }

    /// True if some decoder can produce text for `format`.
    pub fn has_decoder(&self, format: DocumentFormat) -> bool {
        self.processors.iter().any(|p| p.supports(format))
    }

    /// Decodes the file at `path`, dispatching on its extension.
    pub fn process(&self, path: &Path) -> Result<String, ProcessError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let format = DocumentFormat::from_extension(extension)
            .ok_or_else(|| ProcessError::UnsupportedFormat(extension.to_string()))?;

        self.process_as(path, format)
    }

    /// Decodes the file at `path` as `format`, whatever its own name says.
    pub fn process_as(&self, path: &Path, format: DocumentFormat) -> Result<String, ProcessError> {
        self.processors
            .iter()
            .find(|p| p.supports(format))
            .ok_or_else(|| ProcessError::UnsupportedFormat(format!("{:?}", format)))?
            .extract(path)
    }

    /// Extracted text, or `None` when the format has no decoder, decoding
    /// failed, or nothing but whitespace came out.
    pub fn extract(&self, path: &Path) -> Option<String> {
        self.extract_as(path, DocumentFormat::from_path(path)?)
    }

    /// Like [`extract`](Self::extract), for files whose declared type comes
    /// from somewhere other than `path` (a staged upload, for instance).
    pub fn extract_as(&self, path: &Path, format: DocumentFormat) -> Option<String> {
        let _span = info_span!("processor.extract", path = %path.display()).entered();

        if !self.has_decoder(format) {
            return None;
        }

        match self.process_as(path, format) {
            Ok(text) if text.trim().is_empty() => None,
            Ok(text) => Some(text),
            Err(e) => {
                log::warn!("Text extraction failed for {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_registry_routes_text_format() {
        let registry = ProcessorRegistry::new();

        let mut temp_file = NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(temp_file, "Customer asked about the contract").unwrap();

        let text = registry.extract(temp_file.path()).unwrap();
        assert!(text.contains("Customer asked about the contract"));
    }

    #[test]
    fn test_extract_as_ignores_path_extension() {
        let registry = ProcessorRegistry::new();

        let mut staged = NamedTempFile::new().unwrap();
        write!(staged, "Please send the contract").unwrap();

        assert!(registry.extract(staged.path()).is_none());
        assert_eq!(
            registry
                .extract_as(staged.path(), DocumentFormat::Text)
                .as_deref(),
            Some("Please send the contract")
        );
        assert!(registry
            .extract_as(staged.path(), DocumentFormat::Audio)
            .is_none());
    }

    #[test]
    fn test_registry_routes_md_format() {
        let registry = ProcessorRegistry::new();

        let mut temp_file = NamedTempFile::with_suffix(".MD").unwrap();
        writeln!(temp_file, "# Call notes").unwrap();

        let text = registry.extract(temp_file.path()).unwrap();
        assert!(text.contains("# Call notes"));
    }

    #[test]
    fn test_audio_has_no_text() {
        let registry = ProcessorRegistry::new();

        let temp_file = NamedTempFile::with_suffix(".mp3").unwrap();
        std::fs::write(temp_file.path(), b"ID3 not really audio").unwrap();

        assert!(!registry.has_decoder(DocumentFormat::Audio));
        assert!(registry.extract(temp_file.path()).is_none());
    }

    #[test]
    fn test_unsupported_format_error() {
        let registry = ProcessorRegistry::new();

        let temp_file = NamedTempFile::with_suffix(".xyz").unwrap();
        std::fs::write(temp_file.path(), b"some content").unwrap();

        match registry.process(temp_file.path()) {
            Err(ProcessError::UnsupportedFormat(ext)) => assert_eq!(ext, "xyz"),
            _ => panic!("Expected UnsupportedFormat error"),
        }
        assert!(registry.extract(temp_file.path()).is_none());
    }

    #[test]
    fn test_empty_text_is_absent() {
        let registry = ProcessorRegistry::new();

        let temp_file = NamedTempFile::with_suffix(".txt").unwrap();
        std::fs::write(temp_file.path(), b"  \n\t ").unwrap();

        assert!(registry.extract(temp_file.path()).is_none());
    }

    #[test]
    fn test_malformed_document_is_absent() {
        let registry = ProcessorRegistry::new();

        let temp_file = NamedTempFile::with_suffix(".docx").unwrap();
        std::fs::write(temp_file.path(), b"definitely not a zip archive").unwrap();

        assert!(registry.extract(temp_file.path()).is_none());
    }

    #[test]
    fn test_file_not_found_is_absent() {
        let registry = ProcessorRegistry::new();
        assert!(registry
            .extract(Path::new("/nonexistent/path/file.txt"))
            .is_none());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_extension(".PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("m4a"), Some(DocumentFormat::Audio));
        assert_eq!(DocumentFormat::from_extension(".exe"), None);
        assert!(DocumentFormat::Audio.is_audio());
        assert!(!DocumentFormat::Text.is_audio());
    }
}
