use std::io::Read;
use std::path::Path;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ProcessError;
use crate::processor::{DocumentFormat, DocumentProcessor};

pub struct DocxProcessor;

impl DocxProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for DocxProcessor {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        let xml = read_main_part(path)?;
        let text = body_text(&xml)?;
        Ok(text.trim().to_string())
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Docx)
    }
}

/// Main document part inside the OOXML package.
const MAIN_PART: &str = "word/document.xml";

fn docx_error(context: &str, e: impl std::fmt::Display) -> ProcessError {
    ProcessError::DocxProcessing(format!("{}: {}", context, e))
}

fn read_main_part(path: &Path) -> Result<String, ProcessError> {
    let file = std::fs::File::open(path).map_err(|e| ProcessError::ReadDocument {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut package =
        zip::ZipArchive::new(file).map_err(|e| docx_error("Failed to open DOCX", e))?;
    let mut part = package
        .by_name(MAIN_PART)
        .map_err(|e| docx_error("Missing main document part", e))?;

    let mut xml = String::with_capacity(part.size() as usize);
    part.read_to_string(&mut xml)
        .map_err(|e| docx_error("Failed to read main document part", e))?;
    Ok(xml)
}

/// Text of the WordprocessingML body: `<w:t>` runs concatenated, `<w:tab/>`
/// as a tab, `<w:br/>` and paragraph ends as newlines.
fn body_text(xml: &str) -> Result<String, ProcessError> {
    let mut reader = Reader::from_str(xml);

    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_run_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_run_text => match e.decode() {
                Ok(run) => text.push_str(&run),
                Err(err) => log::debug!("Skipping undecodable DOCX run: {}", err),
            },
            // Entity references arrive as their own events
            Ok(Event::GeneralRef(r)) if in_run_text => {
                if let Ok(Some(ch)) = r.resolve_char_ref() {
                    text.push(ch);
                } else if let Ok(name) = r.decode() {
                    if let Some(value) = resolve_predefined_entity(&name) {
                        text.push_str(value);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(docx_error("XML parsing error", e)),
            _ => {}
        }
    }

    Ok(text)
}
