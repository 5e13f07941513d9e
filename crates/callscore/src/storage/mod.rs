pub mod document;

pub use document::{read_document, write_document, DocumentBackend, FileBackend, MemoryBackend};
