//! Text import: read transcripts and plain-text sources.
//!
//! Transcripts come from many places (Whisper, OCR, a student's own notes,
//! text pasted out of a PDF viewer), so decoding is lenient: UTF-8 first,
//! then Latin-1, which maps every byte to a character and cannot fail.

use crate::error::StageError;
use std::path::Path;
use tracing::debug;

/// Lower-case phrases that PDF text-extraction tools leave in their output.
const PDF_MARKERS: [&str; 5] = [
    "file_type\": \"pdf\"",
    "extraction_method\": \"pypdf2\"",
    "processed pdf file",
    "extracted from pdf",
    "pdf text extraction",
];

/// Read a text file, falling back to Latin-1 when it is not valid UTF-8.
///
/// A leading byte-order mark is dropped.
pub async fn read_text(path: &Path) -> Result<String, StageError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StageError::MissingInput {
                path: path.to_path_buf(),
            }
        } else {
            StageError::ArtifactWrite {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;
    Ok(decode_text(bytes, path))
}

fn decode_text(bytes: Vec<u8>, path: &Path) -> String {
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            debug!("{} is not UTF-8, decoding as Latin-1", path.display());
            e.into_bytes().iter().map(|&b| char::from(b)).collect()
        }
    };
    match text.strip_prefix('\u{FEFF}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

/// `true` if `text` carries a marker left by PDF text extraction.
pub fn has_pdf_marker(text: &str) -> bool {
    let lower = text.to_lowercase();
    PDF_MARKERS.iter().any(|m| lower.contains(m))
}
