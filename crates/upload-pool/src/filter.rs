//! Content-type admission filter.

use std::path::Path;

use crate::error::UploadError;

/// MIME type used when the extension is unknown.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Guesses a MIME type from a file name's extension.
pub fn detect_content_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mp3",
        Some("ogg" | "oga") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("m4a") => "audio/mp4",
        Some("mp4") => "video/mp4",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("txt") => "text/plain",
        _ => FALLBACK_CONTENT_TYPE,
    }
}

/// Decides which content types may be submitted.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    allowed: Vec<String>,
}

impl ContentFilter {
    /// Creates a filter from an allowlist. An empty list allows everything.
    pub fn new(allowed: &[String]) -> Self {
        Self {
            allowed: allowed.iter().map(|t| t.trim().to_lowercase()).collect(),
        }
    }

    pub fn allows(&self, content_type: &str) -> bool {
        self.allowed.is_empty()
            || self
                .allowed
                .iter()
                .any(|t| t.eq_ignore_ascii_case(content_type.trim()))
    }

    /// Returns [`UploadError::Unsupported`] for types outside the allowlist.
    pub fn check(&self, content_type: &str) -> Result<(), UploadError> {
        if self.allows(content_type) {
            Ok(())
        } else {
            Err(UploadError::Unsupported(content_type.to_string()))
        }
    }
}
