//! Core data types that flow through the ingest and query paths.

use serde::Serialize;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// An uploaded file. Consumed by the extractor and then dropped.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Build a document from a file name, inferring the content type from
    /// its extension. Returns `None` for unsupported extensions.
    pub fn from_name(name: impl Into<String>, bytes: Vec<u8>) -> Option<Self> {
        let name = name.into();
        let content_type = content_type_for(&name)?;
        Some(Self::new(name, content_type, bytes))
    }

    /// File name without directories or extension.
    pub fn stem(&self) -> &str {
        let base = self.name.rsplit(['/', '\\']).next().unwrap_or(&self.name);
        match base.rfind('.') {
            Some(0) | None => base,
            Some(pos) => &base[..pos],
        }
    }
}

/// Map a file name to a supported MIME type.
pub fn content_type_for(name: &str) -> Option<&'static str> {
    let ext = name.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "docx" => Some(MIME_DOCX),
        "pptx" => Some(MIME_PPTX),
        "txt" => Some(MIME_TEXT),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        _ => None,
    }
}

/// Per-document facts reported after extraction.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentMetadata {
    pub name: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub page_count: usize,
    pub pages_with_text: usize,
}

/// Concatenated text of every extractable page, in document order.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub documents: Vec<DocumentMetadata>,
    pub pages_total: usize,
    pub pages_skipped: usize,
}

impl ExtractedText {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A bounded-length window of the concatenated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    pub id: String,
    pub index: i64,
    pub text: String,
    /// Char offset of the first character in the concatenated text.
    pub start: usize,
    pub hash: String,
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

/// Model output for a question, plus the context it was given.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredChunk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for("resume.PDF"), Some(MIME_PDF));
        assert_eq!(content_type_for("notes.md"), Some(MIME_MARKDOWN));
        assert_eq!(content_type_for("deck.pptx"), Some(MIME_PPTX));
        assert_eq!(content_type_for("image.png"), None);
        assert_eq!(content_type_for("README"), None);
    }

    #[test]
    fn stem_strips_directories_and_extension() {
        let doc = Document::new("uploads/jane_doe_resume.pdf", MIME_PDF, vec![]);
        assert_eq!(doc.stem(), "jane_doe_resume");
        let hidden = Document::new(".profile", MIME_TEXT, vec![]);
        assert_eq!(hidden.stem(), ".profile");
    }
}
