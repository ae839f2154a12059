use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// File name the segment was extracted from.
    pub source: String,
    pub content_type: String,
    /// Zero-based page, slide or paragraph-group index within the source.
    pub page: usize,
}

/// One extracted text segment (a page, a slide or a run of paragraphs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk_index: usize,
    pub token_count: usize,
}

/// Raw upload handed over by the browser.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl UploadedFile {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    #[must_use]
    pub fn kind(&self) -> DocumentKind {
        DocumentKind::from_path(Path::new(&self.name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Pptx,
    /// Carries the offending extension (empty when the name has none).
    Unsupported(String),
}

impl DocumentKind {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "pptx" => Self::Pptx,
            _ => Self::Unsupported(ext),
        }
    }

    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Self::Unsupported(_) => "application/octet-stream",
        }
    }
}
