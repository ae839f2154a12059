mod docx;
mod pdf;
mod pptx;
mod xml;

use std::path::{Path, PathBuf};

use serde::Serialize;

pub use docx::DocxLoader;
pub use pdf::PdfLoader;
pub use pptx::PptxLoader;

use super::{
    DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentKind, DocumentLoader, UploadedFile,
};

/// Default number of characters gathered into one DOCX segment.
pub const DEFAULT_DOCX_SEGMENT_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

impl LoadReport {
    fn skip(&mut self, name: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(file = name, %reason, "skipping file");
        self.skipped.push(SkippedFile {
            name: name.to_owned(),
            reason,
        });
    }

    fn absorb(&mut self, name: &str, result: Result<Vec<Document>, DocumentError>) {
        match result {
            Ok(docs) if docs.is_empty() => self.skip(name, "no extractable text"),
            Ok(docs) => {
                tracing::debug!(file = name, segments = docs.len(), "file loaded");
                self.documents.extend(docs);
            }
            Err(e) => self.skip(name, e.to_string()),
        }
    }
}

/// The closed set of format loaders, one per supported [`DocumentKind`].
#[derive(Debug, Clone)]
pub struct Loaders {
    pdf: PdfLoader,
    docx: DocxLoader,
    pptx: PptxLoader,
    max_file_size: u64,
}

impl Default for Loaders {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE, DEFAULT_DOCX_SEGMENT_CHARS)
    }
}

impl Loaders {
    #[must_use]
    pub fn new(max_file_size: u64, docx_segment_chars: usize) -> Self {
        Self {
            pdf: PdfLoader { max_file_size },
            docx: DocxLoader {
                max_file_size,
                segment_chars: docx_segment_chars.max(1),
            },
            pptx: PptxLoader { max_file_size },
            max_file_size,
        }
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedFormat`] for [`DocumentKind::Unsupported`].
    pub fn for_kind(&self, kind: &DocumentKind) -> Result<&dyn DocumentLoader, DocumentError> {
        match kind {
            DocumentKind::Pdf => Ok(&self.pdf),
            DocumentKind::Docx => Ok(&self.docx),
            DocumentKind::Pptx => Ok(&self.pptx),
            DocumentKind::Unsupported(ext) if ext.is_empty() => Err(
                DocumentError::UnsupportedFormat("file has no extension".into()),
            ),
            DocumentKind::Unsupported(ext) => Err(DocumentError::UnsupportedFormat(format!(".{ext}"))),
        }
    }

    /// Parse a single file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported formats, oversized files and parse failures.
    pub async fn load_path(&self, path: &Path) -> Result<Vec<Document>, DocumentError> {
        let kind = DocumentKind::from_path(path);
        self.for_kind(&kind)?.load(path).await
    }

    /// Persist each upload into `dir` and parse it.
    ///
    /// Failures are per file: unsupported, oversized or unreadable files are
    /// recorded in [`LoadReport::skipped`] and the rest still load.
    ///
    /// # Errors
    ///
    /// Returns an error only if `dir` cannot be created.
    pub async fn load_uploads(
        &self,
        dir: &Path,
        files: &[UploadedFile],
    ) -> Result<LoadReport, DocumentError> {
        tokio::fs::create_dir_all(dir).await?;
        let mut report = LoadReport::default();

        for file in files {
            let kind = file.kind();
            if let Err(e) = self.for_kind(&kind) {
                report.skip(&file.name, e.to_string());
                continue;
            }
            let len = file.bytes.len() as u64;
            if len > self.max_file_size {
                report.skip(&file.name, DocumentError::FileTooLarge(len).to_string());
                continue;
            }
            let path = match persist_upload(dir, file).await {
                Ok(path) => path,
                Err(e) => {
                    report.skip(&file.name, e.to_string());
                    continue;
                }
            };
            let result = self.load_path(&path).await;
            report.absorb(&file.name, result);
        }

        Ok(report)
    }

    /// Parse every supported file directly inside `dir`, in file-name order.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be listed.
    pub async fn load_directory(&self, dir: &Path) -> Result<LoadReport, DocumentError> {
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            if entry.file_type().await?.is_file() {
                entries.push(entry.path());
            }
        }
        entries.sort();

        let mut report = LoadReport::default();
        for path in entries {
            let name = source_name(&path);
            let result = self.load_path(&path).await;
            report.absorb(&name, result);
        }
        Ok(report)
    }
}

/// Only the final component of an uploaded name is kept.
///
/// # Errors
///
/// Returns [`DocumentError::InvalidFileName`] if nothing usable remains.
pub fn sanitize_file_name(name: &str) -> Result<String, DocumentError> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if last.is_empty() || last == "." || last == ".." {
        return Err(DocumentError::InvalidFileName(name.to_owned()));
    }
    Ok(last.to_owned())
}

/// Write the upload to `dir/<file name>`, overwriting any existing file.
///
/// # Errors
///
/// Returns an error if the name is unusable or the write fails.
pub async fn persist_upload(dir: &Path, file: &UploadedFile) -> Result<PathBuf, DocumentError> {
    let name = sanitize_file_name(&file.name)?;
    let path = dir.join(&name);
    tokio::fs::write(&path, &file.bytes).await?;
    tracing::info!("uploaded {name}");
    Ok(path)
}

pub(crate) fn source_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}

/// Resolve `path` and enforce the size limit shared by all loaders.
pub(crate) async fn checked_path(path: &Path, max_size: u64) -> Result<PathBuf, DocumentError> {
    let path = tokio::fs::canonicalize(path).await?;
    let meta = tokio::fs::metadata(&path).await?;
    if meta.len() > max_size {
        return Err(DocumentError::FileTooLarge(meta.len()));
    }
    Ok(path)
}

pub(crate) fn join_error(e: &tokio::task::JoinError) -> DocumentError {
    DocumentError::Io(std::io::Error::other(e.to_string()))
}

/// In-memory PDF, DOCX and PPTX builders for tests.
#[cfg(any(test, feature = "testing"))]
#[allow(clippy::missing_panics_doc)]
pub mod fixtures {
    use std::io::Write;

    /// Minimal DOCX: one `w:p` per paragraph.
    #[must_use]
    pub fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{body}</w:body></w:document>"
        );
        zip_bytes(&[("word/document.xml", xml)])
    }

    /// Minimal PPTX: one slide per entry, one `a:p` per line.
    #[must_use]
    pub fn pptx_bytes(slides: &[&[&str]]) -> Vec<u8> {
        let entries: Vec<(String, String)> = slides
            .iter()
            .enumerate()
            .map(|(i, lines)| {
                let paras: String = lines
                    .iter()
                    .map(|l| format!("<a:p><a:r><a:t>{l}</a:t></a:r></a:p>"))
                    .collect();
                (
                    format!("ppt/slides/slide{}.xml", i + 1),
                    format!("<p:sld><p:cSld><p:spTree><p:sp><p:txBody>{paras}</p:txBody></p:sp></p:spTree></p:cSld></p:sld>"),
                )
            })
            .collect();
        let refs: Vec<(&str, String)> = entries
            .iter()
            .map(|(n, x)| (n.as_str(), x.clone()))
            .collect();
        zip_bytes(&refs)
    }

    fn zip_bytes(entries: &[(&str, String)]) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::FileOptions::default();
            for (name, content) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    /// Single-page PDF per entry with Helvetica text, built with lopdf.
    #[must_use]
    pub fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{Document, Object, Stream, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = i64::try_from(kids.len()).unwrap();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }
}
