use std::path::Path;
use std::pin::Pin;

use super::super::{Document, DocumentError, DocumentKind, DocumentLoader, DocumentMetadata};
use super::{checked_path, join_error, source_name};

#[derive(Debug, Clone)]
pub struct PdfLoader {
    pub max_file_size: u64,
}

/// Per-page text via lopdf, `None` when lopdf cannot read the file at all.
fn extract_pages(path: &Path) -> Option<Vec<(usize, String)>> {
    let doc = match lopdf::Document::load(path) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!("lopdf could not open {}: {e}", path.display());
            return None;
        }
    };

    let mut pages = Vec::new();
    let mut failures = 0usize;
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    for number in &page_numbers {
        match doc.extract_text(&[*number]) {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    pages.push(((*number as usize).saturating_sub(1), text.to_owned()));
                }
            }
            Err(e) => {
                failures += 1;
                tracing::debug!(page = number, "lopdf text extraction failed: {e}");
            }
        }
    }

    if failures > 0 && failures == page_numbers.len() {
        return None;
    }
    if failures > 0 {
        tracing::warn!(
            failed = failures,
            total = page_numbers.len(),
            "dropped unreadable pages from {}",
            path.display()
        );
    }
    Some(pages)
}

/// Keep lopdf's pages when any carried text, otherwise use `fallback` as a single page.
fn pages_or_fallback(
    pages: Option<Vec<(usize, String)>>,
    path: &Path,
    fallback: impl FnOnce() -> Result<String, DocumentError>,
) -> Result<Vec<(usize, String)>, DocumentError> {
    match pages {
        Some(pages) if !pages.is_empty() => return Ok(pages),
        Some(_) => tracing::warn!(
            "lopdf found no text in {}, falling back to pdf-extract",
            path.display()
        ),
        None => tracing::debug!("falling back to pdf-extract for {}", path.display()),
    }
    let text = fallback()?;
    let text = text.trim();
    Ok(if text.is_empty() {
        Vec::new()
    } else {
        vec![(0, text.to_owned())]
    })
}

fn extract_whole(path: &Path) -> Result<String, DocumentError> {
    pdf_extract::extract_text(path).map_err(|e| DocumentError::Pdf(e.to_string()))
}

impl DocumentLoader for PdfLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = checked_path(&path, max_size).await?;
            let source = source_name(&path);

            let pages = tokio::task::spawn_blocking(move || {
                pages_or_fallback(extract_pages(&path), &path, || extract_whole(&path))
            })
            .await
            .map_err(|e| join_error(&e))??;

            let content_type = DocumentKind::Pdf.content_type().to_owned();
            Ok(pages
                .into_iter()
                .map(|(page, content)| Document {
                    content,
                    metadata: DocumentMetadata {
                        source: source.clone(),
                        content_type: content_type.clone(),
                        page,
                    },
                })
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::pdf_bytes;
    use super::*;

    fn loader() -> PdfLoader {
        PdfLoader {
            max_file_size: crate::document::DEFAULT_MAX_FILE_SIZE,
        }
    }

    #[tokio::test]
    async fn one_document_per_page() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("visit.pdf");
        std::fs::write(
            &file,
            pdf_bytes(&[
                "Patient has a fever of 101F documented on visit 3.",
                "Follow-up scheduled.",
            ]),
        )
        .unwrap();

        let docs = loader().load(&file).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].content.contains("fever of 101F"));
        assert_eq!(docs[0].metadata.page, 0);
        assert_eq!(docs[1].metadata.page, 1);
        assert_eq!(docs[0].metadata.source, "visit.pdf");
        assert_eq!(docs[0].metadata.content_type, "application/pdf");
    }

    #[tokio::test]
    async fn blank_pages_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("blank.pdf");
        std::fs::write(&file, pdf_bytes(&["", "Only text"])).unwrap();

        let docs = loader().load(&file).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.page, 1);
    }

    #[test]
    fn textless_pages_use_fallback() {
        let path = Path::new("scan.pdf");
        let pages = pages_or_fallback(Some(Vec::new()), path, || {
            Ok("  recovered by pdf-extract \n".into())
        })
        .unwrap();
        assert_eq!(pages, vec![(0, "recovered by pdf-extract".to_owned())]);

        let pages = pages_or_fallback(None, path, || Ok("whole text".into())).unwrap();
        assert_eq!(pages, vec![(0, "whole text".to_owned())]);

        let pages = pages_or_fallback(Some(Vec::new()), path, || Ok("   ".into())).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn readable_pages_skip_fallback() {
        let pages = pages_or_fallback(
            Some(vec![(2, "page three".into())]),
            Path::new("visit.pdf"),
            || panic!("fallback must not run"),
        )
        .unwrap();
        assert_eq!(pages, vec![(2, "page three".to_owned())]);
    }

    #[test]
    fn fallback_errors_propagate() {
        let result = pages_or_fallback(Some(Vec::new()), Path::new("bad.pdf"), || {
            Err(DocumentError::Pdf("no text layer".into()))
        });
        assert!(matches!(result, Err(DocumentError::Pdf(_))));
    }

    #[tokio::test]
    async fn garbage_is_a_pdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.pdf");
        std::fs::write(&file, b"%PDF-nonsense").unwrap();
        assert!(loader().load(&file).await.is_err());
    }

    #[tokio::test]
    async fn load_nonexistent_file() {
        let result = loader().load(Path::new("/nonexistent/file.pdf")).await;
        assert!(matches!(result, Err(DocumentError::Io(_))));
    }

    #[tokio::test]
    async fn file_too_large_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.pdf");
        std::fs::write(&file, pdf_bytes(&["x"])).unwrap();
        let loader = PdfLoader { max_file_size: 0 };
        assert!(matches!(
            loader.load(&file).await,
            Err(DocumentError::FileTooLarge(_))
        ));
    }
}
