use std::io::Read;
use std::path::Path;
use std::pin::Pin;

use super::super::{Document, DocumentError, DocumentKind, DocumentLoader, DocumentMetadata};
use super::{checked_path, join_error, source_name, xml};

#[derive(Debug, Clone)]
pub struct DocxLoader {
    pub max_file_size: u64,
    /// A segment is closed once it reaches this many characters.
    pub segment_chars: usize,
}

fn read_document_xml(path: &Path) -> Result<String, DocumentError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut entry = archive.by_name("word/document.xml")?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Group paragraphs into segments of roughly `segment_chars` characters.
fn group_paragraphs(paragraphs: Vec<String>, segment_chars: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    for para in paragraphs {
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&para);
        if current.chars().count() >= segment_chars {
            segments.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

impl DocumentLoader for DocxLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        let segment_chars = self.segment_chars;
        Box::pin(async move {
            let path = checked_path(&path, max_size).await?;
            let source = source_name(&path);

            let paragraphs = tokio::task::spawn_blocking(move || {
                read_document_xml(&path).map(|xml| xml::paragraphs(&xml, "w:t", "w:p"))
            })
            .await
            .map_err(|e| join_error(&e))??;

            let content_type = DocumentKind::Docx.content_type().to_owned();
            Ok(group_paragraphs(paragraphs, segment_chars)
                .into_iter()
                .enumerate()
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
    use super::super::fixtures::docx_bytes;
    use super::*;

    fn loader() -> DocxLoader {
        DocxLoader {
            max_file_size: crate::document::DEFAULT_MAX_FILE_SIZE,
            segment_chars: 2000,
        }
    }

    #[test]
    fn grouping_respects_segment_size() {
        let paras = vec!["aaaa".to_owned(), "bbbb".to_owned(), "cc".to_owned()];
        assert_eq!(group_paragraphs(paras.clone(), 100), vec!["aaaa\nbbbb\ncc"]);
        assert_eq!(group_paragraphs(paras, 8), vec!["aaaa\nbbbb", "cc"]);
    }

    #[tokio::test]
    async fn load_docx_paragraphs() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("memo.docx");
        std::fs::write(&file, docx_bytes(&["Fish &amp; chips", "Line two"])).unwrap();

        let docs = loader().load(&file).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "Fish & chips\nLine two");
        assert_eq!(docs[0].metadata.source, "memo.docx");
        assert_eq!(docs[0].metadata.page, 0);
        assert!(docs[0].metadata.content_type.contains("wordprocessingml"));
    }

    #[tokio::test]
    async fn missing_document_xml_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.docx");
        let mut cursor = std::io::Cursor::new(Vec::new());
        zip::ZipWriter::new(&mut cursor).finish().unwrap();
        std::fs::write(&file, cursor.into_inner()).unwrap();

        let result = loader().load(&file).await;
        assert!(matches!(result, Err(DocumentError::Archive(_))));
    }

    #[tokio::test]
    async fn file_too_large_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.docx");
        std::fs::write(&file, docx_bytes(&["x"])).unwrap();

        let loader = DocxLoader {
            max_file_size: 0,
            segment_chars: 10,
        };
        assert!(matches!(
            loader.load(&file).await,
            Err(DocumentError::FileTooLarge(_))
        ));
    }
}
