use std::io::Read;
use std::path::Path;
use std::pin::Pin;

use super::super::{Document, DocumentError, DocumentKind, DocumentLoader, DocumentMetadata};
use super::{checked_path, join_error, source_name, xml};

#[derive(Debug, Clone)]
pub struct PptxLoader {
    pub max_file_size: u64,
}

/// `ppt/slides/slide12.xml` -> `Some(12)`.
fn slide_number(name: &str) -> Option<usize> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// Slide texts in presentation order, paired with their zero-based index.
fn read_slides(path: &Path) -> Result<Vec<(usize, String)>, DocumentError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut slides: Vec<(usize, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|n| (n, name.to_owned())))
        .collect();
    slides.sort_by_key(|(n, _)| *n);

    let mut out = Vec::with_capacity(slides.len());
    for (number, name) in slides {
        let mut entry = archive.by_name(&name)?;
        let mut slide_xml = String::new();
        entry.read_to_string(&mut slide_xml)?;
        let text = xml::paragraphs(&slide_xml, "a:t", "a:p").join("\n");
        if !text.is_empty() {
            out.push((number.saturating_sub(1), text));
        }
    }
    Ok(out)
}

impl DocumentLoader for PptxLoader {
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

            let slides = tokio::task::spawn_blocking(move || read_slides(&path))
                .await
                .map_err(|e| join_error(&e))??;

            let content_type = DocumentKind::Pptx.content_type().to_owned();
            Ok(slides
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
