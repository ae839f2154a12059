pub mod error;
pub mod loader;
pub mod pipeline;
pub mod splitter;
pub mod types;

pub use error::DocumentError;
pub use loader::{
    DocxLoader, LoadReport, Loaders, PdfLoader, PptxLoader, SkippedFile, persist_upload,
};
pub use pipeline::{IngestionPipeline, IngestionStats};
pub use splitter::{SplitterConfig, TextSplitter};
pub use types::{Chunk, Document, DocumentKind, DocumentMetadata, UploadedFile};

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

pub trait DocumentLoader: Send + Sync {
    fn load(
        &self,
        path: &std::path::Path,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>,
    >;
}
