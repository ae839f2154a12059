#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("invalid chunker settings: {0}")]
    InvalidSplitter(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] docchat_llm::LlmError),

    #[error("vector index error: {0}")]
    Index(#[from] crate::vector_store::VectorStoreError),
}
