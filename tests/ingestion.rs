use docchat_llm::any::AnyProvider;
use docchat_llm::mock::MockProvider;
use docchat_memory::MmrConfig;
use docchat_memory::document::loader::fixtures::{docx_bytes, pdf_bytes, pptx_bytes};
use docchat_memory::document::{
    DEFAULT_MAX_FILE_SIZE, IngestionPipeline, Loaders, SplitterConfig, TextSplitter,
};

fn long_paragraphs(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("Paragraph p{i} records observation o{i} with marker m{i}."))
        .collect()
}

#[tokio::test]
async fn directory_to_index_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let paragraphs = long_paragraphs(400);
    let refs: Vec<&str> = paragraphs.iter().map(String::as_str).collect();

    std::fs::write(dir.path().join("chart.docx"), docx_bytes(&refs)).unwrap();
    std::fs::write(
        dir.path().join("visit.pdf"),
        pdf_bytes(&["Patient has a fever of 101F documented on visit 3."]),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("rounds.pptx"),
        pptx_bytes(&[&["Morning rounds", "Ward B"], &["Discharge checklist", "Ward C"]]),
    )
    .unwrap();
    std::fs::write(dir.path().join("readme.md"), "# not indexed").unwrap();

    let loaders = Loaders::new(DEFAULT_MAX_FILE_SIZE, 8000);
    let report = loaders.load_directory(dir.path()).await.unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "readme.md");
    for name in ["chart.docx", "visit.pdf", "rounds.pptx"] {
        assert!(
            report
                .documents
                .iter()
                .any(|d| d.metadata.source == name && !d.content.trim().is_empty()),
            "no text from {name}"
        );
    }

    let splitter = TextSplitter::new(SplitterConfig::default()).unwrap();
    let embed_fn = AnyProvider::Mock(MockProvider::default()).embed_fn();
    let pipeline = IngestionPipeline::new(splitter.clone(), embed_fn.clone());
    let (index, stats) = pipeline.build_index(&report.documents).await.unwrap();

    assert_eq!(stats.documents, report.documents.len());
    assert!(stats.chunks > stats.documents);
    assert_eq!(index.len(), stats.chunks);

    let docx_chunks: Vec<_> = splitter
        .split_documents(&report.documents)
        .into_iter()
        .filter(|c| c.metadata.source == "chart.docx")
        .collect();
    assert!(docx_chunks.iter().all(|c| c.token_count <= 512));
    assert!(docx_chunks.iter().all(|c| splitter.count_tokens(&c.content) <= 512));

    for chunk in docx_chunks.iter().step_by(7) {
        let query = embed_fn(&chunk.content).await.unwrap();
        let top = index.search(&query, 1).unwrap();
        assert_eq!(top[0].chunk.content, chunk.content);
    }
}

#[tokio::test]
async fn mmr_search_finds_fever_page() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("visit.pdf"),
        pdf_bytes(&[
            "Patient has a fever of 101F documented on visit 3.",
            "Follow up scheduled in two weeks.",
        ]),
    )
    .unwrap();

    let report = Loaders::default().load_directory(dir.path()).await.unwrap();
    assert_eq!(report.documents.len(), 2);
    assert_eq!(report.documents[1].metadata.page, 1);

    let embed_fn = AnyProvider::Mock(MockProvider::default()).embed_fn();
    let pipeline = IngestionPipeline::new(
        TextSplitter::new(SplitterConfig::default()).unwrap(),
        embed_fn.clone(),
    );
    let (index, _) = pipeline.build_index(&report.documents).await.unwrap();

    let query = embed_fn("patient fever visit").await.unwrap();
    let hits = index.search_mmr(&query, &MmrConfig::default()).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].chunk.content.contains("101F"));
    assert_eq!(hits[0].chunk.metadata.source, "visit.pdf");
}
