use std::sync::Arc;

use docchat_core::config::DEFAULT_GREETING;
use docchat_core::{EmbeddingSource, PipelineSettings, Secret, Session, SessionError};
use docchat_llm::any::AnyProvider;
use docchat_llm::mock::MockProvider;
use docchat_llm::provider::{Message, Role};
use docchat_memory::document::loader::fixtures::{pdf_bytes, pptx_bytes};
use docchat_memory::document::{Loaders, SplitterConfig, TextSplitter, UploadedFile};
use uuid::Uuid;

const FEVER: &str = "Patient has a fever of 101F documented on visit 3.";

fn session(mock: &MockProvider, dir: &std::path::Path) -> Session {
    let mock = mock.clone();
    let mut settings = PipelineSettings::new(
        Loaders::default(),
        TextSplitter::new(SplitterConfig::default()).unwrap(),
        EmbeddingSource::Provider,
        Arc::new(move |_key: &Secret| AnyProvider::Mock(mock.clone())),
    );
    settings.upload_dir = dir.to_path_buf();
    Session::new(Uuid::new_v4(), Arc::new(settings), DEFAULT_GREETING)
}

fn system_prompt(call: &[Message]) -> &str {
    call.iter()
        .find(|m| m.role == Role::System)
        .map_or("", |m| m.content.as_str())
}

#[tokio::test]
async fn pdf_answer_cites_uploaded_file() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::with_responses(vec!["The patient had a fever of 101F.".into()]);
    let mut s = session(&mock, dir.path());

    let summary = s
        .process(
            &Secret::new("sk-test"),
            &[UploadedFile::new("visit.pdf", pdf_bytes(&[FEVER]))],
        )
        .await
        .unwrap();
    assert_eq!(summary.documents, 1);
    assert!(s.is_ready());

    let reply = s.ask("What was the patient's temperature?").await.unwrap();
    assert_eq!(reply.answer, "The patient had a fever of 101F.");
    assert!(!reply.citations.is_empty());
    assert_eq!(reply.citations[0].source, "visit.pdf");
    assert!(reply.citations[0].content.contains("101F"));

    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert!(system_prompt(&calls[0]).contains("101F"));
}

#[tokio::test]
async fn process_without_key_stays_idle() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::default();
    let mut s = session(&mock, dir.path());

    let err = s
        .process(
            &Secret::new("   "),
            &[UploadedFile::new("visit.pdf", pdf_bytes(&[FEVER]))],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::MissingCredential));
    assert!(!s.is_ready());
    assert!(!s.process_complete());
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn follow_up_question_is_condensed_with_history() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::with_responses(vec![
        "The patient had a fever.".into(),
        "What was the patient's fever on visit 3?".into(),
        "It was 101F.".into(),
    ]);
    let mut s = session(&mock, dir.path());
    s.process(
        &Secret::new("sk-test"),
        &[
            UploadedFile::new("visit.pdf", pdf_bytes(&[FEVER])),
            UploadedFile::new(
                "parking.pptx",
                pptx_bytes(&[&["Clinic parking opens at eight."]]),
            ),
        ],
    )
    .await
    .unwrap();

    s.ask("What symptom did the patient have?").await.unwrap();
    let reply = s.ask("How high was it?").await.unwrap();
    assert_eq!(reply.answer, "It was 101F.");
    assert_eq!(reply.citations[0].source, "visit.pdf");

    let calls = mock.calls();
    assert_eq!(calls.len(), 3);
    let condense = &calls[1].last().unwrap().content;
    assert!(condense.contains("Human: What symptom did the patient have?"));
    assert!(condense.contains("Assistant: The patient had a fever."));
    assert!(condense.contains("Follow Up Input: How high was it?"));
    assert_eq!(s.chat_history().len(), 2);
}

#[tokio::test]
async fn ask_while_idle_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::default();
    let mut s = session(&mock, dir.path());

    let err = s.ask("What was the patient's temperature?").await.unwrap_err();
    assert!(matches!(err, SessionError::NotReady));
    assert_eq!(s.messages().len(), 1);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn unsupported_upload_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = session(&MockProvider::default(), dir.path());

    let summary = s
        .process(
            &Secret::new("sk-test"),
            &[
                UploadedFile::new("scan.png", vec![0x89, b'P', b'N', b'G']),
                UploadedFile::new("visit.pdf", pdf_bytes(&[FEVER])),
            ],
        )
        .await
        .unwrap();
    assert_eq!(summary.documents, 1);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].name, "scan.png");
}
