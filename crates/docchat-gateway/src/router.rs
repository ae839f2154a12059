use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, DefaultBodyLimit};
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::sync::Mutex;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    chat_handler, create_session_handler, delete_session_handler, health_handler, index_handler,
    messages_handler, process_handler,
};
use super::server::AppState;

const MAX_RATE_LIMIT_ENTRIES: usize = 10_000;
const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct RateLimitState {
    limit: u32,
    counters: Arc<Mutex<HashMap<IpAddr, (u32, Instant)>>>,
}

pub(crate) fn build_router(state: AppState, rate_limit: u32, max_body_size: usize) -> Router {
    let rate_state = RateLimitState {
        limit: rate_limit,
        counters: Arc::new(Mutex::new(HashMap::new())),
    };

    let api = Router::new()
        .route("/api/sessions", post(create_session_handler))
        .route(
            "/api/sessions/{id}",
            axum::routing::delete(delete_session_handler),
        )
        .route("/api/sessions/{id}/messages", get(messages_handler))
        .route("/api/sessions/{id}/process", post(process_handler))
        .route("/api/sessions/{id}/chat", post(chat_handler))
        .layer(middleware::from_fn_with_state(
            rate_state,
            rate_limit_middleware,
        ))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size));

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn rate_limit_middleware(
    axum::extract::State(state): axum::extract::State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if state.limit == 0 {
        return next.run(req).await;
    }

    let ip = req
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), |ci| ci.0.ip());

    let now = Instant::now();
    let mut counters = state.counters.lock().await;

    if counters.len() >= MAX_RATE_LIMIT_ENTRIES && !counters.contains_key(&ip) {
        counters.retain(|_, (_, ts)| now.duration_since(*ts) < RATE_WINDOW);
    }

    let entry = counters.entry(ip).or_insert((0, now));
    if now.duration_since(entry.1) >= RATE_WINDOW {
        *entry = (1, now);
    } else {
        entry.0 += 1;
        if entry.0 > state.limit {
            tracing::warn!(%ip, "rate limit exceeded");
            return StatusCode::TOO_MANY_REQUESTS.into_response();
        }
    }
    drop(counters);

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use docchat_llm::mock::MockProvider;
    use docchat_memory::document::loader::fixtures::pdf_bytes;
    use http_body_util::BodyExt;
    use tower::{Service, ServiceExt};

    use super::*;
    use crate::test_support::{multipart_body, test_state};

    const BOUNDARY: &str = "docchat-test-boundary";

    fn app(mock: MockProvider) -> Router {
        build_router(test_state(mock), 0, 10 * 1024 * 1024)
    }

    async fn json(resp: Response) -> serde_json::Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn create_session(app: &mut Router) -> String {
        let req = Request::builder()
            .method("POST")
            .uri("/api/sessions")
            .body(Body::empty())
            .unwrap();
        let resp = app.call(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        json(resp).await["session_id"].as_str().unwrap().to_owned()
    }

    fn process_request(id: &str, api_key: &str, files: &[(&str, Vec<u8>)]) -> Request<Body> {
        let body = multipart_body(BOUNDARY, api_key, files);
        Request::builder()
            .method("POST")
            .uri(format!("/api/sessions/{id}/process"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header("content-length", body.len())
            .body(Body::from(body))
            .unwrap()
    }

    fn chat_request(id: &str, question: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/sessions/{id}/chat"))
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&serde_json::json!({ "question": question })).unwrap(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let resp = app(MockProvider::default())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let json = json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["sessions"], 0);
    }

    #[tokio::test]
    async fn index_serves_chat_page() {
        let resp = app(MockProvider::default())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let content_type = resp.headers()["content-type"].to_str().unwrap().to_owned();
        assert!(content_type.starts_with("text/html"));
    }

    #[tokio::test]
    async fn new_session_has_greeting() {
        let mut app = app(MockProvider::default());
        let id = create_session(&mut app).await;
        let resp = app
            .call(
                Request::builder()
                    .uri(format!("/api/sessions/{id}/messages"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let json = json(resp).await;
        assert_eq!(json["ready"], false);
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "assistant");
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let mut app = app(MockProvider::default());
        for uri in [
            "/api/sessions/not-a-uuid/messages",
            "/api/sessions/00000000-0000-0000-0000-000000000000/messages",
        ] {
            let resp = app
                .call(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
            assert_eq!(json(resp).await["error"], "unknown_session");
        }
    }

    #[tokio::test]
    async fn chat_before_process_is_conflict() {
        let mut app = app(MockProvider::default());
        let id = create_session(&mut app).await;
        let resp = app.call(chat_request(&id, "hello?")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(json(resp).await["error"], "not_ready");
    }

    #[tokio::test]
    async fn process_without_key_is_bad_request() {
        let mut app = app(MockProvider::default());
        let id = create_session(&mut app).await;
        let resp = app
            .call(process_request(
                &id,
                "",
                &[("visit.pdf", pdf_bytes(&["Patient has a fever."]))],
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = json(resp).await;
        assert_eq!(json["error"], "missing_credential");
        assert_eq!(json["message"], "Please add your OpenAI API key to continue.");
    }

    #[tokio::test]
    async fn process_then_chat() {
        let mock = MockProvider::with_responses(vec!["The fever was 101F.".into()]);
        let mut app = app(mock);
        let id = create_session(&mut app).await;

        let resp = app
            .call(process_request(
                &id,
                "sk-test",
                &[
                    (
                        "visit.pdf",
                        pdf_bytes(&["Patient has a fever of 101F documented on visit 3."]),
                    ),
                    ("notes.txt", b"plain".to_vec()),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let summary = json(resp).await;
        assert_eq!(summary["documents"], 1);
        assert_eq!(summary["chunks"], 1);
        assert_eq!(summary["skipped"][0]["name"], "notes.txt");

        let resp = app
            .call(chat_request(&id, "What was the patient's temperature?"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let reply = json(resp).await;
        assert_eq!(reply["answer"], "The fever was 101F.");
        assert_eq!(reply["no_sources"], false);
        assert_eq!(reply["citations"][0]["label"], "문서 1: visit.pdf");
        assert_eq!(reply["citations"][0]["source"], "visit.pdf");
    }

    #[tokio::test]
    async fn upstream_failure_is_bad_gateway() {
        let mut app = app(MockProvider::failing());
        let id = create_session(&mut app).await;
        let resp = app
            .call(process_request(
                &id,
                "sk-test",
                &[("visit.pdf", pdf_bytes(&["Patient has a fever."]))],
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = app.call(chat_request(&id, "temperature?")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json(resp).await["error"], "upstream");
    }

    #[tokio::test]
    async fn rejected_key_is_unauthorized() {
        let mut app = app(MockProvider::rejecting_credentials());
        let id = create_session(&mut app).await;
        let resp = app
            .call(process_request(
                &id,
                "sk-bad",
                &[("visit.pdf", pdf_bytes(&["text"]))],
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn delete_tears_session_down() {
        let mut app = app(MockProvider::default());
        let id = create_session(&mut app).await;
        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/sessions/{id}"))
                .body(Body::empty())
                .unwrap()
        };
        let resp = app.call(delete()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = app.call(delete()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rate_limit_enforced() {
        let mut app = build_router(test_state(MockProvider::default()), 2, 1_048_576);
        let make_req = || {
            Request::builder()
                .method("POST")
                .uri("/api/sessions")
                .body(Body::empty())
                .unwrap()
        };

        let resp = app.call(make_req()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let resp = app.call(make_req()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let resp = app.call(make_req()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn health_is_not_rate_limited() {
        let mut app = build_router(test_state(MockProvider::default()), 1, 1_048_576);
        for _ in 0..3 {
            let resp = app
                .call(Request::builder().uri("/health").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), 200);
        }
    }

    #[tokio::test]
    async fn body_size_limit() {
        let mut app = build_router(test_state(MockProvider::default()), 0, 256);
        let id = create_session(&mut app).await;
        let resp = app
            .call(process_request(
                &id,
                "sk-test",
                &[("big.pdf", vec![b'a'; 4096])],
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
