//! HTTP 서버 모듈
//!
//! - `POST /api/query` : `{"question"}` → `{"response"}`, 실패 시 500 `{"detail"}`
//! - `GET /health`     : `{"status": "ok"}`
//!
//! CORS는 단일 origin만 허용하고 credentials를 켜므로,
//! 메서드/헤더 "전체 허용"은 요청 값을 그대로 되돌려주는 방식으로 표현합니다.

mod error;
mod query;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

pub use error::QueryError;
pub use query::{extract_response, QueryRequest, QueryResponse, QueryService};

// ============================================================================
// Router
// ============================================================================

/// 라우터 구성
pub fn app(service: Arc<QueryService>, cors_origin: &str) -> Result<Router> {
    Ok(Router::new()
        .route("/api/query", post(query))
        .route("/health", get(health))
        .layer(cors_layer(cors_origin)?)
        .with_state(service))
}

fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin: HeaderValue = origin
        .parse()
        .with_context(|| format!("Invalid CORS origin: {}", origin))?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list([origin]))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

/// Handler: POST /api/query
async fn query(
    State(service): State<Arc<QueryService>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, QueryError> {
    tracing::info!("Query: {}", request.question);
    let response = service.process_query(&request.question).await?;
    Ok(Json(response))
}

/// Handler: GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ============================================================================
// Serve
// ============================================================================

/// 주소에 바인딩하고 Ctrl+C까지 요청 처리
pub async fn serve(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::test_support::{
        described, FailingClassifier, FixedClassifier, StubReference, StubRetriever,
    };
    use crate::router::{RouteLabel, RoutingWorkflow, Step, Workflow};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    const ORIGIN: &str = "http://localhost:3000";

    /// 단계를 하나도 방출하지 않는 워크플로우
    struct SilentWorkflow;

    #[async_trait]
    impl Workflow for SilentWorkflow {
        async fn stream(&self, _question: &str) -> anyhow::Result<Vec<Step>> {
            Ok(vec![])
        }
    }

    fn router_for(workflow: impl Workflow + 'static) -> Router {
        app(Arc::new(QueryService::new(Arc::new(workflow))), ORIGIN).unwrap()
    }

    fn routing(
        label: RouteLabel,
        retriever: Arc<StubRetriever>,
        reference: Arc<StubReference>,
    ) -> Router {
        router_for(RoutingWorkflow::new(
            Arc::new(FixedClassifier(label)),
            retriever,
            reference,
        ))
    }

    async fn post_question(app: Router, question: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/query")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "question": question }).to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_vectorstore_question_returns_description() {
        let retriever = Arc::new(StubRetriever {
            documents: vec![described("Technique for designing LLM inputs.")],
            ..Default::default()
        });
        let reference = Arc::new(StubReference::default());
        let app = routing(RouteLabel::VectorStore, retriever, reference.clone());

        let (status, body) = post_question(app, "What is prompt engineering?").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "response": "Technique for designing LLM inputs." }));
        assert_eq!(reference.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wiki_question_returns_snippet() {
        let retriever = Arc::new(StubRetriever::default());
        let reference = Arc::new(StubReference {
            snippet: "Argentina won the 2022 FIFA World Cup.".to_string(),
            ..Default::default()
        });
        let app = routing(RouteLabel::WikiSearch, retriever.clone(), reference);

        let (status, body) = post_question(app, "Who won the 2022 World Cup?").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "response": "Argentina won the 2022 FIFA World Cup." }));
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_steps_is_server_error() {
        let (status, body) = post_question(router_for(SilentWorkflow), "anything").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "detail": "No response generated" }));
    }

    #[tokio::test]
    async fn test_retriever_failure_is_server_error() {
        let retriever = Arc::new(StubRetriever {
            fail_with: Some("vector store unavailable".to_string()),
            ..Default::default()
        });
        let app = routing(
            RouteLabel::VectorStore,
            retriever,
            Arc::new(StubReference::default()),
        );

        let (status, body) = post_question(app, "What is an agent?").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "detail": "vector store unavailable" }));
    }

    #[tokio::test]
    async fn test_classifier_failure_is_server_error() {
        let retriever = Arc::new(StubRetriever::default());
        let reference = Arc::new(StubReference::default());
        let app = router_for(RoutingWorkflow::new(
            Arc::new(FailingClassifier("groq unavailable".to_string())),
            retriever.clone(),
            reference.clone(),
        ));

        let (status, body) = post_question(app, "What is an agent?").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({ "detail": "Failed to route question: groq unavailable" })
        );
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
        assert_eq!(reference.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reference_failure_is_server_error() {
        let reference = Arc::new(StubReference {
            fail_with: Some("wikipedia unavailable".to_string()),
            ..Default::default()
        });
        let app = routing(
            RouteLabel::WikiSearch,
            Arc::new(StubRetriever::default()),
            reference,
        );

        let (status, body) = post_question(app, "Who won the 2022 World Cup?").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "detail": "wikipedia unavailable" }));
    }

    #[tokio::test]
    async fn test_empty_vector_result() {
        let app = routing(
            RouteLabel::VectorStore,
            Arc::new(StubRetriever::default()),
            Arc::new(StubReference::default()),
        );

        let (status, body) = post_question(app, "What is adversarial prompting?").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "response": "[]" }));
    }

    #[tokio::test]
    async fn test_same_question_same_response() {
        let retriever = Arc::new(StubRetriever {
            documents: vec![described("Agents use LLMs as controllers.")],
            ..Default::default()
        });
        let reference = Arc::new(StubReference::default());
        let app = routing(RouteLabel::VectorStore, retriever.clone(), reference);

        let first = post_question(app.clone(), "What is an agent?").await;
        let second = post_question(app, "What is an agent?").await;

        assert_eq!(first, second);
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_health() {
        let response = router_for(SilentWorkflow)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], br#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/query")
            .header("origin", ORIGIN)
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .body(Body::empty())
            .unwrap();

        let response = router_for(SilentWorkflow).oneshot(request).await.unwrap();
        let headers = response.headers();

        assert_eq!(headers["access-control-allow-origin"], ORIGIN);
        assert_eq!(headers["access-control-allow-credentials"], "true");
        assert_eq!(headers["access-control-allow-methods"], "POST");
        assert_eq!(headers["access-control-allow-headers"], "content-type");
    }

    #[tokio::test]
    async fn test_cors_other_origin_not_allowed() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/query")
            .header("origin", "http://evil.example")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"question":"q"}"#))
            .unwrap();

        let response = router_for(SilentWorkflow).oneshot(request).await.unwrap();
        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_none());
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let service = Arc::new(QueryService::new(Arc::new(SilentWorkflow)));
        assert!(app(service, "bad\norigin").is_err());
    }
}
