//! HTTP 경계 에러

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// 질의 처리 실패
///
/// 모든 변형은 `500 {"detail": message}`로 응답합니다.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// 워크플로우가 단계를 하나도 방출하지 않음
    #[error("No response generated")]
    NoResponse,

    /// 분류기/검색 협력자 실패 (context 체인 포함)
    #[error("{0:#}")]
    Workflow(anyhow::Error),
}

impl From<anyhow::Error> for QueryError {
    fn from(err: anyhow::Error) -> Self {
        QueryError::Workflow(err)
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        tracing::error!("Query failed: {}", detail);

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": detail })),
        )
            .into_response()
    }
}
