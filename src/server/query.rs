//! Query Service - 워크플로우 실행 및 응답 문자열 추출

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::router::{Retrieval, Workflow, WorkflowState};

use super::error::QueryError;

/// `POST /api/query` 요청 본문
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

/// `POST /api/query` 응답 본문
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub response: String,
}

/// 질의 처리 서비스
pub struct QueryService {
    workflow: Arc<dyn Workflow>,
}

impl QueryService {
    pub fn new(workflow: Arc<dyn Workflow>) -> Self {
        Self { workflow }
    }

    /// 질문 하나를 워크플로우 끝까지 실행하고 마지막 단계의 상태로 응답 구성
    pub async fn process_query(&self, question: &str) -> Result<QueryResponse, QueryError> {
        let steps = self.workflow.stream(question).await?;

        let last = steps.into_iter().last().ok_or(QueryError::NoResponse)?;
        tracing::debug!("Final step from node {}", last.node);

        Ok(QueryResponse {
            response: extract_response(&last.state),
        })
    }
}

/// 최종 상태 → 응답 문자열
///
/// 첫 문서에 메타데이터가 있으면 그 `description`,
/// 아니면 `documents` 전체의 텍스트 표현을 사용합니다.
pub fn extract_response(state: &WorkflowState) -> String {
    match &state.documents {
        Some(Retrieval::Documents(docs)) => match docs.first() {
            Some(first) if first.has_metadata() => first.description().unwrap_or_default(),
            _ => Retrieval::Documents(docs.clone()).to_string(),
        },
        Some(snippet @ Retrieval::Snippet(_)) => snippet.to_string(),
        None => "[]".to_string(),
    }
}
