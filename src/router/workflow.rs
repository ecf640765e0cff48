//! Routing Workflow - 2노드 결정 그래프
//!
//! START에서 분류기를 호출해 다음 노드를 고르고, 선택된 노드 하나만 실행한 뒤 END로 갑니다.
//! 재시도나 폴백은 없습니다. 협력자 오류는 그대로 전파됩니다.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::knowledge::{Document, Retriever};
use crate::wiki::ReferenceSearch;

use super::classifier::Classifier;
use super::state::{Retrieval, Step, WorkflowState};
use super::RouteLabel;

/// 라우팅 지시문 (system 프롬프트)
pub const ROUTER_INSTRUCTION: &str = "You are an expert at routing user questions. \
The vectorstore contains documents about agents, prompt engineering, and adversarial attacks. \
Use vectorstore for these topics. Otherwise, use wiki-search.";

/// 그래프 노드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    /// 벡터 저장소 검색
    Retrieve,
    /// Wikipedia 검색
    WikiSearch,
}

impl Node {
    pub fn name(&self) -> &'static str {
        match self {
            Node::Retrieve => "retrieve",
            Node::WikiSearch => "wiki_search",
        }
    }
}

impl From<RouteLabel> for Node {
    fn from(label: RouteLabel) -> Self {
        match label {
            RouteLabel::VectorStore => Node::Retrieve,
            RouteLabel::WikiSearch => Node::WikiSearch,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 워크플로우 실행 인터페이스
///
/// 방출된 단계를 순서대로 모두 반환합니다.
#[async_trait]
pub trait Workflow: Send + Sync {
    async fn stream(&self, question: &str) -> Result<Vec<Step>>;
}

/// 분류기 → {retrieve | wiki_search} → END
pub struct RoutingWorkflow {
    classifier: Arc<dyn Classifier>,
    retriever: Arc<dyn Retriever>,
    reference: Arc<dyn ReferenceSearch>,
}

impl RoutingWorkflow {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        retriever: Arc<dyn Retriever>,
        reference: Arc<dyn ReferenceSearch>,
    ) -> Self {
        Self {
            classifier,
            retriever,
            reference,
        }
    }

    /// 조건부 엣지: 분류기 레이블만으로 다음 노드 결정
    pub async fn route_question(&self, state: &WorkflowState) -> Result<RouteLabel> {
        self.classifier
            .classify(&state.question, ROUTER_INSTRUCTION)
            .await
            .context("Failed to route question")
    }

    /// retrieve 노드
    async fn retrieve(&self, state: WorkflowState) -> Result<WorkflowState> {
        let documents = self.retriever.retrieve(&state.question).await?;
        tracing::debug!("retrieve: {} documents", documents.len());
        Ok(state.with_documents(Retrieval::Documents(documents)))
    }

    /// wiki_search 노드
    async fn wiki_search(&self, state: WorkflowState) -> Result<WorkflowState> {
        let snippet = self.reference.search(&state.question).await?;
        tracing::debug!("wiki_search: {} chars", snippet.chars().count());
        Ok(state.with_documents(Retrieval::Snippet(Document::new(snippet))))
    }

    async fn run_node(&self, node: Node, state: WorkflowState) -> Result<WorkflowState> {
        match node {
            Node::Retrieve => self.retrieve(state).await,
            Node::WikiSearch => self.wiki_search(state).await,
        }
    }
}

#[async_trait]
impl Workflow for RoutingWorkflow {
    async fn stream(&self, question: &str) -> Result<Vec<Step>> {
        let state = WorkflowState::new(question);

        let label = self.route_question(&state).await?;
        let node = Node::from(label);
        tracing::info!("Routing question to {}", node);

        let state = self.run_node(node, state).await?;

        // 두 노드 모두 END로 직행
        Ok(vec![Step { node, state }])
    }
}

// ============================================================================
// Tests
// ============================================================================
