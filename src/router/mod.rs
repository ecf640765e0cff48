//! Router 모듈 - 질문 라우팅 워크플로우
//!
//! ```text
//! START ──route_question──┬─ vectorstore ─► retrieve ────► END
//!                         └─ wiki_search ─► wiki_search ─► END
//! ```
//!
//! - Classifier: LLM이 질문을 `vectorstore` / `wiki_search`로 분류
//! - RoutingWorkflow: 분류 결과에 따라 한 개의 노드만 실행

mod classifier;
mod state;
mod workflow;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Re-exports
pub use classifier::{Classifier, GroqClassifier, DEFAULT_GROQ_MODEL};
pub use state::{Retrieval, Step, WorkflowState};
pub use workflow::{Node, RoutingWorkflow, Workflow, ROUTER_INSTRUCTION};

#[cfg(test)]
pub(crate) use workflow::tests as test_support;

/// 라우팅 레이블 (데이터 소스)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteLabel {
    /// 벡터 저장소 (agents, prompt engineering, adversarial attacks)
    #[serde(rename = "vectorstore")]
    VectorStore,
    /// Wikipedia 검색
    #[serde(rename = "wiki_search")]
    WikiSearch,
}

impl RouteLabel {
    /// 와이어 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteLabel::VectorStore => "vectorstore",
            RouteLabel::WikiSearch => "wiki_search",
        }
    }
}

impl fmt::Display for RouteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteLabel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vectorstore" => Ok(RouteLabel::VectorStore),
            "wiki_search" => Ok(RouteLabel::WikiSearch),
            other => anyhow::bail!("Unknown route label: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_label_wire_names() {
        assert_eq!(
            serde_json::to_string(&RouteLabel::VectorStore).unwrap(),
            "\"vectorstore\""
        );
        let label: RouteLabel = serde_json::from_str("\"wiki_search\"").unwrap();
        assert_eq!(label, RouteLabel::WikiSearch);
        assert!(serde_json::from_str::<RouteLabel>("\"web\"").is_err());
    }

    #[test]
    fn test_route_label_from_str() {
        assert_eq!("VectorStore".parse::<RouteLabel>().unwrap(), RouteLabel::VectorStore);
        assert_eq!(" wiki_search ".parse::<RouteLabel>().unwrap(), RouteLabel::WikiSearch);
        assert!("wikipedia".parse::<RouteLabel>().is_err());
    }
}
