//! 워크플로우 상태
//!
//! 요청마다 새로 만들어지고, 각 노드는 상태를 값으로 받아 새 상태를 반환합니다.

use std::fmt;

use crate::knowledge::Document;

use super::workflow::Node;

/// `documents` 필드 값
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// 벡터 저장소 검색 결과 (0개 이상)
    Documents(Vec<Document>),
    /// Wikipedia 스니펫을 감싼 단일 문서
    Snippet(Document),
}

impl fmt::Display for Retrieval {
    /// 전체 값의 텍스트 표현
    ///
    /// - `Documents([])` → `[]`
    /// - `Documents([..])` → `[content, content]`
    /// - `Snippet(doc)` → 스니펫 본문
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retrieval::Documents(docs) => {
                f.write_str("[")?;
                for (i, doc) in docs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", doc)?;
                }
                f.write_str("]")
            }
            Retrieval::Snippet(doc) => write!(f, "{}", doc),
        }
    }
}

/// 그래프를 따라 전달되는 상태
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowState {
    pub question: String,
    /// 실행된 분기가 한 번만 설정
    pub documents: Option<Retrieval>,
    /// 예약 필드 (답변 생성 단계 없음)
    pub generation: Option<String>,
}

impl WorkflowState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            documents: None,
            generation: None,
        }
    }

    /// `documents`를 설정한 새 상태
    pub fn with_documents(self, documents: Retrieval) -> Self {
        Self {
            documents: Some(documents),
            ..self
        }
    }
}

/// 노드 하나가 실행된 뒤 방출되는 (노드, 상태) 쌍
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub node: Node,
    pub state: WorkflowState,
}
