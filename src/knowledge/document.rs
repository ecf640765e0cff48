//! Document - 검색 결과 문서 단위
//!
//! 벡터 저장소와 Wikipedia 검색 양쪽에서 생성되는 공통 문서 타입입니다.
//! 벡터 저장소 문서는 항상 메타데이터 맵을 가지고,
//! Wikipedia 스니펫 문서는 메타데이터가 없습니다.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 메타데이터 맵 (key → JSON 값)
pub type Metadata = Map<String, Value>;

/// 검색된 문서
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// 본문 텍스트
    pub page_content: String,
    /// 구조화된 메타데이터 (description, source, title 등)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Document {
    /// 메타데이터 없는 문서 생성
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: None,
        }
    }

    /// 메타데이터를 가진 문서 생성
    pub fn with_metadata(page_content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Some(metadata),
        }
    }

    /// 구조화된 메타데이터 보유 여부
    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }

    /// 메타데이터의 `description` 필드
    ///
    /// 문자열이 아닌 값은 JSON 텍스트로 렌더링합니다.
    pub fn description(&self) -> Option<String> {
        let value = self.metadata.as_ref()?.get("description")?;
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.page_content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> Metadata {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_description_string() {
        let doc = Document::with_metadata(
            "body",
            meta(json!({"description": "Technique for designing LLM inputs."})),
        );
        assert_eq!(
            doc.description().as_deref(),
            Some("Technique for designing LLM inputs.")
        );
    }

    #[test]
    fn test_description_missing_or_null() {
        let doc = Document::with_metadata("body", meta(json!({"title": "t"})));
        assert!(doc.description().is_none());

        let doc = Document::with_metadata("body", meta(json!({"description": null})));
        assert!(doc.description().is_none());

        let doc = Document::new("no metadata");
        assert!(doc.description().is_none());
        assert!(!doc.has_metadata());
    }

    #[test]
    fn test_description_non_string() {
        let doc = Document::with_metadata("body", meta(json!({"description": 42})));
        assert_eq!(doc.description().as_deref(), Some("42"));
    }

    #[test]
    fn test_display_is_content() {
        let doc = Document::new("Argentina won the 2022 FIFA World Cup.");
        assert_eq!(doc.to_string(), "Argentina won the 2022 FIFA World Cup.");
    }

    #[test]
    fn test_serde_skips_missing_metadata() {
        let doc = Document::new("x");
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json, json!({"page_content": "x"}));

        let parsed: Document = serde_json::from_value(json!({"page_content": "y"})).unwrap();
        assert!(parsed.metadata.is_none());
    }
}
