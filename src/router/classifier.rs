//! Classifier - LLM 기반 질문 분류
//!
//! Groq(OpenAI 호환) chat completions API에 `RouteQuery` 함수 호출을 강제하여
//! `{"datasource": "vectorstore" | "wiki_search"}` 구조화 출력을 받습니다.
//!
//! ref: https://console.groq.com/docs/tool-use

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::RouteLabel;

/// Groq chat completions 엔드포인트
const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// 기본 모델
pub const DEFAULT_GROQ_MODEL: &str = "gemma2-9b-it";

/// 구조화 출력 함수 이름
const ROUTE_TOOL_NAME: &str = "RouteQuery";

// ============================================================================
// Classifier Trait
// ============================================================================

/// 질문 분류기 트레이트
#[async_trait]
pub trait Classifier: Send + Sync {
    /// 질문과 지시문으로 라우팅 레이블 결정
    async fn classify(&self, question: &str, instruction: &str) -> Result<RouteLabel>;
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    tools: Vec<Value>,
    tool_choice: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

/// 구조화 출력 스키마
#[derive(Debug, Deserialize)]
struct RouteQuery {
    datasource: RouteLabel,
}

/// OpenAI 호환 에러 응답
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// GroqClassifier
// ============================================================================

/// Groq LLM 분류기
pub struct GroqClassifier {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GroqClassifier {
    /// 새 분류기 생성
    ///
    /// # Arguments
    /// * `api_key` - Groq API 키
    /// * `model` - 모델 이름
    pub fn new(api_key: String, model: impl Into<String>) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("Groq API key is empty");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model: model.into(),
            client,
        })
    }

    fn build_request(&self, question: &str, instruction: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: instruction.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: question.to_string(),
                },
            ],
            temperature: 0.0,
            tools: vec![route_tool()],
            tool_choice: json!({
                "type": "function",
                "function": { "name": ROUTE_TOOL_NAME }
            }),
        }
    }
}

/// `RouteQuery` 함수 정의
fn route_tool() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": ROUTE_TOOL_NAME,
            "description": "Route a user query to the most relevant datasource.",
            "parameters": {
                "type": "object",
                "properties": {
                    "datasource": {
                        "type": "string",
                        "enum": ["vectorstore", "wiki_search"],
                        "description": "Route user query to wikipedia or vectorstore."
                    }
                },
                "required": ["datasource"]
            }
        }
    })
}

/// 응답에서 레이블 추출
///
/// 함수 호출 인자를 우선 사용하고, 없으면 본문을 JSON으로 해석합니다.
fn parse_route(response: ChatResponse) -> Result<RouteLabel> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| anyhow::anyhow!("Classifier returned no choices"))?;

    if let Some(call) = message
        .tool_calls
        .iter()
        .find(|c| c.function.name == ROUTE_TOOL_NAME)
    {
        let route: RouteQuery = serde_json::from_str(&call.function.arguments)
            .with_context(|| format!("Invalid RouteQuery arguments: {}", call.function.arguments))?;
        return Ok(route.datasource);
    }

    let content = message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("Classifier returned neither a tool call nor content"))?;

    let route: RouteQuery = serde_json::from_str(content.trim())
        .with_context(|| format!("Unstructured classifier output: {}", content))?;
    Ok(route.datasource)
}

#[async_trait]
impl Classifier for GroqClassifier {
    async fn classify(&self, question: &str, instruction: &str) -> Result<RouteLabel> {
        let request = self.build_request(question, instruction);

        let response = self
            .client
            .post(GROQ_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send classifier request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read classifier response body")?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                anyhow::bail!("Groq API error ({}): {}", status, error.error.message);
            }
            anyhow::bail!("Groq API error ({}): {}", status, body);
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).context("Failed to parse classifier response")?;
        let label = parse_route(parsed)?;

        tracing::debug!("Classifier ({}) routed question to {}", self.model, label);
        Ok(label)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> ChatResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_empty_api_key_rejected() {
        assert!(GroqClassifier::new(String::new(), DEFAULT_GROQ_MODEL).is_err());
    }

    #[test]
    fn test_request_forces_route_tool() {
        let classifier = GroqClassifier::new("gsk_fake".to_string(), DEFAULT_GROQ_MODEL).unwrap();
        let request = classifier.build_request("What is an agent?", "route it");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "gemma2-9b-it");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][0]["content"], "route it");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "What is an agent?");
        assert_eq!(value["tool_choice"]["function"]["name"], "RouteQuery");
        assert_eq!(
            value["tools"][0]["function"]["parameters"]["properties"]["datasource"]["enum"],
            json!(["vectorstore", "wiki_search"])
        );
    }

    #[test]
    fn test_parse_tool_call() {
        let r = response(
            r#"{"choices":[{"message":{"role":"assistant","content":null,
            "tool_calls":[{"id":"call_1","type":"function",
            "function":{"name":"RouteQuery","arguments":"{\"datasource\": \"wiki_search\"}"}}]}}]}"#,
        );
        assert_eq!(parse_route(r).unwrap(), RouteLabel::WikiSearch);
    }

    #[test]
    fn test_parse_content_fallback() {
        let r = response(
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"datasource\":\"vectorstore\"}"}}]}"#,
        );
        assert_eq!(parse_route(r).unwrap(), RouteLabel::VectorStore);
    }

    #[test]
    fn test_parse_invalid_label() {
        let r = response(
            r#"{"choices":[{"message":{"tool_calls":[{"function":{"name":"RouteQuery","arguments":"{\"datasource\":\"google\"}"}}]}}]}"#,
        );
        assert!(parse_route(r).is_err());
    }

    #[test]
    fn test_parse_no_choices() {
        let r = response(r#"{"choices":[]}"#);
        let err = parse_route(r).unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }
}
