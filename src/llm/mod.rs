//! LLM 모듈 - Gemini generateContent 호출
//!
//! 렌더링된 프롬프트 하나를 보내고 후보 응답을 그대로 돌려줍니다.
//! 답변 추출은 질의 파이프라인이 담당합니다.
//!
//! ref: https://ai.google.dev/api/generate-content

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::{api_error_message, get_api_key, is_auth_failure, warn_missing_api_key};
use crate::error::{RagError, Result};

/// Gemini API 기본 URL
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

// ============================================================================
// LanguageModel Trait
// ============================================================================

/// 언어 모델 트레이트
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 프롬프트로 응답 생성 (단일 호출, 재시도 없음)
    async fn generate(&self, prompt: &str) -> Result<Generation>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Generation
// ============================================================================

/// 생성 결과 (generateContent 응답)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Generation {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// 후보 응답
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: CandidateContent,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// 콘텐츠 파트 (텍스트 외 파트는 text가 비어 있음)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

impl Generation {
    /// 단일 텍스트 응답으로 생성
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: CandidateContent {
                    parts: vec![Part {
                        text: Some(text.into()),
                    }],
                },
            }],
        }
    }

    /// 첫 번째 후보의 첫 번째 파트 텍스트
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .and_then(|p| p.text.as_deref())
    }
}

// ============================================================================
// Gemini LLM
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

/// Gemini 텍스트 생성 클라이언트
#[derive(Debug)]
pub struct GeminiLlm {
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiLlm {
    /// 모델 로드 (API 키는 환경에서 읽음)
    ///
    /// 키가 없어도 로드는 성공하며 첫 호출에서 인증 에러가 납니다.
    pub fn load(model_name: &str, timeout: Duration) -> Result<Self> {
        let api_key = get_api_key();
        if api_key.is_none() {
            warn_missing_api_key();
        }
        Self::with_api_key(model_name, timeout, api_key)
    }

    /// API 키를 직접 지정하여 생성
    pub fn with_api_key(model_name: &str, timeout: Duration, api_key: Option<String>) -> Result<Self> {
        let name = model_name.trim();
        let model = name.strip_prefix("models/").unwrap_or(name);
        if model.is_empty() {
            return Err(RagError::Configuration("LLM name is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to create HTTP client: {}", e)))?;

        tracing::info!("Loaded LLM {} (timeout: {:?})", model, timeout);

        Ok(Self {
            model: model.to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiLlm {
    async fn generate(&self, prompt: &str) -> Result<Generation> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RagError::Authentication("GEMINI_API_KEY or GOOGLE_AI_API_KEY is not set".into())
        })?;

        let request = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let url = format!("{}/models/{}:generateContent", GEMINI_API_BASE, self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RagError::Generation(format!("request to {} timed out", self.model))
                } else {
                    RagError::Generation(format!("failed to send request: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RagError::Generation(format!("failed to read response body: {}", e)))?;

        if is_auth_failure(status) {
            return Err(RagError::Authentication(api_error_message(status, &body)));
        }
        if !status.is_success() {
            return Err(RagError::Generation(api_error_message(status, &body)));
        }

        parse_generation(&body)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// generateContent 응답 본문 파싱
fn parse_generation(body: &str) -> Result<Generation> {
    serde_json::from_str(body)
        .map_err(|e| RagError::Generation(format!("failed to parse response: {}", e)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generation() {
        let body = r#"{
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "  Paris.\n"}, {"text": "extra"}]},
                 "finishReason": "STOP"},
                {"content": {"parts": [{"text": "second"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 10}
        }"#;
        let generation = parse_generation(body).unwrap();
        assert_eq!(generation.candidates.len(), 2);
        assert_eq!(generation.first_text(), Some("  Paris.\n"));
    }

    #[test]
    fn test_blocked_response_has_no_text() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let generation = parse_generation(body).unwrap();
        assert!(generation.first_text().is_none());
    }

    #[test]
    fn test_invalid_body() {
        assert!(matches!(parse_generation("<html>"), Err(RagError::Generation(_))));
    }

    #[test]
    fn test_empty_name_is_configuration_error() {
        let err = GeminiLlm::with_api_key(" ", Duration::from_secs(1), None).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_missing_key_fails_at_first_call() {
        let llm = GeminiLlm::with_api_key("gemini-2.0-flash", Duration::from_secs(1), None).unwrap();
        assert_eq!(llm.name(), "gemini-2.0-flash");
        let err = llm.generate("hi").await.unwrap_err();
        assert!(matches!(err, RagError::Authentication(_)));
    }
}
