//! 임베딩 모듈 - Gemini API를 통한 텍스트 벡터화
//!
//! 인덱스 생성 시와 질의 시 동일한 프로바이더/모델을 사용해야
//! 유사도 점수가 의미를 가집니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = GeminiEmbedding::load("gemini-embedding-001", 768)?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 모델 이름 (인덱스 매니페스트에 기록됨)
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// Gemini API 기본 URL
/// ref: https://ai.google.dev/gemini-api/docs/embeddings
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// 임베딩 요청 타임아웃
const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// 지원하는 임베딩 모델과 허용 차원
const SUPPORTED_MODELS: &[(&str, &[usize])] = &[
    ("gemini-embedding-001", &[768, 1536, 3072]),
    ("text-embedding-004", &[768]),
];

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
    dimension: usize,
}

impl GeminiEmbedding {
    /// 모델 이름과 차원으로 로드 (API 키는 환경에서 읽음)
    pub fn load(model_name: &str, dimension: usize) -> Result<Self> {
        let api_key = get_api_key();
        if api_key.is_none() {
            warn_missing_api_key();
        }
        Self::with_api_key(model_name, dimension, api_key)
    }

    /// API 키를 직접 지정하여 생성
    ///
    /// 키가 없으면 생성은 성공하고 첫 `embed` 호출에서 인증 에러가 납니다.
    pub fn with_api_key(model_name: &str, dimension: usize, api_key: Option<String>) -> Result<Self> {
        let model = resolve_model(model_name, dimension)?;

        let client = reqwest::Client::builder()
            .timeout(EMBED_TIMEOUT)
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to create HTTP client: {}", e)))?;

        tracing::info!("Loaded embedding model {} (dimension: {})", model, dimension);

        Ok(Self {
            model,
            api_key,
            client,
            dimension,
        })
    }

    fn error(&self, message: impl Into<String>) -> RagError {
        RagError::Embedding {
            model: self.model.clone(),
            message: message.into(),
        }
    }
}

/// 모델 이름 정규화 및 검증
///
/// `models/` 접두사는 선택적입니다.
fn resolve_model(model_name: &str, dimension: usize) -> Result<String> {
    let name = model_name.trim();
    let name = name.strip_prefix("models/").unwrap_or(name);

    if name.is_empty() {
        return Err(RagError::Configuration("embedding model name is empty".into()));
    }

    let (model, dims) = SUPPORTED_MODELS
        .iter()
        .find(|(m, _)| *m == name)
        .ok_or_else(|| {
            RagError::Configuration(format!("unknown embedding model: {}", model_name))
        })?;

    if !dims.contains(&dimension) {
        return Err(RagError::Configuration(format!(
            "Invalid dimension {} for {}. Must be one of {:?}",
            dimension, model, dims
        )));
    }

    Ok(model.to_string())
}

/// Gemini API 요청 본문
/// ref: https://ai.google.dev/api/embeddings
#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: &'static str,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

/// 에러 본문에서 사람이 읽을 메시지 추출
pub(crate) fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<GeminiError>(body) {
        Ok(error) => format!("{} ({})", error.error.message, error.error.status),
        Err(_) => format!("{}: {}", status, body),
    }
}

/// 인증 실패 상태 코드 여부
pub(crate) fn is_auth_failure(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // 빈 텍스트 처리
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RagError::Authentication(
                "GEMINI_API_KEY or GOOGLE_AI_API_KEY is not set".into(),
            )
        })?;

        // 문서와 질의 모두 같은 요청 형태
        let request = EmbedRequest {
            model: format!("models/{}", self.model),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: "RETRIEVAL_DOCUMENT",
            output_dimensionality: Some(self.dimension),
        };

        let url = format!("{}/models/{}:embedContent", GEMINI_API_BASE, self.model);

        // API 키는 URL이 아닌 헤더로 전송
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.error(format!("failed to send embedding request: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.error(format!("failed to read response body: {}", e)))?;

        if is_auth_failure(status) {
            return Err(RagError::Authentication(api_error_message(status, &body)));
        }
        if !status.is_success() {
            return Err(self.error(api_error_message(status, &body)));
        }

        let embed_response: EmbedResponse = serde_json::from_str(&body)
            .map_err(|e| self.error(format!("failed to parse embedding response: {}", e)))?;

        let values = embed_response.embedding.values;
        if values.len() != self.dimension {
            return Err(self.error(format!(
                "expected {} dimensions, got {}",
                self.dimension,
                values.len()
            )));
        }

        Ok(values)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Gemini embedContent는 단건 API이므로 순차 처리
        let mut results = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding chunk {}/{}", i + 1, texts.len());
            results.push(self.embed(text).await?);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드
///
/// 로컬 `.env` 파일을 먼저 읽은 뒤 환경변수를 확인합니다.
/// 우선순위:
/// 1. `GEMINI_API_KEY` 환경변수
/// 2. `GOOGLE_AI_API_KEY` 환경변수
pub fn get_api_key() -> Option<String> {
    dotenvy::dotenv().ok();

    for var in ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            if !key.trim().is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Some(key.trim().to_string());
            }
        }
    }

    None
}

/// API 키 누락 경고 (시작 시 한 번)
pub fn warn_missing_api_key() {
    tracing::warn!("No Gemini API key found; set GEMINI_API_KEY or GOOGLE_AI_API_KEY");
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_some()
}

// ============================================================================
// Tests
// ============================================================================
