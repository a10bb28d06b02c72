//! 설정 모듈 - JSON 설정 파일 로드 및 검증
//!
//! `config.json` 예시:
//! ```json
//! {
//!   "data_path": "data",
//!   "vector_store_path": "vectorstore",
//!   "embedding_model_name": "gemini-embedding-001",
//!   "llm_name": "gemini-2.0-flash",
//!   "chunk_size": 1000,
//!   "chunk_overlap": 200
//! }
//! ```
//!
//! 누락된 키는 경고를 남기고, 해당 설정이 필요한 명령 시작 시점에
//! `ConfigurationError`로 즉시 실패합니다.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// 기본 설정 파일 경로
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// 기본 임베딩 차원
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

/// 기본 검색 개수 (k)
pub const DEFAULT_TOP_K: usize = 1;

/// 대화 기록 최대 길이
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// LLM 호출 타임아웃 (초)
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Raw Config
// ============================================================================

/// 설정 파일 원본 (모든 키 선택적)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub embedding_model_name: Option<String>,
    pub vector_store_path: Option<PathBuf>,
    pub llm_name: Option<String>,
    pub data_path: Option<PathBuf>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub embedding_dimension: Option<usize>,
    pub top_k: Option<usize>,
    pub max_history: Option<usize>,
    pub recursive: Option<bool>,
    pub llm_timeout_secs: Option<u64>,
}

/// 질의 명령(ask, chat)에 필요한 설정
#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub embedding_model_name: String,
    pub embedding_dimension: usize,
    pub vector_store_path: PathBuf,
    pub llm_name: String,
    pub llm_timeout: Duration,
    pub top_k: usize,
    pub max_history: usize,
}

/// 인덱싱 명령(ingest)에 필요한 설정
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub embedding_model_name: String,
    pub embedding_dimension: usize,
    pub vector_store_path: PathBuf,
    pub data_path: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub recursive: bool,
}

impl Config {
    /// 파일에서 설정 로드
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RagError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json(&raw)?;
        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// JSON 문자열에서 설정 파싱
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| RagError::Configuration(format!("invalid config JSON: {}", e)))
    }

    /// 질의용 설정 검증
    pub fn query_settings(&self) -> Result<QuerySettings> {
        let embedding_model_name = required_str("embedding_model_name", &self.embedding_model_name);
        let vector_store_path = required_path("vector_store_path", &self.vector_store_path);
        let llm_name = required_str("llm_name", &self.llm_name);

        let top_k = self.top_k.unwrap_or(DEFAULT_TOP_K);
        if top_k == 0 {
            return Err(RagError::Configuration("top_k must be at least 1".into()));
        }

        Ok(QuerySettings {
            embedding_model_name: embedding_model_name?,
            embedding_dimension: self.embedding_dimension(),
            vector_store_path: vector_store_path?,
            llm_name: llm_name?,
            llm_timeout: Duration::from_secs(
                self.llm_timeout_secs.unwrap_or(DEFAULT_LLM_TIMEOUT_SECS),
            ),
            top_k,
            max_history: self.max_history.unwrap_or(DEFAULT_MAX_HISTORY).max(1),
        })
    }

    /// 인덱싱용 설정 검증
    pub fn ingest_settings(&self) -> Result<IngestSettings> {
        let embedding_model_name = required_str("embedding_model_name", &self.embedding_model_name);
        let vector_store_path = required_path("vector_store_path", &self.vector_store_path);
        let data_path = required_path("data_path", &self.data_path);

        let chunk_size = match self.chunk_size {
            Some(size) if size > 0 => Ok(size),
            _ => Err(missing("chunk_size")),
        };
        // 0은 유효한 오버랩
        let chunk_overlap = self.chunk_overlap.ok_or_else(|| missing("chunk_overlap"));

        Ok(IngestSettings {
            embedding_model_name: embedding_model_name?,
            embedding_dimension: self.embedding_dimension(),
            vector_store_path: vector_store_path?,
            data_path: data_path?,
            chunk_size: chunk_size?,
            chunk_overlap: chunk_overlap?,
            recursive: self.recursive.unwrap_or(false),
        })
    }

    fn embedding_dimension(&self) -> usize {
        self.embedding_dimension.unwrap_or(DEFAULT_EMBEDDING_DIMENSION)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn missing(key: &str) -> RagError {
    tracing::warn!("Missing '{}' in configuration", key);
    RagError::Configuration(format!("missing or empty '{}'", key))
}

fn required_str(key: &str, value: &Option<String>) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(missing(key)),
    }
}

fn required_path(key: &str, value: &Option<PathBuf>) -> Result<PathBuf> {
    match value {
        Some(p) if !p.as_os_str().is_empty() => Ok(p.clone()),
        _ => Err(missing(key)),
    }
}

// ============================================================================
// Tests
// ============================================================================
