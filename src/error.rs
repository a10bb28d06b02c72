//! 에러 타입
//!
//! 시작 단계 에러(설정, 인덱스 로드)는 치명적이고,
//! 질의 단계 에러(검색, 생성)는 해당 턴에서만 처리됩니다.

use std::path::PathBuf;

use thiserror::Error;

/// 질의응답 봇 에러
#[derive(Debug, Error)]
pub enum RagError {
    /// 설정 키 누락 또는 잘못된 값
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 원본 디렉토리 없음
    #[error("Source directory not found: {}", .0.display())]
    NotFound(PathBuf),

    /// 인덱싱할 입력 없음
    #[error("No input to index from {source_label}: {reason}")]
    EmptyInput { source_label: String, reason: String },

    /// 청킹 파라미터 불일치
    #[error("Invalid chunking configuration: chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})")]
    InvalidConfiguration {
        chunk_size: usize,
        chunk_overlap: usize,
    },

    /// 벡터 인덱스 열기 실패
    #[error("Failed to load vector index from {}: {message}", path.display())]
    IndexLoad { path: PathBuf, message: String },

    /// API 키 없음 또는 거부됨
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// 컨텍스트 검색 실패
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// LLM 응답 생성 실패
    #[error("Generation failed: {0}")]
    Generation(String),

    /// 임베딩 API 실패
    #[error("Embedding failed ({model}): {message}")]
    Embedding { model: String, message: String },

    /// PDF 텍스트 추출 실패
    #[error("Failed to extract text from {}: {message}", path.display())]
    Extraction { path: PathBuf, message: String },

    /// 벡터 저장소 쓰기/읽기 실패
    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// 시작 단계에서만 발생하는 치명적 에러인지 여부
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RagError::Configuration(_)
                | RagError::NotFound(_)
                | RagError::EmptyInput { .. }
                | RagError::InvalidConfiguration { .. }
                | RagError::IndexLoad { .. }
        )
    }
}

/// 크레이트 공통 Result
pub type Result<T> = std::result::Result<T, RagError>;
