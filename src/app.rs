//! 애플리케이션 컨텍스트
//!
//! 시작 시 한 번 만들어지는 읽기 전용 구성요소 묶음 (설정, 인덱스, LLM).
//! `ask`와 `chat` 명령이 질문마다 이 컨텍스트로 질의 파이프라인을 실행합니다.

use std::sync::Arc;

use crate::chat::ChatHistory;
use crate::config::{Config, QuerySettings};
use crate::embedding::{get_api_key, warn_missing_api_key, GeminiEmbedding};
use crate::error::Result;
use crate::knowledge::VectorIndex;
use crate::llm::{GeminiLlm, LanguageModel};
use crate::query;

pub struct AppContext {
    settings: QuerySettings,
    index: VectorIndex,
    llm: Box<dyn LanguageModel>,
}

impl AppContext {
    /// 설정 검증 → 임베딩 → 인덱스 → LLM 순서로 로드
    ///
    /// 어느 단계든 실패하면 에러를 그대로 반환합니다 (시작 실패).
    pub async fn load(config: &Config) -> Result<Self> {
        let api_key = get_api_key();
        if api_key.is_none() {
            warn_missing_api_key();
        }
        Self::load_with_api_key(config, api_key).await
    }

    /// 임베딩과 LLM이 같은 API 키를 사용하도록 로드
    ///
    /// 키가 없어도 로드는 성공하고, 첫 질문에서 인증 에러가 납니다.
    pub async fn load_with_api_key(config: &Config, api_key: Option<String>) -> Result<Self> {
        let settings = config.query_settings()?;

        let embedder = GeminiEmbedding::with_api_key(
            &settings.embedding_model_name,
            settings.embedding_dimension,
            api_key.clone(),
        )?;
        let index = VectorIndex::open(&settings.vector_store_path, Arc::new(embedder)).await?;
        let llm = GeminiLlm::with_api_key(&settings.llm_name, settings.llm_timeout, api_key)?;

        tracing::info!("Application context ready (llm: {})", settings.llm_name);
        Ok(Self::from_parts(settings, index, Box::new(llm)))
    }

    pub fn from_parts(
        settings: QuerySettings,
        index: VectorIndex,
        llm: Box<dyn LanguageModel>,
    ) -> Self {
        Self {
            settings,
            index,
            llm,
        }
    }

    /// 설정된 top_k로 질문에 답변
    pub async fn ask(&self, question: &str) -> Result<String> {
        query::answer(question, &self.index, self.llm.as_ref(), self.settings.top_k).await
    }

    /// 설정된 최대 길이의 새 대화 기록
    pub fn new_history(&self) -> ChatHistory {
        ChatHistory::new(self.settings.max_history)
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;
    use crate::extractor::Document;
    use crate::knowledge::{build_index_from_documents, IndexManifest, IngestOptions, VectorEntry};
    use crate::query::NO_CONTEXT_ANSWER;
    use crate::test_support::{HashEmbedding, MockLlm};
    use std::time::Duration;
    use tempfile::TempDir;

    fn settings(path: &std::path::Path) -> QuerySettings {
        QuerySettings {
            embedding_model_name: "hash-embedding".into(),
            embedding_dimension: 16,
            vector_store_path: path.to_path_buf(),
            llm_name: "mock-llm".into(),
            llm_timeout: Duration::from_secs(5),
            top_k: 1,
            max_history: 4,
        }
    }

    #[tokio::test]
    async fn test_load_with_incomplete_config_fails() {
        let config = Config::from_json(r#"{"embedding_model_name": "text-embedding-004"}"#).unwrap();
        let result = AppContext::load(&config).await;
        assert!(matches!(result, Err(RagError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_load_with_missing_index_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_json(&format!(
            r#"{{"embedding_model_name": "text-embedding-004",
                "vector_store_path": {:?},
                "llm_name": "gemini-2.0-flash"}}"#,
            temp_dir.path().join("missing").to_string_lossy()
        ))
        .unwrap();

        let result = AppContext::load(&config).await;
        assert!(matches!(result, Err(RagError::IndexLoad { .. })));
    }

    #[tokio::test]
    async fn test_ask_uses_index_and_llm() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index");
        let docs = vec![Document::new("facts.pdf", "The sky is blue.")];
        let options = IngestOptions {
            chunk_size: 100,
            chunk_overlap: 10,
            recursive: false,
        };
        build_index_from_documents(&docs, &path, &HashEmbedding::default(), &options)
            .await
            .unwrap();

        let index = VectorIndex::open(&path, Arc::new(HashEmbedding::default()))
            .await
            .unwrap();
        let app = AppContext::from_parts(settings(&path), index, Box::new(MockLlm::replying("Blue.")));

        assert_eq!(app.ask("The sky is blue.").await.unwrap(), "Blue.");
        assert_eq!(app.new_history().max(), 4);
        assert_ne!(app.ask("anything").await.unwrap(), NO_CONTEXT_ANSWER);
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_on_first_question() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index");
        let mut embedding = vec![0.0f32; 768];
        embedding[0] = 1.0;
        let entries = vec![VectorEntry {
            source: "doc.pdf".into(),
            page_number: Some(1),
            chunk_index: 0,
            chunk_text: "indexed text".into(),
            embedding,
        }];
        let manifest = IndexManifest {
            embedding_model: "text-embedding-004".into(),
            dimension: 768,
            chunk_size: 100,
            chunk_overlap: 10,
            document_count: 1,
            chunk_count: 1,
            created_at: chrono::Utc::now(),
        };
        VectorIndex::write(&path, &entries, &manifest).await.unwrap();

        let config = Config::from_json(&format!(
            r#"{{"embedding_model_name": "text-embedding-004",
                "vector_store_path": {:?},
                "llm_name": "gemini-2.0-flash"}}"#,
            path.to_string_lossy()
        ))
        .unwrap();

        let app = AppContext::load_with_api_key(&config, None).await.unwrap();
        assert_eq!(app.index().manifest().embedding_model, "text-embedding-004");

        let err = app.ask("What is indexed?").await.unwrap_err();
        assert!(matches!(err, RagError::Authentication(_)));
    }
}
