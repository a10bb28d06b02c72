//! Vector Index - 영속 인덱스 핸들
//!
//! LanceDB 테이블과 매니페스트(`index.json`)로 구성된 디렉토리를 다룹니다.
//! 매니페스트에는 인덱스를 만든 임베딩 모델이 기록되며,
//! 다른 모델로 열려고 하면 실패합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::query::{RetrievedChunk, Retriever};

use super::lance::LanceVectorStore;
use super::vector::{VectorEntry, VectorStore};

/// 매니페스트 파일 이름
pub const MANIFEST_FILE: &str = "index.json";

// ============================================================================
// Manifest
// ============================================================================

/// 인덱스 매니페스트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub document_count: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

impl IndexManifest {
    fn read(path: &Path) -> Result<Self> {
        let manifest_path = path.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&manifest_path).map_err(|e| RagError::IndexLoad {
            path: path.to_path_buf(),
            message: format!("cannot read {}: {}", MANIFEST_FILE, e),
        })?;
        serde_json::from_str(&raw).map_err(|e| RagError::IndexLoad {
            path: path.to_path_buf(),
            message: format!("invalid {}: {}", MANIFEST_FILE, e),
        })
    }

    fn write(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| RagError::VectorStore(format!("failed to encode manifest: {}", e)))?;
        std::fs::write(path.join(MANIFEST_FILE), raw)?;
        Ok(())
    }
}

// ============================================================================
// VectorIndex
// ============================================================================

/// 벡터 인덱스 핸들
///
/// 질의 단계에서는 읽기 전용으로 사용됩니다.
pub struct VectorIndex {
    path: PathBuf,
    store: LanceVectorStore,
    embedder: Arc<dyn EmbeddingProvider>,
    manifest: IndexManifest,
}

impl VectorIndex {
    /// 기존 인덱스 열기
    ///
    /// 경로가 없거나, 매니페스트/테이블이 없거나,
    /// 임베딩 모델이 다르면 `IndexLoad` 에러를 반환합니다.
    pub async fn open(path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let load_error = |message: String| RagError::IndexLoad {
            path: path.to_path_buf(),
            message,
        };

        if !path.is_dir() {
            return Err(load_error("directory does not exist".into()));
        }

        let manifest = IndexManifest::read(path)?;

        if manifest.embedding_model != embedder.name() || manifest.dimension != embedder.dimension()
        {
            return Err(load_error(format!(
                "index was built with {} ({} dims) but {} ({} dims) is configured",
                manifest.embedding_model,
                manifest.dimension,
                embedder.name(),
                embedder.dimension()
            )));
        }

        let store = LanceVectorStore::open(path, manifest.dimension)
            .await
            .map_err(|e| load_error(format!("{:#}", e)))?;

        if !store.table_exists().await {
            return Err(load_error("no vector table found".into()));
        }

        tracing::info!(
            "Vector index loaded from {:?} ({} chunks, model {})",
            path,
            manifest.chunk_count,
            manifest.embedding_model
        );

        Ok(Self {
            path: path.to_path_buf(),
            store,
            embedder,
            manifest,
        })
    }

    /// 새 인덱스 디렉토리에 엔트리와 매니페스트 기록
    pub(crate) async fn write(
        path: &Path,
        entries: &[VectorEntry],
        manifest: &IndexManifest,
    ) -> Result<()> {
        tokio::fs::create_dir_all(path).await?;

        let store = LanceVectorStore::open(path, manifest.dimension)
            .await
            .map_err(|e| RagError::VectorStore(format!("{:#}", e)))?;

        let inserted = store
            .insert_batch(entries)
            .await
            .map_err(|e| RagError::VectorStore(format!("{:#}", e)))?;

        manifest.write(path)?;
        tracing::debug!("Wrote {} entries to {:?}", inserted, path);
        Ok(())
    }

    /// 질의 텍스트와 가장 유사한 청크 k개 (유사도 내림차순)
    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let query_embedding = self.embedder.embed(query).await?;

        let results = self
            .store
            .search(&query_embedding, k)
            .await
            .map_err(|e| RagError::Retrieval(format!("{:#}", e)))?;

        Ok(results
            .into_iter()
            .map(|r| RetrievedChunk {
                text: r.chunk_text,
                source: r.source,
                page_number: r.page_number.and_then(|p| usize::try_from(p).ok()),
                similarity: r.similarity,
            })
            .collect())
    }

    /// 저장된 청크 수
    pub async fn count(&self) -> Result<usize> {
        self.store
            .count()
            .await
            .map_err(|e| RagError::VectorStore(format!("{:#}", e)))
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Retriever for VectorIndex {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        self.similarity_search(query, k).await
    }
}

// ============================================================================
// Tests
// ============================================================================
