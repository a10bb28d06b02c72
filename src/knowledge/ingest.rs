//! 인덱싱 파이프라인
//!
//! PDF 로드 → 청킹 → 임베딩 → 인덱스 기록.
//! 인덱스는 임시 디렉토리에 먼저 만들고, 성공했을 때만 목적지와 교체합니다.
//! 목적지가 인덱스가 아닌 디렉토리이면 건드리지 않고 실패합니다.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extractor::{load_pdf, Document, PdfLoader};

use super::chunker::{Chunk, RecursiveSplitter};
use super::index::{IndexManifest, VectorIndex, MANIFEST_FILE};
use super::vector::VectorEntry;

/// 리포트에 담을 미리보기 청크 수
const PREVIEW_CHUNKS: usize = 3;

// ============================================================================
// Types
// ============================================================================

/// 인덱싱 옵션
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// 하위 디렉토리 포함 여부
    pub recursive: bool,
}

/// 인덱싱 결과
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// 로드된 문서(페이지) 수
    pub documents: usize,
    /// 생성된 청크 수
    pub chunks: usize,
    /// 최종 인덱스 경로
    pub index_path: PathBuf,
    /// 앞쪽 청크 텍스트
    pub preview: Vec<String>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// 디렉토리의 PDF로 인덱스 생성
///
/// 파라미터 검증과 입력 확인은 파일시스템에 쓰기 전에 끝납니다.
pub async fn build_index(
    source_dir: &Path,
    destination: &Path,
    embedder: &dyn EmbeddingProvider,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let splitter = RecursiveSplitter::new(options.chunk_size, options.chunk_overlap)?;

    if !source_dir.is_dir() {
        return Err(RagError::NotFound(source_dir.to_path_buf()));
    }

    tracing::info!("Loading PDFs from {:?}", source_dir);
    tracing::info!("Saving vector store to {:?}", destination);
    tracing::info!("Using embedding model {}", embedder.name());
    tracing::info!(
        "Chunk size: {}, overlap: {}",
        options.chunk_size,
        options.chunk_overlap
    );

    let files = PdfLoader::new(options.recursive).collect(source_dir)?;
    if files.is_empty() {
        return Err(RagError::EmptyInput {
            source_label: source_dir.display().to_string(),
            reason: "no PDF files found".into(),
        });
    }
    let file_count = files.len();

    // PDF 파싱은 CPU 바운드이므로 spawn_blocking 사용
    let documents = tokio::task::spawn_blocking(move || -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for path in &files {
            documents.extend(load_pdf(path)?);
        }
        Ok(documents)
    })
    .await
    .map_err(|e| RagError::Extraction {
        path: source_dir.to_path_buf(),
        message: format!("PDF loading task failed: {}", e),
    })??;

    tracing::info!("Loaded {} documents from {} files", documents.len(), file_count);

    let source_label = source_dir.display().to_string();
    index_documents(&source_label, &documents, destination, embedder, &splitter).await
}

/// 이미 로드된 문서로 인덱스 생성
pub async fn build_index_from_documents(
    documents: &[Document],
    destination: &Path,
    embedder: &dyn EmbeddingProvider,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let splitter = RecursiveSplitter::new(options.chunk_size, options.chunk_overlap)?;
    index_documents("provided documents", documents, destination, embedder, &splitter).await
}

async fn index_documents(
    source_label: &str,
    documents: &[Document],
    destination: &Path,
    embedder: &dyn EmbeddingProvider,
    splitter: &RecursiveSplitter,
) -> Result<IngestReport> {
    let chunks: Vec<Chunk> = documents
        .iter()
        .flat_map(|doc| splitter.split_document(doc))
        .collect();

    if chunks.is_empty() {
        return Err(RagError::EmptyInput {
            source_label: source_label.to_string(),
            reason: "documents contain no extractable text".into(),
        });
    }

    tracing::info!("Split into {} chunks", chunks.len());

    ensure_replaceable(destination)?;

    // 임베딩 (순차)
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;

    let entries: Vec<VectorEntry> = chunks
        .iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| VectorEntry {
            source: chunk.source.display().to_string(),
            page_number: chunk.page_number.and_then(|p| i32::try_from(p).ok()),
            chunk_index: i32::try_from(chunk.chunk_index).unwrap_or(i32::MAX),
            chunk_text: chunk.text.clone(),
            embedding,
        })
        .collect();

    let manifest = IndexManifest {
        embedding_model: embedder.name().to_string(),
        dimension: embedder.dimension(),
        chunk_size: splitter.chunk_size(),
        chunk_overlap: splitter.chunk_overlap(),
        document_count: documents.len(),
        chunk_count: entries.len(),
        created_at: Utc::now(),
    };

    write_atomically(destination, &entries, &manifest).await?;

    tracing::info!(
        "Vector store created with {} chunks and saved to {:?}",
        entries.len(),
        destination
    );

    Ok(IngestReport {
        documents: documents.len(),
        chunks: entries.len(),
        index_path: destination.to_path_buf(),
        preview: chunks
            .iter()
            .take(PREVIEW_CHUNKS)
            .map(|c| c.text.clone())
            .collect(),
    })
}

/// 목적지가 새 인덱스로 교체 가능한지 확인
///
/// 없음, 빈 디렉토리, 매니페스트가 있는 기존 인덱스만 허용합니다.
fn ensure_replaceable(destination: &Path) -> Result<()> {
    if !destination.exists() {
        return Ok(());
    }

    if !destination.is_dir() {
        return Err(RagError::VectorStore(format!(
            "{} exists and is not a directory",
            destination.display()
        )));
    }

    if destination.join(MANIFEST_FILE).is_file() {
        return Ok(());
    }

    if std::fs::read_dir(destination)?.next().is_none() {
        return Ok(());
    }

    Err(RagError::VectorStore(format!(
        "refusing to replace {}: directory is not empty and has no {}",
        destination.display(),
        MANIFEST_FILE
    )))
}

/// 임시 디렉토리에 기록 후 목적지와 교체
async fn write_atomically(
    destination: &Path,
    entries: &[VectorEntry],
    manifest: &IndexManifest,
) -> Result<()> {
    let staging = sibling_path(destination, "staging");

    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    if let Err(e) = VectorIndex::write(&staging, entries, manifest).await {
        let _ = tokio::fs::remove_dir_all(&staging).await;
        return Err(e);
    }

    if let Err(e) = swap_into_place(&staging, destination).await {
        let _ = tokio::fs::remove_dir_all(&staging).await;
        return Err(e);
    }

    Ok(())
}

/// 기존 인덱스를 백업으로 옮긴 뒤 새 인덱스를 제자리로 이동
///
/// 이동이 실패하면 백업을 되돌립니다. 백업 삭제 실패는 경고만 남깁니다.
async fn swap_into_place(staging: &Path, destination: &Path) -> Result<()> {
    if !destination.exists() {
        tokio::fs::rename(staging, destination).await?;
        return Ok(());
    }

    tracing::info!("Replacing existing index at {:?}", destination);
    let backup = sibling_path(destination, "backup");
    tokio::fs::rename(destination, &backup).await?;

    if let Err(e) = tokio::fs::rename(staging, destination).await {
        if let Err(restore) = tokio::fs::rename(&backup, destination).await {
            tracing::error!(
                "Failed to restore previous index from {:?}: {}",
                backup,
                restore
            );
        }
        return Err(e.into());
    }

    if let Err(e) = tokio::fs::remove_dir_all(&backup).await {
        tracing::warn!("Failed to remove old index at {:?}: {}", backup, e);
    }
    Ok(())
}

/// 목적지 옆의 임시 디렉토리 경로 (`.{name}.{kind}-{uuid}`)
fn sibling_path(destination: &Path, kind: &str) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "index".to_string());
    destination.with_file_name(format!(".{}.{}-{}", name, kind, uuid::Uuid::new_v4()))
}

// ============================================================================
// Tests
// ============================================================================
