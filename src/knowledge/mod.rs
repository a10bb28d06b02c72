//! Knowledge 모듈 - PDF 지식 인덱스
//!
//! - Chunker: 구분자 우선순위 기반 재귀 분할 (고정 오버랩)
//! - LanceDB: 청크 + 임베딩 저장, 벡터 검색
//! - Index: 매니페스트가 붙은 인덱스 디렉토리 핸들
//! - Ingest: 로드 → 분할 → 임베딩 → 원자적 기록

mod chunker;
mod index;
mod ingest;
mod lance;
mod vector;

// Re-exports
pub use chunker::{Chunk, RecursiveSplitter};
pub use index::{IndexManifest, VectorIndex, MANIFEST_FILE};
pub use ingest::{build_index, build_index_from_documents, IngestOptions, IngestReport};
pub use lance::LanceVectorStore;
pub use vector::{SearchResult, VectorEntry, VectorStore};
