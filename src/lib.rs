//! pdf-qabot - PDF 문서 기반 질의응답 봇
//!
//! PDF 디렉토리를 청크 단위로 임베딩해 LanceDB 인덱스로 저장하고,
//! 질문마다 가장 유사한 청크를 찾아 Gemini에 컨텍스트로 전달합니다.

pub mod app;
pub mod chat;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod llm;
pub mod query;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports
pub use app::AppContext;
pub use chat::{ChatHistory, ChatMessage, Role};
pub use config::{Config, IngestSettings, QuerySettings};
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding};
pub use error::{RagError, Result};
pub use extractor::{Document, DocumentMetadata, PdfLoader};
pub use knowledge::{
    build_index, build_index_from_documents, IngestOptions, IngestReport, RecursiveSplitter,
    VectorIndex,
};
pub use llm::{GeminiLlm, Generation, LanguageModel};
pub use query::{answer, RetrievedChunk, Retriever, NO_CONTEXT_ANSWER};
