//! 테스트용 임베딩/LLM/검색기 구현
//!
//! 네트워크 없이 파이프라인 전체를 돌리기 위한 결정적 구현들입니다.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::{Generation, LanguageModel};
use crate::query::{RetrievedChunk, Retriever};

const HASH_DIMENSION: usize = 16;

// ============================================================================
// Embeddings
// ============================================================================

/// 단어 해시 기반 결정적 임베딩 (같은 텍스트 → 같은 벡터)
pub(crate) struct HashEmbedding {
    name: String,
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::named("hash-embedding")
    }
}

impl HashEmbedding {
    pub(crate) fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; HASH_DIMENSION];
        for word in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % HASH_DIMENSION as u64) as usize] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        HASH_DIMENSION
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 항상 실패하는 임베딩
pub(crate) struct FailingEmbedding;

#[async_trait]
impl EmbeddingProvider for FailingEmbedding {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::Embedding {
            model: "failing".into(),
            message: "service unavailable".into(),
        })
    }

    fn dimension(&self) -> usize {
        HASH_DIMENSION
    }

    fn name(&self) -> &str {
        "failing"
    }
}

// ============================================================================
// Language model
// ============================================================================

/// 받은 프롬프트를 기록하는 LLM
pub(crate) struct MockLlm {
    response: Mutex<Option<Result<Generation>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    pub(crate) fn replying(text: &str) -> Self {
        Self::with_generation(Generation::from_text(text))
    }

    pub(crate) fn with_generation(generation: Generation) -> Self {
        Self {
            response: Mutex::new(Some(Ok(generation))),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(error: RagError) -> Self {
        Self {
            response: Mutex::new(Some(Err(error))),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for MockLlm {
    async fn generate(&self, prompt: &str) -> Result<Generation> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut response = self.response.lock().unwrap();
        if let Some(Ok(generation)) = response.as_ref() {
            return Ok(generation.clone());
        }
        // 에러는 Clone이 아니므로 한 번만 돌려줌
        match response.take() {
            Some(Err(e)) => Err(e),
            _ => Err(RagError::Generation("mock exhausted".into())),
        }
    }

    fn name(&self) -> &str {
        "mock-llm"
    }
}

// ============================================================================
// Retriever
// ============================================================================

/// 고정 결과를 돌려주는 검색기
pub(crate) struct StaticRetriever {
    chunks: Vec<RetrievedChunk>,
    error: Mutex<Option<RagError>>,
}

impl StaticRetriever {
    pub(crate) fn new(chunks: Vec<RetrievedChunk>) -> Self {
        Self {
            chunks,
            error: Mutex::new(None),
        }
    }

    pub(crate) fn failing(error: RagError) -> Self {
        Self {
            chunks: Vec::new(),
            error: Mutex::new(Some(error)),
        }
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if let Some(error) = self.error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.chunks.iter().take(k).cloned().collect())
    }
}

// ============================================================================
// PDF fixtures
// ============================================================================

/// 페이지마다 한 줄짜리 텍스트를 가진 PDF 생성
pub(crate) fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![Object::from(0), 0.into(), 612.into(), 792.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}
