//! 질의 파이프라인
//!
//! 검색 → 프롬프트 조립 → LLM 호출 → 답변 추출.
//! 내부 상태가 없는 요청/응답 함수이며, 인덱스와 LLM은 주입받습니다.

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::llm::LanguageModel;

/// 검색 결과가 없을 때의 고정 응답
pub const NO_CONTEXT_ANSWER: &str = "No relevant context found! Cannot query model.";

/// 프롬프트 템플릿 (`{context}`, `{question}` 치환)
pub const PROMPT_TEMPLATE: &str = r#"
You are a helpful assistant. Use ONLY the provided context to answer the user's question.
If the answer cannot be found within the context, reply with "I don't know based on the provided information."

Context:
{context}

Question:
{question}

Answer:
"#;

// ============================================================================
// Retriever Trait
// ============================================================================

/// 검색된 청크
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
    pub page_number: Option<usize>,
    pub similarity: f32,
}

/// 유사도 검색 인터페이스
#[async_trait]
pub trait Retriever: Send + Sync {
    /// 질의와 가장 유사한 청크 최대 k개 (유사도 내림차순)
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}

// ============================================================================
// Pipeline
// ============================================================================

/// 프롬프트 렌더링 (이스케이프 없이 그대로 치환)
pub fn render_prompt(context: &str, question: &str) -> String {
    // 순서대로 한 번씩만 치환해서 context 안의 "{question}"은 건드리지 않음
    let (head, tail) = PROMPT_TEMPLATE
        .split_once("{context}")
        .unwrap_or((PROMPT_TEMPLATE, ""));
    let tail = tail.replacen("{question}", question, 1);
    format!("{}{}{}", head, context, tail)
}

/// 질문에 답변
///
/// 검색 결과가 없으면 LLM을 호출하지 않고 [`NO_CONTEXT_ANSWER`]를 반환합니다.
pub async fn answer(
    question: &str,
    retriever: &dyn Retriever,
    llm: &dyn LanguageModel,
    k: usize,
) -> Result<String> {
    let retrieved = retriever.retrieve(question, k).await.map_err(|e| match e {
        RagError::Authentication(_) | RagError::Retrieval(_) => e,
        other => RagError::Retrieval(other.to_string()),
    })?;

    if retrieved.is_empty() {
        tracing::info!("No context retrieved; skipping LLM call");
        return Ok(NO_CONTEXT_ANSWER.to_string());
    }

    tracing::debug!(
        "Retrieved {} chunks (top similarity {:.4})",
        retrieved.len(),
        retrieved[0].similarity
    );

    let context = retrieved
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = render_prompt(&context, question);

    let generation = llm.generate(&prompt).await.map_err(|e| match e {
        RagError::Authentication(_) | RagError::Generation(_) => e,
        other => RagError::Generation(other.to_string()),
    })?;

    generation
        .first_text()
        .map(|text| text.trim().to_string())
        .ok_or_else(|| RagError::Generation("response contained no text candidate".into()))
}

/// 사용자에게 보여줄 에러 문자열
pub fn render_error(error: &RagError) -> String {
    format!("An error occurred: {}", error)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Generation;
    use crate::test_support::{MockLlm, StaticRetriever};

    fn chunk(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            source: "doc.pdf".to_string(),
            page_number: Some(1),
            similarity: 0.9,
        }
    }

    #[test]
    fn test_render_prompt_verbatim() {
        let prompt = render_prompt("ctx with {question} inside", "What is <b>this</b>?");
        assert!(prompt.contains("Context:\nctx with {question} inside\n"));
        assert!(prompt.contains("Question:\nWhat is <b>this</b>?\n"));
        assert!(prompt.trim_end().ends_with("Answer:"));
    }

    #[tokio::test]
    async fn test_no_context_skips_llm() {
        let retriever = StaticRetriever::new(vec![]);
        let llm = MockLlm::replying("should not be used");

        let result = answer("anything?", &retriever, &llm, 1).await.unwrap();
        assert_eq!(result, NO_CONTEXT_ANSWER);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_single_llm_call_with_context_and_question() {
        let retriever = StaticRetriever::new(vec![chunk("The sky is blue.")]);
        let llm = MockLlm::replying("  Blue.\n");

        let result = answer("What color is the sky?", &retriever, &llm, 1)
            .await
            .unwrap();

        assert_eq!(result, "Blue.");
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("The sky is blue."));
        assert!(prompts[0].contains("What color is the sky?"));
    }

    #[tokio::test]
    async fn test_context_joined_in_rank_order() {
        let retriever = StaticRetriever::new(vec![chunk("first"), chunk("second")]);
        let llm = MockLlm::replying("ok");

        answer("q", &retriever, &llm, 2).await.unwrap();
        assert!(llm.prompts()[0].contains("Context:\nfirst\nsecond\n"));
    }

    #[tokio::test]
    async fn test_k_limits_retrieval() {
        let retriever = StaticRetriever::new(vec![chunk("first"), chunk("second")]);
        let llm = MockLlm::replying("ok");

        answer("q", &retriever, &llm, 1).await.unwrap();
        assert!(!llm.prompts()[0].contains("second"));
    }

    #[tokio::test]
    async fn test_retrieval_failure() {
        let retriever = StaticRetriever::failing(RagError::VectorStore("disk gone".into()));
        let llm = MockLlm::replying("ok");

        let err = answer("q", &retriever, &llm, 1).await.unwrap_err();
        assert!(matches!(err, RagError::Retrieval(ref m) if m.contains("disk gone")));
        assert_eq!(llm.call_count(), 0);
        assert!(render_error(&err).starts_with("An error occurred: "));
    }

    #[tokio::test]
    async fn test_empty_generation_is_failure() {
        let retriever = StaticRetriever::new(vec![chunk("ctx")]);
        let llm = MockLlm::with_generation(Generation::default());

        let err = answer("q", &retriever, &llm, 1).await.unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_authentication_error_passes_through() {
        let retriever = StaticRetriever::new(vec![chunk("ctx")]);
        let llm = MockLlm::failing(RagError::Authentication("no key".into()));

        let err = answer("q", &retriever, &llm, 1).await.unwrap_err();
        assert!(matches!(err, RagError::Authentication(_)));
    }
}
