//! Integration tests for quiz generation.
//!
//! These run the whole fetch → render → generate flow with an in-memory
//! literature source and `MockGenerator`, checking the retry-if-short rule.

use async_trait::async_trait;
use medquiz_core::config::GenerationConfig;
use medquiz_core::error::{GenerationError, LiteratureError, QuizError};
use medquiz_core::{
    ArticleFetcher, LiteratureRecord, LiteratureSource, MockGenerator, PromptRenderer,
    QuestionSetKind, QuizPipeline,
};
use std::sync::{Arc, Mutex};

/// Serves canned records per query and records the queries it saw.
struct CannedSource {
    queries: Mutex<Vec<String>>,
}

impl CannedSource {
    fn new() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LiteratureSource for CannedSource {
    async fn search(
        &self,
        query: &str,
        _max_results: usize,
    ) -> Result<Vec<LiteratureRecord>, LiteratureError> {
        self.queries.lock().unwrap().push(query.to_string());
        match query {
            "dehydration" => Ok(vec![LiteratureRecord {
                title: "Dehydration in older adults".into(),
                abstract_text: Some("Reduced thirst and renal concentrating ability.".into()),
                keywords: vec!["dehydration".into(), "elderly".into()],
            }]),
            "unreachable" => Err(LiteratureError::Request {
                message: "connection reset".into(),
            }),
            _ => Ok(vec![]),
        }
    }

    fn name(&self) -> &str {
        "canned"
    }
}

fn build(generator: Arc<MockGenerator>, source: Arc<CannedSource>) -> QuizPipeline {
    QuizPipeline::new(
        ArticleFetcher::new(source, 1),
        PromptRenderer::new().unwrap(),
        generator,
        GenerationConfig::default(),
    )
}

fn mcq_block(n: usize) -> String {
    format!(
        "Q{n}: Which finding is most typical?\nA. a\nB. b\nC. c\nD. d\n**Correct answer:** A\n**Explanation:** because."
    )
}

#[tokio::test]
async fn test_full_quiz_single_pass() {
    let quiz: String = (1..=10).map(mcq_block).collect::<Vec<_>>().join("\n\n");
    let generator = Arc::new(MockGenerator::with_replies([quiz.clone()]));
    let source = Arc::new(CannedSource::new());
    let pipeline = build(generator.clone(), source.clone());

    let out = pipeline
        .generate_quiz_as("dehydration\nunreachable", QuestionSetKind::Mcq)
        .await
        .unwrap();

    assert_eq!(out, quiz);
    assert_eq!(generator.call_count(), 1);
    // The failing query is skipped, the other one still lands in the prompt
    assert_eq!(
        *source.queries.lock().unwrap(),
        vec!["dehydration".to_string(), "unreachable".to_string()]
    );
    let prompts = generator.prompts();
    let prompt = &prompts[0];
    assert!(prompt.contains("title: Dehydration in older adults"));
    assert!(prompt.contains("keywords: dehydration, elderly"));
    assert!(prompt.contains("Q10: <clinical"));
}

#[tokio::test]
async fn test_truncated_quiz_is_extended_once() {
    let generator = Arc::new(MockGenerator::with_replies([
        "Q1: first\nA. x\nB. y",
        "Q2: second\nA. x\nB. y",
        "never used",
    ]));
    let source = Arc::new(CannedSource::new());
    let pipeline = build(generator.clone(), source.clone());

    let out = pipeline.generate_quiz("dehydration").await.unwrap();

    assert_eq!(out, "Q1: first\nA. x\nB. y\n\nQ2: second\nA. x\nB. y");
    assert_eq!(generator.call_count(), 2);
    assert_eq!(source.queries.lock().unwrap().len(), 2);
    // Both passes see the same prompt
    let prompts = generator.prompts();
    assert_eq!(prompts[0], prompts[1]);
}

#[tokio::test]
async fn test_no_literature_still_generates() {
    let quiz = (1..=12)
        .map(|i| format!("line {i}"))
        .collect::<Vec<_>>()
        .join("\n");
    let generator = Arc::new(MockGenerator::with_replies([quiz]));
    let source = Arc::new(CannedSource::new());
    let pipeline = build(generator.clone(), source);

    let out = pipeline.generate_quiz("unreachable").await.unwrap();
    assert!(out.starts_with("line 1\n"));
    assert!(!generator.prompts()[0].contains("title:"));
}

#[tokio::test]
async fn test_backend_failure_is_not_masked() {
    let generator = Arc::new(MockGenerator::new());
    generator.queue_error(GenerationError::RateLimited {
        retry_after_secs: 30,
    });
    let pipeline = build(generator, Arc::new(CannedSource::new()));

    let err = pipeline.generate_quiz("dehydration").await.unwrap_err();
    assert!(matches!(
        err,
        QuizError::Generation(GenerationError::RateLimited { .. })
    ));
}
