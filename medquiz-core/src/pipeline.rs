//! Quiz generation pipeline.
//!
//! One pass runs fetch → context → render → generate. When the first pass
//! looks truncated, a second full pass runs and its text is appended.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{GenerationConfig, QuizConfig, resolve_optional_secret};
use crate::error::Result;
use crate::generation::{GenerationRequest, TextGenerator, create_generator};
use crate::literature::{ArticleFetcher, LiteratureSource, PubMedClient};
use crate::prompt::{PromptContextBuilder, PromptRenderer};
use crate::types::QuestionSetKind;

/// Fewer lines than this and a quiz is treated as cut short.
pub const MIN_EXPECTED_LINES: usize = 10;

/// Separator placed between the first and second pass.
const PASS_SEPARATOR: &str = "\n\n";

/// Number of newline-delimited lines. Empty text counts as one line and a
/// trailing newline adds an empty one.
pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

/// True when `text` has fewer than [`MIN_EXPECTED_LINES`] lines.
pub fn is_likely_incomplete(text: &str) -> bool {
    line_count(text) < MIN_EXPECTED_LINES
}

pub struct QuizPipeline {
    fetcher: ArticleFetcher,
    renderer: PromptRenderer,
    generator: Arc<dyn TextGenerator>,
    generation: GenerationConfig,
}

impl QuizPipeline {
    pub fn new(
        fetcher: ArticleFetcher,
        renderer: PromptRenderer,
        generator: Arc<dyn TextGenerator>,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            fetcher,
            renderer,
            generator,
            generation,
        }
    }

    /// Wire PubMed and the configured generation backend.
    ///
    /// The NCBI key is optional; the generation key is required unless the
    /// backend is a local server.
    pub fn from_config(config: &QuizConfig) -> Result<Self> {
        config.validate()?;
        let ncbi_key = resolve_optional_secret(&config.literature.api_key_env);
        let source: Arc<dyn LiteratureSource> =
            Arc::new(PubMedClient::new(&config.literature, ncbi_key)?);
        let fetcher = ArticleFetcher::new(source, config.literature.max_results_per_query);
        let generator = create_generator(&config.generation)?;

        Ok(Self::new(
            fetcher,
            PromptRenderer::new()?,
            generator,
            config.generation.clone(),
        ))
    }

    /// Generate a quiz, deriving the question kind from the topic literal.
    pub async fn generate_quiz(&self, topic: &str) -> Result<String> {
        self.generate_quiz_as(topic, QuestionSetKind::from_topic(topic))
            .await
    }

    /// Generate a quiz for an explicit question kind. At most two passes.
    pub async fn generate_quiz_as(&self, topic: &str, kind: QuestionSetKind) -> Result<String> {
        info!(
            kind = %kind,
            model = self.generator.model_name(),
            "Generating quiz"
        );

        let first = self.single_pass(topic, kind).await?;
        if !is_likely_incomplete(&first) {
            return Ok(first);
        }

        info!(
            lines = line_count(&first),
            min = MIN_EXPECTED_LINES,
            "First pass looks incomplete, running a second pass"
        );
        let second = self.single_pass(topic, kind).await?;
        Ok(format!("{first}{PASS_SEPARATOR}{second}"))
    }

    async fn single_pass(&self, topic: &str, kind: QuestionSetKind) -> Result<String> {
        let documents = self.fetcher.fetch(topic).await;
        let context = PromptContextBuilder::build(topic, kind, &documents);
        let prompt = self.renderer.render(&context)?;
        debug!(
            articles = context.articles.len(),
            prompt_chars = prompt.len(),
            "Prompt rendered"
        );

        let request = GenerationRequest::from_config(prompt, &self.generation)?;
        let result = self.generator.generate(&request).await?;
        Ok(result.text)
    }
}
