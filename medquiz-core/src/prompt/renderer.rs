//! Quiz prompt rendering.
//!
//! The prompt is a fixed Handlebars template: a header, the topic, the
//! article listing, then a question section chosen by [`QuestionSetKind`].
//! Escaping is disabled since the output goes to a language model, not HTML.

use handlebars::Handlebars;
use serde::Serialize;

use super::context::{ArticleContext, TemplateContext};
use crate::error::PromptError;
use crate::types::QuestionSetKind;

/// Questions requested per set.
pub const QUESTIONS_PER_SET: u32 = 10;

const TEMPLATE_NAME: &str = "quiz_prompt";

const QUIZ_PROMPT_TEMPLATE: &str = r#"Generate a set of 10 medical questions based on the given articles.

For each document, create the following based on the type of question specified:
- **Multiple-choice questions (MCQs):** Focus on clinical decision-making or disease pathophysiology. Provide a clear explanation of the correct answer.
- **Case-based scenario questions:** Generate 10 clinical case scenarios and ask for the most appropriate next step in management or diagnosis.
- **Short-answer questions:** Generate 10 concise, conceptually challenging questions, followed by a precise medical response.

If there is no relevant content for a specific question type, generate one based on general medical knowledge.

**Topic:** {{topic}}

**Articles:**
{{#each articles}}
  {{content}}
  keywords: {{#each keywords}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}
  title: {{title}}
{{/each}}

**Questions:**
{{#if is_mcq}}

**Multiple-choice (MCQ):**
{{#each numbers}}
Q{{this}}: <clinical or pathophysiology-based question>
A. <option 1>
B. <option 2>
C. <option 3>
D. <option 4>
**Correct answer:** <correct option>
**Explanation:** <why the answer is correct, include relevant medical reasoning>

{{/each}}
{{/if}}
{{#if is_case_based}}

**Case-based scenario:**
{{#each numbers}}
Q{{this}}: A patient presents with <symptoms>. The patient has a history of <relevant medical history>. Based on the given information, what is the most appropriate next step in management?
**Answer:** <correct management approach>

{{/each}}
{{/if}}
{{#if is_short_answer}}

**Short-answer:**
{{#each numbers}}
Q{{this}}: <Short but conceptually challenging medical question>
**Answer:** <concise and precise medical response>

{{/each}}
{{/if}}
"#;

/// Data handed to the template engine.
#[derive(Serialize)]
struct PromptView<'a> {
    topic: &'a str,
    articles: &'a [ArticleContext],
    is_mcq: bool,
    is_case_based: bool,
    is_short_answer: bool,
    numbers: Vec<u32>,
}

impl<'a> From<&'a TemplateContext> for PromptView<'a> {
    fn from(ctx: &'a TemplateContext) -> Self {
        Self {
            topic: &ctx.topic,
            articles: &ctx.articles,
            is_mcq: ctx.kind == QuestionSetKind::Mcq,
            is_case_based: ctx.kind == QuestionSetKind::CaseBased,
            is_short_answer: ctx.kind == QuestionSetKind::ShortAnswer,
            numbers: (1..=QUESTIONS_PER_SET).collect(),
        }
    }
}

/// Renders [`TemplateContext`]s into prompt text.
pub struct PromptRenderer {
    registry: Handlebars<'static>,
}

impl PromptRenderer {
    /// Compile the built-in quiz template.
    pub fn new() -> Result<Self, PromptError> {
        Self::with_template(QUIZ_PROMPT_TEMPLATE)
    }

    /// Compile a custom template. It sees `topic`, `articles`, the
    /// `is_mcq`/`is_case_based`/`is_short_answer` flags and `numbers`.
    pub fn with_template(template: &str) -> Result<Self, PromptError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(TEMPLATE_NAME, template)
            .map_err(|e| PromptError::Template {
                message: e.to_string(),
            })?;
        Ok(Self { registry })
    }

    pub fn render(&self, context: &TemplateContext) -> Result<String, PromptError> {
        self.registry
            .render(TEMPLATE_NAME, &PromptView::from(context))
            .map_err(|e| PromptError::Render {
                message: e.to_string(),
            })
    }
}
