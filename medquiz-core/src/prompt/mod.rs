//! Prompt construction: project documents into a template context, then
//! render the quiz prompt.

pub mod context;
pub mod renderer;

pub use context::{ArticleContext, PromptContextBuilder, TemplateContext};
pub use renderer::{PromptRenderer, QUESTIONS_PER_SET};
