//! LLM-backed query generation.
//!
//! Implements the `QueryGenerator` port from queryloom-core against the
//! OpenAI chat completions API:
//!
//! - `prompts` -- per-strategy system prompts assembled from schema context
//! - `openai` -- the chat-completion client, one instance per strategy

pub mod openai;
pub mod prompts;

pub use openai::OpenAiQueryGenerator;
pub use prompts::{PromptSet, QueryStrategy};
