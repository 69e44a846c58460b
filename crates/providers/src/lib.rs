//! LLM client boundary.
//!
//! [`LlmClient`] is the single seam between the simulation/evaluation
//! engines and any model provider. The engines only ever see normalized
//! [`ChatResponse`]s; real transport lives in the OpenAI-compatible
//! adapter, and tests script the seam with [`ScriptedLlmClient`].

mod openai_compat;
mod scripted;
mod traits;

pub use openai_compat::OpenAiCompatClient;
pub use scripted::ScriptedLlmClient;
pub use traits::{normalize_tool_arguments, ChatRequest, ChatResponse, LlmClient};
