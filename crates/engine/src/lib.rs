//! Simulation engine: the multi-turn conversation orchestrator and its
//! collaborators (tool sandbox, adversarial injector, user simulator).
//!
//! Everything here depends on the [`cq_providers::LlmClient`] seam, never
//! on a concrete provider, so the whole engine is deterministic under a
//! scripted client.

mod adversarial;
mod cancel;
mod orchestrator;
mod sandbox;
mod simulator;

pub use adversarial::AdversarialInjector;
pub use cancel::{CancelMap, CancelToken};
pub use orchestrator::ConversationOrchestrator;
pub use sandbox::ToolSandbox;
pub use simulator::UserSimulator;
