//! Topic name constants.

pub const CONVERSATION_COMPLETED: &str = "agent.conversation.completed";
pub const EVALUATION_SCORE_COMPLETED: &str = "evaluation.score.completed";
pub const METRICS_AGGREGATED: &str = "metrics.aggregated";
/// Reserved dead-letter topic.
pub const PIPELINE_ERRORS: &str = "pipeline.errors";

pub const ALL_TOPICS: &[&str] = &[
    CONVERSATION_COMPLETED,
    EVALUATION_SCORE_COMPLETED,
    METRICS_AGGREGATED,
    PIPELINE_ERRORS,
];
