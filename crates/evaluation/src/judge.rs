//! LLM-as-judge evaluator.
//!
//! Scores a transcript against rubric dimensions with one judge-model
//! call. Structured output is forced through a `submit_evaluation` tool;
//! when the model ignores the tool the free-text content is scanned for
//! `dimension: score` patterns, and when that fails too every dimension
//! falls back to 5.0 with a note — a documented fallback, not an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use cq_domain::error::Result;
use cq_domain::eval::{EvaluationResult, EvaluatorType};
use cq_domain::rubric::RubricDimension;
use cq_domain::tool::{Message, ToolDefinition};
use cq_domain::turn::Turn;
use cq_providers::{ChatRequest, ChatResponse, LlmClient};
use regex::Regex;

use crate::transcript::format_transcript;
use crate::{weighted_overall, Evaluator};

const JUDGE_TEMPERATURE: f32 = 0.1;
const JUDGE_MAX_TOKENS: u32 = 2048;
const SCORING_TOOL: &str = "submit_evaluation";
const FALLBACK_SCORE: f64 = 5.0;

pub struct ModelJudgeEvaluator {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl ModelJudgeEvaluator {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    fn build_system_prompt(dimensions: &[RubricDimension]) -> String {
        let dimension_text = dimensions
            .iter()
            .map(|d| {
                format!(
                    "- **{}** (weight={}): {}\n  Criteria: {}",
                    d.name,
                    d.weight,
                    d.description,
                    d.criteria.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are an expert conversation evaluator. Your task is to evaluate \
             an AI assistant's performance in a multi-turn conversation.\n\n\
             Score each dimension on a 0-10 scale:\n\
             \x20 0-2: Very poor\n\
             \x20 3-4: Below average\n\
             \x20 5-6: Average\n\
             \x20 7-8: Good\n\
             \x20 9-10: Excellent\n\n\
             Dimensions to evaluate:\n{dimension_text}\n\n\
             Use the {SCORING_TOOL} tool to report your scores. \
             Provide a brief reasoning for each score."
        )
    }

    /// One tool whose parameters are `<dim>_score` / `<dim>_reasoning`
    /// for every dimension, all required.
    fn build_scoring_tool(dimensions: &[RubricDimension]) -> ToolDefinition {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for dim in dimensions {
            properties.insert(
                format!("{}_score", dim.name),
                serde_json::json!({
                    "type": "number",
                    "description": format!("Score for {} (0-10): {}", dim.name, dim.description),
                    "minimum": 0,
                    "maximum": 10,
                }),
            );
            properties.insert(
                format!("{}_reasoning", dim.name),
                serde_json::json!({
                    "type": "string",
                    "description": format!("Brief reasoning for {} score", dim.name),
                }),
            );
            required.push(format!("{}_score", dim.name));
            required.push(format!("{}_reasoning", dim.name));
        }

        ToolDefinition {
            name: SCORING_TOOL.into(),
            description: "Submit evaluation scores for all dimensions".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }

    fn parse_response(
        &self,
        response: &ChatResponse,
        dimensions: &[RubricDimension],
    ) -> EvaluationResult {
        let mut scores: BTreeMap<String, f64> = BTreeMap::new();
        let mut reasoning_parts: Vec<String> = Vec::new();

        // Preferred path: structured tool call.
        if let Some(tc) = response.tool_calls.iter().find(|tc| tc.name == SCORING_TOOL) {
            for dim in dimensions {
                let raw = tc.arguments[format!("{}_score", dim.name)]
                    .as_f64()
                    .unwrap_or(FALLBACK_SCORE);
                let score = raw.clamp(0.0, 10.0);
                scores.insert(dim.name.clone(), score);

                let reason = tc.arguments[format!("{}_reasoning", dim.name)]
                    .as_str()
                    .unwrap_or("No reasoning provided")
                    .to_string();
                reasoning_parts.push(format!("{}: {score:.1}/10 — {reason}", dim.name));
            }
        }

        // Fallback: scan the free-text content.
        if scores.is_empty() && !response.content.is_empty() {
            (scores, reasoning_parts) = Self::parse_content_fallback(&response.content, dimensions);
        }

        // Last resort: defaults.
        if scores.is_empty() {
            for dim in dimensions {
                scores.insert(dim.name.clone(), FALLBACK_SCORE);
                reasoning_parts.push(format!(
                    "{}: {FALLBACK_SCORE:.1}/10 — Could not parse judge output",
                    dim.name
                ));
            }
        }

        let overall = weighted_overall(&scores, dimensions);
        let mut result = EvaluationResult::new(EvaluatorType::ModelJudge);
        result.scores = scores;
        result.overall_score = overall;
        result.reasoning = reasoning_parts.join("\n");
        result
            .metadata
            .insert("model".into(), serde_json::Value::String(self.model.clone()));
        result
    }

    fn parse_content_fallback(
        content: &str,
        dimensions: &[RubricDimension],
    ) -> (BTreeMap<String, f64>, Vec<String>) {
        let mut scores = BTreeMap::new();
        let mut reasoning = Vec::new();

        for dim in dimensions {
            let pattern = format!(r"(?i){}\s*[:=]\s*(\d+(?:\.\d+)?)", regex::escape(&dim.name));
            let Ok(re) = Regex::new(&pattern) else {
                continue;
            };
            if let Some(caps) = re.captures(content) {
                if let Ok(raw) = caps[1].parse::<f64>() {
                    let score = raw.clamp(0.0, 10.0);
                    scores.insert(dim.name.clone(), score);
                    reasoning.push(format!("{}: {score:.1}/10 — parsed from content", dim.name));
                }
            }
        }

        (scores, reasoning)
    }
}

#[async_trait::async_trait]
impl Evaluator for ModelJudgeEvaluator {
    async fn evaluate(
        &self,
        turns: &[Turn],
        dimensions: &[RubricDimension],
    ) -> Result<EvaluationResult> {
        let response = self
            .llm
            .chat(ChatRequest {
                model: self.model.clone(),
                messages: vec![Message::user(format_transcript(
                    turns,
                    "Conversation Transcript",
                ))],
                system: Some(Self::build_system_prompt(dimensions)),
                tools: vec![Self::build_scoring_tool(dimensions)],
                temperature: JUDGE_TEMPERATURE,
                max_tokens: JUDGE_MAX_TOKENS,
            })
            .await?;

        let result = self.parse_response(&response, dimensions);
        tracing::debug!(
            overall = result.overall_score,
            dimensions = result.scores.len(),
            "model judge scored transcript"
        );
        Ok(result)
    }
}
