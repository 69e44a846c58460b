//! Pairwise judge — which of two transcripts is better?
//!
//! The two conversations are presented to the judge model in a random
//! order to mitigate position bias; after parsing, the labels are
//! flipped back so the reported winner always refers to the caller's
//! original A/B. Confidence is reported as-is, unaffected by the swap.

use std::collections::BTreeMap;
use std::sync::Arc;

use cq_domain::error::Result;
use cq_domain::rubric::RubricDimension;
use cq_domain::tool::{Message, ToolDefinition};
use cq_domain::turn::Turn;
use cq_providers::{ChatRequest, ChatResponse, LlmClient};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transcript::format_transcript;

const COMPARISON_TOOL: &str = "submit_comparison";
const JUDGE_TEMPERATURE: f32 = 0.1;
const JUDGE_MAX_TOKENS: u32 = 2048;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Result types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preference {
    A,
    B,
    Draw,
}

impl Preference {
    /// Mirror the label (draw is fixed).
    pub fn flip(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
            Self::Draw => Self::Draw,
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "a" => Self::A,
            "b" => Self::B,
            _ => Self::Draw,
        }
    }
}

/// Outcome of one pairwise comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairwiseResult {
    pub match_id: Uuid,
    pub winner: Preference,
    pub reasoning: String,
    /// dimension_name → preferred side.
    pub dimension_preferences: BTreeMap<String, Preference>,
    /// Judge-reported confidence in [0, 1].
    pub confidence: f64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Evaluator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct PairwiseJudgeEvaluator {
    llm: Arc<dyn LlmClient>,
    model: String,
    rng: Mutex<StdRng>,
}

impl PairwiseJudgeEvaluator {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Fixed RNG seed for a reproducible presentation order.
    pub fn with_seed(llm: Arc<dyn LlmClient>, model: impl Into<String>, seed: u64) -> Self {
        let mut judge = Self::new(llm, model);
        judge.rng = Mutex::new(StdRng::seed_from_u64(seed));
        judge
    }

    /// Compare two conversations and report which agent performed better.
    pub async fn compare(
        &self,
        turns_a: &[Turn],
        turns_b: &[Turn],
        dimensions: &[RubricDimension],
    ) -> Result<PairwiseResult> {
        let match_id = Uuid::now_v7();
        let swapped: bool = self.rng.lock().gen();

        let (presented_a, presented_b) = if swapped {
            (turns_b, turns_a)
        } else {
            (turns_a, turns_b)
        };

        let response = self
            .llm
            .chat(ChatRequest {
                model: self.model.clone(),
                messages: vec![Message::user(format!(
                    "{}\n\n---\n\n{}",
                    format_transcript(presented_a, "Agent A"),
                    format_transcript(presented_b, "Agent B"),
                ))],
                system: Some(Self::build_system_prompt(dimensions)),
                tools: vec![Self::build_comparison_tool(dimensions)],
                temperature: JUDGE_TEMPERATURE,
                max_tokens: JUDGE_MAX_TOKENS,
            })
            .await?;

        let mut result = Self::parse_response(&response, dimensions);
        if swapped {
            result = unswap(result);
        }

        result.match_id = match_id;
        result
            .metadata
            .insert("model".into(), serde_json::Value::String(self.model.clone()));
        result
            .metadata
            .insert("swapped".into(), serde_json::Value::Bool(swapped));

        tracing::debug!(
            match_id = %match_id,
            winner = ?result.winner,
            confidence = result.confidence,
            swapped,
            "pairwise comparison complete"
        );
        Ok(result)
    }

    // ── Builders ───────────────────────────────────────────────────

    fn build_system_prompt(dimensions: &[RubricDimension]) -> String {
        let dim_text = dimensions
            .iter()
            .map(|d| format!("- **{}** (weight={}): {}", d.name, d.weight, d.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are an expert evaluator comparing two AI assistants. \
             You will see two conversations (Agent A and Agent B) responding \
             to the same scenario.\n\n\
             For each dimension, state your preference (a, b, or draw). \
             Then give an overall winner.\n\n\
             Dimensions:\n{dim_text}\n\n\
             Use the {COMPARISON_TOOL} tool to report your judgment."
        )
    }

    fn build_comparison_tool(dimensions: &[RubricDimension]) -> ToolDefinition {
        let mut properties = serde_json::Map::new();
        properties.insert(
            "winner".into(),
            serde_json::json!({
                "type": "string",
                "enum": ["a", "b", "draw"],
                "description": "Overall winner: 'a', 'b', or 'draw'",
            }),
        );
        properties.insert(
            "confidence".into(),
            serde_json::json!({
                "type": "number",
                "minimum": 0,
                "maximum": 1,
                "description": "Confidence in the judgment (0-1)",
            }),
        );
        properties.insert(
            "reasoning".into(),
            serde_json::json!({
                "type": "string",
                "description": "Overall reasoning for the comparison",
            }),
        );
        let mut required: Vec<String> =
            vec!["winner".into(), "confidence".into(), "reasoning".into()];

        for dim in dimensions {
            let key = format!("{}_preference", dim.name);
            properties.insert(
                key.clone(),
                serde_json::json!({
                    "type": "string",
                    "enum": ["a", "b", "draw"],
                    "description": format!("Preference for {}: 'a', 'b', or 'draw'", dim.name),
                }),
            );
            required.push(key);
        }

        ToolDefinition {
            name: COMPARISON_TOOL.into(),
            description: "Submit pairwise comparison judgment".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }

    // ── Parsing ────────────────────────────────────────────────────

    fn parse_response(response: &ChatResponse, dimensions: &[RubricDimension]) -> PairwiseResult {
        let mut winner = Preference::Draw;
        let mut reasoning = String::new();
        let mut confidence = 0.5;
        let mut dimension_preferences = BTreeMap::new();

        if let Some(tc) = response
            .tool_calls
            .iter()
            .find(|tc| tc.name == COMPARISON_TOOL)
        {
            winner = Preference::parse(tc.arguments["winner"].as_str().unwrap_or("draw"));
            confidence = tc.arguments["confidence"]
                .as_f64()
                .unwrap_or(0.5)
                .clamp(0.0, 1.0);
            reasoning = tc.arguments["reasoning"].as_str().unwrap_or("").to_string();

            for dim in dimensions {
                let pref = tc.arguments[format!("{}_preference", dim.name)]
                    .as_str()
                    .map(Preference::parse)
                    .unwrap_or(Preference::Draw);
                dimension_preferences.insert(dim.name.clone(), pref);
            }
        }

        if reasoning.is_empty() && !response.content.is_empty() {
            reasoning = response.content.chars().take(500).collect();
        }

        PairwiseResult {
            match_id: Uuid::nil(), // set by the caller
            winner,
            reasoning,
            dimension_preferences,
            confidence,
            metadata: serde_json::Map::new(),
        }
    }
}

/// Flip winner and dimension labels back after a swapped presentation.
/// Confidence is intentionally left untouched.
fn unswap(mut result: PairwiseResult) -> PairwiseResult {
    result.winner = result.winner.flip();
    for pref in result.dimension_preferences.values_mut() {
        *pref = pref.flip();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use cq_domain::rubric::default_dimensions;
    use cq_providers::ScriptedLlmClient;

    fn turns(text: &str) -> Vec<Turn> {
        vec![Turn::user("Q"), Turn::assistant(text, 1, 1, 1)]
    }

    fn comparison_args(winner: &str) -> serde_json::Value {
        let mut args = serde_json::Map::new();
        args.insert("winner".into(), serde_json::json!(winner));
        args.insert("confidence".into(), serde_json::json!(0.9));
        args.insert("reasoning".into(), serde_json::json!("A was clearer"));
        for d in default_dimensions() {
            args.insert(format!("{}_preference", d.name), serde_json::json!(winner));
        }
        serde_json::Value::Object(args)
    }

    /// Find a seed whose first draw produces the wanted swap value.
    fn seed_with_swap(want: bool) -> u64 {
        for seed in 0..64 {
            let drawn: bool = StdRng::seed_from_u64(seed).gen();
            if drawn == want {
                return seed;
            }
        }
        unreachable!("some seed in 0..64 yields each boolean");
    }

    #[tokio::test]
    async fn winner_parsed_without_swap() {
        let scripted = Arc::new(ScriptedLlmClient::new());
        scripted.push_tool_call("", "c1", COMPARISON_TOOL, comparison_args("a"));
        let judge = PairwiseJudgeEvaluator::with_seed(
            scripted.clone(),
            "judge",
            seed_with_swap(false),
        );

        let result = judge
            .compare(&turns("good"), &turns("bad"), &default_dimensions())
            .await
            .unwrap();

        assert_eq!(result.winner, Preference::A);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.metadata["swapped"], false);
        assert!(result
            .dimension_preferences
            .values()
            .all(|&p| p == Preference::A));
    }

    #[tokio::test]
    async fn swapped_presentation_is_unswapped() {
        let scripted = Arc::new(ScriptedLlmClient::new());
        // Judge sees the swapped order and prefers presented "a", which
        // is the caller's B.
        scripted.push_tool_call("", "c1", COMPARISON_TOOL, comparison_args("a"));
        let judge =
            PairwiseJudgeEvaluator::with_seed(scripted.clone(), "judge", seed_with_swap(true));

        let result = judge
            .compare(&turns("first"), &turns("second"), &default_dimensions())
            .await
            .unwrap();

        assert_eq!(result.winner, Preference::B);
        assert_eq!(result.metadata["swapped"], true);
        assert!(result
            .dimension_preferences
            .values()
            .all(|&p| p == Preference::B));
        // Confidence is reported as-is.
        assert_eq!(result.confidence, 0.9);

        // The swapped transcript order actually reached the judge.
        let prompt = &scripted.requests()[0].messages[0].content;
        let a_pos = prompt.find("second").unwrap();
        let b_pos = prompt.find("first").unwrap();
        assert!(a_pos < b_pos);
    }

    #[tokio::test]
    async fn draw_survives_unswap() {
        let scripted = Arc::new(ScriptedLlmClient::new());
        scripted.push_tool_call("", "c1", COMPARISON_TOOL, comparison_args("draw"));
        let judge =
            PairwiseJudgeEvaluator::with_seed(scripted.clone(), "judge", seed_with_swap(true));

        let result = judge
            .compare(&turns("x"), &turns("y"), &default_dimensions())
            .await
            .unwrap();
        assert_eq!(result.winner, Preference::Draw);
    }

    #[tokio::test]
    async fn missing_tool_call_falls_back_to_content() {
        let scripted = Arc::new(ScriptedLlmClient::new());
        scripted.push_text("I slightly prefer the first answer.", 1, 1);
        let judge =
            PairwiseJudgeEvaluator::with_seed(scripted, "judge", seed_with_swap(false));

        let result = judge
            .compare(&turns("x"), &turns("y"), &default_dimensions())
            .await
            .unwrap();
        assert_eq!(result.winner, Preference::Draw);
        assert_eq!(result.confidence, 0.5);
        assert!(result.reasoning.contains("slightly prefer"));
    }

    #[tokio::test]
    async fn presentation_order_roughly_uniform() {
        // Over many judges with different entropy seeds the raw
        // presentation order should be split, and after un-swap the
        // reported winner is invariant to presentation.
        let mut swapped_count = 0;
        for seed in 0..40 {
            let scripted = Arc::new(ScriptedLlmClient::new());
            // The judge always prefers the transcript containing "good",
            // which is presented as "a" iff not swapped.
            let swapped: bool = StdRng::seed_from_u64(seed).gen();
            let presented_winner = if swapped { "b" } else { "a" };
            scripted.push_tool_call(
                "",
                "c1",
                COMPARISON_TOOL,
                comparison_args(presented_winner),
            );
            let judge = PairwiseJudgeEvaluator::with_seed(scripted, "judge", seed);
            let result = judge
                .compare(&turns("good"), &turns("bad"), &default_dimensions())
                .await
                .unwrap();
            assert_eq!(result.winner, Preference::A);
            if swapped {
                swapped_count += 1;
            }
        }
        assert!(swapped_count > 5, "swap hardly ever fired: {swapped_count}");
        assert!(swapped_count < 35, "swap nearly always fired: {swapped_count}");
    }

    #[test]
    fn preference_flip() {
        assert_eq!(Preference::A.flip(), Preference::B);
        assert_eq!(Preference::B.flip(), Preference::A);
        assert_eq!(Preference::Draw.flip(), Preference::Draw);
    }
}
