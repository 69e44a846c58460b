//! Multi-turn conversation orchestrator.
//!
//! Drives the loop between the simulated user and the tested agent:
//! user message (possibly adversarial) → agent LLM call → optional tool
//! round-trip through the sandbox → budget checks. Terminates on the
//! user sentinels, the turn/token budgets, the wall-clock timeout,
//! cooperative cancellation, or the first error.
//!
//! Within a step the ordering is strict: tool calls run sequentially in
//! declaration order and the followup agent call only starts once every
//! tool result is present, so transcripts are deterministic under a
//! scripted client.

use std::sync::Arc;
use std::time::Instant;

use cq_domain::environment::SimulationEnvironment;
use cq_domain::error::Result;
use cq_domain::persona::{AgentPersona, FRUSTRATED, GOAL_ACHIEVED};
use cq_domain::tool::{Message, Role, ToolResult};
use cq_domain::turn::{ConversationResult, ConversationStatus, Turn};
use cq_providers::{ChatRequest, ChatResponse, LlmClient};

use crate::adversarial::AdversarialInjector;
use crate::cancel::CancelToken;
use crate::sandbox::ToolSandbox;
use crate::simulator::UserSimulator;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ConversationOrchestrator {
    llm: Arc<dyn LlmClient>,
    agent: AgentPersona,
    user_sim: UserSimulator,
    sandbox: ToolSandbox,
    injector: AdversarialInjector,
    env: SimulationEnvironment,
    cancel: CancelToken,
}

impl ConversationOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        agent: AgentPersona,
        user_sim: UserSimulator,
        sandbox: ToolSandbox,
        injector: AdversarialInjector,
        env: SimulationEnvironment,
        cancel: CancelToken,
    ) -> Self {
        Self {
            llm,
            agent,
            user_sim,
            sandbox,
            injector,
            env,
            cancel,
        }
    }

    /// Execute the full multi-turn conversation.
    pub async fn run(&self) -> ConversationResult {
        let mut turns: Vec<Turn> = Vec::new();
        let mut total_input_tokens: u64 = 0;
        let mut total_output_tokens: u64 = 0;
        let mut total_latency_ms: u64 = 0;
        let mut status = ConversationStatus::Completed;
        let mut error_message: Option<String> = None;
        let started = Instant::now();

        tracing::info!(
            agent = %self.agent.name,
            max_turns = self.env.max_turns,
            "conversation started"
        );

        for turn_index in 0..self.env.max_turns {
            // Cancellation is observed at turn boundaries only; in-flight
            // calls always finish.
            if self.cancel.is_cancelled() {
                status = ConversationStatus::Failed;
                error_message = Some("cancelled".into());
                tracing::info!(turn = turn_index, "conversation cancelled");
                break;
            }

            // ── User turn ────────────────────────────────────────────
            let user_message = if self.injector.should_inject(turn_index) {
                tracing::debug!(turn = turn_index, "adversarial message injected");
                self.injector.generate(turn_index)
            } else {
                match self.user_sim.next_message(&turns, turn_index).await {
                    Ok(msg) => msg,
                    Err(e) => {
                        status = ConversationStatus::Failed;
                        error_message = Some(e.to_string());
                        tracing::error!(turn = turn_index, error = %e, "user simulator failed");
                        break;
                    }
                }
            };

            turns.push(Turn::user(&user_message));

            if user_message.contains(GOAL_ACHIEVED) {
                status = ConversationStatus::GoalAchieved;
                tracing::info!(turn = turn_index, "goal achieved");
                break;
            }
            if user_message.contains(FRUSTRATED) {
                status = ConversationStatus::Frustrated;
                tracing::info!(turn = turn_index, "user frustrated");
                break;
            }

            // ── Agent turn (with optional tool round-trip) ───────────
            match self.agent_step(&mut turns).await {
                Ok(step) => {
                    total_input_tokens += step.input_tokens;
                    total_output_tokens += step.output_tokens;
                    total_latency_ms += step.latency_ms;
                }
                Err(e) => {
                    status = ConversationStatus::Failed;
                    error_message = Some(e.to_string());
                    tracing::error!(turn = turn_index, error = %e, "agent step failed");
                    break;
                }
            }

            // Budget is checked after the step completes, so a single
            // step may overshoot by up to one followup's worth of tokens.
            let total_tokens = total_input_tokens + total_output_tokens;
            if total_tokens >= self.env.max_total_tokens {
                tracing::info!(total = total_tokens, "token budget exceeded");
                break;
            }

            if started.elapsed().as_secs_f64() > self.env.timeout_seconds {
                tracing::info!(
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "conversation timeout"
                );
                break;
            }
        }

        let turn_count = turns.iter().filter(|t| t.role == Role::User).count() as u32;
        let total_tokens = total_input_tokens + total_output_tokens;

        tracing::info!(
            status = status.as_str(),
            turn_count,
            total_tokens,
            total_latency_ms,
            "conversation finished"
        );

        ConversationResult {
            turns,
            turn_count,
            total_tokens,
            total_input_tokens,
            total_output_tokens,
            total_latency_ms,
            status,
            error_message,
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // One agent step
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Run one agent LLM call and, if it declared tool calls, the
    /// sandbox round-trip plus the followup call. Appends one or two
    /// assistant turns and returns the step's aggregate counters.
    async fn agent_step(&self, turns: &mut Vec<Turn>) -> Result<StepTotals> {
        let start = Instant::now();
        let response = self.agent_call(turns).await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        if response.tool_calls.is_empty() {
            let totals = StepTotals {
                input_tokens: response.input_tokens as u64,
                output_tokens: response.output_tokens as u64,
                latency_ms,
            };
            turns.push(Turn::assistant(
                &response.content,
                latency_ms,
                response.input_tokens,
                response.output_tokens,
            ));
            return Ok(totals);
        }

        // Tool fan-out is sequential, in declaration order.
        let mut tool_results: Vec<ToolResult> = Vec::with_capacity(response.tool_calls.len());
        for tool_call in &response.tool_calls {
            tool_results.push(self.sandbox.execute(tool_call).await);
        }

        turns.push(Turn::assistant_with_tools(
            &response.content,
            response.tool_calls.clone(),
            tool_results.clone(),
            latency_ms,
            response.input_tokens,
            response.output_tokens,
        ));

        // Followup call with the tool results appended; it cannot begin
        // until every result is present (which the sequential loop above
        // guarantees).
        let followup_start = Instant::now();
        let followup = self.followup_call(turns, &tool_results).await?;
        let followup_latency = followup_start.elapsed().as_millis() as u64;

        turns.push(Turn::assistant(
            &followup.content,
            followup_latency,
            followup.input_tokens,
            followup.output_tokens,
        ));

        Ok(StepTotals {
            input_tokens: (response.input_tokens + followup.input_tokens) as u64,
            output_tokens: (response.output_tokens + followup.output_tokens) as u64,
            latency_ms: latency_ms + followup_latency,
        })
    }

    async fn agent_call(&self, turns: &[Turn]) -> Result<ChatResponse> {
        self.llm
            .chat(ChatRequest {
                model: self.agent.model.clone(),
                messages: turns_to_messages(turns),
                system: Some(self.agent.system_prompt.clone()),
                tools: self.agent.tools.clone(),
                temperature: self.agent.temperature,
                max_tokens: self.agent.max_tokens,
            })
            .await
    }

    async fn followup_call(
        &self,
        turns: &[Turn],
        tool_results: &[ToolResult],
    ) -> Result<ChatResponse> {
        let mut messages = turns_to_messages(turns);
        for result in tool_results {
            messages.push(Message::tool_result(&result.tool_call_id, &result.content));
        }
        self.llm
            .chat(ChatRequest {
                model: self.agent.model.clone(),
                messages,
                system: Some(self.agent.system_prompt.clone()),
                tools: Vec::new(),
                temperature: self.agent.temperature,
                max_tokens: self.agent.max_tokens,
            })
            .await
    }
}

struct StepTotals {
    input_tokens: u64,
    output_tokens: u64,
    latency_ms: u64,
}

/// Convert the transcript into provider messages. User and assistant
/// turns only; assistant turns keep their tool calls attached.
fn turns_to_messages(turns: &[Turn]) -> Vec<Message> {
    turns
        .iter()
        .filter_map(|turn| match turn.role {
            Role::User => Some(Message::user(&turn.content)),
            Role::Assistant => {
                if turn.tool_calls.is_empty() {
                    Some(Message::assistant(&turn.content))
                } else {
                    Some(Message::assistant_with_tool_calls(
                        &turn.content,
                        turn.tool_calls.clone(),
                    ))
                }
            }
            _ => None,
        })
        .collect()
}
