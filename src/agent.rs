//! The tool-calling agent loop.
//!
//! Drives a multi-turn conversation with the model: classify the incoming
//! message, then alternate between completions and tool executions until the
//! model produces a plain answer or the round guard trips.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::guardrail::{Guardrail, GuardrailAction, GuardrailVerdict};
use crate::llm::{ChatModel, ToolChoice};
use crate::message::{Message, Usage};
use crate::tools::Toolbox;

const BLOCK_REPLY: &str = "I appreciate your message, but I'm here to discuss my professional \
experience and projects. How can I help you with information about my work?";

const EXHAUSTED_REPLY: &str = "I've pulled together quite a bit of detail already. Happy to answer \
anything specific about my work if you narrow it down.";

const SYSTEM_INSTRUCTIONS: &str = "You are the AI representative of a senior software engineer's \
portfolio - you ARE the engineer speaking directly to visitors.\n\n\
Always speak in FIRST PERSON (\"I'm a senior software engineer...\", \"My experience includes...\"), \
never in the third person.\n\n\
TOOL USAGE: always use tools to get accurate, specific information. Never make up details about \
projects, skills, or experience. Open source -> get_opensource_contributions; skills -> \
assess_skills; projects -> showcase_portfolio or get_project_details; availability -> \
check_availability; contact -> get_contact_info.\n\n\
Personality: friendly, professional, direct and honest, concise - keep responses 2-4 sentences \
unless details are requested. Offer next steps when relevant, and politely redirect off-topic \
questions to your expertise. Let the tools provide the facts; you provide the personality.";

/// One completed exchange: final reply plus everything the caller needs to
/// continue the session statelessly.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub message: String,
    pub conversation_history: Vec<Message>,
    pub tools_called: Vec<String>,
    pub usage: Usage,
}

/// Result of running the agent on one user message.
#[derive(Debug, Clone)]
pub enum AgentOutcome {
    Reply(AgentReply),
    /// Owner-addressed message: the caller layer dispatches the urgent
    /// notification and acknowledges; the loop itself never replies.
    NotifyOwner(GuardrailVerdict),
}

pub struct PortfolioAgent<M: ChatModel> {
    model: Arc<M>,
    toolbox: Toolbox,
    guardrail: Guardrail,
    max_rounds: usize,
}

impl<M: ChatModel> PortfolioAgent<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self {
            model,
            toolbox: Toolbox::default(),
            guardrail: Guardrail::default(),
            max_rounds: 8,
        }
    }

    pub fn with_guardrail(mut self, guardrail: Guardrail) -> Self {
        self.guardrail = guardrail;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    /// Run one exchange. The history is received by value and returned
    /// extended; the pipeline holds no session state of its own.
    pub async fn run(&self, user_message: &str, history: Vec<Message>) -> Result<AgentOutcome> {
        let verdict = self.guardrail.classify(self.model.as_ref(), user_message).await;
        debug!(action = ?verdict.action, score = verdict.relevance_score, "guardrail verdict");

        match verdict.action {
            GuardrailAction::Block => {
                let mut conversation_history = history;
                conversation_history.push(Message::user(user_message));
                conversation_history.push(Message::assistant(BLOCK_REPLY));
                return Ok(AgentOutcome::Reply(AgentReply {
                    message: BLOCK_REPLY.to_string(),
                    conversation_history,
                    tools_called: Vec::new(),
                    usage: Usage::default(),
                }));
            }
            GuardrailAction::AcceptAndNotify => {
                return Ok(AgentOutcome::NotifyOwner(verdict));
            }
            _ => {}
        }

        let steering_hint = match verdict.action {
            GuardrailAction::SoftRedirect => {
                "\n\nGently guide the conversation back to professional topics if appropriate."
            }
            GuardrailAction::HardRedirect => {
                "\n\nThis question is off-topic. Politely redirect to your professional expertise."
            }
            _ => "",
        };
        let system = Message::system(format!("{SYSTEM_INSTRUCTIONS}{steering_hint}"));

        let mut messages = history;
        messages.push(Message::user(user_message));

        let schemas = self.toolbox.schemas();
        let mut tools_called = Vec::new();
        let mut usage = Usage::default();

        for _ in 0..self.max_rounds {
            let mut prompt = Vec::with_capacity(messages.len() + 1);
            prompt.push(system.clone());
            prompt.extend(messages.iter().cloned());

            let completion = self
                .model
                .complete(&prompt, &schemas, ToolChoice::Auto)
                .await?;
            usage = completion.usage;

            if completion.tool_calls.is_empty() {
                let reply = completion.content.unwrap_or_default();
                messages.push(Message::assistant(&reply));
                return Ok(AgentOutcome::Reply(AgentReply {
                    message: reply,
                    conversation_history: messages,
                    tools_called,
                    usage,
                }));
            }

            for call in &completion.tool_calls {
                tools_called.push(call.name.clone());
            }
            messages.push(Message::assistant_tool_calls(
                completion.content,
                completion.tool_calls.clone(),
            ));
            for call in &completion.tool_calls {
                let result = self.toolbox.dispatch(call);
                messages.push(Message::from_tool_result(result));
            }
        }

        // Round guard tripped: force a plain-text answer so latency and cost
        // stay bounded even when the model keeps requesting tools.
        info!(rounds = self.max_rounds, "agent hit the tool-round limit, forcing a final answer");
        let mut prompt = Vec::with_capacity(messages.len() + 1);
        prompt.push(system);
        prompt.extend(messages.iter().cloned());
        let completion = self
            .model
            .complete(&prompt, &schemas, ToolChoice::None)
            .await?;
        usage = completion.usage;

        let reply = completion
            .content
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| EXHAUSTED_REPLY.to_string());
        messages.push(Message::assistant(&reply));
        Ok(AgentOutcome::Reply(AgentReply {
            message: reply,
            conversation_history: messages,
            tools_called,
            usage,
        }))
    }
}
