//! Lead scorer: estimates the business value of a finished conversation.
//!
//! The model proposes a 0-10 score; the category is always re-derived from
//! the clamped score, and a deterministic heuristic takes over whenever the
//! model is unavailable or its answer is unparseable.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AgentError, Result};
use crate::llm::{ChatModel, ToolChoice};
use crate::message::{Message, Role};
use crate::summary::transcript_text;
use crate::tools::HIGH_VALUE_TOOLS;

static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)score[:\s]*(\d+)").unwrap());
static REASONING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)reasoning[:\s]*(.*?)(?:key signals|$)").unwrap());
static SIGNALS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)key signals[:\s]*(.*)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadCategory {
    #[serde(rename = "high-value")]
    High,
    #[serde(rename = "medium-value")]
    Medium,
    #[serde(rename = "low-value")]
    Low,
}

impl LeadCategory {
    /// The only way a category is produced: a pure function of the score.
    pub fn from_score(score: u8) -> Self {
        match score {
            7.. => LeadCategory::High,
            4..=6 => LeadCategory::Medium,
            _ => LeadCategory::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadCategory::High => "high-value",
            LeadCategory::Medium => "medium-value",
            LeadCategory::Low => "low-value",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadScore {
    pub score: u8,
    pub category: LeadCategory,
    pub reasoning: String,
    pub signals: Vec<String>,
}

const INSTRUCTIONS: &str = "Evaluate portfolio conversations and assign quality scores.";

pub async fn score_conversation(
    model: &dyn ChatModel,
    messages: &[Message],
    tools_called: &[String],
) -> LeadScore {
    let prompt = format!(
        "Score this conversation from 0-10 for lead quality:\n\n\
         CONVERSATION:\n{transcript}\n\n\
         TOOLS CALLED: {tools}\n\n\
         Provide:\n\
         1. Score (0-10)\n\
         2. Category (high-value/medium-value/low-value)\n\
         3. Reasoning (2-3 sentences)\n\
         4. Key Signals (list positive or negative indicators you noticed)",
        transcript = transcript_text(messages),
        tools = if tools_called.is_empty() {
            "None".to_string()
        } else {
            tools_called.join(", ")
        },
    );

    let request = [Message::system(INSTRUCTIONS), Message::user(prompt)];
    let score_text = match model.complete(&request, &[], ToolChoice::None).await {
        Ok(completion) => completion.content.unwrap_or_default(),
        Err(err) => {
            warn!(error = %err, "scorer model call failed, using heuristic fallback");
            return fallback_score(messages, tools_called);
        }
    };

    let score = match parse_score(&score_text) {
        Ok(score) => score,
        Err(err) => {
            warn!(error = %err, "score extraction failed, using heuristic fallback");
            return fallback_score(messages, tools_called);
        }
    };

    LeadScore {
        score,
        category: LeadCategory::from_score(score),
        reasoning: extract_reasoning(&score_text),
        signals: extract_signals(&score_text, tools_called),
    }
}

/// Extract the numeric score. Out-of-scale values are clamped rather than
/// rejected, so an overenthusiastic model still counts as a signal.
fn parse_score(text: &str) -> Result<u8> {
    SCORE_RE
        .captures(text)
        .and_then(|caps| caps[1].parse::<u64>().ok())
        .map(|score| score.min(10) as u8)
        .ok_or_else(|| AgentError::Parse("no score digits in model output".into()))
}

fn extract_reasoning(text: &str) -> String {
    REASONING_RE
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            "Conversation analyzed based on engagement level and topics discussed.".into()
        })
}

fn extract_signals(text: &str, tools_called: &[String]) -> Vec<String> {
    let mut signals: Vec<String> = SIGNALS_RE
        .captures(text)
        .map(|caps| {
            caps[1]
                .lines()
                .filter(|line| {
                    let trimmed = line.trim();
                    trimmed.starts_with('-')
                        || trimmed
                            .chars()
                            .next()
                            .map(|c| c.is_ascii_digit())
                            .unwrap_or(false)
                })
                .map(|line| {
                    line.trim()
                        .trim_start_matches(|c: char| c == '-' || c.is_ascii_digit() || c == '.')
                        .trim()
                        .to_string()
                })
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if !tools_called.is_empty() {
        signals.push(format!(
            "Called {} tool(s): {}",
            tools_called.len(),
            tools_called.join(", ")
        ));
    }
    if signals.is_empty() {
        signals.push("Standard conversation flow".into());
    }
    signals
}

/// Deterministic score used when the model gives us nothing usable.
pub fn fallback_score(messages: &[Message], tools_called: &[String]) -> LeadScore {
    let mut score: i32 = 5;

    let user_messages = messages.iter().filter(|m| m.role == Role::User).count();
    if user_messages > 5 {
        score += 1;
    }
    if user_messages > 8 {
        score += 1;
    }

    let called_high_value_tool = tools_called
        .iter()
        .any(|tool| HIGH_VALUE_TOOLS.contains(&tool.as_str()));
    if called_high_value_tool {
        score += 2;
    }
    if tools_called.len() > 3 {
        score += 1;
    }

    let transcript = messages
        .iter()
        .map(|m| m.content.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if transcript.contains("hire") || transcript.contains("available") {
        score += 1;
    }
    if transcript.contains("meeting") || transcript.contains("schedule") {
        score += 1;
    }
    if transcript.contains("contract") || transcript.contains("project") {
        score += 1;
    }

    if user_messages == 1 {
        score -= 2;
    }

    let score = score.clamp(0, 10) as u8;
    LeadScore {
        score,
        category: LeadCategory::from_score(score),
        reasoning: format!(
            "Calculated based on {user_messages} user messages and {} tool calls.",
            tools_called.len()
        ),
        signals: if tools_called.is_empty() {
            vec!["Basic interaction".into()]
        } else {
            tools_called.to_vec()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Completion, StubModel};

    fn exchange(user_turns: usize, content: &str) -> Vec<Message> {
        let mut messages = Vec::new();
        for _ in 0..user_turns {
            messages.push(Message::user(content));
            messages.push(Message::assistant("sure"));
        }
        messages
    }

    #[test]
    fn category_is_a_pure_function_of_score() {
        for score in 0..=10u8 {
            let expected = if score >= 7 {
                LeadCategory::High
            } else if score >= 4 {
                LeadCategory::Medium
            } else {
                LeadCategory::Low
            };
            assert_eq!(LeadCategory::from_score(score), expected);
        }
    }

    #[tokio::test]
    async fn parses_model_score_and_reasoning() {
        let model = StubModel::new(vec![Completion::text(
            "Score: 8\nCategory: high-value\nReasoning: Recruiter with a concrete role and budget.\n\
             Key Signals:\n- Asked about availability\n- Mentioned contract terms",
        )]);
        let result = score_conversation(&model, &exchange(3, "hello"), &[]).await;
        assert_eq!(result.score, 8);
        assert_eq!(result.category, LeadCategory::High);
        assert!(result.reasoning.contains("concrete role"));
        assert_eq!(result.signals.len(), 2);
    }

    #[tokio::test]
    async fn model_score_is_clamped_to_ten() {
        let model = StubModel::new(vec![Completion::text("Score: 99")]);
        let result = score_conversation(&model, &exchange(2, "hi"), &[]).await;
        assert_eq!(result.score, 10);
        assert_eq!(result.category, LeadCategory::High);

        // Values past the u8 range are still the model's signal, not a
        // reason to fall back.
        let model = StubModel::new(vec![Completion::text("Score: 300")]);
        let result = score_conversation(&model, &exchange(2, "hi"), &[]).await;
        assert_eq!(result.score, 10);
        assert_eq!(result.category, LeadCategory::High);
    }

    #[tokio::test]
    async fn unparseable_output_falls_back_deterministically() {
        let model = StubModel::new(vec![Completion::text("no digits to be found")]);
        let result = score_conversation(&model, &exchange(2, "hi"), &[]).await;
        // Base 5, no adjustments apply for a 2-turn neutral chat.
        assert_eq!(result.score, 5);
        assert_eq!(result.category, LeadCategory::Medium);
    }

    #[test]
    fn fallback_rewards_engagement_and_high_value_tools() {
        // 6 user messages (+1), high-value tool (+2), 4 tools (+1),
        // hire (+1) + meeting (+1) + project (+1) = 12, clamped to 10.
        let messages = exchange(6, "I want to hire you for a project, let's schedule a meeting");
        let tools: Vec<String> = vec![
            "check_availability".into(),
            "assess_skills".into(),
            "showcase_portfolio".into(),
            "get_contact_info".into(),
        ];
        let result = fallback_score(&messages, &tools);
        assert_eq!(result.score, 10);
        assert_eq!(result.category, LeadCategory::High);
    }

    #[test]
    fn single_user_message_is_penalized() {
        let result = fallback_score(&exchange(1, "hello there"), &[]);
        assert_eq!(result.score, 3);
        assert_eq!(result.category, LeadCategory::Low);
        assert_eq!(result.signals, vec!["Basic interaction".to_string()]);
    }
}
