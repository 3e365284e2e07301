//! Conversation summarizer.
//!
//! Asks the model for a structured-but-free-text summary, slices out named
//! sections, and re-derives the interest level from deterministic signals.
//! Model failure never propagates: every field has a fixed default.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm::{ChatModel, ToolChoice};
use crate::message::{Message, Role};
use crate::tools::HIGH_VALUE_TOOLS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestLevel {
    High,
    Medium,
    Low,
}

impl InterestLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestLevel::High => "high",
            InterestLevel::Medium => "medium",
            InterestLevel::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub executive_summary: String,
    pub key_topics: Vec<String>,
    pub interest_level: InterestLevel,
    pub tools_called: Vec<String>,
    pub recommended_action: String,
    pub conversation_length: usize,
}

const INSTRUCTIONS: &str =
    "Analyze portfolio chat conversations and create executive summaries.";

/// Render a transcript the way the analysis prompts expect it.
pub fn transcript_text(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "SYSTEM",
                Role::User => "USER",
                Role::Assistant => "ASSISTANT",
                Role::Tool => "TOOL",
            };
            format!("{role}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub async fn summarize(
    model: &dyn ChatModel,
    messages: &[Message],
    tools_called: &[String],
) -> ConversationSummary {
    let prompt = format!(
        "Analyze this conversation and provide a structured summary:\n\n\
         CONVERSATION:\n{transcript}\n\n\
         TOOLS CALLED: {tools}\n\n\
         Provide:\n\
         1. Executive Summary (2-3 sentences about what the visitor wanted)\n\
         2. Key Topics (list 3-5 main topics discussed)\n\
         3. Interest Level (high/medium/low based on question depth and engagement)\n\
         4. Recommended Action (what the owner should do next)",
        transcript = transcript_text(messages),
        tools = join_or_none(tools_called),
    );

    let request = [Message::system(INSTRUCTIONS), Message::user(prompt)];
    let summary_text = match model.complete(&request, &[], ToolChoice::None).await {
        Ok(completion) => completion.content.unwrap_or_default(),
        Err(err) => {
            warn!(error = %err, "summary model call failed, returning fallback");
            return fallback_summary(messages, tools_called);
        }
    };

    let executive_summary = extract_section(&summary_text, "Executive Summary", Some("Key Topics"));
    let key_topics = extract_list_items(&summary_text, "Key Topics", "Interest Level");
    let interest_text = extract_section(&summary_text, "Interest Level", Some("Recommended Action"));
    let recommended_action = extract_section(&summary_text, "Recommended Action", None);

    ConversationSummary {
        executive_summary: if executive_summary.is_empty() {
            "Visitor inquired about portfolio and experience.".into()
        } else {
            executive_summary
        },
        key_topics: if key_topics.is_empty() {
            vec!["General inquiry".into()]
        } else {
            key_topics
        },
        interest_level: determine_interest_level(&interest_text, tools_called, messages.len()),
        tools_called: tools_called.to_vec(),
        recommended_action: if recommended_action.is_empty() {
            "Monitor for follow-up questions.".into()
        } else {
            recommended_action
        },
        conversation_length: messages.len(),
    }
}

fn fallback_summary(messages: &[Message], tools_called: &[String]) -> ConversationSummary {
    ConversationSummary {
        executive_summary:
            "Conversation summary generation failed. Please review the full transcript.".into(),
        key_topics: vec!["Error in summary generation".into()],
        interest_level: InterestLevel::Medium,
        tools_called: tools_called.to_vec(),
        recommended_action: "Review conversation manually.".into(),
        conversation_length: messages.len(),
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".into()
    } else {
        items.join(", ")
    }
}

/// Slice the text between a named header and the next one (or the end).
fn extract_section(text: &str, start_marker: &str, end_marker: Option<&str>) -> String {
    let Some(start) = text.find(start_marker) else {
        return String::new();
    };
    let content_start = start + start_marker.len();
    let content_end = end_marker
        .and_then(|marker| text[content_start..].find(marker).map(|i| content_start + i))
        .unwrap_or(text.len());
    text[content_start..content_end]
        .trim_matches(|c: char| c == ':' || c.is_whitespace() || c == '*' || c == '#')
        .trim()
        .to_string()
}

fn extract_list_items(text: &str, start_marker: &str, end_marker: &str) -> Vec<String> {
    let section = extract_section(text, start_marker, Some(end_marker));
    section
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
}

/// Interest level derivation. Deliberately OR-biased, matching the original
/// behavior: strong keyword signals, high-value tool usage, and long
/// conversations each independently force `High`, so `Low` is unreachable
/// once the message count exceeds eight.
fn determine_interest_level(
    level_text: &str,
    tools_called: &[String],
    message_count: usize,
) -> InterestLevel {
    let lower = level_text.to_lowercase();

    let high_signals = [
        "high",
        "very interested",
        "eager",
        "availability",
        "schedule",
        "meeting",
        "contract",
        "hire",
    ];
    let low_signals = ["low", "browsing", "casual", "brief", "quick"];

    let has_high_signal = high_signals.iter().any(|signal| lower.contains(signal));
    let has_low_signal = low_signals.iter().any(|signal| lower.contains(signal));
    let called_high_value_tool = tools_called
        .iter()
        .any(|tool| HIGH_VALUE_TOOLS.contains(&tool.as_str()));

    if has_high_signal || called_high_value_tool || message_count > 8 {
        InterestLevel::High
    } else if has_low_signal || message_count < 3 {
        InterestLevel::Low
    } else {
        InterestLevel::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Completion, StubModel};

    fn chat(count: usize) -> Vec<Message> {
        (0..count)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("question {i}"))
                } else {
                    Message::assistant(format!("answer {i}"))
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn parses_sections_from_model_response() {
        let model = StubModel::new(vec![Completion::text(
            "1. Executive Summary: A recruiter asked about backend experience and availability.\n\
             2. Key Topics:\n- Python backend work\n- Availability for contracts\n- CPython contributions\n\
             3. Interest Level: high, very engaged\n\
             4. Recommended Action: Reply within a day.",
        )]);
        let summary = summarize(&model, &chat(6), &[]).await;
        assert!(summary
            .executive_summary
            .starts_with("A recruiter asked about backend experience"));
        assert_eq!(summary.key_topics.len(), 3);
        assert_eq!(summary.key_topics[0], "Python backend work");
        assert_eq!(summary.interest_level, InterestLevel::High);
        assert_eq!(summary.recommended_action, "Reply within a day.");
        assert_eq!(summary.conversation_length, 6);
    }

    #[tokio::test]
    async fn model_failure_returns_fallback_summary() {
        let model = StubModel::failing();
        let summary = summarize(&model, &chat(4), &["assess_skills".into()]).await;
        assert!(summary.executive_summary.contains("review the full transcript"));
        assert_eq!(summary.interest_level, InterestLevel::Medium);
        assert_eq!(summary.tools_called, vec!["assess_skills"]);
    }

    #[tokio::test]
    async fn missing_sections_use_defaults() {
        let model = StubModel::new(vec![Completion::text("nothing structured here")]);
        let summary = summarize(&model, &chat(4), &[]).await;
        assert_eq!(
            summary.executive_summary,
            "Visitor inquired about portfolio and experience."
        );
        assert_eq!(summary.key_topics, vec!["General inquiry".to_string()]);
        assert_eq!(summary.recommended_action, "Monitor for follow-up questions.");
    }

    #[test]
    fn high_value_tool_forces_high_interest() {
        let level = determine_interest_level("medium", &["check_availability".into()], 4);
        assert_eq!(level, InterestLevel::High);
    }

    #[test]
    fn long_conversations_cannot_be_low() {
        // Documented OR-bias: count > 8 wins over an explicit low signal.
        let level = determine_interest_level("low, just browsing", &[], 9);
        assert_eq!(level, InterestLevel::High);
    }

    #[test]
    fn short_conversations_default_low() {
        assert_eq!(determine_interest_level("", &[], 2), InterestLevel::Low);
        assert_eq!(determine_interest_level("", &[], 5), InterestLevel::Medium);
    }
}
