//! Post-conversation pipeline: summarize and score concurrently, then compose
//! and send the digest email.
//!
//! Summarization and scoring are independent model calls and run under a
//! single `join!`; a failure in one never contaminates the other because both
//! stages degrade internally to deterministic fallbacks.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::email::{compose_email, DigestData, EmailPayload, Mailer};
use crate::llm::ChatModel;
use crate::message::Message;
use crate::scorer::{score_conversation, LeadCategory, LeadScore};
use crate::summary::{summarize, ConversationSummary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedConversation {
    pub summary: ConversationSummary,
    pub score: LeadScore,
    pub email_sent: bool,
    /// Wall-clock duration of the whole pipeline, in milliseconds.
    pub processing_time: u64,
}

/// Preview shape: summary fields with the score merged in, no email step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPreview {
    #[serde(flatten)]
    pub summary: ConversationSummary,
    pub score: u8,
    pub category: LeadCategory,
    pub reasoning: String,
    pub signals: Vec<String>,
}

/// Run the full pipeline for a finished conversation. The digest email is
/// composed and sent only when a recipient is given.
pub async fn process_conversation(
    model: &dyn ChatModel,
    messages: &[Message],
    tools_called: &[String],
    recipient: Option<&str>,
    mailer: &Mailer,
) -> ProcessedConversation {
    let started = Instant::now();

    let (summary, score) = tokio::join!(
        summarize(model, messages, tools_called),
        score_conversation(model, messages, tools_called),
    );

    let mut email_sent = false;
    if let Some(recipient) = recipient {
        let email = compose_email(model, &digest(&summary, &score, messages)).await;
        email_sent = mailer
            .send(&EmailPayload {
                to: recipient.to_string(),
                subject: email.subject,
                html: email.html,
                text: None,
            })
            .await;
    }

    let processing_time = started.elapsed().as_millis() as u64;
    info!(
        score = score.score,
        interest = summary.interest_level.as_str(),
        email_sent,
        elapsed_ms = processing_time,
        "conversation processed"
    );

    ProcessedConversation {
        summary,
        score,
        email_sent,
        processing_time,
    }
}

/// Preview mode: same concurrent analysis, score merged into the summary,
/// never any email.
pub async fn summarize_only(
    model: &dyn ChatModel,
    messages: &[Message],
    tools_called: &[String],
) -> SummaryPreview {
    let (summary, score) = tokio::join!(
        summarize(model, messages, tools_called),
        score_conversation(model, messages, tools_called),
    );

    SummaryPreview {
        summary,
        score: score.score,
        category: score.category,
        reasoning: score.reasoning,
        signals: score.signals,
    }
}

fn digest(summary: &ConversationSummary, score: &LeadScore, messages: &[Message]) -> DigestData {
    DigestData {
        executive_summary: summary.executive_summary.clone(),
        key_topics: summary.key_topics.clone(),
        interest_level: summary.interest_level,
        tools_called: summary.tools_called.clone(),
        recommended_action: summary.recommended_action.clone(),
        score: score.score,
        category: score.category,
        conversation_length: summary.conversation_length,
        full_transcript: messages.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AgentError, Result};
    use crate::llm::{ChatModel, Completion, ToolChoice, ToolSchema};
    use crate::message::Message;
    use crate::summary::InterestLevel;
    use async_trait::async_trait;

    /// Routes on prompt content so concurrent stages can be scripted
    /// independently: scorer prompts fail, everything else succeeds.
    struct ScorerDownModel;

    #[async_trait]
    impl ChatModel for ScorerDownModel {
        async fn complete(
            &self,
            messages: &[Message],
            _tools: &[ToolSchema],
            _tool_choice: ToolChoice,
        ) -> Result<Completion> {
            let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            if prompt.starts_with("Score this conversation") {
                return Err(AgentError::Provider("scorer unavailable".into()));
            }
            Ok(Completion::text(
                "1. Executive Summary: Recruiter asked about availability.\n\
                 2. Key Topics:\n- Availability\n\
                 3. Interest Level: high\n\
                 4. Recommended Action: Follow up.",
            ))
        }
    }

    /// Counterpart: summarizer prompts fail, the scorer answers normally.
    struct SummaryDownModel;

    #[async_trait]
    impl ChatModel for SummaryDownModel {
        async fn complete(
            &self,
            messages: &[Message],
            _tools: &[ToolSchema],
            _tool_choice: ToolChoice,
        ) -> Result<Completion> {
            let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            if prompt.starts_with("Analyze this conversation") {
                return Err(AgentError::Provider("summarizer unavailable".into()));
            }
            Ok(Completion::text(
                "Score: 9\nReasoning: concrete budget and timeline\n\
                 Key Signals:\n- asked about contract terms",
            ))
        }
    }

    fn chat() -> Vec<Message> {
        vec![
            Message::user("Are you available for a contract?"),
            Message::assistant("Yes, I have capacity from next month."),
            Message::user("Great, what's the best way to reach you?"),
            Message::assistant("Email works best."),
        ]
    }

    #[tokio::test]
    async fn scorer_failure_does_not_contaminate_summary() {
        let tools = vec!["check_availability".to_string()];
        let preview = summarize_only(&ScorerDownModel, &chat(), &tools).await;

        // Summary succeeded through the model.
        assert_eq!(preview.summary.interest_level, InterestLevel::High);
        assert!(preview.summary.executive_summary.contains("availability"));
        // Scorer fell back: 2 user msgs, high-value tool (+2),
        // available (+1) + contract (+1) = 9.
        assert_eq!(preview.score, 9);
        assert_eq!(preview.category, LeadCategory::High);
    }

    #[tokio::test]
    async fn summary_failure_does_not_contaminate_score() {
        let preview = summarize_only(&SummaryDownModel, &chat(), &[]).await;

        // Summary fell back to its fixed text.
        assert!(preview
            .summary
            .executive_summary
            .contains("review the full transcript"));
        assert_eq!(preview.summary.interest_level, InterestLevel::Medium);
        // Score is the model's answer, not the heuristic (which gives 7 here).
        assert_eq!(preview.score, 9);
        assert!(preview.reasoning.contains("budget"));
    }

    #[test]
    fn preview_serializes_with_score_merged_into_summary_fields() {
        let preview = SummaryPreview {
            summary: ConversationSummary {
                executive_summary: "s".into(),
                key_topics: vec!["t".into()],
                interest_level: InterestLevel::Medium,
                tools_called: Vec::new(),
                recommended_action: "a".into(),
                conversation_length: 2,
            },
            score: 6,
            category: LeadCategory::Medium,
            reasoning: "r".into(),
            signals: vec!["s1".into()],
        };
        let value = serde_json::to_value(&preview).unwrap();
        // Flat object: summary fields and score fields side by side.
        assert_eq!(value["executiveSummary"], "s");
        assert_eq!(value["score"], 6);
        assert_eq!(value["category"], "medium-value");
    }

    #[tokio::test]
    async fn no_recipient_skips_the_email_step() {
        let mailer = Mailer::new(None);
        let result = process_conversation(&ScorerDownModel, &chat(), &[], None, &mailer).await;
        assert!(!result.email_sent);
        assert_eq!(result.summary.conversation_length, 4);
    }

    #[tokio::test]
    async fn unconfigured_mailer_reports_unsent_but_pipeline_completes() {
        let mailer = Mailer::new(None);
        let result = process_conversation(
            &ScorerDownModel,
            &chat(),
            &[],
            Some("owner@example.com"),
            &mailer,
        )
        .await;
        assert!(!result.email_sent);
        assert_eq!(result.score.score, 7);
    }
}
