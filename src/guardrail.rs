//! Input guardrail: moderation and relevance classification.
//!
//! Every user message is classified before it reaches the agent. The model
//! provides the primary signal; every extracted field falls back to a
//! deterministic keyword heuristic, so an unavailable model can never block
//! this step.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm::{ChatModel, ToolChoice};
use crate::message::Message;

const HARMFUL_KEYWORDS: [&str; 4] = ["hack", "exploit", "illegal", "abuse"];

const PROFESSIONAL_KEYWORDS: [&str; 9] = [
    "experience",
    "project",
    "skill",
    "work",
    "hire",
    "available",
    "contact",
    "resume",
    "portfolio",
];

const SENSITIVE_KEYWORDS: [&str; 7] = [
    "password",
    "secret",
    "private",
    "confidential",
    "sensitive",
    "don't share",
    "between us",
];

static SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)relevance score[:\s]*(\d+)").unwrap());
static INTENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)intent[:\s]*([a-z_]+)").unwrap());
static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)action[:\s]*(allow|soft-redirect|hard-redirect|block|accept_and_notify)")
        .unwrap()
});
static SENSITIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)is sensitive[:\s]*(true|false)").unwrap());
static SUGGESTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)suggested response[:\s]*(.+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardrailAction {
    #[serde(rename = "allow")]
    Allow,
    #[serde(rename = "soft-redirect")]
    SoftRedirect,
    #[serde(rename = "hard-redirect")]
    HardRedirect,
    #[serde(rename = "block")]
    Block,
    #[serde(rename = "accept_and_notify")]
    AcceptAndNotify,
}

/// Classification of one incoming user message. Computed fresh per message,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardrailVerdict {
    pub relevance_score: u8,
    pub intent: String,
    pub action: GuardrailAction,
    pub is_sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_response: Option<String>,
    pub flagged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Moderation/relevance classifier for a named portfolio owner.
#[derive(Debug, Clone)]
pub struct Guardrail {
    owner: String,
}

impl Default for Guardrail {
    fn default() -> Self {
        Self::new(crate::knowledge::KnowledgeBase.owner_first_name())
    }
}

impl Guardrail {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into().to_lowercase(),
        }
    }

    /// Classify a user message. Pure with respect to everything but the model
    /// call, and infallible: model failure degrades to the keyword heuristic.
    pub async fn classify(&self, model: &dyn ChatModel, user_message: &str) -> GuardrailVerdict {
        let messages = [
            Message::system(self.instructions()),
            Message::user(self.analysis_prompt(user_message)),
        ];

        let analysis = match model.complete(&messages, &[], ToolChoice::None).await {
            Ok(completion) => completion.content.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "guardrail model call failed, using heuristic fallback");
                return self.fallback(user_message);
            }
        };

        let relevance_score = SCORE_RE
            .captures(&analysis)
            .and_then(|caps| caps[1].parse::<u64>().ok())
            .map(|score| score.min(10) as u8)
            .unwrap_or_else(|| self.fallback(user_message).relevance_score);

        let intent = INTENT_RE
            .captures(&analysis)
            .map(|caps| caps[1].to_lowercase())
            .unwrap_or_else(|| "professional_inquiry".into());

        let action = ACTION_RE
            .captures(&analysis)
            .and_then(|caps| parse_action(&caps[1]))
            .unwrap_or_else(|| self.determine_action(relevance_score, user_message));

        let is_sensitive = SENSITIVE_RE
            .captures(&analysis)
            .map(|caps| caps[1].eq_ignore_ascii_case("true"))
            .unwrap_or(false)
            || contains_any(user_message, &SENSITIVE_KEYWORDS);

        let suggested_response = SUGGESTED_RE
            .captures(&analysis)
            .map(|caps| caps[1].trim().to_string())
            .filter(|s| !s.is_empty());

        let flagged = action == GuardrailAction::Block;
        GuardrailVerdict {
            relevance_score,
            intent,
            action,
            is_sensitive,
            suggested_response: match action {
                GuardrailAction::Allow | GuardrailAction::AcceptAndNotify => None,
                _ => suggested_response,
            },
            flagged,
            reason: flagged.then(|| "Content flagged as inappropriate or spam".into()),
        }
    }

    /// Deterministic keyword heuristic used when the model is unavailable or
    /// its output is unparseable.
    pub fn fallback(&self, user_message: &str) -> GuardrailVerdict {
        let lower = user_message.to_lowercase();

        if contains_any(&lower, &HARMFUL_KEYWORDS) {
            return GuardrailVerdict {
                relevance_score: 0,
                intent: "harmful".into(),
                action: GuardrailAction::Block,
                is_sensitive: contains_any(&lower, &SENSITIVE_KEYWORDS),
                suggested_response: None,
                flagged: true,
                reason: Some("Content flagged as potentially harmful".into()),
            };
        }

        let hits = PROFESSIONAL_KEYWORDS
            .iter()
            .filter(|keyword| lower.contains(*keyword))
            .count() as u8;
        let relevance_score = (hits * 2 + 3).min(10);

        GuardrailVerdict {
            relevance_score,
            intent: "professional_inquiry".into(),
            action: self.determine_action(relevance_score, user_message),
            is_sensitive: contains_any(&lower, &SENSITIVE_KEYWORDS),
            suggested_response: None,
            flagged: false,
            reason: None,
        }
    }

    /// Action policy, in priority order: owner-addressed messages win, then
    /// relevance thresholds.
    fn determine_action(&self, relevance_score: u8, message: &str) -> GuardrailAction {
        if self.is_message_for_owner(message) {
            return GuardrailAction::AcceptAndNotify;
        }
        match relevance_score {
            7.. => GuardrailAction::Allow,
            4..=6 => GuardrailAction::SoftRedirect,
            1..=3 => GuardrailAction::HardRedirect,
            0 => GuardrailAction::Block,
        }
    }

    fn is_message_for_owner(&self, message: &str) -> bool {
        let lower = message.to_lowercase();
        let owner = &self.owner;
        [
            format!("tell {owner}"),
            format!("let {owner} know"),
            format!("pass this to {owner}"),
            format!("give {owner}"),
            format!("message for {owner}"),
            format!("{owner} should know"),
        ]
        .iter()
        .any(|pattern| lower.contains(pattern))
    }

    fn instructions(&self) -> String {
        format!(
            "You are a content moderation and relevance analyzer for a professional portfolio chat.\n\
             Evaluate incoming messages for SAFETY, RELEVANCE to {owner}'s portfolio, skills, \
             experience or professional services, and INTENT.\n\n\
             RELEVANCE SCALE (0-10): 10 highly relevant (specific projects, skills, availability, \
             scheduling); 7-9 relevant; 4-6 somewhat relevant; 1-3 off-topic but not harmful; \
             0 completely irrelevant or inappropriate.\n\n\
             INTENT CATEGORIES: professional_inquiry, job_opportunity, collaboration, learning, \
             social, message_for_{owner}, spam, harmful.\n\n\
             If the user wants to pass a private message or note to {owner} (\"tell {owner} that...\", \
             \"my password is...\", sensitive info), mark intent message_for_{owner} and action \
             accept_and_notify.\n\n\
             Respond with:\n\
             1. Relevance Score (0-10)\n\
             2. Intent\n\
             3. Action (allow/soft-redirect/hard-redirect/block/accept_and_notify)\n\
             4. Suggested Response (if redirect needed)\n\
             5. Is Sensitive (true/false)",
            owner = self.owner
        )
    }

    fn analysis_prompt(&self, user_message: &str) -> String {
        format!(
            "Analyze this user message:\n\nMESSAGE: \"{user_message}\"\n\n\
             Provide:\n\
             1. Relevance Score (0-10)\n\
             2. Intent\n\
             3. Action\n\
             4. Suggested Response (if redirecting)\n\
             5. Is Sensitive (true/false)"
        )
    }
}

fn parse_action(raw: &str) -> Option<GuardrailAction> {
    match raw.to_lowercase().as_str() {
        "allow" => Some(GuardrailAction::Allow),
        "soft-redirect" => Some(GuardrailAction::SoftRedirect),
        "hard-redirect" => Some(GuardrailAction::HardRedirect),
        "block" => Some(GuardrailAction::Block),
        "accept_and_notify" => Some(GuardrailAction::AcceptAndNotify),
        _ => None,
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|needle| lower.contains(needle))
}
