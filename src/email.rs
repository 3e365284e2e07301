//! Email composition and delivery.
//!
//! The composer asks the model for a subject and HTML body and falls back to
//! a fully deterministic template when the model fails or the markers are
//! missing. The sender talks to the Mailgun messages API and deliberately
//! degrades to `false` when credentials are absent.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::config::MailConfig;
use crate::guardrail::GuardrailVerdict;
use crate::llm::{ChatModel, ToolChoice};
use crate::message::Message;
use crate::scorer::LeadCategory;
use crate::summary::{transcript_text, InterestLevel};

static SUBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)SUBJECT:\s*(.+?)(?:\n|$)").unwrap());
static HTML_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)HTML:\s*(.+)$").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const COMPOSER_INSTRUCTIONS: &str = "You are an email composer specializing in clear, concise \
HTML emails for conversation summaries. Keep the HTML simple and readable in email clients: \
clear headings, prominent score and interest level, executive summary, key topics, tools used, \
recommended action, full transcript.";

/// Everything the composer needs: merged summary + score + transcript.
#[derive(Debug, Clone)]
pub struct DigestData {
    pub executive_summary: String,
    pub key_topics: Vec<String>,
    pub interest_level: InterestLevel,
    pub tools_called: Vec<String>,
    pub recommended_action: String,
    pub score: u8,
    pub category: LeadCategory,
    pub conversation_length: usize,
    pub full_transcript: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

/// Outgoing email. Transient; derived per send, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPayload {
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Compose the digest email. Infallible: a model failure or missing markers
/// produce the deterministic fallback, which is complete on its own.
pub async fn compose_email(model: &dyn ChatModel, data: &DigestData) -> EmailContent {
    let prompt = format!(
        "Create a simple HTML email for this conversation summary:\n\n\
         QUALITY SCORE: {score}/10 ({category})\n\
         INTEREST LEVEL: {interest}\n\n\
         EXECUTIVE SUMMARY:\n{summary}\n\n\
         KEY TOPICS:\n{topics}\n\n\
         TOOLS CALLED: {tools}\n\n\
         RECOMMENDED ACTION:\n{action}\n\n\
         FULL TRANSCRIPT ({count} messages):\n{transcript}\n\n\
         Generate:\n\
         1. SUBJECT LINE (one line, clear and informative)\n\
         2. HTML EMAIL BODY (simple, clean HTML)\n\n\
         Format your response as:\n\
         SUBJECT: [subject line here]\n\n\
         HTML:\n[html content here]",
        score = data.score,
        category = data.category.as_str(),
        interest = data.interest_level.as_str(),
        summary = data.executive_summary,
        topics = data
            .key_topics
            .iter()
            .map(|t| format!("- {t}"))
            .collect::<Vec<_>>()
            .join("\n"),
        tools = if data.tools_called.is_empty() {
            "None".to_string()
        } else {
            data.tools_called.join(", ")
        },
        action = data.recommended_action,
        count = data.conversation_length,
        transcript = transcript_text(&data.full_transcript),
    );

    let default_subject = format!("Portfolio Chat Summary - Score: {}/10", data.score);
    let request = [Message::system(COMPOSER_INSTRUCTIONS), Message::user(prompt)];
    let content = match model.complete(&request, &[], ToolChoice::None).await {
        Ok(completion) => completion.content.unwrap_or_default(),
        Err(err) => {
            warn!(error = %err, "email composer model call failed, using template fallback");
            return EmailContent {
                subject: default_subject,
                html: fallback_html(data),
            };
        }
    };

    let subject = SUBJECT_RE
        .captures(&content)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or(default_subject);
    let html = HTML_RE
        .captures(&content)
        .map(|caps| clean_html(&caps[1]))
        .filter(|html| !html.is_empty())
        .unwrap_or_else(|| fallback_html(data));

    EmailContent { subject, html }
}

/// Remove markdown code fences the model sometimes wraps HTML in.
fn clean_html(html: &str) -> String {
    html.replace("```html\n", "")
        .replace("```html", "")
        .replace("```\n", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Deterministic digest template. Must be usable standalone: identical input
/// yields byte-identical output.
pub fn fallback_html(data: &DigestData) -> String {
    let score_color = match data.score {
        7.. => "#10b981",
        4..=6 => "#f59e0b",
        _ => "#6b7280",
    };

    let topics = data
        .key_topics
        .iter()
        .map(|topic| format!("<li>{topic}</li>"))
        .collect::<String>();

    let tools_section = if data.tools_called.is_empty() {
        String::new()
    } else {
        format!(
            "<div class=\"section\"><h3>Tools Used</h3><p>{}</p></div>",
            data.tools_called.join(", ")
        )
    };

    let transcript = data
        .full_transcript
        .iter()
        .map(|msg| {
            let role = format!("{:?}", msg.role).to_lowercase();
            format!(
                "<div class=\"message {role}\"><div class=\"role\">{role}</div><div>{}</div></div>",
                msg.content
            )
        })
        .collect::<String>();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <style>
    body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}
    h2 {{ color: #2563eb; border-bottom: 2px solid #2563eb; padding-bottom: 8px; }}
    .score {{ background: #f3f4f6; padding: 15px; border-radius: 8px; margin: 15px 0; }}
    .score-value {{ font-size: 24px; font-weight: bold; color: {score_color}; }}
    .section {{ margin: 20px 0; }}
    .transcript {{ background: #f9fafb; padding: 15px; border-radius: 8px; margin-top: 20px; }}
    .message {{ padding: 10px; margin: 8px 0; border-left: 3px solid #e5e7eb; }}
    .message.user {{ border-left-color: #3b82f6; }}
    .role {{ font-weight: bold; font-size: 12px; text-transform: uppercase; color: #6b7280; }}
  </style>
</head>
<body>
  <h2>Portfolio Chat Summary</h2>
  <div class="score">
    <div class="score-value">{score}/10 - {category}</div>
    <div>Interest Level: <strong>{interest}</strong></div>
  </div>
  <div class="section"><h3>Summary</h3><p>{summary}</p></div>
  <div class="section"><h3>Key Topics</h3><ul>{topics}</ul></div>
  {tools_section}
  <div class="section"><h3>Recommended Action</h3><p>{action}</p></div>
  <div class="transcript"><h3>Full Transcript ({count} messages)</h3>{transcript}</div>
  <p style="margin-top: 30px; color: #6b7280; font-size: 12px; text-align: center;">Auto-generated by the portfolio assistant</p>
</body>
</html>"#,
        score = data.score,
        category = data.category.as_str().to_uppercase(),
        interest = data.interest_level.as_str().to_uppercase(),
        summary = data.executive_summary,
        action = data.recommended_action,
        count = data.conversation_length,
    )
}

/// Urgent notification for an owner-addressed visitor message.
pub fn urgent_notification(user_message: &str, verdict: &GuardrailVerdict) -> EmailContent {
    let sensitive_banner = if verdict.is_sensitive {
        "<div style=\"background: #fef3c7; padding: 15px; border-radius: 8px; margin-top: 20px; border-left: 4px solid #f59e0b;\">\
         <p style=\"margin: 0;\"><strong>Contains Sensitive Information</strong></p>\
         <p style=\"margin: 5px 0 0 0; font-size: 14px;\">This message may contain passwords, secrets, or private data</p></div>"
    } else {
        ""
    };

    let html = format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;\">\
         <div style=\"background: #dc2626; color: white; padding: 20px; border-radius: 8px; margin-bottom: 20px;\">\
         <h2 style=\"margin: 0;\">URGENT: Message for You</h2>\
         <p style=\"margin: 10px 0 0 0;\">A visitor wants to send you a private message</p></div>\
         <div style=\"background: #f9fafb; padding: 20px; border-radius: 8px; border-left: 4px solid #dc2626;\">\
         <h3 style=\"margin-top: 0;\">Message Content:</h3>\
         <p style=\"font-size: 16px; line-height: 1.6;\">{user_message}</p></div>\
         {sensitive_banner}\
         <p style=\"margin-top: 30px; color: #6b7280; font-size: 12px;\">Intent: {intent}</p></div>",
        intent = verdict.intent,
    );

    EmailContent {
        subject: format!(
            "URGENT: Private Message from Portfolio Visitor{}",
            if verdict.is_sensitive { " (SENSITIVE)" } else { "" }
        ),
        html,
    }
}

/// Plaintext fallback derived from HTML when no explicit text is supplied.
pub fn strip_html(html: &str) -> String {
    let without_tags = TAG_RE.replace_all(html, " ");
    WHITESPACE_RE.replace_all(&without_tags, " ").trim().to_string()
}

/// Transactional email sender. Unconfigured instances log and report `false`
/// instead of failing callers.
#[derive(Clone)]
pub struct Mailer {
    http: reqwest::Client,
    config: Option<MailConfig>,
}

impl Mailer {
    pub fn new(config: Option<MailConfig>) -> Self {
        if config.is_none() {
            warn!("mail credentials not configured, email delivery disabled");
        }
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Send one email. Returns whether delivery was accepted by the provider.
    pub async fn send(&self, payload: &EmailPayload) -> bool {
        let Some(config) = &self.config else {
            warn!(to = %payload.to, "mail provider not configured, email not sent");
            return false;
        };

        let text = payload
            .text
            .clone()
            .unwrap_or_else(|| strip_html(&payload.html));
        let form = [
            ("from", config.from_email.as_str()),
            ("to", payload.to.as_str()),
            ("subject", payload.subject.as_str()),
            ("html", payload.html.as_str()),
            ("text", text.as_str()),
        ];

        let result = self
            .http
            .post(format!(
                "https://api.mailgun.net/v3/{}/messages",
                config.domain
            ))
            .basic_auth("api", Some(&config.api_key))
            .form(&form)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                error!(status = %resp.status(), "mail provider rejected the message");
                false
            }
            Err(err) => {
                error!(error = %err, "failed to send email");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Completion, StubModel};

    fn digest(score: u8) -> DigestData {
        DigestData {
            executive_summary: "Recruiter asked about backend experience.".into(),
            key_topics: vec!["Python".into(), "Availability".into()],
            interest_level: InterestLevel::High,
            tools_called: vec!["check_availability".into()],
            recommended_action: "Reply promptly.".into(),
            score,
            category: LeadCategory::from_score(score),
            conversation_length: 4,
            full_transcript: vec![
                Message::user("Are you available?"),
                Message::assistant("Yes, for contracts."),
            ],
        }
    }

    #[tokio::test]
    async fn extracts_subject_and_html_from_markers() {
        let model = StubModel::new(vec![Completion::text(
            "SUBJECT: Strong lead from a recruiter\n\nHTML:\n```html\n<html><body>hi</body></html>\n```",
        )]);
        let content = compose_email(&model, &digest(8)).await;
        assert_eq!(content.subject, "Strong lead from a recruiter");
        assert_eq!(content.html, "<html><body>hi</body></html>");
    }

    #[tokio::test]
    async fn model_failure_yields_identical_fallback_twice() {
        let data = digest(8);
        let first = compose_email(&StubModel::failing(), &data).await;
        let second = compose_email(&StubModel::failing(), &data).await;
        assert_eq!(first, second);
        assert_eq!(first.subject, "Portfolio Chat Summary - Score: 8/10");
        assert!(first.html.contains("8/10 - HIGH-VALUE"));
    }

    #[tokio::test]
    async fn missing_markers_fall_back_to_template() {
        let model = StubModel::new(vec![Completion::text("here is some prose with no markers")]);
        let content = compose_email(&model, &digest(5)).await;
        assert!(content.html.starts_with("<!DOCTYPE html>"));
        // Medium scores get the amber badge.
        assert!(content.html.contains("#f59e0b"));
    }

    #[test]
    fn fallback_badge_color_tracks_score() {
        assert!(fallback_html(&digest(9)).contains("#10b981"));
        assert!(fallback_html(&digest(5)).contains("#f59e0b"));
        assert!(fallback_html(&digest(2)).contains("#6b7280"));
    }

    #[test]
    fn fallback_omits_tools_section_when_empty() {
        let mut data = digest(5);
        data.tools_called.clear();
        assert!(!fallback_html(&data).contains("Tools Used"));
    }

    #[test]
    fn strip_html_flattens_markup() {
        assert_eq!(
            strip_html("<p>Hello <b>world</b></p>\n<p>again</p>"),
            "Hello world again"
        );
    }

    #[test]
    fn urgent_notification_flags_sensitive_messages() {
        let verdict = GuardrailVerdict {
            relevance_score: 9,
            intent: "message_for_abdul".into(),
            action: crate::guardrail::GuardrailAction::AcceptAndNotify,
            is_sensitive: true,
            suggested_response: None,
            flagged: false,
            reason: None,
        };
        let content = urgent_notification("my password is hunter2", &verdict);
        assert!(content.subject.ends_with("(SENSITIVE)"));
        assert!(content.html.contains("Contains Sensitive Information"));
    }

    #[tokio::test]
    async fn unconfigured_mailer_reports_false_without_error() {
        let mailer = Mailer::new(None);
        let sent = mailer
            .send(&EmailPayload {
                to: "owner@example.com".into(),
                subject: "test".into(),
                html: "<p>test</p>".into(),
                text: None,
            })
            .await;
        assert!(!sent);
    }
}
