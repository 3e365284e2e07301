//! Environment-driven service configuration.
//!
//! Required keys are checked up front; every missing key is reported in a
//! single aggregate error so a misconfigured deploy fails with one message.

use std::env;
use std::net::SocketAddr;

use crate::error::{AgentError, Result};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";
const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
}

impl Provider {
    fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            _ => Provider::OpenAi,
        }
    }

    pub fn api_key_var(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Gemini => "GOOGLE_API_KEY",
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => OPENAI_BASE_URL,
            Provider::Gemini => GEMINI_OPENAI_BASE_URL,
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAi => DEFAULT_OPENAI_MODEL,
            Provider::Gemini => DEFAULT_GEMINI_MODEL,
        }
    }
}

/// Mailgun credentials. All-or-nothing: when any piece is missing the mailer
/// degrades to a no-op that reports `false` instead of failing callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub api_key: String,
    pub domain: String,
    pub from_email: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    /// Recipient for urgent visitor-message notifications.
    pub notify_email: String,
    pub mail: Option<MailConfig>,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    /// Build the config from an arbitrary key lookup. Production passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = Provider::parse(&lookup("MODEL_PROVIDER").unwrap_or_else(|| "openai".into()));

        let mut missing = Vec::new();
        let api_key = lookup(provider.api_key_var()).unwrap_or_else(|| {
            missing.push(provider.api_key_var());
            String::new()
        });
        let notify_email = lookup("NOTIFY_EMAIL").unwrap_or_else(|| {
            missing.push("NOTIFY_EMAIL");
            String::new()
        });

        if !missing.is_empty() {
            return Err(AgentError::Validation(format!(
                "missing required environment variables for provider `{provider:?}`: {}",
                missing.join(", ")
            )));
        }

        let model = lookup("CHAT_MODEL").unwrap_or_else(|| provider.default_model().to_string());

        let mail = match (
            lookup("MAILGUN_API_KEY"),
            lookup("MAILGUN_DOMAIN"),
            lookup("MAILGUN_FROM_EMAIL"),
        ) {
            (Some(api_key), Some(domain), from_email) => Some(MailConfig {
                api_key,
                domain,
                from_email: from_email.unwrap_or_else(|| "portfolio@foliodesk.dev".into()),
            }),
            _ => None,
        };

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".into())
            .parse()
            .map_err(|err| AgentError::Validation(format!("invalid BIND_ADDR: {err}")))?;

        Ok(Self {
            provider,
            api_key,
            model,
            notify_email,
            mail,
            bind_addr,
        })
    }
}
