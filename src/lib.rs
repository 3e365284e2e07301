//! Conversation orchestration for an AI portfolio assistant.
//!
//! One stateless pipeline: a guardrail classifies every incoming message, a
//! tool-calling agent answers allowed ones from an embedded knowledge base,
//! and a post-conversation manager summarizes, scores, and emails a digest of
//! finished conversations.

pub mod agent;
pub mod config;
pub mod email;
pub mod error;
pub mod guardrail;
pub mod knowledge;
pub mod llm;
pub mod manager;
pub mod message;
pub mod scorer;
pub mod server;
pub mod summary;
pub mod tools;

pub use agent::{AgentOutcome, AgentReply, PortfolioAgent};
pub use config::{AppConfig, MailConfig, Provider};
pub use email::{EmailContent, EmailPayload, Mailer};
pub use error::{AgentError, Result};
pub use guardrail::{Guardrail, GuardrailAction, GuardrailVerdict};
pub use knowledge::KnowledgeBase;
pub use llm::{ChatModel, Completion, OpenAiCompatClient, StubModel, ToolChoice, ToolSchema};
pub use manager::{process_conversation, summarize_only, ProcessedConversation, SummaryPreview};
pub use message::{Message, Role, ToolCall, ToolResult, Usage};
pub use scorer::{score_conversation, LeadCategory, LeadScore};
pub use server::AppState;
pub use summary::{summarize, ConversationSummary, InterestLevel};
pub use tools::{PortfolioTool, Toolbox, HIGH_VALUE_TOOLS};
