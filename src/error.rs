use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Bad caller input. Surfaced verbatim with HTTP 400.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The model provider rejected our credentials. Mapped to HTTP 401.
    #[error("provider authentication failed: {0}")]
    Auth(String),

    /// The model or email provider failed. Mapped to HTTP 500 unless the
    /// component has a fallback path.
    #[error("provider error: {0}")]
    Provider(String),

    /// Structured extraction from a free-text model response failed. Always
    /// recovered locally via a heuristic or template fallback.
    #[error("unparseable model output: {0}")]
    Parse(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// HTTP status the error maps to at the API boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            AgentError::Validation(_) => 400,
            AgentError::Auth(_) => 401,
            _ => 500,
        }
    }
}
