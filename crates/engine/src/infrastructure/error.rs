//! Command-layer error taxonomy and the correlation wrapper used for
//! private replies.

use partyhub_domain::DomainError;

use super::correlation::CorrelationId;
use super::ports::PersistenceError;

/// Errors raised while dispatching a frame or macro command. Each variant
/// maps to one private-reply shape; none of them ever produce a broadcast.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("malformed input: {0}")]
    InputError(String),

    #[error("usage: {0}")]
    CommandUsageError(String),

    #[error("mention error: {0}")]
    MentionError(String),

    #[error("permission denied: {0}")]
    PermissionError(String),

    #[error("budget exhausted: {0}")]
    BudgetError(String),

    #[error("invalid state: {0}")]
    StateError(String),

    #[error("store error: {0}")]
    StoreError(#[from] PersistenceError),

    #[error("internal error")]
    InternalError,
}

impl From<DomainError> for CommandError {
    fn from(err: DomainError) -> Self {
        CommandError::InputError(err.to_string())
    }
}

impl CommandError {
    /// Text shown to the sender, minus correlation id. Never broadcast.
    pub fn private_reply(&self) -> String {
        match self {
            CommandError::InputError(msg) => format!("Couldn't read that: {msg}"),
            CommandError::CommandUsageError(usage) => format!("Usage: {usage}"),
            CommandError::MentionError(msg) => msg.clone(),
            CommandError::PermissionError(msg) => msg.clone(),
            CommandError::BudgetError(msg) => msg.clone(),
            CommandError::StateError(msg) => msg.clone(),
            CommandError::StoreError(_) => {
                "Something went wrong saving that. Your message wasn't recorded.".to_string()
            }
            CommandError::InternalError => "Something went wrong.".to_string(),
        }
    }

    /// Whether this error class should revert an in-memory mutation already
    /// applied before the store call failed (§7: StoreError reverts).
    pub fn reverts_mutation(&self) -> bool {
        matches!(self, CommandError::StoreError(_))
    }
}

/// Pairs a [`CommandError`] with the [`CorrelationId`] logged alongside it,
/// so the private reply can tell the user "quote error id: <short>" and an
/// operator can grep logs for the same id.
#[derive(Debug)]
pub struct CommandErrorWithCorrelation {
    pub correlation_id: CorrelationId,
    pub error: CommandError,
}

impl CommandErrorWithCorrelation {
    pub fn new(error: CommandError) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            error,
        }
    }

    /// Full reply text sent to the sender, with correlation id appended
    /// when the error class warrants one (store/internal failures).
    pub fn reply_text(&self) -> String {
        match self.error {
            CommandError::StoreError(_) | CommandError::InternalError => {
                format!(
                    "{} (error id: {})",
                    self.error.private_reply(),
                    self.correlation_id.short()
                )
            }
            _ => self.error.private_reply(),
        }
    }
}

impl std::fmt::Display for CommandErrorWithCorrelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[correlation_id={}] {}", self.correlation_id, self.error)
    }
}
