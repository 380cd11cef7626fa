use thiserror::Error;

/// Text shown to a caller when a failure has no caller-facing explanation.
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred. Please try again or contact an admin.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Failure of a single call against the guild transport.
pub enum TransportError {
    /// The target object no longer exists (for example a channel deleted concurrently).
    #[error("not found: {0}")]
    NotFound(String),
    /// The platform refused the call (missing permissions, hierarchy, validation).
    #[error("rejected by platform: {0}")]
    Rejected(String),
    #[error("transport failure: {0}")]
    Failed(String),
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Error taxonomy surfaced by voice, scheduler, and command operations.
pub enum VcWardenError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl VcWardenError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Authorization(_) => "authorization",
            Self::NotFound(_) => "not_found",
            Self::Transport(_) => "transport",
            Self::Config(_) => "config",
        }
    }

    /// Returns true for failures that are caller mistakes rather than system faults.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Authorization(_) | Self::NotFound(_)
        )
    }

    /// Message suitable for direct display to the caller.
    pub fn user_message(&self) -> String {
        if self.is_caller_error() {
            self.to_string()
        } else {
            GENERIC_FAILURE_MESSAGE.to_string()
        }
    }
}
