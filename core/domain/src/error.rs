use thiserror::Error;

/// The §7 error taxonomy. Every variant carries enough structure to
/// build an error envelope without parsing a message string.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("empty or malformed request: {0}")]
    InputInvalid(String),

    #[error("handler '{0}' is unavailable")]
    HandlerUnavailable(String),

    #[error("handler '{handler}' failed: {detail}")]
    HandlerFailure { handler: String, detail: String },

    #[error("safety violation ({kind}): {detail}")]
    SafetyViolation { kind: String, detail: String },

    #[error("safety wrapper failed: {0}")]
    WrapperFailure(String),

    #[error("audit write failed: {0}")]
    AuditFailure(String),

    #[error("handler '{0}' exceeded its deadline")]
    DeadlineExceeded(String),
}

impl OrchestratorError {
    /// Whether this error still requires an audit write per §7's
    /// propagation policy (`HandlerFailure`, `SafetyViolation`, and
    /// `DeadlineExceeded` are audited; `InputInvalid` and
    /// `HandlerUnavailable` are not, since there is no semantic content
    /// or successful handler selection to audit).
    pub fn requires_audit_write(&self) -> bool {
        matches!(
            self,
            OrchestratorError::HandlerFailure { .. }
                | OrchestratorError::SafetyViolation { .. }
                | OrchestratorError::DeadlineExceeded(_)
                | OrchestratorError::WrapperFailure(_)
        )
    }

    pub fn short_message(&self) -> String {
        match self {
            OrchestratorError::InputInvalid(_) => {
                "Empty message. Please provide a valid query.".to_string()
            }
            OrchestratorError::HandlerUnavailable(name) => {
                format!("Handler '{name}' not found or disabled.")
            }
            OrchestratorError::HandlerFailure { .. } => {
                "An error occurred while processing your request.".to_string()
            }
            OrchestratorError::SafetyViolation { .. } => {
                "The generated response violated safety boundaries. This has been logged."
                    .to_string()
            }
            OrchestratorError::WrapperFailure(_) => {
                "An error occurred while applying safety checks.".to_string()
            }
            OrchestratorError::AuditFailure(_) => {
                "Unable to record this interaction. Please try again.".to_string()
            }
            OrchestratorError::DeadlineExceeded(name) => {
                format!("Handler '{name}' took too long to respond.")
            }
        }
    }
}
