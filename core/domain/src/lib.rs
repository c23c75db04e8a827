pub mod audit_entry;
pub mod confidence;
pub mod error;
pub mod explainability;
pub mod handler;
pub mod intent;
pub mod reply;
pub mod request;
pub mod response;
pub mod safety;
pub mod urgency;

pub use audit_entry::{AuditAction, AuditEntry};
pub use confidence::ConfidenceLevel;
pub use error::OrchestratorError;
pub use explainability::{DecisionFactor, ExplainabilityMetadata, Importance};
pub use handler::Handler;
pub use intent::IntentClassification;
pub use reply::HandlerReply;
pub use request::{HandlerContext, Request};
pub use response::{ConfidenceDisplay, WrappedResponse};
pub use safety::{SafetyVerdict, ViolationKind};
pub use urgency::UrgencyLevel;
