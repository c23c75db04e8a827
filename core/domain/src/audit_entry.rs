use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AgentQuery,
    SafetyViolation,
    ClinicianOverride,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AgentQuery => "agent_query",
            AuditAction::SafetyViolation => "safety_violation",
            AuditAction::ClinicianOverride => "clinician_override",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicianOverride {
    pub clinician_id_hash: String,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub new_decision: String,
}

/// An immutable audit record. The only field ever mutated after the
/// initial write is `clinician_override` (plus `reviewed_by_hash`,
/// `review_timestamp`, `review_notes`), via the override path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub user_id_hash: String,
    pub handler_name: Option<String>,
    pub action: AuditAction,
    pub input_data: Map<String, Value>,
    pub output_data: Map<String, Value>,
    pub confidence_score: Option<u8>,
    pub explainability_score: Option<u8>,
    pub reasoning_summary: Option<String>,
    pub decision_factors: Option<Value>,
    pub alternatives: Option<Value>,
    pub escalation_triggered: Option<String>,
    pub safety_flags: Option<Value>,
    pub clinician_override: Option<ClinicianOverride>,
    pub reviewed_by_hash: Option<String>,
    pub review_timestamp: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
}

impl AuditEntry {
    /// Renders `audit_YYYYMMDD_<5-digit sequence>`.
    pub fn format_id(timestamp: DateTime<Utc>, id: u64) -> String {
        format!("audit_{}_{:05}", timestamp.format("%Y%m%d"), id)
    }
}
