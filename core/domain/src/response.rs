use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::intent::IntentClassification;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceDisplay {
    pub score_percent: u8,
    pub level: String,
    pub indicator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainabilitySummary {
    pub score: u8,
    pub reasoning_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyCheckSummary {
    pub disclaimer_applied: bool,
    pub prohibited_language_checked: bool,
    pub emergency_overlay_applied: bool,
}

/// The envelope returned to the caller and persisted (in summarized form)
/// as the audit entry's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrappedResponse {
    pub success: bool,
    pub handler: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub confidence: Option<ConfidenceDisplay>,
    pub data: Map<String, Value>,
    pub reasoning: Option<String>,
    pub disclaimer: String,
    pub audit_id: Option<String>,
    pub emergency: bool,
    pub emergency_alert: Option<String>,
    pub intent: Option<IntentClassification>,
    pub safety_check: Option<SafetyCheckSummary>,
    pub explainability: Option<ExplainabilitySummary>,
}

impl WrappedResponse {
    /// An error envelope per the §6 contract: `success=false`,
    /// `handler=null`, `confidence=null`, a non-null disclaimer, and no
    /// audit id unless the caller attaches one after a successful write.
    pub fn error(disclaimer: impl Into<String>, message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("error".to_string(), Value::String(message.into()));
        Self {
            success: false,
            handler: None,
            timestamp: Utc::now(),
            confidence: None,
            data,
            reasoning: None,
            disclaimer: disclaimer.into(),
            audit_id: None,
            emergency: false,
            emergency_alert: None,
            intent: None,
            safety_check: None,
            explainability: None,
        }
    }

    pub fn with_audit_id(mut self, audit_id: impl Into<String>) -> Self {
        self.audit_id = Some(audit_id.into());
        self
    }
}
