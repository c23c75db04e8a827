use serde::{Deserialize, Serialize};

use crate::urgency::UrgencyLevel;

/// Output of the intent classifier: which handler(s) to invoke and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentClassification {
    pub primary_handler: String,
    #[serde(default)]
    pub secondary_handlers: Vec<String>,
    pub urgency: UrgencyLevel,
    pub confidence: f64,
    pub reasoning: String,
}

impl IntentClassification {
    pub fn new(
        primary_handler: impl Into<String>,
        urgency: UrgencyLevel,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            primary_handler: primary_handler.into(),
            secondary_handlers: Vec::new(),
            urgency,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
        }
    }
}
