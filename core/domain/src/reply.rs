use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A handler's answer to a `Request`. This is the canonical contract;
/// every handler produces exactly this shape regardless of which base
/// trait lineage it descends from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerReply {
    pub handler_name: String,
    pub success: bool,
    #[serde(default)]
    pub data: Map<String, Value>,
    pub confidence: f64,
    pub reasoning: Option<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub requires_escalation: bool,
    #[serde(default)]
    pub suggested_handlers: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl HandlerReply {
    pub fn success(handler_name: impl Into<String>, confidence: f64) -> Self {
        Self {
            handler_name: handler_name.into(),
            success: true,
            data: Map::new(),
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: None,
            red_flags: Vec::new(),
            requires_escalation: false,
            suggested_handlers: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_red_flags(mut self, red_flags: Vec<String>) -> Self {
        self.red_flags = red_flags;
        self
    }

    pub fn escalating(mut self) -> Self {
        self.requires_escalation = true;
        self
    }
}
