use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The recognized caller role. Anything else is carried in `extra`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Patient,
    Clinician,
    Admin,
}

/// Typed envelope for the context map the source passes as a free-form
/// dict into every handler. Known fields are named; anything
/// handler-specific rides along in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlerContext {
    pub task: Option<String>,
    pub user_type: Option<UserType>,
    pub symptoms: Option<Vec<String>>,
    pub vitals: Option<Map<String, Value>>,
    pub patient_context: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HandlerContext {
    pub fn is_empty(&self) -> bool {
        self.task.is_none()
            && self.user_type.is_none()
            && self.symptoms.is_none()
            && self.vitals.is_none()
            && self.patient_context.is_none()
            && self.extra.is_empty()
    }

    /// Returns the `question` extra key, if present.
    pub fn question(&self) -> Option<&str> {
        self.extra.get("question").and_then(Value::as_str)
    }

    /// Sets `extra["question"]` unless already present.
    pub fn set_question_if_absent(&mut self, message: &str) {
        self.extra
            .entry("question".to_string())
            .or_insert_with(|| Value::String(message.to_string()));
    }
}

/// A single caller request entering the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub session_id: Option<String>,
    #[serde(default)]
    pub context: HandlerContext,
    pub timestamp: DateTime<Utc>,
}

impl Request {
    pub fn new(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            message: message.into(),
            attachments: Vec::new(),
            session_id: None,
            context: HandlerContext::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn message_is_blank(&self) -> bool {
        self.message.trim().is_empty()
    }
}
