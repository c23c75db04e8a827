use serde::{Deserialize, Serialize};

/// The kind of prohibited content the safety wrapper detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    ProhibitedLanguage,
}

/// The fields the safety wrapper overlays onto an allowed reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyOverlay {
    pub emergency: bool,
    pub emergency_alert: Option<String>,
}

/// Outcome of running the safety wrapper's checks over a `HandlerReply`.
/// `Block` is the only terminal, blocking outcome; everything else lets
/// the pipeline continue with the (possibly overlaid) reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SafetyVerdict {
    Allow,
    AllowWithOverlay(SafetyOverlay),
    Block {
        kind: ViolationKind,
        details: String,
    },
}
