use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::{Handler, HandlerReply, Request};
use tracing::debug;

/// Closed set of phrases that force escalation regardless of how the
/// request otherwise scores. Kept small and reviewable per the safety
/// design note: recall matters less than being able to audit every
/// match.
const RED_FLAG_PATTERNS: &[(&str, &str)] = &[
    ("chest pain", "possible cardiac event"),
    ("difficulty breathing", "respiratory distress"),
    ("can't breathe", "respiratory distress"),
    ("severe bleeding", "uncontrolled hemorrhage"),
    ("loss of consciousness", "altered consciousness"),
    ("suicidal", "risk of self-harm"),
    ("stroke", "possible cerebrovascular event"),
    ("seizure", "possible seizure activity"),
];

/// Symptom-severity first-pass assessment. Scans the message and any
/// structured symptoms for red-flag phrases and produces an urgency
/// signal the safety wrapper can act on.
pub struct TriageHandler {
    enabled: AtomicBool,
}

impl TriageHandler {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }

    fn find_red_flags(&self, request: &Request) -> Vec<String> {
        let mut haystack = request.message.to_lowercase();
        if let Some(symptoms) = &request.context.symptoms {
            haystack.push(' ');
            haystack.push_str(&symptoms.join(" ").to_lowercase());
        }

        RED_FLAG_PATTERNS
            .iter()
            .filter(|(phrase, _)| haystack.contains(phrase))
            .map(|(_, description)| description.to_string())
            .collect()
    }
}

impl Default for TriageHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for TriageHandler {
    fn name(&self) -> &str {
        "triage"
    }

    fn description(&self) -> &str {
        "First-pass symptom severity assessment and red-flag detection."
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "symptoms".to_string(),
            "pain".to_string(),
            "urgent".to_string(),
            "severity".to_string(),
        ]
    }

    fn confidence_threshold(&self) -> f64 {
        0.30
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    async fn process(&self, request: &Request) -> Result<HandlerReply, String> {
        let red_flags = self.find_red_flags(request);
        let symptom_count = request
            .context
            .symptoms
            .as_ref()
            .map(|s| s.len())
            .unwrap_or(0);

        debug!(red_flag_count = red_flags.len(), symptom_count, "triage pass");

        let confidence = if !red_flags.is_empty() {
            0.90
        } else if symptom_count > 0 {
            (0.40 + 0.10 * symptom_count as f64).min(0.85)
        } else {
            0.35
        };

        let reasoning = if red_flags.is_empty() {
            "No red-flag phrases detected in the message or reported symptoms.".to_string()
        } else {
            format!(
                "Red-flag phrases detected, indicating possible urgent conditions: {}.",
                red_flags.join(", ")
            )
        };

        let mut reply = HandlerReply::success(self.name(), confidence).with_reasoning(reasoning);
        if !red_flags.is_empty() {
            reply = reply.with_red_flags(red_flags).escalating();
        }
        Ok(reply)
    }
}
