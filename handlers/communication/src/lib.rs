use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::{Handler, HandlerReply, Request};
use serde_json::{Map, Value};

/// A small set of plain-language definitions for common terms. Anything
/// not in the table falls back to a generic acknowledgment; this
/// handler never attempts to diagnose or prescribe, only to explain.
const KNOWLEDGE_BASE: &[(&str, &str)] = &[
    (
        "hypertension",
        "Hypertension is persistently elevated blood pressure. It is usually managed through lifestyle changes and, when needed, medication prescribed by a clinician.",
    ),
    (
        "diabetes",
        "Diabetes is a group of conditions affecting how the body regulates blood sugar. Management varies by type and is directed by a clinician.",
    ),
    (
        "asthma",
        "Asthma is a chronic condition that inflames and narrows the airways, causing wheezing and shortness of breath. It is typically managed with inhaled medication.",
    ),
];

/// Fallback general-purpose Q&A handler. Every request the classifier
/// cannot route elsewhere lands here.
pub struct CommunicationHandler {
    enabled: AtomicBool,
}

impl CommunicationHandler {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }

    fn answer(&self, question: &str) -> (String, f64) {
        let lowered = question.to_lowercase();
        for (term, definition) in KNOWLEDGE_BASE {
            if lowered.contains(term) {
                return (definition.to_string(), 0.75);
            }
        }
        (
            "I don't have a specific answer for that in my reference material. \
             Consider asking a clinician for guidance tailored to your situation."
                .to_string(),
            0.30,
        )
    }
}

impl Default for CommunicationHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for CommunicationHandler {
    fn name(&self) -> &str {
        "communication"
    }

    fn description(&self) -> &str {
        "General-purpose question answering and information lookup."
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "explain".to_string(),
            "what is".to_string(),
            "tell me about".to_string(),
            "general".to_string(),
        ]
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    async fn process(&self, request: &Request) -> Result<HandlerReply, String> {
        let question = request
            .context
            .question()
            .map(|q| q.to_string())
            .unwrap_or_else(|| request.message.clone());

        let (answer, confidence) = self.answer(&question);

        let mut data = Map::new();
        data.insert("answer".to_string(), Value::String(answer.clone()));

        Ok(HandlerReply::success(self.name(), confidence)
            .with_data(data)
            .with_reasoning(format!("Matched against the reference glossary for: \"{question}\".")))
    }
}
