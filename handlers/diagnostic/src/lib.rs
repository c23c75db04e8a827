use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::{Handler, HandlerReply, Request};
use serde_json::{Map, Value};

/// A condition and the symptom keywords associated with it. Purely a
/// keyword-overlap scorer, not a clinical inference engine — the
/// suggestions are differential starting points for a clinician, not a
/// diagnosis.
struct ConditionProfile {
    name: &'static str,
    keywords: &'static [&'static str],
}

const CONDITIONS: &[ConditionProfile] = &[
    ConditionProfile {
        name: "viral upper respiratory infection",
        keywords: &["cough", "sore throat", "runny nose", "congestion", "low fever"],
    },
    ConditionProfile {
        name: "migraine",
        keywords: &["headache", "nausea", "light sensitivity", "throbbing"],
    },
    ConditionProfile {
        name: "gastroenteritis",
        keywords: &["nausea", "vomiting", "diarrhea", "abdominal pain"],
    },
    ConditionProfile {
        name: "tension headache",
        keywords: &["headache", "neck stiffness", "stress"],
    },
    ConditionProfile {
        name: "seasonal allergies",
        keywords: &["sneezing", "itchy eyes", "runny nose", "congestion"],
    },
];

/// Keyword-overlap differential generator over the symptoms a caller
/// reports. Always defers to a clinician; never states a diagnosis as
/// fact.
pub struct DiagnosticHandler {
    enabled: AtomicBool,
}

impl DiagnosticHandler {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }

    fn rank_conditions(&self, symptoms: &[String]) -> Vec<(&'static str, f64)> {
        let lowered: Vec<String> = symptoms.iter().map(|s| s.to_lowercase()).collect();
        let mut ranked: Vec<(&'static str, f64)> = CONDITIONS
            .iter()
            .filter_map(|profile| {
                let matches = profile
                    .keywords
                    .iter()
                    .filter(|kw| lowered.iter().any(|s| s.contains(*kw)))
                    .count();
                if matches == 0 {
                    return None;
                }
                let score = matches as f64 / profile.keywords.len() as f64;
                Some((profile.name, score))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        ranked
    }
}

impl Default for DiagnosticHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for DiagnosticHandler {
    fn name(&self) -> &str {
        "diagnostic"
    }

    fn description(&self) -> &str {
        "Keyword-overlap differential support over reported symptoms. Not a diagnosis."
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "symptoms".to_string(),
            "diagnosis".to_string(),
            "condition".to_string(),
            "differential".to_string(),
        ]
    }

    fn confidence_threshold(&self) -> f64 {
        0.25
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    async fn process(&self, request: &Request) -> Result<HandlerReply, String> {
        let symptoms = request
            .context
            .symptoms
            .clone()
            .unwrap_or_else(|| vec![request.message.clone()]);

        let ranked = self.rank_conditions(&symptoms);

        if ranked.is_empty() {
            return Ok(HandlerReply::success(self.name(), 0.20).with_reasoning(
                "No symptom keywords matched the known differential set. A clinician \
                 evaluation is recommended for an accurate assessment."
                    .to_string(),
            ));
        }

        let top_confidence = ranked[0].1.min(0.90);
        let suggested_handlers: Vec<String> = ranked.iter().map(|(name, _)| name.to_string()).collect();

        let mut data = Map::new();
        data.insert(
            "symptom_count".to_string(),
            Value::Number(symptoms.len().into()),
        );

        let reasoning = format!(
            "Symptom keywords overlap most strongly with '{}' ({} candidate condition(s) considered).",
            ranked[0].0,
            ranked.len()
        );

        let mut reply = HandlerReply::success(self.name(), top_confidence)
            .with_data(data)
            .with_reasoning(reasoning);
        reply.suggested_handlers = suggested_handlers;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matching_symptoms_produce_ranked_suggestions() {
        let handler = DiagnosticHandler::new();
        let mut request = Request::new("u1", "symptom check");
        request.context.symptoms = Some(vec![
            "headache".to_string(),
            "nausea".to_string(),
            "light sensitivity".to_string(),
        ]);
        let reply = handler.process(&request).await.expect("process");
        assert_eq!(reply.suggested_handlers.first().map(String::as_str), Some("migraine"));
        assert!(reply.confidence > 0.0);
    }

    #[tokio::test]
    async fn no_match_returns_low_confidence_with_empty_suggestions() {
        let handler = DiagnosticHandler::new();
        let mut request = Request::new("u1", "symptom check");
        request.context.symptoms = Some(vec!["unrelated gibberish".to_string()]);
        let reply = handler.process(&request).await.expect("process");
        assert!(reply.suggested_handlers.is_empty());
        assert!(reply.confidence <= 0.30);
    }
}
