use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::{Handler, HandlerReply, Request};
use serde_json::{Map, Value};

struct DrugEntry {
    name: &'static str,
    summary: &'static str,
    common_side_effects: &'static [&'static str],
}

/// Educational-only reference table. Dosage information is intentionally
/// absent: this handler never recommends a dose or a prescribing
/// decision.
const DRUGS: &[DrugEntry] = &[
    DrugEntry {
        name: "ibuprofen",
        summary: "A nonsteroidal anti-inflammatory drug (NSAID) used for pain, inflammation, and fever.",
        common_side_effects: &["stomach upset", "heartburn", "dizziness"],
    },
    DrugEntry {
        name: "metformin",
        summary: "A first-line oral medication for type 2 diabetes that lowers blood glucose production by the liver.",
        common_side_effects: &["nausea", "diarrhea", "vitamin B12 deficiency with long-term use"],
    },
    DrugEntry {
        name: "lisinopril",
        summary: "An ACE inhibitor commonly prescribed for high blood pressure and heart failure.",
        common_side_effects: &["dry cough", "dizziness", "elevated potassium"],
    },
];

/// Educational drug-information lookup. Never prescriptive: no dosing
/// guidance, no administration timing, no recommendation to start or
/// stop a medication.
pub struct DrugInfoHandler {
    enabled: AtomicBool,
}

impl DrugInfoHandler {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }

    fn lookup(&self, query: &str) -> Option<&'static DrugEntry> {
        let lowered = query.to_lowercase();
        DRUGS.iter().find(|drug| lowered.contains(drug.name))
    }
}

impl Default for DrugInfoHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for DrugInfoHandler {
    fn name(&self) -> &str {
        "drug_info"
    }

    fn description(&self) -> &str {
        "Educational medication reference lookup. Not a prescribing recommendation."
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "medication".to_string(),
            "drug".to_string(),
            "prescription".to_string(),
            "side effects".to_string(),
        ]
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    async fn process(&self, request: &Request) -> Result<HandlerReply, String> {
        match self.lookup(&request.message) {
            Some(drug) => {
                let mut data = Map::new();
                data.insert("drug_name".to_string(), Value::String(drug.name.to_string()));
                data.insert(
                    "side_effects".to_string(),
                    Value::Array(
                        drug.common_side_effects
                            .iter()
                            .map(|s| Value::String(s.to_string()))
                            .collect(),
                    ),
                );

                Ok(HandlerReply::success(self.name(), 0.80)
                    .with_data(data)
                    .with_reasoning(drug.summary.to_string()))
            }
            None => Ok(HandlerReply::success(self.name(), 0.25).with_reasoning(
                "No matching entry in the reference table for this medication. \
                 Consult a pharmacist or clinician for accurate information."
                    .to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_drug_returns_side_effects() {
        let handler = DrugInfoHandler::new();
        let request = Request::new("u1", "what are the side effects of metformin?");
        let reply = handler.process(&request).await.expect("process");
        assert!(reply.confidence >= 0.70);
        assert!(reply.data.contains_key("side_effects"));
    }

    #[tokio::test]
    async fn unknown_drug_returns_low_confidence() {
        let handler = DrugInfoHandler::new();
        let request = Request::new("u1", "what about compoundium-9?");
        let reply = handler.process(&request).await.expect("process");
        assert!(reply.confidence < 0.50);
    }
}
