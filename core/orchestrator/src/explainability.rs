use domain::explainability::{DecisionFactor, Importance};
use domain::{ExplainabilityMetadata, HandlerReply};

/// Pure function generating reviewability metadata from a handler reply.
/// Total: every reply produces a score in `[0, 100]`.
pub struct ExplainabilityGenerator;

impl ExplainabilityGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn explain(&self, reply: &HandlerReply, handler_type: &str) -> ExplainabilityMetadata {
        let reasoning_summary = self.reasoning_summary(reply, handler_type);
        let decision_factors = self.decision_factors(reply, handler_type);
        let alternative_considerations = self.alternatives(reply, handler_type);
        let score = self.score(reply, &decision_factors, &alternative_considerations);

        ExplainabilityMetadata {
            reasoning_summary,
            decision_factors,
            alternative_considerations,
            explainability_score: score,
        }
    }

    fn reasoning_summary(&self, reply: &HandlerReply, handler_type: &str) -> String {
        let pct = (reply.confidence * 100.0).round() as i64;
        match handler_type {
            "triage" => {
                let flags = if reply.red_flags.is_empty() {
                    "no red flags".to_string()
                } else {
                    reply.red_flags.join(", ")
                };
                format!(
                    "Triage assessment at {pct}% confidence, driven by: {flags}."
                )
            }
            "diagnostic" | "diagnostic_support" => {
                let top = reply
                    .suggested_handlers
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "the top-ranked condition".to_string());
                let alt_count = reply.suggested_handlers.len().saturating_sub(1);
                format!(
                    "Diagnostic support at {pct}% confidence, naming '{top}' with {alt_count} alternative condition(s) considered."
                )
            }
            "image_analysis" => format!(
                "Image analysis at {pct}% confidence. Findings require radiologist review before any clinical action."
            ),
            "drug_info" => format!(
                "Drug information reply at {pct}% confidence. Educational and non-prescriptive; not a prescribing recommendation."
            ),
            _ => {
                let reasoning = reply.reasoning.clone().unwrap_or_default();
                format!(
                    "Handler '{}' responded at {pct}% confidence. {reasoning}",
                    reply.handler_name
                )
            }
        }
    }

    fn decision_factors(&self, reply: &HandlerReply, handler_type: &str) -> Vec<DecisionFactor> {
        let mut factors = Vec::new();

        let confidence_importance = if reply.confidence >= 0.70 {
            Importance::High
        } else {
            Importance::Moderate
        };
        factors.push(DecisionFactor {
            factor: "AI Confidence Score".to_string(),
            value: format!("{:.0}%", reply.confidence * 100.0),
            importance: confidence_importance,
            description: "Self-reported confidence of the handler in its reply.".to_string(),
        });

        if !reply.red_flags.is_empty() {
            factors.push(DecisionFactor {
                factor: "Red Flags Detected".to_string(),
                value: reply.red_flags.len().to_string(),
                importance: Importance::Critical,
                description: reply.red_flags.join("; "),
            });
        }

        if reply.reasoning.as_ref().map(|r| r.len()).unwrap_or(0) > 50 {
            factors.push(DecisionFactor {
                factor: "Detailed Reasoning Provided".to_string(),
                value: "yes".to_string(),
                importance: Importance::Moderate,
                description: "The handler supplied reasoning beyond a minimal acknowledgment."
                    .to_string(),
            });
        }

        match handler_type {
            "triage" => factors.push(DecisionFactor {
                factor: "Urgency Classification".to_string(),
                value: if reply.requires_escalation {
                    "escalation required".to_string()
                } else {
                    "routine".to_string()
                },
                importance: Importance::High,
                description: "Whether the reply requested escalation.".to_string(),
            }),
            "diagnostic" | "diagnostic_support" => factors.push(DecisionFactor {
                factor: "Symptom Count".to_string(),
                value: reply.data.len().to_string(),
                importance: Importance::Moderate,
                description: "Number of structured data fields the handler reasoned over."
                    .to_string(),
            }),
            _ => {}
        }

        factors
    }

    fn alternatives(&self, reply: &HandlerReply, handler_type: &str) -> Vec<String> {
        match handler_type {
            "diagnostic" | "diagnostic_support" => reply
                .suggested_handlers
                .iter()
                .skip(1)
                .take(3)
                .cloned()
                .collect(),
            "triage" if !reply.requires_escalation => vec![
                "Consider scheduling a routine appointment if symptoms persist.".to_string(),
                "Monitor for symptom progression and escalate if worsening.".to_string(),
            ],
            "image_analysis" => vec![
                "Seek a second opinion from a specialist.".to_string(),
                "Consider additional imaging modalities if findings are inconclusive.".to_string(),
            ],
            _ => Vec::new(),
        }
    }

    fn score(
        &self,
        reply: &HandlerReply,
        factors: &[DecisionFactor],
        alternatives: &[String],
    ) -> u8 {
        let mut score: i32 = 50;

        let reasoning_len = reply.reasoning.as_ref().map(|r| r.len()).unwrap_or(0);
        let has_substantial_reasoning = reasoning_len > 20;

        if has_substantial_reasoning {
            score += 20;
        }
        if factors.len() >= 2 {
            score += 10;
        }
        if factors.len() >= 4 {
            score += 5;
        }
        if !alternatives.is_empty() {
            score += 10;
        }
        if alternatives.len() >= 3 {
            score += 5;
        }
        if reply.confidence < 0.30 && reasoning_len == 0 {
            score -= 20;
        }
        if reply.confidence >= 0.80 && has_substantial_reasoning {
            score += 10;
        }

        score.clamp(0, 100) as u8
    }
}

impl Default for ExplainabilityGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use domain::HandlerReply;

    use super::*;

    #[test]
    fn empty_reasoning_and_low_confidence_scores_low() {
        let generator = ExplainabilityGenerator::new();
        let reply = HandlerReply::success("communication", 0.10);
        let meta = generator.explain(&reply, "communication");
        assert!(meta.explainability_score <= 30);
    }

    #[test]
    fn rich_reply_scores_maximum() {
        let generator = ExplainabilityGenerator::new();
        let mut reply = HandlerReply::success("diagnostic", 0.85)
            .with_reasoning("A detailed multi-sentence clinical reasoning narrative.")
            .with_red_flags(vec!["fever".to_string()]);
        reply.suggested_handlers = vec![
            "condition_a".to_string(),
            "condition_b".to_string(),
            "condition_c".to_string(),
            "condition_d".to_string(),
        ];
        let meta = generator.explain(&reply, "diagnostic");
        assert_eq!(meta.explainability_score, 100);
    }

    #[test]
    fn score_is_always_in_range() {
        let generator = ExplainabilityGenerator::new();
        for confidence in [0.0, 0.1, 0.3, 0.5, 0.7, 0.9, 1.0] {
            let reply = HandlerReply::success("other", confidence);
            let meta = generator.explain(&reply, "other");
            assert!(meta.explainability_score <= 100);
        }
    }

    #[test]
    fn reasoning_summary_includes_confidence_percentage() {
        let generator = ExplainabilityGenerator::new();
        let reply = HandlerReply::success("drug_info", 0.65);
        let meta = generator.explain(&reply, "drug_info");
        assert!(meta.reasoning_summary.contains("65%"));
    }
}
