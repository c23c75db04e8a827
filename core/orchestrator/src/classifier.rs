use std::fs;
use std::path::Path;

use domain::{IntentClassification, Request, UrgencyLevel};
use regex::Regex;
use serde::Deserialize;

use crate::config::ConfigError;

const FALLBACK_HANDLER: &str = "communication";
const SECONDARY_SCORE_CUTOFF: f64 = 0.30;
const MAX_SECONDARY: usize = 2;

#[derive(Debug, Deserialize)]
struct EmergencyPatternsFile {
    patterns: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HandlerRule {
    name: String,
    patterns: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HandlerRulesFile {
    handler: Vec<HandlerRule>,
}

struct CompiledRule {
    name: String,
    patterns: Vec<Regex>,
}

/// Deterministic, rule-based classifier: `Request -> IntentClassification`.
/// Pattern tables are data (loaded from TOML), not code, and the emergency
/// list is introspectable via [`IntentClassifier::emergency_pattern_count`].
pub struct IntentClassifier {
    emergency_patterns: Vec<Regex>,
    handler_rules: Vec<CompiledRule>,
}

impl IntentClassifier {
    pub fn from_files(
        emergency_patterns_path: &Path,
        handler_rules_path: &Path,
    ) -> Result<Self, ConfigError> {
        let emergency_raw = fs::read_to_string(emergency_patterns_path)?;
        let emergency_file: EmergencyPatternsFile = toml::from_str(&emergency_raw)?;
        let emergency_patterns = compile_all(&emergency_file.patterns)?;

        let rules_raw = fs::read_to_string(handler_rules_path)?;
        let rules_file: HandlerRulesFile = toml::from_str(&rules_raw)?;
        let mut handler_rules = Vec::with_capacity(rules_file.handler.len());
        for rule in rules_file.handler {
            handler_rules.push(CompiledRule {
                name: rule.name,
                patterns: compile_all(&rule.patterns)?,
            });
        }

        Ok(Self {
            emergency_patterns,
            handler_rules,
        })
    }

    pub fn emergency_pattern_count(&self) -> usize {
        self.emergency_patterns.len()
    }

    pub fn classify(&self, request: &Request) -> IntentClassification {
        let message = request.message.to_lowercase();

        // Step 1: emergency gate, highest priority. No other handler may
        // be primary when this fires.
        let matches = self
            .emergency_patterns
            .iter()
            .filter(|re| re.is_match(&message))
            .count();
        if matches > 0 {
            let confidence = (0.70 + 0.15 * matches as f64).min(0.95);
            return IntentClassification::new(
                "triage",
                UrgencyLevel::Emergency,
                confidence,
                "emergency keywords detected",
            );
        }

        // Step 2: score all handlers.
        let scores = self.score_handlers(&message);

        if scores.is_empty() {
            return IntentClassification::new(
                FALLBACK_HANDLER,
                UrgencyLevel::Routine,
                0.30,
                "no specific handler matched, defaulting to general communication",
            );
        }

        // Step 3: selection. Ties broken by insertion order via a stable
        // sort keyed only on descending score.
        let mut ranked = scores;
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        let (primary_name, primary_score) = ranked[0].clone();

        let secondary: Vec<String> = ranked[1..]
            .iter()
            .filter(|(_, score)| *score > SECONDARY_SCORE_CUTOFF)
            .take(MAX_SECONDARY)
            .map(|(name, _)| name.clone())
            .collect();

        // Step 4: urgency adjustment.
        let mut urgency = UrgencyLevel::Routine;
        if primary_name == "triage" && primary_score > 0.60 {
            urgency = UrgencyLevel::Urgent;
        } else if message.contains("emergency") || message.contains("urgent") {
            urgency = UrgencyLevel::Urgent;
        }

        let mut classification = IntentClassification::new(
            primary_name.clone(),
            urgency,
            primary_score,
            format!("matched handler '{primary_name}' based on keyword patterns"),
        );
        classification.secondary_handlers = secondary;
        classification
    }

    fn score_handlers(&self, message: &str) -> Vec<(String, f64)> {
        let mut scores = Vec::new();
        for rule in &self.handler_rules {
            let total = rule.patterns.len();
            if total == 0 {
                continue;
            }
            let matches = rule.patterns.iter().filter(|re| re.is_match(message)).count();
            if matches > 0 {
                let base = matches as f64 / total as f64;
                let boosted = (base + 0.10 * matches as f64).min(0.95);
                scores.push((rule.name.clone(), boosted));
            }
        }
        scores
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).map_err(|e| ConfigError::InvalidPattern(e.to_string())))
        .collect()
}
