use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    Moderate,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionFactor {
    pub factor: String,
    pub value: String,
    pub importance: Importance,
    pub description: String,
}

/// Reviewability metadata generated from a handler reply, independent of
/// whether the reply is clinically correct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainabilityMetadata {
    pub reasoning_summary: String,
    pub decision_factors: Vec<DecisionFactor>,
    pub alternative_considerations: Vec<String>,
    pub explainability_score: u8,
}
