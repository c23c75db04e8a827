use serde::{Deserialize, Serialize};

/// A coarse bucket derived from a raw confidence score in `[0.0, 1.0]`.
///
/// Derivation is total: every finite `f64` maps to exactly one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryLow,
    Low,
    Moderate,
    High,
}

impl ConfidenceLevel {
    /// `[0.80, 1.0] -> High`, `[0.50, 0.80) -> Moderate`,
    /// `[0.20, 0.50) -> Low`, everything else -> `VeryLow`.
    pub fn derive(confidence: f64) -> Self {
        if confidence >= 0.80 {
            ConfidenceLevel::High
        } else if confidence >= 0.50 {
            ConfidenceLevel::Moderate
        } else if confidence >= 0.20 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::VeryLow => "very_low",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Moderate => "moderate",
            ConfidenceLevel::High => "high",
        }
    }

    /// Stable glyph per level, used in the wrapped response's confidence
    /// indicator.
    pub fn indicator(&self) -> &'static str {
        match self {
            ConfidenceLevel::VeryLow => "!!",
            ConfidenceLevel::Low => "!",
            ConfidenceLevel::Moderate => "~",
            ConfidenceLevel::High => "+",
        }
    }
}
