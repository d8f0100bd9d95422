pub mod content_hash;
pub mod metadata;
pub mod template;

pub use content_hash::ContentHashRule;
pub use metadata::MetadataRule;
pub use template::{TemplateRule, TemplateScoring};

use crate::{RuleOutcome, signature::ImageSignature};

/// One independent scoring rule.
///
/// Implementations are pure: the same pair of signatures always yields the
/// same outcome, and missing inputs degrade to a zero score instead of an error.
pub trait Rule {
    fn apply(&self, target: &ImageSignature, candidate: &ImageSignature) -> RuleOutcome;

    /// Stable identifier, also used to look outcomes up in a `MatchResult`.
    fn name(&self) -> &str;

    /// Human-readable label for traces.
    fn label(&self) -> &str;

    fn max_score(&self) -> u32;

    fn outcome(&self, score: u32, fired: bool, rationale: String) -> RuleOutcome {
        RuleOutcome {
            rule: self.name().to_string(),
            label: self.label().to_string(),
            score: score.min(self.max_score()),
            max_score: self.max_score(),
            fired,
            rationale,
            template_hits: Vec::new(),
        }
    }

    fn unavailable(&self, reason: &str) -> RuleOutcome {
        self.outcome(0, false, format!("NO MATCH - unavailable: {reason}"))
    }
}

/// Scales a [0, 1] fraction onto `0..=max`, rounding half away from zero.
pub(crate) fn scaled_score(max: u32, fraction: f64) -> u32 {
    let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
    ((max as f64) * fraction).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_score_bounds() {
        assert_eq!(scaled_score(30, 0.9333), 28);
        assert_eq!(scaled_score(60, 1.2), 60);
        assert_eq!(scaled_score(60, -0.5), 0);
        assert_eq!(scaled_score(10, f64::NAN), 0);
        assert_eq!(scaled_score(10, 0.05), 1);
    }
}
