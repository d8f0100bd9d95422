use log::debug;

use crate::{
    RuleOutcome,
    rules::{Rule, scaled_score},
    signature::ImageSignature,
};

/// Compares file size, pixel dimensions and colour mode.
pub struct MetadataRule {
    max_score: u32,
    mode_mismatch_credit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetadataRatios {
    pub size_ratio: f64,
    pub width_ratio: f64,
    pub height_ratio: f64,
    pub dim_ratio: f64,
    pub mode_match: f64,
}

impl MetadataRatios {
    pub fn mean(&self) -> f64 {
        (self.size_ratio + self.dim_ratio + self.mode_match) / 3.0
    }
}

impl MetadataRule {
    pub fn new(max_score: u32, mode_mismatch_credit: f64) -> Self {
        Self {
            max_score,
            mode_mismatch_credit,
        }
    }

    pub fn ratios(&self, target: &ImageSignature, candidate: &ImageSignature) -> MetadataRatios {
        let width_ratio = min_max_ratio(target.width as f64, candidate.width as f64);
        let height_ratio = min_max_ratio(target.height as f64, candidate.height as f64);

        MetadataRatios {
            size_ratio: min_max_ratio(target.file_size as f64, candidate.file_size as f64),
            width_ratio,
            height_ratio,
            dim_ratio: width_ratio.min(height_ratio),
            mode_match: if target.color_mode == candidate.color_mode {
                1.0
            } else {
                self.mode_mismatch_credit
            },
        }
    }
}

impl Default for MetadataRule {
    fn default() -> Self {
        Self::new(30, 0.5)
    }
}

impl Rule for MetadataRule {
    fn apply(&self, target: &ImageSignature, candidate: &ImageSignature) -> RuleOutcome {
        let ratios = self.ratios(target, candidate);
        let score = scaled_score(self.max_score, ratios.mean());
        let fired = score * 2 >= self.max_score && score > 0;

        debug!("metadata rule: {:?} -> {}", ratios, score);

        let rationale = format!(
            "{} - size ratio {:.3}, dimension ratio {:.3} (w {:.3}, h {:.3}), mode {}/{} {:.3}",
            if fired { "FIRED" } else { "NO MATCH" },
            ratios.size_ratio,
            ratios.dim_ratio,
            ratios.width_ratio,
            ratios.height_ratio,
            target.color_mode,
            candidate.color_mode,
            ratios.mode_match,
        );

        self.outcome(score, fired, rationale)
    }

    fn name(&self) -> &str {
        "metadata"
    }

    fn label(&self) -> &str {
        "Metadata"
    }

    fn max_score(&self) -> u32 {
        self.max_score
    }
}

fn min_max_ratio(a: f64, b: f64) -> f64 {
    if a <= 0.0 || b <= 0.0 {
        return 0.0;
    }
    a.min(b) / a.max(b)
}
