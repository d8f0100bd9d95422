use log::debug;

use crate::{
    MatchClass, RuleOutcome, TemplateHit,
    analysis::correlation::SearchOutcome,
    rules::{Rule, scaled_score},
    signature::ImageSignature,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateScoring {
    pub max_score: u32,
    pub good_confidence: f64,
    pub partial_confidence: f64,
    pub good_bonus: u32,
    pub flat_variance: f64,
}

impl Default for TemplateScoring {
    fn default() -> Self {
        Self {
            max_score: 60,
            good_confidence: 0.7,
            partial_confidence: 0.4,
            good_bonus: 1,
            flat_variance: 1.0,
        }
    }
}

impl TemplateScoring {
    pub fn classify(&self, confidence: f64) -> MatchClass {
        if confidence >= self.good_confidence {
            MatchClass::Good
        } else if confidence >= self.partial_confidence {
            MatchClass::Partial
        } else {
            MatchClass::NoMatch
        }
    }
}

/// Searches the candidate for each region template cut from the target.
///
/// Regions that survive a crop still locate with high confidence, so this
/// rule carries the largest share of the total.
pub struct TemplateRule {
    scoring: TemplateScoring,
}

impl TemplateRule {
    pub fn new(scoring: TemplateScoring) -> Self {
        Self { scoring }
    }

    pub fn scoring(&self) -> &TemplateScoring {
        &self.scoring
    }
}

impl Default for TemplateRule {
    fn default() -> Self {
        Self::new(TemplateScoring::default())
    }
}

impl Rule for TemplateRule {
    fn apply(&self, target: &ImageSignature, candidate: &ImageSignature) -> RuleOutcome {
        if target.region_templates.is_empty() {
            return self.unavailable("target has no region templates");
        }

        let search = candidate.correlation_search();
        let mut hits = Vec::with_capacity(target.region_templates.len());
        let mut featureless = 0;

        for template in &target.region_templates {
            let (confidence, location) = match search.search(&template.pixels, self.scoring.flat_variance) {
                SearchOutcome::Peak(peak) => (peak.confidence, Some((peak.x, peak.y))),
                SearchOutcome::TemplateTooLarge => (0.0, None),
                SearchOutcome::FlatTemplate => {
                    featureless += 1;
                    continue;
                }
            };

            debug!("template {} -> {:.3} at {:?}", template.region, confidence, location);

            hits.push(TemplateHit {
                region: template.region.clone(),
                confidence,
                location,
                class: self.scoring.classify(confidence),
            });
        }

        if hits.is_empty() {
            return self.unavailable("all region templates are featureless");
        }

        let count = |class: MatchClass| hits.iter().filter(|h| h.class == class).count();
        let (good, partial, missed) = (
            count(MatchClass::Good),
            count(MatchClass::Partial),
            count(MatchClass::NoMatch),
        );

        let average = hits.iter().map(|h| h.confidence).sum::<f64>() / hits.len() as f64;
        let best = hits.iter().map(|h| h.confidence).fold(0.0f64, f64::max);

        let bonus = self.scoring.good_bonus.saturating_mul(good as u32);
        let score = scaled_score(self.scoring.max_score, average)
            .saturating_add(bonus)
            .min(self.scoring.max_score);

        let status = if good == hits.len() {
            "STRONG MATCH"
        } else if good > 0 {
            "MATCH"
        } else if partial > 0 {
            "PARTIAL MATCH"
        } else {
            "NO MATCH"
        };

        let mut rationale = format!(
            "{status} - {} templates: {good} good, {partial} partial, {missed} no-match; best {best:.3} (avg: {average:.3})",
            hits.len()
        );
        if featureless > 0 {
            rationale.push_str(&format!(", {featureless} featureless skipped"));
        }

        let mut outcome = self.outcome(score, good + partial > 0, rationale);
        outcome.template_hits = hits;
        outcome
    }

    fn name(&self) -> &str {
        "template"
    }

    fn label(&self) -> &str {
        "Template"
    }

    fn max_score(&self) -> u32 {
        self.scoring.max_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::correlation::CorrelationSearch,
        signature::{ColorMode, RegionTemplate},
    };
    use image::{GrayImage, Luma, imageops};

    fn texture(width: u32, height: u32, seed: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let mut h = x
                .wrapping_mul(0x9E37_79B1)
                .wrapping_add(y.wrapping_mul(0x85EB_CA77))
                .wrapping_add(seed.wrapping_mul(0xC2B2_AE3D));
            h ^= h >> 16;
            h = h.wrapping_mul(0x85EB_CA6B);
            h ^= h >> 13;
            h = h.wrapping_mul(0xC2B2_AE35);
            h ^= h >> 16;
            Luma([(h >> 24) as u8])
        })
    }

    fn signature(luma: GrayImage, templates: Vec<RegionTemplate>) -> ImageSignature {
        ImageSignature {
            file_size: 1,
            width: luma.width(),
            height: luma.height(),
            color_mode: ColorMode::Grayscale,
            format: None,
            camera: None,
            content_digest: String::new(),
            luma,
            region_templates: templates,
            search: Default::default(),
        }
    }

    fn cut(luma: &GrayImage, name: &str, x: u32, y: u32, side: u32) -> RegionTemplate {
        RegionTemplate {
            region: name.into(),
            x,
            y,
            pixels: imageops::crop_imm(luma, x, y, side, side).to_image(),
        }
    }

    #[test]
    fn test_classification_thresholds() {
        let scoring = TemplateScoring::default();
        assert_eq!(scoring.classify(0.95), MatchClass::Good);
        assert_eq!(scoring.classify(0.7), MatchClass::Good);
        assert_eq!(scoring.classify(0.5), MatchClass::Partial);
        assert_eq!(scoring.classify(0.1), MatchClass::NoMatch);
    }

    #[test]
    fn test_identical_image_scores_max() {
        let luma = texture(96, 64, 1);
        let templates = vec![cut(&luma, "top-left", 0, 0, 16), cut(&luma, "bottom-right", 80, 48, 16)];
        let target = signature(luma.clone(), templates);
        let candidate = signature(luma, Vec::new());

        let outcome = TemplateRule::default().apply(&target, &candidate);
        assert_eq!(outcome.score, 60);
        assert!(outcome.fired);
        assert_eq!(outcome.template_hits.len(), 2);
        assert!(outcome.template_hits.iter().all(|h| h.class == MatchClass::Good));
        assert_eq!(outcome.template_hits[1].location, Some((80, 48)));
    }

    #[test]
    fn test_missing_templates_are_unavailable() {
        let luma = texture(32, 32, 2);
        let outcome = TemplateRule::default().apply(&signature(luma.clone(), Vec::new()), &signature(luma, Vec::new()));
        assert_eq!(outcome.score, 0);
        assert!(outcome.rationale.contains("unavailable"));
    }

    #[test]
    fn test_oversized_template_counts_as_miss() {
        let luma = texture(64, 64, 3);
        let templates = vec![cut(&luma, "center", 16, 16, 32)];
        let target = signature(luma.clone(), templates);
        let candidate = signature(imageops::crop_imm(&luma, 0, 0, 20, 20).to_image(), Vec::new());

        let outcome = TemplateRule::default().apply(&target, &candidate);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.template_hits[0].location, None);
        assert_eq!(outcome.template_hits[0].class, MatchClass::NoMatch);
    }

    #[test]
    fn test_featureless_templates_are_skipped() {
        let mut luma = texture(64, 64, 4);
        for y in 0..16 {
            for x in 0..16 {
                luma.put_pixel(x, y, Luma([200]));
            }
        }
        let templates = vec![cut(&luma, "top-left", 0, 0, 16), cut(&luma, "center", 24, 24, 16)];
        let target = signature(luma.clone(), templates);

        let outcome = TemplateRule::default().apply(&target, &signature(luma, Vec::new()));
        assert_eq!(outcome.template_hits.len(), 1);
        assert_eq!(outcome.score, 60);
        assert!(outcome.rationale.contains("1 featureless skipped"));
    }

    #[test]
    fn test_unrelated_texture_scores_low() {
        let target_luma = texture(80, 80, 5);
        let templates = vec![
            cut(&target_luma, "top-left", 0, 0, 20),
            cut(&target_luma, "center", 30, 30, 20),
            cut(&target_luma, "bottom-right", 60, 60, 20),
        ];
        let target = signature(target_luma, templates);
        let candidate = signature(texture(80, 80, 6), Vec::new());

        let outcome = TemplateRule::default().apply(&target, &candidate);
        assert!(outcome.score < 30, "score {}", outcome.score);
        assert!(!outcome.template_hits.iter().any(|h| h.class == MatchClass::Good));
    }

    #[test]
    fn test_candidate_search_state_is_reused_across_targets() {
        let luma = texture(64, 48, 7);
        let other = texture(64, 48, 8);
        let candidate = signature(luma.clone(), Vec::new());
        let first = signature(luma.clone(), vec![cut(&luma, "top-left", 0, 0, 16)]);
        let second = signature(other.clone(), vec![cut(&other, "center", 24, 16, 16)]);
        let rule = TemplateRule::default();

        assert!(candidate.search.get().is_none());
        assert_eq!(rule.apply(&first, &candidate).score, 60);
        let built = candidate.search.get().map(|s| s as *const CorrelationSearch);
        assert!(built.is_some());

        rule.apply(&second, &candidate);
        assert_eq!(candidate.search.get().map(|s| s as *const CorrelationSearch), built);
    }
}
