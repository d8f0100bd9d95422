use log::debug;

use crate::{
    MatchConfig, MatchResult, RuleOutcome, Verdict,
    error::{ProvenanceError, Result},
    registry::{Target, TargetRegistry},
    rules::{ContentHashRule, MetadataRule, Rule, TemplateRule, TemplateScoring},
    signature::ImageSignature,
};

pub type BoxedRule = Box<dyn Rule + Send + Sync>;

/// Scores a candidate against every registered target and keeps the best.
pub struct DecisionEngine {
    rules: Vec<BoxedRule>,
    threshold: u32,
}

impl DecisionEngine {
    pub fn new(rules: Vec<BoxedRule>, threshold: u32) -> Self {
        Self { rules, threshold }
    }

    /// The standard metadata, content-hash and template rules, in that order.
    pub fn from_config(config: &MatchConfig) -> Self {
        let rules: Vec<BoxedRule> = vec![
            Box::new(MetadataRule::new(config.metadata_max, config.mode_mismatch_credit)),
            Box::new(ContentHashRule::new(config.content_hash_max)),
            Box::new(TemplateRule::new(TemplateScoring {
                max_score: config.template_max,
                good_confidence: config.good_confidence,
                partial_confidence: config.partial_confidence,
                good_bonus: config.good_template_bonus,
                flat_variance: config.template.flat_variance,
            })),
        ];

        Self::new(rules, config.match_threshold)
    }

    pub fn with_rule(mut self, rule: BoxedRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[BoxedRule] {
        &self.rules
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn verdict(&self, total_score: u32) -> Verdict {
        if total_score >= self.threshold {
            Verdict::Match
        } else {
            Verdict::NoMatch
        }
    }

    /// Runs every rule for one (target, candidate) pair.
    pub fn score_pair(&self, target: &Target, candidate: &ImageSignature) -> (u32, Vec<RuleOutcome>) {
        let outcomes = self
            .rules
            .iter()
            .map(|rule| rule.apply(&target.signature, candidate))
            .collect::<Vec<_>>();
        let total = outcomes.iter().map(|o| o.score).sum();

        (total, outcomes)
    }

    pub fn evaluate(&self, candidate: &ImageSignature, registry: &TargetRegistry) -> Result<MatchResult> {
        registry.ensure_ready()?;

        let mut best: Option<(&Target, u32, Vec<RuleOutcome>)> = None;

        for target in registry.all_targets() {
            let (total, outcomes) = self.score_pair(target, candidate);
            debug!("candidate vs {}: {}", target.id, total);

            // Strict comparison: the earliest registered target wins ties.
            if best.as_ref().is_none_or(|(_, best_total, _)| total > *best_total) {
                best = Some((target, total, outcomes));
            }
        }

        let Some((target, total_score, outcomes)) = best else {
            return Err(ProvenanceError::EmptyRegistry);
        };

        Ok(MatchResult {
            best_target_id: target.id.clone(),
            outcomes,
            total_score,
            verdict: self.verdict(total_score),
        })
    }
}
