use std::{fs, path::Path};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    batch::list_images,
    engine::DecisionEngine,
    error::{ProvenanceError, Result},
    registry::{Target, TargetRegistry},
    signature::{ImageSignature, SignatureExtractor, TemplateConfig},
};

pub mod analysis;
pub mod batch;
pub mod engine;
pub mod error;
pub mod image_utils;
pub mod metadata;
pub mod registry;
pub mod report;
pub mod rules;
pub mod signature;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub metadata_max: u32,
    pub content_hash_max: u32,
    pub template_max: u32,
    pub match_threshold: u32,
    /// Credit given to the colour-mode component when modes differ.
    pub mode_mismatch_credit: f64,
    pub good_confidence: f64,
    pub partial_confidence: f64,
    /// Extra template points per GOOD template, never past `template_max`.
    pub good_template_bonus: u32,
    pub template: TemplateConfig,
    pub parallel: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            metadata_max: 30,
            content_hash_max: 10,
            template_max: 60,
            match_threshold: 60,
            mode_mismatch_credit: 0.5,
            good_confidence: 0.7,
            partial_confidence: 0.4,
            good_template_bonus: 1,
            template: TemplateConfig::default(),
            parallel: true,
        }
    }
}

impl MatchConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: MatchConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn total_max(&self) -> u32 {
        self.metadata_max + self.content_hash_max + self.template_max
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ProvenanceError::InvalidConfig(msg));

        if self.total_max() != 100 {
            return invalid(format!("rule maxima must sum to 100, got {}", self.total_max()));
        }
        if !(1..=100).contains(&self.match_threshold) {
            return invalid(format!("match threshold {} outside 1..=100", self.match_threshold));
        }
        if !(self.partial_confidence > 0.0
            && self.partial_confidence <= self.good_confidence
            && self.good_confidence <= 1.0)
        {
            return invalid(format!(
                "confidence thresholds must satisfy 0 < partial ({}) <= good ({}) <= 1",
                self.partial_confidence, self.good_confidence
            ));
        }
        if !(0.0..=1.0).contains(&self.mode_mismatch_credit) {
            return invalid(format!("mode mismatch credit {} outside [0, 1]", self.mode_mismatch_credit));
        }
        if self.template.regions.is_empty() {
            return invalid("at least one template region is required".into());
        }
        if let Some(region) = self.template.regions.iter().find(|r| {
            !(0.0..=1.0).contains(&r.anchor_x) || !(0.0..=1.0).contains(&r.anchor_y)
        }) {
            return invalid(format!("template region '{}' anchor outside [0, 1]", region.name));
        }
        if !(self.template.size_fraction > 0.0 && self.template.size_fraction <= 1.0) {
            return invalid(format!("template size fraction {} outside (0, 1]", self.template.size_fraction));
        }
        if self.template.min_side > self.template.max_side {
            return invalid("template min_side exceeds max_side".into());
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Match,
    NoMatch,
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Match)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchClass {
    Good,
    Partial,
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateHit {
    pub region: String,
    pub confidence: f64,
    pub location: Option<(u32, u32)>,
    pub class: MatchClass,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub label: String,
    pub score: u32,
    pub max_score: u32,
    pub fired: bool,
    pub rationale: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub template_hits: Vec<TemplateHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub best_target_id: String,
    pub outcomes: Vec<RuleOutcome>,
    pub total_score: u32,
    pub verdict: Verdict,
}

impl MatchResult {
    pub fn outcome(&self, rule: &str) -> Option<&RuleOutcome> {
        self.outcomes.iter().find(|o| o.rule == rule)
    }

    pub fn is_match(&self) -> bool {
        self.verdict.is_match()
    }
}

/// Registers known originals and decides which one a candidate derives from.
pub struct ProvenanceDetective {
    config: MatchConfig,
    registry: TargetRegistry,
    engine: DecisionEngine,
    extractor: SignatureExtractor,
}

impl ProvenanceDetective {
    pub fn new() -> Self {
        let config = MatchConfig::default();

        Self {
            registry: TargetRegistry::new(SignatureExtractor::with_config(config.template.clone())),
            engine: DecisionEngine::from_config(&config),
            extractor: SignatureExtractor::with_config(config.template.clone()),
            config,
        }
    }

    pub fn with_config(config: MatchConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            registry: TargetRegistry::new(SignatureExtractor::with_config(config.template.clone())),
            engine: DecisionEngine::from_config(&config),
            extractor: SignatureExtractor::with_config(config.template.clone()),
            config,
        })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn register_bytes(&mut self, id: &str, data: &[u8]) -> Result<&Target> {
        self.registry.register(id, data)
    }

    pub fn register_file<P: AsRef<Path>>(&mut self, path: P) -> Result<&Target> {
        let path = path.as_ref();
        let id = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let data = fs::read(path)?;

        self.registry.register(&id, &data)
    }

    /// Registers every supported image in `folder`, in file-name order.
    ///
    /// Undecodable files are logged and left pending in the registry; the
    /// return value counts successful registrations only.
    pub fn register_folder<P: AsRef<Path>>(&mut self, folder: P) -> Result<usize> {
        let folder = folder.as_ref();
        info!("registering targets from {}", folder.display());

        let mut registered = 0;
        for path in list_images(folder)? {
            match self.register_file(&path) {
                Ok(_) => registered += 1,
                Err(err) => warn!("failed to register {}: {}", path.display(), err),
            }
        }

        info!("registered {} target image(s)", registered);
        Ok(registered)
    }

    /// Accepts a registry with failed registrations so evaluation can proceed.
    pub fn acknowledge_failures(&mut self) -> Vec<String> {
        self.registry.acknowledge_failures()
    }

    pub fn candidate_signature(&self, data: &[u8]) -> Result<ImageSignature> {
        self.extractor.extract(data, false)
    }

    pub fn evaluate(&self, candidate: &ImageSignature) -> Result<MatchResult> {
        self.engine.evaluate(candidate, &self.registry)
    }

    pub fn find_best_match(&self, data: &[u8]) -> Result<MatchResult> {
        self.registry.ensure_ready()?;
        let candidate = self.candidate_signature(data)?;
        self.evaluate(&candidate)
    }

    pub fn find_best_match_file<P: AsRef<Path>>(&self, path: P) -> Result<MatchResult> {
        let data = fs::read(path)?;
        self.find_best_match(&data)
    }
}

impl Default for ProvenanceDetective {
    fn default() -> Self {
        Self::new()
    }
}
