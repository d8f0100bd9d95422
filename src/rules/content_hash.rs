use log::debug;

use crate::{
    RuleOutcome,
    analysis::fuzzy::digest_similarity,
    error::ProvenanceError,
    rules::{Rule, scaled_score},
    signature::ImageSignature,
};

/// Byte-level similarity of the two files' piecewise digests.
///
/// Works on encoded bytes, not pixels, so resizing or recompressing an image
/// usually drives it to zero. It only carries a small share of the total.
pub struct ContentHashRule {
    max_score: u32,
}

impl ContentHashRule {
    pub fn new(max_score: u32) -> Self {
        Self { max_score }
    }
}

impl Default for ContentHashRule {
    fn default() -> Self {
        Self::new(10)
    }
}

impl Rule for ContentHashRule {
    fn apply(&self, target: &ImageSignature, candidate: &ImageSignature) -> RuleOutcome {
        let similarity = match digest_similarity(&target.content_digest, &candidate.content_digest) {
            Ok(similarity) => similarity,
            Err(err) => {
                debug!("content hash rule unavailable: {}", err);
                let reason = match err {
                    ProvenanceError::RuleUnavailable(reason) => reason,
                    other => other.to_string(),
                };
                return self.unavailable(&reason);
            }
        };

        let score = scaled_score(self.max_score, similarity as f64 / 100.0);
        let fired = similarity > 0;
        let status = match similarity {
            80.. => "STRONG MATCH",
            1.. => "FIRED",
            _ => "NO MATCH",
        };

        self.outcome(score, fired, format!("{status} - fuzzy hash similarity {similarity}%"))
    }

    fn name(&self) -> &str {
        "content_hash"
    }

    fn label(&self) -> &str {
        "Fuzzy Hash"
    }

    fn max_score(&self) -> u32 {
        self.max_score
    }
}
