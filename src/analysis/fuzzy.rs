//! Context-triggered piecewise hashing over raw file bytes.

use fuzzyhash::FuzzyHash;

use crate::error::{ProvenanceError, Result};

pub fn content_digest(data: &[u8]) -> String {
    FuzzyHash::new(data).to_string()
}

/// Similarity of two digests as a percentage in 0..=100.
///
/// Digests whose block sizes are neither equal nor a factor of two apart
/// share no comparable chunks, so they score 0 without a comparison.
pub fn digest_similarity(a: &str, b: &str) -> Result<u32> {
    if a.is_empty() || b.is_empty() {
        return Err(ProvenanceError::RuleUnavailable("content digest missing".into()));
    }

    if a == b {
        return Ok(100);
    }

    let (size_a, size_b) = (block_size(a)?, block_size(b)?);
    if size_a != size_b && size_a != size_b * 2 && size_b != size_a * 2 {
        return Ok(0);
    }

    FuzzyHash::compare(a, b)
        .map(|score| score.min(100))
        .map_err(|err| ProvenanceError::RuleUnavailable(format!("digest comparison failed: {err:?}")))
}

/// Leading `blocksize:` field of a digest.
fn block_size(digest: &str) -> Result<u64> {
    digest
        .split_once(':')
        .and_then(|(size, _)| size.parse().ok())
        .ok_or_else(|| ProvenanceError::RuleUnavailable(format!("malformed content digest '{digest}'")))
}
