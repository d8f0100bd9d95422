use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};

use crate::{
    error::{ProvenanceError, Result},
    signature::{ImageSignature, SignatureExtractor},
};

/// A registered original.
#[derive(Debug, Clone)]
pub struct Target {
    pub id: String,
    pub signature: ImageSignature,
}

/// In-memory set of originals, kept in registration order.
///
/// Failed registrations are remembered until the same id registers
/// successfully or the failures are acknowledged; until then the registry is
/// not ready for evaluation.
pub struct TargetRegistry {
    extractor: SignatureExtractor,
    targets: Vec<Target>,
    index: HashMap<String, usize>,
    failures: BTreeMap<String, String>,
}

impl TargetRegistry {
    pub fn new(extractor: SignatureExtractor) -> Self {
        Self {
            extractor,
            targets: Vec::new(),
            index: HashMap::new(),
            failures: BTreeMap::new(),
        }
    }

    /// Registers `data` under `id`. An existing entry with the same id is
    /// replaced in place, keeping its original position.
    pub fn register(&mut self, id: &str, data: &[u8]) -> Result<&Target> {
        let signature = match self.extractor.extract(data, true) {
            Ok(signature) => signature,
            Err(err) => {
                warn!("target {} could not be decoded: {}", id, err);
                self.failures.insert(id.to_string(), err.to_string());
                return Err(err);
            }
        };

        self.failures.remove(id);
        let target = Target {
            id: id.to_string(),
            signature,
        };

        let slot = match self.index.get(id) {
            Some(&slot) => {
                debug!("target {} re-registered, replacing previous entry", id);
                self.targets[slot] = target;
                slot
            }
            None => {
                self.targets.push(target);
                self.index.insert(id.to_string(), self.targets.len() - 1);
                self.targets.len() - 1
            }
        };

        let signature = &self.targets[slot].signature;
        debug!(
            "registered target {} ({:?}, {}, {} templates)",
            id,
            signature.format,
            signature
                .camera
                .as_ref()
                .map_or_else(|| "no camera metadata".to_string(), |camera| camera.describe()),
            signature.region_templates.len()
        );
        Ok(&self.targets[slot])
    }

    pub fn all_targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn get(&self, id: &str) -> Option<&Target> {
        self.index.get(id).map(|&slot| &self.targets[slot])
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Ids whose last registration attempt failed, with the failure reason.
    pub fn failures(&self) -> &BTreeMap<String, String> {
        &self.failures
    }

    pub fn acknowledge_failures(&mut self) -> Vec<String> {
        let ids = self.failures.keys().cloned().collect::<Vec<_>>();
        for (id, reason) in &self.failures {
            warn!("proceeding without target {}: {}", id, reason);
        }
        self.failures.clear();
        ids
    }

    pub fn ensure_ready(&self) -> Result<()> {
        if !self.failures.is_empty() {
            return Err(ProvenanceError::IncompleteRegistry(
                self.failures.keys().cloned().collect(),
            ));
        }
        if self.targets.is_empty() {
            return Err(ProvenanceError::EmptyRegistry);
        }
        Ok(())
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new(SignatureExtractor::new())
    }
}
