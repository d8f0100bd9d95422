use std::{
    fs,
    io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::{MatchResult, ProvenanceDetective, error::Result};

pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Supported image files directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("folder {} does not exist", dir.display()),
        )
        .into());
    }

    let mut images = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_supported_image(path))
        .collect::<Vec<_>>();
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(images)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleKind {
    /// Derived from a registered original; should match.
    Modified,
    /// Unrelated to every original; should be rejected.
    Random,
}

impl SampleKind {
    pub fn expected_match(&self) -> bool {
        matches!(self, SampleKind::Modified)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub name: String,
    pub path: PathBuf,
    pub kind: SampleKind,
}

impl Sample {
    pub fn new(path: PathBuf, kind: SampleKind) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        Self { name, path, kind }
    }
}

/// Modified samples first, then random ones; a missing folder contributes nothing.
pub fn collect_samples(modified: &Path, random: &Path) -> Result<Vec<Sample>> {
    let mut samples = Vec::new();

    for (dir, kind) in [(modified, SampleKind::Modified), (random, SampleKind::Random)] {
        if !dir.is_dir() {
            warn!("sample folder {} not found, skipping", dir.display());
            continue;
        }
        samples.extend(list_images(dir)?.into_iter().map(|path| Sample::new(path, kind)));
    }

    Ok(samples)
}

#[derive(Debug, Clone)]
pub enum SampleOutcome {
    Evaluated(MatchResult),
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct SampleReport {
    pub sample: Sample,
    pub outcome: SampleOutcome,
}

impl SampleReport {
    pub fn result(&self) -> Option<&MatchResult> {
        match &self.outcome {
            SampleOutcome::Evaluated(result) => Some(result),
            SampleOutcome::Failed { .. } => None,
        }
    }

    pub fn predicted_match(&self) -> bool {
        self.result().is_some_and(MatchResult::is_match)
    }

    /// Failed samples are never counted as correct.
    pub fn is_correct(&self) -> bool {
        self.result().is_some() && self.predicted_match() == self.sample.kind.expected_match()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleTally {
    pub rule: String,
    pub label: String,
    pub max_score: u32,
    pub count: usize,
    pub sum: u64,
    pub max: u32,
}

impl RuleTally {
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

/// Accuracy bookkeeping for one run. Built per worker and combined with `merge`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub total: usize,
    pub correct: usize,
    pub failed: usize,
    pub modified_total: usize,
    pub modified_correct: usize,
    pub random_total: usize,
    pub random_correct: usize,
    pub false_positives: usize,
    pub rules: Vec<RuleTally>,
}

impl RunStats {
    pub fn record(&mut self, report: &SampleReport) {
        let correct = report.is_correct();
        self.total += 1;
        self.correct += correct as usize;

        match report.sample.kind {
            SampleKind::Modified => {
                self.modified_total += 1;
                self.modified_correct += correct as usize;
            }
            SampleKind::Random => {
                self.random_total += 1;
                self.random_correct += correct as usize;
                self.false_positives += report.predicted_match() as usize;
            }
        }

        let Some(result) = report.result() else {
            self.failed += 1;
            return;
        };

        for outcome in &result.outcomes {
            let tally = self.tally_mut(&outcome.rule, &outcome.label, outcome.max_score);
            tally.count += 1;
            tally.sum += outcome.score as u64;
            tally.max = tally.max.max(outcome.score);
        }
    }

    pub fn merge(mut self, other: RunStats) -> RunStats {
        self.total += other.total;
        self.correct += other.correct;
        self.failed += other.failed;
        self.modified_total += other.modified_total;
        self.modified_correct += other.modified_correct;
        self.random_total += other.random_total;
        self.random_correct += other.random_correct;
        self.false_positives += other.false_positives;

        for theirs in other.rules {
            let tally = self.tally_mut(&theirs.rule, &theirs.label, theirs.max_score);
            tally.count += theirs.count;
            tally.sum += theirs.sum;
            tally.max = tally.max.max(theirs.max);
        }

        self
    }

    fn tally_mut(&mut self, rule: &str, label: &str, max_score: u32) -> &mut RuleTally {
        let slot = match self.rules.iter().position(|t| t.rule == rule) {
            Some(slot) => slot,
            None => {
                self.rules.push(RuleTally {
                    rule: rule.to_string(),
                    label: label.to_string(),
                    max_score,
                    ..RuleTally::default()
                });
                self.rules.len() - 1
            }
        };
        &mut self.rules[slot]
    }

    pub fn overall_accuracy(&self) -> f64 {
        percentage(self.correct, self.total)
    }

    pub fn modified_accuracy(&self) -> f64 {
        percentage(self.modified_correct, self.modified_total)
    }

    pub fn random_accuracy(&self) -> f64 {
        percentage(self.random_correct, self.random_total)
    }

    pub fn false_positive_rate(&self) -> f64 {
        percentage(self.false_positives, self.random_total)
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub samples: Vec<SampleReport>,
    pub stats: RunStats,
    pub elapsed: Duration,
}

pub struct BatchRunner {
    parallel: bool,
}

impl BatchRunner {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Evaluates every sample. A registry that is empty or incomplete aborts
    /// the run; a sample that cannot be read or decoded only fails itself.
    pub fn run(&self, detective: &ProvenanceDetective, samples: Vec<Sample>) -> Result<RunReport> {
        detective.registry().ensure_ready()?;

        let start = Instant::now();
        info!("testing {} image(s)", samples.len());

        let reports = if self.parallel {
            samples
                .into_par_iter()
                .map(|sample| Self::evaluate_sample(detective, sample))
                .collect::<Vec<_>>()
        } else {
            samples
                .into_iter()
                .map(|sample| Self::evaluate_sample(detective, sample))
                .collect::<Vec<_>>()
        };

        let stats = reports
            .par_iter()
            .fold(RunStats::default, |mut stats, report| {
                stats.record(report);
                stats
            })
            .reduce(RunStats::default, RunStats::merge);

        Ok(RunReport {
            samples: reports,
            stats,
            elapsed: start.elapsed(),
        })
    }

    fn evaluate_sample(detective: &ProvenanceDetective, sample: Sample) -> SampleReport {
        let outcome = fs::read(&sample.path)
            .map_err(Into::into)
            .and_then(|data| detective.find_best_match(&data));

        let outcome = match outcome {
            Ok(result) => {
                info!("{}: {}/100 -> {}", sample.name, result.total_score, result.best_target_id);
                SampleOutcome::Evaluated(result)
            }
            Err(err) => {
                warn!("skipping {}: {}", sample.name, err);
                SampleOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };

        SampleReport { sample, outcome }
    }
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new()
    }
}
