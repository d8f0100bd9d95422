use std::{fmt, fs, path::Path};

use serde::Serialize;

use crate::{
    MatchResult, RuleOutcome,
    batch::{RunReport, RunStats, SampleKind, SampleOutcome, SampleReport},
    error::{ProvenanceError, Result},
};

/// Renders the per-rule trace for one evaluated candidate.
pub fn format_trace(name: &str, result: &MatchResult) -> String {
    let mut lines = vec![format!("Processing: {name}")];

    for (i, outcome) in result.outcomes.iter().enumerate() {
        lines.push(format!(
            "Rule {} ({}): {} -> {}/{} points",
            i + 1,
            outcome.label,
            outcome.rationale,
            outcome.score,
            outcome.max_score
        ));
    }

    let total_max = result.outcomes.iter().map(|o| o.max_score).sum::<u32>();
    if result.is_match() {
        lines.push(format!(
            "Final Score: {}/{} -> MATCH to {}",
            result.total_score, total_max, result.best_target_id
        ));
    } else {
        lines.push(format!("Final Score: {}/{} -> REJECTED", result.total_score, total_max));
    }

    lines.join("\n") + "\n"
}

pub fn format_failure(name: &str, reason: &str) -> String {
    format!("Processing: {name}\nERROR: {reason}\n")
}

pub fn format_sample(report: &SampleReport) -> String {
    match &report.outcome {
        SampleOutcome::Evaluated(result) => format_trace(&report.sample.name, result),
        SampleOutcome::Failed { reason } => format_failure(&report.sample.name, reason),
    }
}

/// The full results file: a header followed by every sample's trace.
pub fn render_results(report: &RunReport) -> String {
    let mut out = String::from(" Digital Forensics Results\n");
    out.push_str(&"=".repeat(30));
    out.push_str("\n\n");

    for sample in &report.samples {
        out.push_str(&format_sample(sample));
        out.push('\n');
    }

    out
}

pub fn write_results<P: AsRef<Path>>(path: P, report: &RunReport) -> Result<()> {
    fs::write(path, render_results(report))?;
    Ok(())
}

pub fn format_summary(report: &RunReport) -> String {
    Summary(report).to_string()
}

/// Text rendering of a run's `RunStats`.
pub struct Summary<'a>(pub &'a RunReport);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let stats = &report.stats;
        let rule = "-".repeat(45);

        writeln!(f, "{rule}")?;
        writeln!(f, "{}RESULTS SUMMARY", " ".repeat(17))?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Total images processed: {}", stats.total)?;
        writeln!(f, "Processing time: {:.2} seconds", report.elapsed.as_secs_f64())?;
        if stats.failed > 0 {
            writeln!(f, "Failed to process: {}", stats.failed)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "Overall accuracy: {:.1}% ({}/{})",
            stats.overall_accuracy(),
            stats.correct,
            stats.total
        )?;
        writeln!(
            f,
            "Modified images accuracy: {:.1}% ({}/{})",
            stats.modified_accuracy(),
            stats.modified_correct,
            stats.modified_total
        )?;
        writeln!(
            f,
            "Random images accuracy: {:.1}% ({}/{})",
            stats.random_accuracy(),
            stats.random_correct,
            stats.random_total
        )?;
        writeln!(f, "False positive rate: {:.1}%", stats.false_positive_rate())?;
        writeln!(f)?;

        for tally in &stats.rules {
            writeln!(
                f,
                "{} Rule - Avg: {:.1}/{}, Max: {}/{}",
                tally.label,
                tally.average(),
                tally.max_score,
                tally.max,
                tally.max_score
            )?;
        }

        Ok(())
    }
}

#[derive(Serialize)]
pub struct JsonReport {
    pub summary: SummarySection,
    pub samples: Vec<SampleSection>,
}

#[derive(Serialize)]
pub struct SummarySection {
    pub overall_accuracy: f64,
    pub modified_accuracy: f64,
    pub random_accuracy: f64,
    pub false_positive_rate: f64,
    pub processing_seconds: f64,
    pub stats: RunStats,
}

#[derive(Serialize)]
pub struct SampleSection {
    pub file: String,
    pub kind: SampleKind,
    pub expected_match: bool,
    pub predicted_match: bool,
    pub correct: bool,
    pub best_match: Option<String>,
    pub total_score: Option<u32>,
    pub rules: Vec<RuleOutcome>,
    pub error: Option<String>,
}

impl From<&SampleReport> for SampleSection {
    fn from(report: &SampleReport) -> Self {
        let (best_match, total_score, rules, error) = match &report.outcome {
            SampleOutcome::Evaluated(result) => (
                Some(result.best_target_id.clone()),
                Some(result.total_score),
                result.outcomes.clone(),
                None,
            ),
            SampleOutcome::Failed { reason } => (None, None, Vec::new(), Some(reason.clone())),
        };

        Self {
            file: report.sample.name.clone(),
            kind: report.sample.kind,
            expected_match: report.sample.kind.expected_match(),
            predicted_match: report.predicted_match(),
            correct: report.is_correct(),
            best_match,
            total_score,
            rules,
            error,
        }
    }
}

impl From<&RunReport> for JsonReport {
    fn from(report: &RunReport) -> Self {
        Self {
            summary: SummarySection {
                overall_accuracy: report.stats.overall_accuracy(),
                modified_accuracy: report.stats.modified_accuracy(),
                random_accuracy: report.stats.random_accuracy(),
                false_positive_rate: report.stats.false_positive_rate(),
                processing_seconds: report.elapsed.as_secs_f64(),
                stats: report.stats.clone(),
            },
            samples: report.samples.iter().map(SampleSection::from).collect(),
        }
    }
}

impl JsonReport {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(ProvenanceError::ReportSerialize)
    }
}
