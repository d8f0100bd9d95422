use std::{fs, path::PathBuf, process::ExitCode};

use clap::Parser;
use image_provenance::{
    MatchConfig, ProvenanceDetective,
    batch::{BatchRunner, collect_samples},
    error::{ProvenanceError, Result},
    report::{self, JsonReport},
};
use log::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "image-provenance",
    about = "Match modified images back to the originals they were derived from",
    version
)]
struct Cli {
    /// Folder of original images to register
    #[arg(default_value = "originals")]
    originals: PathBuf,
    /// Folder of images derived from the originals (expected to match)
    #[arg(default_value = "modified")]
    modified: PathBuf,
    /// Folder of unrelated images (expected to be rejected)
    #[arg(default_value = "random")]
    random: PathBuf,
    /// Where to write the per-image traces
    #[arg(long, default_value = "results.txt")]
    output: PathBuf,
    /// Also write a JSON report to this path
    #[arg(long)]
    json: Option<PathBuf>,
    /// JSON file overriding the default scoring configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Evaluate even if some originals failed to register
    #[arg(long)]
    accept_partial_registry: bool,
    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let missing = [
        (&cli.originals, "originals"),
        (&cli.modified, "modified"),
        (&cli.random, "random"),
    ]
    .into_iter()
    .filter(|(path, _)| !path.is_dir())
    .map(|(_, name)| name)
    .collect::<Vec<_>>();

    if !missing.is_empty() {
        eprintln!("Error: Missing folders: {}", missing.join(", "));
        eprintln!("Usage: image-provenance [originals] [modified] [random]");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => MatchConfig::from_json_file(path)?,
        None => MatchConfig::default(),
    };
    let parallel = config.parallel;

    let mut detective = ProvenanceDetective::with_config(config)?;
    detective.register_folder(&cli.originals)?;

    if !detective.registry().failures().is_empty() {
        if !cli.accept_partial_registry {
            return Err(ProvenanceError::IncompleteRegistry(
                detective.registry().failures().keys().cloned().collect(),
            ));
        }
        for id in detective.acknowledge_failures() {
            warn!("continuing without {id}");
        }
    }

    let samples = collect_samples(&cli.modified, &cli.random)?;
    println!("Testing on {} images...", samples.len());

    let report = BatchRunner::new().with_parallel(parallel).run(&detective, samples)?;

    report::write_results(&cli.output, &report)?;
    print!("\n{}", report::format_summary(&report));

    if let Some(path) = &cli.json {
        fs::write(path, JsonReport::from(&report).to_json()?)?;
        info!("JSON report written to {}", path.display());
    }

    println!("\nResults written to: {}", cli.output.display());
    Ok(())
}
