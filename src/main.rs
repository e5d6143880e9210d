use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use annotation_export::config::Config;
use annotation_export::logging;
use annotation_export::metrics;
use annotation_export::pipeline::export::write_text_atomic;
use annotation_export::pipeline::processing::anonymize::hash_identity;
use annotation_export::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "annotation-export")]
#[command(about = "Flatten, anonymize and merge classification and subject exports")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the merged, anonymized export
    Run(RunArgs),
    /// Print the digest a user name is exported as
    Hash {
        /// User name to hash
        identity: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// TOML config file; flags and environment override its values
    #[arg(long, env = "ANNOTATION_EXPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Classifications export (path or http(s) URL)
    #[arg(long, env = "ANNOTATION_EXPORT_CLASSIFICATIONS")]
    classifications: Option<String>,

    /// Subjects export (path or http(s) URL)
    #[arg(long, env = "ANNOTATION_EXPORT_SUBJECTS")]
    subjects: Option<String>,

    /// Merged CSV destination
    #[arg(long, short, env = "ANNOTATION_EXPORT_OUTPUT")]
    output: Option<PathBuf>,

    /// Substring marking anonymous user names
    #[arg(long, env = "ANNOTATION_EXPORT_ANONYMOUS_MARKER")]
    anonymous_marker: Option<String>,

    /// Keep only classifications from this workflow
    #[arg(long, env = "ANNOTATION_EXPORT_WORKFLOW_ID")]
    workflow_id: Option<String>,

    /// Write a JSON run report here
    #[arg(long, env = "ANNOTATION_EXPORT_REPORT")]
    report: Option<PathBuf>,

    /// Write a Prometheus text metrics snapshot here
    #[arg(long, env = "ANNOTATION_EXPORT_METRICS_FILE")]
    metrics_file: Option<PathBuf>,

    /// Timeout in seconds for URL inputs
    #[arg(long, env = "ANNOTATION_EXPORT_HTTP_TIMEOUT_SECS")]
    http_timeout_secs: Option<u64>,

    /// Directory for rolled JSON logs
    #[arg(long, env = "ANNOTATION_EXPORT_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

impl RunArgs {
    fn into_config(self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref()).context("loading configuration")?;
        if let Some(v) = self.classifications {
            config.classifications = Some(v);
        }
        if let Some(v) = self.subjects {
            config.subjects = Some(v);
        }
        if let Some(v) = self.output {
            config.output = v;
        }
        if let Some(v) = self.anonymous_marker {
            config.anonymous_marker = v;
        }
        if let Some(v) = self.workflow_id {
            config.workflow_id = Some(v);
        }
        if let Some(v) = self.report {
            config.report = Some(v);
        }
        if let Some(v) = self.metrics_file {
            config.metrics_file = Some(v);
        }
        if let Some(v) = self.http_timeout_secs {
            config.http_timeout_secs = v;
        }
        if let Some(v) = self.log_dir {
            config.log_dir = v;
        }
        Ok(config)
    }
}

fn run(args: RunArgs) -> Result<()> {
    let config = args.into_config()?;
    let _guard = logging::init_logging(&config.log_dir);
    metrics::init_metrics();

    let outcome = Pipeline::run(&config);

    if let Some(path) = &config.metrics_file {
        match metrics::render_snapshot() {
            Some(snapshot) => {
                if let Err(e) = write_text_atomic(&snapshot, path) {
                    warn!("Failed to write metrics snapshot to {}: {}", path.display(), e);
                }
            }
            None => warn!("No metrics recorder installed; skipping snapshot"),
        }
    }

    let result = outcome.context("export failed")?;
    info!("Run {} finished in {:.2}s", result.run_id, result.duration_secs);

    println!("\n📊 Export Results:");
    println!("   Classifications read: {}", result.classifications_in);
    if result.filtered_classifications > 0 {
        println!("   Filtered by workflow: {}", result.filtered_classifications);
    }
    println!("   Subjects read: {}", result.subjects_in);
    if result.duplicate_subjects_dropped > 0 {
        println!("   Duplicate subjects dropped: {}", result.duplicate_subjects_dropped);
    }
    println!("   Rows written: {}", result.output_rows);
    println!("   Columns written: {}", result.output_columns);
    println!("   Output file: {}", result.output_file);

    if result.unmatched_subjects > 0 {
        println!(
            "\n⚠️  {} classifications reference subjects missing from the subjects export:",
            result.unmatched_subjects
        );
        for id in &result.missing_subject_ids {
            println!("   - {}", id);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Hash { identity } => {
            println!("{}", hash_identity(&identity));
            Ok(())
        }
    }
}
