
use anyhow::{ensure, Context};
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_optional_filename, check_required_filename, AFTER_HELP, FULL_VERSION};

/// Default sub-folder of the output folder holding prepared genomes
pub const DEFAULT_GENOME_CACHE: &str = "genome_cache";
/// Default metadata store file inside the output folder
pub const DEFAULT_METADATA_NAME: &str = "metadata.json";

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct RunSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    seqflow_version: String,

    /// Job parameters (JSON object of step names, step options, and sample_N descriptors)
    #[clap(required = true)]
    #[clap(short = 'p')]
    #[clap(long = "params")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub params_fn: PathBuf,

    /// Input files (FASTQ or BAM), in order
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub input_files: Vec<PathBuf>,

    /// Top-level analysis folder for the job
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_dir: PathBuf,

    /// Job identifier, used for split job names and checkpoints [default: output folder name]
    #[clap(long = "job-id")]
    #[clap(value_name = "ID")]
    #[clap(help_heading = Some("Input/Output"))]
    pub job_id: Option<String>,

    /// Folder of prepared reference genomes, shared between jobs [default: <output-dir>/genome_cache]
    #[clap(long = "genome-cache")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub genome_cache: Option<PathBuf>,

    /// Metadata store (JSON) for readsets, analyses, and outputs [default: <output-dir>/metadata.json]
    #[clap(long = "metadata")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub metadata_fn: Option<PathBuf>,

    /// Folder searched first for external tools
    #[clap(long = "tool-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Pipeline parameters"))]
    pub tool_dir: Option<PathBuf>,

    /// Keeps intermediate files after a successful run
    #[clap(long = "keep-intermediates")]
    #[clap(help_heading = Some("Pipeline parameters"))]
    pub keep_intermediates: bool,

    /// Ignores and does not write checkpoints, so every task runs again
    #[clap(long = "disable-checkpoints")]
    #[clap(help_heading = Some("Pipeline parameters"))]
    pub disable_checkpoints: bool,

    /// Number of threads to use for split jobs
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8
}

pub fn check_run_settings(mut settings: RunSettings) -> anyhow::Result<RunSettings> {
    // hard code the version in
    settings.seqflow_version = FULL_VERSION.clone();
    info!("Seqflow version: {:?}", &settings.seqflow_version);
    info!("Sub-command: run");
    info!("Inputs:");

    check_required_filename(&settings.params_fn, "Job parameters")?;
    info!("\tJob parameters: {:?}", &settings.params_fn);
    ensure!(!settings.input_files.is_empty(), "At least one --input file is required");
    for (i, input_fn) in settings.input_files.iter().enumerate() {
        check_required_filename(input_fn, format!("Input file #{i}").as_str())?;
        info!("\tInput file #{i}: {input_fn:?}");
    }
    check_optional_filename(settings.tool_dir.as_deref(), "Tool folder")?;

    // outputs
    info!("Outputs:");
    std::fs::create_dir_all(&settings.output_dir)
        .with_context(|| format!("Error while creating output folder {:?}", settings.output_dir))?;
    info!("\tAnalysis folder: {:?}", &settings.output_dir);
    if settings.job_id.is_none() {
        let name = settings.output_dir.canonicalize()
            .with_context(|| format!("Error while resolving {:?}", settings.output_dir))?
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "job".to_string());
        settings.job_id = Some(name);
    }
    info!("\tJob ID: {:?}", settings.job_id);
    if settings.genome_cache.is_none() {
        settings.genome_cache = Some(settings.output_dir.join(DEFAULT_GENOME_CACHE));
    }
    info!("\tGenome cache: {:?}", settings.genome_cache);
    if settings.metadata_fn.is_none() {
        settings.metadata_fn = Some(settings.output_dir.join(DEFAULT_METADATA_NAME));
    }
    info!("\tMetadata store: {:?}", settings.metadata_fn);

    info!("Pipeline parameters:");
    info!("\tTool folder: {:?}", settings.tool_dir);
    info!("\tIntermediate cleanup: {}", if settings.keep_intermediates { "DISABLED" } else { "ENABLED" });
    info!("\tCheckpoints: {}", if settings.disable_checkpoints { "DISABLED" } else { "ENABLED" });

    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_filled() {
        let tmp = tempfile::tempdir().unwrap();
        let params_fn = tmp.path().join("params.json");
        std::fs::write(&params_fn, "{}").unwrap();
        let reads = tmp.path().join("s1_R1.fastq");
        std::fs::write(&reads, "").unwrap();

        let settings = RunSettings {
            params_fn,
            input_files: vec![reads],
            output_dir: tmp.path().join("job42"),
            threads: 0,
            ..Default::default()
        };
        let checked = check_run_settings(settings).unwrap();
        assert_eq!(checked.job_id.as_deref(), Some("job42"));
        assert_eq!(checked.genome_cache, Some(tmp.path().join("job42").join(DEFAULT_GENOME_CACHE)));
        assert_eq!(checked.metadata_fn, Some(tmp.path().join("job42").join(DEFAULT_METADATA_NAME)));
        assert_eq!(checked.threads, 1);
    }

    #[test]
    fn test_missing_input() {
        let tmp = tempfile::tempdir().unwrap();
        let params_fn = tmp.path().join("params.json");
        std::fs::write(&params_fn, "{}").unwrap();
        let settings = RunSettings {
            params_fn,
            input_files: vec![tmp.path().join("absent.fastq")],
            output_dir: tmp.path().join("out"),
            ..Default::default()
        };
        assert!(check_run_settings(settings).is_err());
    }
}
