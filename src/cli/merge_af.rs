
use anyhow::{ensure, Context};
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, AFTER_HELP, FULL_VERSION};

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct MergeAfSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    seqflow_version: String,

    /// Tab-delimited manifest with columns output_file_id, readset_id, genome_id, vcf, coverage
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input-manifest")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub manifest_fn: PathBuf,

    /// Output folder
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_dir: PathBuf,

    /// Base name of the merged table, written as <basename>.txt
    #[clap(required = true)]
    #[clap(short = 'b')]
    #[clap(long = "basename")]
    #[clap(value_name = "NAME")]
    #[clap(help_heading = Some("Input/Output"))]
    pub basename: String,

    /// Minimum allele frequency for a record's positions to be reported
    #[clap(long = "min-af")]
    #[clap(value_name = "FLOAT")]
    #[clap(help_heading = Some("Merge parameters"))]
    #[clap(default_value = "0.01")]
    pub min_af: f64,

    /// Minimum depth for a sample-site to be reported; shallower sites are ND
    #[clap(long = "min-coverage")]
    #[clap(value_name = "INT")]
    #[clap(help_heading = Some("Merge parameters"))]
    #[clap(default_value = "10")]
    pub min_coverage: u64,

    /// INFO key holding the read depth of each record
    #[clap(long = "depth-tag")]
    #[clap(value_name = "TAG")]
    #[clap(help_heading = Some("Merge parameters"))]
    #[clap(default_value = "GATK_DP")]
    pub depth_tag: String,

    /// Number of threads to use for loading and resolving sites
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

impl MergeAfSettings {
    /// Where the merged table is written
    pub fn output_table(&self) -> PathBuf {
        self.output_dir.join(format!("{}.txt", self.basename))
    }
}

pub fn check_merge_af_settings(mut settings: MergeAfSettings) -> anyhow::Result<MergeAfSettings> {
    // hard code the version in
    settings.seqflow_version = FULL_VERSION.clone();
    info!("Seqflow version: {:?}", &settings.seqflow_version);
    info!("Sub-command: merge-af");
    info!("Inputs:");

    check_required_filename(&settings.manifest_fn, "Input manifest")?;
    info!("\tInput manifest: {:?}", &settings.manifest_fn);

    info!("Outputs:");
    ensure!(!settings.basename.trim().is_empty(), "--basename must not be empty");
    std::fs::create_dir_all(&settings.output_dir)
        .with_context(|| format!("Error while creating output folder {:?}", settings.output_dir))?;
    info!("\tOutput folder: {:?}", &settings.output_dir);
    info!("\tMerged table: {:?}", settings.output_table());

    info!("Merge parameters:");
    ensure!((0.0..=1.0).contains(&settings.min_af), "--min-af must be in the range [0, 1]");
    info!("\tMinimum AF: {}", settings.min_af);
    info!("\tMinimum coverage: {}", settings.min_coverage);
    ensure!(!settings.depth_tag.is_empty(), "--depth-tag must not be empty");
    info!("\tDepth tag: {:?}", settings.depth_tag);

    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}
