
use log::{LevelFilter, error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

use seqflow::artifacts::artifact_store::ArtifactStore;
use seqflow::artifacts::metadata::MetadataStore;
use seqflow::cli::core::{Commands, get_cli};
use seqflow::cli::merge_af::{MergeAfSettings, check_merge_af_settings};
use seqflow::cli::pipeline::{RunSettings, check_run_settings};
use seqflow::data_types::artifact::{ArtifactRole, Associations};
use seqflow::data_types::job::Job;
use seqflow::data_types::recorded_action::RecordedAction;
use seqflow::errors::JobError;
use seqflow::external::SystemToolRunner;
use seqflow::parsing::merge_manifest::load_merge_manifest;
use seqflow::parsing::params::load_job_parameters;
use seqflow::pipeline::runner::{PipelineRunner, RunnerConfigBuilder};
use seqflow::pipeline::task::TaskContext;
use seqflow::pipeline::task_graph::TaskGraph;
use seqflow::reference::genome_cache::ReferenceGenomeCache;
use seqflow::site_reconciliation::engine::{ReconcileConfigBuilder, SiteReconciler, shared_genome_id};
use seqflow::steps::registry::StepRegistry;
use seqflow::util::file_probe::DiskProbe;
use seqflow::util::json_io::save_json;
use seqflow::writers::artifact_manifest::{ARTIFACT_MANIFEST_NAME, write_artifact_manifest};
use seqflow::writers::merged_af_table::write_merged_af_table;

/// Label of the merged allele frequency table in the artifact manifest
const MERGED_TABLE_LABEL: &str = "Merged LoFreq Variant Table";

fn init_logging(verbosity: u8) {
    let filter_level: LevelFilter = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();
}

fn init_thread_pool(threads: usize) {
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
        Ok(()) => {},
        Err(e) => {
            error!("Error while building thread pool: {e}");
            std::process::exit(exitcode::OSERR);
        }
    };
}

fn save_cli_settings<T: serde::Serialize>(settings: &T, output_dir: &Path) {
    let cli_json = output_dir.join("cli_settings.json");
    info!("Saving CLI options to {cli_json:?}...");
    if let Err(e) = save_json(settings, &cli_json) {
        error!("Error while saving CLI options: {e}");
        std::process::exit(exitcode::IOERR);
    }
}

/// Maps a job failure onto the process exit code
fn job_exit_code(e: &JobError) -> i32 {
    match e {
        JobError::Configuration(_) => exitcode::CONFIG,
        JobError::DataInconsistency(_) => exitcode::DATAERR,
        JobError::Io(_) | JobError::Json(_) | JobError::Csv(_) => exitcode::IOERR,
        JobError::ToolFailure { .. } |
        JobError::ToolExit { .. } |
        JobError::SplitFailure { .. } |
        JobError::Registration(_) => exitcode::SOFTWARE
    }
}

fn write_manifest(output_dir: &Path, store: &ArtifactStore) {
    let manifest_fn = output_dir.join(ARTIFACT_MANIFEST_NAME);
    info!("Saving artifact manifest to {manifest_fn:?}...");
    if let Err(e) = write_artifact_manifest(&manifest_fn, store) {
        error!("Error while saving artifact manifest: {e}");
        std::process::exit(exitcode::IOERR);
    }
}

fn run_pipeline(settings: RunSettings) {
    // start the timer
    let start_time = Instant::now();

    // set up logging before we check the other settings
    init_logging(settings.verbosity);

    let settings = match check_run_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    init_thread_pool(settings.threads);
    save_cli_settings(&settings, &settings.output_dir);

    // load and validate the job before any tool runs
    let parameters = match load_job_parameters(&settings.params_fn) {
        Ok(p) => p,
        Err(e) => {
            error!("Error while loading job parameters: {e}");
            std::process::exit(job_exit_code(&e));
        }
    };
    let registry = StepRegistry::with_defaults();
    let job_id = settings.job_id.clone().unwrap_or_else(|| "job".to_string());
    let mut job = match Job::create(&job_id, settings.input_files.clone(), parameters, settings.output_dir.clone(), &registry) {
        Ok(j) => j,
        Err(e) => {
            error!("Error while creating job: {e}");
            std::process::exit(job_exit_code(&e));
        }
    };
    job.set_parameters_file(settings.params_fn.clone());

    let metadata_fn: PathBuf = settings.metadata_fn.clone()
        .unwrap_or_else(|| settings.output_dir.join("metadata.json"));
    let metadata = match MetadataStore::open(&metadata_fn) {
        Ok(m) => m,
        Err(e) => {
            error!("Error while opening metadata store: {e}");
            std::process::exit(exitcode::IOERR);
        }
    };
    let cache_dir = settings.genome_cache.clone()
        .unwrap_or_else(|| settings.output_dir.join("genome_cache"));
    let cache = ReferenceGenomeCache::new(cache_dir);
    let tools = SystemToolRunner::new(settings.tool_dir.clone());
    let probe = DiskProbe;
    let graph = TaskGraph::standard();
    let ctx = TaskContext {
        registry: &registry,
        cache: &cache,
        tools: &tools,
        metadata: &metadata,
        probe: &probe,
        hierarchy: graph.hierarchy()
    };
    let config = match RunnerConfigBuilder::default()
        .checkpoint(!settings.disable_checkpoints)
        .cleanup(!settings.keep_intermediates)
        .build() {
        Ok(c) => c,
        Err(e) => {
            error!("Error while building runner config: {e}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };

    let runner = PipelineRunner::new(&graph, ctx, config);
    let summary = match runner.run(&mut job) {
        Ok(s) => s,
        Err(e) => {
            error!("Job {} failed: {e}", job.job_id());
            std::process::exit(job_exit_code(&e));
        }
    };
    info!("Recorded actions: {}", summary.actions().len());
    info!("Final outputs: {}", summary.store().final_outputs().count());
    write_manifest(&settings.output_dir, summary.store());

    info!("Pipeline completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_merge_af(settings: MergeAfSettings) {
    // start the timer
    let start_time = Instant::now();

    // set up logging before we check the other settings
    init_logging(settings.verbosity);

    let settings = match check_merge_af_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    init_thread_pool(settings.threads);
    save_cli_settings(&settings, &settings.output_dir);

    let inputs = match load_merge_manifest(&settings.manifest_fn) {
        Ok(i) => i,
        Err(e) => {
            error!("Error while loading input manifest: {e}");
            std::process::exit(job_exit_code(&e));
        }
    };
    let genome_id = match shared_genome_id(&inputs) {
        Ok(g) => g,
        Err(e) => {
            error!("Error while validating inputs: {e}");
            std::process::exit(job_exit_code(&e));
        }
    };
    info!("Merging {} VCFs against genome {genome_id}", inputs.len());

    let config = match ReconcileConfigBuilder::default()
        .min_af(settings.min_af)
        .min_coverage(settings.min_coverage)
        .depth_tag(settings.depth_tag.clone())
        .build() {
        Ok(c) => c,
        Err(e) => {
            error!("Error while building merge config: {e}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };
    let rows = match SiteReconciler::new(config).run(&inputs) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while merging allele frequencies: {e}");
            std::process::exit(job_exit_code(&e));
        }
    };

    let table_fn = settings.output_table();
    info!("Saving {} rows to {table_fn:?}...", rows.len());
    if let Err(e) = write_merged_af_table(&table_fn, &rows) {
        error!("Error while saving merged table: {e}");
        std::process::exit(exitcode::IOERR);
    }

    let mut store = ArtifactStore::default();
    let mut action = RecordedAction::new(&format!("Merged LoFreq Variants: {} VCFs", inputs.len()));
    for input in inputs.iter() {
        store.add_input(&mut action, "Input VCF", &input.vcf);
    }
    store.add_output(&mut action, MERGED_TABLE_LABEL, &table_fn, ArtifactRole::FinalOutput, Associations::with_genome(Some(genome_id)));
    info!("{}", action.name());
    write_manifest(&settings.output_dir, &store);

    info!("Merge completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::Run(settings) => {
            run_pipeline(*settings);
        },
        Commands::MergeAf(settings) => {
            run_merge_af(*settings);
        }
    }

    info!("Process finished successfully.");
}
