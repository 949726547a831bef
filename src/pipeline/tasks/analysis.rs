
use itertools::Itertools;
use log::{debug, info};
use std::path::PathBuf;

use crate::artifacts::artifact_store::ArtifactStore;
use crate::data_types::artifact::Associations;
use crate::data_types::file_type::FileType;
use crate::data_types::job::Job;
use crate::data_types::recorded_action::RecordedAction;
use crate::errors::{JobError, JobResult};
use crate::parsing::fastq_pairing::{alignment_basename, pair_input_files};
use crate::pipeline::directory_resolver::DirectoryResolver;
use crate::pipeline::task::{PipelineTask, TaskContext, TaskId, TaskScope};
use crate::steps::registry::StepCategory;

/// BAM post-processing followed by variant calling, per split job
#[derive(Clone, Copy, Debug, Default)]
pub struct AnalysisTask;

impl AnalysisTask {
    /// The BAMs this job analyzes: aligned ones located through the resolver, or BAM inputs as given
    fn input_bams(&self, job: &Job, ctx: &TaskContext) -> JobResult<Vec<PathBuf>> {
        if !job.is_alignment_used() {
            let bam = FileType::bam();
            return Ok(job.input_files().iter()
                .filter(|f| bam.is_type(&f.to_string_lossy()))
                .cloned()
                .collect());
        }

        let fastq = FileType::fastq();
        let reads: Vec<PathBuf> = job.input_files().iter()
            .filter(|f| fastq.is_type(&f.to_string_lossy()))
            .cloned()
            .collect();
        let resolver = DirectoryResolver::new(ctx.hierarchy, ctx.probe);
        pair_input_files(&reads, job.cached_readsets()).iter()
            .map(|pair| {
                let name = format!("{}.bam", alignment_basename(&pair.first));
                let resolution = resolver.resolve(job.analysis_dir(), &name);
                if resolution.found {
                    Ok(resolution.path)
                } else {
                    Err(JobError::data(format!(
                        "Unable to find aligned BAM {name}, searched: {}",
                        resolution.searched.iter().map(|d| d.display()).join(", ")
                    )))
                }
            })
            .collect()
    }
}

impl PipelineTask for AnalysisTask {
    fn task_id(&self) -> TaskId {
        TaskId::Analysis
    }

    fn status_name(&self) -> &'static str {
        "Performing Analysis"
    }

    fn input_types(&self) -> Vec<FileType> {
        vec![FileType::bam()]
    }

    fn scope(&self) -> TaskScope {
        TaskScope::Split
    }

    fn requires_reference(&self) -> bool {
        true
    }

    fn is_participant(&self, job: &Job) -> bool {
        let params = job.parameters();
        !params.get_list(&StepCategory::BamPostProcessing.parameter_key()).is_empty() ||
            !params.get_list(&StepCategory::Analysis.parameter_key()).is_empty()
    }

    fn run(&self, job: &mut Job, store: &mut ArtifactStore, ctx: &TaskContext) -> JobResult<RecordedAction> {
        let mut action = RecordedAction::new(self.status_name());
        let genome = job.reference_genome()
            .ok_or_else(|| JobError::config("No reference genome was cached prior to analysis"))?
            .clone();
        let processors = ctx.registry.create_bam_processors(job.parameters())?;
        let callers = ctx.registry.create_variant_callers(job.parameters())?;

        for bam in self.input_bams(job, ctx)?.into_iter() {
            info!("Analyzing {bam:?}");
            store.add_input(&mut action, "Input BAM", &bam);
            let mut associations = Associations::with_genome(genome.genome_id());
            if let Some(artifact) = store.get(&bam) {
                associations.merge(artifact.associations());
            }

            let mut current = bam;
            for processor in processors.iter() {
                let output = processor.process_bam(&current, &genome, job.analysis_dir(), ctx.tools)?;
                store.add_step_outputs(&mut action, &output, associations);
                if let Some(primary) = output.primary() {
                    // the replaced BAM is no longer a deliverable
                    debug!("{} replaced {current:?} with {primary:?}", processor.name());
                    store.demote_to_intermediate(&current);
                    current = primary.to_path_buf();
                }
            }

            for caller in callers.iter() {
                let output = caller.call_variants(&current, &genome, job.analysis_dir(), ctx.tools)?;
                store.add_step_outputs(&mut action, &output, associations);
            }
        }
        Ok(action)
    }
}
