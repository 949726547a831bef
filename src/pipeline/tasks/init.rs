
use log::{debug, info};
use std::sync::Arc;

use crate::artifacts::artifact_store::ArtifactStore;
use crate::data_types::artifact::Associations;
use crate::data_types::job::Job;
use crate::data_types::recorded_action::RecordedAction;
use crate::errors::JobResult;
use crate::pipeline::task::{PipelineTask, TaskContext, TaskId};
use crate::steps::registry::StepCategory;

/// Caches the readsets and prepares the shared reference genome
#[derive(Clone, Copy, Debug, Default)]
pub struct InitTask;

impl InitTask {
    fn needs_reference(job: &Job) -> bool {
        job.is_alignment_used() ||
            !job.parameters().get_list(&StepCategory::ReferenceLibraryCreation.parameter_key()).is_empty()
    }
}

impl PipelineTask for InitTask {
    fn task_id(&self) -> TaskId {
        TaskId::Init
    }

    fn status_name(&self) -> &'static str {
        "Preparing Run"
    }

    fn is_participant(&self, _job: &Job) -> bool {
        true
    }

    fn is_job_complete(&self, job: &Job, ctx: &TaskContext) -> bool {
        match job.reference_genome() {
            Some(genome) => genome.is_prepared(ctx.probe) && !job.cached_readsets().is_empty(),
            None => false
        }
    }

    fn run(&self, job: &mut Job, store: &mut ArtifactStore, ctx: &TaskContext) -> JobResult<RecordedAction> {
        let mut action = RecordedAction::new(self.status_name());
        if let Some(params_fn) = job.parameters_file() {
            store.add_input(&mut action, "Job Parameters", params_fn);
        }
        for input in job.input_files().iter() {
            store.add_input(&mut action, "Input File", input);
        }

        let readsets = job.parameters().sample_descriptors()?;
        info!("Caching {} readsets", readsets.len());
        for readset in readsets.iter() {
            debug!("\t{readset:?}");
        }
        job.cache_readsets(readsets);

        if !Self::needs_reference(job) {
            info!("No reference library requested, skipping reference preparation");
            return Ok(action);
        }

        let shared_dir = job.shared_dir();
        std::fs::create_dir_all(&shared_dir)?;
        let providers = ctx.registry.create_reference_libraries(job.parameters())?;
        let library = ctx.cache.ensure_fasta(&providers, &shared_dir)?;

        let associations = Associations::with_genome(library.genome.genome_id());
        store.add_step_outputs(&mut action, &library.output, associations);
        if let Some(working_fasta) = library.genome.working_fasta() {
            store.add_input(&mut action, "Working FASTA", working_fasta);
        }
        if let Some(dictionary) = library.genome.dictionary() {
            store.add_input(&mut action, "Sequence Dictionary", dictionary);
        }

        job.set_reference_genome(Arc::new(library.genome));
        Ok(action)
    }
}
