
use log::info;
use std::sync::Arc;

use crate::artifacts::artifact_store::ArtifactStore;
use crate::data_types::job::Job;
use crate::data_types::recorded_action::RecordedAction;
use crate::errors::{JobError, JobResult};
use crate::pipeline::task::{PipelineTask, TaskContext, TaskId};

/// Builds (or reuses) the aligner index for the shared genome
#[derive(Clone, Copy, Debug, Default)]
pub struct PrepareIndexesTask;

impl PipelineTask for PrepareIndexesTask {
    fn task_id(&self) -> TaskId {
        TaskId::PrepareIndexes
    }

    fn status_name(&self) -> &'static str {
        "Preparing Aligner Indexes"
    }

    fn requires_reference(&self) -> bool {
        true
    }

    fn is_participant(&self, job: &Job) -> bool {
        job.is_alignment_used()
    }

    fn run(&self, job: &mut Job, store: &mut ArtifactStore, ctx: &TaskContext) -> JobResult<RecordedAction> {
        let mut action = RecordedAction::new(self.status_name());
        let genome = job.reference_genome()
            .ok_or_else(|| JobError::config("No reference genome was cached prior to preparing aligned indexes"))?
            .clone();

        let steps = match ctx.registry.create_aligner(job.parameters())? {
            Some(s) => s,
            None => return Ok(action)
        };
        let indexer = match steps.indexer.as_ref() {
            Some(i) => i,
            None => {
                info!("{} does not use a prebuilt index", steps.aligner.aligner_name());
                return Ok(action);
            }
        };

        let index_dir = ctx.cache.ensure_index(indexer.as_ref(), &genome, ctx.tools)?;
        store.add_input(&mut action, &format!("{} Index", indexer.index_name()), &index_dir);
        job.set_reference_genome(Arc::new(genome.with_aligner_index(indexer.index_name(), index_dir)));
        Ok(action)
    }
}
