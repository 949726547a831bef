
use serde::{Deserialize, Serialize};

use crate::artifacts::artifact_store::ArtifactStore;
use crate::artifacts::metadata::MetadataStore;
use crate::data_types::file_type::{FileType, TypeHierarchy};
use crate::data_types::job::Job;
use crate::data_types::recorded_action::RecordedAction;
use crate::errors::JobResult;
use crate::external::ToolRunner;
use crate::reference::genome_cache::ReferenceGenomeCache;
use crate::steps::registry::StepRegistry;
use crate::util::file_probe::FileProbe;

/// The stages of the standard pipeline, in run order
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, strum_macros::Display, strum_macros::EnumIter, strum_macros::EnumString)]
pub enum TaskId {
    #[strum(serialize = "init")]
    #[serde(rename = "init")]
    Init,
    #[strum(serialize = "prepare-indexes")]
    #[serde(rename = "prepare-indexes")]
    PrepareIndexes,
    #[strum(serialize = "align")]
    #[serde(rename = "align")]
    Align,
    #[strum(serialize = "analysis")]
    #[serde(rename = "analysis")]
    Analysis,
    #[strum(serialize = "import")]
    #[serde(rename = "import")]
    Import
}

/// Whether a task runs once on the whole job or once per split child
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum TaskScope {
    Joined,
    Split
}

/// Shared, read-only collaborators every task may use
pub struct TaskContext<'a> {
    pub registry: &'a StepRegistry,
    pub cache: &'a ReferenceGenomeCache,
    pub tools: &'a dyn ToolRunner,
    pub metadata: &'a MetadataStore,
    pub probe: &'a dyn FileProbe,
    pub hierarchy: &'a TypeHierarchy
}

/// A named pipeline stage. Runs at most once per job and returns what it consumed and produced.
pub trait PipelineTask: Send + Sync {
    fn task_id(&self) -> TaskId;

    /// Human readable status, e.g. "Performing Alignment"
    fn status_name(&self) -> &'static str;

    /// File types this task consumes from the job's inputs
    fn input_types(&self) -> Vec<FileType> {
        vec![]
    }

    fn scope(&self) -> TaskScope {
        TaskScope::Joined
    }

    /// If true, the job's working FASTA and dictionary must exist before `run`
    fn requires_reference(&self) -> bool {
        false
    }

    /// Whether this task has anything to do for the job
    fn is_participant(&self, job: &Job) -> bool;

    /// True if the work is already done and `run` can be skipped
    fn is_job_complete(&self, _job: &Job, _ctx: &TaskContext) -> bool {
        false
    }

    /// Does the work, tracking every file in `store`
    /// # Errors
    /// * any job-fatal condition; the runner marks the job failed
    fn run(&self, job: &mut Job, store: &mut ArtifactStore, ctx: &TaskContext) -> JobResult<RecordedAction>;
}
