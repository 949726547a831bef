
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::artifacts::artifact_store::ArtifactStore;
use crate::data_types::job::Job;
use crate::data_types::job_parameters::SampleDescriptor;
use crate::data_types::recorded_action::RecordedAction;
use crate::data_types::reference_genome::ReferenceGenome;
use crate::errors::JobResult;
use crate::pipeline::task::TaskId;
use crate::util::json_io::{load_json, save_json_atomic};

/// Checkpoint files are named `<job id>.checkpoint.json` inside the job's analysis directory
pub const CHECKPOINT_SUFFIX: &str = "checkpoint.json";

/// Everything needed to resume a job after its last completed task
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Checkpoint {
    job_id: String,
    completed: BTreeSet<TaskId>,
    actions: Vec<RecordedAction>,
    store: ArtifactStore,
    reference_genome: Option<ReferenceGenome>,
    readsets: Vec<SampleDescriptor>,
    /// Output rows already registered, so a resumed job never registers twice
    #[serde(default)]
    registered: Vec<u64>,
    /// Where this checkpoint is saved; None keeps it in memory only
    #[serde(skip)]
    path: Option<PathBuf>
}

impl Checkpoint {
    pub fn path_for(job: &Job) -> PathBuf {
        job.analysis_dir().join(format!("{}.{CHECKPOINT_SUFFIX}", job.job_id()))
    }

    /// A checkpoint that is never written to disk
    pub fn in_memory(job: &Job) -> Self {
        Self {
            job_id: job.job_id().to_string(),
            ..Default::default()
        }
    }

    /// Loads the job's checkpoint if one exists, otherwise starts an empty one at the default path
    /// # Errors
    /// * if an existing checkpoint cannot be parsed
    pub fn load_or_create(job: &Job) -> JobResult<Self> {
        let path = Self::path_for(job);
        let mut checkpoint: Checkpoint = if path.exists() {
            info!("Resuming {} from {path:?}", job.job_id());
            load_json(&path)?
        } else {
            Self::in_memory(job)
        };
        checkpoint.path = Some(path);
        Ok(checkpoint)
    }

    /// Copies the saved genome and readsets onto the job; the store is handed back for the runner to continue with
    pub fn restore(&self, job: &mut Job) -> ArtifactStore {
        if job.reference_genome().is_none() {
            if let Some(genome) = self.reference_genome.as_ref() {
                debug!("Restoring reference genome {:?}", genome.source_fasta());
                job.set_reference_genome(Arc::new(genome.clone()));
            }
        }
        if job.cached_readsets().is_empty() && !self.readsets.is_empty() {
            job.cache_readsets(self.readsets.clone());
        }
        self.store.clone()
    }

    /// Marks a task complete along with the actions it produced and the job state after it ran, then saves
    /// # Errors
    /// * if the checkpoint file cannot be written
    pub fn record(&mut self, task_id: TaskId, actions: Vec<RecordedAction>, job: &Job, store: &ArtifactStore) -> JobResult<()> {
        self.completed.insert(task_id);
        self.actions.extend(actions);
        self.sync(job, store)
    }

    /// Saves the current job state without completing a task
    /// # Errors
    /// * if the checkpoint file cannot be written
    pub fn sync(&mut self, job: &Job, store: &ArtifactStore) -> JobResult<()> {
        self.store = store.clone();
        self.reference_genome = job.reference_genome().map(|g| g.as_ref().clone());
        self.readsets = job.cached_readsets().to_vec();
        self.save()
    }

    /// # Errors
    /// * if the checkpoint file cannot be written
    pub fn set_registered(&mut self, registered: Vec<u64>) -> JobResult<()> {
        self.registered = registered;
        self.save()
    }

    fn save(&self) -> JobResult<()> {
        if let Some(path) = self.path.as_ref() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            debug!("Saving checkpoint for {} to {path:?}", self.job_id);
            save_json_atomic(self, path)?;
        }
        Ok(())
    }

    // getters
    pub fn is_complete(&self, task_id: TaskId) -> bool {
        self.completed.contains(&task_id)
    }

    pub fn actions(&self) -> &[RecordedAction] {
        &self.actions
    }

    pub fn registered(&self) -> &[u64] {
        &self.registered
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::job_parameters::JobParameters;

    #[test]
    fn test_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut job = Job::new_unchecked("job", vec![], JobParameters::default(), tmp.path().to_path_buf());
        job.set_reference_genome(Arc::new(ReferenceGenome::new(tmp.path().join("Shared/Custom.fasta"), Some(3))));

        let mut checkpoint = Checkpoint::load_or_create(&job).unwrap();
        assert!(!checkpoint.is_complete(TaskId::Init));
        let mut store = ArtifactStore::default();
        store.add_intermediate(&tmp.path().join("x.sam"), "SAM");
        checkpoint.record(TaskId::Init, vec![RecordedAction::new("Preparing Run")], &job, &store).unwrap();
        assert!(Checkpoint::path_for(&job).exists());

        let mut resumed_job = Job::new_unchecked("job", vec![], JobParameters::default(), tmp.path().to_path_buf());
        let resumed = Checkpoint::load_or_create(&resumed_job).unwrap();
        assert!(resumed.is_complete(TaskId::Init));
        assert!(!resumed.is_complete(TaskId::Align));
        assert_eq!(resumed.actions().len(), 1);
        let restored = resumed.restore(&mut resumed_job);
        assert_eq!(restored, store);
        assert_eq!(resumed_job.reference_genome().unwrap().genome_id(), Some(3));
    }

    #[test]
    fn test_in_memory_is_not_saved() {
        let tmp = tempfile::tempdir().unwrap();
        let job = Job::new_unchecked("job", vec![], JobParameters::default(), tmp.path().to_path_buf());
        let mut checkpoint = Checkpoint::in_memory(&job);
        checkpoint.record(TaskId::Init, vec![], &job, &ArtifactStore::default()).unwrap();
        assert!(checkpoint.is_complete(TaskId::Init));
        assert!(!Checkpoint::path_for(&job).exists());
        assert!(checkpoint.path().is_none());
    }
}
