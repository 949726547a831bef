/*!
# Pipeline runner
Walks the task graph for one root job. Joined segments run on the job itself; split segments fan out
through the `JobSplitter`, run every child in parallel, and fold the children's artifact stores back into
the parent once all siblings have finished. Outputs are registered and intermediates removed only after
the whole tree succeeded.
*/

use derive_builder::Builder;
use indicatif::ParallelProgressIterator;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::path::PathBuf;

use crate::artifacts::artifact_store::{ArtifactStore, CleanupReport};
use crate::data_types::artifact::Associations;
use crate::data_types::job::Job;
use crate::data_types::recorded_action::RecordedAction;
use crate::errors::{JobError, JobResult};
use crate::pipeline::checkpoint::Checkpoint;
use crate::pipeline::job_splitter::JobSplitter;
use crate::pipeline::task::{PipelineTask, TaskContext, TaskScope};
use crate::pipeline::task_graph::TaskGraph;
use crate::util::progress_bar::get_progress_style;

#[derive(Builder, Clone, Debug)]
#[builder(default)]
pub struct RunnerConfig {
    /// Save a checkpoint after every task so a re-run resumes where it stopped
    checkpoint: bool,
    /// Delete intermediates once the job succeeds
    cleanup: bool,
    /// Register final outputs with the metadata store
    register_outputs: bool
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            checkpoint: true,
            cleanup: true,
            register_outputs: true
        }
    }
}

impl RunnerConfig {
    // getters
    pub fn checkpoint(&self) -> bool {
        self.checkpoint
    }

    pub fn cleanup(&self) -> bool {
        self.cleanup
    }

    pub fn register_outputs(&self) -> bool {
        self.register_outputs
    }
}

/// What a finished job produced
#[derive(Clone, Debug)]
pub struct JobSummary {
    job_id: String,
    actions: Vec<RecordedAction>,
    store: ArtifactStore,
    registered: Vec<u64>,
    cleanup: Option<CleanupReport>
}

impl JobSummary {
    // getters
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn actions(&self) -> &[RecordedAction] {
        &self.actions
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn registered(&self) -> &[u64] {
        &self.registered
    }

    pub fn cleanup(&self) -> Option<&CleanupReport> {
        self.cleanup.as_ref()
    }
}

pub struct PipelineRunner<'a> {
    graph: &'a TaskGraph,
    ctx: TaskContext<'a>,
    config: RunnerConfig
}

impl<'a> PipelineRunner<'a> {
    /// # Arguments
    /// * `graph` - the ordered tasks; `ctx.hierarchy` is expected to be `graph.hierarchy()`
    /// * `ctx` - shared collaborators handed to every task
    /// * `config` - checkpoint, cleanup, and registration switches
    pub fn new(graph: &'a TaskGraph, ctx: TaskContext<'a>, config: RunnerConfig) -> Self {
        Self { graph, ctx, config }
    }

    fn open_checkpoint(&self, job: &Job) -> JobResult<Checkpoint> {
        if self.config.checkpoint {
            Checkpoint::load_or_create(job)
        } else {
            Ok(Checkpoint::in_memory(job))
        }
    }

    /// Runs every task of the graph on `job` and its split children.
    /// # Errors
    /// * the first job-fatal error from a joined task
    /// * `JobError::SplitFailure` if any split child failed, after all siblings finished
    /// * checkpoint or metadata store failures
    pub fn run(&self, job: &mut Job) -> JobResult<JobSummary> {
        info!("Starting job {} in {:?}", job.job_id(), job.analysis_dir());
        std::fs::create_dir_all(job.analysis_dir())?;
        let mut checkpoint = self.open_checkpoint(job)?;
        let mut store = checkpoint.restore(job);

        for segment in self.graph.segments().iter() {
            debug!("Running segment {segment:?}");
            if segment.scope == TaskScope::Split && job.is_splittable() {
                self.run_split_segment(&segment.tasks, job, &mut store, &mut checkpoint)?;
            } else {
                for &task in segment.tasks.iter() {
                    self.run_task(task, job, &mut store, &mut checkpoint)?;
                }
            }
        }

        self.fill_genome_associations(job, &mut store);
        let registered = if !self.config.register_outputs {
            vec![]
        } else if !checkpoint.registered().is_empty() {
            info!("Final outputs were already registered");
            checkpoint.registered().to_vec()
        } else {
            let problems = store.registration_problems();
            if problems.is_empty() {
                let ids = store.register_final_outputs(self.ctx.metadata)?;
                info!("Registered {} final outputs", ids.len());
                checkpoint.set_registered(ids.clone())?;
                ids
            } else {
                // rejected outputs stay on disk, the job itself still succeeded
                for problem in problems.iter() {
                    error!("{problem}");
                }
                warn!("Skipping output registration, {} final outputs were rejected", problems.len());
                vec![]
            }
        };

        let cleanup = if self.config.cleanup {
            let report = store.cleanup();
            info!("Cleanup removed {} intermediates ({} already gone, {} failed)", report.deleted, report.missing, report.failed);
            Some(report)
        } else {
            None
        };
        checkpoint.sync(job, &store)?;

        info!("Finished job {}", job.job_id());
        Ok(JobSummary {
            job_id: job.job_id().to_string(),
            actions: checkpoint.actions().to_vec(),
            store,
            registered,
            cleanup
        })
    }

    /// Runs one task unless it is already done or does not apply to the job
    fn run_task(&self, task: &dyn PipelineTask, job: &mut Job, store: &mut ArtifactStore, checkpoint: &mut Checkpoint) -> JobResult<()> {
        let task_id = task.task_id();
        if checkpoint.is_complete(task_id) {
            debug!("{}: {task_id} already complete", job.job_id());
            return Ok(());
        }
        if !task.is_participant(job) {
            debug!("{}: {task_id} does not participate", job.job_id());
            return checkpoint.record(task_id, vec![], job, store);
        }
        if task.is_job_complete(job, &self.ctx) {
            info!("{}: {task_id} has no remaining work", job.job_id());
            return checkpoint.record(task_id, vec![], job, store);
        }
        if task.requires_reference() {
            self.check_reference(task, job)?;
        }

        info!("{}: {}", job.job_id(), task.status_name());
        let action = task.run(job, store, &self.ctx)?;
        checkpoint.record(task_id, vec![action], job, store)
    }

    /// The working FASTA and dictionary must exist before any task that reads the reference
    fn check_reference(&self, task: &dyn PipelineTask, job: &Job) -> JobResult<()> {
        match job.reference_genome() {
            Some(genome) if genome.is_prepared(self.ctx.probe) => Ok(()),
            Some(genome) => Err(JobError::config(format!(
                "The working FASTA and dictionary for {:?} must exist before {}", genome.source_fasta(), task.task_id()
            ))),
            None => Err(JobError::config(format!("A reference genome is required before {}", task.task_id())))
        }
    }

    fn run_split_segment(
        &self, tasks: &[&dyn PipelineTask], job: &mut Job, store: &mut ArtifactStore, checkpoint: &mut Checkpoint
    ) -> JobResult<()> {
        let pending: Vec<&dyn PipelineTask> = tasks.iter()
            .filter(|t| !checkpoint.is_complete(t.task_id()))
            .copied()
            .collect();
        let first = match pending.iter().find(|t| t.is_participant(job)) {
            Some(&t) => t,
            None => {
                for task in pending.iter() {
                    checkpoint.record(task.task_id(), vec![], job, store)?;
                }
                return Ok(());
            }
        };

        let children = JobSplitter::split(job, first);
        let total = children.len();
        let style = get_progress_style();
        let results: Vec<(String, JobResult<(Vec<RecordedAction>, ArtifactStore)>)> = children.into_par_iter()
            .map(|mut child| {
                let result = self.run_child(&pending, &mut child);
                (child.job_id().to_string(), result)
            })
            .progress_with_style(style)
            .collect();

        let mut actions: Vec<RecordedAction> = vec![];
        let mut failures: Vec<String> = vec![];
        for (child_id, result) in results.into_iter() {
            match result {
                Ok((child_actions, child_store)) => {
                    actions.extend(child_actions);
                    store.merge_child(child_store);
                },
                Err(e) => {
                    error!("Split job {child_id} failed: {e}");
                    failures.push(format!("{child_id}: {e}"));
                }
            };
        }
        if !failures.is_empty() {
            return Err(JobError::SplitFailure {
                failed: failures.len(),
                total,
                detail: failures.join("; ")
            });
        }

        let mut actions = Some(actions);
        for task in pending.iter() {
            checkpoint.record(task.task_id(), actions.take().unwrap_or_default(), job, store)?;
        }
        Ok(())
    }

    /// Runs the pending tasks of a split segment on one child, resuming from the child's own checkpoint
    fn run_child(&self, tasks: &[&dyn PipelineTask], child: &mut Job) -> JobResult<(Vec<RecordedAction>, ArtifactStore)> {
        std::fs::create_dir_all(child.analysis_dir())?;
        let mut checkpoint = self.open_checkpoint(child)?;
        let mut store = checkpoint.restore(child);
        for &task in tasks.iter() {
            self.run_task(task, child, &mut store, &mut checkpoint)?;
        }
        Ok((checkpoint.actions().to_vec(), store))
    }

    /// Final outputs with no association at all still belong to the job's genome
    fn fill_genome_associations(&self, job: &Job, store: &mut ArtifactStore) {
        let genome_id = match job.reference_genome().and_then(|g| g.genome_id()) {
            Some(id) => id,
            None => return
        };
        let unassociated: Vec<PathBuf> = store.final_outputs()
            .filter(|a| !a.associations().is_queryable())
            .map(|a| a.path().to_path_buf())
            .collect();
        for path in unassociated.iter() {
            debug!("Associating {path:?} with genome {genome_id}");
            store.associate(path, Associations::with_genome(Some(genome_id)));
        }
    }
}
