
use log::{debug, info};

use crate::data_types::job::Job;
use crate::parsing::fastq_pairing::pair_input_files;
use crate::pipeline::task::{PipelineTask, TaskId};

/// Decides how a job fans out before a split segment
pub struct JobSplitter;

impl JobSplitter {
    /// Creates the child jobs that will run a split segment whose first participating task is `task`.
    /// Before alignment with more than one input, files are paired by sample and each pair becomes a
    /// non-splittable child. Otherwise there is one child per input file. Unpaired files are singletons.
    /// A job that is not splittable runs as-is.
    /// # Arguments
    /// * `job` - the parent job; children copy its parameters and caches by value
    /// * `task` - the first task of the segment that will run on the children
    pub fn split(job: &Job, task: &dyn PipelineTask) -> Vec<Job> {
        if !job.is_splittable() {
            debug!("{} is not splittable, running in place", job.job_id());
            return vec![job.clone()];
        }

        let children: Vec<Job> = if task.task_id() == TaskId::Align && job.input_files().len() > 1 {
            pair_input_files(job.input_files(), job.cached_readsets()).into_iter()
                .enumerate()
                .map(|(i, pair)| {
                    let mut child = job.create_child(i, pair.files());
                    child.set_splittable(false);
                    child
                })
                .collect()
        } else {
            job.input_files().iter()
                .enumerate()
                .map(|(i, input)| job.create_child(i, vec![input.clone()]))
                .collect()
        };
        info!("Split {} into {} jobs for {}", job.job_id(), children.len(), task.task_id());
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::job_parameters::JobParameters;
    use crate::pipeline::tasks::align::AlignTask;
    use crate::pipeline::tasks::analysis::AnalysisTask;
    use std::path::{Path, PathBuf};

    fn job(inputs: &[&str]) -> Job {
        let mut params = JobParameters::default();
        params.insert("alignment", "BWA-Mem");
        Job::new_unchecked("job", inputs.iter().map(PathBuf::from).collect(), params, PathBuf::from("/work/job"))
    }

    #[test]
    fn test_split_pairs_for_alignment() {
        let parent = job(&["s1_R1.fastq", "s2_R1.fastq", "s1_R2.fastq", "s3.fastq"]);
        let children = JobSplitter::split(&parent, &AlignTask);
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].input_files(), &[PathBuf::from("s1_R1.fastq"), PathBuf::from("s1_R2.fastq")]);
        assert_eq!(children[1].input_files(), &[PathBuf::from("s2_R1.fastq")]);
        assert_eq!(children[2].input_files(), &[PathBuf::from("s3.fastq")]);
        assert!(children.iter().all(|c| !c.is_splittable()));
        assert_eq!(children[2].analysis_dir(), Path::new("/work/job/splits/job.2"));

        // children never split again
        let again = JobSplitter::split(&children[0], &AlignTask);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].job_id(), "job.0");
    }

    #[test]
    fn test_split_per_file() {
        let parent = job(&["a.bam", "b.bam"]);
        let children = JobSplitter::split(&parent, &AnalysisTask);
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].job_id(), "job.1");
        assert!(children[1].is_splittable());

        // a single input before alignment is not paired
        let single = JobSplitter::split(&job(&["s1_R1.fastq"]), &AlignTask);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].parent_id(), Some("job"));
    }
}
