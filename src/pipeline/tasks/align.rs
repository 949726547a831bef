
use log::{info, warn};
use std::path::Path;

use crate::artifacts::artifact_store::ArtifactStore;
use crate::data_types::artifact::Associations;
use crate::data_types::file_type::FileType;
use crate::data_types::job::Job;
use crate::data_types::job_parameters::SampleDescriptor;
use crate::data_types::recorded_action::RecordedAction;
use crate::errors::{JobError, JobResult};
use crate::parsing::fastq_pairing::{alignment_basename, pair_input_files, FilePair};
use crate::pipeline::task::{PipelineTask, TaskContext, TaskId, TaskScope};
use crate::steps::AlignmentRequest;

/// Aligns each read pair of a split job against the shared genome
#[derive(Clone, Copy, Debug, Default)]
pub struct AlignTask;

/// The readset a pair was declared under, if any
fn declared_readset<'a>(pair: &FilePair, readsets: &'a [SampleDescriptor]) -> Option<&'a SampleDescriptor> {
    let name = pair.first.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_default();
    readsets.iter().find(|r| {
        Path::new(&r.file_name) == pair.first || r.file_name == name
    })
}

impl PipelineTask for AlignTask {
    fn task_id(&self) -> TaskId {
        TaskId::Align
    }

    fn status_name(&self) -> &'static str {
        "Performing Alignment"
    }

    fn input_types(&self) -> Vec<FileType> {
        vec![FileType::fastq()]
    }

    fn scope(&self) -> TaskScope {
        TaskScope::Split
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
            .ok_or_else(|| JobError::config("No reference genome was cached prior to alignment"))?
            .clone();
        let steps = ctx.registry.create_aligner(job.parameters())?
            .ok_or_else(|| JobError::config("Alignment was requested but no aligner was configured"))?;

        let fastq = FileType::fastq();
        let reads: Vec<_> = job.input_files().iter()
            .filter(|f| {
                let keep = fastq.is_type(&f.to_string_lossy());
                if !keep {
                    warn!("Skipping non-FASTQ input for alignment: {f:?}");
                }
                keep
            })
            .cloned()
            .collect();

        for pair in pair_input_files(&reads, job.cached_readsets()).iter() {
            let basename = alignment_basename(&pair.first);
            info!("Aligning {basename} with {}", steps.aligner.aligner_name());
            for f in pair.files().iter() {
                store.add_input(&mut action, "Input FASTQ", f);
            }

            let request = AlignmentRequest {
                fastq1: &pair.first,
                fastq2: pair.second.as_deref(),
                output_dir: job.analysis_dir(),
                genome: &genome,
                basename: &basename
            };
            let output = steps.aligner.perform_alignment(&request, ctx.tools)?;

            let readset_id = declared_readset(pair, job.cached_readsets())
                .filter(|r| r.has_existing_readset())
                .and_then(|r| r.readset_id);
            let associations = Associations {
                readset_id,
                genome_id: genome.genome_id(),
                ..Default::default()
            };
            store.add_step_outputs(&mut action, &output, associations);
        }
        Ok(action)
    }
}
