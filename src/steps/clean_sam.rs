
use std::path::Path;

use crate::data_types::job_parameters::JobParameters;
use crate::data_types::reference_genome::ReferenceGenome;
use crate::errors::JobResult;
use crate::external::{ToolInvocation, ToolRunner};
use crate::steps::{file_stem, ProcessesBam, StepOutput};

/// Picard CleanSam: soft-clips reads hanging off the end of a contig and zeroes MAPQ of unmapped reads
#[derive(Clone, Debug, Default)]
pub struct CleanSam {}

impl CleanSam {
    pub const STEP_NAME: &'static str = "CleanSam";

    pub fn from_params(_params: &JobParameters) -> JobResult<Self> {
        Ok(Self {})
    }
}

impl ProcessesBam for CleanSam {
    fn name(&self) -> &str {
        Self::STEP_NAME
    }

    fn process_bam(&self, bam: &Path, _genome: &ReferenceGenome, output_dir: &Path, tools: &dyn ToolRunner) -> JobResult<StepOutput> {
        std::fs::create_dir_all(output_dir)?;
        let stem = file_stem(bam);
        let cleaned = output_dir.join(format!("{stem}.cleaned.bam"));
        let invocation = ToolInvocation::new("CleanSam", "picard")
            .arg("CleanSam")
            .arg("-I")
            .path_arg(bam)
            .arg("-O")
            .path_arg(&cleaned)
            .log_file(&output_dir.join(format!("{stem}.cleansam.log")))
            .expect_output(&cleaned);
        tools.execute(&invocation)?;

        let mut output = StepOutput::default();
        output.set_primary("Cleaned BAM", cleaned);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::JobError;
    use crate::external::fake_runner::FakeToolRunner;

    #[test]
    fn test_clean_sam() {
        let tmp = tempfile::tempdir().unwrap();
        let genome = ReferenceGenome::default();
        let runner = FakeToolRunner::default();
        let output = CleanSam::default().process_bam(&tmp.path().join("s1.bam"), &genome, tmp.path(), &runner).unwrap();
        assert_eq!(output.primary(), Some(tmp.path().join("s1.cleaned.bam").as_path()));
    }

    #[test]
    fn test_missing_output_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = FakeToolRunner::with_silent_tools(&["CleanSam"]);
        let result = CleanSam::default().process_bam(&tmp.path().join("s1.bam"), &ReferenceGenome::default(), tmp.path(), &runner);
        match result {
            Err(JobError::ToolFailure { tool, expected }) => {
                assert_eq!(tool, "CleanSam");
                assert_eq!(expected, tmp.path().join("s1.cleaned.bam"));
            },
            other => panic!("unexpected result: {other:?}")
        }
    }
}
