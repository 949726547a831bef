
use std::path::Path;

use crate::data_types::artifact::ArtifactRole;
use crate::data_types::job_parameters::JobParameters;
use crate::data_types::reference_genome::ReferenceGenome;
use crate::errors::{JobError, JobResult};
use crate::external::{ToolInvocation, ToolRunner};
use crate::parsing::coverage::{COVERAGE_SUFFIX, LOFREQ_VCF_SUFFIX};
use crate::steps::registry::StepCategory;
use crate::steps::{file_stem, step_param, CallsVariants, StepOutput};

/// LoFreq low-frequency variant calling. Each call set is paired with a per-base depth of coverage
/// table so a merge can tell a confident reference call from missing data.
#[derive(Clone, Debug, Default)]
pub struct LoFreqCall {
    /// Passed to `lofreq call-parallel --pp-threads`; single-threaded `lofreq call` when unset
    threads: Option<i64>,
    /// Minimum base quality, `-q`
    min_base_quality: Option<i64>
}

impl LoFreqCall {
    pub const STEP_NAME: &'static str = "LoFreq";

    pub fn from_params(params: &JobParameters) -> JobResult<Self> {
        let category = StepCategory::Analysis.parameter_key();
        let parse = |key: &str| -> JobResult<Option<i64>> {
            step_param(params, &category, Self::STEP_NAME, key)
                .map(|v| v.parse::<i64>()
                    .map_err(|e| JobError::config(format!("LoFreq {key} must be an integer ({v:?}): {e}"))))
                .transpose()
        };
        Ok(Self {
            threads: parse("threads")?,
            min_base_quality: parse("minBaseQuality")?
        })
    }
}

impl CallsVariants for LoFreqCall {
    fn name(&self) -> &str {
        Self::STEP_NAME
    }

    fn call_variants(&self, bam: &Path, genome: &ReferenceGenome, output_dir: &Path, tools: &dyn ToolRunner) -> JobResult<StepOutput> {
        std::fs::create_dir_all(output_dir)?;
        let stem = file_stem(bam);
        let vcf = output_dir.join(format!("{stem}{LOFREQ_VCF_SUFFIX}"));
        let coverage = output_dir.join(format!("{stem}{COVERAGE_SUFFIX}"));
        let log_fn = output_dir.join(format!("{stem}.lofreq.log"));
        let fasta = genome.working_fasta_or_source();

        let mut call = match self.threads {
            Some(t) if t > 1 => ToolInvocation::new("lofreq", "lofreq")
                .arg("call-parallel")
                .arg("--pp-threads")
                .arg(t.to_string()),
            _ => ToolInvocation::new("lofreq", "lofreq").arg("call")
        };
        if let Some(q) = self.min_base_quality {
            call = call.arg("-q").arg(q.to_string());
        }
        call = call
            .arg("--call-indels")
            .arg("-f")
            .path_arg(fasta)
            .arg("-o")
            .path_arg(&vcf)
            .path_arg(bam)
            .log_file(&log_fn)
            .expect_output(&vcf);
        tools.execute(&call)?;

        let depth = ToolInvocation::new("DepthOfCoverage", "gatk")
            .arg("DepthOfCoverage")
            .arg("-R")
            .path_arg(fasta)
            .arg("-I")
            .path_arg(bam)
            .arg("-O")
            .path_arg(&coverage)
            .arg("--omit-interval-statistics")
            .arg("--omit-locus-table")
            .arg("--omit-per-sample-statistics")
            .log_file(&log_fn)
            .expect_output(&coverage);
        tools.execute(&depth)?;

        let mut output = StepOutput::default();
        output.set_primary("LoFreq VCF", vcf);
        output.add_output("Depth of Coverage", coverage, ArtifactRole::FinalOutput);
        Ok(output)
    }
}
