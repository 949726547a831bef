
use std::path::{Path, PathBuf};

use crate::data_types::job_parameters::JobParameters;
use crate::data_types::reference_genome::ReferenceGenome;
use crate::errors::{JobError, JobResult};
use crate::external::{ToolInvocation, ToolRunner};
use crate::steps::registry::StepCategory;
use crate::steps::{file_stem, step_param, AlignmentRequest, CreatesIndex, PerformsAlignment, StepOutput};

/// Name of the BWA index inside `ReferenceGenome::aligner_indexes`
pub const BWA_INDEX_NAME: &str = "bwa";
/// Suffixes written by `bwa index`
const BWA_INDEX_SUFFIXES: [&str; 5] = ["amb", "ann", "bwt", "pac", "sa"];

/// BWA-MEM alignment, including building its own index
#[derive(Clone, Debug, Default)]
pub struct BwaMem {
    /// Value for `-t`
    threads: Option<i64>,
    /// Emits split hits as secondary (`-M`), which Picard tooling expects
    mark_split: bool
}

impl BwaMem {
    pub const STEP_NAME: &'static str = "BWA-Mem";

    pub fn from_params(params: &JobParameters) -> JobResult<Self> {
        let category = StepCategory::Alignment.parameter_key();
        let threads = match step_param(params, &category, Self::STEP_NAME, "threads") {
            Some(t) => Some(t.parse::<i64>()
                .map_err(|e| JobError::config(format!("BWA threads must be an integer ({t:?}): {e}")))?),
            None => None
        };
        let mark_split = step_param(params, &category, Self::STEP_NAME, "markSplit")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);
        Ok(Self { threads, mark_split })
    }

    /// The `-p` prefix used for the index files inside `index_dir`
    fn index_prefix(genome: &ReferenceGenome, index_dir: &Path) -> PathBuf {
        index_dir.join(format!("{}.bwa.index", file_stem(genome.working_fasta_or_source())))
    }
}

impl CreatesIndex for BwaMem {
    fn index_name(&self) -> &str {
        BWA_INDEX_NAME
    }

    fn expected_index_files(&self, genome: &ReferenceGenome, index_dir: &Path) -> Vec<PathBuf> {
        let prefix = Self::index_prefix(genome, index_dir);
        BWA_INDEX_SUFFIXES.iter()
            .map(|suffix| PathBuf::from(format!("{}.{suffix}", prefix.display())))
            .collect()
    }

    fn create_index(&self, genome: &ReferenceGenome, index_dir: &Path, tools: &dyn ToolRunner) -> JobResult<()> {
        std::fs::create_dir_all(index_dir)?;
        let prefix = Self::index_prefix(genome, index_dir);
        let mut invocation = ToolInvocation::new("bwa index", "bwa")
            .arg("index")
            .arg("-p")
            .path_arg(&prefix)
            .path_arg(genome.working_fasta_or_source())
            .log_file(&index_dir.join("bwa-index.log"));
        for expected in self.expected_index_files(genome, index_dir) {
            invocation = invocation.expect_output(&expected);
        }
        tools.execute(&invocation)
    }
}

impl PerformsAlignment for BwaMem {
    fn aligner_name(&self) -> &str {
        Self::STEP_NAME
    }

    fn perform_alignment(&self, request: &AlignmentRequest, tools: &dyn ToolRunner) -> JobResult<StepOutput> {
        let index_dir = request.genome.aligner_index_dir(BWA_INDEX_NAME)
            .ok_or_else(|| JobError::config(format!(
                "No BWA index has been prepared for {}", request.genome.working_fasta_or_source().display()
            )))?;
        std::fs::create_dir_all(request.output_dir)?;

        let sam = request.output_dir.join(format!("{}.sam", request.basename));
        let bam = request.output_dir.join(format!("{}.bam", request.basename));
        let log_fn = request.output_dir.join(format!("{}.bwa.log", request.basename));

        let mut align = ToolInvocation::new("bwa mem", "bwa")
            .arg("mem");
        if let Some(threads) = self.threads {
            align = align.arg("-t").arg(threads.to_string());
        }
        if self.mark_split {
            align = align.arg("-M");
        }
        align = align
            .arg("-R")
            .arg(format!("@RG\\tID:{0}\\tSM:{0}", request.basename))
            .path_arg(&Self::index_prefix(request.genome, index_dir))
            .path_arg(request.fastq1);
        if let Some(fq2) = request.fastq2 {
            align = align.path_arg(fq2);
        }
        tools.execute(&align.stdout_to(&sam).log_file(&log_fn))?;

        let convert = ToolInvocation::new("samtools view", "samtools")
            .arg("view")
            .arg("-b")
            .arg("-o")
            .path_arg(&bam)
            .path_arg(&sam)
            .log_file(&log_fn)
            .expect_output(&bam);
        tools.execute(&convert)?;

        let mut output = StepOutput::default();
        output.add_intermediate("BWA-MEM SAM", sam);
        output.set_primary("Aligned BAM", bam);
        Ok(output)
    }
}
