
use log::warn;
use std::path::{Path, PathBuf};

use crate::data_types::job_parameters::JobParameters;
use crate::errors::JobResult;
use crate::external::{ToolInvocation, ToolRunner};
use crate::steps::registry::StepCategory;
use crate::steps::{step_param, AlignmentRequest, PerformsAlignment, StepOutput};

/// LASTZ alignment against the working FASTA. LASTZ has no index of its own and reads FASTA,
/// so reads are converted with seqtk first. Mates are aligned independently and merged.
#[derive(Clone, Debug, Default)]
pub struct Lastz {
    /// Minimum identity percent passed as `--identity=<n>..100`
    identity: Option<String>
}

impl Lastz {
    pub const STEP_NAME: &'static str = "Lastz";

    pub fn from_params(params: &JobParameters) -> JobResult<Self> {
        let category = StepCategory::Alignment.parameter_key();
        Ok(Self {
            identity: step_param(params, &category, Self::STEP_NAME, "identity").map(|s| s.to_string())
        })
    }

    /// Converts one FASTQ to FASTA and aligns it, returning (fasta, sam)
    fn align_one(&self, fastq: &Path, label: &str, request: &AlignmentRequest, log_fn: &Path, tools: &dyn ToolRunner) -> JobResult<(PathBuf, PathBuf)> {
        let fasta = request.output_dir.join(format!("{}{label}.reads.fasta", request.basename));
        let sam = request.output_dir.join(format!("{}{label}.lastz.sam", request.basename));

        let to_fasta = ToolInvocation::new("seqtk", "seqtk")
            .arg("seq")
            .arg("-a")
            .path_arg(fastq)
            .stdout_to(&fasta)
            .log_file(log_fn);
        tools.execute(&to_fasta)?;

        let target = format!("{}[multiple]", request.genome.working_fasta_or_source().display());
        let mut align = ToolInvocation::new("lastz", "lastz")
            .arg(target)
            .path_arg(&fasta)
            .arg("--format=sam")
            .arg("--ambiguous=iupac")
            .arg(format!("--output={}", sam.display()))
            .log_file(log_fn)
            .expect_output(&sam);
        if let Some(identity) = self.identity.as_ref() {
            align = align.arg(format!("--identity={identity}..100"));
        }
        tools.execute(&align)?;
        Ok((fasta, sam))
    }
}

impl PerformsAlignment for Lastz {
    fn aligner_name(&self) -> &str {
        Self::STEP_NAME
    }

    fn perform_alignment(&self, request: &AlignmentRequest, tools: &dyn ToolRunner) -> JobResult<StepOutput> {
        std::fs::create_dir_all(request.output_dir)?;
        let log_fn = request.output_dir.join(format!("{}.lastz.log", request.basename));
        let bam = request.output_dir.join(format!("{}.bam", request.basename));
        let mut output = StepOutput::default();

        let mut sams = vec![];
        match request.fastq2 {
            Some(fq2) => {
                warn!("LASTZ does not use mate information, aligning {} and {} independently", request.fastq1.display(), fq2.display());
                for (label, fq) in [(".R1", request.fastq1), (".R2", fq2)] {
                    let (fasta, sam) = self.align_one(fq, label, request, &log_fn, tools)?;
                    output.add_intermediate("LASTZ reads FASTA", fasta);
                    sams.push(sam);
                }
            },
            None => {
                let (fasta, sam) = self.align_one(request.fastq1, "", request, &log_fn, tools)?;
                output.add_intermediate("LASTZ reads FASTA", fasta);
                sams.push(sam);
            }
        };

        let mut convert = if sams.len() == 1 {
            ToolInvocation::new("samtools view", "samtools").arg("view").arg("-b")
        } else {
            ToolInvocation::new("samtools merge", "samtools").arg("merge").arg("-f")
        };
        convert = convert.arg("-o").path_arg(&bam);
        for sam in sams.iter() {
            convert = convert.path_arg(sam);
        }
        tools.execute(&convert.log_file(&log_fn).expect_output(&bam))?;

        for sam in sams.into_iter() {
            output.add_intermediate("LASTZ SAM", sam);
        }
        output.set_primary("Aligned BAM", bam);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::reference_genome::ReferenceGenome;
    use crate::external::fake_runner::FakeToolRunner;

    #[test]
    fn test_paired_alignment() {
        let tmp = tempfile::tempdir().unwrap();
        let mut genome = ReferenceGenome::new(tmp.path().join("Custom.fasta"), None);
        genome.set_working_fasta(tmp.path().join("genome.fasta"));
        let runner = FakeToolRunner::default();
        let request = AlignmentRequest {
            fastq1: Path::new("/reads/s1_R1.fastq"),
            fastq2: Some(Path::new("/reads/s1_R2.fastq")),
            output_dir: tmp.path(),
            genome: &genome,
            basename: "s1"
        };

        let output = Lastz::default().perform_alignment(&request, &runner).unwrap();
        assert_eq!(runner.count("seqtk"), 2);
        assert_eq!(runner.count("lastz"), 2);
        assert_eq!(runner.count("samtools merge"), 1);
        assert_eq!(output.files().len(), 5);
        assert_eq!(output.primary(), Some(tmp.path().join("s1.bam").as_path()));

        // aligns against the working copy, not the source
        let lastz = runner.invocations().into_iter().find(|i| i.tool() == "lastz").unwrap();
        assert!(lastz.get_args()[0].ends_with("genome.fasta[multiple]"));
    }

    #[test]
    fn test_single_end() {
        let tmp = tempfile::tempdir().unwrap();
        let genome = ReferenceGenome::new(tmp.path().join("genome.fasta"), None);
        let runner = FakeToolRunner::default();
        let request = AlignmentRequest {
            fastq1: Path::new("/reads/s1.fastq"),
            fastq2: None,
            output_dir: tmp.path(),
            genome: &genome,
            basename: "s1"
        };
        Lastz::default().perform_alignment(&request, &runner).unwrap();
        assert_eq!(runner.count("samtools view"), 1);
        assert_eq!(runner.count("samtools merge"), 0);
    }
}
