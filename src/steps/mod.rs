/*!
# Steps
Capability interfaces for pipeline steps. A concrete tool implements only the capabilities it supports
(e.g., BWA both creates an index and aligns, LASTZ only aligns), and the `StepRegistry` maps step names to
factory closures that build them from job parameters.
*/

/// BWA-MEM aligner and index builder
pub mod bwa;
/// Picard CleanSam BAM post-processing
pub mod clean_sam;
/// LASTZ aligner
pub mod lastz;
/// LoFreq variant calling with depth of coverage
pub mod lofreq;
/// Reference library providers
pub mod reference_library;
/// The explicit step registry
pub mod registry;

use std::path::{Path, PathBuf};

use crate::data_types::artifact::ArtifactRole;
use crate::data_types::job_parameters::JobParameters;
use crate::data_types::reference_genome::ReferenceGenome;
use crate::errors::JobResult;
use crate::external::ToolRunner;

/// Files produced by a single step, with the role each should be tracked under
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepOutput {
    /// The file the next step should consume, if any (e.g., the BAM after post-processing)
    primary: Option<PathBuf>,
    /// Every produced file: (label, path, role)
    files: Vec<(String, PathBuf, ArtifactRole)>
}

impl StepOutput {
    /// Sets the primary output and records it as a final output
    pub fn set_primary(&mut self, label: &str, path: PathBuf) {
        self.add_output(label, path.clone(), ArtifactRole::FinalOutput);
        self.primary = Some(path);
    }

    pub fn add_output(&mut self, label: &str, path: PathBuf, role: ArtifactRole) {
        self.files.push((label.to_string(), path, role));
    }

    pub fn add_intermediate(&mut self, label: &str, path: PathBuf) {
        self.add_output(label, path, ArtifactRole::Intermediate);
    }

    // getters
    pub fn primary(&self) -> Option<&Path> {
        self.primary.as_deref()
    }

    pub fn files(&self) -> &[(String, PathBuf, ArtifactRole)] {
        &self.files
    }
}

/// Output of a reference library step
#[derive(Clone, Debug)]
pub struct ReferenceLibraryOutput {
    /// The genome with its source FASTA set
    pub genome: ReferenceGenome,
    /// Files to track
    pub output: StepOutput
}

/// Creates the source FASTA for a job
pub trait ReferenceLibraryStep: Send + Sync {
    fn name(&self) -> &str;

    /// Writes the reference FASTA into `output_dir`
    fn create_reference_fasta(&self, output_dir: &Path) -> JobResult<ReferenceLibraryOutput>;
}

/// Builds an aligner-specific index for a reference genome
pub trait CreatesIndex: Send + Sync {
    /// Name of the index, also the key in `ReferenceGenome::aligner_indexes`
    fn index_name(&self) -> &str;

    /// Optional derived-parameter identity (e.g., an annotation file id) for indexes that depend on more than the FASTA
    fn index_key(&self) -> Option<String> {
        None
    }

    /// Every file a complete index contains
    fn expected_index_files(&self, genome: &ReferenceGenome, index_dir: &Path) -> Vec<PathBuf>;

    /// Runs the external index builder, writing into `index_dir`
    fn create_index(&self, genome: &ReferenceGenome, index_dir: &Path, tools: &dyn ToolRunner) -> JobResult<()>;
}

/// Everything an aligner needs for one readset
#[derive(Clone, Copy, Debug)]
pub struct AlignmentRequest<'a> {
    pub fastq1: &'a Path,
    pub fastq2: Option<&'a Path>,
    pub output_dir: &'a Path,
    pub genome: &'a ReferenceGenome,
    pub basename: &'a str
}

/// Aligns reads, producing a BAM as the primary output
pub trait PerformsAlignment: Send + Sync {
    fn aligner_name(&self) -> &str;

    fn perform_alignment(&self, request: &AlignmentRequest, tools: &dyn ToolRunner) -> JobResult<StepOutput>;
}

/// Transforms a BAM into a new BAM (the primary output)
pub trait ProcessesBam: Send + Sync {
    fn name(&self) -> &str;

    fn process_bam(&self, bam: &Path, genome: &ReferenceGenome, output_dir: &Path, tools: &dyn ToolRunner) -> JobResult<StepOutput>;
}

/// Produces variant calls from a BAM
pub trait CallsVariants: Send + Sync {
    fn name(&self) -> &str;

    fn call_variants(&self, bam: &Path, genome: &ReferenceGenome, output_dir: &Path, tools: &dyn ToolRunner) -> JobResult<StepOutput>;
}

/// An aligner together with its optional index builder
pub struct AlignerSteps {
    pub indexer: Option<Box<dyn CreatesIndex>>,
    pub aligner: Box<dyn PerformsAlignment>
}

/// Looks up step-scoped parameters, e.g. `alignment.BWA-Mem.markSplit`, falling back to the bare key
pub fn step_param<'a>(params: &'a JobParameters, category_key: &str, step_name: &str, key: &str) -> Option<&'a str> {
    params.get(&format!("{category_key}.{step_name}.{key}"))
        .or_else(|| params.get(key))
}

/// Strips the final extension, e.g. "genome.fasta" -> "genome"
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_param() {
        let mut params = JobParameters::default();
        params.insert("alignment.BWA-Mem.markSplit", "true");
        params.insert("threads", "4");
        assert_eq!(step_param(&params, "alignment", "BWA-Mem", "markSplit"), Some("true"));
        assert_eq!(step_param(&params, "alignment", "BWA-Mem", "threads"), Some("4"));
        assert_eq!(step_param(&params, "alignment", "Lastz", "markSplit"), None);
    }

    #[test]
    fn test_step_output() {
        let mut output = StepOutput::default();
        output.add_intermediate("SAM", PathBuf::from("/a/x.sam"));
        output.set_primary("Aligned BAM", PathBuf::from("/a/x.bam"));
        assert_eq!(output.primary(), Some(Path::new("/a/x.bam")));
        assert_eq!(output.files().len(), 2);
        assert_eq!(output.files()[1].2, ArtifactRole::FinalOutput);
        assert_eq!(file_stem(Path::new("/r/genome.fasta")), "genome");
    }
}
