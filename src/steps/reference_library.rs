
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::data_types::artifact::ArtifactRole;
use crate::data_types::job_parameters::JobParameters;
use crate::data_types::reference_genome::ReferenceGenome;
use crate::errors::{JobError, JobResult};
use crate::steps::{ReferenceLibraryOutput, ReferenceLibraryStep, StepOutput};

/// File name written by the custom reference step
pub const CUSTOM_FASTA_NAME: &str = "Custom.fasta";
/// FASTA line width for sequences we write
const FASTA_LINE_WIDTH: usize = 60;

/// Builds a single-contig reference from a name and sequence supplied in the job parameters
#[derive(Clone, Debug)]
pub struct CustomReferenceLibrary {
    name: String,
    sequence: String,
    genome_id: Option<u64>
}

impl CustomReferenceLibrary {
    pub const STEP_NAME: &'static str = "Custom";

    /// # Errors
    /// * if either `customReferenceName` or `refSequence` is missing
    pub fn from_params(params: &JobParameters) -> JobResult<Self> {
        let (name, sequence) = match (params.get("customReferenceName"), params.get("refSequence")) {
            (Some(n), Some(s)) => (n, s),
            _ => return Err(JobError::config("Must provide both a name and sequence for custom reference sequences, cannot create library"))
        };
        let sequence: String = sequence.chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        Ok(Self {
            name: name.to_string(),
            sequence,
            genome_id: params.library_id()?
        })
    }
}

impl ReferenceLibraryStep for CustomReferenceLibrary {
    fn name(&self) -> &str {
        Self::STEP_NAME
    }

    fn create_reference_fasta(&self, output_dir: &Path) -> JobResult<ReferenceLibraryOutput> {
        std::fs::create_dir_all(output_dir)?;
        let fasta_fn = output_dir.join(CUSTOM_FASTA_NAME);
        info!("Writing custom reference {} ({} bp) to {fasta_fn:?}", self.name, self.sequence.len());

        let mut writer = BufWriter::new(File::create(&fasta_fn)?);
        write_fasta_record(&mut writer, &self.name, self.sequence.as_bytes())?;
        writer.flush()?;

        let mut output = StepOutput::default();
        output.add_output("Reference FASTA", fasta_fn.clone(), ArtifactRole::Input);
        Ok(ReferenceLibraryOutput {
            genome: ReferenceGenome::new(fasta_fn, self.genome_id),
            output
        })
    }
}

/// Uses a FASTA that already exists, copying it into the shared folder
#[derive(Clone, Debug)]
pub struct FastaFileLibrary {
    fasta: PathBuf,
    genome_id: Option<u64>
}

impl FastaFileLibrary {
    pub const STEP_NAME: &'static str = "FastaFile";

    /// # Errors
    /// * if `referenceFasta` is missing or does not exist
    pub fn from_params(params: &JobParameters) -> JobResult<Self> {
        let fasta = PathBuf::from(params.require("referenceFasta")?);
        if !fasta.exists() {
            return Err(JobError::config(format!("Reference FASTA does not exist: {}", fasta.display())));
        }
        Ok(Self {
            fasta,
            genome_id: params.library_id()?
        })
    }
}

impl ReferenceLibraryStep for FastaFileLibrary {
    fn name(&self) -> &str {
        Self::STEP_NAME
    }

    fn create_reference_fasta(&self, output_dir: &Path) -> JobResult<ReferenceLibraryOutput> {
        std::fs::create_dir_all(output_dir)?;
        let file_name = self.fasta.file_name()
            .ok_or_else(|| JobError::config(format!("Reference FASTA has no file name: {}", self.fasta.display())))?;
        let fasta_fn = output_dir.join(file_name);
        if fasta_fn != self.fasta {
            info!("Copying reference {:?} to {fasta_fn:?}", self.fasta);
            std::fs::copy(&self.fasta, &fasta_fn)?;
        }

        let mut output = StepOutput::default();
        output.add_output("Reference FASTA", fasta_fn.clone(), ArtifactRole::Input);
        Ok(ReferenceLibraryOutput {
            genome: ReferenceGenome::new(fasta_fn, self.genome_id),
            output
        })
    }
}

/// Writes one FASTA record, wrapping the sequence at a fixed width
pub fn write_fasta_record<W: Write>(writer: &mut W, name: &str, sequence: &[u8]) -> std::io::Result<()> {
    writeln!(writer, ">{name}")?;
    for chunk in sequence.chunks(FASTA_LINE_WIDTH) {
        writer.write_all(chunk)?;
        writeln!(writer)?;
    }
    Ok(())
}
