
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::util::file_probe::FileProbe;

/// A reference sequence as the pipeline sees it.
/// Built once per job tree and shared (via `Arc`) by every split child.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ReferenceGenome {
    /// Database genome (reference library) id, if known
    genome_id: Option<u64>,
    /// Content identity of the source FASTA, used as the cache key
    content_id: Option<String>,
    /// The FASTA as supplied by the reference library step
    source_fasta: PathBuf,
    /// Normalized copy used by aligners
    working_fasta: Option<PathBuf>,
    /// Sequence dictionary for the working FASTA
    dictionary: Option<PathBuf>,
    /// Aligner name -> index directory
    aligner_indexes: BTreeMap<String, PathBuf>
}

impl ReferenceGenome {
    pub fn new(source_fasta: PathBuf, genome_id: Option<u64>) -> Self {
        Self {
            genome_id,
            source_fasta,
            ..Default::default()
        }
    }

    /// Returns the working FASTA, falling back to the source when normalization has not happened yet
    pub fn working_fasta_or_source(&self) -> &Path {
        self.working_fasta.as_deref().unwrap_or(&self.source_fasta)
    }

    /// True if both the working FASTA and dictionary are set and exist
    pub fn is_prepared(&self, probe: &dyn FileProbe) -> bool {
        match (self.working_fasta.as_deref(), self.dictionary.as_deref()) {
            (Some(fasta), Some(dict)) => probe.exists(fasta) && probe.exists(dict),
            _ => false
        }
    }

    /// Returns a copy with an additional aligner index directory
    pub fn with_aligner_index(&self, aligner: &str, index_dir: PathBuf) -> Self {
        let mut copy = self.clone();
        copy.aligner_indexes.insert(aligner.to_string(), index_dir);
        copy
    }

    // setters
    pub fn set_content_id(&mut self, content_id: String) {
        self.content_id = Some(content_id);
    }

    pub fn set_working_fasta(&mut self, working_fasta: PathBuf) {
        self.working_fasta = Some(working_fasta);
    }

    pub fn set_dictionary(&mut self, dictionary: PathBuf) {
        self.dictionary = Some(dictionary);
    }

    pub fn set_genome_id(&mut self, genome_id: Option<u64>) {
        self.genome_id = genome_id;
    }

    // getters
    pub fn genome_id(&self) -> Option<u64> {
        self.genome_id
    }

    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    pub fn source_fasta(&self) -> &Path {
        &self.source_fasta
    }

    pub fn working_fasta(&self) -> Option<&Path> {
        self.working_fasta.as_deref()
    }

    pub fn dictionary(&self) -> Option<&Path> {
        self.dictionary.as_deref()
    }

    pub fn aligner_index_dir(&self, aligner: &str) -> Option<&Path> {
        self.aligner_indexes.get(aligner).map(|p| p.as_path())
    }

    pub fn aligner_indexes(&self) -> &BTreeMap<String, PathBuf> {
        &self.aligner_indexes
    }
}
