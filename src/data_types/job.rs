
use log::debug;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::data_types::job_parameters::{JobParameters, SampleDescriptor};
use crate::data_types::reference_genome::ReferenceGenome;
use crate::errors::JobResult;
use crate::steps::registry::StepRegistry;

/// Sub-folder of the top-level analysis directory holding shared artifacts
pub const SHARED_SUBFOLDER_NAME: &str = "Shared";
/// Sub-folder that split children are nested under
pub const SPLIT_SUBFOLDER_NAME: &str = "splits";
/// Parameter naming the alignment step; its presence means alignment is used
pub const ALIGNMENT_PARAM: &str = "alignment";

/// A unit of work: an ordered set of input files plus everything needed to process them
#[derive(Clone, Debug)]
pub struct Job {
    /// Unique id; split children are `<parent>.<n>`
    job_id: String,
    /// Ordered inputs
    input_files: Vec<PathBuf>,
    /// Flat parameter map
    parameters: JobParameters,
    /// Optional parameter file, recorded as an input for auditing
    parameters_file: Option<PathBuf>,
    /// Where this job writes its outputs
    analysis_dir: PathBuf,
    /// The analysis directory of the root job in this tree
    root_analysis_dir: PathBuf,
    /// Set when created by splitting
    parent_id: Option<String>,
    /// Children created by pairing are not split again
    splittable: bool,
    /// Shared by reference across the job tree
    reference_genome: Option<Arc<ReferenceGenome>>,
    /// Data id -> file cache
    cached_data: BTreeMap<u64, PathBuf>,
    /// Readsets described by the parameters, cached by the init task
    cached_readsets: Vec<SampleDescriptor>
}

impl Job {
    /// Creates a root job, validating the requested steps before any tool runs.
    /// # Arguments
    /// * `job_id` - identifier for the job, also used for checkpoint naming
    /// * `input_files` - ordered input files
    /// * `parameters` - the flat job parameter map
    /// * `analysis_dir` - root analysis directory for the job tree
    /// * `registry` - the step registry to validate against
    /// # Errors
    /// * if the step configuration is invalid (e.g., zero or multiple reference library steps with alignment)
    pub fn create(
        job_id: &str, input_files: Vec<PathBuf>, parameters: JobParameters, analysis_dir: PathBuf, registry: &StepRegistry
    ) -> JobResult<Self> {
        registry.validate_job_parameters(&parameters)?;
        Ok(Self::new_unchecked(job_id, input_files, parameters, analysis_dir))
    }

    /// Builds a job with no registry validation; mostly useful for tests and the splitter
    pub fn new_unchecked(job_id: &str, input_files: Vec<PathBuf>, parameters: JobParameters, analysis_dir: PathBuf) -> Self {
        Self {
            job_id: job_id.to_string(),
            input_files,
            parameters,
            parameters_file: None,
            root_analysis_dir: analysis_dir.clone(),
            analysis_dir,
            parent_id: None,
            splittable: true,
            reference_genome: None,
            cached_data: Default::default(),
            cached_readsets: Default::default()
        }
    }

    /// Creates a child job for a subset of inputs.
    /// Parameters and caches are copied by value; the reference genome is shared.
    /// # Arguments
    /// * `index` - the child ordinal, used for id and directory naming
    /// * `input_files` - the subset of inputs handled by the child
    pub fn create_child(&self, index: usize, input_files: Vec<PathBuf>) -> Self {
        let child_name = format!("{}.{index}", self.job_id);
        let analysis_dir = self.analysis_dir.join(SPLIT_SUBFOLDER_NAME).join(&child_name);
        debug!("Creating split job {child_name} at {analysis_dir:?}");
        Self {
            job_id: child_name,
            input_files,
            parameters: self.parameters.clone(),
            parameters_file: self.parameters_file.clone(),
            analysis_dir,
            root_analysis_dir: self.root_analysis_dir.clone(),
            parent_id: Some(self.job_id.clone()),
            splittable: self.splittable,
            reference_genome: self.reference_genome.clone(),
            cached_data: self.cached_data.clone(),
            cached_readsets: self.cached_readsets.clone()
        }
    }

    /// True if this job will run an alignment step
    pub fn is_alignment_used(&self) -> bool {
        self.parameters.get(ALIGNMENT_PARAM).is_some()
    }

    /// Directory for artifacts shared across the whole job tree
    pub fn shared_dir(&self) -> PathBuf {
        self.root_analysis_dir.join(SHARED_SUBFOLDER_NAME)
    }

    pub fn cache_data(&mut self, data_id: u64, path: PathBuf) {
        debug!("caching data: {data_id} / {path:?}");
        self.cached_data.insert(data_id, path);
    }

    pub fn cache_readsets(&mut self, readsets: Vec<SampleDescriptor>) {
        self.cached_readsets = readsets;
    }

    // setters
    pub fn set_reference_genome(&mut self, genome: Arc<ReferenceGenome>) {
        self.reference_genome = Some(genome);
    }

    pub fn set_splittable(&mut self, splittable: bool) {
        self.splittable = splittable;
    }

    pub fn set_parameters_file(&mut self, parameters_file: PathBuf) {
        self.parameters_file = Some(parameters_file);
    }

    pub fn set_input_files(&mut self, input_files: Vec<PathBuf>) {
        self.input_files = input_files;
    }

    // getters
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn input_files(&self) -> &[PathBuf] {
        &self.input_files
    }

    pub fn parameters(&self) -> &JobParameters {
        &self.parameters
    }

    pub fn parameters_file(&self) -> Option<&Path> {
        self.parameters_file.as_deref()
    }

    pub fn analysis_dir(&self) -> &Path {
        &self.analysis_dir
    }

    pub fn root_analysis_dir(&self) -> &Path {
        &self.root_analysis_dir
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn is_splittable(&self) -> bool {
        self.splittable
    }

    pub fn reference_genome(&self) -> Option<&Arc<ReferenceGenome>> {
        self.reference_genome.as_ref()
    }

    pub fn cached_data(&self, data_id: u64) -> Option<&Path> {
        self.cached_data.get(&data_id).map(|p| p.as_path())
    }

    pub fn all_cached_data(&self) -> &BTreeMap<u64, PathBuf> {
        &self.cached_data
    }

    pub fn cached_readsets(&self) -> &[SampleDescriptor] {
        &self.cached_readsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_copies_by_value() {
        let mut params = JobParameters::default();
        params.insert("alignment", "BWA-Mem");
        let mut parent = Job::new_unchecked("job", vec![PathBuf::from("a.fq"), PathBuf::from("b.fq")], params, PathBuf::from("/work/job"));
        parent.cache_data(1, PathBuf::from("/data/1.fq"));
        parent.set_reference_genome(Arc::new(ReferenceGenome::new(PathBuf::from("/work/job/Shared/Custom.fasta"), None)));

        let mut child = parent.create_child(0, vec![PathBuf::from("a.fq")]);
        assert_eq!(child.job_id(), "job.0");
        assert_eq!(child.parent_id(), Some("job"));
        assert_eq!(child.analysis_dir(), Path::new("/work/job/splits/job.0"));
        assert_eq!(child.shared_dir(), Path::new("/work/job/Shared"));
        assert_eq!(child.cached_data(1), Some(Path::new("/data/1.fq")));
        assert!(child.is_alignment_used());

        // the genome is the same allocation
        assert!(Arc::ptr_eq(child.reference_genome().unwrap(), parent.reference_genome().unwrap()));

        // mutations after the split do not propagate
        child.cache_data(2, PathBuf::from("/data/2.fq"));
        assert!(parent.cached_data(2).is_none());
        parent.cache_data(3, PathBuf::from("/data/3.fq"));
        assert!(child.cached_data(3).is_none());
    }
}
