
/// Caches readsets and the reference genome
pub mod init;
/// Builds (or reuses) aligner indexes
pub mod prepare_indexes;
/// Per-readset alignment
pub mod align;
/// BAM post-processing and variant calling
pub mod analysis;
/// Readset and analysis records
pub mod import;

#[cfg(test)]
pub mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    use crate::artifacts::metadata::MetadataStore;
    use crate::data_types::file_type::TypeHierarchy;
    use crate::data_types::job::Job;
    use crate::data_types::job_parameters::JobParameters;
    use crate::external::fake_runner::FakeToolRunner;
    use crate::pipeline::task::TaskContext;
    use crate::pipeline::task_graph::standard_hierarchy;
    use crate::reference::genome_cache::ReferenceGenomeCache;
    use crate::steps::registry::StepRegistry;
    use crate::util::file_probe::DiskProbe;

    /// Everything a task needs, rooted in a temporary directory
    pub struct Fixture {
        pub tmp: TempDir,
        pub registry: StepRegistry,
        pub cache: ReferenceGenomeCache,
        pub tools: FakeToolRunner,
        pub metadata: MetadataStore,
        pub probe: DiskProbe,
        pub hierarchy: TypeHierarchy,
        job_counter: AtomicUsize
    }

    impl Fixture {
        pub fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let cache = ReferenceGenomeCache::new(tmp.path().join("cache"));
            Self {
                tmp,
                registry: StepRegistry::with_defaults(),
                cache,
                tools: FakeToolRunner::default(),
                metadata: MetadataStore::in_memory(),
                probe: DiskProbe,
                hierarchy: standard_hierarchy(),
                job_counter: AtomicUsize::new(0)
            }
        }

        pub fn ctx(&self) -> TaskContext<'_> {
            TaskContext {
                registry: &self.registry,
                cache: &self.cache,
                tools: &self.tools,
                metadata: &self.metadata,
                probe: &self.probe,
                hierarchy: &self.hierarchy
            }
        }

        /// Root job with its own analysis directory; inputs are written as small files under `reads/`
        pub fn job(&self, params: JobParameters, inputs: &[&str]) -> Job {
            let n = self.job_counter.fetch_add(1, Ordering::SeqCst);
            let reads_dir = self.tmp.path().join("reads");
            std::fs::create_dir_all(&reads_dir).unwrap();
            let input_files: Vec<PathBuf> = inputs.iter()
                .map(|name| {
                    let path = reads_dir.join(name);
                    std::fs::write(&path, "@r1\nACGT\n+\nIIII\n").unwrap();
                    path
                })
                .collect();
            let analysis_dir = self.tmp.path().join(format!("job{n}"));
            std::fs::create_dir_all(&analysis_dir).unwrap();
            // unvalidated, so tasks see configurations the registry would reject up front
            Job::new_unchecked(&format!("job{n}"), input_files, params, analysis_dir)
        }
    }

    /// Custom reference, BWA-Mem, CleanSam and LoFreq with one paired sample
    pub fn custom_params() -> JobParameters {
        let mut params = JobParameters::default();
        params.insert("referenceLibraryCreation", "Custom");
        params.insert("customReferenceName", "ref1");
        params.insert("refSequence", "ACGTACGTTTGACCATGACGATCGATCGGGCTAGCTAGCATCGACTAGC");
        params.insert("alignment", "BWA-Mem");
        params.insert("bamPostProcessing", "CleanSam");
        params.insert("analysis", "LoFreq");
        params.insert("library_id", "3");
        params.insert("sample_0", r#"{"readsetname": "s1", "fileName": "s1_R1.fastq", "fileName2": "s1_R2.fastq", "platform": "ILLUMINA"}"#);
        params
    }
}
