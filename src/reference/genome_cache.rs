/*!
# Reference genome cache
Working FASTA, sequence dictionary, and aligner indexes are keyed by the content of the source FASTA,
so repeated jobs against the same sequence reuse earlier work. Every cache entry is built in a private
temporary directory and renamed into place, so a concurrent sibling either sees a complete entry or none.
*/

use log::{debug, info, warn};
use rust_lib_reference_genome::reference_genome::ReferenceGenome as FastaGenome;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::data_types::reference_genome::ReferenceGenome;
use crate::errors::{JobError, JobResult};
use crate::external::{verify_expected_outputs, ToolRunner};
use crate::steps::reference_library::write_fasta_record;
use crate::steps::{CreatesIndex, ReferenceLibraryOutput, ReferenceLibraryStep};

/// Normalized FASTA name inside a cache entry
pub const WORKING_FASTA_NAME: &str = "genome.fasta";
/// Sequence dictionary name inside a cache entry
pub const DICTIONARY_NAME: &str = "genome.dict";
/// Sub-folder of a cache entry holding aligner indexes
pub const INDEX_SUBFOLDER_NAME: &str = "indexes";

/// Disambiguates temporary build folders from threads in the same process
static BUILD_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Content-addressed store of prepared genomes
#[derive(Clone, Debug)]
pub struct ReferenceGenomeCache {
    cache_dir: PathBuf
}

impl ReferenceGenomeCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Runs the single reference library provider and prepares its working FASTA and dictionary.
    /// # Arguments
    /// * `providers` - the reference library steps requested by the job; exactly one is required
    /// * `shared_dir` - where the provider writes the source FASTA
    /// # Errors
    /// * if zero or more than one provider is supplied
    /// * if the provider fails or the FASTA cannot be parsed
    pub fn ensure_fasta(&self, providers: &[Box<dyn ReferenceLibraryStep>], shared_dir: &Path) -> JobResult<ReferenceLibraryOutput> {
        let provider = match providers {
            [] => return Err(JobError::config("No reference library type was supplied")),
            [p] => p,
            _ => return Err(JobError::config("More than 1 reference library type was supplied"))
        };

        info!("Creating reference FASTA with {}", provider.name());
        let mut library = provider.create_reference_fasta(shared_dir)?;
        let source = library.genome.source_fasta().to_path_buf();
        if !source.exists() {
            return Err(JobError::ToolFailure { tool: provider.name().to_string(), expected: source });
        }

        let content_id = content_identity(&source)?;
        debug!("Content id for {source:?}: {content_id}");
        let entry_dir = self.cache_dir.join(&content_id);
        let is_complete = |dir: &Path| dir.join(WORKING_FASTA_NAME).exists() && dir.join(DICTIONARY_NAME).exists();

        let built = publish_dir(&entry_dir, is_complete, |tmp_dir| {
            write_working_fasta(&source, &tmp_dir.join(WORKING_FASTA_NAME))?;
            // UR must name where the FASTA ends up, not the staging copy
            self.ensure_dictionary(&tmp_dir.join(WORKING_FASTA_NAME), &entry_dir.join(WORKING_FASTA_NAME), &tmp_dir.join(DICTIONARY_NAME))?;
            Ok(())
        })?;
        if !built {
            info!("Reusing cached working FASTA for {source:?} in {entry_dir:?}");
        }

        library.genome.set_content_id(content_id);
        library.genome.set_working_fasta(entry_dir.join(WORKING_FASTA_NAME));
        library.genome.set_dictionary(entry_dir.join(DICTIONARY_NAME));
        Ok(library)
    }

    /// Writes a SAM-style sequence dictionary for `fasta` unless one already exists
    /// # Arguments
    /// * `fasta` - the FASTA to read contigs from
    /// * `published_fasta` - the FASTA location recorded in each `UR` field
    /// * `dictionary` - the output path
    /// # Errors
    /// * if the FASTA cannot be loaded or the dictionary is still missing afterwards
    pub fn ensure_dictionary(&self, fasta: &Path, published_fasta: &Path, dictionary: &Path) -> JobResult<()> {
        if dictionary.exists() {
            info!("Dictionary already exists, will not recreate: {dictionary:?}");
            return Ok(());
        }
        info!("Creating sequence dictionary {dictionary:?}");
        let genome = load_fasta(fasta)?;
        let mut writer = BufWriter::new(File::create(dictionary)?);
        writeln!(writer, "@HD\tVN:1.6")?;
        for contig in sorted_contigs(&genome).iter() {
            let length = genome.get_full_chromosome(contig).len();
            writeln!(writer, "@SQ\tSN:{contig}\tLN:{length}\tUR:file:{}", published_fasta.display())?;
        }
        writer.flush()?;
        drop(writer);
        verify_expected_outputs("sequence dictionary", &[dictionary.to_path_buf()])
    }

    /// Returns the directory holding a complete index for this genome, building it only if needed.
    /// # Arguments
    /// * `indexer` - the index builder, which also names the index and lists its files
    /// * `genome` - a genome prepared through `ensure_fasta`
    /// * `tools` - runner for the external index builder
    /// # Errors
    /// * if the genome has no content id
    /// * if the build fails or leaves an expected file missing
    pub fn ensure_index(&self, indexer: &dyn CreatesIndex, genome: &ReferenceGenome, tools: &dyn ToolRunner) -> JobResult<PathBuf> {
        let content_id = genome.content_id()
            .ok_or_else(|| JobError::config("Reference genome must be prepared by the cache before building indexes"))?;
        let index_label = match indexer.index_key() {
            Some(key) => format!("{}-{key}", indexer.index_name()),
            None => indexer.index_name().to_string()
        };
        let index_dir = self.cache_dir.join(content_id).join(INDEX_SUBFOLDER_NAME).join(&index_label);
        let is_complete = |dir: &Path| indexer.expected_index_files(genome, dir).iter().all(|f| f.exists());

        let built = publish_dir(&index_dir, is_complete, |tmp_dir| {
            info!("Building {index_label} index for {:?}", genome.working_fasta_or_source());
            indexer.create_index(genome, tmp_dir, tools)?;
            verify_expected_outputs(indexer.index_name(), &indexer.expected_index_files(genome, tmp_dir))
        })?;
        if !built {
            info!("Reusing cached {index_label} index at {index_dir:?}");
        }
        Ok(index_dir)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// Ensures `final_dir` holds a complete entry. Returns true if this call built it.
/// The entry is built in a temporary sibling and renamed into place; if another writer wins the rename,
/// their copy is reused.
fn publish_dir<C, B>(final_dir: &Path, is_complete: C, build: B) -> JobResult<bool>
where
    C: Fn(&Path) -> bool,
    B: FnOnce(&Path) -> JobResult<()>
{
    if is_complete(final_dir) {
        return Ok(false);
    }
    let parent = final_dir.parent()
        .ok_or_else(|| JobError::config(format!("Cache entry has no parent folder: {}", final_dir.display())))?;
    std::fs::create_dir_all(parent)?;

    let name = final_dir.file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_dir = parent.join(format!(
        ".{name}.tmp-{}-{}", std::process::id(), BUILD_COUNTER.fetch_add(1, Ordering::SeqCst)
    ));
    std::fs::create_dir_all(&tmp_dir)?;

    if let Err(e) = build(&tmp_dir) {
        remove_quietly(&tmp_dir);
        return Err(e);
    }

    if final_dir.exists() && !is_complete(final_dir) {
        // stale partial entry from a killed process
        warn!("Replacing incomplete cache entry {final_dir:?}");
        std::fs::remove_dir_all(final_dir)?;
    }

    match std::fs::rename(&tmp_dir, final_dir) {
        Ok(()) => Ok(true),
        Err(e) => {
            remove_quietly(&tmp_dir);
            if is_complete(final_dir) {
                debug!("Lost publish race for {final_dir:?}, using the existing copy");
                Ok(false)
            } else {
                Err(e.into())
            }
        }
    }
}

fn remove_quietly(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        warn!("Unable to remove temporary folder {dir:?}: {e}");
    }
}

/// Hex SHA-256 of the file contents
pub fn content_identity(path: &Path) -> JobResult<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn load_fasta(fasta: &Path) -> JobResult<FastaGenome> {
    let fasta_fn = fasta.to_path_buf();
    FastaGenome::from_fasta(&fasta_fn)
        .map_err(|e| JobError::data(format!("Error while loading FASTA {}: {e:?}", fasta.display())))
}

fn sorted_contigs(genome: &FastaGenome) -> Vec<String> {
    let mut contigs: Vec<String> = genome.contig_keys().iter()
        .map(|k| k.to_string())
        .collect();
    contigs.sort();
    contigs
}

/// Upper-cases and re-wraps every contig, in name order
fn write_working_fasta(source: &Path, working: &Path) -> JobResult<()> {
    let genome = load_fasta(source)?;
    let mut writer = BufWriter::new(File::create(working)?);
    for contig in sorted_contigs(&genome).iter() {
        let sequence = genome.get_full_chromosome(contig).to_ascii_uppercase();
        write_fasta_record(&mut writer, contig, &sequence)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::job_parameters::JobParameters;
    use crate::external::fake_runner::FakeToolRunner;
    use crate::steps::bwa::BwaMem;
    use crate::steps::reference_library::CustomReferenceLibrary;

    fn custom_provider() -> Vec<Box<dyn ReferenceLibraryStep>> {
        let mut params = JobParameters::default();
        params.insert("customReferenceName", "ref1");
        params.insert("refSequence", "acgtacgtNN");
        vec![Box::new(CustomReferenceLibrary::from_params(&params).unwrap())]
    }

    #[test]
    fn test_provider_count() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ReferenceGenomeCache::new(tmp.path().join("cache"));
        let err = cache.ensure_fasta(&[], tmp.path()).unwrap_err();
        assert_eq!(err.to_string(), "configuration error: No reference library type was supplied");

        let mut two = custom_provider();
        two.extend(custom_provider());
        let err = cache.ensure_fasta(&two, tmp.path()).unwrap_err();
        assert_eq!(err.to_string(), "configuration error: More than 1 reference library type was supplied");
    }

    #[test]
    fn test_ensure_fasta() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ReferenceGenomeCache::new(tmp.path().join("cache"));
        let shared = tmp.path().join("Shared");
        let library = cache.ensure_fasta(&custom_provider(), &shared).unwrap();
        let genome = library.genome;

        let working = genome.working_fasta().unwrap();
        assert!(working.starts_with(tmp.path().join("cache")));
        assert_eq!(std::fs::read_to_string(working).unwrap(), ">ref1\nACGTACGTNN\n");
        let dict = std::fs::read_to_string(genome.dictionary().unwrap()).unwrap();
        assert!(dict.starts_with("@HD\tVN:1.6\n@SQ\tSN:ref1\tLN:10\t"));
        // the dictionary points at the published FASTA, not the staging directory
        assert!(dict.contains(&format!("UR:file:{}\n", working.display())));
        assert!(!dict.contains(".tmp-"));
        assert!(genome.is_prepared(&crate::util::file_probe::DiskProbe));

        // same content, second job: same entry
        let again = cache.ensure_fasta(&custom_provider(), &tmp.path().join("Shared2")).unwrap();
        assert_eq!(again.genome.content_id(), genome.content_id());
        assert_eq!(again.genome.working_fasta(), genome.working_fasta());
    }

    #[test]
    fn test_ensure_index_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ReferenceGenomeCache::new(tmp.path().join("cache"));
        let genome = cache.ensure_fasta(&custom_provider(), &tmp.path().join("Shared")).unwrap().genome;
        let runner = FakeToolRunner::default();
        let bwa = BwaMem::default();

        let first = cache.ensure_index(&bwa, &genome, &runner).unwrap();
        let second = cache.ensure_index(&bwa, &genome, &runner).unwrap();
        assert_eq!(first, second);
        assert_eq!(runner.count("bwa index"), 1);
        assert!(bwa.expected_index_files(&genome, &first).iter().all(|f| f.exists()));

        // no temporary folders left behind
        let leftovers = std::fs::read_dir(first.parent().unwrap()).unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().starts_with('.'))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_failed_index_build() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ReferenceGenomeCache::new(tmp.path().join("cache"));
        let genome = cache.ensure_fasta(&custom_provider(), &tmp.path().join("Shared")).unwrap().genome;
        let runner = FakeToolRunner::with_silent_tools(&["bwa index"]);
        let result = cache.ensure_index(&BwaMem::default(), &genome, &runner);
        assert!(matches!(result, Err(JobError::ToolFailure { .. })));

        // nothing was published
        let index_root = tmp.path().join("cache").join(genome.content_id().unwrap()).join(INDEX_SUBFOLDER_NAME);
        assert_eq!(std::fs::read_dir(index_root).unwrap().count(), 0);
    }

    #[test]
    fn test_unprepared_genome() {
        let cache = ReferenceGenomeCache::new(PathBuf::from("/unused"));
        let genome = ReferenceGenome::new(PathBuf::from("/x/genome.fasta"), None);
        assert!(cache.ensure_index(&BwaMem::default(), &genome, &FakeToolRunner::default()).is_err());
    }
}
