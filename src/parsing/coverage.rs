
use log::debug;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::path::{Path, PathBuf};

use crate::errors::{JobError, JobResult};

/// Suffix of a LoFreq call set
pub const LOFREQ_VCF_SUFFIX: &str = ".all.vcf.gz";
/// Suffix of the companion DepthOfCoverage table
pub const COVERAGE_SUFFIX: &str = ".coverage";

/// (contig, 1-based position)
pub type Locus = (String, usize);

/// Per-base depth for a subset of loci from a GATK DepthOfCoverage table
#[derive(Clone, Debug, Default)]
pub struct CoverageTable {
    path: PathBuf,
    depths: HashMap<Locus, u64>
}

impl CoverageTable {
    /// Loads the `Total_Depth` for each wanted locus, skipping everything else.
    /// # Arguments
    /// * `coverage_fn` - tab-delimited table whose first column is `contig:pos` and second is the total depth
    /// * `wanted` - the loci to keep
    /// # Errors
    /// * if the file cannot be read or a wanted row is malformed
    pub fn load(coverage_fn: &Path, wanted: &HashSet<Locus>) -> JobResult<Self> {
        debug!("Loading depth for {} loci from {coverage_fn:?}", wanted.len());
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_path(coverage_fn)?;

        let mut depths: HashMap<Locus, u64> = Default::default();
        for result in reader.records() {
            let record = result?;
            let locus_text = record.get(0).unwrap_or_default();
            let locus = match parse_locus(locus_text) {
                Some(l) => l,
                None => continue
            };
            if !wanted.contains(&locus) {
                continue;
            }
            let depth_text = record.get(1).unwrap_or_default();
            let depth: u64 = depth_text.trim().parse()
                .map_err(|_e| JobError::data(format!(
                    "Unable to parse depth {depth_text:?} for {locus_text} in {}", coverage_fn.display()
                )))?;
            depths.insert(locus, depth);
        }

        Ok(Self {
            path: coverage_fn.to_path_buf(),
            depths
        })
    }

    /// Depth at a locus that was requested at load time
    /// # Errors
    /// * if the table had no row for the locus
    pub fn depth(&self, contig: &str, position: usize) -> JobResult<u64> {
        self.depths.get(&(contig.to_string(), position))
            .copied()
            .ok_or_else(|| JobError::data(format!(
                "Unable to find depth for {contig}:{position} in {}", self.path.display()
            )))
    }
}

/// Splits `contig:pos`; the contig may itself contain colons
fn parse_locus(text: &str) -> Option<Locus> {
    let (contig, position) = text.rsplit_once(':')?;
    let position = position.trim().parse::<usize>().ok()?;
    Some((contig.to_string(), position))
}

/// The coverage table the LoFreq step writes beside a call set
pub fn default_coverage_path(vcf_fn: &Path) -> PathBuf {
    let text = vcf_fn.to_string_lossy();
    let base = text.strip_suffix(LOFREQ_VCF_SUFFIX)
        .or_else(|| text.strip_suffix(".vcf.gz"))
        .or_else(|| text.strip_suffix(".vcf"))
        .unwrap_or(&text);
    PathBuf::from(format!("{base}{COVERAGE_SUFFIX}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path() {
        assert_eq!(default_coverage_path(Path::new("/a/s1.all.vcf.gz")), PathBuf::from("/a/s1.coverage"));
        assert_eq!(default_coverage_path(Path::new("/a/s1.vcf")), PathBuf::from("/a/s1.coverage"));
    }

    #[test]
    fn test_load() {
        let tmp = tempfile::tempdir().unwrap();
        let coverage_fn = tmp.path().join("s1.coverage");
        std::fs::write(&coverage_fn,
            "Locus\tTotal_Depth\tAverage_Depth_sample\tDepth_for_s1\n\
             chr1:99\t48\t48.00\t48\n\
             chr1:100\t50\t50.00\t50\n\
             HLA-A*01:01:01:01:5\t7\t7.00\t7\n"
        ).unwrap();

        let mut wanted: HashSet<Locus> = Default::default();
        wanted.insert(("chr1".to_string(), 100));
        wanted.insert(("HLA-A*01:01:01:01".to_string(), 5));
        wanted.insert(("chr2".to_string(), 1));
        let table = CoverageTable::load(&coverage_fn, &wanted).unwrap();
        assert_eq!(table.depth("chr1", 100).unwrap(), 50);
        assert_eq!(table.depth("HLA-A*01:01:01:01", 5).unwrap(), 7);
        // not wanted, so not loaded
        assert!(table.depth("chr1", 99).is_err());
        // wanted but absent
        assert!(matches!(table.depth("chr2", 1), Err(JobError::DataInconsistency(_))));
    }
}
