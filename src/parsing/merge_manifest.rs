
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{JobError, JobResult};
use crate::parsing::coverage::default_coverage_path;

/// One call set to merge, as listed in a tab-delimited manifest
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MergeInput {
    /// Registered output file id of the VCF
    pub output_file_id: u64,
    /// Readset the VCF was called from; when absent the sample name is taken from the VCF header
    #[serde(default)]
    pub readset_id: Option<u64>,
    /// Genome (reference library) the VCF was called against
    #[serde(default)]
    pub genome_id: Option<u64>,
    pub vcf: PathBuf,
    /// DepthOfCoverage table; defaults to the file beside the VCF
    #[serde(default)]
    pub coverage: Option<PathBuf>
}

impl MergeInput {
    pub fn coverage_path(&self) -> PathBuf {
        self.coverage.clone()
            .unwrap_or_else(|| default_coverage_path(&self.vcf))
    }
}

/// Reads `output_file_id  readset_id  genome_id  vcf  coverage` rows; relative paths resolve against the manifest folder
/// # Errors
/// * if the manifest cannot be parsed or is empty
pub fn load_merge_manifest(manifest_fn: &Path) -> JobResult<Vec<MergeInput>> {
    let base_dir = manifest_fn.parent().map(|p| p.to_path_buf()).unwrap_or_default();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .from_path(manifest_fn)?;

    let mut inputs = vec![];
    for result in reader.deserialize() {
        let mut input: MergeInput = result?;
        if input.vcf.is_relative() {
            input.vcf = base_dir.join(&input.vcf);
        }
        if let Some(coverage) = input.coverage.as_mut() {
            if coverage.is_relative() {
                *coverage = base_dir.join(&*coverage);
            }
        }
        inputs.push(input);
    }

    if inputs.is_empty() {
        return Err(JobError::config(format!("No inputs listed in {}", manifest_fn.display())));
    }
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let manifest_fn = tmp.path().join("inputs.tsv");
        std::fs::write(&manifest_fn,
            "output_file_id\treadset_id\tgenome_id\tvcf\tcoverage\n\
             11\t1\t3\ts1.all.vcf.gz\t\n\
             12\t\t3\t/abs/s2.all.vcf.gz\t/abs/s2.depth\n"
        ).unwrap();

        let inputs = load_merge_manifest(&manifest_fn).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].vcf, tmp.path().join("s1.all.vcf.gz"));
        assert_eq!(inputs[0].coverage_path(), tmp.path().join("s1.coverage"));
        assert_eq!(inputs[1].readset_id, None);
        assert_eq!(inputs[1].coverage_path(), PathBuf::from("/abs/s2.depth"));
    }
}
