
use serde::{Deserialize, Serialize};

/// A named file type recognized by suffix, e.g. BAM = [".bam"]
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct FileType {
    name: String,
    suffixes: Vec<String>
}

impl FileType {
    pub fn new(name: &str, suffixes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            suffixes: suffixes.iter().map(|s| s.to_ascii_lowercase()).collect()
        }
    }

    pub fn fastq() -> Self {
        Self::new("FASTQ", &[".fastq", ".fq", ".fastq.gz", ".fq.gz"])
    }

    pub fn bam() -> Self {
        Self::new("BAM", &[".bam"])
    }

    pub fn vcf() -> Self {
        Self::new("VCF", &[".vcf", ".vcf.gz"])
    }

    pub fn fasta() -> Self {
        Self::new("FASTA", &[".fasta", ".fa", ".fna", ".fasta.gz"])
    }

    /// True if the file name ends with one of our suffixes (case-insensitive)
    pub fn is_type(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        self.suffixes.iter().any(|s| lower.ends_with(s.as_str()))
    }

    /// Strips the longest matching suffix, returning the base name
    pub fn base_name<'a>(&self, file_name: &'a str) -> &'a str {
        let lower = file_name.to_ascii_lowercase();
        let longest = self.suffixes.iter()
            .filter(|s| lower.ends_with(s.as_str()))
            .map(|s| s.len())
            .max();
        match longest {
            Some(l) => &file_name[..file_name.len() - l],
            None => file_name
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Maps a file type to the chain of types it was derived from, most recent first.
/// Order of insertion is the lookup order; the first matching type wins.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct TypeHierarchy {
    entries: Vec<(FileType, Vec<FileType>)>
}

impl TypeHierarchy {
    pub fn add(&mut self, file_type: FileType, derived_from: Vec<FileType>) {
        self.entries.push((file_type, derived_from));
    }

    /// Returns the derivation chain for the first type that matches the file name
    pub fn derivation_chain(&self, file_name: &str) -> Option<&[FileType]> {
        self.entries.iter()
            .find(|(ft, _chain)| ft.is_type(file_name))
            .map(|(_ft, chain)| chain.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_type() {
        let fq = FileType::fastq();
        assert!(fq.is_type("s1_R1.fastq.gz"));
        assert!(fq.is_type("S1_R1.FQ"));
        assert!(!fq.is_type("s1.bam"));
        assert_eq!(fq.base_name("s1_R1.fastq.gz"), "s1_R1");
        assert_eq!(fq.base_name("s1_R1.fq"), "s1_R1");
        assert_eq!(fq.base_name("other.txt"), "other.txt");
    }

    #[test]
    fn test_hierarchy() {
        let mut h = TypeHierarchy::default();
        h.add(FileType::vcf(), vec![FileType::bam(), FileType::fastq()]);
        h.add(FileType::bam(), vec![FileType::fastq()]);
        assert_eq!(h.derivation_chain("x.vcf.gz").unwrap().len(), 2);
        assert_eq!(h.derivation_chain("x.bam").unwrap().len(), 1);
        assert!(h.derivation_chain("x.txt").is_none());
    }
}
