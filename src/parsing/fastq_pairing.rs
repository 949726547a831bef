
use log::{debug, trace};
use rustc_hash::FxHashMap as HashMap;
use std::path::{Path, PathBuf};

use crate::data_types::file_type::FileType;
use crate::data_types::job_parameters::SampleDescriptor;

/// Forward/reverse naming conventions, most specific first
const MATE_CONVENTIONS: [(&str, &str); 4] = [
    ("_R1_001", "_R2_001"),
    ("_R1", "_R2"),
    (".R1", ".R2"),
    ("_1", "_2")
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mate {
    Forward,
    Reverse
}

/// One unit of alignment work: a forward file and its mate, if any
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FilePair {
    pub first: PathBuf,
    pub second: Option<PathBuf>
}

impl FilePair {
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.first.clone()];
        if let Some(second) = self.second.as_ref() {
            files.push(second.clone());
        }
        files
    }
}

/// Returns a key shared by both mates and which mate this is, if the name follows a convention
pub fn mate_key(file_name: &str) -> Option<(String, Mate)> {
    let fastq = FileType::fastq();
    if !fastq.is_type(file_name) {
        return None;
    }
    let base = fastq.base_name(file_name);
    MATE_CONVENTIONS.iter().enumerate()
        .find_map(|(i, (forward, reverse))| {
            if let Some(stem) = base.strip_suffix(forward) {
                Some((format!("{stem}#{i}"), Mate::Forward))
            } else {
                base.strip_suffix(reverse).map(|stem| (format!("{stem}#{i}"), Mate::Reverse))
            }
        })
}

/// Base name for everything aligned from a read file: the mate suffix and FASTQ extension are dropped,
/// e.g. `s1_R1_001.fastq.gz` -> `s1`, `s2.fq` -> `s2`
pub fn alignment_basename(path: &Path) -> String {
    let name = file_name(path);
    match mate_key(&name) {
        Some((key, _mate)) => key.rsplit_once('#')
            .map(|(stem, _i)| stem.to_string())
            .unwrap_or(key),
        None => FileType::fastq().base_name(&name).to_string()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// True if the descriptor's name refers to this path, by full path or by file name
fn refers_to(declared: &str, path: &Path) -> bool {
    Path::new(declared) == path || declared == file_name(path)
}

/// Groups input files into forward/reverse pairs.
/// Pairs declared by `sample_N` (fileName/fileName2) win; a declared single file stays single.
/// Remaining files are paired by naming convention. Anything left over is a singleton, never an error.
/// Output order follows the position of each group's first file in `files`.
pub fn pair_input_files(files: &[PathBuf], descriptors: &[SampleDescriptor]) -> Vec<FilePair> {
    let mut used = vec![false; files.len()];
    let mut groups: Vec<(usize, FilePair)> = vec![];

    let position_of = |name: &str, used: &[bool]| {
        files.iter().enumerate()
            .position(|(i, f)| !used[i] && refers_to(name, f))
    };

    for descriptor in descriptors.iter() {
        let first = match position_of(&descriptor.file_name, &used) {
            Some(i) => i,
            None => continue
        };
        used[first] = true;
        let second = descriptor.file_name2.as_deref()
            .and_then(|name2| position_of(name2, &used));
        if let Some(j) = second {
            used[j] = true;
        }
        trace!("Declared pair: {:?} / {:?}", files[first], second.map(|j| &files[j]));
        groups.push((first.min(second.unwrap_or(first)), FilePair {
            first: files[first].clone(),
            second: second.map(|j| files[j].clone())
        }));
    }

    // convention pairing over whatever is left
    let mut forward_by_key: HashMap<String, Vec<usize>> = Default::default();
    let mut reverse_by_key: HashMap<String, Vec<usize>> = Default::default();
    for (i, f) in files.iter().enumerate().filter(|(i, _f)| !used[*i]) {
        if let Some((key, mate)) = mate_key(&file_name(f)) {
            match mate {
                Mate::Forward => forward_by_key.entry(key).or_default().push(i),
                Mate::Reverse => reverse_by_key.entry(key).or_default().push(i)
            };
        }
    }
    for (key, forwards) in forward_by_key.iter() {
        let reverses = match reverse_by_key.get(key) {
            Some(r) => r,
            None => continue
        };
        for (&f, &r) in forwards.iter().zip(reverses.iter()) {
            used[f] = true;
            used[r] = true;
            groups.push((f.min(r), FilePair {
                first: files[f].clone(),
                second: Some(files[r].clone())
            }));
        }
    }

    for (i, f) in files.iter().enumerate() {
        if !used[i] {
            debug!("No mate found for {f:?}, treating as unpaired");
            groups.push((i, FilePair { first: f.clone(), second: None }));
        }
    }

    groups.sort_by_key(|(i, _p)| *i);
    groups.into_iter().map(|(_i, p)| p).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("/reads/{n}"))).collect()
    }

    #[test]
    fn test_mate_key() {
        assert_eq!(mate_key("s1_R1_001.fastq.gz"), Some(("s1#0".to_string(), Mate::Forward)));
        assert_eq!(mate_key("s1_R2.fq"), Some(("s1#1".to_string(), Mate::Reverse)));
        assert_eq!(mate_key("s1.R1.fastq"), Some(("s1#2".to_string(), Mate::Forward)));
        assert_eq!(mate_key("s1_2.fastq"), Some(("s1#3".to_string(), Mate::Reverse)));
        assert_eq!(mate_key("s1.fastq"), None);
        assert_eq!(mate_key("s1_R1.bam"), None);
    }

    #[test]
    fn test_alignment_basename() {
        assert_eq!(alignment_basename(Path::new("/r/s1_R1_001.fastq.gz")), "s1");
        assert_eq!(alignment_basename(Path::new("/r/s1_R2.fq")), "s1");
        assert_eq!(alignment_basename(Path::new("/r/s2.fq")), "s2");
    }

    #[test]
    fn test_convention_pairing() {
        let files = paths(&["a_R1.fastq.gz", "b_R1.fastq.gz", "a_R2.fastq.gz", "c.fastq", "b_R2.fastq.gz"]);
        let pairs = pair_input_files(&files, &[]);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], FilePair { first: files[0].clone(), second: Some(files[2].clone()) });
        assert_eq!(pairs[1], FilePair { first: files[1].clone(), second: Some(files[4].clone()) });
        assert_eq!(pairs[2], FilePair { first: files[3].clone(), second: None });
    }

    #[test]
    fn test_nothing_pairs() {
        let files = paths(&["x.fastq", "y.fastq", "z_R1.fastq"]);
        let pairs = pair_input_files(&files, &[]);
        assert_eq!(pairs.len(), 3);
        assert!(pairs.iter().all(|p| p.second.is_none()));
    }

    #[test]
    fn test_declared_pairs_win() {
        let files = paths(&["one.fastq", "two.fastq", "s_R1.fastq", "s_R2.fastq"]);
        let descriptors = vec![
            SampleDescriptor { file_name: "one.fastq".to_string(), file_name2: Some("two.fastq".to_string()), ..Default::default() },
            // declared single end, even though the name looks paired
            SampleDescriptor { file_name: "/reads/s_R1.fastq".to_string(), ..Default::default() }
        ];
        let pairs = pair_input_files(&files, &descriptors);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].second, Some(files[1].clone()));
        assert_eq!(pairs[1], FilePair { first: files[2].clone(), second: None });
        assert_eq!(pairs[2], FilePair { first: files[3].clone(), second: None });
    }
}
