
use coitrees::{COITree, Interval, IntervalTree};
use rustc_hash::FxHashMap as HashMap;

use crate::parsing::noodles_helper::{AfCall, AfCallSet};

/// Overlap lookups into one VCF's calls.
/// Trees hold 0-based inclusive reference spans with the call index as metadata.
pub struct CallIndex {
    calls: Vec<AfCall>,
    lookup_trees: HashMap<String, COITree<usize, usize>>
}

impl std::fmt::Debug for CallIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // COITree does not have Debug
        f.debug_struct("CallIndex")
            .field("calls", &self.calls.len())
            .field("contigs", &self.lookup_trees.len())
            .finish()
    }
}

impl CallIndex {
    pub fn new(call_set: &AfCallSet) -> Self {
        let calls = call_set.calls().to_vec();
        let mut intervals: HashMap<String, Vec<Interval<usize>>> = Default::default();
        for (i, call) in calls.iter().enumerate() {
            let first = call.start as i32 - 1;
            let last = call.end() as i32 - 1;
            intervals.entry(call.contig.clone()).or_default()
                .push(Interval::new(first, last, i));
        }
        let lookup_trees = intervals.iter()
            .map(|(contig, coi_intervals)| (contig.clone(), COITree::new(coi_intervals)))
            .collect();
        Self {
            calls,
            lookup_trees
        }
    }

    /// Every call whose reference span covers the 1-based position, in file order
    pub fn overlapping(&self, contig: &str, position: usize) -> Vec<&AfCall> {
        let mut indices: Vec<usize> = vec![];
        if let Some(coi_tree) = self.lookup_trees.get(contig) {
            let zb = position as i32 - 1;
            coi_tree.query(zb, zb, |node| {
                indices.push(node.metadata.clone());
            });
        }
        indices.sort_unstable();
        indices.into_iter().map(|i| &self.calls[i]).collect()
    }

    pub fn calls(&self) -> &[AfCall] {
        &self.calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::noodles_helper::load_af_calls;
    use crate::parsing::noodles_helper::tests::write_test_vcf;

    #[test]
    fn test_overlapping() {
        let tmp = tempfile::tempdir().unwrap();
        let vcf_fn = tmp.path().join("s1.vcf");
        write_test_vcf(&vcf_fn, &[], &[
            ("chr1", 100, "ACT", "A", "AF=0.2;GATK_DP=30"),
            ("chr1", 101, "C", "G", "AF=0.1;GATK_DP=30"),
            ("chr2", 101, "C", "G", "AF=0.1;GATK_DP=30")
        ]);
        let index = CallIndex::new(&load_af_calls(&vcf_fn, "AF", "GATK_DP").unwrap());

        assert_eq!(index.overlapping("chr1", 99).len(), 0);
        assert_eq!(index.overlapping("chr1", 100).len(), 1);
        let at_101 = index.overlapping("chr1", 101);
        assert_eq!(at_101.len(), 2);
        assert_eq!(at_101[0].start, 100);
        assert_eq!(at_101[1].start, 101);
        assert_eq!(index.overlapping("chr1", 102).len(), 1);
        assert_eq!(index.overlapping("chr1", 103).len(), 0);
        assert_eq!(index.overlapping("chr3", 1).len(), 0);
    }
}
