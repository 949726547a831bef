
use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{JobError, JobResult};
use crate::parsing::noodles_helper::AfCall;

/// (contig, 1-based position); ordering is contig name, then numeric position
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SiteKey {
    pub contig: String,
    pub position: usize
}

impl std::fmt::Display for SiteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.contig, self.position)
    }
}

/// An alternate allele expressed at a single site
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TranslatedAllele {
    /// Bases at this site; more than one base means an insertion after the site base
    Sequence(String),
    /// A deletion that started upstream covers this site
    SpanningDeletion
}

impl std::fmt::Display for TranslatedAllele {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslatedAllele::Sequence(s) => write!(f, "{s}"),
            TranslatedAllele::SpanningDeletion => write!(f, "*")
        }
    }
}

/// Identifies a source record's reference frame: (start, REF)
pub type SourceReference = (usize, String);

/// One whitelisted position and every allele seen there, across all inputs
#[derive(Clone, Debug)]
pub struct SiteAndAlleles {
    key: SiteKey,
    /// The single reference base at this position
    reference: char,
    /// Longest reference seen from this position onward among overlapping records
    merged_reference: String,
    /// Distinct translated alternates, in first-seen order
    alternates: IndexMap<TranslatedAllele, ()>,
    /// Per source reference frame: original ALT -> translation (None when it matches the reference here)
    partitions: BTreeMap<SourceReference, IndexMap<String, Option<TranslatedAllele>>>
}

impl SiteAndAlleles {
    pub fn new(key: SiteKey, reference: char) -> Self {
        Self {
            key,
            reference,
            merged_reference: reference.to_string(),
            alternates: Default::default(),
            partitions: Default::default()
        }
    }

    /// Offset of this site inside the call's reference allele
    /// # Errors
    /// * if the call starts after this site or ends before it
    fn offset(&self, call: &AfCall) -> JobResult<usize> {
        if call.start > self.key.position {
            return Err(JobError::data(format!(
                "Unexpected variant start. site: {} / record: {}:{}", self.key, call.contig, call.start
            )));
        }
        let offset = self.key.position - call.start;
        if offset >= call.reference.len() {
            return Err(JobError::data(format!(
                "Record {}:{} {} does not cover site {}", call.contig, call.start, call.reference, self.key
            )));
        }
        Ok(offset)
    }

    /// Expresses one alternate of a call at this site.
    /// Past the end of the alternate: spanning deletion. A single-base alternate at the call's own start is kept
    /// as-is, so a deletion still reports its anchor base where it begins. At the last reference base: the rest
    /// of the alternate, which keeps inserted bases. Otherwise: the single aligned base. None if that equals the reference.
    /// # Errors
    /// * if the call does not cover this site
    pub fn translate(&self, call: &AfCall, alternate: &str) -> JobResult<Option<TranslatedAllele>> {
        let offset = self.offset(call)?;
        if offset >= alternate.len() {
            return Ok(Some(TranslatedAllele::SpanningDeletion));
        }
        if offset == 0 && alternate.len() == 1 {
            return Ok(Some(TranslatedAllele::Sequence(alternate.to_string())));
        }
        let bases = if offset + 1 == call.reference.len() {
            &alternate[offset..]
        } else {
            &alternate[offset..offset + 1]
        };
        if bases.len() == 1 && bases.chars().next() == Some(self.reference) {
            Ok(None)
        } else {
            Ok(Some(TranslatedAllele::Sequence(bases.to_string())))
        }
    }

    /// Folds an overlapping call into this site: checks the reference agrees, extends the merged
    /// reference, and records the translation of each alternate under the call's reference frame.
    /// # Errors
    /// * if the call's base at this site is not the site reference
    /// * if the call's reference and the merged reference disagree
    pub fn add_call(&mut self, call: &AfCall) -> JobResult<()> {
        let offset = self.offset(call)?;
        let suffix = &call.reference[offset..];
        if !suffix.starts_with(self.reference) {
            return Err(JobError::data(format!(
                "Reference bases disagree at {}: expected {}, record {}:{} has {}",
                self.key, self.reference, call.contig, call.start, call.reference
            )));
        }

        let (shorter, longer) = if suffix.len() > self.merged_reference.len() {
            (self.merged_reference.as_str(), suffix)
        } else {
            (suffix, self.merged_reference.as_str())
        };
        if !longer.starts_with(shorter) {
            return Err(JobError::data(format!(
                "The reference alleles do not appear to represent the same position at {}: {} vs. {}",
                self.key, self.merged_reference, suffix
            )));
        }
        if suffix.len() > self.merged_reference.len() {
            self.merged_reference = suffix.to_string();
        }

        let mut translations: IndexMap<String, Option<TranslatedAllele>> = Default::default();
        for alternate in call.alternates.iter() {
            let translated = self.translate(call, alternate)?;
            if let Some(t) = translated.as_ref() {
                self.alternates.entry(t.clone()).or_insert(());
            }
            translations.insert(alternate.clone(), translated);
        }
        let partition = self.partitions.entry((call.start, call.reference.clone())).or_default();
        for (alternate, translated) in translations.into_iter() {
            partition.entry(alternate).or_insert(translated);
        }
        Ok(())
    }

    /// The recorded translation for a call's alternate, computing it if the call was never added
    pub fn renamed_allele(&self, call: &AfCall, alternate: &str) -> JobResult<Option<TranslatedAllele>> {
        match self.partitions.get(&(call.start, call.reference.clone())).and_then(|p| p.get(alternate)) {
            Some(translated) => Ok(translated.clone()),
            None => self.translate(call, alternate)
        }
    }

    /// True when the call's reference is anything other than the single base at this site
    pub fn is_rebased(&self, call: &AfCall) -> bool {
        call.start != self.key.position || call.reference.len() != 1
    }

    /// Original REFs and ALTs for the rebased frames among `calls`, or None when every call already uses
    /// the single site base. Frames are `;`-joined in (start, REF) order; each frame's ALTs are `,`-joined
    /// from the partition, so every sample sharing a frame reports the same allele set.
    pub fn original_frames(&self, calls: &[&AfCall]) -> Option<(String, String)> {
        let used: BTreeSet<SourceReference> = calls.iter()
            .filter(|call| self.is_rebased(call))
            .map(|call| (call.start, call.reference.clone()))
            .collect();
        if used.is_empty() {
            return None;
        }
        let mut refs: Vec<&str> = vec![];
        let mut alt_sets: Vec<String> = vec![];
        for frame in used.iter() {
            if let Some(partition) = self.partitions.get(frame) {
                refs.push(frame.1.as_str());
                alt_sets.push(partition.keys().join(","));
            }
        }
        if refs.is_empty() {
            None
        } else {
            Some((refs.join(";"), alt_sets.join(";")))
        }
    }

    /// True when overlapping records used more than one reference frame
    pub fn is_merged_ref(&self) -> bool {
        self.partitions.len() > 1
    }

    // getters
    pub fn key(&self) -> &SiteKey {
        &self.key
    }

    pub fn reference(&self) -> char {
        self.reference
    }

    pub fn merged_reference(&self) -> &str {
        &self.merged_reference
    }

    pub fn alternates(&self) -> impl Iterator<Item = &TranslatedAllele> {
        self.alternates.keys()
    }

    pub fn num_alternates(&self) -> usize {
        self.alternates.len()
    }

    pub fn partitions(&self) -> &BTreeMap<SourceReference, IndexMap<String, Option<TranslatedAllele>>> {
        &self.partitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(start: usize, reference: &str, alts: &[&str]) -> AfCall {
        AfCall {
            contig: "chr1".to_string(),
            start,
            reference: reference.to_string(),
            alternates: alts.iter().map(|a| a.to_string()).collect(),
            allele_frequencies: Some(vec![0.1; alts.len()]),
            depth: Some(100)
        }
    }

    fn site(position: usize, base: char) -> SiteAndAlleles {
        SiteAndAlleles::new(SiteKey { contig: "chr1".to_string(), position }, base)
    }

    #[test]
    fn test_translate() {
        let deletion = call(100, "ACT", &["A"]);
        // the deletion keeps its anchor base where it starts
        assert_eq!(site(100, 'A').translate(&deletion, "A").unwrap(), Some(TranslatedAllele::Sequence("A".to_string())));
        assert_eq!(site(101, 'C').translate(&deletion, "A").unwrap(), Some(TranslatedAllele::SpanningDeletion));
        assert_eq!(site(102, 'T').translate(&deletion, "A").unwrap(), Some(TranslatedAllele::SpanningDeletion));

        let snp = call(101, "C", &["G"]);
        assert_eq!(site(101, 'C').translate(&snp, "G").unwrap(), Some(TranslatedAllele::Sequence("G".to_string())));

        let insertion = call(100, "A", &["ATT"]);
        assert_eq!(site(100, 'A').translate(&insertion, "ATT").unwrap(), Some(TranslatedAllele::Sequence("ATT".to_string())));

        let mnp = call(100, "AC", &["GT"]);
        assert_eq!(site(101, 'C').translate(&mnp, "GT").unwrap(), Some(TranslatedAllele::Sequence("T".to_string())));

        // a multi-base alternate whose first base matches the reference has nothing to say at its start
        let partial = call(100, "AC", &["AT"]);
        assert_eq!(site(100, 'A').translate(&partial, "AT").unwrap(), None);

        // a record that starts after the site is a coordinate error
        assert!(matches!(site(100, 'A').translate(&snp, "G"), Err(JobError::DataInconsistency(_))));
    }

    #[test]
    fn test_merged_reference() {
        let mut s = site(101, 'C');
        s.add_call(&call(101, "C", &["G"])).unwrap();
        s.add_call(&call(100, "ACT", &["A"])).unwrap();
        s.add_call(&call(101, "CTG", &["C"])).unwrap();
        assert_eq!(s.merged_reference(), "CTG");
        assert!(s.is_merged_ref());
        let alts: Vec<String> = s.alternates().map(|a| a.to_string()).collect();
        assert_eq!(alts, vec!["G".to_string(), "*".to_string(), "C".to_string()]);

        // the same original allele maps differently depending on its frame
        assert_eq!(s.renamed_allele(&call(100, "ACT", &["A"]), "A").unwrap(), Some(TranslatedAllele::SpanningDeletion));
        assert_eq!(s.renamed_allele(&call(101, "CTG", &["C"]), "C").unwrap(), Some(TranslatedAllele::Sequence("C".to_string())));
    }

    #[test]
    fn test_original_frames() {
        let snp = call(101, "C", &["G"]);
        let upstream = call(100, "ACT", &["A"]);
        let local = call(101, "CTG", &["C"]);
        let local_other = call(101, "CTG", &["CT"]);
        let mut s = site(101, 'C');
        for c in [&snp, &upstream, &local, &local_other] {
            s.add_call(c).unwrap();
        }
        assert_eq!(s.partitions().len(), 3);

        // single-base frames are not reported
        assert_eq!(s.original_frames(&[&snp]), None);
        assert_eq!(s.original_frames(&[&snp, &upstream]), Some(("ACT".to_string(), "A".to_string())));

        // alternates are gathered per frame, and frames come out in (start, REF) order
        let (refs, alts) = s.original_frames(&[&local, &upstream]).unwrap();
        assert_eq!(refs, "ACT;CTG");
        assert_eq!(alts, "A;C,CT");
    }

    #[test]
    fn test_reference_conflicts() {
        let mut s = site(101, 'C');
        assert!(s.add_call(&call(101, "G", &["T"])).is_err());

        s.add_call(&call(101, "CTG", &["C"])).unwrap();
        assert!(s.add_call(&call(100, "ACA", &["A"])).is_err());
    }

    #[test]
    fn test_site_ordering() {
        let mut keys = vec![
            SiteKey { contig: "chr2".to_string(), position: 5 },
            SiteKey { contig: "chr1".to_string(), position: 100 },
            SiteKey { contig: "chr1".to_string(), position: 20 }
        ];
        keys.sort();
        assert_eq!(keys[0].to_string(), "chr1:20");
        assert_eq!(keys[1].to_string(), "chr1:100");
        assert_eq!(keys[2].to_string(), "chr2:5");
    }
}
