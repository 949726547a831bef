
use derive_builder::Builder;
use indexmap::IndexMap;
use indicatif::ParallelProgressIterator;
use itertools::Itertools;
use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::FxHashSet as HashSet;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::errors::{JobError, JobResult};
use crate::parsing::coverage::{CoverageTable, Locus};
use crate::parsing::merge_manifest::MergeInput;
use crate::parsing::noodles_helper::{load_af_calls, AfCall};
use crate::site_reconciliation::call_index::CallIndex;
use crate::site_reconciliation::site_alleles::{SiteAndAlleles, SiteKey, TranslatedAllele};
use crate::util::progress_bar::get_progress_style;

#[derive(Builder, Clone, Debug)]
#[builder(default)]
pub struct ReconcileConfig {
    /// A record must reach this AF on some alternate to whitelist its positions
    min_af: f64,
    /// Below this depth a sample-site is reported as no data
    min_coverage: u64,
    /// INFO key holding read depth
    depth_tag: String,
    /// INFO key holding per-alternate allele frequencies
    af_tag: String
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            min_af: 0.01,
            min_coverage: 10,
            depth_tag: "GATK_DP".to_string(),
            af_tag: "AF".to_string()
        }
    }
}

impl ReconcileConfig {
    // getters
    pub fn min_af(&self) -> f64 {
        self.min_af
    }

    pub fn min_coverage(&self) -> u64 {
        self.min_coverage
    }

    pub fn depth_tag(&self) -> &str {
        &self.depth_tag
    }

    pub fn af_tag(&self) -> &str {
        &self.af_tag
    }
}

/// An allele frequency, or "ND" when the data could not support one
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AfValue {
    NoData,
    Value(f64)
}

impl std::fmt::Display for AfValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AfValue::NoData => write!(f, "ND"),
            AfValue::Value(v) => write!(f, "{}", format_af(*v))
        }
    }
}

/// Up to 6 decimals, trailing zeros trimmed
pub fn format_af(value: f64) -> String {
    let text = format!("{value:.6}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" || trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// One (site, sample) result of the merge
#[derive(Clone, Debug, PartialEq)]
pub struct MergedAfRow {
    pub output_file_id: u64,
    /// Readset id, or the sample name from the VCF when there is none
    pub readset: String,
    pub contig: String,
    pub start: usize,
    pub end: usize,
    pub reference: char,
    /// The site's alternates in whitelist order, shared by every row of the site
    pub alt_alleles: Vec<TranslatedAllele>,
    /// REFs of this sample's frames that were re-based onto the site, with their ALT sets in `orig_alts`
    pub orig_ref: Option<String>,
    pub orig_alts: Option<String>,
    pub depth: u64,
    pub ref_af: AfValue,
    /// Parallel to `alt_alleles`
    pub alt_afs: Vec<AfValue>
}

/// Everything loaded for one input
#[derive(Debug)]
struct LoadedInput {
    output_file_id: u64,
    readset: String,
    index: CallIndex,
    coverage: Option<CoverageTable>
}

/// Checks every input names a genome and that they all name the same one
/// # Errors
/// * if an input lacks a genome id or the inputs disagree
pub fn shared_genome_id(inputs: &[MergeInput]) -> JobResult<u64> {
    let mut genome_ids: Vec<u64> = vec![];
    for input in inputs.iter() {
        match input.genome_id {
            Some(g) => genome_ids.push(g),
            None => return Err(JobError::config(format!(
                "VCF lacks library id: {} (output file {})", input.vcf.display(), input.output_file_id
            )))
        }
    }
    let distinct: Vec<u64> = genome_ids.into_iter().unique().collect();
    match distinct.as_slice() {
        [genome_id] => Ok(*genome_id),
        [] => Err(JobError::config("No inputs were provided")),
        _ => Err(JobError::config(format!(
            "Samples use more than one genome. Genome IDs: {}", distinct.iter().join(",")
        )))
    }
}

/// Merges per-sample allele frequency calls into one row per (whitelisted site, input)
pub struct SiteReconciler {
    config: ReconcileConfig
}

impl SiteReconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    /// Runs both passes over the inputs.
    /// Rows come back ordered by site, then by input order.
    /// # Errors
    /// * configuration problems with the inputs (see `shared_genome_id`)
    /// * any data inconsistency in the VCFs or coverage files
    pub fn run(&self, inputs: &[MergeInput]) -> JobResult<Vec<MergedAfRow>> {
        let genome_id = shared_genome_id(inputs)?;
        info!("Merging {} VCFs against genome {genome_id}", inputs.len());

        let mut loaded: Vec<LoadedInput> = inputs.par_iter()
            .map(|input| {
                let call_set = load_af_calls(&input.vcf, self.config.af_tag(), self.config.depth_tag())?;
                let readset = match input.readset_id {
                    Some(r) => r.to_string(),
                    None => call_set.sample_name()?
                };
                Ok(LoadedInput {
                    output_file_id: input.output_file_id,
                    readset,
                    index: CallIndex::new(&call_set),
                    coverage: None
                })
            })
            .collect::<JobResult<Vec<_>>>()?;

        let mut sites = self.build_whitelist(&loaded)?;
        info!("Whitelisted {} positions", sites.len());
        for site in sites.values_mut() {
            for input in loaded.iter() {
                for call in input.index.overlapping(&site.key().contig, site.key().position) {
                    self.check_af(call)?;
                    site.add_call(call)?;
                }
            }
        }

        let sites: Vec<SiteAndAlleles> = sites.into_values().collect();
        let mut merged_ref_sites = 0;
        for site in sites.iter().filter(|site| site.is_merged_ref()) {
            debug!("{} spans {} reference frames, merged reference {}", site.key(), site.partitions().len(), site.merged_reference());
            merged_ref_sites += 1;
        }
        info!("{merged_ref_sites} positions combine more than one reference frame");

        // coverage is only needed where a sample has no overlapping record
        let coverage_tables: Vec<Option<CoverageTable>> = loaded.par_iter()
            .zip(inputs.par_iter())
            .map(|(input, merge_input)| {
                let wanted: HashSet<Locus> = sites.iter()
                    .filter(|site| input.index.overlapping(&site.key().contig, site.key().position).is_empty())
                    .map(|site| (site.key().contig.clone(), site.key().position))
                    .collect();
                if wanted.is_empty() {
                    Ok(None)
                } else {
                    CoverageTable::load(&merge_input.coverage_path(), &wanted).map(Some)
                }
            })
            .collect::<JobResult<Vec<_>>>()?;
        for (input, coverage) in loaded.iter_mut().zip(coverage_tables) {
            input.coverage = coverage;
        }

        let style = get_progress_style();
        info!("Resolving {} sites across {} samples...", sites.len(), loaded.len());
        let per_site: Vec<Vec<MergedAfRow>> = sites.par_iter()
            .progress_with_style(style)
            .map(|site| {
                loaded.iter()
                    .map(|input| self.resolve(site, input))
                    .collect::<JobResult<Vec<_>>>()
            })
            .collect::<JobResult<Vec<_>>>()?;

        Ok(per_site.into_iter().flatten().collect())
    }

    /// Pass 1: every reference position of every record that reaches `min_af`
    fn build_whitelist(&self, loaded: &[LoadedInput]) -> JobResult<BTreeMap<SiteKey, SiteAndAlleles>> {
        let mut sites: BTreeMap<SiteKey, SiteAndAlleles> = Default::default();
        for input in loaded.iter() {
            for call in input.index.calls().iter() {
                let passes = call.max_af().map(|af| af >= self.config.min_af()).unwrap_or(false);
                if !passes {
                    continue;
                }
                for (offset, base) in call.reference.chars().enumerate() {
                    let key = SiteKey { contig: call.contig.clone(), position: call.start + offset };
                    match sites.entry(key) {
                        Entry::Vacant(v) => {
                            let key = v.key().clone();
                            v.insert(SiteAndAlleles::new(key, base));
                        },
                        Entry::Occupied(o) => {
                            if o.get().reference() != base {
                                return Err(JobError::data(format!(
                                    "Reference bases disagree at {}: {} vs. {}", o.key(), o.get().reference(), base
                                )));
                            }
                        }
                    }
                }
            }
        }
        Ok(sites)
    }

    fn check_af<'a>(&self, call: &'a AfCall) -> JobResult<&'a [f64]> {
        let afs = call.allele_frequencies.as_deref()
            .ok_or_else(|| JobError::data(format!(
                "Record at {}:{} lacks the {} annotation", call.contig, call.start, self.config.af_tag()
            )))?;
        if afs.len() != call.alternates.len() {
            return Err(JobError::data(format!(
                "Record at {}:{} has {} alternates but {} {} values",
                call.contig, call.start, call.alternates.len(), afs.len(), self.config.af_tag()
            )));
        }
        Ok(afs)
    }

    /// Pass 2 for one (site, input)
    fn resolve(&self, site: &SiteAndAlleles, input: &LoadedInput) -> JobResult<MergedAfRow> {
        let key = site.key();
        let calls = input.index.overlapping(&key.contig, key.position);
        let alt_alleles: Vec<TranslatedAllele> = site.alternates().cloned().collect();
        let mut row = MergedAfRow {
            output_file_id: input.output_file_id,
            readset: input.readset.clone(),
            contig: key.contig.clone(),
            start: key.position,
            end: key.position,
            reference: site.reference(),
            alt_alleles,
            orig_ref: None,
            orig_alts: None,
            depth: 0,
            ref_af: AfValue::NoData,
            alt_afs: vec![]
        };

        if calls.is_empty() {
            let depth = match input.coverage.as_ref() {
                Some(table) => table.depth(&key.contig, key.position)?,
                None => return Err(JobError::data(format!("No coverage data loaded for {key}")))
            };
            row.depth = depth;
            if depth < self.config.min_coverage() {
                row.ref_af = AfValue::NoData;
                row.alt_afs = vec![AfValue::NoData; row.alt_alleles.len()];
            } else {
                row.ref_af = AfValue::Value(1.0);
                row.alt_afs = vec![AfValue::Value(0.0); row.alt_alleles.len()];
            }
            return Ok(row);
        }

        let mut allele_afs: IndexMap<TranslatedAllele, AfValue> = Default::default();
        let mut total_af = 0.0;
        let mut confident = false;
        for call in calls.iter() {
            let depth = call.depth.ok_or_else(|| JobError::data(format!(
                "Record at {}:{} lacks the {} annotation", call.contig, call.start, self.config.depth_tag()
            )))?;
            row.depth = row.depth.max(depth);
            let afs = self.check_af(call)?;

            if depth < self.config.min_coverage() {
                for alternate in call.alternates.iter() {
                    if let Some(translated) = site.renamed_allele(call, alternate)? {
                        allele_afs.entry(translated).or_insert(AfValue::NoData);
                    }
                }
                continue;
            }

            confident = true;
            for (alternate, af) in call.alternates.iter().zip(afs.iter()) {
                if let Some(translated) = site.renamed_allele(call, alternate)? {
                    let entry = allele_afs.entry(translated).or_insert(AfValue::Value(0.0));
                    *entry = match *entry {
                        AfValue::Value(v) => AfValue::Value(v + af),
                        AfValue::NoData => AfValue::Value(*af)
                    };
                    total_af += af;
                }
            }
        }

        row.ref_af = if confident {
            AfValue::Value((1.0 - total_af).max(0.0))
        } else {
            AfValue::NoData
        };
        row.alt_afs = row.alt_alleles.iter()
            .map(|allele| allele_afs.get(allele).copied().unwrap_or(AfValue::Value(0.0)))
            .collect();

        if let Some((orig_ref, orig_alts)) = site.original_frames(&calls) {
            row.orig_ref = Some(orig_ref);
            row.orig_alts = Some(orig_alts);
        }

        Ok(row)
    }
}
