
use log::debug;
use noodles::vcf;
use noodles::vcf::variant::record_buf::info::field::{value::Array, Value};
use noodles_util::variant::io::reader::Builder as VcfBuilder;
use std::path::{Path, PathBuf};

use crate::data_types::file_type::FileType;
use crate::errors::{JobError, JobResult};

/// One VCF record reduced to what allele-frequency merging needs
#[derive(Clone, Debug, PartialEq)]
pub struct AfCall {
    pub contig: String,
    /// 1-based position of the first reference base
    pub start: usize,
    pub reference: String,
    pub alternates: Vec<String>,
    /// One value per alternate, if the AF annotation is present
    pub allele_frequencies: Option<Vec<f64>>,
    /// Read depth from the configured depth annotation, if present
    pub depth: Option<u64>
}

impl AfCall {
    /// 1-based position of the last reference base
    pub fn end(&self) -> usize {
        self.start + self.reference.len().max(1) - 1
    }

    /// Highest AF across the alternates, if annotated
    pub fn max_af(&self) -> Option<f64> {
        self.allele_frequencies.as_ref()
            .and_then(|afs| afs.iter().copied().reduce(f64::max))
    }
}

/// Every call from one VCF, plus the header sample names
#[derive(Clone, Debug, Default)]
pub struct AfCallSet {
    path: PathBuf,
    sample_names: Vec<String>,
    calls: Vec<AfCall>
}

impl AfCallSet {
    /// The single sample in this VCF; see `sample_name_from_header`
    pub fn sample_name(&self) -> JobResult<String> {
        sample_name_from_header(&self.path, &self.sample_names)
    }

    // getters
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn calls(&self) -> &[AfCall] {
        &self.calls
    }
}

fn read_error(vcf_fn: &Path, e: std::io::Error) -> JobError {
    JobError::data(format!("Error while reading {}: {e}", vcf_fn.display()))
}

/// Loads every record of a VCF (plain, gzip, or bgzip) into memory.
/// Missing annotations are kept as `None`; deciding whether that is fatal is up to the caller.
/// # Arguments
/// * `vcf_fn` - the VCF to load
/// * `af_tag` - INFO key holding per-alternate allele frequencies, usually "AF"
/// * `depth_tag` - INFO key holding the read depth, e.g. "GATK_DP"
/// # Errors
/// * if the file cannot be opened or parsed
pub fn load_af_calls(vcf_fn: &Path, af_tag: &str, depth_tag: &str) -> JobResult<AfCallSet> {
    debug!("Loading {vcf_fn:?}...");
    #[allow(clippy::default_constructed_unit_structs)]
    let mut vcf_reader = VcfBuilder::default()
        .build_from_path(vcf_fn)
        .map_err(|e| read_error(vcf_fn, e))?;
    let vcf_header = vcf_reader.read_header()
        .map_err(|e| read_error(vcf_fn, e))?;
    let sample_names: Vec<String> = vcf_header.sample_names().iter().cloned().collect();

    let mut calls = vec![];
    for result in vcf_reader.records(&vcf_header) {
        let record: Box<dyn vcf::variant::Record> = result.map_err(|e| read_error(vcf_fn, e))?;
        let record_buf = vcf::variant::RecordBuf::try_from_variant_record(&vcf_header, record.as_ref())
            .map_err(|e| read_error(vcf_fn, e))?;

        let start = record_buf.variant_start()
            .ok_or_else(|| JobError::data(format!("Record without a position in {}", vcf_fn.display())))?
            .get();
        let info = record_buf.info();
        let allele_frequencies = match info.get(af_tag) {
            Some(Some(value)) => Some(float_values(value)),
            _ => None
        };
        let depth = match info.get(depth_tag) {
            Some(Some(value)) => first_integer(value),
            _ => None
        };

        calls.push(AfCall {
            contig: record_buf.reference_sequence_name().to_string(),
            start,
            reference: record_buf.reference_bases().to_ascii_uppercase(),
            alternates: record_buf.alternate_bases().as_ref().iter()
                .map(|a| a.to_ascii_uppercase())
                .collect(),
            allele_frequencies,
            depth
        });
    }
    debug!("Loaded {} records from {vcf_fn:?}", calls.len());

    Ok(AfCallSet {
        path: vcf_fn.to_path_buf(),
        sample_names,
        calls
    })
}

/// Flattens a numeric INFO value; missing entries in an array become 0.0
fn float_values(value: &Value) -> Vec<f64> {
    match value {
        Value::Float(f) => vec![*f as f64],
        Value::Integer(i) => vec![*i as f64],
        Value::Array(Array::Float(values)) => values.iter().map(|v| v.unwrap_or(0.0) as f64).collect(),
        Value::Array(Array::Integer(values)) => values.iter().map(|v| v.unwrap_or(0) as f64).collect(),
        Value::String(s) => s.split(',').filter_map(|v| v.trim().parse::<f64>().ok()).collect(),
        _ => vec![]
    }
}

fn first_integer(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(i) => u64::try_from(*i).ok(),
        Value::Float(f) if *f >= 0.0 => Some(f.round() as u64),
        Value::Array(Array::Integer(values)) => values.first().copied().flatten().and_then(|i| u64::try_from(i).ok()),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None
    }
}

/// Reads only the header of a VCF and infers its sample name
/// # Errors
/// * if the file cannot be read or holds more than one sample
pub fn infer_sample_name(vcf_fn: &Path) -> JobResult<String> {
    #[allow(clippy::default_constructed_unit_structs)]
    let mut vcf_reader = VcfBuilder::default()
        .build_from_path(vcf_fn)
        .map_err(|e| read_error(vcf_fn, e))?;
    let vcf_header = vcf_reader.read_header()
        .map_err(|e| read_error(vcf_fn, e))?;
    let sample_names: Vec<String> = vcf_header.sample_names().iter().cloned().collect();
    sample_name_from_header(vcf_fn, &sample_names)
}

/// One sample: that name. No samples: the file name without its VCF extension. More: ambiguous.
fn sample_name_from_header(vcf_fn: &Path, sample_names: &[String]) -> JobResult<String> {
    match sample_names {
        [name] => Ok(name.clone()),
        [] => {
            let file_name = vcf_fn.file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_default();
            Ok(FileType::vcf().base_name(&file_name).to_string())
        },
        multiple => Err(JobError::data(format!(
            "ambiguous sample-name inference for {}: found {} samples ({})",
            vcf_fn.display(), multiple.len(), multiple.join(", ")
        )))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Writes a minimal single-sample LoFreq-style VCF; each record is (contig, pos, ref, alts, info)
    pub fn write_test_vcf(path: &Path, samples: &[&str], records: &[(&str, usize, &str, &str, &str)]) {
        let mut text = String::from("##fileformat=VCFv4.2\n");
        text.push_str("##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele Frequency\">\n");
        text.push_str("##INFO=<ID=GATK_DP,Number=1,Type=Integer,Description=\"Depth\">\n");
        text.push_str("##contig=<ID=chr1,length=1000>\n##contig=<ID=chr2,length=1000>\n");
        text.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO");
        if !samples.is_empty() {
            text.push_str("\tFORMAT");
            for s in samples.iter() {
                text.push('\t');
                text.push_str(s);
            }
        }
        text.push('\n');
        for (contig, pos, reference, alts, info) in records.iter() {
            text.push_str(&format!("{contig}\t{pos}\t.\t{reference}\t{alts}\t.\tPASS\t{info}"));
            if !samples.is_empty() {
                text.push_str("\tGT");
                for _s in samples.iter() {
                    text.push_str("\t0/1");
                }
            }
            text.push('\n');
        }
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_load_af_calls() {
        let tmp = tempfile::tempdir().unwrap();
        let vcf_fn = tmp.path().join("s1.all.vcf");
        write_test_vcf(&vcf_fn, &[], &[
            ("chr1", 100, "A", "G", "AF=0.25;GATK_DP=40"),
            ("chr1", 200, "ACT", "A,ACTT", "AF=0.1,0.05;GATK_DP=12"),
            ("chr2", 5, "C", "T", "GATK_DP=3")
        ]);

        let call_set = load_af_calls(&vcf_fn, "AF", "GATK_DP").unwrap();
        let calls = call_set.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].start, 100);
        assert_eq!(calls[0].depth, Some(40));
        approx_eq::assert_approx_eq!(calls[0].max_af().unwrap(), 0.25, 1e-6);
        assert_eq!(calls[1].alternates, vec!["A".to_string(), "ACTT".to_string()]);
        assert_eq!(calls[1].end(), 202);
        assert_eq!(calls[1].allele_frequencies.as_ref().unwrap().len(), 2);
        assert_eq!(calls[2].reference, "C");
        assert!(calls[2].allele_frequencies.is_none());

        // no samples, falls back to the file name
        assert_eq!(call_set.sample_name().unwrap(), "s1.all");
    }

    #[test]
    fn test_infer_sample_name() {
        let tmp = tempfile::tempdir().unwrap();
        let single = tmp.path().join("single.vcf");
        write_test_vcf(&single, &["NA12878"], &[]);
        assert_eq!(infer_sample_name(&single).unwrap(), "NA12878");

        let multi = tmp.path().join("multi.vcf");
        write_test_vcf(&multi, &["A", "B"], &[]);
        let err = infer_sample_name(&multi).unwrap_err();
        assert!(matches!(err, JobError::DataInconsistency(_)));
        assert!(err.to_string().contains("ambiguous sample-name inference"));
    }
}
