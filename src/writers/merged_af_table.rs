
use itertools::Itertools;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::site_reconciliation::engine::MergedAfRow;

/// Contains all the data written to each row of the merged table
#[derive(Serialize)]
struct MergedAfRecord {
    #[serde(rename = "OutputFileId")]
    output_file_id: u64,
    #[serde(rename = "ReadsetId")]
    readset_id: String,
    #[serde(rename = "Contig")]
    contig: String,
    #[serde(rename = "Start")]
    start: usize,
    #[serde(rename = "End")]
    end: usize,
    #[serde(rename = "Ref")]
    reference: String,
    /// `;`-joined, same order as AltAFs
    #[serde(rename = "AltAlleles")]
    alt_alleles: String,
    #[serde(rename = "OrigRef")]
    orig_ref: String,
    #[serde(rename = "OrigAlts")]
    orig_alts: String,
    #[serde(rename = "Depth")]
    depth: u64,
    #[serde(rename = "RefAF")]
    ref_af: String,
    #[serde(rename = "AltAFs")]
    alt_afs: String
}

impl From<&MergedAfRow> for MergedAfRecord {
    fn from(row: &MergedAfRow) -> Self {
        Self {
            output_file_id: row.output_file_id,
            readset_id: row.readset.clone(),
            contig: row.contig.clone(),
            start: row.start,
            end: row.end,
            reference: row.reference.to_string(),
            alt_alleles: row.alt_alleles.iter().join(";"),
            orig_ref: row.orig_ref.clone().unwrap_or_default(),
            orig_alts: row.orig_alts.clone().unwrap_or_default(),
            depth: row.depth,
            ref_af: row.ref_af.to_string(),
            alt_afs: row.alt_afs.iter().join(";")
        }
    }
}

/// Writes the merged allele frequency table, tab-delimited unless the name ends in .csv
/// # Arguments
/// * `filename` - output path
/// * `rows` - rows in final order
pub fn write_merged_af_table(filename: &Path, rows: &[MergedAfRow]) -> csv::Result<()> {
    let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
    let delimiter: u8 = if is_csv { b',' } else { b'\t' };
    let mut csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(filename)?;

    for row in rows.iter() {
        csv_writer.serialize(MergedAfRecord::from(row))?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site_reconciliation::engine::AfValue;
    use crate::site_reconciliation::site_alleles::TranslatedAllele;

    #[test]
    fn test_write_table() {
        let tmp = tempfile::tempdir().unwrap();
        let out_fn = tmp.path().join("merged.txt");
        let rows = vec![
            MergedAfRow {
                output_file_id: 5,
                readset: "12".to_string(),
                contig: "chr1".to_string(),
                start: 101,
                end: 101,
                reference: 'C',
                alt_alleles: vec![TranslatedAllele::SpanningDeletion, TranslatedAllele::Sequence("G".to_string())],
                orig_ref: Some("ACT".to_string()),
                orig_alts: Some("A".to_string()),
                depth: 30,
                ref_af: AfValue::Value(0.8),
                alt_afs: vec![AfValue::Value(0.2), AfValue::Value(0.0)]
            },
            MergedAfRow {
                output_file_id: 6,
                readset: "s2".to_string(),
                contig: "chr1".to_string(),
                start: 101,
                end: 101,
                reference: 'C',
                alt_alleles: vec![TranslatedAllele::SpanningDeletion, TranslatedAllele::Sequence("G".to_string())],
                orig_ref: None,
                orig_alts: None,
                depth: 4,
                ref_af: AfValue::NoData,
                alt_afs: vec![AfValue::NoData, AfValue::NoData]
            }
        ];
        write_merged_af_table(&out_fn, &rows).unwrap();

        let text = std::fs::read_to_string(&out_fn).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "OutputFileId\tReadsetId\tContig\tStart\tEnd\tRef\tAltAlleles\tOrigRef\tOrigAlts\tDepth\tRefAF\tAltAFs");
        assert_eq!(lines[1], "5\t12\tchr1\t101\t101\tC\t*;G\tACT\tA\t30\t0.8\t0.2;0");
        assert_eq!(lines[2], "6\ts2\tchr1\t101\t101\tC\t*;G\t\t\t4\tND\tND;ND");
    }
}
