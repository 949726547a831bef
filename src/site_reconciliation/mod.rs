/*!
# Site reconciliation
Merges allele frequency calls from many single-sample VCFs into one table with a row per (site, sample).
Records with different reference representations (deletions, MNPs, insertions) are re-based onto single positions first.
*/
/// Overlap queries into one VCF's calls
pub mod call_index;
/// The two-pass merge
pub mod engine;
/// Per-site allele bookkeeping and translation
pub mod site_alleles;
