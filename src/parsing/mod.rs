/*!
# Parsing module
Contains the logic for parsing input files into meaningful structs / data.
*/
/// GATK DepthOfCoverage tables
pub mod coverage;
/// Mate detection and grouping of FASTQ inputs
pub mod fastq_pairing;
/// Tab-delimited manifest of call sets to merge
pub mod merge_manifest;
/// Helper functions for noodles
pub mod noodles_helper;
/// Job parameter files
pub mod params;
