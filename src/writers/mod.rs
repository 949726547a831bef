/*!
# Writers module
Contains the logic for writing the tabular outputs of the run and merge-af commands.
*/
/// Lists every tracked artifact with its role and associations
pub mod artifact_manifest;
/// The merged allele frequency table
pub mod merged_af_table;
