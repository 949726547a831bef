
/// Artifact lineage tracking and the metadata store
pub mod artifacts;
/// Command line interface functionality
pub mod cli;
/// Contains various shared data types
pub mod data_types;
/// The job-level error type
pub mod errors;
/// External tool invocation
pub mod external;
/// Tooling for parsing input files into meaningful structs / data
pub mod parsing;
/// Tasks, splitting, resolution, and the runner
pub mod pipeline;
/// Content-addressed cache of prepared reference genomes
pub mod reference;
/// Merges allele frequencies from many VCFs onto shared sites
pub mod site_reconciliation;
/// Capability interfaces and the concrete tool steps
pub mod steps;
/// Various utility functions that tend to be very generic
pub mod util;
/// All output writers
pub mod writers;
