/*!
# CLI module
Command line interface functionality that is specific to Seqflow.
*/

/// The main CLI module that contains the top-level CLI parser and help text
pub mod core;
/// The merge-af CLI subcommand
pub mod merge_af;
/// The run CLI subcommand
pub mod pipeline;
