
/// Content-keyed cache of working FASTAs, dictionaries, and aligner indexes
pub mod genome_cache;
