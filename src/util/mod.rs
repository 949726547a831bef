
/// Existence checks that tests can replace
pub mod file_probe;
/// Helper functions for read/writing JSON via serde
pub mod json_io;
/// Helper functions for generating the progress bars
pub mod progress_bar;
