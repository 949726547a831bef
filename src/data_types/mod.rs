
/// Tracked files, their roles, and database associations
pub mod artifact;
/// Named file types and the derivation hierarchy between them
pub mod file_type;
/// The unit of work that tasks operate on
pub mod job;
/// Flat job parameter map and decoded per-sample descriptions
pub mod job_parameters;
/// Audit records of task inputs and outputs
pub mod recorded_action;
/// Reference genome paths shared across a job tree
pub mod reference_genome;
