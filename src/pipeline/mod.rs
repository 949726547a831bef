/*!
# Pipeline
Tasks, the order they run in, and the machinery that splits a job across its read pairs,
locates artifacts across the resulting directory tree, and resumes after a failure.
*/

/// Per-job resume state
pub mod checkpoint;
/// Locates artifacts across split/join directories
pub mod directory_resolver;
/// Fans a job out into per-file children
pub mod job_splitter;
/// Drives a job through the task graph
pub mod runner;
/// The task trait and its context
pub mod task;
/// Standard task ordering and type hierarchy
pub mod task_graph;
/// Concrete tasks
pub mod tasks;
