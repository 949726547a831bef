
use crate::data_types::file_type::{FileType, TypeHierarchy};
use crate::pipeline::task::{PipelineTask, TaskId, TaskScope};
use crate::pipeline::tasks::align::AlignTask;
use crate::pipeline::tasks::analysis::AnalysisTask;
use crate::pipeline::tasks::import::ImportTask;
use crate::pipeline::tasks::init::InitTask;
use crate::pipeline::tasks::prepare_indexes::PrepareIndexesTask;

/// Derivation chains of the standard pipeline: VCFs come from BAMs, which come from FASTQs
pub fn standard_hierarchy() -> TypeHierarchy {
    let mut hierarchy = TypeHierarchy::default();
    hierarchy.add(FileType::vcf(), vec![FileType::bam(), FileType::fastq()]);
    hierarchy.add(FileType::bam(), vec![FileType::fastq()]);
    hierarchy
}

/// A run of consecutive tasks sharing one scope
pub struct Segment<'a> {
    pub scope: TaskScope,
    pub tasks: Vec<&'a dyn PipelineTask>
}

impl std::fmt::Debug for Segment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<TaskId> = self.tasks.iter().map(|t| t.task_id()).collect();
        f.debug_struct("Segment")
            .field("scope", &self.scope)
            .field("tasks", &ids)
            .finish()
    }
}

/// Ordered pipeline tasks plus the type hierarchy used to locate their artifacts
pub struct TaskGraph {
    tasks: Vec<Box<dyn PipelineTask>>,
    hierarchy: TypeHierarchy
}

impl TaskGraph {
    pub fn new(tasks: Vec<Box<dyn PipelineTask>>, hierarchy: TypeHierarchy) -> Self {
        Self { tasks, hierarchy }
    }

    /// init -> prepare-indexes -> align -> analysis -> import
    pub fn standard() -> Self {
        Self::new(
            vec![
                Box::new(InitTask),
                Box::new(PrepareIndexesTask),
                Box::new(AlignTask),
                Box::new(AnalysisTask),
                Box::new(ImportTask)
            ],
            standard_hierarchy()
        )
    }

    /// Groups consecutive tasks by scope, so a split segment runs once per child before joining again
    pub fn segments(&self) -> Vec<Segment<'_>> {
        let mut segments: Vec<Segment> = vec![];
        for task in self.tasks.iter() {
            match segments.last_mut() {
                Some(segment) if segment.scope == task.scope() => segment.tasks.push(task.as_ref()),
                _ => segments.push(Segment {
                    scope: task.scope(),
                    tasks: vec![task.as_ref()]
                })
            };
        }
        segments
    }

    // getters
    pub fn tasks(&self) -> impl Iterator<Item = &dyn PipelineTask> {
        self.tasks.iter().map(|t| t.as_ref())
    }

    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }
}
