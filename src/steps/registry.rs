
use log::debug;
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

use crate::data_types::job::ALIGNMENT_PARAM;
use crate::data_types::job_parameters::JobParameters;
use crate::errors::{JobError, JobResult};
use crate::steps::bwa::BwaMem;
use crate::steps::clean_sam::CleanSam;
use crate::steps::lastz::Lastz;
use crate::steps::lofreq::LoFreqCall;
use crate::steps::reference_library::{CustomReferenceLibrary, FastaFileLibrary};
use crate::steps::{AlignerSteps, CallsVariants, ProcessesBam, ReferenceLibraryStep};

/// The kinds of steps a job can request; each is named by one parameter key
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, strum_macros::Display, strum_macros::EnumIter, strum_macros::EnumString)]
pub enum StepCategory {
    #[strum(serialize = "referenceLibraryCreation")]
    ReferenceLibraryCreation,
    #[strum(serialize = "alignment")]
    Alignment,
    #[strum(serialize = "bamPostProcessing")]
    BamPostProcessing,
    #[strum(serialize = "analysis")]
    Analysis
}

impl StepCategory {
    /// The job parameter that lists step names for this category (comma separated)
    pub fn parameter_key(&self) -> String {
        self.to_string()
    }
}

type Factory<T> = Box<dyn Fn(&JobParameters) -> JobResult<T> + Send + Sync>;

/// Maps step names to factory closures.
/// Built once at start-up and passed to whatever needs to construct steps.
#[derive(Default)]
pub struct StepRegistry {
    libraries: BTreeMap<String, Factory<Box<dyn ReferenceLibraryStep>>>,
    aligners: BTreeMap<String, Factory<AlignerSteps>>,
    bam_processors: BTreeMap<String, Factory<Box<dyn ProcessesBam>>>,
    variant_callers: BTreeMap<String, Factory<Box<dyn CallsVariants>>>
}

impl StepRegistry {
    /// Registry with every step this crate ships
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register_library(CustomReferenceLibrary::STEP_NAME, |p| Ok(Box::new(CustomReferenceLibrary::from_params(p)?)));
        registry.register_library(FastaFileLibrary::STEP_NAME, |p| Ok(Box::new(FastaFileLibrary::from_params(p)?)));
        registry.register_aligner(BwaMem::STEP_NAME, |p| {
            Ok(AlignerSteps {
                indexer: Some(Box::new(BwaMem::from_params(p)?)),
                aligner: Box::new(BwaMem::from_params(p)?)
            })
        });
        registry.register_aligner(Lastz::STEP_NAME, |p| {
            Ok(AlignerSteps {
                indexer: None,
                aligner: Box::new(Lastz::from_params(p)?)
            })
        });
        registry.register_bam_processor(CleanSam::STEP_NAME, |p| Ok(Box::new(CleanSam::from_params(p)?)));
        registry.register_variant_caller(LoFreqCall::STEP_NAME, |p| Ok(Box::new(LoFreqCall::from_params(p)?)));
        registry
    }

    pub fn register_library<F>(&mut self, name: &str, factory: F)
    where F: Fn(&JobParameters) -> JobResult<Box<dyn ReferenceLibraryStep>> + Send + Sync + 'static {
        self.libraries.insert(name.to_string(), Box::new(factory));
    }

    pub fn register_aligner<F>(&mut self, name: &str, factory: F)
    where F: Fn(&JobParameters) -> JobResult<AlignerSteps> + Send + Sync + 'static {
        self.aligners.insert(name.to_string(), Box::new(factory));
    }

    pub fn register_bam_processor<F>(&mut self, name: &str, factory: F)
    where F: Fn(&JobParameters) -> JobResult<Box<dyn ProcessesBam>> + Send + Sync + 'static {
        self.bam_processors.insert(name.to_string(), Box::new(factory));
    }

    pub fn register_variant_caller<F>(&mut self, name: &str, factory: F)
    where F: Fn(&JobParameters) -> JobResult<Box<dyn CallsVariants>> + Send + Sync + 'static {
        self.variant_callers.insert(name.to_string(), Box::new(factory));
    }

    /// True if a step with this name is registered in the category
    pub fn is_registered(&self, category: StepCategory, name: &str) -> bool {
        match category {
            StepCategory::ReferenceLibraryCreation => self.libraries.contains_key(name),
            StepCategory::Alignment => self.aligners.contains_key(name),
            StepCategory::BamPostProcessing => self.bam_processors.contains_key(name),
            StepCategory::Analysis => self.variant_callers.contains_key(name)
        }
    }

    /// Checks the requested steps before anything runs.
    /// # Errors
    /// * if any named step is not registered
    /// * if alignment is requested with zero or more than one reference library step, or more than one aligner
    pub fn validate_job_parameters(&self, params: &JobParameters) -> JobResult<()> {
        for category in StepCategory::iter() {
            for name in params.get_list(&category.parameter_key()) {
                if !self.is_registered(category, &name) {
                    return Err(JobError::config(format!("Unknown {category} step: {name}")));
                }
            }
        }

        if params.get(ALIGNMENT_PARAM).is_some() {
            let libraries = params.get_list(&StepCategory::ReferenceLibraryCreation.parameter_key());
            match libraries.len() {
                0 => return Err(JobError::config("No reference library type was supplied")),
                1 => {},
                _ => return Err(JobError::config("More than 1 reference library type was supplied"))
            };

            let aligners = params.get_list(&StepCategory::Alignment.parameter_key());
            if aligners.len() > 1 {
                return Err(JobError::config(format!("Only one aligner can be used per job, found: {}", aligners.join(", "))));
            }
        }
        Ok(())
    }

    /// Builds every requested reference library step; the caller decides how many are acceptable
    pub fn create_reference_libraries(&self, params: &JobParameters) -> JobResult<Vec<Box<dyn ReferenceLibraryStep>>> {
        build_all(&self.libraries, StepCategory::ReferenceLibraryCreation, params)
    }

    /// Builds the aligner, if the job requests one
    pub fn create_aligner(&self, params: &JobParameters) -> JobResult<Option<AlignerSteps>> {
        Ok(build_all(&self.aligners, StepCategory::Alignment, params)?.into_iter().next())
    }

    pub fn create_bam_processors(&self, params: &JobParameters) -> JobResult<Vec<Box<dyn ProcessesBam>>> {
        build_all(&self.bam_processors, StepCategory::BamPostProcessing, params)
    }

    pub fn create_variant_callers(&self, params: &JobParameters) -> JobResult<Vec<Box<dyn CallsVariants>>> {
        build_all(&self.variant_callers, StepCategory::Analysis, params)
    }
}

/// Runs the factory for every name listed under the category's parameter key, in listed order
fn build_all<T>(factories: &BTreeMap<String, Factory<T>>, category: StepCategory, params: &JobParameters) -> JobResult<Vec<T>> {
    params.get_list(&category.parameter_key()).iter()
        .map(|name| {
            let factory = factories.get(name)
                .ok_or_else(|| JobError::config(format!("Unknown {category} step: {name}")))?;
            debug!("Creating {category} step {name}");
            factory(params)
        })
        .collect()
}
