/// Degree requirement evaluation
///
/// Turns stored requirement rows into typed rules, scores them against a
/// plan's courses and persists the resulting progress.
mod error;
pub mod filter;
pub mod grade;
mod locks;
mod orchestrator;
mod repository;
mod requirement;
mod scorer;
mod status;
pub mod substitution;
mod types;

pub use error::EvaluationError;
pub use grade::{CourseOutcome, GradeScale};
pub use locks::EvaluationLocks;
pub use orchestrator::PlanEvaluator;
pub use repository::PlanRepository;
pub use requirement::*;
pub use scorer::RequirementScorer;
pub use status::{clamp_progress, ratio_progress};
pub use substitution::SubstitutionResolver;
pub use types::*;
