use crate::db::{
    DbPlan, DbPlanDegree, DbPlanRequirement, DbRequirement, DegreeId, PlanDegreeId, PlanId,
    RepositoryError,
};

use super::types::{PlanCourse, RequirementProgress};

/// Storage abstraction so the orchestrator can be exercised in isolation.
///
/// Everything except [`PlanRepository::replace_plan_requirements`] is a read.
pub trait PlanRepository: Send + Sync {
    fn find_plan(&self, plan_id: PlanId) -> Result<Option<DbPlan>, RepositoryError>;

    fn find_plan_degree(
        &self,
        plan_degree_id: PlanDegreeId,
    ) -> Result<Option<DbPlanDegree>, RepositoryError>;

    fn plan_degrees(&self, plan_id: PlanId) -> Result<Vec<DbPlanDegree>, RepositoryError>;

    /// Requirements of every requirement set of `degree_id` that applies to
    /// `academic_year`: sets scoped to that year plus sets with no year.
    fn requirements_for_degree(
        &self,
        degree_id: DegreeId,
        academic_year: Option<i32>,
    ) -> Result<Vec<DbRequirement>, RepositoryError>;

    /// Course placements of a plan. Placements whose course cannot be
    /// resolved are left out.
    fn plan_courses(&self, plan_id: PlanId) -> Result<Vec<PlanCourse>, RepositoryError>;

    /// Atomically replaces the stored results of one plan degree with `results`.
    fn replace_plan_requirements(
        &self,
        plan_degree_id: PlanDegreeId,
        evaluation_id: &str,
        results: &[RequirementProgress],
    ) -> Result<(), RepositoryError>;

    fn plan_requirements(
        &self,
        plan_degree_id: PlanDegreeId,
    ) -> Result<Vec<DbPlanRequirement>, RepositoryError>;
}
