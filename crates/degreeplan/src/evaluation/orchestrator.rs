//! Plan evaluation entry points.
//!
//! A pass over one plan degree:
//! 1. Take the plan degree's write lock
//! 2. Load the plan, its courses and the degree's applicable requirements
//! 3. Convert and score every requirement
//! 4. Replace the stored results in one transaction

use super::error::EvaluationError;
use super::locks::EvaluationLocks;
use super::repository::PlanRepository;
use super::requirement::Requirement;
use super::scorer::RequirementScorer;
use super::types::{DegreeSummary, PlanDegreeEvaluation, RequirementProgress};
use crate::db::{DbPlan, DbPlanDegree, DbPlanRequirement, PlanDegreeId, PlanId};
use futures::future::try_join_all;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Evaluates plans against the requirements of their degrees.
pub struct PlanEvaluator<R: PlanRepository> {
    repo: Arc<R>,
    locks: EvaluationLocks,
}

impl<R: PlanRepository> PlanEvaluator<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            locks: EvaluationLocks::new(),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Recomputes and stores the progress of every requirement of one plan degree.
    ///
    /// # Arguments
    /// * `plan_id` - The plan the degree is attached to
    /// * `plan_degree_id` - The plan degree to evaluate
    ///
    /// # Returns
    /// * `Ok(Vec<RequirementProgress>)` - Fresh results ordered by requirement id
    /// * `Err(EvaluationError)` - If the plan or plan degree is missing, a
    ///   requirement is misconfigured, or the store fails. Nothing is written.
    pub async fn evaluate_plan_degree(
        &self,
        plan_id: PlanId,
        plan_degree_id: PlanDegreeId,
    ) -> Result<Vec<RequirementProgress>, EvaluationError> {
        let correlation_id = generate_correlation_id();

        info!(
            correlation_id = %correlation_id,
            plan_id = plan_id,
            plan_degree_id = plan_degree_id,
            "Starting plan degree evaluation"
        );

        let guard = self.locks.acquire(plan_degree_id).await;

        let start = Instant::now();
        let result = self.run_pass(plan_id, plan_degree_id, &correlation_id);

        drop(guard);
        self.locks.release(plan_degree_id);

        match &result {
            Ok(results) => {
                info!(
                    correlation_id = %correlation_id,
                    requirements = results.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Plan degree evaluation completed"
                );
            }
            Err(e) if e.is_not_found() => {
                warn!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "Plan degree evaluation rejected"
                );
            }
            Err(e) => {
                error!(
                    correlation_id = %correlation_id,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Plan degree evaluation failed"
                );
            }
        }

        result
    }

    /// Evaluates every degree attached to a plan concurrently.
    ///
    /// Fails on the first failing degree. Degrees already written by then
    /// keep their new results.
    pub async fn evaluate_plan(
        &self,
        plan_id: PlanId,
    ) -> Result<Vec<PlanDegreeEvaluation>, EvaluationError> {
        self.load_plan(plan_id)?;
        let plan_degrees = self.repo.plan_degrees(plan_id)?;

        info!(
            plan_id = plan_id,
            degrees = plan_degrees.len(),
            "Evaluating plan"
        );

        try_join_all(plan_degrees.into_iter().map(|plan_degree| async move {
            let requirements = self
                .evaluate_plan_degree(plan_id, plan_degree.plan_degree_id)
                .await?;
            Ok::<_, EvaluationError>(PlanDegreeEvaluation {
                plan_degree_id: plan_degree.plan_degree_id,
                degree_id: plan_degree.degree_id,
                summary: DegreeSummary::from_results(&requirements),
                requirements,
            })
        }))
        .await
    }

    /// Results written by the latest successful pass over `plan_degree_id`.
    pub fn stored_results(
        &self,
        plan_degree_id: PlanDegreeId,
    ) -> Result<Vec<DbPlanRequirement>, EvaluationError> {
        if self.repo.find_plan_degree(plan_degree_id)?.is_none() {
            return Err(EvaluationError::NotFound {
                entity: "plan degree",
                id: plan_degree_id,
            });
        }
        Ok(self.repo.plan_requirements(plan_degree_id)?)
    }

    fn run_pass(
        &self,
        plan_id: PlanId,
        plan_degree_id: PlanDegreeId,
        evaluation_id: &str,
    ) -> Result<Vec<RequirementProgress>, EvaluationError> {
        let plan = self.load_plan(plan_id)?;
        let plan_degree = self.load_plan_degree(plan_id, plan_degree_id)?;

        let rows = self
            .repo
            .requirements_for_degree(plan_degree.degree_id, plan.academic_year)?;
        let requirements = rows
            .into_iter()
            .map(Requirement::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let placements = self.repo.plan_courses(plan_id)?;
        let scorer = RequirementScorer::new(&placements);

        let mut results: Vec<RequirementProgress> =
            requirements.iter().map(|r| scorer.score(r)).collect();
        results.sort_by_key(|r| r.requirement_id);

        self.repo
            .replace_plan_requirements(plan_degree_id, evaluation_id, &results)?;

        Ok(results)
    }

    fn load_plan(&self, plan_id: PlanId) -> Result<DbPlan, EvaluationError> {
        self.repo
            .find_plan(plan_id)?
            .ok_or(EvaluationError::NotFound {
                entity: "plan",
                id: plan_id,
            })
    }

    /// Loads a plan degree, treating one attached to another plan as missing
    fn load_plan_degree(
        &self,
        plan_id: PlanId,
        plan_degree_id: PlanDegreeId,
    ) -> Result<DbPlanDegree, EvaluationError> {
        self.repo
            .find_plan_degree(plan_degree_id)?
            .filter(|pd| pd.plan_id == plan_id)
            .ok_or(EvaluationError::NotFound {
                entity: "plan degree",
                id: plan_degree_id,
            })
    }
}

/// Generates a short id tagging one evaluation pass in logs and stored rows.
fn generate_correlation_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFFFFFF, random)
}
