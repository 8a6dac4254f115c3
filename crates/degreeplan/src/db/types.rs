/// Database row types for degree requirements and plan results
use crate::evaluation::CourseStatus;
use serde::{Deserialize, Serialize};

pub type CourseId = i64;
pub type DegreeId = i64;
pub type RequirementId = i64;
pub type PlanId = i64;
pub type PlanDegreeId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbPlan {
    pub plan_id: PlanId,
    pub name: String,
    pub academic_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbPlanDegree {
    pub plan_degree_id: PlanDegreeId,
    pub plan_id: PlanId,
    pub degree_id: DegreeId,
}

/// A requirement row as stored, with its associations attached.
///
/// `kind` is the raw string from the `requirements` table; only the columns
/// relevant to that kind carry meaning. See `evaluation::Requirement` for the
/// typed form the scorers consume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbRequirement {
    pub requirement_id: RequirementId,
    pub set_id: i64,
    pub name: String,
    pub kind: String,
    pub units_required: Option<f64>,
    pub courses_required: Option<i64>,
    pub level_restriction: Option<String>,
    pub subject_restriction: Option<String>,
    pub concentration_kind: Option<String>,
    pub min_courses_per_subject: Option<i64>,
    pub min_grade_required: Option<String>,
    pub min_average: Option<f64>,
    pub max_failures: Option<i64>,
    pub failure_subject_restriction: Option<String>,
    pub custom_kind: Option<String>,
    pub custom_params: Option<String>, // JSON string
    pub course_links: Vec<DbCourseLink>,
    pub substitutions: Vec<DbSubstitution>,
    pub lists: Vec<DbRequirementList>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbCourseLink {
    pub course_id: CourseId,
    pub is_required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbSubstitution {
    pub original_course_id: CourseId,
    pub substitute_course_id: CourseId,
    pub requirement_id: RequirementId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbRequirementList {
    pub list_id: i64,
    pub name: String,
    pub course_ids: Vec<CourseId>,
}

/// A persisted evaluation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbPlanRequirement {
    pub plan_degree_id: PlanDegreeId,
    pub requirement_id: RequirementId,
    pub status: String,
    pub progress: u8,
    pub evaluation_id: String,
    pub evaluated_at: chrono::DateTime<chrono::Utc>,
}

/// Input for placing a course into a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlanCourse {
    pub plan_id: PlanId,
    pub course_id: CourseId,
    pub status: CourseStatus,
    pub grade: Option<String>,
    pub numeric_grade: Option<f64>,
    pub term: Option<String>,
    pub term_index: Option<i64>,
}

impl NewPlanCourse {
    pub fn new(plan_id: PlanId, course_id: CourseId, status: CourseStatus) -> Self {
        Self {
            plan_id,
            course_id,
            status,
            grade: None,
            numeric_grade: None,
            term: None,
            term_index: None,
        }
    }

    pub fn with_grade(mut self, grade: &str) -> Self {
        self.grade = Some(grade.to_string());
        self
    }

    pub fn with_numeric_grade(mut self, grade: f64) -> Self {
        self.numeric_grade = Some(grade);
        self
    }

    pub fn in_term(mut self, term: &str, term_index: i64) -> Self {
        self.term = Some(term.to_string());
        self.term_index = Some(term_index);
        self
    }
}
