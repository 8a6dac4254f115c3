/// Types for plan courses and requirement evaluation results
use crate::db::{CourseId, DegreeId, PlanDegreeId, RequirementId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Catalog course, immutable reference data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub course_id: CourseId,
    pub subject_code: String,   // e.g., "CS", "STAT"
    pub catalog_number: String, // e.g., "135", "210F"
    pub units: f64,
}

impl Course {
    /// Human readable course code, e.g. "CS 135"
    pub fn code(&self) -> String {
        format!("{} {}", self.subject_code, self.catalog_number)
    }
}

/// Where a course sits in the student's progression
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseStatus {
    Planned,
    InProgress,
    Completed,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Planned => "PLANNED",
            CourseStatus::InProgress => "IN_PROGRESS",
            CourseStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for CourseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PLANNED" => Ok(CourseStatus::Planned),
            "IN_PROGRESS" => Ok(CourseStatus::InProgress),
            "COMPLETED" => Ok(CourseStatus::Completed),
            other => Err(format!("unknown course status: {other}")),
        }
    }
}

/// A student's placement of a catalog course into their plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanCourse {
    pub plan_course_id: i64,
    pub course: Course,
    pub status: CourseStatus,
    pub grade: Option<String>,      // letter grade, e.g. "B+", "CR"
    pub numeric_grade: Option<f64>, // percentage, preferred over `grade`
    pub term: Option<String>,       // e.g. "3A"
    pub term_index: Option<i64>,
}

impl PlanCourse {
    pub fn course_id(&self) -> CourseId {
        self.course.course_id
    }

    pub fn is_completed(&self) -> bool {
        self.status == CourseStatus::Completed
    }
}

/// Derived state of one requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl RequirementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementStatus::NotStarted => "NOT_STARTED",
            RequirementStatus::InProgress => "IN_PROGRESS",
            RequirementStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequirementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_STARTED" => Ok(RequirementStatus::NotStarted),
            "IN_PROGRESS" => Ok(RequirementStatus::InProgress),
            "COMPLETED" => Ok(RequirementStatus::Completed),
            other => Err(format!("unknown requirement status: {other}")),
        }
    }
}

/// Evaluation result for a single requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementProgress {
    pub requirement_id: RequirementId,
    pub status: RequirementStatus,
    pub progress: u8, // always within 0..=100
}

impl RequirementProgress {
    pub fn new(requirement_id: RequirementId, progress: u8) -> Self {
        let progress = progress.min(100);
        Self {
            requirement_id,
            status: RequirementStatus::from_progress(progress),
            progress,
        }
    }
}

/// Requirement counts and average progress for one degree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegreeSummary {
    pub total_requirements: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub overall_progress: u8,
}

/// Evaluation results for one degree attached to a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDegreeEvaluation {
    pub plan_degree_id: PlanDegreeId,
    pub degree_id: DegreeId,
    pub requirements: Vec<RequirementProgress>,
    pub summary: DegreeSummary,
}
