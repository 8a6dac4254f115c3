//! Letter grade scale and grade-based course classification.

use super::types::{CourseStatus, PlanCourse};
use serde::{Deserialize, Serialize};

/// Outcome of a single course record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseOutcome {
    Planned,
    InProgress,
    Completed,
    Failed,
}

/// Grade conversion helper
#[derive(Debug, Clone)]
pub struct GradeScale;

impl GradeScale {
    /// Representative percentage for a letter grade.
    ///
    /// Credit grades (CR/P) count as 70, NCR as 45. Administrative grades
    /// such as INC, WD, VWD and AUD carry no numeric value.
    pub fn letter_to_score(grade: &str) -> Option<f64> {
        let score = match grade.trim().to_ascii_uppercase().as_str() {
            "A+" => 95.0,
            "A" => 90.0,
            "A-" => 85.0,
            "B+" => 82.0,
            "B" => 78.0,
            "B-" => 75.0,
            "C+" => 72.0,
            "C" => 68.0,
            "C-" => 65.0,
            "D+" => 62.0,
            "D" => 58.0,
            "D-" => 55.0,
            "F" => 45.0,
            "CR" | "P" => 70.0,
            "NCR" => 45.0,
            _ => return None,
        };
        Some(score)
    }

    /// Parses a grade threshold written either as a letter ("C") or a number ("60").
    pub fn parse_threshold(text: &str) -> Option<f64> {
        Self::letter_to_score(text).or_else(|| parse_bare_number(text))
    }

    /// Best available numeric grade for a course record.
    ///
    /// Prefers `numeric_grade`, then the letter table, then the grade field
    /// read as a bare number. Returns `None` when there is no usable signal.
    pub fn course_grade(course: &PlanCourse) -> Option<f64> {
        if let Some(numeric) = course.numeric_grade.filter(|n| n.is_finite()) {
            return Some(numeric);
        }

        let grade = course.grade.as_deref()?;
        Self::letter_to_score(grade).or_else(|| parse_bare_number(grade))
    }

    /// Checks a completed course against a minimum grade.
    ///
    /// Planned and in-progress courses never satisfy a threshold, and a
    /// missing grade is never assumed to be a pass.
    pub fn course_exceeds_minimum_grade(course: &PlanCourse, threshold: f64) -> bool {
        if course.status != CourseStatus::Completed {
            return false;
        }

        match Self::course_grade(course) {
            Some(grade) => grade >= threshold,
            None => false,
        }
    }

    /// Classifies a course record as planned, in progress, completed or failed.
    pub fn classify(course: &PlanCourse) -> CourseOutcome {
        match course.status {
            CourseStatus::Planned => CourseOutcome::Planned,
            CourseStatus::InProgress => CourseOutcome::InProgress,
            CourseStatus::Completed if Self::is_failure(course) => CourseOutcome::Failed,
            CourseStatus::Completed => CourseOutcome::Completed,
        }
    }

    /// A letter grade of F, unless an explicit numeric grade supersedes it
    /// (same precedence as [`GradeScale::course_grade`]).
    fn is_failure(course: &PlanCourse) -> bool {
        if course.numeric_grade.is_some_and(f64::is_finite) {
            return false;
        }

        course
            .grade
            .as_deref()
            .is_some_and(|letter| letter.trim().eq_ignore_ascii_case("F"))
    }
}

fn parse_bare_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::types::Course;

    fn record(status: CourseStatus, grade: Option<&str>, numeric: Option<f64>) -> PlanCourse {
        PlanCourse {
            plan_course_id: 1,
            course: Course {
                course_id: 10,
                subject_code: "CS".to_string(),
                catalog_number: "135".to_string(),
                units: 0.5,
            },
            status,
            grade: grade.map(str::to_string),
            numeric_grade: numeric,
            term: Some("1A".to_string()),
            term_index: Some(0),
        }
    }

    #[test]
    fn test_letter_table() {
        assert_eq!(GradeScale::letter_to_score("A+"), Some(95.0));
        assert_eq!(GradeScale::letter_to_score("b-"), Some(75.0));
        assert_eq!(GradeScale::letter_to_score(" C "), Some(68.0));
        assert_eq!(GradeScale::letter_to_score("CR"), Some(70.0));
        assert_eq!(GradeScale::letter_to_score("NCR"), Some(45.0));
        assert_eq!(GradeScale::letter_to_score("WD"), None);
        assert_eq!(GradeScale::letter_to_score("INC"), None);
    }

    #[test]
    fn test_numeric_grade_preferred() {
        let course = record(CourseStatus::Completed, Some("F"), Some(88.0));
        assert_eq!(GradeScale::course_grade(&course), Some(88.0));
        assert!(GradeScale::course_exceeds_minimum_grade(&course, 80.0));
    }

    #[test]
    fn test_bare_number_in_grade_field() {
        let course = record(CourseStatus::Completed, Some("73"), None);
        assert_eq!(GradeScale::course_grade(&course), Some(73.0));
    }

    #[test]
    fn test_missing_grade_never_passes() {
        let course = record(CourseStatus::Completed, None, None);
        assert!(!GradeScale::course_exceeds_minimum_grade(&course, 0.0));

        let garbage = record(CourseStatus::Completed, Some("??"), None);
        assert_eq!(GradeScale::course_grade(&garbage), None);
        assert!(!GradeScale::course_exceeds_minimum_grade(&garbage, 0.0));
    }

    #[test]
    fn test_only_completed_courses_pass() {
        let course = record(CourseStatus::InProgress, Some("A+"), None);
        assert!(!GradeScale::course_exceeds_minimum_grade(&course, 50.0));
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            GradeScale::classify(&record(CourseStatus::Completed, Some("F"), None)),
            CourseOutcome::Failed
        );
        assert_eq!(
            GradeScale::classify(&record(CourseStatus::Completed, Some(" f "), None)),
            CourseOutcome::Failed
        );
        assert_eq!(
            GradeScale::classify(&record(CourseStatus::Completed, Some("C-"), None)),
            CourseOutcome::Completed
        );
        assert_eq!(
            GradeScale::classify(&record(CourseStatus::Planned, Some("F"), None)),
            CourseOutcome::Planned
        );
    }

    #[test]
    fn test_numeric_grade_alone_is_not_a_failure() {
        assert_eq!(
            GradeScale::classify(&record(CourseStatus::Completed, None, Some(40.0))),
            CourseOutcome::Completed
        );
        assert_eq!(
            GradeScale::classify(&record(CourseStatus::Completed, Some("40"), None)),
            CourseOutcome::Completed
        );
    }

    #[test]
    fn test_failure_follows_numeric_precedence() {
        let course = record(CourseStatus::Completed, Some("F"), Some(88.0));
        assert_eq!(GradeScale::course_grade(&course), Some(88.0));
        assert_eq!(GradeScale::classify(&course), CourseOutcome::Completed);
    }
}
