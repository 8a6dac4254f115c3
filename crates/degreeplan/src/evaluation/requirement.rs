//! Typed requirement rules built from stored requirement rows.

use super::error::EvaluationError;
use super::filter::{parse_subject_set, LevelRange};
use super::grade::GradeScale;
use crate::db::{CourseId, DbCourseLink, DbRequirement, DbRequirementList, DbSubstitution, RequirementId};
use serde::Deserialize;
use std::collections::BTreeSet;

/// Custom kind name for the concurrency rule
pub const CONCURRENT_COURSES: &str = "concurrent-courses";

/// Concentration kind that requires every course to come from one subject
pub const SINGLE_SUBJECT: &str = "single-subject";

/// One scoring rule with only the fields its kind uses
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub requirement_id: RequirementId,
    pub name: String,
    pub rule: RequirementRule,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequirementRule {
    CourseList(CourseListRule),
    Units(UnitsRule),
    MultiList(MultiListRule),
    MinGrade(MinGradeRule),
    MinAverage(MinAverageRule),
    MaxFailures(MaxFailuresRule),
    Custom(CustomRule),
}

/// Take courses from a linked pool, counted by units or by number of courses
#[derive(Debug, Clone, PartialEq)]
pub struct CourseListRule {
    pub courses: Vec<DbCourseLink>,
    pub substitutions: Vec<DbSubstitution>,
    pub units_required: Option<f64>,
    pub courses_required: Option<u32>,
    pub concentration: Option<Concentration>,
}

impl CourseListRule {
    pub fn linked_ids(&self) -> impl Iterator<Item = CourseId> + '_ {
        self.courses.iter().map(|link| link.course_id)
    }

    /// Number of courses to complete when no explicit target is stored
    pub fn mandatory_count(&self) -> usize {
        self.courses.iter().filter(|link| link.is_required).count()
    }
}

/// All courses must come from a single subject out of `subjects`
#[derive(Debug, Clone, PartialEq)]
pub struct Concentration {
    pub subjects: BTreeSet<String>,
    pub level: Option<LevelRange>,
    pub min_courses_per_subject: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitsRule {
    pub units_required: Option<f64>,
    pub level: Option<LevelRange>,
    pub subjects: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiListRule {
    pub lists: Vec<DbRequirementList>,
    pub lists_required: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinGradeRule {
    pub courses: Vec<DbCourseLink>,
    pub substitutions: Vec<DbSubstitution>,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinAverageRule {
    pub min_average: f64,
    pub level: Option<LevelRange>,
    pub subjects: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaxFailuresRule {
    pub max_failures: u32,
    pub subjects: Option<BTreeSet<String>>,
}

/// Closed set of custom rules; add a variant to support a new kind.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomRule {
    /// Every listed course must share a single term
    ConcurrentCourses { course_ids: Vec<CourseId> },
    /// Kind present in data that this build does not know how to score
    Unrecognized { kind: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConcurrentCoursesParams {
    #[serde(alias = "courses", alias = "course_ids")]
    course_ids: Vec<CourseId>,
}

impl TryFrom<DbRequirement> for Requirement {
    type Error = EvaluationError;

    fn try_from(row: DbRequirement) -> Result<Self, Self::Error> {
        let id = row.requirement_id;
        let kind = row.kind.trim().to_ascii_uppercase().replace('-', "_");

        let substitutions: Vec<DbSubstitution> = row
            .substitutions
            .iter()
            .filter(|sub| sub.requirement_id == id)
            .copied()
            .collect();

        let rule = match kind.as_str() {
            "COURSE_LIST" | "COURSE" => {
                let concentration = match row.concentration_kind.as_deref().map(str::trim) {
                    Some(k) if k.eq_ignore_ascii_case(SINGLE_SUBJECT) => Some(Concentration {
                        subjects: subjects(row.subject_restriction.as_deref()).unwrap_or_default(),
                        level: level(id, row.level_restriction.as_deref())?,
                        min_courses_per_subject: count(row.min_courses_per_subject)
                            .or_else(|| count(row.courses_required)),
                    }),
                    _ => None,
                };

                RequirementRule::CourseList(CourseListRule {
                    courses: row.course_links,
                    substitutions,
                    units_required: row.units_required,
                    courses_required: count(row.courses_required),
                    concentration,
                })
            }
            "UNITS" => RequirementRule::Units(UnitsRule {
                units_required: row.units_required,
                level: level(id, row.level_restriction.as_deref())?,
                subjects: subjects(row.subject_restriction.as_deref()),
            }),
            "MULTI_LIST" => RequirementRule::MultiList(MultiListRule {
                lists: row.lists,
                lists_required: count(row.courses_required),
            }),
            "MIN_GRADE" => {
                let text = row.min_grade_required.as_deref().unwrap_or("");
                let threshold = GradeScale::parse_threshold(text).ok_or_else(|| {
                    EvaluationError::configuration(id, format!("invalid minimum grade {text:?}"))
                })?;

                RequirementRule::MinGrade(MinGradeRule {
                    courses: row.course_links,
                    substitutions,
                    threshold,
                })
            }
            "MIN_AVERAGE" => {
                let min_average = row
                    .min_average
                    .filter(|avg| avg.is_finite() && *avg > 0.0)
                    .ok_or_else(|| EvaluationError::configuration(id, "missing minimum average"))?;

                RequirementRule::MinAverage(MinAverageRule {
                    min_average,
                    level: level(id, row.level_restriction.as_deref())?,
                    subjects: subjects(row.subject_restriction.as_deref()),
                })
            }
            "MAX_FAILURES" => {
                let max_failures = row
                    .max_failures
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| EvaluationError::configuration(id, "missing failure allowance"))?;

                RequirementRule::MaxFailures(MaxFailuresRule {
                    max_failures,
                    subjects: subjects(row.failure_subject_restriction.as_deref()),
                })
            }
            "CUSTOM" => RequirementRule::Custom(custom_rule(
                id,
                row.custom_kind.as_deref(),
                row.custom_params.as_deref(),
            )?),
            other => {
                return Err(EvaluationError::configuration(
                    id,
                    format!("unknown requirement kind {other:?}"),
                ))
            }
        };

        Ok(Requirement {
            requirement_id: id,
            name: row.name,
            rule,
        })
    }
}

fn custom_rule(
    id: RequirementId,
    custom_kind: Option<&str>,
    params: Option<&str>,
) -> Result<CustomRule, EvaluationError> {
    let kind = custom_kind.unwrap_or("").trim();

    if !kind.eq_ignore_ascii_case(CONCURRENT_COURSES) {
        return Ok(CustomRule::Unrecognized {
            kind: kind.to_string(),
        });
    }

    let raw = params
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| EvaluationError::configuration(id, "concurrent-courses needs parameters"))?;

    let parsed: ConcurrentCoursesParams = serde_json::from_str(raw).map_err(|e| {
        EvaluationError::configuration(id, format!("malformed custom parameters: {e}"))
    })?;

    if parsed.course_ids.is_empty() {
        return Err(EvaluationError::configuration(
            id,
            "concurrent-courses lists no courses",
        ));
    }

    Ok(CustomRule::ConcurrentCourses {
        course_ids: parsed.course_ids,
    })
}

fn level(id: RequirementId, text: Option<&str>) -> Result<Option<LevelRange>, EvaluationError> {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        None => Ok(None),
        Some(text) => LevelRange::parse(text).map(Some).ok_or_else(|| {
            EvaluationError::configuration(id, format!("invalid level restriction {text:?}"))
        }),
    }
}

fn subjects(text: Option<&str>) -> Option<BTreeSet<String>> {
    text.map(parse_subject_set).filter(|set| !set.is_empty())
}

fn count(value: Option<i64>) -> Option<u32> {
    value.and_then(|n| u32::try_from(n).ok())
}
