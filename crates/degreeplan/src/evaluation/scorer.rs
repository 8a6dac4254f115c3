/// Requirement scoring, one algorithm per requirement kind
use super::filter::{self, dedupe_by_course};
use super::grade::{CourseOutcome, GradeScale};
use super::requirement::*;
use super::status::{clamp_progress, ratio_progress};
use super::substitution::SubstitutionResolver;
use super::types::{PlanCourse, RequirementProgress};
use crate::db::{CourseId, DbCourseLink, RequirementId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// Scores requirements against one plan's courses.
///
/// Holds no mutable state; every call to [`RequirementScorer::score`] is
/// independent of the others.
pub struct RequirementScorer<'a> {
    /// Every placement, including repeated placements of one course
    placements: &'a [PlanCourse],
    /// One record per course
    courses: Vec<&'a PlanCourse>,
}

impl<'a> RequirementScorer<'a> {
    pub fn new(placements: &'a [PlanCourse]) -> Self {
        Self {
            placements,
            courses: dedupe_by_course(placements),
        }
    }

    /// Scores a single requirement. The result is always within `0..=100`.
    pub fn score(&self, requirement: &Requirement) -> RequirementProgress {
        let progress = match &requirement.rule {
            RequirementRule::CourseList(rule) => self.score_course_list(rule),
            RequirementRule::Units(rule) => self.score_units(rule),
            RequirementRule::MultiList(rule) => self.score_multi_list(rule),
            RequirementRule::MinGrade(rule) => self.score_min_grade(rule),
            RequirementRule::MinAverage(rule) => self.score_min_average(rule),
            RequirementRule::MaxFailures(rule) => self.score_max_failures(rule),
            RequirementRule::Custom(rule) => self.score_custom(requirement.requirement_id, rule),
        };

        debug!(
            requirement_id = requirement.requirement_id,
            progress = progress,
            "Scored requirement"
        );

        RequirementProgress::new(requirement.requirement_id, progress)
    }

    fn completed(&self) -> Vec<&'a PlanCourse> {
        filter::completed(&self.courses)
    }

    fn score_course_list(&self, rule: &CourseListRule) -> u8 {
        let resolver = SubstitutionResolver::new(rule.linked_ids(), &rule.substitutions);
        let completed = self.completed();

        if let Some(concentration) = &rule.concentration {
            let restrict_to_links = !rule.courses.is_empty();
            return score_concentration(concentration, &completed, |id| {
                !restrict_to_links || resolver.is_valid(id)
            });
        }

        let matched = fill_slots(&rule.courses, &resolver, &completed);

        if let Some(units_required) = rule.units_required {
            let units: f64 = matched.iter().map(|c| c.course.units).sum();
            return ratio_progress(units, Some(units_required));
        }

        let target = rule.courses_required.map(f64::from).or_else(|| {
            let mandatory = rule.mandatory_count();
            (mandatory > 0).then_some(mandatory as f64)
        });
        ratio_progress(matched.len() as f64, target)
    }

    fn score_units(&self, rule: &UnitsRule) -> u8 {
        let completed = self.completed();
        let eligible = filter::restrict(&completed, rule.level.as_ref(), rule.subjects.as_ref());
        let units: f64 = eligible.iter().map(|c| c.course.units).sum();

        ratio_progress(units, rule.units_required)
    }

    fn score_multi_list(&self, rule: &MultiListRule) -> u8 {
        let completed: HashSet<CourseId> =
            self.completed().iter().map(|c| c.course_id()).collect();

        // a list counts once no matter how many of its courses are done
        let satisfied = rule
            .lists
            .iter()
            .filter(|list| list.course_ids.iter().any(|id| completed.contains(id)))
            .count();

        let target = rule.lists_required.map(f64::from).or_else(|| {
            (!rule.lists.is_empty()).then_some(rule.lists.len() as f64)
        });
        ratio_progress(satisfied as f64, target)
    }

    fn score_min_grade(&self, rule: &MinGradeRule) -> u8 {
        if !rule.courses.iter().any(|link| link.is_required) {
            return 0;
        }

        let resolver = SubstitutionResolver::new(
            rule.courses.iter().map(|link| link.course_id),
            &rule.substitutions,
        );

        let mut considered = 0usize;
        let mut satisfied = 0usize;

        for link in &rule.courses {
            let attempts: Vec<&PlanCourse> = self
                .placements
                .iter()
                .filter(|c| resolver.satisfies(link.course_id, c.course_id()))
                .collect();

            if attempts.is_empty() && !link.is_required {
                continue;
            }

            considered += 1;
            if attempts
                .iter()
                .any(|c| GradeScale::course_exceeds_minimum_grade(c, rule.threshold))
            {
                satisfied += 1;
            }
        }

        ratio_progress(satisfied as f64, Some(considered as f64))
    }

    fn score_min_average(&self, rule: &MinAverageRule) -> u8 {
        let completed = self.completed();
        let eligible = filter::restrict(&completed, rule.level.as_ref(), rule.subjects.as_ref());

        let (weighted, units) = eligible
            .iter()
            .filter(|c| c.course.units > 0.0)
            .filter_map(|c| GradeScale::course_grade(c).map(|g| (g, c.course.units)))
            .fold((0.0, 0.0), |(sum, total), (grade, units)| {
                (sum + grade * units, total + units)
            });

        if units <= 0.0 {
            return 0;
        }

        let average = weighted / units;
        if average >= rule.min_average {
            100
        } else {
            clamp_progress(100.0 * average / rule.min_average)
        }
    }

    fn score_max_failures(&self, rule: &MaxFailuresRule) -> u8 {
        // every attempt counts, a retake does not erase an earlier F
        let mut seen = HashSet::new();
        let attempts: Vec<&PlanCourse> = self
            .placements
            .iter()
            .filter(|c| seen.insert(c.plan_course_id))
            .collect();

        let scoped = match &rule.subjects {
            Some(subjects) => filter::filter_by_subject(&attempts, subjects),
            None => attempts,
        };

        let failures = scoped
            .iter()
            .filter(|c| GradeScale::classify(c) == CourseOutcome::Failed)
            .count();

        if failures <= rule.max_failures as usize {
            100
        } else {
            0
        }
    }

    fn score_custom(&self, requirement_id: RequirementId, rule: &CustomRule) -> u8 {
        match rule {
            CustomRule::ConcurrentCourses { course_ids } => {
                if self.taken_concurrently(course_ids) {
                    100
                } else {
                    0
                }
            }
            CustomRule::Unrecognized { kind } => {
                warn!(
                    requirement_id = requirement_id,
                    custom_kind = %kind,
                    "Unrecognized custom requirement kind, scoring as 0"
                );
                0
            }
        }
    }

    /// True if a single term holds every course in `course_ids`.
    fn taken_concurrently(&self, course_ids: &[CourseId]) -> bool {
        let mut terms: HashMap<&str, HashSet<CourseId>> = HashMap::new();
        for placement in self.placements {
            if let Some(term) = placement.term.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                terms.entry(term).or_default().insert(placement.course_id());
            }
        }

        terms
            .values()
            .any(|in_term| course_ids.iter().all(|id| in_term.contains(id)))
    }
}

/// Fills each linked course with at most one completed course.
///
/// Direct matches are placed first; remaining slots take an accepted
/// substitute that has not filled another slot.
fn fill_slots<'a>(
    links: &[DbCourseLink],
    resolver: &SubstitutionResolver,
    completed: &[&'a PlanCourse],
) -> Vec<&'a PlanCourse> {
    let mut used: HashSet<CourseId> = HashSet::new();
    let mut open: Vec<CourseId> = Vec::new();
    let mut filled: Vec<&'a PlanCourse> = Vec::new();

    for link in links {
        match completed.iter().find(|c| c.course_id() == link.course_id) {
            Some(course) => {
                used.insert(course.course_id());
                filled.push(*course);
            }
            None => open.push(link.course_id),
        }
    }

    for original in open {
        let substitute = completed.iter().find(|c| {
            !used.contains(&c.course_id()) && resolver.satisfies(original, c.course_id())
        });
        if let Some(course) = substitute {
            used.insert(course.course_id());
            filled.push(*course);
        }
    }

    filled
}

/// Best single-subject progress among the concentration's subjects.
///
/// A concentration must be finished within one subject, so the subject that
/// is furthest along is reported rather than a sum across subjects.
fn score_concentration(
    concentration: &Concentration,
    completed: &[&PlanCourse],
    eligible: impl Fn(CourseId) -> bool,
) -> u8 {
    let subjects: Option<&BTreeSet<String>> =
        (!concentration.subjects.is_empty()).then_some(&concentration.subjects);
    let restricted = filter::restrict(completed, concentration.level.as_ref(), subjects);

    let mut per_subject: BTreeMap<String, usize> = BTreeMap::new();
    for course in restricted.into_iter().filter(|c| eligible(c.course_id())) {
        *per_subject
            .entry(course.course.subject_code.to_ascii_uppercase())
            .or_default() += 1;
    }

    let target = concentration.min_courses_per_subject.map(f64::from);
    per_subject
        .values()
        .map(|count| ratio_progress(*count as f64, target))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbRequirementList, DbSubstitution};
    use crate::evaluation::types::{Course, CourseStatus, RequirementStatus};

    fn course(course_id: CourseId, subject: &str, number: &str, units: f64) -> Course {
        Course {
            course_id,
            subject_code: subject.to_string(),
            catalog_number: number.to_string(),
            units,
        }
    }

    fn completed(course: Course, grade: Option<&str>) -> PlanCourse {
        PlanCourse {
            plan_course_id: course.course_id,
            course,
            status: CourseStatus::Completed,
            grade: grade.map(str::to_string),
            numeric_grade: None,
            term: None,
            term_index: None,
        }
    }

    fn in_term(course: Course, term: &str) -> PlanCourse {
        PlanCourse {
            plan_course_id: course.course_id,
            course,
            status: CourseStatus::Planned,
            grade: None,
            numeric_grade: None,
            term: Some(term.to_string()),
            term_index: None,
        }
    }

    fn required(ids: &[CourseId]) -> Vec<DbCourseLink> {
        ids.iter()
            .map(|&course_id| DbCourseLink {
                course_id,
                is_required: true,
            })
            .collect()
    }

    fn requirement(rule: RequirementRule) -> Requirement {
        Requirement {
            requirement_id: 1,
            name: "test".to_string(),
            rule,
        }
    }

    fn score(rule: RequirementRule, plan: &[PlanCourse]) -> u8 {
        RequirementScorer::new(plan).score(&requirement(rule)).progress
    }

    fn course_list(ids: &[CourseId], subs: Vec<DbSubstitution>) -> RequirementRule {
        RequirementRule::CourseList(CourseListRule {
            courses: required(ids),
            substitutions: subs,
            units_required: None,
            courses_required: None,
            concentration: None,
        })
    }

    #[test]
    fn test_course_list_counts_completed_required_courses() {
        let plan = vec![
            completed(course(1, "CS", "135", 0.5), Some("B")),
            completed(course(2, "CS", "136", 0.5), None),
            in_term(course(3, "CS", "246", 0.5), "2A"),
        ];
        // two of three mandatory courses complete
        assert_eq!(score(course_list(&[1, 2, 3], vec![]), &plan), 67);
    }

    #[test]
    fn test_course_list_units_target() {
        let plan = vec![
            completed(course(1, "CS", "135", 0.5), None),
            completed(course(2, "CS", "136", 0.5), None),
        ];
        let rule = RequirementRule::CourseList(CourseListRule {
            courses: required(&[1, 2, 3]),
            substitutions: vec![],
            units_required: Some(2.0),
            courses_required: Some(1),
            concentration: None,
        });
        assert_eq!(score(rule, &plan), 50);
    }

    #[test]
    fn test_substitution_equivalence_is_requirement_scoped() {
        let original = vec![completed(course(1, "MATH", "135", 0.5), None)];
        let substitute = vec![completed(course(9, "MATH", "145", 0.5), None)];
        let subs = vec![DbSubstitution {
            original_course_id: 1,
            substitute_course_id: 9,
            requirement_id: 1,
        }];

        let with_sub = course_list(&[1], subs);
        assert_eq!(score(with_sub.clone(), &original), 100);
        assert_eq!(score(with_sub, &substitute), 100);

        let without_sub = course_list(&[1], vec![]);
        assert_eq!(score(without_sub, &substitute), 0);
    }

    #[test]
    fn test_duplicate_placements_do_not_inflate_counts() {
        let mut retake = completed(course(1, "CS", "135", 0.5), None);
        retake.plan_course_id = 99;
        let plan = vec![completed(course(1, "CS", "135", 0.5), None), retake];

        assert_eq!(score(course_list(&[1, 2], vec![]), &plan), 50);
    }

    #[test]
    fn test_concentration_takes_best_subject() {
        let plan = vec![
            completed(course(1, "CS", "341", 0.5), None),
            completed(course(2, "CS", "343", 0.5), None),
            completed(course(3, "CS", "350", 0.5), None),
            completed(course(4, "STAT", "330", 0.5), None),
            completed(course(5, "ENGL", "109", 0.5), None),
        ];
        let rule = RequirementRule::CourseList(CourseListRule {
            courses: vec![],
            substitutions: vec![],
            units_required: None,
            courses_required: None,
            concentration: Some(Concentration {
                subjects: ["CS", "STAT", "CO", "AMATH"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                level: None,
                min_courses_per_subject: Some(4),
            }),
        });

        assert_eq!(score(rule, &plan), 75);
    }

    #[test]
    fn test_units_with_level_restriction() {
        let plan = vec![
            completed(course(1, "CS", "210F", 0.5), None),
            completed(course(2, "CS", "347", 0.5), None),
            completed(course(3, "CS", "450", 0.5), None),
        ];
        let rule = RequirementRule::Units(UnitsRule {
            units_required: Some(1.0),
            level: Some(crate::evaluation::filter::LevelRange {
                min: 300,
                max: Some(400),
            }),
            subjects: None,
        });

        assert_eq!(score(rule, &plan), 100);

        let half = RequirementRule::Units(UnitsRule {
            units_required: Some(2.0),
            level: Some(crate::evaluation::filter::LevelRange {
                min: 300,
                max: Some(400),
            }),
            subjects: None,
        });
        assert_eq!(score(half, &plan), 50);
    }

    #[test]
    fn test_multi_list_counts_each_list_once() {
        let plan = vec![
            completed(course(1, "CS", "341", 0.5), None),
            completed(course(2, "CS", "343", 0.5), None),
            completed(course(4, "STAT", "330", 0.5), None),
        ];
        let list = |list_id: i64, ids: &[CourseId]| DbRequirementList {
            list_id,
            name: format!("List {list_id}"),
            course_ids: ids.to_vec(),
        };
        let rule = RequirementRule::MultiList(MultiListRule {
            lists: vec![list(1, &[1, 2]), list(2, &[4]), list(3, &[7, 8])],
            lists_required: Some(3),
        });

        assert_eq!(score(rule, &plan), 67);
    }

    #[test]
    fn test_min_grade() {
        let plan = vec![
            completed(course(1, "CS", "135", 0.5), Some("B")),
            completed(course(2, "CS", "136", 0.5), Some("D")),
        ];
        let rule = RequirementRule::MinGrade(MinGradeRule {
            courses: required(&[1, 2]),
            substitutions: vec![],
            threshold: 65.0,
        });
        assert_eq!(score(rule, &plan), 50);

        let optional_only = RequirementRule::MinGrade(MinGradeRule {
            courses: vec![DbCourseLink {
                course_id: 1,
                is_required: false,
            }],
            substitutions: vec![],
            threshold: 65.0,
        });
        assert_eq!(score(optional_only, &plan), 0);
    }

    #[test]
    fn test_min_average_is_credit_weighted() {
        let plan = vec![
            completed(course(1, "CS", "135", 1.0), Some("A")),  // 90
            completed(course(2, "CS", "136", 0.5), Some("C")),  // 68
            completed(course(3, "CS", "137", 0.5), Some("WD")), // no grade
        ];
        // (90 * 1.0 + 68 * 0.5) / 1.5 = 82.67
        let met = RequirementRule::MinAverage(MinAverageRule {
            min_average: 80.0,
            level: None,
            subjects: None,
        });
        assert_eq!(score(met, &plan), 100);

        let unmet = RequirementRule::MinAverage(MinAverageRule {
            min_average: 90.0,
            level: None,
            subjects: None,
        });
        assert_eq!(score(unmet, &plan), 92);

        assert_eq!(
            score(
                RequirementRule::MinAverage(MinAverageRule {
                    min_average: 60.0,
                    level: None,
                    subjects: None,
                }),
                &[]
            ),
            0
        );
    }

    #[test]
    fn test_max_failures_is_binary() {
        let plan = vec![
            completed(course(1, "CS", "135", 0.5), Some("F")),
            completed(course(2, "MATH", "135", 0.5), Some("F")),
        ];
        let allow_one = |subjects: Option<BTreeSet<String>>| {
            RequirementRule::MaxFailures(MaxFailuresRule {
                max_failures: 1,
                subjects,
            })
        };

        assert_eq!(score(allow_one(None), &plan), 0);
        let cs_only: BTreeSet<String> = ["CS".to_string()].into_iter().collect();
        assert_eq!(score(allow_one(Some(cs_only)), &plan), 100);
    }

    #[test]
    fn test_failure_before_retake_still_counts() {
        let mut failed = completed(course(1, "CS", "135", 0.5), Some("F"));
        failed.term_index = Some(1);
        let mut retake = completed(course(1, "CS", "135", 0.5), Some("B"));
        retake.plan_course_id = 2;
        retake.term_index = Some(4);
        let plan = vec![failed, retake];

        let none_allowed = RequirementRule::MaxFailures(MaxFailuresRule {
            max_failures: 0,
            subjects: None,
        });
        assert_eq!(score(none_allowed, &plan), 0);

        let one_allowed = RequirementRule::MaxFailures(MaxFailuresRule {
            max_failures: 1,
            subjects: None,
        });
        assert_eq!(score(one_allowed, &plan), 100);
    }

    #[test]
    fn test_numeric_grade_is_not_a_failure() {
        let mut low = completed(course(1, "CS", "135", 0.5), None);
        low.numeric_grade = Some(40.0);
        let rule = RequirementRule::MaxFailures(MaxFailuresRule {
            max_failures: 0,
            subjects: None,
        });
        assert_eq!(score(rule, &[low]), 100);
    }

    #[test]
    fn test_course_and_substitute_fill_one_slot() {
        let plan = vec![
            completed(course(1, "MATH", "135", 0.5), None),
            completed(course(9, "MATH", "145", 0.5), None),
        ];
        let subs = vec![DbSubstitution {
            original_course_id: 1,
            substitute_course_id: 9,
            requirement_id: 1,
        }];

        // MATH 136 (id 2) is still missing
        assert_eq!(score(course_list(&[1, 2], subs.clone()), &plan), 50);

        let by_units = RequirementRule::CourseList(CourseListRule {
            courses: required(&[1, 2]),
            substitutions: subs,
            units_required: Some(1.0),
            courses_required: None,
            concentration: None,
        });
        assert_eq!(score(by_units, &plan), 50);
    }

    #[test]
    fn test_concentration_honors_level_restriction() {
        let plan = vec![
            completed(course(1, "CS", "241", 0.5), None),
            completed(course(2, "CS", "341", 0.5), None),
            completed(course(3, "CS", "343", 0.5), None),
        ];
        let rule = RequirementRule::CourseList(CourseListRule {
            courses: vec![],
            substitutions: vec![],
            units_required: None,
            courses_required: None,
            concentration: Some(Concentration {
                subjects: ["CS".to_string()].into_iter().collect(),
                level: Some(crate::evaluation::filter::LevelRange {
                    min: 300,
                    max: None,
                }),
                min_courses_per_subject: Some(4),
            }),
        });

        // CS 241 is below the 300 level
        assert_eq!(score(rule, &plan), 50);
    }

    #[test]
    fn test_concurrent_courses() {
        let rule = RequirementRule::Custom(CustomRule::ConcurrentCourses {
            course_ids: vec![1, 2],
        });

        let together = vec![
            in_term(course(1, "PHYS", "121", 0.5), "3A"),
            in_term(course(2, "PHYS", "121L", 0.25), "3A"),
        ];
        assert_eq!(score(rule.clone(), &together), 100);

        let apart = vec![
            in_term(course(1, "PHYS", "121", 0.5), "3A"),
            in_term(course(2, "PHYS", "121L", 0.25), "3B"),
        ];
        assert_eq!(score(rule, &apart), 0);
    }

    #[test]
    fn test_unrecognized_custom_kind_scores_zero() {
        let rule = RequirementRule::Custom(CustomRule::Unrecognized {
            kind: "lab-pairing".to_string(),
        });
        let result = RequirementScorer::new(&[]).score(&requirement(rule));

        assert_eq!(result.progress, 0);
        assert_eq!(result.status, RequirementStatus::NotStarted);
    }

    #[test]
    fn test_progress_is_clamped() {
        let plan: Vec<PlanCourse> = (1..=10)
            .map(|id| completed(course(id, "CS", "100", 3.0), None))
            .collect();
        let rule = RequirementRule::Units(UnitsRule {
            units_required: Some(1.0),
            level: None,
            subjects: None,
        });

        let result = RequirementScorer::new(&plan).score(&requirement(rule));
        assert_eq!(result.progress, 100);
        assert_eq!(result.status, RequirementStatus::Completed);
    }
}
