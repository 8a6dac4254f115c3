//! Course selection predicates shared by the scorers.

use super::types::{CourseStatus, PlanCourse};
use crate::db::CourseId;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

// Static patterns - compiled once
static LEADING_DIGITS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)").unwrap());
static LEVEL_RANGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*(?:(\+)|-\s*(\d+))?\s*$").unwrap());

/// Hundreds bucket of a catalog number ("210F" -> 200, "347" -> 300).
///
/// Only the leading digit run is considered; trailing letters are ignored.
pub fn catalog_level(catalog_number: &str) -> Option<u32> {
    let caps = LEADING_DIGITS_REGEX.captures(catalog_number)?;
    let number: u32 = caps.get(1)?.as_str().parse().ok()?;
    Some(number / 100 * 100)
}

/// Inclusive range of level buckets, `max = None` meaning "and above".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRange {
    pub min: u32,
    pub max: Option<u32>,
}

impl LevelRange {
    /// Parses "300-400", "300+" or "300".
    ///
    /// A bare number selects exactly that bucket.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = LEVEL_RANGE_REGEX.captures(text)?;
        let min: u32 = caps.get(1)?.as_str().parse().ok()?;

        let max = if caps.get(2).is_some() {
            None
        } else if let Some(upper) = caps.get(3) {
            Some(upper.as_str().parse().ok()?)
        } else {
            Some(min)
        };

        if matches!(max, Some(max) if max < min) {
            return None;
        }

        Some(Self { min, max })
    }

    pub fn contains(&self, level: u32) -> bool {
        level >= self.min && self.max.map_or(true, |max| level <= max)
    }
}

/// Parses a comma-separated subject restriction ("CS, STAT,co") into upper-case codes.
pub fn parse_subject_set(text: &str) -> BTreeSet<String> {
    text.split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn filter_by_level<'a>(courses: &[&'a PlanCourse], range: &LevelRange) -> Vec<&'a PlanCourse> {
    courses
        .iter()
        .copied()
        .filter(|c| {
            catalog_level(&c.course.catalog_number)
                .map(|level| range.contains(level))
                .unwrap_or(false)
        })
        .collect()
}

pub fn filter_by_subject<'a>(
    courses: &[&'a PlanCourse],
    subjects: &BTreeSet<String>,
) -> Vec<&'a PlanCourse> {
    courses
        .iter()
        .copied()
        .filter(|c| subjects.contains(&c.course.subject_code.to_ascii_uppercase()))
        .collect()
}

/// Applies the optional level and subject restrictions together.
pub fn restrict<'a>(
    courses: &[&'a PlanCourse],
    level: Option<&LevelRange>,
    subjects: Option<&BTreeSet<String>>,
) -> Vec<&'a PlanCourse> {
    let mut selected = courses.to_vec();
    if let Some(range) = level {
        selected = filter_by_level(&selected, range);
    }
    if let Some(subjects) = subjects {
        selected = filter_by_subject(&selected, subjects);
    }
    selected
}

pub fn completed<'a>(courses: &[&'a PlanCourse]) -> Vec<&'a PlanCourse> {
    courses.iter().copied().filter(|c| c.is_completed()).collect()
}

/// Collapses repeated placements of the same course into one record.
///
/// The most advanced status wins (completed, then in progress, then planned);
/// ties go to the later term. Output keeps first-seen course order.
pub fn dedupe_by_course(courses: &[PlanCourse]) -> Vec<&PlanCourse> {
    let mut order: Vec<CourseId> = Vec::new();
    let mut best: HashMap<CourseId, &PlanCourse> = HashMap::new();

    for course in courses {
        match best.get(&course.course_id()) {
            Some(current) if !supersedes(course, current) => {}
            Some(_) => {
                best.insert(course.course_id(), course);
            }
            None => {
                order.push(course.course_id());
                best.insert(course.course_id(), course);
            }
        }
    }

    order.into_iter().filter_map(|id| best.get(&id).copied()).collect()
}

fn supersedes(candidate: &PlanCourse, current: &PlanCourse) -> bool {
    let rank = |status: CourseStatus| match status {
        CourseStatus::Planned => 0,
        CourseStatus::InProgress => 1,
        CourseStatus::Completed => 2,
    };

    (rank(candidate.status), candidate.term_index) > (rank(current.status), current.term_index)
}
