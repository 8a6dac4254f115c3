//! Requirement-scoped course substitutions.

use crate::db::{CourseId, DbSubstitution};
use std::collections::{HashMap, HashSet};

/// Lookup from a required course to the substitutes accepted in its place.
///
/// Built fresh for every evaluation from the substitutions declared on one
/// requirement, so substitutions never leak between requirements.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionResolver {
    required: HashSet<CourseId>,
    substitutes: HashMap<CourseId, HashSet<CourseId>>,
}

impl SubstitutionResolver {
    /// Creates a resolver for `required` course ids.
    ///
    /// Substitutions whose original course is not in the required set are
    /// ignored.
    pub fn new(
        required: impl IntoIterator<Item = CourseId>,
        substitutions: &[DbSubstitution],
    ) -> Self {
        let required: HashSet<CourseId> = required.into_iter().collect();
        let mut substitutes: HashMap<CourseId, HashSet<CourseId>> = HashMap::new();

        for sub in substitutions {
            if required.contains(&sub.original_course_id) {
                substitutes
                    .entry(sub.original_course_id)
                    .or_default()
                    .insert(sub.substitute_course_id);
            }
        }

        Self {
            required,
            substitutes,
        }
    }

    /// True if `course_id` is required directly or accepted as a substitute
    /// for some required course.
    pub fn is_valid(&self, course_id: CourseId) -> bool {
        self.required.contains(&course_id)
            || self.substitutes.values().any(|subs| subs.contains(&course_id))
    }

    /// True if taking `course_id` fills the slot of `original_id`.
    pub fn satisfies(&self, original_id: CourseId, course_id: CourseId) -> bool {
        if original_id == course_id {
            return self.required.contains(&original_id);
        }
        self.substitutes
            .get(&original_id)
            .map(|subs| subs.contains(&course_id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(original: CourseId, substitute: CourseId) -> DbSubstitution {
        DbSubstitution {
            original_course_id: original,
            substitute_course_id: substitute,
            requirement_id: 1,
        }
    }

    #[test]
    fn test_direct_and_substituted_courses_are_valid() {
        let resolver = SubstitutionResolver::new([1, 2], &[sub(1, 10), sub(1, 11)]);

        assert!(resolver.is_valid(1));
        assert!(resolver.is_valid(2));
        assert!(resolver.is_valid(10));
        assert!(resolver.is_valid(11));
        assert!(!resolver.is_valid(3));
    }

    #[test]
    fn test_substitution_for_unrequired_original_is_ignored() {
        let resolver = SubstitutionResolver::new([1], &[sub(5, 50)]);
        assert!(!resolver.is_valid(50));
    }

    #[test]
    fn test_satisfies_is_slot_specific() {
        let resolver = SubstitutionResolver::new([1, 2], &[sub(1, 10)]);

        assert!(resolver.satisfies(1, 1));
        assert!(resolver.satisfies(1, 10));
        assert!(!resolver.satisfies(2, 10));
        assert!(!resolver.satisfies(3, 3));
    }
}
