//! Progress clamping and the progress → status mapping.

use super::types::{DegreeSummary, RequirementProgress, RequirementStatus};

impl RequirementStatus {
    /// Maps a progress value to its status.
    ///
    /// `0` is NOT_STARTED, `100` and above is COMPLETED, everything in
    /// between is IN_PROGRESS.
    pub fn from_progress(progress: u8) -> Self {
        match progress {
            0 => RequirementStatus::NotStarted,
            p if p >= 100 => RequirementStatus::Completed,
            _ => RequirementStatus::InProgress,
        }
    }
}

/// Rounds a raw percentage and clamps it into `0..=100`. NaN maps to 0.
pub fn clamp_progress(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// `min(100, round(100 * achieved / target))`.
///
/// A missing or non-positive target means the rule has nothing to measure
/// against, which scores 0.
pub fn ratio_progress(achieved: f64, target: Option<f64>) -> u8 {
    match target {
        Some(target) if target > 0.0 => clamp_progress(100.0 * achieved / target),
        _ => 0,
    }
}

impl DegreeSummary {
    pub fn from_results(results: &[RequirementProgress]) -> Self {
        let count = |status: RequirementStatus| {
            results.iter().filter(|r| r.status == status).count()
        };

        let overall_progress = if results.is_empty() {
            0
        } else {
            let total: f64 = results.iter().map(|r| r.progress as f64).sum();
            clamp_progress(total / results.len() as f64)
        };

        DegreeSummary {
            total_requirements: results.len(),
            completed: count(RequirementStatus::Completed),
            in_progress: count(RequirementStatus::InProgress),
            not_started: count(RequirementStatus::NotStarted),
            overall_progress,
        }
    }
}
