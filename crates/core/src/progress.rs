//! Course-completion aggregation.
//!
//! A course has `|resources| + |assessments|` items. A resource counts once
//! its latest module-progress record is `completed`; an assessment counts once
//! its latest attempt `passed`. Callers pass records already scoped to one
//! learner and one course.

use std::collections::HashMap;

use crate::model::{
    Assessment, AssessmentId, AssessmentProgress, ModuleProgress, Resource, ResourceId,
};

//
// ─── COURSE PROGRESS ──────────────────────────────────────────────────────────
//

/// Completion summary for one learner in one course.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourseProgress {
    /// `completed_items / total_items * 100`, unrounded; `0` for an empty course.
    pub percentage: f64,
    pub completed_items: usize,
    pub total_items: usize,
}

impl CourseProgress {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_counts(completed_items: usize, total_items: usize) -> Self {
        let percentage = if total_items > 0 {
            completed_items as f64 / total_items as f64 * 100.0
        } else {
            0.0
        };
        Self {
            percentage,
            completed_items,
            total_items,
        }
    }

    /// The zero state shown when progress could not be loaded.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_counts(0, 0)
    }

    /// Percentage rounded to the nearest whole number, for display.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn rounded_percentage(&self) -> u32 {
        self.percentage.round().clamp(0.0, 100.0) as u32
    }

    #[must_use]
    pub fn remaining_items(&self) -> usize {
        self.total_items.saturating_sub(self.completed_items)
    }
}

//
// ─── ITEM STATES ──────────────────────────────────────────────────────────────
//

/// Which playlist entry an [`ItemState`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Resource(ResourceId),
    Assessment(AssessmentId),
}

/// Done/not-done flag for one course item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemState {
    pub kind: ItemKind,
    pub done: bool,
}

/// Per-item completion in playlist order: resources first, then assessments.
#[must_use]
pub fn item_states(
    resources: &[Resource],
    assessments: &[Assessment],
    module_progress: &[ModuleProgress],
    assessment_progress: &[AssessmentProgress],
) -> Vec<ItemState> {
    let modules = latest_module_progress(module_progress);
    let attempts = latest_attempts(assessment_progress);

    let resource_items = resources.iter().map(|resource| ItemState {
        kind: ItemKind::Resource(resource.id),
        done: modules.get(&resource.id).is_some_and(|p| p.completed),
    });
    let assessment_items = assessments.iter().map(|assessment| ItemState {
        kind: ItemKind::Assessment(assessment.id),
        done: attempts.get(&assessment.id).is_some_and(|a| a.passed),
    });

    resource_items.chain(assessment_items).collect()
}

/// Aggregate completion for a course.
///
/// Records for ids outside `resources`/`assessments` are ignored, so
/// `completed_items` never exceeds `total_items`.
#[must_use]
pub fn compute_progress(
    resources: &[Resource],
    assessments: &[Assessment],
    module_progress: &[ModuleProgress],
    assessment_progress: &[AssessmentProgress],
) -> CourseProgress {
    let states = item_states(resources, assessments, module_progress, assessment_progress);
    let completed = states.iter().filter(|state| state.done).count();
    CourseProgress::from_counts(completed, states.len())
}

//
// ─── DEDUPLICATION ────────────────────────────────────────────────────────────
//

/// Collapse module-progress records to the most recent one per resource.
///
/// Recency is `updated_at`, falling back to `completed_at`; on a tie the
/// record appearing later in the slice wins.
#[must_use]
pub fn latest_module_progress(
    records: &[ModuleProgress],
) -> HashMap<ResourceId, &ModuleProgress> {
    let mut latest: HashMap<ResourceId, &ModuleProgress> = HashMap::with_capacity(records.len());
    for record in records {
        latest
            .entry(record.resource_id)
            .and_modify(|current| {
                if record.last_touched() >= current.last_touched() {
                    *current = record;
                }
            })
            .or_insert(record);
    }
    latest
}

/// Collapse assessment attempts to the latest one per assessment.
///
/// Latest is the highest `attempt_number`, then the latest `completed_at`;
/// on a tie the record appearing later in the slice wins.
#[must_use]
pub fn latest_attempts(
    records: &[AssessmentProgress],
) -> HashMap<AssessmentId, &AssessmentProgress> {
    let mut latest: HashMap<AssessmentId, &AssessmentProgress> =
        HashMap::with_capacity(records.len());
    for record in records {
        latest
            .entry(record.assessment_id)
            .and_modify(|current| {
                let candidate = (record.attempt_number, record.completed_at);
                if candidate >= (current.attempt_number, current.completed_at) {
                    *current = record;
                }
            })
            .or_insert(record);
    }
    latest
}

/// Attempt number for the next submission of `assessment_id`.
#[must_use]
pub fn next_attempt_number(records: &[AssessmentProgress], assessment_id: AssessmentId) -> u32 {
    records
        .iter()
        .filter(|record| record.assessment_id == assessment_id)
        .map(|record| record.attempt_number)
        .max()
        .map_or(1, |highest| highest.saturating_add(1))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseId, UserId};
    use crate::time::fixed_now;
    use chrono::Duration;

    const USER: UserId = UserId::new(1);
    const COURSE: CourseId = CourseId::new(10);

    fn resources(n: u64) -> Vec<Resource> {
        (1..=n)
            .map(|id| Resource {
                id: ResourceId::new(id),
                course_id: Some(COURSE),
                title: format!("Lecture {id}"),
                duration: Some("10".into()),
                video_url: None,
            })
            .collect()
    }

    fn assessments(n: u64) -> Vec<Assessment> {
        (1..=n)
            .map(|id| Assessment {
                id: AssessmentId::new(100 + id),
                course_id: Some(COURSE),
                title: format!("Quiz {id}"),
                description: String::new(),
                questions: Vec::new(),
            })
            .collect()
    }

    fn done_module(resource: u64) -> ModuleProgress {
        ModuleProgress::completed(USER, COURSE, ResourceId::new(resource), fixed_now())
    }

    fn attempt(assessment: u64, attempt_number: u32, passed: bool) -> AssessmentProgress {
        AssessmentProgress {
            id: None,
            user_id: USER,
            course_id: COURSE,
            assessment_id: AssessmentId::new(assessment),
            score: u32::from(passed),
            max_score: 1,
            percentage: if passed { 100.0 } else { 0.0 },
            passed,
            attempt_number,
            completed_at: passed.then(fixed_now),
        }
    }

    #[test]
    fn mixed_course_reports_sixty_percent() {
        let progress = compute_progress(
            &resources(3),
            &assessments(2),
            &[done_module(1), done_module(2)],
            &[attempt(101, 1, true)],
        );
        assert_eq!(progress.completed_items, 3);
        assert_eq!(progress.total_items, 5);
        assert!((progress.percentage - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_course_is_zero_percent() {
        let progress = compute_progress(&[], &[], &[], &[]);
        assert_eq!(progress, CourseProgress::empty());
        assert_eq!(progress.percentage, 0.0);
    }

    #[test]
    fn formula_holds_across_counts() {
        for r in 0..=4_u64 {
            for a in 0..=3_u64 {
                for cr in 0..=r {
                    for ca in 0..=a {
                        let modules: Vec<_> = (1..=cr).map(done_module).collect();
                        let attempts: Vec<_> = (1..=ca).map(|i| attempt(100 + i, 1, true)).collect();
                        let progress =
                            compute_progress(&resources(r), &assessments(a), &modules, &attempts);

                        let total = (r + a) as usize;
                        assert_eq!(progress.total_items, total);
                        assert_eq!(progress.completed_items, (cr + ca) as usize);
                        let expected = if total > 0 {
                            (cr + ca) as f64 / total as f64 * 100.0
                        } else {
                            0.0
                        };
                        assert_eq!(progress.percentage, expected);
                    }
                }
            }
        }
    }

    #[test]
    fn incomplete_module_records_do_not_count() {
        let mut pending = done_module(1);
        pending.completed = false;
        let progress = compute_progress(&resources(1), &[], &[pending], &[]);
        assert_eq!(progress.completed_items, 0);
    }

    #[test]
    fn duplicate_module_records_keep_most_recent() {
        let older = done_module(1);
        let mut newer = done_module(1);
        newer.completed = false;
        newer.updated_at = Some(fixed_now() + Duration::minutes(5));

        let progress = compute_progress(&resources(1), &[], &[newer.clone(), older.clone()], &[]);
        assert_eq!(progress.completed_items, 0);

        // Equal timestamps: later position wins.
        let mut same_time = done_module(1);
        same_time.completed = false;
        let progress = compute_progress(&resources(1), &[], &[older, same_time], &[]);
        assert_eq!(progress.completed_items, 0);
    }

    #[test]
    fn latest_attempt_decides_assessment_state() {
        let passed_then_failed = [attempt(101, 1, true), attempt(101, 2, false)];
        let progress = compute_progress(&[], &assessments(1), &[], &passed_then_failed);
        assert_eq!(progress.completed_items, 0);

        let failed_then_passed = [attempt(101, 2, true), attempt(101, 1, false)];
        let progress = compute_progress(&[], &assessments(1), &[], &failed_then_passed);
        assert_eq!(progress.completed_items, 1);
    }

    #[test]
    fn duplicate_completions_count_once() {
        let progress = compute_progress(
            &resources(2),
            &[],
            &[done_module(1), done_module(1), done_module(1)],
            &[],
        );
        assert_eq!(progress.completed_items, 1);
        assert_eq!(progress.rounded_percentage(), 50);
    }

    #[test]
    fn records_for_unknown_items_are_ignored() {
        let progress = compute_progress(&resources(1), &[], &[done_module(1), done_module(99)], &[]);
        assert_eq!(progress.completed_items, 1);
        assert_eq!(progress.total_items, 1);
    }

    #[test]
    fn item_states_follow_playlist_order() {
        let states = item_states(&resources(2), &assessments(1), &[done_module(2)], &[]);
        assert_eq!(
            states,
            vec![
                ItemState {
                    kind: ItemKind::Resource(ResourceId::new(1)),
                    done: false
                },
                ItemState {
                    kind: ItemKind::Resource(ResourceId::new(2)),
                    done: true
                },
                ItemState {
                    kind: ItemKind::Assessment(AssessmentId::new(101)),
                    done: false
                },
            ]
        );
    }

    #[test]
    fn next_attempt_number_appends() {
        let history = [attempt(101, 1, false), attempt(101, 3, false), attempt(102, 7, true)];
        assert_eq!(next_attempt_number(&history, AssessmentId::new(101)), 4);
        assert_eq!(next_attempt_number(&history, AssessmentId::new(103)), 1);
    }

    #[test]
    fn rounded_percentage_rounds_half_up() {
        assert_eq!(CourseProgress::from_counts(1, 3).rounded_percentage(), 33);
        assert_eq!(CourseProgress::from_counts(2, 3).rounded_percentage(), 67);
        assert_eq!(CourseProgress::from_counts(2, 3).remaining_items(), 1);
    }
}
