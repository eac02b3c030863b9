use std::collections::HashSet;

use serde::Serialize;

use crate::model::lesson::Lesson;
use crate::model::progress::{ProgressRecord, round_half_up};

/// How many rows the "recent activity" list shows.
pub const RECENT_PROGRESS_LIMIT: usize = 5;

/// Aggregated view of a learner's progress, useful for a dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub completed_lessons: usize,
    /// Rounded mean of recorded quiz scores, 0 when none were recorded.
    pub average_score: u8,
    pub in_progress: Vec<ProgressRecord>,
    pub recent: Vec<ProgressRecord>,
}

impl DashboardStats {
    /// Summarise `progress`, which is expected newest-first.
    #[must_use]
    pub fn from_progress(progress: &[ProgressRecord]) -> Self {
        let completed_lessons = progress.iter().filter(|p| p.is_complete()).count();

        let scores: Vec<u64> = progress
            .iter()
            .filter_map(ProgressRecord::quiz_score)
            .map(u64::from)
            .collect();
        let average_score = if scores.is_empty() {
            0
        } else {
            let mean = round_half_up(scores.iter().sum(), scores.len() as u64);
            u8::try_from(mean).unwrap_or(100)
        };

        Self {
            completed_lessons,
            average_score,
            in_progress: progress
                .iter()
                .filter(|p| !p.is_complete())
                .cloned()
                .collect(),
            recent: progress
                .iter()
                .take(RECENT_PROGRESS_LIMIT)
                .cloned()
                .collect(),
        }
    }
}

/// Pick the lesson a learner should continue with.
///
/// Prefers the most recently touched unfinished lesson; otherwise the first
/// lesson (by `order_index`) the learner has not started. `progress` is
/// expected newest-first and `lessons` in catalog order.
#[must_use]
pub fn next_lesson<'a>(progress: &[ProgressRecord], lessons: &'a [Lesson]) -> Option<&'a Lesson> {
    let resume = progress
        .iter()
        .filter(|p| !p.is_complete())
        .max_by_key(|p| p.updated_at())
        .and_then(|p| lessons.iter().find(|l| l.id() == p.lesson_id()));
    if resume.is_some() {
        return resume;
    }

    let started: HashSet<_> = progress.iter().map(ProgressRecord::lesson_id).collect();
    lessons
        .iter()
        .filter(|l| !started.contains(&l.id()))
        .min_by_key(|l| l.order_index())
}
