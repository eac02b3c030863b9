use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{LessonId, UserId};
use crate::model::weights::MilestoneWeights;

/// Highest completion value a record can hold.
pub const FULL_COMPLETION: u8 = 100;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("completion percentage must be in 0..=100 (got {0})")]
    InvalidPercentage(u8),

    #[error("quiz score must be in 0..=100 (got {0})")]
    InvalidScore(u8),

    #[error("a video event needs at least one video in the lesson")]
    NoVideos,

    #[error("completed_at is only valid at 100% completion (got {0})")]
    CompletedBelowFull(u8),
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// Per-user, per-lesson completion state as held by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PersistedProgress")]
pub struct ProgressRecord {
    user_id: UserId,
    lesson_id: LessonId,
    completion_percentage: u8,
    quiz_score: Option<u8>,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

/// Unchecked wire shape of a `ProgressRecord`.
#[derive(Deserialize)]
struct PersistedProgress {
    user_id: UserId,
    lesson_id: LessonId,
    completion_percentage: u8,
    quiz_score: Option<u8>,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PersistedProgress> for ProgressRecord {
    type Error = ProgressError;

    fn try_from(raw: PersistedProgress) -> Result<Self, Self::Error> {
        Self::from_persisted(
            raw.user_id,
            raw.lesson_id,
            raw.completion_percentage,
            raw.quiz_score,
            raw.completed_at,
            raw.updated_at,
        )
    }
}

impl ProgressRecord {
    /// Rehydrate a record loaded from storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the percentage or score fall outside 0..=100,
    /// or if `completed_at` is set on an incomplete record.
    pub fn from_persisted(
        user_id: UserId,
        lesson_id: LessonId,
        completion_percentage: u8,
        quiz_score: Option<u8>,
        completed_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if completion_percentage > FULL_COMPLETION {
            return Err(ProgressError::InvalidPercentage(completion_percentage));
        }
        if let Some(score) = quiz_score.filter(|s| *s > FULL_COMPLETION) {
            return Err(ProgressError::InvalidScore(score));
        }
        if completed_at.is_some() && completion_percentage < FULL_COMPLETION {
            return Err(ProgressError::CompletedBelowFull(completion_percentage));
        }
        Ok(Self {
            user_id,
            lesson_id,
            completion_percentage,
            quiz_score,
            completed_at,
            updated_at,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn completion_percentage(&self) -> u8 {
        self.completion_percentage
    }

    #[must_use]
    pub fn quiz_score(&self) -> Option<u8> {
        self.quiz_score
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completion_percentage == FULL_COMPLETION
    }
}

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

/// Interaction that may move a lesson's completion forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    ContentViewed,
    VideoWatched { total_videos: u32, watched: u32 },
    QuizSubmitted { score: u8 },
}

/// What the store should do after an event was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accrual {
    /// The stored record already reflects the event.
    Unchanged,
    /// Upsert this record. `newly_completed` is true when this write is the one
    /// taking the lesson to 100%.
    Write {
        record: ProgressRecord,
        newly_completed: bool,
    },
}

impl Accrual {
    #[must_use]
    pub fn record(&self) -> Option<&ProgressRecord> {
        match self {
            Accrual::Unchanged => None,
            Accrual::Write { record, .. } => Some(record),
        }
    }

    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Accrual::Unchanged)
    }
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Computes proposed progress values from milestone events.
///
/// The engine is stateless; the caller passes the currently stored record
/// (if any) and persists the result. Percentages never decrease and never
/// leave 0..=100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressAccrual {
    weights: MilestoneWeights,
}

impl ProgressAccrual {
    #[must_use]
    pub fn new(weights: MilestoneWeights) -> Self {
        Self { weights }
    }

    #[must_use]
    pub fn weights(&self) -> MilestoneWeights {
        self.weights
    }

    /// Apply `event` on top of `existing` for the `(user_id, lesson_id)` pair.
    ///
    /// `existing` must belong to the same pair; a mismatched record is treated
    /// as the stored state anyway, so callers are expected to look it up by key.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NoVideos` for a video event on a lesson without
    /// videos, and `ProgressError::InvalidScore` for a quiz score above 100.
    pub fn apply(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        existing: Option<&ProgressRecord>,
        event: ProgressEvent,
        now: DateTime<Utc>,
    ) -> Result<Accrual, ProgressError> {
        let stored = existing.map(ProgressRecord::completion_percentage);
        let stored_score = existing.and_then(ProgressRecord::quiz_score);

        let (percentage, quiz_score) = match event {
            ProgressEvent::ContentViewed => {
                if existing.is_some() {
                    return Ok(Accrual::Unchanged);
                }
                (self.weights.content().min(FULL_COMPLETION), None)
            }
            ProgressEvent::VideoWatched {
                total_videos,
                watched,
            } => {
                if total_videos == 0 {
                    return Err(ProgressError::NoVideos);
                }
                let watched = watched.min(total_videos);
                let video_share = round_half_up(
                    u64::from(self.weights.video()) * u64::from(watched),
                    u64::from(total_videos),
                );
                let quiz_share = if stored_score.is_some() {
                    u64::from(self.weights.quiz())
                } else {
                    0
                };
                let candidate = cap(u64::from(self.weights.content()) + video_share + quiz_share);
                if stored.is_some_and(|current| candidate <= current) {
                    return Ok(Accrual::Unchanged);
                }
                (candidate, stored_score)
            }
            ProgressEvent::QuizSubmitted { score } => {
                if score > FULL_COMPLETION {
                    return Err(ProgressError::InvalidScore(score));
                }
                let current = stored.unwrap_or(0);
                let earned_without_quiz = if stored_score.is_some() {
                    current.saturating_sub(self.weights.quiz())
                } else {
                    current
                };
                let floor = earned_without_quiz.min(self.weights.non_quiz());
                let candidate = cap(u64::from(floor) + u64::from(self.weights.quiz()));
                (candidate.max(current), Some(score))
            }
        };

        let newly_completed = percentage == FULL_COMPLETION && stored != Some(FULL_COMPLETION);
        let completed_at = if newly_completed {
            Some(now)
        } else {
            existing.and_then(ProgressRecord::completed_at)
        };

        Ok(Accrual::Write {
            record: ProgressRecord {
                user_id,
                lesson_id,
                completion_percentage: percentage,
                quiz_score,
                completed_at,
                updated_at: now,
            },
            newly_completed,
        })
    }
}

/// Integer division rounding halves away from zero.
#[must_use]
pub fn round_half_up(numerator: u64, denominator: u64) -> u64 {
    debug_assert!(denominator > 0);
    (2 * numerator + denominator) / (2 * denominator)
}

fn cap(value: u64) -> u8 {
    u8::try_from(value.min(u64::from(FULL_COMPLETION))).unwrap_or(FULL_COMPLETION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn ids() -> (UserId, LessonId) {
        (UserId::random(), LessonId::random())
    }

    fn written(accrual: Accrual) -> ProgressRecord {
        match accrual {
            Accrual::Write { record, .. } => record,
            Accrual::Unchanged => panic!("expected a write"),
        }
    }

    #[test]
    fn default_weights_walkthrough() {
        let engine = ProgressAccrual::default();
        let (user, lesson) = ids();
        let t0 = fixed_now();

        let r = written(
            engine
                .apply(user, lesson, None, ProgressEvent::ContentViewed, t0)
                .unwrap(),
        );
        assert_eq!(r.completion_percentage(), 30);

        let video = |watched| ProgressEvent::VideoWatched {
            total_videos: 2,
            watched,
        };
        let r = written(engine.apply(user, lesson, Some(&r), video(1), t0).unwrap());
        assert_eq!(r.completion_percentage(), 45);
        let r = written(engine.apply(user, lesson, Some(&r), video(2), t0).unwrap());
        assert_eq!(r.completion_percentage(), 60);
        assert!(r.completed_at().is_none());

        let t1 = t0 + Duration::minutes(5);
        let accrual = engine
            .apply(
                user,
                lesson,
                Some(&r),
                ProgressEvent::QuizSubmitted { score: 80 },
                t1,
            )
            .unwrap();
        assert!(matches!(
            accrual,
            Accrual::Write {
                newly_completed: true,
                ..
            }
        ));
        let r = written(accrual);
        assert_eq!(r.completion_percentage(), 100);
        assert_eq!(r.quiz_score(), Some(80));
        assert_eq!(r.completed_at(), Some(t1));
        assert_eq!(r.updated_at(), t1);
    }

    #[test]
    fn content_view_only_counts_once() {
        let engine = ProgressAccrual::default();
        let (user, lesson) = ids();
        let r = written(
            engine
                .apply(user, lesson, None, ProgressEvent::ContentViewed, fixed_now())
                .unwrap(),
        );
        let again = engine
            .apply(user, lesson, Some(&r), ProgressEvent::ContentViewed, fixed_now())
            .unwrap();
        assert!(again.is_unchanged());
    }

    #[test]
    fn video_rounds_half_up_and_ignores_regressions() {
        let engine = ProgressAccrual::new(MilestoneWeights::new(25, 25, 50).unwrap());
        let (user, lesson) = ids();
        let now = fixed_now();
        let start = written(
            engine
                .apply(user, lesson, None, ProgressEvent::ContentViewed, now)
                .unwrap(),
        );

        // 25 * 1 / 2 = 12.5 -> 13
        let half = written(
            engine
                .apply(
                    user,
                    lesson,
                    Some(&start),
                    ProgressEvent::VideoWatched {
                        total_videos: 2,
                        watched: 1,
                    },
                    now,
                )
                .unwrap(),
        );
        assert_eq!(half.completion_percentage(), 38);

        // a stale count computes a lower candidate and must not apply
        let stale = engine
            .apply(
                user,
                lesson,
                Some(&half),
                ProgressEvent::VideoWatched {
                    total_videos: 4,
                    watched: 1,
                },
                now,
            )
            .unwrap();
        assert!(stale.is_unchanged());
    }

    #[test]
    fn watched_count_is_clamped_to_total() {
        let engine = ProgressAccrual::default();
        let (user, lesson) = ids();
        let r = written(
            engine
                .apply(
                    user,
                    lesson,
                    None,
                    ProgressEvent::VideoWatched {
                        total_videos: 3,
                        watched: 9,
                    },
                    fixed_now(),
                )
                .unwrap(),
        );
        assert_eq!(r.completion_percentage(), 60);
    }

    #[test]
    fn video_without_videos_is_rejected() {
        let engine = ProgressAccrual::default();
        let (user, lesson) = ids();
        let err = engine
            .apply(
                user,
                lesson,
                None,
                ProgressEvent::VideoWatched {
                    total_videos: 0,
                    watched: 0,
                },
                fixed_now(),
            )
            .unwrap_err();
        assert_eq!(err, ProgressError::NoVideos);
    }

    #[test]
    fn video_after_quiz_keeps_quiz_share() {
        let engine = ProgressAccrual::default();
        let (user, lesson) = ids();
        let now = fixed_now();
        let r = written(
            engine
                .apply(user, lesson, None, ProgressEvent::ContentViewed, now)
                .unwrap(),
        );
        let r = written(
            engine
                .apply(
                    user,
                    lesson,
                    Some(&r),
                    ProgressEvent::QuizSubmitted { score: 50 },
                    now,
                )
                .unwrap(),
        );
        assert_eq!(r.completion_percentage(), 70);

        let r = written(
            engine
                .apply(
                    user,
                    lesson,
                    Some(&r),
                    ProgressEvent::VideoWatched {
                        total_videos: 3,
                        watched: 1,
                    },
                    now,
                )
                .unwrap(),
        );
        assert_eq!(r.completion_percentage(), 80);
        assert_eq!(r.quiz_score(), Some(50));

        // resubmitting recomputes from the non-quiz share already earned
        let r = written(
            engine
                .apply(
                    user,
                    lesson,
                    Some(&r),
                    ProgressEvent::QuizSubmitted { score: 90 },
                    now,
                )
                .unwrap(),
        );
        assert_eq!(r.completion_percentage(), 80);
        assert_eq!(r.quiz_score(), Some(90));
    }

    #[test]
    fn lower_resubmission_keeps_percentage_and_completion_time() {
        let engine = ProgressAccrual::default();
        let (user, lesson) = ids();
        let t0 = fixed_now();
        let complete = ProgressRecord::from_persisted(user, lesson, 100, Some(90), Some(t0), t0)
            .unwrap();

        let later = t0 + Duration::days(1);
        let accrual = engine
            .apply(
                user,
                lesson,
                Some(&complete),
                ProgressEvent::QuizSubmitted { score: 10 },
                later,
            )
            .unwrap();
        assert!(matches!(
            accrual,
            Accrual::Write {
                newly_completed: false,
                ..
            }
        ));
        let r = written(accrual);
        assert_eq!(r.completion_percentage(), 100);
        assert_eq!(r.quiz_score(), Some(10));
        assert_eq!(r.completed_at(), Some(t0));
    }

    #[test]
    fn quiz_never_lowers_a_higher_stored_value() {
        let engine = ProgressAccrual::default();
        let (user, lesson) = ids();
        let now = fixed_now();
        // stored under an older weighting scheme
        let legacy = ProgressRecord::from_persisted(user, lesson, 90, None, None, now).unwrap();
        let r = written(
            engine
                .apply(
                    user,
                    lesson,
                    Some(&legacy),
                    ProgressEvent::QuizSubmitted { score: 70 },
                    now,
                )
                .unwrap(),
        );
        assert_eq!(r.completion_percentage(), 100);
        assert!(r.completed_at().is_some());
    }

    #[test]
    fn quiz_without_record_grants_only_quiz_share() {
        let engine = ProgressAccrual::default();
        let (user, lesson) = ids();
        let r = written(
            engine
                .apply(
                    user,
                    lesson,
                    None,
                    ProgressEvent::QuizSubmitted { score: 100 },
                    fixed_now(),
                )
                .unwrap(),
        );
        assert_eq!(r.completion_percentage(), 40);
        assert!(r.completed_at().is_none());
    }

    #[test]
    fn completion_is_set_only_when_crossing() {
        let engine = ProgressAccrual::new(MilestoneWeights::new(100, 0, 0).unwrap());
        let (user, lesson) = ids();
        let now = fixed_now();
        let accrual = engine
            .apply(user, lesson, None, ProgressEvent::ContentViewed, now)
            .unwrap();
        assert!(matches!(
            accrual,
            Accrual::Write {
                newly_completed: true,
                ..
            }
        ));
        let r = written(accrual);
        assert_eq!(r.completed_at(), Some(now));

        let later = now + Duration::hours(1);
        let r2 = written(
            engine
                .apply(
                    user,
                    lesson,
                    Some(&r),
                    ProgressEvent::QuizSubmitted { score: 40 },
                    later,
                )
                .unwrap(),
        );
        assert_eq!(r2.completed_at(), Some(now));
    }

    #[test]
    fn full_sequence_matches_formula_and_is_monotonic() {
        for (c, v, q) in [(30, 30, 40), (50, 50, 0), (20, 40, 40), (10, 0, 90)] {
            let engine = ProgressAccrual::new(MilestoneWeights::new(c, v, q).unwrap());
            for total in 1..=4_u32 {
                for watched in 0..=total {
                    let (user, lesson) = ids();
                    let now = fixed_now();
                    let mut seen = Vec::new();
                    let mut record = written(
                        engine
                            .apply(user, lesson, None, ProgressEvent::ContentViewed, now)
                            .unwrap(),
                    );
                    seen.push(record.completion_percentage());
                    for w in 1..=watched {
                        if let Accrual::Write { record: next, .. } = engine
                            .apply(
                                user,
                                lesson,
                                Some(&record),
                                ProgressEvent::VideoWatched {
                                    total_videos: total,
                                    watched: w,
                                },
                                now,
                            )
                            .unwrap()
                        {
                            record = next;
                        }
                        seen.push(record.completion_percentage());
                    }
                    record = written(
                        engine
                            .apply(
                                user,
                                lesson,
                                Some(&record),
                                ProgressEvent::QuizSubmitted { score: 55 },
                                now,
                            )
                            .unwrap(),
                    );

                    let expected = (u64::from(c)
                        + round_half_up(u64::from(v) * u64::from(watched), u64::from(total))
                        + u64::from(q))
                    .min(100);
                    assert_eq!(u64::from(record.completion_percentage()), expected);
                    assert!(seen.iter().all(|p| *p <= record.completion_percentage()));
                    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
                    assert_eq!(record.completed_at().is_some(), expected == 100);
                }
            }
        }
    }

    #[test]
    fn from_persisted_validates_ranges() {
        let (user, lesson) = ids();
        let now = fixed_now();
        assert_eq!(
            ProgressRecord::from_persisted(user, lesson, 101, None, None, now),
            Err(ProgressError::InvalidPercentage(101))
        );
        assert_eq!(
            ProgressRecord::from_persisted(user, lesson, 50, Some(120), None, now),
            Err(ProgressError::InvalidScore(120))
        );
        assert_eq!(
            ProgressRecord::from_persisted(user, lesson, 50, None, Some(now), now),
            Err(ProgressError::CompletedBelowFull(50))
        );
    }

    #[test]
    fn rounding_helper() {
        assert_eq!(round_half_up(30, 2), 15);
        assert_eq!(round_half_up(25, 2), 13);
        assert_eq!(round_half_up(10, 3), 3);
        assert_eq!(round_half_up(20, 3), 7);
        assert_eq!(round_half_up(0, 5), 0);
    }

    #[test]
    fn deserializing_checks_the_same_rules_as_loading() {
        let (user, lesson) = ids();
        let at = fixed_now();
        let record =
            ProgressRecord::from_persisted(user, lesson, 100, Some(90), Some(at), at).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        let back: ProgressRecord = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, record);

        let mut over = json.clone();
        over["completion_percentage"] = 101.into();
        assert!(serde_json::from_value::<ProgressRecord>(over).is_err());

        let mut early = json;
        early["completion_percentage"] = 60.into();
        let err = serde_json::from_value::<ProgressRecord>(early).unwrap_err();
        assert!(err.to_string().contains("completed_at"));
    }
}
