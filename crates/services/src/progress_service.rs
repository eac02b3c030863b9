use std::sync::Arc;

use learn_core::model::{
    Accrual, LessonId, ProgressAccrual, ProgressEvent, ProgressRecord, UserId,
};
use storage::repository::{LessonRepository, ProgressRepository};
use tracing::{debug, info};

use crate::Clock;
use crate::error::ProgressServiceError;

/// Turns learner interactions into persisted progress.
///
/// Every call reads the stored row, lets `ProgressAccrual` decide the new
/// value, and upserts it. A failed read is returned as an error; it is never
/// treated as "no progress yet".
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    accrual: ProgressAccrual,
    lessons: Arc<dyn LessonRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        accrual: ProgressAccrual,
        lessons: Arc<dyn LessonRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            accrual,
            lessons,
            progress,
        }
    }

    #[must_use]
    pub fn accrual(&self) -> ProgressAccrual {
        self.accrual
    }

    /// Record that the learner opened the lesson content.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the row cannot be read or written.
    pub async fn record_content_view(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Accrual, ProgressServiceError> {
        self.apply(user, lesson, ProgressEvent::ContentViewed).await
    }

    /// Record that the learner watched one of the lesson's videos.
    ///
    /// Re-watching a video does not count twice.
    ///
    /// # Errors
    ///
    /// Returns `UnknownLesson` or `UnknownVideo` if the lesson or link does
    /// not exist, and `Storage` on repository failures.
    pub async fn record_video_watched(
        &self,
        user: UserId,
        lesson_id: LessonId,
        video_url: &str,
    ) -> Result<Accrual, ProgressServiceError> {
        let lesson = self
            .lessons
            .get_lesson(lesson_id)
            .await?
            .ok_or(ProgressServiceError::UnknownLesson(lesson_id))?;
        let video = lesson
            .find_video(video_url)
            .ok_or_else(|| ProgressServiceError::UnknownVideo {
                lesson: lesson_id,
                url: video_url.to_owned(),
            })?;

        let watched = self
            .progress
            .record_video_view(user, lesson_id, video.as_str(), self.clock.now())
            .await?;

        self.apply(
            user,
            lesson_id,
            ProgressEvent::VideoWatched {
                total_videos: lesson.video_count(),
                watched,
            },
        )
        .await
    }

    /// Record a quiz score, replacing any earlier score for the lesson.
    ///
    /// # Errors
    ///
    /// Returns `Progress` for a score above 100 and `Storage` on repository
    /// failures.
    pub async fn record_quiz_score(
        &self,
        user: UserId,
        lesson: LessonId,
        score: u8,
    ) -> Result<Accrual, ProgressServiceError> {
        self.apply(user, lesson, ProgressEvent::QuizSubmitted { score })
            .await
    }

    /// The stored progress row, or `Ok(None)` if the learner never started.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the read fails.
    pub async fn progress_for(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<ProgressRecord>, ProgressServiceError> {
        Ok(self.progress.get_progress(user, lesson).await?)
    }

    async fn apply(
        &self,
        user: UserId,
        lesson: LessonId,
        event: ProgressEvent,
    ) -> Result<Accrual, ProgressServiceError> {
        let existing = self.progress.get_progress(user, lesson).await?;
        let accrual =
            self.accrual
                .apply(user, lesson, existing.as_ref(), event, self.clock.now())?;

        match &accrual {
            Accrual::Unchanged => {
                debug!(%user, %lesson, ?event, "progress unchanged");
            }
            Accrual::Write {
                record,
                newly_completed,
            } => {
                self.progress.upsert_progress(record).await?;
                debug!(
                    %user,
                    %lesson,
                    ?event,
                    percentage = record.completion_percentage(),
                    "progress updated"
                );
                if *newly_completed {
                    info!(%user, %lesson, "lesson completed");
                }
            }
        }

        Ok(accrual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use learn_core::model::{Difficulty, Lesson, MilestoneWeights};
    use learn_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn service(repo: &InMemoryRepository) -> ProgressService {
        ProgressService::new(
            Clock::fixed(fixed_now()),
            ProgressAccrual::new(MilestoneWeights::default()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    async fn lesson_with_videos(repo: &InMemoryRepository, videos: &[&str]) -> Lesson {
        let lesson = Lesson::new(
            LessonId::random(),
            None,
            "Graphs",
            "body",
            Difficulty::Advanced,
            vec![],
            0,
            videos,
        )
        .unwrap();
        repo.upsert_lesson(&lesson).await.unwrap();
        lesson
    }

    #[tokio::test]
    async fn content_view_creates_row_once() {
        let repo = InMemoryRepository::new();
        let service = service(&repo);
        let user = UserId::random();
        let lesson = LessonId::random();

        let first = service.record_content_view(user, lesson).await.unwrap();
        assert_eq!(first.record().unwrap().completion_percentage(), 30);
        let second = service.record_content_view(user, lesson).await.unwrap();
        assert!(second.is_unchanged());
    }

    #[tokio::test]
    async fn rewatching_a_video_does_not_count_twice() {
        let repo = InMemoryRepository::new();
        let service = service(&repo);
        let lesson = lesson_with_videos(
            &repo,
            &["https://v.example.com/a", "https://v.example.com/b"],
        )
        .await;
        let user = UserId::random();

        service.record_content_view(user, lesson.id()).await.unwrap();
        service
            .record_video_watched(user, lesson.id(), "https://v.example.com/a")
            .await
            .unwrap();
        let again = service
            .record_video_watched(user, lesson.id(), "https://v.example.com/a")
            .await
            .unwrap();
        assert!(again.is_unchanged());

        let stored = service.progress_for(user, lesson.id()).await.unwrap().unwrap();
        assert_eq!(stored.completion_percentage(), 45);
    }

    #[tokio::test]
    async fn unknown_video_is_rejected_without_writing() {
        let repo = InMemoryRepository::new();
        let service = service(&repo);
        let lesson = lesson_with_videos(&repo, &["https://v.example.com/a"]).await;
        let user = UserId::random();

        let err = service
            .record_video_watched(user, lesson.id(), "https://v.example.com/zzz")
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::UnknownVideo { .. }));
        assert!(service.progress_for(user, lesson.id()).await.unwrap().is_none());

        let err = service
            .record_video_watched(user, LessonId::random(), "https://v.example.com/a")
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::UnknownLesson(_)));
    }
}
