use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learn_core::model::{
    DiscussionPost, Lesson, LessonId, Profile, ProgressRecord, Quiz, Subject, SubjectId, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::changes::{Change, ChangeFeed};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Subjects and lessons, in catalog order.
#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Persist or update a subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the subject cannot be stored.
    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StorageError>;

    /// List subjects by name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError>;

    /// Persist or update a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lesson cannot be stored.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// Fetch a lesson by id; `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// Lessons ordered by `order_index`, optionally limited to one subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_lessons(&self, subject: Option<SubjectId>) -> Result<Vec<Lesson>, StorageError>;
}

/// Per-user, per-lesson progress rows.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the row for `(user, lesson)`.
    ///
    /// `Ok(None)` means the row does not exist. Any `Err` is a real failure and
    /// must not be read as "no progress yet".
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    /// Insert or update the row keyed by `(user, lesson)`.
    ///
    /// The stored percentage never goes down: a concurrent writer holding a
    /// stale read cannot lower what another writer already stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError>;

    /// All rows for a user, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_progress_for_user(&self, user: UserId)
    -> Result<Vec<ProgressRecord>, StorageError>;

    /// Remember that `user` watched `video_url` in `lesson` and return how many
    /// distinct videos of that lesson they have watched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the view cannot be recorded.
    async fn record_video_view(
        &self,
        user: UserId,
        lesson: LessonId,
        video_url: &str,
        watched_at: DateTime<Utc>,
    ) -> Result<u32, StorageError>;
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Persist or replace a quiz together with its questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the quiz cannot be stored.
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError>;

    /// The quiz attached to a lesson, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_quiz_for_lesson(&self, lesson: LessonId) -> Result<Option<Quiz>, StorageError>;
}

#[async_trait]
pub trait DiscussionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the post cannot be stored.
    async fn insert_post(&self, post: &DiscussionPost) -> Result<(), StorageError>;

    /// Posts for a lesson, newest first. `top_level_only` skips replies.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_posts(
        &self,
        lesson: LessonId,
        top_level_only: bool,
    ) -> Result<Vec<DiscussionPost>, StorageError>;
}

/// Learner profiles keyed by user.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// `Ok(None)` when the user has no profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_profile(&self, user: UserId) -> Result<Option<Profile>, StorageError>;

    /// Insert or replace the profile for `profile.user_id()`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError>;
}

/// Keep whichever of two writes shows more progress, taking the newer
/// score and timestamp from the incoming row.
pub(crate) fn merge_progress(
    stored: Option<&ProgressRecord>,
    incoming: &ProgressRecord,
) -> Result<ProgressRecord, StorageError> {
    let Some(stored) = stored else {
        return Ok(incoming.clone());
    };
    let percentage = stored
        .completion_percentage()
        .max(incoming.completion_percentage());
    let completed_at = stored.completed_at().or(incoming.completed_at());
    ProgressRecord::from_persisted(
        incoming.user_id(),
        incoming.lesson_id(),
        percentage,
        incoming.quiz_score(),
        completed_at,
        incoming.updated_at(),
    )
    .map_err(|e| StorageError::Serialization(e.to_string()))
}

#[derive(Default)]
struct MemoryState {
    subjects: HashMap<SubjectId, Subject>,
    lessons: HashMap<LessonId, Lesson>,
    progress: HashMap<(UserId, LessonId), ProgressRecord>,
    video_views: HashMap<(UserId, LessonId), HashSet<String>>,
    quizzes: HashMap<LessonId, Quiz>,
    posts: Vec<DiscussionPost>,
    profiles: HashMap<UserId, Profile>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
    changes: ChangeFeed,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing change feed instead of creating a private one.
    #[must_use]
    pub fn with_changes(changes: ChangeFeed) -> Self {
        Self {
            state: Arc::default(),
            changes,
        }
    }

    #[must_use]
    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StorageError> {
        self.lock()?.subjects.insert(subject.id(), subject.clone());
        self.changes.publish(Change::Catalog);
        Ok(())
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let mut subjects: Vec<_> = self.lock()?.subjects.values().cloned().collect();
        subjects.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(subjects)
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        self.lock()?.lessons.insert(lesson.id(), lesson.clone());
        self.changes.publish(Change::Catalog);
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        Ok(self.lock()?.lessons.get(&id).cloned())
    }

    async fn list_lessons(&self, subject: Option<SubjectId>) -> Result<Vec<Lesson>, StorageError> {
        let mut lessons: Vec<_> = self
            .lock()?
            .lessons
            .values()
            .filter(|l| subject.is_none() || l.subject_id() == subject)
            .cloned()
            .collect();
        lessons.sort_by(|a, b| {
            a.order_index()
                .cmp(&b.order_index())
                .then_with(|| a.title().cmp(b.title()))
        });
        Ok(lessons)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        Ok(self.lock()?.progress.get(&(user, lesson)).cloned())
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        {
            let mut guard = self.lock()?;
            let key = (record.user_id(), record.lesson_id());
            let merged = merge_progress(guard.progress.get(&key), record)?;
            guard.progress.insert(key, merged);
        }
        self.changes.publish(Change::Progress(record.user_id()));
        Ok(())
    }

    async fn list_progress_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let mut rows: Vec<_> = self
            .lock()?
            .progress
            .values()
            .filter(|p| p.user_id() == user)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at().cmp(&a.updated_at()));
        Ok(rows)
    }

    async fn record_video_view(
        &self,
        user: UserId,
        lesson: LessonId,
        video_url: &str,
        _watched_at: DateTime<Utc>,
    ) -> Result<u32, StorageError> {
        let mut guard = self.lock()?;
        let seen = guard.video_views.entry((user, lesson)).or_default();
        seen.insert(video_url.to_owned());
        u32::try_from(seen.len()).map_err(|_| StorageError::Serialization("view count".into()))
    }
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        self.lock()?.quizzes.insert(quiz.lesson_id(), quiz.clone());
        self.changes.publish(Change::Catalog);
        Ok(())
    }

    async fn get_quiz_for_lesson(&self, lesson: LessonId) -> Result<Option<Quiz>, StorageError> {
        Ok(self.lock()?.quizzes.get(&lesson).cloned())
    }
}

#[async_trait]
impl DiscussionRepository for InMemoryRepository {
    async fn insert_post(&self, post: &DiscussionPost) -> Result<(), StorageError> {
        {
            let mut guard = self.lock()?;
            if guard.posts.iter().any(|p| p.id() == post.id()) {
                return Err(StorageError::Conflict);
            }
            if let Some(parent) = post.parent_id() {
                if !guard.posts.iter().any(|p| p.id() == parent) {
                    return Err(StorageError::NotFound);
                }
            }
            guard.posts.push(post.clone());
        }
        self.changes.publish(Change::Discussion(post.lesson_id()));
        Ok(())
    }

    async fn list_posts(
        &self,
        lesson: LessonId,
        top_level_only: bool,
    ) -> Result<Vec<DiscussionPost>, StorageError> {
        let mut posts: Vec<_> = self
            .lock()?
            .posts
            .iter()
            .filter(|p| p.lesson_id() == lesson && !(top_level_only && p.is_reply()))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(posts)
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_profile(&self, user: UserId) -> Result<Option<Profile>, StorageError> {
        Ok(self.lock()?.profiles.get(&user).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        self.lock()?
            .profiles
            .insert(profile.user_id(), profile.clone());
        self.changes.publish(Change::Profile(profile.user_id()));
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub lessons: Arc<dyn LessonRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub quizzes: Arc<dyn QuizRepository>,
    pub discussions: Arc<dyn DiscussionRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub changes: ChangeFeed,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let changes = repo.changes().clone();
        Self {
            lessons: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            quizzes: Arc::new(repo.clone()),
            discussions: Arc::new(repo.clone()),
            profiles: Arc::new(repo),
            changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use learn_core::model::{Difficulty, PostId};
    use learn_core::time::fixed_now;

    fn lesson(order: i32, subject: Option<SubjectId>) -> Lesson {
        Lesson::new(
            LessonId::random(),
            subject,
            format!("Lesson {order}"),
            "body",
            Difficulty::Beginner,
            vec![],
            order,
            &[],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn lessons_come_back_in_order_and_filtered() {
        let repo = InMemoryRepository::new();
        let subject = SubjectId::random();
        for (order, subj) in [(3, Some(subject)), (1, Some(subject)), (2, None)] {
            repo.upsert_lesson(&lesson(order, subj)).await.unwrap();
        }

        let all = repo.list_lessons(None).await.unwrap();
        let orders: Vec<_> = all.iter().map(Lesson::order_index).collect();
        assert_eq!(orders, [1, 2, 3]);

        let only = repo.list_lessons(Some(subject)).await.unwrap();
        assert_eq!(only.len(), 2);
    }

    #[tokio::test]
    async fn upsert_never_lowers_percentage() {
        let repo = InMemoryRepository::new();
        let (user, lesson) = (UserId::random(), LessonId::random());
        let now = fixed_now();
        let high = ProgressRecord::from_persisted(user, lesson, 60, None, None, now).unwrap();
        repo.upsert_progress(&high).await.unwrap();

        let later = now + Duration::minutes(1);
        let stale = ProgressRecord::from_persisted(user, lesson, 45, None, None, later).unwrap();
        repo.upsert_progress(&stale).await.unwrap();

        let stored = repo.get_progress(user, lesson).await.unwrap().unwrap();
        assert_eq!(stored.completion_percentage(), 60);
        assert_eq!(stored.updated_at(), later);
    }

    #[tokio::test]
    async fn progress_writes_publish_changes() {
        let repo = InMemoryRepository::new();
        let mut rx = repo.changes().subscribe();
        let (user, lesson) = (UserId::random(), LessonId::random());
        let record =
            ProgressRecord::from_persisted(user, lesson, 30, None, None, fixed_now()).unwrap();
        repo.upsert_progress(&record).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Change::Progress(user));
    }

    #[tokio::test]
    async fn video_views_are_distinct() {
        let repo = InMemoryRepository::new();
        let (user, lesson) = (UserId::random(), LessonId::random());
        let now = fixed_now();
        assert_eq!(repo.record_video_view(user, lesson, "a", now).await.unwrap(), 1);
        assert_eq!(repo.record_video_view(user, lesson, "a", now).await.unwrap(), 1);
        assert_eq!(repo.record_video_view(user, lesson, "b", now).await.unwrap(), 2);
        let other = UserId::random();
        assert_eq!(repo.record_video_view(other, lesson, "a", now).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn replies_need_an_existing_parent() {
        let repo = InMemoryRepository::new();
        let lesson = LessonId::random();
        let orphan = DiscussionPost::new(
            PostId::random(),
            lesson,
            UserId::random(),
            Some(PostId::random()),
            "reply",
            fixed_now(),
        )
        .unwrap();
        assert!(matches!(
            repo.insert_post(&orphan).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn profiles_are_replaced_per_user() {
        let repo = InMemoryRepository::new();
        let mut rx = repo.changes().subscribe();
        let user = UserId::random();
        assert!(repo.get_profile(user).await.unwrap().is_none());

        let profile = Profile::for_email(user, "ada@example.com", fixed_now()).unwrap();
        repo.upsert_profile(&profile).await.unwrap();
        let renamed = profile.renamed("Ada", fixed_now()).unwrap();
        repo.upsert_profile(&renamed).await.unwrap();

        assert_eq!(repo.get_profile(user).await.unwrap(), Some(renamed));
        assert_eq!(rx.recv().await.unwrap(), Change::Profile(user));
    }
}
