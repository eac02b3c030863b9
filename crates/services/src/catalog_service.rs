use std::collections::HashMap;
use std::sync::Arc;

use learn_core::model::{Lesson, LessonId, Subject, SubjectId, UserId, introductory_lesson};
use storage::repository::{LessonRepository, ProgressRepository};

use crate::error::CatalogError;

/// A lesson together with the learner's completion for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonListing {
    pub lesson: Lesson,
    pub completion_percentage: u8,
}

/// Read-only access to subjects and lessons.
#[derive(Clone)]
pub struct CatalogService {
    lessons: Arc<dyn LessonRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(lessons: Arc<dyn LessonRepository>, progress: Arc<dyn ProgressRepository>) -> Self {
        Self { lessons, progress }
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if the read fails.
    pub async fn subjects(&self) -> Result<Vec<Subject>, CatalogError> {
        Ok(self.lessons.list_subjects().await?)
    }

    /// Lessons in catalog order, each with `user`'s completion (0 if unstarted).
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if lessons or progress cannot be read.
    pub async fn lessons(
        &self,
        user: UserId,
        subject: Option<SubjectId>,
    ) -> Result<Vec<LessonListing>, CatalogError> {
        let lessons = self.lessons.list_lessons(subject).await?;
        let completion: HashMap<LessonId, u8> = self
            .progress
            .list_progress_for_user(user)
            .await?
            .iter()
            .map(|p| (p.lesson_id(), p.completion_percentage()))
            .collect();

        Ok(lessons
            .into_iter()
            .map(|lesson| LessonListing {
                completion_percentage: completion.get(&lesson.id()).copied().unwrap_or(0),
                lesson,
            })
            .collect())
    }

    /// Fetch one lesson. The introductory lesson is served for its own id even
    /// when the catalog has not been seeded.
    ///
    /// # Errors
    ///
    /// Returns `LessonNotFound` for unknown ids and `Storage` on read failures.
    pub async fn lesson(&self, id: LessonId) -> Result<Lesson, CatalogError> {
        if let Some(lesson) = self.lessons.get_lesson(id).await? {
            return Ok(lesson);
        }
        let intro = introductory_lesson();
        if intro.id() == id {
            return Ok(intro);
        }
        Err(CatalogError::LessonNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use learn_core::model::{Difficulty, ProgressRecord};
    use learn_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn listings_carry_completion() {
        let repo = InMemoryRepository::new();
        let user = UserId::random();
        let mut ids = Vec::new();
        for order in 0..2 {
            let lesson = Lesson::new(
                LessonId::random(),
                None,
                format!("L{order}"),
                "",
                Difficulty::Beginner,
                vec![],
                order,
                &[],
            )
            .unwrap();
            ids.push(lesson.id());
            repo.upsert_lesson(&lesson).await.unwrap();
        }
        let row =
            ProgressRecord::from_persisted(user, ids[1], 60, None, None, fixed_now()).unwrap();
        repo.upsert_progress(&row).await.unwrap();

        let service = CatalogService::new(Arc::new(repo.clone()), Arc::new(repo));
        let listings = service.lessons(user, None).await.unwrap();
        let pcts: Vec<_> = listings.iter().map(|l| l.completion_percentage).collect();
        assert_eq!(pcts, vec![0, 60]);
    }

    #[tokio::test]
    async fn serves_intro_lesson_and_rejects_unknown_ids() {
        let repo = InMemoryRepository::new();
        let service = CatalogService::new(Arc::new(repo.clone()), Arc::new(repo));

        let intro = introductory_lesson();
        assert_eq!(service.lesson(intro.id()).await.unwrap(), intro);
        assert!(matches!(
            service.lesson(LessonId::random()).await,
            Err(CatalogError::LessonNotFound(_))
        ));
    }
}
