use std::sync::Arc;

use learn_core::model::{DashboardStats, Lesson, UserId, next_lesson};
use serde::Serialize;
use storage::Change;
use storage::repository::{LessonRepository, ProgressRepository};
use tokio::sync::{broadcast, mpsc};

use crate::error::DashboardError;
use crate::watch::spawn_refresh_loop;

/// What the dashboard shows for one learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSnapshot {
    pub stats: DashboardStats,
    pub next_lesson: Option<Lesson>,
}

#[derive(Clone)]
pub struct DashboardService {
    lessons: Arc<dyn LessonRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl DashboardService {
    #[must_use]
    pub fn new(lessons: Arc<dyn LessonRepository>, progress: Arc<dyn ProgressRepository>) -> Self {
        Self { lessons, progress }
    }

    /// Load stats and the suggested next lesson for `user`.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Load` if progress or lessons cannot be read.
    pub async fn snapshot(&self, user: UserId) -> Result<DashboardSnapshot, DashboardError> {
        load_snapshot(self.lessons.as_ref(), self.progress.as_ref(), user).await
    }

    /// Deliver a fresh snapshot now and after every change to the user's
    /// progress or the catalog. Dropping the receiver stops the refreshes.
    #[must_use]
    pub fn watch(
        &self,
        user: UserId,
        changes: broadcast::Receiver<Change>,
    ) -> mpsc::Receiver<Result<DashboardSnapshot, DashboardError>> {
        let lessons = Arc::clone(&self.lessons);
        let progress = Arc::clone(&self.progress);
        spawn_refresh_loop(
            changes,
            move |change| {
                *change == Change::Catalog || matches!(change, Change::Progress(u) if *u == user)
            },
            move || {
                let lessons = Arc::clone(&lessons);
                let progress = Arc::clone(&progress);
                async move { load_snapshot(lessons.as_ref(), progress.as_ref(), user).await }
            },
        )
    }
}

async fn load_snapshot(
    lessons: &dyn LessonRepository,
    progress: &dyn ProgressRepository,
    user: UserId,
) -> Result<DashboardSnapshot, DashboardError> {
    let load = |source| DashboardError::Load { user, source };
    let rows = progress.list_progress_for_user(user).await.map_err(load)?;
    let catalog = lessons.list_lessons(None).await.map_err(load)?;
    Ok(DashboardSnapshot {
        stats: DashboardStats::from_progress(&rows),
        next_lesson: next_lesson(&rows, &catalog).cloned(),
    })
}
