use std::sync::Arc;

use learn_core::model::{MilestoneWeights, ProgressAccrual};
use storage::demo::{SeedSummary, seed_demo_catalog};
use storage::repository::Storage;
use storage::{Change, ChangeFeed};
use tokio::sync::broadcast;

use crate::Clock;
use crate::catalog_service::CatalogService;
use crate::dashboard_service::DashboardService;
use crate::discussion_service::DiscussionService;
use crate::error::AppServicesError;
use crate::profile_service::ProfileService;
use crate::progress_service::ProgressService;
use crate::quiz_service::QuizService;
use crate::tutor_service::TutorService;

/// Assembles app-facing services over one `Storage`.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    catalog: Arc<CatalogService>,
    progress: Arc<ProgressService>,
    quizzes: Arc<QuizService>,
    dashboard: Arc<DashboardService>,
    discussions: Arc<DiscussionService>,
    profiles: Arc<ProfileService>,
    tutor: Arc<TutorService>,
}

impl AppServices {
    #[must_use]
    pub fn new(
        storage: Storage,
        clock: Clock,
        weights: MilestoneWeights,
        tutor: TutorService,
    ) -> Self {
        let progress = Arc::new(ProgressService::new(
            clock,
            ProgressAccrual::new(weights),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.progress),
        ));
        let quizzes = Arc::new(QuizService::new(
            clock,
            Arc::clone(&storage.quizzes),
            Arc::clone(&progress),
        ));
        let catalog = Arc::new(CatalogService::new(
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.progress),
        ));
        let dashboard = Arc::new(DashboardService::new(
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.progress),
        ));
        let discussions = Arc::new(DiscussionService::new(
            clock,
            Arc::clone(&storage.discussions),
            Arc::clone(&storage.profiles),
        ));
        let profiles = Arc::new(ProfileService::new(clock, Arc::clone(&storage.profiles)));

        Self {
            storage,
            catalog,
            progress,
            quizzes,
            dashboard,
            discussions,
            profiles,
            tutor: Arc::new(tutor),
        }
    }

    /// Build services backed by `SQLite` storage, with the tutor configured
    /// from the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        weights: MilestoneWeights,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(storage, clock, weights, TutorService::from_env()))
    }

    /// Upsert the demo catalog.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Seed` if a write fails.
    pub async fn seed_demo(&self) -> Result<SeedSummary, AppServicesError> {
        Ok(seed_demo_catalog(&self.storage).await?)
    }

    #[must_use]
    pub fn changes(&self) -> &ChangeFeed {
        &self.storage.changes
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.storage.changes.subscribe()
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn quizzes(&self) -> Arc<QuizService> {
        Arc::clone(&self.quizzes)
    }

    #[must_use]
    pub fn dashboard(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboard)
    }

    #[must_use]
    pub fn discussions(&self) -> Arc<DiscussionService> {
        Arc::clone(&self.discussions)
    }

    #[must_use]
    pub fn profiles(&self) -> Arc<ProfileService> {
        Arc::clone(&self.profiles)
    }

    #[must_use]
    pub fn tutor(&self) -> Arc<TutorService> {
        Arc::clone(&self.tutor)
    }
}
