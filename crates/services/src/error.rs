//! Shared error types for the services crate.

use thiserror::Error;

use learn_core::model::{
    DiscussionError, LessonId, ProfileError, ProgressError, QuizError, UserId,
};
use storage::demo::SeedError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("lesson {0} does not exist")]
    UnknownLesson(LessonId),
    #[error("video is not part of lesson {lesson}: {url}")]
    UnknownVideo { lesson: LessonId, url: String },
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("lesson {0} does not exist")]
    LessonNotFound(LessonId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DashboardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DashboardError {
    #[error("could not load dashboard for {user}: {source}")]
    Load {
        user: UserId,
        #[source]
        source: StorageError,
    },
}

/// Errors emitted by `DiscussionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscussionServiceError {
    #[error(transparent)]
    Post(#[from] DiscussionError),
    #[error("reply target does not exist")]
    MissingParent,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProfileService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProfileServiceError {
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `TutorService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TutorError {
    #[error("AI tutor is not configured")]
    Disabled,
    #[error("question cannot be empty")]
    EmptyQuestion,
    #[error("AI tutor request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("AI tutor request failed with status {status}: {message}")]
    Remote {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("AI tutor stream stopped before the answer finished")]
    Interrupted,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Seed(#[from] SeedError),
}
