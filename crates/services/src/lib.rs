#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog_service;
pub mod dashboard_service;
pub mod discussion_service;
pub mod error;
pub mod profile_service;
pub mod progress_service;
pub mod quiz_service;
pub mod tutor_service;
mod watch;

pub use learn_core::Clock;

pub use app_services::AppServices;
pub use catalog_service::{CatalogService, LessonListing};
pub use dashboard_service::{DashboardService, DashboardSnapshot};
pub use discussion_service::{DiscussionService, ThreadPost};
pub use error::{
    AppServicesError, CatalogError, DashboardError, DiscussionServiceError, ProfileServiceError,
    ProgressServiceError, QuizServiceError, TutorError,
};
pub use profile_service::ProfileService;
pub use progress_service::ProgressService;
pub use quiz_service::{QuizService, QuizSubmission};
pub use tutor_service::{TutorConfig, TutorEvent, TutorReply, TutorService, TutorStream};
