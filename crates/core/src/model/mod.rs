pub mod chat;
mod dashboard;
mod discussion;
mod ids;
mod lesson;
mod profile;
pub mod progress;
pub mod quiz;
mod weights;

pub use chat::{ChatMessage, ChatRole};
pub use dashboard::{DashboardStats, RECENT_PROGRESS_LIMIT, next_lesson};
pub use discussion::{DiscussionError, DiscussionPost, MAX_POST_CHARS};
pub use ids::{LessonId, ParseIdError, PostId, QuestionId, QuizId, SubjectId, UserId};
pub use lesson::{Difficulty, Lesson, LessonError, Subject, introductory_lesson};
pub use profile::{ANONYMOUS_AUTHOR, MAX_USERNAME_CHARS, Profile, ProfileError, author_name};
pub use progress::{Accrual, ProgressAccrual, ProgressError, ProgressEvent, ProgressRecord};
pub use quiz::{Quiz, QuizAttempt, QuizError, QuizOption, QuizOutcome, QuizQuestion};
pub use weights::{MilestoneWeights, WeightsError};
