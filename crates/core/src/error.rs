use thiserror::Error;

use crate::model::{
    DiscussionError, LessonError, ParseIdError, ProfileError, ProgressError, QuizError,
    WeightsError,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Weights(#[from] WeightsError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Discussion(#[from] DiscussionError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}
