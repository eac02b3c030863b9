use std::sync::Arc;

use learn_core::model::{Accrual, LessonId, QuestionId, Quiz, QuizAttempt, QuizOutcome, UserId};
use storage::repository::QuizRepository;
use tracing::info;

use crate::Clock;
use crate::error::QuizServiceError;
use crate::progress_service::ProgressService;

/// Graded attempt plus what it did to the learner's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSubmission {
    pub outcome: QuizOutcome,
    /// `None` when the attempt ran past its time limit and nothing was
    /// recorded.
    pub progress: Option<Accrual>,
}

#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    quizzes: Arc<dyn QuizRepository>,
    progress: Arc<ProgressService>,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        quizzes: Arc<dyn QuizRepository>,
        progress: Arc<ProgressService>,
    ) -> Self {
        Self {
            clock,
            quizzes,
            progress,
        }
    }

    /// The lesson's quiz, or the built-in question set when it has none.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` if the read fails.
    pub async fn load(&self, lesson: LessonId) -> Result<Quiz, QuizServiceError> {
        Ok(self
            .quizzes
            .get_quiz_for_lesson(lesson)
            .await?
            .unwrap_or_else(|| Quiz::fallback_for(lesson)))
    }

    /// Load the lesson's quiz and start the timer.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` if the read fails.
    pub async fn start(&self, lesson: LessonId) -> Result<QuizAttempt, QuizServiceError> {
        Ok(self.load(lesson).await?.start(self.clock.now()))
    }

    /// Select an answer on a running attempt, using the service clock.
    ///
    /// # Errors
    ///
    /// Returns `Quiz` for unknown questions or labels, or once the attempt is
    /// over.
    pub fn answer(
        &self,
        attempt: &mut QuizAttempt,
        question: QuestionId,
        label: &str,
    ) -> Result<(), QuizServiceError> {
        Ok(attempt.select(question, label, self.clock.now())?)
    }

    /// Grade the attempt and record the score.
    ///
    /// A submission that arrives after the deadline is graded but not
    /// recorded, the same as [`QuizService::time_up`].
    ///
    /// # Errors
    ///
    /// Returns `Quiz` if the attempt was already graded, and `Progress` if the
    /// score cannot be recorded.
    pub async fn submit(
        &self,
        user: UserId,
        attempt: &mut QuizAttempt,
    ) -> Result<QuizSubmission, QuizServiceError> {
        let outcome = attempt.submit(self.clock.now())?;
        let lesson = attempt.quiz().lesson_id();
        if outcome.timed_out {
            info!(%user, %lesson, score = outcome.score, "quiz timed out, score not recorded");
            return Ok(QuizSubmission {
                outcome,
                progress: None,
            });
        }

        let progress = self
            .progress
            .record_quiz_score(user, lesson, outcome.score)
            .await?;
        info!(%user, %lesson, score = outcome.score, "quiz graded");
        Ok(QuizSubmission {
            outcome,
            progress: Some(progress),
        })
    }

    /// Close the attempt because its timer ran out and grade what was
    /// answered. Progress is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `Quiz` if the attempt was already graded.
    pub fn time_up(&self, attempt: &mut QuizAttempt) -> Result<QuizOutcome, QuizServiceError> {
        Ok(attempt.time_up()?)
    }
}
