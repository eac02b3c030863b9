use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::ids::{LessonId, QuestionId, QuizId};
use crate::model::progress::round_half_up;

/// Time allowed for a quiz unless it specifies its own limit.
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 10 * 60;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz has no questions")]
    NoQuestions,

    #[error("question text cannot be empty")]
    EmptyQuestion,

    #[error("question needs at least two options")]
    TooFewOptions,

    #[error("correct answer {0} is not one of the options")]
    UnknownCorrectAnswer(String),

    #[error("question {0:?} is not part of this quiz")]
    UnknownQuestion(QuestionId),

    #[error("option {0} does not exist for this question")]
    UnknownOption(String),

    #[error("quiz attempt is already completed")]
    AlreadyCompleted,
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
    pub label: String,
    pub text: String,
}

impl QuizOption {
    #[must_use]
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    id: QuestionId,
    text: String,
    options: Vec<QuizOption>,
    correct_answer: String,
}

impl QuizQuestion {
    /// # Errors
    ///
    /// Returns `QuizError` if the text is blank, there are fewer than two
    /// options, or the correct answer does not match an option label.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        options: Vec<QuizOption>,
        correct_answer: impl Into<String>,
    ) -> Result<Self, QuizError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuizError::EmptyQuestion);
        }
        if options.len() < 2 {
            return Err(QuizError::TooFewOptions);
        }
        let correct_answer = correct_answer.into();
        if !options.iter().any(|o| o.label == correct_answer) {
            return Err(QuizError::UnknownCorrectAnswer(correct_answer));
        }
        Ok(Self {
            id,
            text,
            options,
            correct_answer,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[QuizOption] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    fn has_option(&self, label: &str) -> bool {
        self.options.iter().any(|o| o.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    id: QuizId,
    lesson_id: LessonId,
    title: String,
    time_limit_secs: u32,
    questions: Vec<QuizQuestion>,
}

impl Quiz {
    /// # Errors
    ///
    /// Returns `QuizError::NoQuestions` when `questions` is empty.
    pub fn new(
        id: QuizId,
        lesson_id: LessonId,
        title: impl Into<String>,
        time_limit_secs: Option<u32>,
        questions: Vec<QuizQuestion>,
    ) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        Ok(Self {
            id,
            lesson_id,
            title: title.into(),
            time_limit_secs: time_limit_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_TIME_LIMIT_SECS),
            questions,
        })
    }

    /// Built-in quiz used when a lesson has none of its own.
    #[must_use]
    pub fn fallback_for(lesson_id: LessonId) -> Self {
        Self {
            id: QuizId::new(Uuid::nil()),
            lesson_id,
            title: "Data Structures Basics".into(),
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            questions: fallback_questions(),
        }
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit_secs
    }

    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    /// Begin a timed attempt at `now`.
    #[must_use]
    pub fn start(&self, now: DateTime<Utc>) -> QuizAttempt {
        QuizAttempt {
            quiz: self.clone(),
            answers: HashMap::new(),
            deadline: now + Duration::seconds(i64::from(self.time_limit_secs)),
            completed: false,
            outcome: None,
        }
    }
}

fn fallback_questions() -> Vec<QuizQuestion> {
    let abcd = |texts: [&str; 4]| {
        ["A", "B", "C", "D"]
            .into_iter()
            .zip(texts)
            .map(|(label, text)| QuizOption::new(label, text))
            .collect::<Vec<_>>()
    };
    let question = |n: u128, text: &str, options, correct: &str| QuizQuestion {
        id: QuestionId::new(Uuid::from_u128(n)),
        text: text.into(),
        options,
        correct_answer: correct.into(),
    };
    vec![
        question(
            1,
            "What is the time complexity of binary search?",
            abcd(["O(n)", "O(log n)", "O(n log n)", "O(n²)"]),
            "B",
        ),
        question(
            2,
            "Which data structure uses LIFO principle?",
            abcd(["Queue", "Stack", "Array", "Linked List"]),
            "B",
        ),
        question(
            3,
            "What is the space complexity of a linked list?",
            abcd(["O(1)", "O(log n)", "O(n)", "O(n²)"]),
            "C",
        ),
        question(
            4,
            "Which sorting algorithm has the best average case time complexity?",
            abcd([
                "Bubble Sort - O(n²)",
                "Quick Sort - O(n log n)",
                "Insertion Sort - O(n²)",
                "Selection Sort - O(n²)",
            ]),
            "B",
        ),
    ]
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// Graded result of a finished attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOutcome {
    pub correct: u32,
    pub total: u32,
    /// Percentage score, rounded half up.
    pub score: u8,
    /// True when the attempt ended because the time limit passed.
    pub timed_out: bool,
}

/// A learner's in-progress answers for one quiz.
#[derive(Debug, Clone)]
pub struct QuizAttempt {
    quiz: Quiz,
    answers: HashMap<QuestionId, String>,
    deadline: DateTime<Utc>,
    completed: bool,
    outcome: Option<QuizOutcome>,
}

impl QuizAttempt {
    #[must_use]
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Seconds left before the attempt times out, zero once expired.
    #[must_use]
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.deadline - now).num_seconds().max(0)
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// The graded result, once submitted.
    #[must_use]
    pub fn outcome(&self) -> Option<QuizOutcome> {
        self.outcome
    }

    #[must_use]
    pub fn answer_for(&self, question: QuestionId) -> Option<&str> {
        self.answers.get(&question).map(String::as_str)
    }

    /// Select (or change) the answer for a question.
    ///
    /// Selecting after the deadline completes the attempt instead.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::AlreadyCompleted` once the attempt is over, or
    /// `UnknownQuestion`/`UnknownOption` for labels outside the quiz.
    pub fn select(
        &mut self,
        question: QuestionId,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<(), QuizError> {
        if now >= self.deadline {
            self.completed = true;
        }
        if self.completed {
            return Err(QuizError::AlreadyCompleted);
        }
        let q = self
            .quiz
            .questions
            .iter()
            .find(|q| q.id == question)
            .ok_or(QuizError::UnknownQuestion(question))?;
        if !q.has_option(label) {
            return Err(QuizError::UnknownOption(label.to_owned()));
        }
        self.answers.insert(question, label.to_owned());
        Ok(())
    }

    /// Finish the attempt and grade it. Unanswered questions count as wrong.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::AlreadyCompleted` if the attempt was already
    /// submitted.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<QuizOutcome, QuizError> {
        if self.outcome.is_some() {
            return Err(QuizError::AlreadyCompleted);
        }
        self.completed = true;
        let outcome = self.grade(now >= self.deadline);
        self.outcome = Some(outcome);
        Ok(outcome)
    }

    /// Close the attempt because the timer ran out, grading what was answered.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::AlreadyCompleted` if the attempt was already
    /// graded.
    pub fn time_up(&mut self) -> Result<QuizOutcome, QuizError> {
        if self.outcome.is_some() {
            return Err(QuizError::AlreadyCompleted);
        }
        self.completed = true;
        let outcome = self.grade(true);
        self.outcome = Some(outcome);
        Ok(outcome)
    }

    fn grade(&self, timed_out: bool) -> QuizOutcome {
        let total = u32::try_from(self.quiz.questions.len()).unwrap_or(u32::MAX);
        let correct = self
            .quiz
            .questions
            .iter()
            .filter(|q| self.answer_for(q.id) == Some(q.correct_answer()))
            .count();
        let correct = u32::try_from(correct).unwrap_or(u32::MAX);
        QuizOutcome {
            correct,
            total,
            score: score_percentage(correct, total),
            timed_out,
        }
    }
}

/// `correct / total` as a whole percentage, rounded half up. Zero questions score 0.
#[must_use]
pub fn score_percentage(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = round_half_up(u64::from(correct.min(total)) * 100, u64::from(total));
    u8::try_from(pct).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn quiz() -> Quiz {
        Quiz::fallback_for(LessonId::random())
    }

    #[test]
    fn grades_answers_and_rounds() {
        let quiz = quiz();
        let now = fixed_now();
        let mut attempt = quiz.start(now);
        let qs = quiz.questions();
        attempt.select(qs[0].id(), "B", now).unwrap();
        attempt.select(qs[1].id(), "A", now).unwrap();
        // changing an answer replaces the earlier choice
        attempt.select(qs[1].id(), "B", now).unwrap();
        attempt.select(qs[2].id(), "C", now).unwrap();

        let outcome = attempt.submit(now).unwrap();
        assert_eq!(outcome.correct, 3);
        assert_eq!(outcome.total, 4);
        assert_eq!(outcome.score, 75);
        assert!(!outcome.timed_out);
        assert!(attempt.is_completed());
    }

    #[test]
    fn selections_after_completion_are_rejected() {
        let quiz = quiz();
        let now = fixed_now();
        let mut attempt = quiz.start(now);
        attempt.submit(now).unwrap();
        let err = attempt
            .select(quiz.questions()[0].id(), "B", now)
            .unwrap_err();
        assert_eq!(err, QuizError::AlreadyCompleted);
        assert_eq!(attempt.submit(now).unwrap_err(), QuizError::AlreadyCompleted);
    }

    #[test]
    fn time_up_completes_and_grades_what_was_answered() {
        let quiz = quiz();
        let now = fixed_now();
        let mut attempt = quiz.start(now);
        attempt.select(quiz.questions()[0].id(), "B", now).unwrap();

        let late = now + Duration::seconds(i64::from(DEFAULT_TIME_LIMIT_SECS));
        assert_eq!(attempt.remaining_secs(late), 0);
        assert_eq!(
            attempt.select(quiz.questions()[1].id(), "B", late),
            Err(QuizError::AlreadyCompleted)
        );
        let outcome = attempt.submit(late).unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.score, 25);
        assert_eq!(attempt.outcome(), Some(outcome));
        assert_eq!(attempt.submit(late), Err(QuizError::AlreadyCompleted));
    }

    #[test]
    fn time_up_before_deadline_still_closes_attempt() {
        let quiz = quiz();
        let now = fixed_now();
        let mut attempt = quiz.start(now);
        attempt.select(quiz.questions()[0].id(), "B", now).unwrap();
        let outcome = attempt.time_up().unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.correct, 1);
        assert_eq!(attempt.submit(now), Err(QuizError::AlreadyCompleted));
    }

    #[test]
    fn rejects_unknown_labels_and_questions() {
        let quiz = quiz();
        let now = fixed_now();
        let mut attempt = quiz.start(now);
        assert!(matches!(
            attempt.select(quiz.questions()[0].id(), "E", now),
            Err(QuizError::UnknownOption(_))
        ));
        assert!(matches!(
            attempt.select(QuestionId::random(), "A", now),
            Err(QuizError::UnknownQuestion(_))
        ));
    }

    #[test]
    fn question_validation() {
        let id = QuestionId::random();
        assert_eq!(
            QuizQuestion::new(id, "Q", vec![QuizOption::new("A", "x")], "A"),
            Err(QuizError::TooFewOptions)
        );
        assert_eq!(
            QuizQuestion::new(
                id,
                "Q",
                vec![QuizOption::new("A", "x"), QuizOption::new("B", "y")],
                "C"
            ),
            Err(QuizError::UnknownCorrectAnswer("C".into()))
        );
        assert_eq!(
            Quiz::new(QuizId::random(), LessonId::random(), "t", None, vec![]),
            Err(QuizError::NoQuestions)
        );
    }

    #[test]
    fn score_percentage_rounding() {
        assert_eq!(score_percentage(1, 3), 33);
        assert_eq!(score_percentage(2, 3), 67);
        assert_eq!(score_percentage(1, 8), 13);
        assert_eq!(score_percentage(0, 0), 0);
    }
}
