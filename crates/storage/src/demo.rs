//! Demo catalog used by the `seed` binary and the CLI `seed` command.
//!
//! Ids are fixed so seeding twice updates rows instead of duplicating them.

use learn_core::model::{
    Difficulty, Lesson, LessonError, LessonId, QuestionId, Quiz, QuizError, QuizId, QuizOption,
    QuizQuestion, Subject, SubjectId, introductory_lesson,
};
use thiserror::Error;
use uuid::Uuid;

use crate::repository::{Storage, StorageError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SeedError {
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Counts of what a seeding run wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub subjects: usize,
    pub lessons: usize,
    pub quizzes: usize,
}

const SUBJECTS: &[(u128, &str, &str, &str)] = &[
    (
        0x10,
        "Data Structures & Algorithms",
        "Learn DSA concepts from basics to advanced",
        "code",
    ),
    (
        0x11,
        "Mathematics",
        "Master mathematical concepts and problem solving",
        "calculator",
    ),
    (
        0x12,
        "Physics",
        "Explore the laws of nature and physical phenomena",
        "atom",
    ),
    (
        0x13,
        "Chemistry",
        "Understand chemical reactions and molecular structures",
        "flask",
    ),
    (
        0x14,
        "Programming",
        "Learn various programming languages and paradigms",
        "terminal",
    ),
];

#[must_use]
pub fn dsa_subject_id() -> SubjectId {
    SubjectId::new(Uuid::from_u128(0x10))
}

fn demo_lessons() -> Result<Vec<Lesson>, LessonError> {
    let dsa = Some(dsa_subject_id());
    Ok(vec![
        introductory_lesson(),
        Lesson::new(
            LessonId::new(Uuid::from_u128(0x20)),
            dsa,
            "Arrays and Linked Lists",
            "Arrays give constant-time indexing over contiguous memory. Linked lists \
             trade indexing for cheap insertion and removal at known positions.",
            Difficulty::Beginner,
            vec!["arrays".into(), "lists".into()],
            1,
            &[
                "https://www.youtube.com/watch?v=55l-aZ7_F24",
                "https://www.youtube.com/watch?v=R9PTBwOzceo",
            ],
        )?,
        Lesson::new(
            LessonId::new(Uuid::from_u128(0x21)),
            dsa,
            "Stacks and Queues",
            "A stack is last-in first-out; a queue is first-in first-out. Both are \
             usually built on top of arrays or linked lists.",
            Difficulty::Beginner,
            vec!["stack".into(), "queue".into()],
            2,
            &["https://www.youtube.com/watch?v=wjI1WNcIntg"],
        )?,
        Lesson::new(
            LessonId::new(Uuid::from_u128(0x22)),
            dsa,
            "Binary Search",
            "Binary search halves a sorted range on every comparison, finding a key \
             in O(log n) steps.",
            Difficulty::Intermediate,
            vec!["search".into()],
            3,
            &[],
        )?,
    ])
}

fn demo_quiz() -> Result<Quiz, QuizError> {
    let options = |pairs: &[(&str, &str)]| -> Vec<QuizOption> {
        pairs.iter().map(|(l, t)| QuizOption::new(*l, *t)).collect()
    };
    Quiz::new(
        QuizId::new(Uuid::from_u128(0x30)),
        LessonId::new(Uuid::from_u128(0x20)),
        "Arrays and Linked Lists",
        Some(300),
        vec![
            QuizQuestion::new(
                QuestionId::new(Uuid::from_u128(0x31)),
                "What is the cost of reading arr[i] in an array?",
                options(&[("A", "O(1)"), ("B", "O(n)"), ("C", "O(log n)")]),
                "A",
            )?,
            QuizQuestion::new(
                QuestionId::new(Uuid::from_u128(0x32)),
                "Which structure inserts at the head in O(1)?",
                options(&[("A", "Array"), ("B", "Singly linked list"), ("C", "Sorted array")]),
                "B",
            )?,
        ],
    )
}

/// Upsert the demo subjects, lessons and quiz.
///
/// # Errors
///
/// Returns `SeedError` if the demo data is invalid or a write fails.
pub async fn seed_demo_catalog(storage: &Storage) -> Result<SeedSummary, SeedError> {
    for (id, name, description, icon) in SUBJECTS {
        let subject = Subject::new(
            SubjectId::new(Uuid::from_u128(*id)),
            *name,
            Some((*description).to_owned()),
            Some((*icon).to_owned()),
        )?;
        storage.lessons.upsert_subject(&subject).await?;
    }

    let lessons = demo_lessons()?;
    for lesson in &lessons {
        storage.lessons.upsert_lesson(lesson).await?;
    }

    storage.quizzes.upsert_quiz(&demo_quiz()?).await?;

    Ok(SeedSummary {
        subjects: SUBJECTS.len(),
        lessons: lessons.len(),
        quizzes: 1,
    })
}
