use std::str::FromStr;

use chrono::{DateTime, Utc};
use learn_core::model::{
    Difficulty, DiscussionPost, Lesson, LessonId, PostId, Profile, ProgressRecord, QuestionId,
    QuizOption, QuizQuestion, Subject, SubjectId, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn parse_id<T>(row: &SqliteRow, column: &str) -> Result<T, StorageError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    row.try_get::<String, _>(column)
        .map_err(ser)?
        .parse()
        .map_err(ser)
}

fn parse_opt_id<T>(row: &SqliteRow, column: &str) -> Result<Option<T>, StorageError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    row.try_get::<Option<String>, _>(column)
        .map_err(ser)?
        .map(|raw| raw.parse().map_err(ser))
        .transpose()
}

fn percent(column: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {column}: {v}")))
}

pub(crate) fn map_subject_row(row: &SqliteRow) -> Result<Subject, StorageError> {
    Subject::new(
        parse_id::<SubjectId>(row, "id")?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get("description").map_err(ser)?,
        row.try_get("icon").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let difficulty: String = row.try_get("difficulty").map_err(ser)?;
    let tags: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("tags").map_err(ser)?).map_err(ser)?;
    let videos: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("videos").map_err(ser)?).map_err(ser)?;
    let videos: Vec<&str> = videos.iter().map(String::as_str).collect();

    Lesson::new(
        parse_id::<LessonId>(row, "id")?,
        parse_opt_id::<SubjectId>(row, "subject_id")?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<String, _>("content").map_err(ser)?,
        Difficulty::from_str(&difficulty).map_err(ser)?,
        tags,
        row.try_get("order_index").map_err(ser)?,
        &videos,
    )
    .map_err(ser)
}

pub(crate) fn lesson_tags_json(lesson: &Lesson) -> Result<String, StorageError> {
    serde_json::to_string(lesson.tags()).map_err(ser)
}

pub(crate) fn lesson_videos_json(lesson: &Lesson) -> Result<String, StorageError> {
    let videos: Vec<&str> = lesson.videos().iter().map(|u| u.as_str()).collect();
    serde_json::to_string(&videos).map_err(ser)
}

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<QuizQuestion, StorageError> {
    let options: Vec<QuizOption> =
        serde_json::from_str(&row.try_get::<String, _>("options").map_err(ser)?).map_err(ser)?;
    QuizQuestion::new(
        parse_id::<QuestionId>(row, "id")?,
        row.try_get::<String, _>("text").map_err(ser)?,
        options,
        row.try_get::<String, _>("correct_answer").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    let completion: i64 = row.try_get("completion_percentage").map_err(ser)?;
    let quiz_score = row
        .try_get::<Option<i64>, _>("quiz_score")
        .map_err(ser)?
        .map(|v| percent("quiz_score", v))
        .transpose()?;
    let completed_at: Option<DateTime<Utc>> = row.try_get("completed_at").map_err(ser)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(ser)?;

    ProgressRecord::from_persisted(
        parse_id::<UserId>(row, "user_id")?,
        parse_id::<LessonId>(row, "lesson_id")?,
        percent("completion_percentage", completion)?,
        quiz_score,
        completed_at,
        updated_at,
    )
    .map_err(ser)
}

pub(crate) fn map_post_row(row: &SqliteRow) -> Result<DiscussionPost, StorageError> {
    let content: String = row.try_get("content").map_err(ser)?;
    DiscussionPost::new(
        parse_id::<PostId>(row, "id")?,
        parse_id::<LessonId>(row, "lesson_id")?,
        parse_id::<UserId>(row, "user_id")?,
        parse_opt_id::<PostId>(row, "parent_id")?,
        &content,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_profile_row(row: &SqliteRow) -> Result<Profile, StorageError> {
    let username: String = row.try_get("username").map_err(ser)?;
    let email: Option<String> = row.try_get("email").map_err(ser)?;
    Profile::new(
        parse_id::<UserId>(row, "user_id")?,
        &username,
        email.as_deref(),
        row.try_get("updated_at").map_err(ser)?,
    )
    .map_err(ser)
}
