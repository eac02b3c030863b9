use learn_core::model::{LessonId, Quiz, QuizId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_question_row, ser};
use crate::changes::Change;
use crate::repository::{QuizRepository, StorageError};

#[async_trait::async_trait]
impl QuizRepository for SqliteRepository {
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        // One quiz per lesson: replacing it drops the previous questions too.
        sqlx::query("DELETE FROM quizzes WHERE lesson_id = ?1 OR id = ?2")
            .bind(quiz.lesson_id().to_string())
            .bind(quiz.id().to_string())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO quizzes (id, lesson_id, title, time_limit_secs)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(quiz.id().to_string())
        .bind(quiz.lesson_id().to_string())
        .bind(quiz.title())
        .bind(i64::from(quiz.time_limit_secs()))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        for (position, question) in quiz.questions().iter().enumerate() {
            let options = serde_json::to_string(question.options()).map_err(ser)?;
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("question position overflow".into()))?;
            sqlx::query(
                r"
                INSERT INTO quiz_questions (id, quiz_id, position, text, options, correct_answer)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(question.id().to_string())
            .bind(quiz.id().to_string())
            .bind(position)
            .bind(question.text())
            .bind(options)
            .bind(question.correct_answer())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        self.changes.publish(Change::Catalog);
        Ok(())
    }

    async fn get_quiz_for_lesson(&self, lesson: LessonId) -> Result<Option<Quiz>, StorageError> {
        let Some(row) = sqlx::query(
            r"
            SELECT id, title, time_limit_secs
            FROM quizzes
            WHERE lesson_id = ?1
            ",
        )
        .bind(lesson.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        else {
            return Ok(None);
        };

        let id: QuizId = row
            .try_get::<String, _>("id")
            .map_err(ser)?
            .parse()
            .map_err(ser)?;
        let title: String = row.try_get("title").map_err(ser)?;
        let time_limit: i64 = row.try_get("time_limit_secs").map_err(ser)?;
        let time_limit = u32::try_from(time_limit)
            .map_err(|_| StorageError::Serialization(format!("invalid time limit: {time_limit}")))?;

        let question_rows = sqlx::query(
            r"
            SELECT id, text, options, correct_answer
            FROM quiz_questions
            WHERE quiz_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let questions = question_rows
            .iter()
            .map(map_question_row)
            .collect::<Result<Vec<_>, _>>()?;

        Quiz::new(id, lesson, title, Some(time_limit), questions)
            .map(Some)
            .map_err(ser)
    }
}
