use learn_core::model::{Lesson, LessonId, Subject, SubjectId};

use super::SqliteRepository;
use super::mapping::{conn, lesson_tags_json, lesson_videos_json, map_lesson_row, map_subject_row};
use crate::changes::Change;
use crate::repository::{LessonRepository, StorageError};

#[async_trait::async_trait]
impl LessonRepository for SqliteRepository {
    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO subjects (id, name, description, icon)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                icon = excluded.icon
            ",
        )
        .bind(subject.id().to_string())
        .bind(subject.name())
        .bind(subject.description())
        .bind(subject.icon())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        self.changes.publish(Change::Catalog);
        Ok(())
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, description, icon
            FROM subjects
            ORDER BY name ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_subject_row).collect()
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let tags = lesson_tags_json(lesson)?;
        let videos = lesson_videos_json(lesson)?;

        sqlx::query(
            r"
            INSERT INTO lessons (id, subject_id, title, content, difficulty, tags, order_index, videos)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                subject_id = excluded.subject_id,
                title = excluded.title,
                content = excluded.content,
                difficulty = excluded.difficulty,
                tags = excluded.tags,
                order_index = excluded.order_index,
                videos = excluded.videos
            ",
        )
        .bind(lesson.id().to_string())
        .bind(lesson.subject_id().map(|s| s.to_string()))
        .bind(lesson.title())
        .bind(lesson.content())
        .bind(lesson.difficulty().as_str())
        .bind(tags)
        .bind(lesson.order_index())
        .bind(videos)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        self.changes.publish(Change::Catalog);
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, subject_id, title, content, difficulty, tags, order_index, videos
            FROM lessons
            WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_lesson_row).transpose()
    }

    async fn list_lessons(&self, subject: Option<SubjectId>) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, subject_id, title, content, difficulty, tags, order_index, videos
            FROM lessons
            WHERE ?1 IS NULL OR subject_id = ?1
            ORDER BY order_index ASC, title ASC
            ",
        )
        .bind(subject.map(|s| s.to_string()))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_lesson_row).collect()
    }
}
