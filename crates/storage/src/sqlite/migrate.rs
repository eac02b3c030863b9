use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS subjects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            icon TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lessons (
            id TEXT PRIMARY KEY,
            subject_id TEXT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            tags TEXT NOT NULL,
            order_index INTEGER NOT NULL,
            videos TEXT NOT NULL,
            FOREIGN KEY (subject_id) REFERENCES subjects(id) ON DELETE SET NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS quizzes (
            id TEXT PRIMARY KEY,
            lesson_id TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            time_limit_secs INTEGER NOT NULL CHECK (time_limit_secs > 0),
            FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS quiz_questions (
            id TEXT NOT NULL,
            quiz_id TEXT NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            text TEXT NOT NULL,
            options TEXT NOT NULL,
            correct_answer TEXT NOT NULL,
            PRIMARY KEY (quiz_id, id),
            FOREIGN KEY (quiz_id) REFERENCES quizzes(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS progress (
            user_id TEXT NOT NULL,
            lesson_id TEXT NOT NULL,
            completion_percentage INTEGER NOT NULL
                CHECK (completion_percentage BETWEEN 0 AND 100),
            quiz_score INTEGER CHECK (quiz_score BETWEEN 0 AND 100),
            completed_at TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, lesson_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS video_views (
            user_id TEXT NOT NULL,
            lesson_id TEXT NOT NULL,
            video_url TEXT NOT NULL,
            watched_at TEXT NOT NULL,
            PRIMARY KEY (user_id, lesson_id, video_url)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS discussion_posts (
            id TEXT PRIMARY KEY,
            lesson_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            parent_id TEXT,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (parent_id) REFERENCES discussion_posts(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_lessons_subject_order
            ON lessons (subject_id, order_index);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_progress_user_updated
            ON progress (user_id, updated_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_discussion_posts_lesson_created
            ON discussion_posts (lesson_id, created_at);
    ",
];

const SCHEMA_V2: &[&str] = &[r"
        CREATE TABLE IF NOT EXISTS profiles (
            user_id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            email TEXT,
            updated_at TEXT NOT NULL
        );
    "];

/// Applies every schema version that has not been recorded yet.
///
/// Version 1 creates the catalog (subjects, lessons, quizzes), per-user
/// progress with video views, and discussion threads. Version 2 adds
/// learner profiles.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    for (version, statements) in [(1_i64, SCHEMA_V1), (2, SCHEMA_V2)] {
        if is_applied(pool, version).await? {
            continue;
        }
        let mut tx = pool.begin().await?;

        for statement in statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
