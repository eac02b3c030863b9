use learn_core::model::{Profile, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_profile_row};
use crate::changes::Change;
use crate::repository::{ProfileRepository, StorageError};

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn get_profile(&self, user: UserId) -> Result<Option<Profile>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, username, email, updated_at
            FROM profiles
            WHERE user_id = ?1
            ",
        )
        .bind(user.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_profile_row).transpose()
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO profiles (user_id, username, email, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                email = excluded.email,
                updated_at = excluded.updated_at
            ",
        )
        .bind(profile.user_id().to_string())
        .bind(profile.username())
        .bind(profile.email())
        .bind(profile.updated_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        self.changes.publish(Change::Profile(profile.user_id()));
        Ok(())
    }
}
