use std::sync::Arc;

use learn_core::model::{Profile, UserId};
use storage::repository::ProfileRepository;
use tracing::info;

use crate::Clock;
use crate::error::ProfileServiceError;

/// Usernames and contact emails.
#[derive(Clone)]
pub struct ProfileService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
}

impl ProfileService {
    #[must_use]
    pub fn new(clock: Clock, profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { clock, profiles }
    }

    /// # Errors
    ///
    /// Returns `ProfileServiceError::Storage` if the read fails.
    pub async fn get(&self, user: UserId) -> Result<Option<Profile>, ProfileServiceError> {
        Ok(self.profiles.get_profile(user).await?)
    }

    /// Attach `email` to the user's profile. A new profile takes the email's
    /// local part as its username; an existing one keeps its name.
    ///
    /// # Errors
    ///
    /// Returns `Profile` for an invalid email and `Storage` on repository
    /// failures.
    pub async fn register(
        &self,
        user: UserId,
        email: &str,
    ) -> Result<Profile, ProfileServiceError> {
        let now = self.clock.now();
        let profile = match self.profiles.get_profile(user).await? {
            Some(existing) => Profile::new(user, existing.username(), Some(email), now)?,
            None => Profile::for_email(user, email, now)?,
        };
        self.profiles.upsert_profile(&profile).await?;
        info!(%user, username = profile.username(), "profile registered");
        Ok(profile)
    }

    /// Rename the user, creating a profile without email if none exists.
    ///
    /// # Errors
    ///
    /// Returns `Profile` for a blank or overlong username and `Storage` on
    /// repository failures.
    pub async fn update_username(
        &self,
        user: UserId,
        username: &str,
    ) -> Result<Profile, ProfileServiceError> {
        let now = self.clock.now();
        let profile = match self.profiles.get_profile(user).await? {
            Some(existing) => existing.renamed(username, now)?,
            None => Profile::new(user, username, None, now)?,
        };
        self.profiles.upsert_profile(&profile).await?;
        info!(%user, username = profile.username(), "username updated");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use learn_core::model::ProfileError;
    use learn_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn service() -> ProfileService {
        ProfileService::new(
            Clock::fixed(fixed_now()),
            Arc::new(InMemoryRepository::new()),
        )
    }

    #[tokio::test]
    async fn register_defaults_username_to_email_local_part() {
        let profiles = service();
        let user = UserId::random();
        assert!(profiles.get(user).await.unwrap().is_none());

        let profile = profiles.register(user, "lin@example.org").await.unwrap();
        assert_eq!(profile.username(), "lin");

        profiles.update_username(user, "Lin Q").await.unwrap();
        let again = profiles.register(user, "lin@work.example").await.unwrap();
        assert_eq!(again.username(), "Lin Q");
        assert_eq!(again.email(), Some("lin@work.example"));
        assert_eq!(profiles.get(user).await.unwrap(), Some(again));
    }

    #[tokio::test]
    async fn update_username_creates_missing_profile_and_validates() {
        let profiles = service();
        let user = UserId::random();

        let created = profiles.update_username(user, " kim ").await.unwrap();
        assert_eq!(created.username(), "kim");
        assert_eq!(created.email(), None);

        let err = profiles.update_username(user, "").await.unwrap_err();
        assert!(matches!(
            err,
            ProfileServiceError::Profile(ProfileError::EmptyUsername)
        ));
        let stored = profiles.get(user).await.unwrap().unwrap();
        assert_eq!(stored.username(), "kim");
    }
}
