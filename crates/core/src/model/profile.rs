use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;

/// Longest username accepted, in characters.
pub const MAX_USERNAME_CHARS: usize = 50;

/// Shown as the author of posts whose writer has no profile.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("username cannot be empty")]
    EmptyUsername,

    #[error("username is too long ({len} > {max} characters)")]
    UsernameTooLong { len: usize, max: usize },

    #[error("invalid email address: {0}")]
    InvalidEmail(String),
}

/// Public name and contact address of a learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    user_id: UserId,
    username: String,
    email: Option<String>,
    updated_at: DateTime<Utc>,
}

impl Profile {
    /// # Errors
    ///
    /// Returns `ProfileError` for a blank or overlong username, or an email
    /// without a local part and domain.
    pub fn new(
        user_id: UserId,
        username: &str,
        email: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ProfileError> {
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        if let Some(email) = email {
            if email_local_part(email).is_none() {
                return Err(ProfileError::InvalidEmail(email.to_owned()));
            }
        }
        Ok(Self {
            user_id,
            username: validate_username(username)?,
            email: email.map(str::to_owned),
            updated_at,
        })
    }

    /// New profile named after the local part of `email`.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::InvalidEmail` if `email` has no local part or
    /// domain.
    pub fn for_email(
        user_id: UserId,
        email: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ProfileError> {
        let email = email.trim();
        let local = email_local_part(email)
            .ok_or_else(|| ProfileError::InvalidEmail(email.to_owned()))?;
        let username: String = local.chars().take(MAX_USERNAME_CHARS).collect();
        Self::new(user_id, &username, Some(email), updated_at)
    }

    /// Same profile under a new name.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` for a blank or overlong username.
    pub fn renamed(&self, username: &str, at: DateTime<Utc>) -> Result<Self, ProfileError> {
        Ok(Self {
            username: validate_username(username)?,
            updated_at: at,
            ..self.clone()
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Display name for an author, falling back to [`ANONYMOUS_AUTHOR`].
#[must_use]
pub fn author_name(profile: Option<&Profile>) -> &str {
    profile.map_or(ANONYMOUS_AUTHOR, Profile::username)
}

fn validate_username(raw: &str) -> Result<String, ProfileError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(ProfileError::EmptyUsername);
    }
    let len = username.chars().count();
    if len > MAX_USERNAME_CHARS {
        return Err(ProfileError::UsernameTooLong {
            len,
            max: MAX_USERNAME_CHARS,
        });
    }
    Ok(username.to_owned())
}

fn email_local_part(email: &str) -> Option<&str> {
    let (local, domain) = email.split_once('@')?;
    (!local.is_empty() && !domain.is_empty()).then_some(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn email_local_part_becomes_default_username() {
        let profile =
            Profile::for_email(UserId::random(), " ada@example.com ", fixed_now()).unwrap();
        assert_eq!(profile.username(), "ada");
        assert_eq!(profile.email(), Some("ada@example.com"));

        assert!(matches!(
            Profile::for_email(UserId::random(), "@example.com", fixed_now()),
            Err(ProfileError::InvalidEmail(_))
        ));
    }

    #[test]
    fn rename_validates_and_keeps_email() {
        let profile =
            Profile::for_email(UserId::random(), "ada@example.com", fixed_now()).unwrap();
        let renamed = profile.renamed("  Ada L. ", fixed_now()).unwrap();
        assert_eq!(renamed.username(), "Ada L.");
        assert_eq!(renamed.email(), profile.email());

        assert_eq!(
            profile.renamed("   ", fixed_now()),
            Err(ProfileError::EmptyUsername)
        );
        let long = "x".repeat(MAX_USERNAME_CHARS + 1);
        assert!(matches!(
            profile.renamed(&long, fixed_now()),
            Err(ProfileError::UsernameTooLong { .. })
        ));
    }

    #[test]
    fn missing_profile_reads_as_anonymous() {
        assert_eq!(author_name(None), ANONYMOUS_AUTHOR);
        let profile = Profile::new(UserId::random(), "grace", None, fixed_now()).unwrap();
        assert_eq!(author_name(Some(&profile)), "grace");
    }
}
