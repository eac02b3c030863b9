use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{LessonId, PostId, UserId};

/// Longest comment accepted, in characters.
pub const MAX_POST_CHARS: usize = 2_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DiscussionError {
    #[error("comment cannot be empty")]
    Empty,

    #[error("comment is too long ({len} > {max} characters)")]
    TooLong { len: usize, max: usize },
}

/// A comment in a lesson's discussion thread. Replies carry a `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionPost {
    id: PostId,
    lesson_id: LessonId,
    user_id: UserId,
    parent_id: Option<PostId>,
    content: String,
    created_at: DateTime<Utc>,
}

impl DiscussionPost {
    /// # Errors
    ///
    /// Returns `DiscussionError` if the trimmed content is empty or longer
    /// than `MAX_POST_CHARS`.
    pub fn new(
        id: PostId,
        lesson_id: LessonId,
        user_id: UserId,
        parent_id: Option<PostId>,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DiscussionError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DiscussionError::Empty);
        }
        let len = content.chars().count();
        if len > MAX_POST_CHARS {
            return Err(DiscussionError::TooLong {
                len,
                max: MAX_POST_CHARS,
            });
        }
        Ok(Self {
            id,
            lesson_id,
            user_id,
            parent_id,
            content: content.to_owned(),
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> PostId {
        self.id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn parent_id(&self) -> Option<PostId> {
        self.parent_id
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}
