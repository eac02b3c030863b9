use std::collections::HashMap;
use std::sync::Arc;

use learn_core::model::{DiscussionPost, LessonId, PostId, UserId, author_name};
use serde::Serialize;
use storage::Change;
use storage::repository::{DiscussionRepository, ProfileRepository, StorageError};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::Clock;
use crate::error::DiscussionServiceError;
use crate::watch::spawn_refresh_loop;

/// A post together with its author's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadPost {
    pub post: DiscussionPost,
    pub author: String,
}

/// Per-lesson comment threads.
#[derive(Clone)]
pub struct DiscussionService {
    clock: Clock,
    discussions: Arc<dyn DiscussionRepository>,
    profiles: Arc<dyn ProfileRepository>,
}

impl DiscussionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        discussions: Arc<dyn DiscussionRepository>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            clock,
            discussions,
            profiles,
        }
    }

    /// Post a comment, or a reply when `parent` is given.
    ///
    /// # Errors
    ///
    /// Returns `Post` for empty or oversized content, `MissingParent` when
    /// replying to an unknown post, and `Storage` on repository failures.
    pub async fn post(
        &self,
        user: UserId,
        lesson: LessonId,
        content: &str,
        parent: Option<PostId>,
    ) -> Result<DiscussionPost, DiscussionServiceError> {
        let post = DiscussionPost::new(
            PostId::random(),
            lesson,
            user,
            parent,
            content,
            self.clock.now(),
        )?;
        match self.discussions.insert_post(&post).await {
            Ok(()) => {}
            Err(StorageError::NotFound) if parent.is_some() => {
                return Err(DiscussionServiceError::MissingParent);
            }
            Err(e) => return Err(e.into()),
        }
        debug!(%lesson, post = %post.id(), reply = post.is_reply(), "discussion post stored");
        Ok(post)
    }

    /// Top-level posts for a lesson, newest first, with author names.
    /// Authors without a profile show as "Anonymous".
    ///
    /// # Errors
    ///
    /// Returns `DiscussionServiceError::Storage` if a read fails.
    pub async fn list(&self, lesson: LessonId) -> Result<Vec<ThreadPost>, DiscussionServiceError> {
        Ok(load_thread(self.discussions.as_ref(), self.profiles.as_ref(), lesson).await?)
    }

    /// Current posts now and after every new post on `lesson` or profile
    /// change.
    #[must_use]
    pub fn watch(
        &self,
        lesson: LessonId,
        changes: broadcast::Receiver<Change>,
    ) -> mpsc::Receiver<Result<Vec<ThreadPost>, DiscussionServiceError>> {
        let discussions = Arc::clone(&self.discussions);
        let profiles = Arc::clone(&self.profiles);
        spawn_refresh_loop(
            changes,
            move |change| {
                *change == Change::Discussion(lesson) || matches!(change, Change::Profile(_))
            },
            move || {
                let discussions = Arc::clone(&discussions);
                let profiles = Arc::clone(&profiles);
                async move {
                    load_thread(discussions.as_ref(), profiles.as_ref(), lesson)
                        .await
                        .map_err(DiscussionServiceError::from)
                }
            },
        )
    }
}

async fn load_thread(
    discussions: &dyn DiscussionRepository,
    profiles: &dyn ProfileRepository,
    lesson: LessonId,
) -> Result<Vec<ThreadPost>, StorageError> {
    let posts = discussions.list_posts(lesson, true).await?;
    let mut authors: HashMap<UserId, String> = HashMap::new();
    let mut thread = Vec::with_capacity(posts.len());
    for post in posts {
        let user = post.user_id();
        let author = match authors.get(&user) {
            Some(name) => name.clone(),
            None => {
                let profile = profiles.get_profile(user).await?;
                let name = author_name(profile.as_ref()).to_owned();
                authors.insert(user, name.clone());
                name
            }
        };
        thread.push(ThreadPost { post, author });
    }
    Ok(thread)
}
