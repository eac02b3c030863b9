use learn_core::model::{LessonId, UserId};
use tokio::sync::broadcast;

/// Content-free notice that some stored rows changed.
///
/// Receivers are expected to re-read whatever they display; the notice only
/// says which scope to refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change {
    Progress(UserId),
    Discussion(LessonId),
    /// A learner's profile, and so their author name, changed.
    Profile(UserId),
    Catalog,
}

/// Fan-out of `Change` notices from repositories to interested readers.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ChangeFeed {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a change. Having no subscribers is not an error.
    pub fn publish(&self, change: Change) {
        let _ = self.tx.send(change);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_changes_in_order() {
        let feed = ChangeFeed::default();
        feed.publish(Change::Catalog);

        let mut rx = feed.subscribe();
        let user = UserId::random();
        feed.publish(Change::Progress(user));
        feed.publish(Change::Catalog);

        assert_eq!(rx.recv().await.unwrap(), Change::Progress(user));
        assert_eq!(rx.recv().await.unwrap(), Change::Catalog);
    }
}
