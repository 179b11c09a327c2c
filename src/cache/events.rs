//! Mutation events and the queue they wait in until consumed.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::gauge;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::keys::Tag;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";
const METRIC_QUEUE_LEN: &str = "folio_cache_event_queue_len";

/// Monotonic sequence number assigned on publish.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// A successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    PostCreated { post_id: String },
    PostUpdated { post_id: String },
    PostDeleted { post_id: String },
    CommentCreated { post_id: String, comment_id: String },
    CommentDeleted { post_id: String, comment_id: String },
}

impl EventKind {
    /// Tags the mutation invalidates.
    pub fn invalidated_tags(&self) -> Vec<Tag> {
        match self {
            EventKind::PostCreated { .. } | EventKind::PostDeleted { .. } => vec![Tag::posts()],
            EventKind::PostUpdated { post_id } => vec![Tag::post(post_id.clone())],
            EventKind::CommentCreated { post_id, .. }
            | EventKind::CommentDeleted { post_id, .. } => vec![Tag::comments(post_id.clone())],
        }
    }

    /// Mutation endpoint name.
    pub fn operation(&self) -> &'static str {
        match self {
            EventKind::PostCreated { .. } => "createPost",
            EventKind::PostUpdated { .. } => "updatePost",
            EventKind::PostDeleted { .. } => "deletePost",
            EventKind::CommentCreated { .. } => "createComment",
            EventKind::CommentDeleted { .. } => "deleteComment",
        }
    }
}

/// FIFO of published events.
pub struct EventQueue {
    queue: Mutex<VecDeque<CacheEvent>>,
    epoch_counter: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn publish(&self, kind: EventKind) {
        let event = CacheEvent::new(kind, self.next_epoch());

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            operation = event.kind.operation(),
            event_kind = ?event.kind,
            "Cache event enqueued"
        );

        let mut queue = mutex_lock(&self.queue, SOURCE, "publish");
        queue.push_back(event);
        gauge!(METRIC_QUEUE_LEN).set(queue.len() as f64);
    }

    /// Remove up to `limit` events, oldest first.
    pub fn drain(&self, limit: usize) -> Vec<CacheEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let drained = queue.drain(..count).collect();
        gauge!(METRIC_QUEUE_LEN).set(queue.len() as f64);
        drained
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        mutex_lock(&self.queue, SOURCE, "clear").clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(id: &str) -> EventKind {
        EventKind::PostCreated {
            post_id: id.to_string(),
        }
    }

    #[test]
    fn epochs_are_monotonic() {
        let queue = EventQueue::new();
        let e1 = queue.next_epoch();
        let e2 = queue.next_epoch();
        assert!(e1 < e2);
    }

    #[test]
    fn publish_and_drain_fifo() {
        let queue = EventQueue::new();
        queue.publish(created("a"));
        queue.publish(created("b"));
        queue.publish(created("c"));

        let events = queue.drain(2);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, created("a"));
        assert_eq!(events[1].kind, created("b"));
        assert!(events[0].epoch < events[1].epoch);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn drain_more_than_available() {
        let queue = EventQueue::new();
        queue.publish(created("a"));
        assert_eq!(queue.drain(100).len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_queue() {
        let queue = EventQueue::new();
        queue.publish(created("a"));
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn mutations_declare_their_tags() {
        assert_eq!(created("a").invalidated_tags(), vec![Tag::posts()]);
        assert_eq!(
            EventKind::PostDeleted {
                post_id: "a".into()
            }
            .invalidated_tags(),
            vec![Tag::posts()]
        );
        assert_eq!(
            EventKind::PostUpdated {
                post_id: "a".into()
            }
            .invalidated_tags(),
            vec![Tag::post("a")]
        );
        assert_eq!(
            EventKind::CommentDeleted {
                post_id: "p".into(),
                comment_id: "c".into()
            }
            .invalidated_tags(),
            vec![Tag::comments("p")]
        );
    }
}
