//! Merge drained events into one invalidation plan.

use std::collections::HashSet;
use std::fmt;

use uuid::Uuid;

use super::events::{CacheEvent, Epoch};
use super::keys::Tag;

#[derive(Debug, Default)]
pub struct InvalidationPlan {
    /// Union of the tags every merged event invalidates.
    pub invalidate_tags: HashSet<Tag>,
    /// Operations that contributed, in epoch order.
    pub operations: Vec<&'static str>,
    /// Highest epoch merged into the plan.
    pub last_epoch: Option<Epoch>,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<String> = self.invalidate_tags.iter().map(Tag::to_string).collect();
        tags.sort();
        write!(
            f,
            "InvalidationPlan {{ tags: [{}], operations: {}, last_epoch: {:?} }}",
            tags.join(", "),
            self.operations.len(),
            self.last_epoch,
        )
    }
}

impl InvalidationPlan {
    /// Dedupes by event id and unions the invalidated tags.
    pub fn from_events(mut events: Vec<CacheEvent>) -> Self {
        events.sort_by_key(|event| event.epoch);

        let mut plan = Self::default();
        let mut seen: HashSet<Uuid> = HashSet::new();
        for event in events {
            if !seen.insert(event.id) {
                continue;
            }
            plan.invalidate_tags.extend(event.kind.invalidated_tags());
            plan.operations.push(event.kind.operation());
            plan.last_epoch = Some(event.epoch);
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.invalidate_tags.is_empty()
    }
}
