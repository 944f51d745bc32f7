use std::collections::HashSet;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Staff,
    Holidays,
    Attendance,
    Advances,
    Payments,
    SalaryHistory,
}

/// Something in `collection` was written. `staff_id` is `None` when the write
/// is not tied to a single employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub collection: Collection,
    pub staff_id: Option<Uuid>,
}

impl Change {
    pub fn of(collection: Collection, staff_id: impl Into<Option<Uuid>>) -> Self {
        Self {
            collection,
            staff_id: staff_id.into(),
        }
    }
}

/// Push notifications for committed writes
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self { sender }
    }

    pub fn publish(&self, change: Change) {
        trace!(?change, "publishing change");

        // Nobody listening is fine
        let _ = self.sender.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.sender.subscribe()
    }
}

/// The changes a subscription refetches on
#[derive(Debug, Clone)]
pub struct Interest {
    collection: Collection,
    staff_ids: Option<HashSet<Uuid>>,
}

impl Interest {
    pub fn collection(collection: Collection) -> Self {
        Self {
            collection,
            staff_ids: None,
        }
    }

    pub fn staff(collection: Collection, staff_ids: &[Uuid]) -> Self {
        Self {
            collection,
            staff_ids: Some(staff_ids.iter().copied().collect()),
        }
    }

    pub fn matches(&self, change: &Change) -> bool {
        if change.collection != self.collection {
            return false;
        }

        match (&self.staff_ids, change.staff_id) {
            (Some(staff_ids), Some(staff_id)) => staff_ids.contains(&staff_id),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interest_matching() {
        let inside = Uuid::new_v4();
        let outside = Uuid::new_v4();
        let interest = Interest::staff(Collection::Attendance, &[inside]);

        assert!(interest.matches(&Change::of(Collection::Attendance, inside)));
        assert!(interest.matches(&Change::of(Collection::Attendance, None)));
        assert!(!interest.matches(&Change::of(Collection::Attendance, outside)));
        assert!(!interest.matches(&Change::of(Collection::Payments, inside)));

        let holidays = Interest::collection(Collection::Holidays);
        assert!(holidays.matches(&Change::of(Collection::Holidays, None)));
        assert!(!holidays.matches(&Change::of(Collection::Attendance, None)));
    }

    #[actix_web::test]
    async fn test_publish_reaches_subscribers() {
        let feed = ChangeFeed::new(4);
        // publishing without subscribers is a no-op
        feed.publish(Change::of(Collection::Payments, None));

        let mut receiver = feed.subscribe();
        feed.clone().publish(Change::of(Collection::Staff, None));

        assert_eq!(receiver.recv().await.unwrap(), Change::of(Collection::Staff, None));
    }
}
