//! Queue item envelope

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use beacon_core::Payload;
use beacon_store::{KeyValueStore, StoreOptions};

/// Store key prefix for persisted queue items.
pub const QUEUE_KEY_PREFIX: &str = "queue:";

/// One queued payload with its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Queue-internal id, independent of the payload's eventId.
    pub id: String,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    /// When the item entered the queue.
    pub queued_at: String,
    /// The event payload. `sentAtTimestamp` is stamped into it on every
    /// attempt.
    pub payload: Payload,
}

impl QueueItem {
    /// Wrap a payload for queueing.
    #[must_use]
    pub fn new(payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            attempts: 0,
            queued_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            payload,
        }
    }

    /// The store key this item persists under.
    #[must_use]
    pub fn store_key(&self) -> String {
        format!("{QUEUE_KEY_PREFIX}{}", self.id)
    }

    /// Record the moment of the current delivery attempt in the
    /// payload.
    pub fn stamp_sent_at(&mut self) {
        self.payload.insert(
            "sentAtTimestamp".to_string(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }

    /// Write the item to the store.
    pub fn persist(&self, store: &dyn KeyValueStore, options: &StoreOptions) {
        if let Ok(raw) = serde_json::to_string(self) {
            store.set(&self.store_key(), &raw, options);
        }
    }
}

#[cfg(test)]
mod tests {
    use beacon_store::MemoryStore;
    use serde_json::Map;

    use super::*;

    fn payload() -> Payload {
        let mut map = Map::new();
        map.insert("eventName".to_string(), json!("appLoad"));
        map
    }

    #[test]
    fn test_new_item_starts_unattempted() {
        let item = QueueItem::new(payload());
        assert_eq!(item.attempts, 0);
        assert!(item.queued_at.ends_with('Z'));
        assert!(item.store_key().starts_with(QUEUE_KEY_PREFIX));
    }

    #[test]
    fn test_stamp_sent_at_overwrites_previous() {
        let mut item = QueueItem::new(payload());
        item.stamp_sent_at();
        let first = item.payload["sentAtTimestamp"].clone();
        assert!(first.is_string());
        item.stamp_sent_at();
        assert!(item.payload.contains_key("sentAtTimestamp"));
    }

    #[test]
    fn test_persist_round_trip() {
        let store = MemoryStore::new();
        let item = QueueItem::new(payload());
        item.persist(&store, &StoreOptions::default());

        let raw = store.get(&item.store_key()).unwrap();
        let restored: QueueItem = serde_json::from_str(&raw).unwrap();
        assert_eq!(restored, item);
    }
}
