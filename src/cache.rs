use std::sync::Arc;

use crate::{
    error::StoreError,
    model::{ArrivalSnapshot, StopIdentity},
    store::KeyValueStore,
};

/// Last-known-good snapshot per stop, stored as JSON under `tablo:{city}:{stopId}`.
#[derive(Clone)]
pub struct SnapshotCache {
    store: Arc<dyn KeyValueStore>,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        SnapshotCache { store }
    }

    /// Missing, unreadable and malformed entries all count as a miss.
    pub async fn load(&self, identity: &StopIdentity) -> Option<ArrivalSnapshot> {
        let key = identity.cache_key();
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("Reading cache entry {:?} failed: {}", key, err);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                log::debug!("Ignoring malformed cache entry {:?}: {}", key, err);
                None
            }
        }
    }

    pub async fn save(
        &self,
        identity: &StopIdentity,
        snapshot: &ArrivalSnapshot,
    ) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(snapshot)?;
        self.store.set(&identity.cache_key(), encoded).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fetcher::demo_snapshot,
        model::{ArrivalItem, RouteType, StopInfo},
        store::MemoryStore,
    };
    use chrono::{TimeZone, Utc};

    fn cache_with(store: Arc<MemoryStore>) -> SnapshotCache {
        SnapshotCache::new(store)
    }

    #[tokio::test]
    async fn round_trips_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone());
        let identity = StopIdentity::new("Нальчик", "100");
        let mut snapshot = demo_snapshot(&identity, Utc.with_ymd_and_hms(2025, 1, 12, 14, 0, 0).unwrap());
        snapshot.items.push(ArrivalItem {
            route_id: "7".into(),
            route_type: RouteType::Trolley,
            route_name: None,
            scheduled_time: Some("15:05".into()),
            arrival_in_minutes: None,
            is_realtime: None,
        });

        cache.save(&identity, &snapshot).await.unwrap();
        assert!(store.peek("tablo:Нальчик:100").is_some());
        assert_eq!(cache.load(&identity).await, Some(snapshot));
    }

    #[tokio::test]
    async fn keys_are_per_stop() {
        let cache = cache_with(Arc::new(MemoryStore::new()));
        let snapshot = ArrivalSnapshot {
            stop: StopInfo {
                id: "1".into(),
                name: None,
                city: None,
            },
            generated_at: None,
            items: vec![],
        };
        cache
            .save(&StopIdentity::new("A", "1"), &snapshot)
            .await
            .unwrap();
        assert!(cache.load(&StopIdentity::new("A", "2")).await.is_none());
        assert!(cache.load(&StopIdentity::new("B", "1")).await.is_none());
    }

    #[tokio::test]
    async fn malformed_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        store.insert("tablo:A:1", "{not json");
        let cache = cache_with(store);
        assert!(cache.load(&StopIdentity::new("A", "1")).await.is_none());
    }
}
