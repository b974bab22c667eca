//! Append-only event log under `tracking/`.

use serde_json::{json, Value};
use soil_store::{TreeStore, WriteMode};
use soil_types::{paths, Timestamp, Uid, WriteSet};
use tracing::debug;

use crate::error::EngineResult;
use crate::soil::Soil;

impl<S: TreeStore + ?Sized> Soil<S> {
    /// Append an event and return its generated key. Entries are never
    /// updated.
    pub async fn track_event(&self, uid: &Uid, event: &str, metadata: Option<Value>) -> EngineResult<String> {
        let key = self.store().generate_key(&paths::tracking()).await?;
        let mut writes = WriteSet::new();
        writes.set(
            paths::tracking_entry(&key),
            json!({
                "event": event,
                "uid": uid.as_str(),
                "createdAt": Timestamp::now(),
                "metadata": metadata,
            }),
        );
        self.apply(&writes, WriteMode::Merge).await?;
        debug!(uid = %uid, event, key = %key, "tracked event");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::test_support::{engine, uid};

    #[tokio::test]
    async fn events_get_distinct_keys() {
        let (store, soil) = engine();
        let first = soil
            .track_event(&uid("u1"), "signIn", Some(json!({ "via": "email" })))
            .await
            .unwrap();
        let second = soil.track_event(&uid("u1"), "signOut", None).await.unwrap();
        assert_ne!(first, second);

        let tree = store.snapshot().await;
        let entry = &tree["tracking"][first.as_str()];
        assert_eq!(entry["event"], json!("signIn"));
        assert_eq!(entry["uid"], json!("u1"));
        assert_eq!(entry["metadata"]["via"], json!("email"));
        assert!(entry["createdAt"].is_i64());
        assert!(tree["tracking"][second.as_str()].get("metadata").is_none());
    }
}
