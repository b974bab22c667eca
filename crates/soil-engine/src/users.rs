//! User accounts: `users/{uid}`, the identity record, username
//! reservations and admin flags.

use serde_json::{Map, Value};
use soil_store::{StoreError, TreeStore, WriteMode};
use soil_types::{paths, DataKey, RecordRef, Uid, WriteSet};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::params::{CreateParams, UpdateParams};
use crate::soil::Soil;

/// Profile field reserved in `usernames/` when present.
pub const USERNAME: &str = "username";

impl<S: TreeStore + ?Sized> Soil<S> {
    /// The identity record of `uid`.
    pub fn identity_record(&self, uid: &Uid) -> EngineResult<RecordRef> {
        Ok(RecordRef::new(
            self.identity_type().clone(),
            DataKey::new(uid.as_str())?,
        ))
    }

    /// Plan a verified user: the account node, a public identity record
    /// owned by the user, and the username reservation if the profile
    /// names one. Any unverified stub is cleared.
    pub fn plan_create_user(
        &self,
        writes: &mut WriteSet,
        uid: &Uid,
        user: Map<String, Value>,
        profile: Map<String, Value>,
    ) -> EngineResult<()> {
        if let Some(name) = profile.get(USERNAME).and_then(Value::as_str) {
            paths::validate_segment(name, "username")?;
            writes.set(paths::username(name), uid.as_str());
        }
        writes.set(paths::user(uid), Value::Object(user));
        writes.clear(paths::unverified_user(uid));

        let params = CreateParams::new()
            .data(profile)
            .owner(uid.clone())
            .public(true);
        self.plan_create(writes, &self.identity_record(uid)?, &params)
    }

    pub async fn create_user(
        &self,
        uid: &Uid,
        user: Map<String, Value>,
        profile: Map<String, Value>,
    ) -> EngineResult<WriteSet> {
        let mut writes = WriteSet::new();
        self.plan_create_user(&mut writes, uid, user, profile)?;
        self.apply(&writes, WriteMode::Merge).await?;
        info!(uid = %uid, "created user");
        Ok(writes)
    }

    /// Record a sign-up that has not been verified yet.
    pub async fn create_unverified_user(&self, uid: &Uid, data: Map<String, Value>) -> EngineResult<WriteSet> {
        let mut writes = WriteSet::new();
        writes.set(paths::unverified_user(uid), Value::Object(data));
        self.apply(&writes, WriteMode::Merge).await?;
        Ok(writes)
    }

    /// Update the user's identity record.
    pub async fn update_user(&self, uid: &Uid, params: UpdateParams) -> EngineResult<WriteSet> {
        self.update(&self.identity_record(uid)?, params).await
    }

    /// The account node at `users/{uid}`.
    pub async fn get_user(&self, uid: &Uid) -> EngineResult<Option<Value>> {
        self.read(&paths::user(uid)).await
    }

    pub async fn get_uid_from_username(&self, username: &str) -> EngineResult<Option<Uid>> {
        paths::validate_segment(username, "username")?;
        match self.read(&paths::username(username)).await? {
            Some(Value::String(uid)) => Ok(Some(Uid::new(uid)?)),
            Some(other) => Err(EngineError::Malformed {
                path: paths::username(username),
                reason: format!("expected a uid, found {other}"),
            }),
            None => Ok(None),
        }
    }

    /// Returns `true` if `uid` carries the admin flag. A denied read means
    /// the caller cannot see the flag and counts as `false`.
    pub async fn is_admin(&self, uid: &Uid) -> EngineResult<bool> {
        match self.read(&paths::admin(uid)).await {
            Ok(flag) => Ok(flag == Some(Value::Bool(true))),
            Err(EngineError::Store(StoreError::PermissionDenied { .. })) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;
    use soil_store::{InMemoryTreeStore, StoreResult, TransactionFn};

    use super::*;
    use crate::test_support::{engine, uid};
    use crate::EngineConfig;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn create_user_writes_account_identity_and_username() {
        let (store, soil) = engine();
        let id = uid("u1");
        soil.create_unverified_user(&id, obj(json!({ "email": "a@b.c" })))
            .await
            .unwrap();
        soil.create_user(
            &id,
            obj(json!({ "email": "a@b.c" })),
            obj(json!({ "username": "ada", "displayName": "Ada" })),
        )
        .await
        .unwrap();

        let tree = store.snapshot().await;
        assert_eq!(tree["users"]["u1"]["email"], json!("a@b.c"));
        assert!(tree.get("unverifiedUsers").is_none());
        assert_eq!(tree["data"]["appUser"]["u1"]["displayName"], json!("Ada"));
        assert_eq!(tree["data"]["appUser"]["u1"]["publicAccess"], json!(true));
        assert!(tree["owners"]["appUser"]["u1"].get("u1").is_some());

        assert_eq!(soil.get_uid_from_username("ada").await.unwrap(), Some(id.clone()));
        assert_eq!(soil.get_uid_from_username("bob").await.unwrap(), None);
        assert!(soil.get_user(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_user_touches_identity_record() {
        let (store, soil) = engine();
        let id = uid("u1");
        soil.create_user(&id, Map::new(), obj(json!({ "displayName": "Ada" })))
            .await
            .unwrap();
        soil.update_user(&id, UpdateParams::new().field("displayName", "Ada L"))
            .await
            .unwrap();
        assert_eq!(
            store.snapshot().await["data"]["appUser"]["u1"]["displayName"],
            json!("Ada L")
        );
    }

    #[tokio::test]
    async fn admin_flag() {
        let store = Arc::new(InMemoryTreeStore::with_tree(json!({ "admins": { "root": true } })));
        let soil = Soil::new(store, EngineConfig::permissive()).unwrap();
        assert!(soil.is_admin(&uid("root")).await.unwrap());
        assert!(!soil.is_admin(&uid("u1")).await.unwrap());
    }

    /// Store that denies every read of the admin namespace.
    struct Guarded(InMemoryTreeStore);

    #[async_trait]
    impl TreeStore for Guarded {
        async fn read(&self, path: &str) -> StoreResult<Option<Value>> {
            if paths::is_admin_path(path) {
                return Err(StoreError::PermissionDenied { path: path.into() });
            }
            self.0.read(path).await
        }

        async fn batch_apply(&self, writes: &WriteSet, mode: WriteMode) -> StoreResult<()> {
            self.0.batch_apply(writes, mode).await
        }

        async fn generate_key(&self, path: &str) -> StoreResult<String> {
            self.0.generate_key(path).await
        }

        async fn run_with_optimistic_retry(
            &self,
            path: &str,
            update: TransactionFn<'_>,
        ) -> StoreResult<Option<Value>> {
            self.0.run_with_optimistic_retry(path, update).await
        }
    }

    #[tokio::test]
    async fn denied_admin_read_is_not_admin() {
        let soil = Soil::new(
            Arc::new(Guarded(InMemoryTreeStore::new())),
            EngineConfig::permissive(),
        )
        .unwrap();
        assert!(!soil.is_admin(&uid("u1")).await.unwrap());
    }
}
