//! `StoreRegistry`: lazily opens and caches one `Store` per user.
//!
//! Grounded in `multi_tenant.rs`'s `TenantManager` CRUD shape, adapted from a
//! shared-pool-plus-tenant-id model to a file-per-user model: there is no
//! `organizations` table here, the filesystem itself is the registry's ground
//! truth, and the in-memory map is just a cache over it.

use super::{legacy_db_path, user_db_path, Store};
use crate::error::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct StoreRegistry {
    base_path: PathBuf,
    stores: RwLock<HashMap<String, Arc<Store>>>,
}

impl StoreRegistry {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached Store for `user_id`, opening (and creating the file,
    /// if absent) on first access.
    pub async fn get(&self, user_id: &str) -> Result<Arc<Store>> {
        if let Some(store) = self.stores.read().await.get(user_id) {
            return Ok(store.clone());
        }

        let mut stores = self.stores.write().await;
        if let Some(store) = stores.get(user_id) {
            return Ok(store.clone());
        }

        let path = user_db_path(&self.base_path, user_id);
        let store = Arc::new(Store::open_for_user(&path, Some(user_id.to_string())).await?);
        stores.insert(user_id.to_string(), store.clone());
        Ok(store)
    }

    /// The legacy single-tenant Store, for callers that predate per-user scoping.
    pub async fn get_legacy(&self) -> Result<Arc<Store>> {
        const LEGACY_KEY: &str = "__legacy__";
        if let Some(store) = self.stores.read().await.get(LEGACY_KEY) {
            return Ok(store.clone());
        }
        let mut stores = self.stores.write().await;
        if let Some(store) = stores.get(LEGACY_KEY) {
            return Ok(store.clone());
        }
        let path = legacy_db_path(&self.base_path);
        let store = Arc::new(Store::open(&path).await?);
        stores.insert(LEGACY_KEY.to_string(), store.clone());
        Ok(store)
    }

    pub async fn exists(&self, user_id: &str) -> bool {
        if self.stores.read().await.contains_key(user_id) {
            return true;
        }
        user_db_path(&self.base_path, user_id).exists()
    }

    /// Explicitly create and cache a Store for `user_id` (idempotent with `get`).
    pub async fn create(&self, user_id: &str) -> Result<Arc<Store>> {
        self.get(user_id).await
    }

    /// Close and remove the user's database file entirely.
    pub async fn delete(&self, user_id: &str) -> Result<()> {
        let store = self.stores.write().await.remove(user_id);
        if let Some(store) = store {
            store.close().await;
        }
        let path = user_db_path(&self.base_path, user_id);
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    /// List user ids with a store file on disk, derived from `user_<id>.db` filenames.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        if !self.base_path.exists() {
            return Ok(ids);
        }
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(rest) = name.strip_prefix("user_").and_then(|r| r.strip_suffix(".db")) {
                ids.push(rest.to_string());
            }
        }
        Ok(ids)
    }

    /// Close every cached Store, waiting for in-flight writes to drain first.
    pub async fn cleanup(&self) {
        let mut stores = self.stores.write().await;
        for (_, store) in stores.drain() {
            store.close().await;
        }
    }

    pub async fn cached_count(&self) -> usize {
        self.stores.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_creates_and_caches_per_user_store() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(dir.path());

        assert!(!registry.exists("u1").await);
        let store1 = registry.get("u1").await.unwrap();
        let store2 = registry.get("u1").await.unwrap();
        assert!(Arc::ptr_eq(&store1, &store2));
        assert!(registry.exists("u1").await);
    }

    #[tokio::test]
    async fn different_users_get_different_stores() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(dir.path());

        let u1 = registry.get("u1").await.unwrap();
        let u2 = registry.get("u2").await.unwrap();
        assert!(!Arc::ptr_eq(&u1, &u2));
        assert_ne!(u1.path(), u2.path());
    }

    #[tokio::test]
    async fn delete_removes_file_and_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(dir.path());
        registry.get("u1").await.unwrap();
        assert!(registry.exists("u1").await);

        registry.delete("u1").await.unwrap();
        assert!(!registry.exists("u1").await);
        assert_eq!(registry.cached_count().await, 0);
    }

    #[tokio::test]
    async fn list_reflects_files_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(dir.path());
        registry.get("u1").await.unwrap();
        registry.get("u2").await.unwrap();

        let mut ids = registry.list().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["u1".to_string(), "u2".to_string()]);
    }
}
