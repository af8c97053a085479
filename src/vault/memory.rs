//! In-memory secret store

use super::SecretStore;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Secret store that keeps blobs in process memory
#[derive(Default)]
pub struct MemorySecretStore {
    blobs: RwLock<HashMap<Uuid, Vec<u8>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn load(&self, id: Uuid) -> Option<Vec<u8>> {
        self.blobs.read().await.get(&id).cloned()
    }

    async fn save(&self, id: Uuid, blob: &[u8]) {
        self.blobs.write().await.insert(id, blob.to_vec());
    }

    async fn delete(&self, id: Uuid) {
        self.blobs.write().await.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let store = MemorySecretStore::new();
        let id = Uuid::new_v4();

        assert!(store.load(id).await.is_none());

        store.save(id, b"secret").await;
        assert_eq!(store.load(id).await.as_deref(), Some(&b"secret"[..]));

        store.delete(id).await;
        assert!(store.load(id).await.is_none());
    }

    #[tokio::test]
    async fn test_ids_are_independent() {
        let store = MemorySecretStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.save(a, &[1, 2, 3]).await;
        store.save(b, &[4]).await;
        store.delete(a).await;

        assert!(store.load(a).await.is_none());
        assert_eq!(store.load(b).await, Some(vec![4]));
    }
}
