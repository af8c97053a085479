//! Per-device secret persistence ("vault" blobs)
//!
//! Blobs are opaque byte sequences keyed by UUID. The store never inspects
//! them; the provider gateway decides what goes in, and seals it with the
//! vault passphrase through [`Sealer`] first.

mod file;
mod memory;
mod seal;

pub use file::{FileSecretStore, VAULT_EXTENSION};
pub use memory::MemorySecretStore;
pub use seal::{Passphrase, SealError, Sealer};

use async_trait::async_trait;
use uuid::Uuid;

/// Key-addressed blob storage with a pluggable backing medium.
///
/// Every operation is infallible from the caller's point of view: failures of
/// the backing medium are logged and degrade to "absent" (for `load`) or a
/// no-op. As a consequence a `None` from `load` means either that no secret is
/// stored or that reading it failed; callers cannot tell the two apart.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Load the blob stored under `id`, if any
    async fn load(&self, id: Uuid) -> Option<Vec<u8>>;

    /// Store `blob` under `id`, replacing any previous blob
    async fn save(&self, id: Uuid, blob: &[u8]);

    /// Remove the blob stored under `id`
    async fn delete(&self, id: Uuid);
}
