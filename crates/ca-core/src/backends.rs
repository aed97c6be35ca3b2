use anyhow::Result;
use std::sync::Arc;

use crate::config::{self, DataBackend, FirestoreConfig, StorageConfig};
use crate::firestore::FirestoreStore;
use crate::gcs::GcsBlobStore;
use crate::storage::{BlobStore, MemoryBlobStore};
use crate::store::{DocumentStore, MemoryStore};

#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Backends {
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            blobs: Arc::new(MemoryBlobStore::new()),
        }
    }
}

pub fn backend_from_env() -> Result<DataBackend> {
    config::parse_env("DATA_BACKEND", DataBackend::Firestore)
}

pub fn connect(backend: DataBackend) -> Result<Backends> {
    match backend {
        DataBackend::Memory => {
            tracing::warn!("using in-memory data backend; nothing is persisted");
            Ok(Backends::in_memory())
        }
        DataBackend::Firestore => {
            let firestore = FirestoreConfig::from_env()?;
            let storage = StorageConfig::from_env()?;
            let store = FirestoreStore::new(&firestore)?;
            let blobs = GcsBlobStore::new(&storage)?;
            tracing::info!(
                project = %firestore.project_id,
                database = %firestore.database,
                bucket = %storage.bucket,
                emulator = firestore.emulator_host.is_some(),
                "connected firestore backend"
            );
            Ok(Backends {
                store: Arc::new(store),
                blobs: Arc::new(blobs),
            })
        }
    }
}
