use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    models::{SnapshotEntity, SnapshotListItemEntity},
    storage::StorageResult,
};

/// Abstraction over the persistence collaborator for session snapshots.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: SnapshotEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SnapshotEntity>>>;
    fn list(&self) -> BoxFuture<'static, StorageResult<Vec<SnapshotListItemEntity>>>;
    fn delete(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
}

/// Process-local store keeping each snapshot as a JSON document.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    documents: DashMap<Uuid, String>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode(document: &str) -> StorageResult<SnapshotEntity> {
        Ok(serde_json::from_str(document)?)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, snapshot: SnapshotEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = serde_json::to_string(&snapshot)
            .map(|document| {
                debug!(id = %snapshot.id, bytes = document.len(), "snapshot stored");
                self.documents.insert(snapshot.id, document);
            })
            .map_err(Into::into);
        Box::pin(future::ready(result))
    }

    fn find(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SnapshotEntity>>> {
        let result = self
            .documents
            .get(&id)
            .map(|document| Self::decode(document.value()))
            .transpose();
        Box::pin(future::ready(result))
    }

    fn list(&self) -> BoxFuture<'static, StorageResult<Vec<SnapshotListItemEntity>>> {
        let result = self
            .documents
            .iter()
            .map(|entry| Self::decode(entry.value()).map(|entity| SnapshotListItemEntity::from(&entity)))
            .collect::<StorageResult<Vec<_>>>()
            .map(|mut items| {
                items.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
                items
            });
        Box::pin(future::ready(result))
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        Box::pin(future::ready(Ok(self.documents.remove(&id).is_some())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        board::tests::sample_board,
        session::{GameSession, SessionSettings},
    };

    fn entity() -> SnapshotEntity {
        let session = GameSession::new(sample_board(), SessionSettings::default());
        SnapshotEntity::capture(session.snapshot())
    }

    #[tokio::test]
    async fn save_then_find_returns_same_document() {
        let store = MemorySnapshotStore::new();
        let entity = entity();
        store.save(entity.clone()).await.unwrap();

        assert_eq!(store.find(entity.id).await.unwrap(), Some(entity.clone()));
        assert_eq!(store.find(Uuid::new_v4()).await.unwrap(), None);

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].remaining_questions, 3);
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = MemorySnapshotStore::new();
        let entity = entity();
        store.save(entity.clone()).await.unwrap();
        assert!(store.delete(entity.id).await.unwrap());
        assert!(!store.delete(entity.id).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }
}
