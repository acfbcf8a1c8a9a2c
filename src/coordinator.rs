//! Mutation coordinator: the sole writer path into a collection's store,
//! and the component that drives the hub after every successful write.
//!
//! Correctness over efficiency: after each mutation the coordinator
//! re-reads the authoritative collection and publishes the full snapshot,
//! which keeps concurrent writers observably consistent without any merge
//! logic (last snapshot wins; intermediate snapshots may be skipped under
//! high write rates).

use kameo::actor::ActorRef;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::actor::hub::Hub;
use crate::actor::messages::Publish;
use crate::error::Result;
use crate::protocol::{Channel, Record, RecordId, ServerEvent};
use crate::store::RecordStore;

/// Per-collection mutation coordinator.
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn RecordStore>,
    hub: ActorRef<Hub>,
    channel: Channel,
    /// Channel for the lightweight sender announcement emitted before the
    /// snapshot (chat only).
    announce: Option<Channel>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn RecordStore>, hub: ActorRef<Hub>, channel: Channel) -> Self {
        Self { store, hub, channel, announce: None }
    }

    pub fn with_announcement(
        store: Arc<dyn RecordStore>,
        hub: ActorRef<Hub>,
        channel: Channel,
        announce: Channel,
    ) -> Self {
        Self { store, hub, channel, announce: Some(announce) }
    }

    /// Create a record, then announce (chat) and republish the snapshot.
    ///
    /// A store failure surfaces to the caller and publishes nothing, not
    /// even the announcement.
    pub async fn create(&self, fields: Map<String, Value>) -> Result<Record> {
        let record = self.store.create(fields).await?;
        let snapshot = self.store.all().await?;
        if let Some(channel) = self.announce {
            if let Some(email) = record.str_field("email") {
                self.publish(channel, ServerEvent::Email(email.to_string())).await;
            }
        }
        self.publish(self.channel, self.snapshot_event(snapshot)).await;
        Ok(record)
    }

    /// Update an existing record and republish. A missing id is a no-op
    /// that publishes nothing.
    pub async fn update(&self, id: RecordId, fields: Map<String, Value>) -> Result<Record> {
        let record = self.store.update(id, fields).await?;
        self.publish_snapshot().await?;
        Ok(record)
    }

    /// Delete an existing record and republish. A missing id is a no-op
    /// that publishes nothing.
    pub async fn delete(&self, id: RecordId) -> Result<()> {
        self.store.delete(id).await?;
        self.publish_snapshot().await?;
        Ok(())
    }

    /// Clear the collection and republish the (empty) snapshot.
    pub async fn delete_all(&self) -> Result<()> {
        self.store.clear().await?;
        self.publish_snapshot().await?;
        Ok(())
    }

    /// Authoritative ordered snapshot, straight from the store.
    pub async fn read_all(&self) -> Result<Vec<Record>> {
        self.store.all().await
    }

    /// Wrap a snapshot in this collection's wire event.
    pub fn snapshot_event(&self, records: Vec<Record>) -> ServerEvent {
        match self.channel {
            Channel::Products => ServerEvent::ProductsList(records),
            Channel::Chat | Channel::ChatSenders => ServerEvent::Chat(records),
        }
    }

    async fn publish_snapshot(&self) -> Result<()> {
        let snapshot = self.store.all().await?;
        let event = self.snapshot_event(snapshot);
        self.publish(self.channel, event).await;
        Ok(())
    }

    async fn publish(&self, channel: Channel, event: ServerEvent) {
        let _ = self.hub.tell(Publish { channel, event }).send().await;
    }
}

/// Everything a session handler needs from its worker: the hub, one
/// coordinator per collection, and the channels this worker instance
/// serves. Built once per worker process and passed explicitly; there are
/// no process-wide singletons.
pub struct WorkerContext {
    pub hub: ActorRef<Hub>,
    pub products: Coordinator,
    pub chat: Coordinator,
    pub channels: Vec<Channel>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use kameo::actor::Actor as _;
    use serde_json::json;

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn catalog() -> (Coordinator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let hub = Hub::spawn(Hub::new());
        (Coordinator::new(store.clone(), hub, Channel::Products), store)
    }

    #[tokio::test]
    async fn create_then_snapshot_matches_store() {
        let (coordinator, store) = catalog();
        let created = coordinator.create(fields(&[("title", json!("A")), ("price", json!(10))])).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(coordinator.read_all().await.unwrap(), store.all().await.unwrap());
    }

    #[tokio::test]
    async fn update_missing_id_is_a_no_op() {
        let (coordinator, store) = catalog();
        coordinator.create(fields(&[("title", json!("A"))])).await.unwrap();

        let err = coordinator.update(99, fields(&[("title", json!("B"))])).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(99)));
        // The collection is untouched.
        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].str_field("title"), Some("A"));
    }

    #[tokio::test]
    async fn delete_missing_id_is_a_no_op() {
        let (coordinator, _) = catalog();
        assert!(matches!(coordinator.delete(1).await.unwrap_err(), Error::NotFound(1)));
    }

    #[tokio::test]
    async fn delete_all_empties_the_collection() {
        let (coordinator, store) = catalog();
        coordinator.create(Map::new()).await.unwrap();
        coordinator.create(Map::new()).await.unwrap();
        coordinator.delete_all().await.unwrap();
        assert!(store.all().await.unwrap().is_empty());
    }

    /// Store that fails every operation, for the no-partial-publication path.
    struct DownStore;

    #[async_trait]
    impl crate::store::RecordStore for DownStore {
        async fn create(&self, _: Map<String, Value>) -> Result<Record> {
            Err(Error::StoreUnavailable("backing store unreachable".into()))
        }
        async fn get(&self, _: RecordId) -> Result<Option<Record>> {
            Err(Error::StoreUnavailable("backing store unreachable".into()))
        }
        async fn all(&self) -> Result<Vec<Record>> {
            Err(Error::StoreUnavailable("backing store unreachable".into()))
        }
        async fn update(&self, _: RecordId, _: Map<String, Value>) -> Result<Record> {
            Err(Error::StoreUnavailable("backing store unreachable".into()))
        }
        async fn delete(&self, _: RecordId) -> Result<()> {
            Err(Error::StoreUnavailable("backing store unreachable".into()))
        }
        async fn clear(&self) -> Result<()> {
            Err(Error::StoreUnavailable("backing store unreachable".into()))
        }
    }

    #[tokio::test]
    async fn store_failure_surfaces_and_publishes_nothing() {
        let hub = Hub::spawn(Hub::new());
        let coordinator = Coordinator::new(Arc::new(DownStore), hub, Channel::Products);
        let err = coordinator.create(Map::new()).await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }
}
