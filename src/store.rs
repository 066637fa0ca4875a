use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};

use crate::error::StoreError;
use crate::models::{ClickEvent, UrlRecord};

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable storage of URL records. `short_alias` is unique across the store.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    async fn find_by_alias(&self, alias: &str) -> StoreResult<Option<UrlRecord>>;

    async fn find_by_topic(&self, topic: &str) -> StoreResult<Vec<UrlRecord>>;

    /// Set-matching variant of [`RecordStore::find_by_alias`]; yields zero or
    /// more records.
    async fn find_all_by_alias(&self, alias: &str) -> StoreResult<Vec<UrlRecord>>;

    /// Persists a new record. Fails with [`StoreError::DuplicateKey`] if the
    /// alias is already taken.
    async fn create(&self, record: UrlRecord) -> StoreResult<UrlRecord>;

    /// Applies a click to the record's analytics. Returns `false` if no record
    /// has the alias.
    async fn record_click(&self, alias: &str, event: &ClickEvent) -> StoreResult<bool>;
}

/// Process-local store, used for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, UrlRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut records: Vec<UrlRecord>) -> Vec<UrlRecord> {
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_by_alias(&self, alias: &str) -> StoreResult<Option<UrlRecord>> {
        Ok(self.records.get(alias).map(|r| r.value().clone()))
    }

    async fn find_by_topic(&self, topic: &str) -> StoreResult<Vec<UrlRecord>> {
        let records = self
            .records
            .iter()
            .filter(|r| r.topic.as_deref() == Some(topic))
            .map(|r| r.value().clone())
            .collect();
        Ok(Self::sorted(records))
    }

    async fn find_all_by_alias(&self, alias: &str) -> StoreResult<Vec<UrlRecord>> {
        Ok(self.find_by_alias(alias).await?.into_iter().collect())
    }

    async fn create(&self, record: UrlRecord) -> StoreResult<UrlRecord> {
        match self.records.entry(record.short_alias.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(record.short_alias)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn record_click(&self, alias: &str, event: &ClickEvent) -> StoreResult<bool> {
        let Some(mut record) = self.records.get_mut(alias) else {
            return Ok(false);
        };
        record.analytics.record_click(event);
        Ok(true)
    }
}
