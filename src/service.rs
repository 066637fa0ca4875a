use std::sync::Arc;

use chrono::{DateTime, Utc};
use url::Url;

use crate::alias;
use crate::analytics;
use crate::cache::AliasCache;
use crate::error::{ShortenError, StoreError};
use crate::models::{ClickEvent, OverallReport, PerAliasReport, TopicReport, UrlRecord};
use crate::store::RecordStore;

/// Input of [`UrlService::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub long_url: String,
    pub custom_alias: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub short_alias: String,
    pub created_at: DateTime<Utc>,
    /// Host of the long URL, for composing a short URL when no public base
    /// is configured. Not persisted.
    pub host: String,
}

/// Alias creation, resolution, click recording and analytics queries over a
/// record store fronted by a best-effort cache.
#[derive(Clone)]
pub struct UrlService {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn AliasCache>,
    alias_attempts: usize,
}

impl UrlService {
    pub fn new(store: Arc<dyn RecordStore>, cache: Arc<dyn AliasCache>, alias_attempts: usize) -> Self {
        Self {
            store,
            cache,
            alias_attempts: alias_attempts.max(1),
        }
    }

    #[tracing::instrument(skip(self, request), fields(custom = request.custom_alias.is_some()))]
    pub async fn create(&self, request: CreateRequest) -> Result<Created, ShortenError> {
        let Ok(url) = request.long_url.parse::<Url>() else {
            return Err(ShortenError::MalformedUrl);
        };
        if !matches!(url.scheme(), "https" | "http") {
            return Err(ShortenError::MalformedUrl);
        }
        let host = url.host_str().unwrap_or_default().to_owned();
        // The parsed form drops tabs and newlines, so it is always a valid
        // Location header.
        let long_url = url.as_str().to_owned();
        let topic = request.topic.filter(|t| !t.is_empty());

        let record = match request.custom_alias.filter(|a| !a.is_empty()) {
            // Custom aliases are not pre-checked; the store's unique index decides.
            Some(custom) => {
                let record = UrlRecord::new(long_url, custom, topic);
                match self.store.create(record).await {
                    Ok(record) => record,
                    Err(StoreError::DuplicateKey(alias)) => return Err(ShortenError::AliasTaken(alias)),
                    Err(err) => return Err(err.into()),
                }
            }
            None => self.create_generated(&long_url, topic).await?,
        };

        self.spawn_cache_set(&record.short_alias, &record.original_url);
        tracing::info!(alias = %record.short_alias, "created short url");

        Ok(Created {
            short_alias: record.short_alias,
            created_at: record.created_at,
            host,
        })
    }

    async fn create_generated(&self, long_url: &str, topic: Option<String>) -> Result<UrlRecord, ShortenError> {
        for attempt in 1..=self.alias_attempts {
            let candidate = alias::generate();
            if self.store.find_by_alias(&candidate).await?.is_some() {
                tracing::debug!(attempt, alias = %candidate, "generated alias already in use");
                continue;
            }

            let record = UrlRecord::new(long_url.to_owned(), candidate, topic.clone());
            match self.store.create(record).await {
                Ok(record) => return Ok(record),
                Err(StoreError::DuplicateKey(alias)) => {
                    tracing::debug!(attempt, %alias, "lost alias race, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }
        tracing::error!(attempts = self.alias_attempts, "alias generation exhausted");
        Err(ShortenError::GenerationExhausted(self.alias_attempts))
    }

    /// Cache-first lookup of the original URL. Storage misses repopulate the
    /// cache in the background.
    pub async fn resolve(&self, alias: &str) -> Result<String, ShortenError> {
        match self.cache.get(alias).await {
            Ok(Some(url)) => return Ok(url),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(err = ?err, alias, "cache lookup failed");
            }
        }

        let record = self
            .store
            .find_by_alias(alias)
            .await?
            .ok_or(ShortenError::NotFound)?;

        self.spawn_cache_set(alias, &record.original_url);
        Ok(record.original_url)
    }

    pub async fn record_click(&self, alias: &str, event: &ClickEvent) -> Result<(), ShortenError> {
        if self.store.record_click(alias, event).await? {
            Ok(())
        } else {
            Err(ShortenError::NotFound)
        }
    }

    pub async fn alias_analytics(&self, alias: &str) -> Result<PerAliasReport, ShortenError> {
        let record = self
            .store
            .find_by_alias(alias)
            .await?
            .ok_or(ShortenError::NotFound)?;
        Ok(analytics::alias_report(&record))
    }

    pub async fn topic_analytics(&self, topic: &str) -> Result<TopicReport, ShortenError> {
        let records = self.store.find_by_topic(topic).await?;
        analytics::topic_report(&records)
            .ok_or_else(|| ShortenError::NoUrlsFound(format!("topic {topic}")))
    }

    pub async fn overall_analytics(&self, alias: &str) -> Result<OverallReport, ShortenError> {
        let records = self.store.find_all_by_alias(alias).await?;
        analytics::overall_report(&records)
            .ok_or_else(|| ShortenError::NoUrlsFound(format!("alias {alias}")))
    }

    /// Writes to the cache in the background; the caller never waits on it.
    fn spawn_cache_set(&self, key: &str, value: &str) {
        let cache = Arc::clone(&self.cache);
        let key = key.to_owned();
        let value = value.to_owned();
        tokio::spawn(async move {
            if let Err(err) = cache.set(&key, &value).await {
                tracing::warn!(err = ?err, alias = %key, "cache write failed");
            }
        });
    }
}
