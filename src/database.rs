use async_trait::async_trait;
use bson::{Document, doc};
use futures_util::TryStreamExt;
use mongodb::{
    Client, Collection, IndexModel,
    error::{Error, ErrorKind, WriteError, WriteFailure},
    options::{ClientOptions, IndexOptions, ServerApi, ServerApiVersion},
};

use crate::error::StoreError;
use crate::models::{ClickEvent, UrlRecord};
use crate::store::{RecordStore, StoreResult};

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoStore {
    urls: Collection<UrlRecord>,
}

impl MongoStore {
    pub async fn new(connection_string: &str, database: &str) -> Result<Self, Error> {
        let mut client_options = ClientOptions::parse(connection_string).await?;
        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);

        let client = Client::with_options(client_options)?;
        let urls = client.database(database).collection::<UrlRecord>("urls");

        let index = IndexModel::builder()
            .keys(doc! { "shortAlias": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        urls.create_index(index).await?;

        Ok(Self { urls })
    }

    async fn find_many(&self, filter: Document) -> StoreResult<Vec<UrlRecord>> {
        let cursor = self.urls.find(filter).sort(doc! { "_id": 1 }).await?;
        Ok(cursor.try_collect().await?)
    }
}

/// A click as a single pipeline update, so every counter on the document
/// moves together. Needs MongoDB 4.2 or newer.
fn click_pipeline(event: &ClickEvent) -> Vec<Document> {
    vec![doc! {
        "$set": {
            "analytics.totalClicks": { "$add": [{ "$ifNull": ["$analytics.totalClicks", 0] }, 1] },
            "analytics.uniqueUsers": with_member(or_empty("$analytics.uniqueUsers"), &event.user),
            "analytics.clicksByDate": bump_date(&event.date),
            "analytics.osType": bump_breakdown("$analytics.osType", "osName", &event.os, &event.user),
            "analytics.deviceType": bump_breakdown(
                "$analytics.deviceType",
                "deviceName",
                &event.device,
                &event.user,
            ),
        }
    }]
}

/// Client-supplied strings must never be read as field paths.
fn literal(value: &str) -> Document {
    doc! { "$literal": value }
}

fn or_empty(path: &str) -> Document {
    doc! { "$ifNull": [path, []] }
}

fn with_member(list: Document, value: &str) -> Document {
    doc! {
        "$cond": [
            { "$in": [literal(value), list.clone()] },
            list.clone(),
            { "$concatArrays": [list, [literal(value)]] },
        ]
    }
}

/// Increments the entry for `date`, or appends it with a count of one.
fn bump_date(date: &str) -> Document {
    doc! {
        "$let": {
            "vars": { "days": or_empty("$analytics.clicksByDate") },
            "in": {
                "$cond": [
                    { "$in": [literal(date), "$$days.date"] },
                    {
                        "$map": {
                            "input": "$$days",
                            "as": "d",
                            "in": {
                                "$cond": [
                                    { "$eq": ["$$d.date", literal(date)] },
                                    { "$mergeObjects": ["$$d", { "count": { "$add": ["$$d.count", 1] } }] },
                                    "$$d",
                                ]
                            },
                        }
                    },
                    { "$concatArrays": ["$$days", [{ "date": literal(date), "count": 1 }]] },
                ]
            },
        }
    }
}

/// Counts `user` once against the breakdown entry whose `key` is `name`,
/// appending the entry if the name is new.
fn bump_breakdown(path: &str, key: &str, name: &str, user: &str) -> Document {
    doc! {
        "$let": {
            "vars": { "entries": or_empty(path) },
            "in": {
                "$cond": [
                    { "$in": [literal(name), format!("$$entries.{key}")] },
                    {
                        "$map": {
                            "input": "$$entries",
                            "as": "e",
                            "in": {
                                "$cond": [
                                    {
                                        "$and": [
                                            { "$eq": [format!("$$e.{key}"), literal(name)] },
                                            { "$not": [{ "$in": [literal(user), or_empty("$$e.uniqueUsers")] }] },
                                        ]
                                    },
                                    {
                                        "$mergeObjects": ["$$e", {
                                            "uniqueClicks": { "$add": [{ "$ifNull": ["$$e.uniqueClicks", 0] }, 1] },
                                            "uniqueUsers": { "$concatArrays": [or_empty("$$e.uniqueUsers"), [literal(user)]] },
                                        }]
                                    },
                                    "$$e",
                                ]
                            },
                        }
                    },
                    {
                        "$concatArrays": ["$$entries", [{
                            key: literal(name),
                            "uniqueClicks": 1,
                            "uniqueUsers": [literal(user)],
                        }]]
                    },
                ]
            },
        }
    }
}

fn is_duplicate_key(err: &Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(WriteError {
            code: DUPLICATE_KEY_CODE,
            ..
        }))
    )
}

#[async_trait]
impl RecordStore for MongoStore {
    async fn find_by_alias(&self, alias: &str) -> StoreResult<Option<UrlRecord>> {
        Ok(self.urls.find_one(doc! { "shortAlias": alias }).await?)
    }

    async fn find_by_topic(&self, topic: &str) -> StoreResult<Vec<UrlRecord>> {
        self.find_many(doc! { "topic": topic }).await
    }

    async fn find_all_by_alias(&self, alias: &str) -> StoreResult<Vec<UrlRecord>> {
        self.find_many(doc! { "shortAlias": alias }).await
    }

    async fn create(&self, record: UrlRecord) -> StoreResult<UrlRecord> {
        match self.urls.insert_one(&record).await {
            Ok(_) => Ok(record),
            Err(err) if is_duplicate_key(&err) => Err(StoreError::DuplicateKey(record.short_alias)),
            Err(err) => Err(err.into()),
        }
    }

    async fn record_click(&self, alias: &str, event: &ClickEvent) -> StoreResult<bool> {
        let result = self
            .urls
            .update_one(doc! { "shortAlias": alias }, click_pipeline(event))
            .await?;
        Ok(result.matched_count > 0)
    }
}
