#![deny(clippy::all, clippy::pedantic)]

mod alias;
mod analytics;
mod cache;
mod clicks;
mod config;
mod database;
mod error;
mod models;
mod service;
mod store;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Extension, Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use cache::{AliasCache, MemoryCache, RedisCache};
use clicks::{ClickRecorder, click_from_headers, click_queue};
use config::{CacheBackend, Config, StorageBackend};
use database::MongoStore;
use error::ShortenError;
use models::{OverallReport, PerAliasReport, TopicReport};
use service::{CreateRequest, UrlService};
use store::{MemoryStore, RecordStore};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShortenParams {
    pub long_url: String,
    pub custom_alias: Option<String>,
    pub topic: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShortenResponse {
    pub short_url: String,
    pub created_at: DateTime<Utc>,
}

/// Prefix for composed short URLs; `None` uses the long URL's host.
#[derive(Clone)]
struct PublicBase(Option<String>);

async fn shorten_url_route(
    service: Extension<UrlService>,
    base: Extension<PublicBase>,
    params: Json<ShortenParams>,
) -> Result<(StatusCode, Json<ShortenResponse>), ShortenError> {
    let Json(params) = params;
    let created = service
        .create(CreateRequest {
            long_url: params.long_url,
            custom_alias: params.custom_alias,
            topic: params.topic,
        })
        .await?;

    let prefix = base.0.0.clone().unwrap_or(created.host);
    Ok((
        StatusCode::CREATED,
        Json(ShortenResponse {
            short_url: format!("{prefix}/{}", created.short_alias),
            created_at: created.created_at,
        }),
    ))
}

async fn redirect_route(
    service: Extension<UrlService>,
    recorder: Extension<ClickRecorder>,
    headers: HeaderMap,
    path: Path<String>,
) -> Result<Response, ShortenError> {
    let original_url = service.resolve(&path.0).await?;
    recorder.record(path.0, click_from_headers(&headers));

    Ok((StatusCode::FOUND, [(LOCATION, original_url)]).into_response())
}

async fn alias_analytics_route(
    service: Extension<UrlService>,
    path: Path<String>,
) -> Result<Json<PerAliasReport>, ShortenError> {
    Ok(Json(service.alias_analytics(&path.0).await?))
}

async fn topic_analytics_route(
    service: Extension<UrlService>,
    path: Path<String>,
) -> Result<Json<TopicReport>, ShortenError> {
    Ok(Json(service.topic_analytics(&path.0).await?))
}

async fn overall_analytics_route(
    service: Extension<UrlService>,
    path: Path<String>,
) -> Result<Json<OverallReport>, ShortenError> {
    Ok(Json(service.overall_analytics(&path.0).await?))
}

/// Builds the router and starts the background click recorder.
fn app(service: UrlService, public_base_url: Option<String>, click_queue_capacity: usize) -> Router {
    let (recorder, rx) = ClickRecorder::new(click_queue_capacity);
    tokio::spawn(click_queue(rx, service.clone()));

    Router::new()
        .route("/api/shorten", post(shorten_url_route))
        .route("/api/shorten/{alias}", get(redirect_route))
        .route("/api/shorten/analytics/{alias}", get(alias_analytics_route))
        .route("/api/shorten/topic/{topic}", get(topic_analytics_route))
        .route("/api/shorten/overall/{alias}", get(overall_analytics_route))
        .route("/health", get(|| async { "ok" }))
        .layer(Extension(service))
        .layer(Extension(recorder))
        .layer(Extension(PublicBase(public_base_url)))
        .layer(TraceLayer::new_for_http())
}

/// Connects the configured storage and cache backends.
async fn setup(config: &Config) -> anyhow::Result<Router> {
    let store: Arc<dyn RecordStore> = match &config.storage {
        StorageBackend::Mongo { url, database } => Arc::new(
            MongoStore::new(url, database)
                .await
                .context("failed to connect to MongoDB")?,
        ),
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage, records are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let cache: Arc<dyn AliasCache> = match &config.cache {
        CacheBackend::Redis { url } => match RedisCache::connect(url).await {
            Ok(cache) => Arc::new(cache),
            Err(err) => {
                tracing::error!(err = ?err, "redis unavailable, falling back to in-memory cache");
                Arc::new(MemoryCache::new())
            }
        },
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
    };

    let service = UrlService::new(store, cache, config.alias_attempts);
    Ok(app(
        service,
        config.public_base_url.clone(),
        config.click_queue_capacity,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let app = setup(&config).await?;

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, body::to_bytes, http::Request};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    fn test_app(public_base_url: Option<&str>) -> Router {
        let service = UrlService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCache::new()),
            config::DEFAULT_ALIAS_ATTEMPTS,
        );
        app(
            service,
            public_base_url.map(str::to_owned),
            config::DEFAULT_CLICK_QUEUE_CAPACITY,
        )
    }

    async fn shorten(app: &Router, body: Value) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/shorten")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice::<Value>(&body_bytes).unwrap())
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice::<Value>(&body_bytes).unwrap())
    }

    #[tokio::test]
    async fn shorten_url_valid() {
        let app = test_app(None);

        let (status, json) = shorten(
            &app,
            json!({ "longUrl": "https://example.com/a", "customAlias": "myAlias", "topic": "Tech" }),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["shortUrl"], "example.com/myAlias");
        assert!(json["createdAt"].as_str().is_some());
    }

    #[tokio::test]
    async fn shorten_url_uses_public_base() {
        let app = test_app(Some("https://sho.rt"));

        let (status, json) = shorten(&app, json!({ "longUrl": "https://example.com" })).await;

        assert_eq!(status, StatusCode::CREATED);
        let short_url = json["shortUrl"].as_str().unwrap();
        assert!(short_url.starts_with("https://sho.rt/"));
        assert_eq!(short_url.len(), "https://sho.rt/".len() + alias::ALIAS_LENGTH);
    }

    #[tokio::test]
    async fn shorten_url_invalid() {
        let app = test_app(None);

        let (status, json) = shorten(&app, json!({ "longUrl": "/invalid" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["kind"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn shorten_url_alias_conflict() {
        let app = test_app(None);
        let body = json!({ "longUrl": "https://example.com", "customAlias": "taken" });

        assert_eq!(shorten(&app, body.clone()).await.0, StatusCode::CREATED);
        let (status, json) = shorten(&app, body).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["kind"], "ALIAS_TAKEN");
    }

    #[tokio::test]
    async fn redirect_existing_path() {
        let app = test_app(None);
        shorten(
            &app,
            json!({ "longUrl": "https://example.com/test-redirect", "customAlias": "go" }),
        )
        .await;

        let redirect_response = app
            .oneshot(Request::get("/api/shorten/go").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(redirect_response.status(), StatusCode::FOUND);
        assert_eq!(
            redirect_response.headers().get("location").unwrap(),
            "https://example.com/test-redirect"
        );
    }

    #[tokio::test]
    async fn redirect_uses_normalized_url() {
        let app = test_app(None);
        let (status, _) = shorten(
            &app,
            json!({ "longUrl": "https://exa\nmple.com/pa\tge", "customAlias": "nl" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let redirect_response = app
            .oneshot(Request::get("/api/shorten/nl").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(redirect_response.status(), StatusCode::FOUND);
        assert_eq!(
            redirect_response.headers().get("location").unwrap(),
            "https://example.com/page"
        );
    }

    #[tokio::test]
    async fn health_check() {
        let response = test_app(None)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body_bytes[..], b"ok");
    }

    #[tokio::test]
    async fn redirect_invalid_path() {
        let app = test_app(None);
        let (status, json) = get_json(&app, "/api/shorten/unknownAlias").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Short URL not found");
    }

    #[tokio::test]
    async fn analytics_routes() {
        let app = test_app(None);
        shorten(
            &app,
            json!({ "longUrl": "https://example.com", "customAlias": "stats", "topic": "Tech" }),
        )
        .await;

        let (status, json) = get_json(&app, "/api/shorten/analytics/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["totalClicks"], 0);
        assert_eq!(json["mostActiveDay"], json!({ "date": null, "count": 0 }));
        assert_eq!(json["percentageGrowth"], "0.00");

        let (status, json) = get_json(&app, "/api/shorten/topic/Tech").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["urls"][0]["shortUrl"], "stats");

        let (status, json) = get_json(&app, "/api/shorten/overall/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["totalUrls"], 1);
        assert_eq!(json["osType"], json!([]));

        let (status, json) = get_json(&app, "/api/shorten/topic/Sports").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["kind"], "NO_URLS_FOUND");

        let (status, _) = get_json(&app, "/api/shorten/analytics/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
