use axum::http::{HeaderMap, header::USER_AGENT};
use chrono::Utc;
use tokio::sync::mpsc::{Receiver, Sender, channel, error::TrySendError};
use woothee::parser::Parser;
use xxhash_rust::xxh64::xxh64;

use crate::models::ClickEvent;
use crate::service::UrlService;

const UNKNOWN: &str = "Unknown";

/// Builds a click from the headers of a redirect request.
pub fn click_from_headers(headers: &HeaderMap) -> ClickEvent {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let client = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .unwrap_or_default();

    let (os, device) = match Parser::new().parse(user_agent) {
        Some(parsed) => (known(parsed.os), known(parsed.category)),
        None => (UNKNOWN.to_owned(), UNKNOWN.to_owned()),
    };

    ClickEvent {
        date: Utc::now().format("%Y-%m-%d").to_string(),
        user: fingerprint(client, user_agent),
        os,
        device,
    }
}

fn known(value: &str) -> String {
    if value.is_empty() || value == "UNKNOWN" {
        UNKNOWN.to_owned()
    } else {
        value.to_owned()
    }
}

fn fingerprint(client: &str, user_agent: &str) -> String {
    format!("{:016x}", xxh64(format!("{client}|{user_agent}").as_bytes(), 0))
}

/// Hands clicks off to [`click_queue`] so redirects never wait on storage.
/// The queue is bounded; clicks arriving while it is full are dropped.
#[derive(Clone)]
pub struct ClickRecorder {
    tx: Sender<(String, ClickEvent)>,
}

impl ClickRecorder {
    pub fn new(capacity: usize) -> (Self, Receiver<(String, ClickEvent)>) {
        let (tx, rx) = channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn record(&self, alias: String, event: ClickEvent) {
        match self.tx.try_send((alias, event)) {
            Ok(()) => {}
            Err(TrySendError::Full((alias, _))) => {
                tracing::warn!(%alias, "click queue is full, dropping click");
            }
            Err(TrySendError::Closed((alias, _))) => {
                tracing::error!(%alias, "click queue is closed, dropping click");
            }
        }
    }
}

#[tracing::instrument(skip_all)]
pub async fn click_queue(mut rx: Receiver<(String, ClickEvent)>, service: UrlService) {
    while let Some((alias, event)) = rx.recv().await {
        if let Err(err) = service.record_click(&alias, &event).await {
            tracing::error!(err = ?err, %alias, "failed to record click");
        }
    }
    tracing::debug!("click queue closed");
}
