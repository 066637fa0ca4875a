use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Stable error categories exposed across the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    NoUrlsFound,
    AliasTaken,
    GenerationExhausted,
    DependencyUnavailable,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::NotFound => "NOT_FOUND",
            Self::NoUrlsFound => "NO_URLS_FOUND",
            Self::AliasTaken => "ALIAS_TAKEN",
            Self::GenerationExhausted => "GENERATION_EXHAUSTED",
            Self::DependencyUnavailable => "DEPENDENCY_UNAVAILABLE",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShortenError {
    #[error("URL provided was malformed")]
    MalformedUrl,
    #[error("Short URL not found")]
    NotFound,
    #[error("No URLs found for {0}")]
    NoUrlsFound(String),
    #[error("Alias {0} is already in use")]
    AliasTaken(String),
    #[error("Could not find a free alias after {0} attempts")]
    GenerationExhausted(usize),
    #[error("Storage is unavailable")]
    Storage(#[source] StoreError),
}

impl ShortenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedUrl => ErrorKind::InvalidInput,
            Self::NotFound => ErrorKind::NotFound,
            Self::NoUrlsFound(_) => ErrorKind::NoUrlsFound,
            Self::AliasTaken(_) => ErrorKind::AliasTaken,
            Self::GenerationExhausted(_) => ErrorKind::GenerationExhausted,
            Self::Storage(_) => ErrorKind::DependencyUnavailable,
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound | ErrorKind::NoUrlsFound => StatusCode::NOT_FOUND,
            ErrorKind::AliasTaken => StatusCode::CONFLICT,
            ErrorKind::GenerationExhausted => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::DependencyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ShortenError {
    fn into_response(self) -> Response {
        if let Self::Storage(err) = &self {
            tracing::error!(err = ?err);
        }
        (
            self.status(),
            Json(serde_json::json!({ "error": self.to_string(), "kind": self.kind().as_str() })),
        )
            .into_response()
    }
}

impl From<StoreError> for ShortenError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err)
    }
}

/// Failures reported by a record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a record with alias {0} already exists")]
    DuplicateKey(String),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Failures reported by a cache backend. Never surfaced to clients.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}
