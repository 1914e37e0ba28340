//! # HTTP Surface
//!
//! Two routes, both `GET`:
//!
//! | path         | success                       | failure                         |
//! |--------------|-------------------------------|---------------------------------|
//! | `/clock.png` | 200, `image/png`              | 422 bad orientation, 500 render |
//! | `/health`    | 200 `{"status":"healthy"}`    | 500 when the cache is down      |
//!
//! `/clock.png` accepts an optional `orientation` query parameter
//! (`landscape` or `portrait`); without it the configured default applies.
//! Error bodies are JSON objects with a `detail` message.
//!
//! Rendering, cache lookups and weather fetches all block, so each request
//! runs them on the blocking thread pool.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::cache::{self, ImageCache};
use crate::composer::ClockComposer;
use crate::config::Config;
use crate::error::RenderError;
use crate::{InvalidOrientation, Orientation, RenderRequest};

const PNG_CONTENT_TYPE: &str = "image/png";
const ORIENTATION_PARAM: &str = "orientation";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    composer: Arc<ClockComposer>,
    cache: Option<Arc<dyn ImageCache>>,
}

impl AppState {
    /// State for `config` with the configured cache backend.
    pub fn new(config: Arc<Config>) -> Self {
        let cache = cache::from_config(&config.cache);
        Self::with_parts(ClockComposer::new(config), cache)
    }

    pub fn with_parts(composer: ClockComposer, cache: Option<Arc<dyn ImageCache>>) -> Self {
        Self {
            composer: Arc::new(composer),
            cache,
        }
    }

    /// Cached PNG for `request` at `now`, rendering and storing on a miss.
    pub fn clock_png(&self, request: &RenderRequest, now: DateTime<Utc>) -> Result<Vec<u8>, RenderError> {
        let orientation = self.composer.orientation(request);
        let key = cache::cache_key(self.composer.timezone_name(request), orientation, now);

        if let Some(bytes) = self.cache.as_deref().and_then(|c| cache::lookup(c, &key)) {
            return Ok(bytes);
        }

        let bytes = self.composer.render_png(request, now)?;
        if let Some(cache) = self.cache.as_deref() {
            let ttl = Duration::from_secs(self.composer.config().cache.expire_seconds);
            cache::store(cache, &key, &bytes, ttl);
        }
        info!(%key, size = bytes.len(), "rendered clock image");
        Ok(bytes)
    }
}

/// Errors returned to HTTP callers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    InvalidOrientation(#[from] InvalidOrientation),

    #[error("failed to render clock image: {0}")]
    Render(#[from] RenderError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidOrientation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/clock.png", get(clock_image))
        .route("/health", get(health))
        .with_state(state)
}

fn parse_request(params: &HashMap<String, String>) -> Result<RenderRequest, InvalidOrientation> {
    let orientation = params
        .get(ORIENTATION_PARAM)
        .map(|value| value.parse::<Orientation>())
        .transpose()?;
    Ok(RenderRequest {
        orientation,
        timezone: None,
    })
}

#[instrument(skip(state))]
async fn clock_image(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let request = parse_request(&params)?;
    let now = Utc::now();

    let png = tokio::task::spawn_blocking(move || state.clock_png(&request, now))
        .await
        .map_err(RenderError::from)?
        .map_err(|e| {
            error!(error = %e, "clock render failed");
            e
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, PNG_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        png,
    )
        .into_response())
}

async fn health(State(state): State<AppState>) -> Response {
    let Some(cache) = state.cache.clone() else {
        return Json(json!({ "status": "healthy" })).into_response();
    };

    let probe = tokio::task::spawn_blocking(move || cache.ping().map_err(|e| e.to_string()))
        .await
        .unwrap_or_else(|e| Err(e.to_string()));

    match probe {
        Ok(()) => Json(json!({ "status": "healthy" })).into_response(),
        Err(detail) => {
            error!(%detail, "health check failed: cache unreachable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "unhealthy", "detail": detail })),
            )
                .into_response()
        }
    }
}
