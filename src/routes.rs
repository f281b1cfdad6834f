//! HTTP surface: mockup rendering, result retrieval and health checks.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tokio::fs;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, instrument};

use crate::error::{RenderError, StoreError};
use crate::geometry::{parse_points, PhotoSpace, PointsError, Quad};
use crate::keying::BackgroundMode;
use crate::pipeline::{self, RenderConfig};
use crate::store::{ArtifactRef, ArtifactStore};

/// HTTP Content-Type value for PNG images.
const PNG_CONTENT_TYPE: &str = "image/png";
/// Path prefix rendered mockups are served under.
const RESULTS_PREFIX: &str = "/results";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ArtifactStore>,
}

impl AppState {
    pub fn new(store: impl ArtifactStore + 'static) -> Self {
        Self { store: Arc::new(store) }
    }
}

/// Builds the application router.
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/mockup", post(mockup))
        .route("/results/{file}", get(result_file))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Everything a handler can fail with, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Points(#[from] PointsError),

    #[error("missing form field {0:?}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("rendering task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Points(_) | ApiError::MissingField(_) | ApiError::InvalidField { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Multipart(e) => e.status(),
            ApiError::Render(RenderError::Decode { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Render(RenderError::DegenerateQuad(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Render(RenderError::Encode(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(StoreError::InvalidReference(_) | StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Io(_)) | ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "Request failed");
        } else {
            debug!(error = %self, %status, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct MockupResponse {
    result_url: String,
}

/// A parsed `/mockup` form, validated but not yet decoded.
struct MockupForm {
    base_photo: Bytes,
    design: Bytes,
    quad: Quad<PhotoSpace>,
    config: RenderConfig,
}

#[derive(Default)]
struct RawForm {
    base_photo: Option<Bytes>,
    design: Option<Bytes>,
    points: Option<String>,
    opacity: Option<String>,
    shading: Option<String>,
    shading_strength: Option<String>,
    bg_mode: Option<String>,
    bg_thr: Option<String>,
}

impl MockupForm {
    async fn read(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut raw = RawForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "base_photo" => raw.base_photo = Some(field.bytes().await?),
                "design" => raw.design = Some(field.bytes().await?),
                "points" => raw.points = Some(field.text().await?),
                "opacity" => raw.opacity = Some(field.text().await?),
                "shading" => raw.shading = Some(field.text().await?),
                "shading_strength" => raw.shading_strength = Some(field.text().await?),
                "bg_mode" => raw.bg_mode = Some(field.text().await?),
                "bg_thr" => raw.bg_thr = Some(field.text().await?),
                other => debug!(field = other, "Ignoring unknown form field"),
            }
        }

        // Points are checked first so a bad quad never reaches image decoding.
        let quad = parse_points(raw.points.as_deref().ok_or(ApiError::MissingField("points"))?)?;
        let base_photo = raw.base_photo.ok_or(ApiError::MissingField("base_photo"))?;
        let design = raw.design.ok_or(ApiError::MissingField("design"))?;

        let defaults = RenderConfig::default();
        let opacity = parse_number("opacity", raw.opacity, f64::from(defaults.opacity))?;
        let shading = match raw.shading {
            Some(value) => parse_flag("shading", &value)?,
            None => defaults.shading,
        };
        let shading_strength =
            parse_number("shading_strength", raw.shading_strength, f64::from(defaults.shading_strength))?;
        let bg_mode = match raw.bg_mode {
            Some(value) => value
                .parse::<BackgroundMode>()
                .map_err(|_| ApiError::InvalidField { field: "bg_mode", value })?,
            None => defaults.bg_mode,
        };
        let bg_thr = parse_number("bg_thr", raw.bg_thr, f64::from(defaults.bg_threshold))?;

        let config = RenderConfig::new(opacity as f32, shading, shading_strength as f32, bg_mode, bg_thr);
        Ok(Self { base_photo, design, quad, config })
    }
}

fn parse_number(field: &'static str, value: Option<String>, default: f64) -> Result<f64, ApiError> {
    match value {
        None => Ok(default),
        Some(value) => value.trim().parse::<f64>().map_err(|_| ApiError::InvalidField { field, value }),
    }
}

/// `true`/`false`, or a number where anything non-zero means on.
fn parse_flag(field: &'static str, value: &str) -> Result<bool, ApiError> {
    let trimmed = value.trim();
    if let Ok(flag) = trimmed.to_ascii_lowercase().parse::<bool>() {
        return Ok(flag);
    }
    trimmed
        .parse::<f64>()
        .map(|v| v != 0.0)
        .map_err(|_| ApiError::InvalidField { field, value: value.to_string() })
}

/// Renders a mockup from a multipart form and stores the resulting PNG.
///
/// Form fields: `base_photo` and `design` (image files), `points`
/// (`x0,y0,...,x3,y3` in photo pixels, corners TL, TR, BR, BL), and the
/// optional `opacity`, `shading`, `shading_strength`, `bg_mode`, `bg_thr`.
///
/// # Returns
///
/// * `200 OK` with `{"result_url": "/results/<id>.png"}`.
/// * `400 Bad Request` for malformed points, missing uploads, unparseable
///   numbers or undecodable images. Malformed points are a 400 with an
///   `{"error": ...}` body, not a 200 carrying the error.
/// * `422 Unprocessable Entity` when the quadrilateral is degenerate.
/// * `500 Internal Server Error` when the result cannot be stored.
#[instrument(skip(state, multipart))]
async fn mockup(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MockupResponse>, ApiError> {
    let form = MockupForm::read(&mut multipart).await?;
    debug!(
        photo_bytes = form.base_photo.len(),
        design_bytes = form.design.len(),
        quad = ?form.quad,
        config = ?form.config,
        "Parsed mockup form"
    );

    let store = Arc::clone(&state.store);
    let reference = tokio::task::spawn_blocking(move || -> Result<ArtifactRef, ApiError> {
        let png = pipeline::render(&form.base_photo, &form.design, &form.quad, &form.config)?;
        Ok(store.put(&png)?)
    })
    .await??;

    info!(%reference, "Mockup stored");
    Ok(Json(MockupResponse { result_url: format!("{RESULTS_PREFIX}/{reference}") }))
}

/// Serves a previously rendered mockup.
#[instrument(skip(state))]
async fn result_file(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let reference = ArtifactRef::parse(&file)?;
    let path = state.store.resolve(&reference)?;
    let bytes = fs::read(&path).await.map_err(StoreError::from)?;
    Ok(([(header::CONTENT_TYPE, PNG_CONTENT_TYPE)], bytes))
}

/// A simple health check endpoint.
#[instrument]
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}
