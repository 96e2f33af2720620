use crate::config::{AppConfig, RegionMode};
use crate::data::{self, LoadError};
use crate::filter::{FilterState, RegionFilter, Selection};
use crate::pipeline::{self, RenderInstruction, SelectionOptions};
use crate::render;
use crate::store::RecordStore;
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared, read-only client tables. Filter state is never stored here: every
/// request derives its own views.
pub struct AppState {
    pub config: AppConfig,
    pub default_store: Option<Arc<RecordStore>>,
    pub uploads: RwLock<Uploads>,
}

/// Uploaded tables by id, capped at `capacity`; the oldest upload is evicted first.
pub struct Uploads {
    capacity: usize,
    order: VecDeque<Uuid>,
    stores: HashMap<Uuid, Arc<RecordStore>>,
}

impl Uploads {
    pub fn new(capacity: usize) -> Self {
        Uploads {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            stores: HashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<RecordStore>> {
        self.stores.get(id).cloned()
    }

    pub fn insert(&mut self, id: Uuid, store: Arc<RecordStore>) {
        while self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.stores.remove(&oldest);
                debug!(dataset = %oldest, "evicted uploaded client table");
            }
        }
        self.order.push_back(id);
        self.stores.insert(id, store);
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl AppState {
    pub fn new(config: AppConfig, default_store: Option<RecordStore>) -> Self {
        let uploads = RwLock::new(Uploads::new(config.server.max_uploads));
        AppState {
            config,
            default_store: default_store.map(Arc::new),
            uploads,
        }
    }

    fn store(&self, dataset: Option<Uuid>) -> Result<Arc<RecordStore>, ApiError> {
        match dataset {
            Some(id) => self
                .uploads
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&id)
                .ok_or_else(|| ApiError::new("not_found", format!("unknown dataset {id}"))),
            None => self.default_store.clone().ok_or_else(|| {
                ApiError::new(
                    "no_dataset",
                    "no client table is loaded; upload a CSV file first",
                )
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "not_found" | "no_dataset" => StatusCode::NOT_FOUND,
            "bad_request" | "missing_columns" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl From<LoadError> for ApiError {
    fn from(err: LoadError) -> Self {
        let code = match err {
            LoadError::MissingColumns { .. } => "missing_columns",
            LoadError::Csv(_) => "bad_request",
            LoadError::MissingSource { .. } | LoadError::Io { .. } => "internal_error",
        };
        ApiError::new(code, err.to_string())
    }
}

/// The user's dropdown choices as query parameters. `regions` is a
/// comma-separated list, used when regions are multi-select.
#[derive(Debug, Deserialize, Default)]
pub struct MapQuery {
    pub dataset: Option<Uuid>,
    pub representative: Option<String>,
    pub region: Option<String>,
    pub regions: Option<String>,
    pub company: Option<String>,
}

impl MapQuery {
    pub fn filter_state(&self, mode: RegionMode) -> FilterState {
        let region = match mode {
            RegionMode::Single => RegionFilter::Single(Selection::parse(self.region.as_deref())),
            RegionMode::Multi => RegionFilter::Multi(
                self.regions
                    .as_deref()
                    .unwrap_or("")
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        };
        FilterState::new(
            Selection::parse(self.representative.as_deref()),
            region,
            self.company.as_deref(),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub dataset: Uuid,
    pub rows: usize,
}

pub fn build_app(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.server.max_upload_bytes;
    Router::new()
        .route("/", get(index_handler))
        .route("/api/options", get(options_handler))
        .route("/api/map", get(map_handler))
        .route("/api/map.geojson", get(geojson_handler))
        .route(
            "/api/datasets",
            post(upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, store: Option<RecordStore>) -> Result<()> {
    let port = config.server.port;
    let state = Arc::new(AppState::new(config, store));
    let app = build_app(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal, stopping server");
}

async fn index_handler() -> Html<&'static str> {
    Html(render::INDEX_HTML)
}

async fn options_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MapQuery>,
) -> Result<Json<SelectionOptions>, ApiError> {
    let store = state.store(query.dataset)?;
    let mode = state.config.filters.region_mode;
    let filter = query.filter_state(mode);
    Ok(Json(pipeline::options(&store, &filter, mode)))
}

fn render_instruction(state: &AppState, query: &MapQuery) -> Result<RenderInstruction, ApiError> {
    let store = state.store(query.dataset)?;
    let filter = query.filter_state(state.config.filters.region_mode);
    Ok(pipeline::run(&store, &filter, &state.config.view))
}

async fn map_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MapQuery>,
) -> Result<Json<RenderInstruction>, ApiError> {
    render_instruction(&state, &query).map(Json)
}

async fn geojson_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MapQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let instr = render_instruction(&state, &query)?;
    Ok((
        [(header::CONTENT_TYPE, "application/geo+json")],
        Json(render::to_feature_collection(&instr)),
    ))
}

async fn upload_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let store = data::read_records(&body[..], &state.config.input.columns).map_err(|e| {
        warn!(error = %e, "rejected uploaded client table");
        ApiError::from(e)
    })?;
    let rows = store.len();
    let dataset = Uuid::new_v4();
    state
        .uploads
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(dataset, Arc::new(store));
    info!(%dataset, rows, "client table uploaded");
    Ok((StatusCode::CREATED, Json(UploadResponse { dataset, rows })))
}
