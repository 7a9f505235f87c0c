//! JSON API and the streaming endpoint.

use std::{collections::HashMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path as AxumPath, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
    routing::{delete, get},
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::{error, info};

use crate::{
    error::{ApiError, ApiResult, StreamError},
    fetch::{Fetcher, VideoDetails, VideoSummary},
    library::{self, LibraryEntry, LibraryStats},
    resolver::MediaRoot,
    stream::stream_response,
};

#[derive(Clone)]
pub struct AppState {
    library: Arc<MediaRoot>,
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<VideoCache>,
    chunk_size: usize,
}

/// Video details looked up through the fetcher, kept for the life of the
/// process. Library files are never cached.
struct VideoCache {
    details: RwLock<HashMap<String, VideoDetails>>,
}

impl AppState {
    pub fn new(library: MediaRoot, fetcher: Arc<dyn Fetcher>, chunk_size: usize) -> Self {
        Self {
            library: Arc::new(library),
            fetcher,
            cache: Arc::new(VideoCache {
                details: RwLock::new(HashMap::new()),
            }),
            chunk_size: chunk_size.max(1),
        }
    }

    async fn get_video(&self, id: &str) -> ApiResult<VideoDetails> {
        if let Some(cached) = self.cache.details.read().get(id).cloned() {
            return Ok(cached);
        }

        let fetcher = self.fetcher.clone();
        let details = blocking({
            let id = id.to_owned();
            move || fetcher.video(&id)
        })
        .await?
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("video not found"))?;

        self.cache
            .details
            .write()
            .insert(id.to_owned(), details.clone());
        Ok(details)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/search", get(search))
        .route("/api/videos/{id}", get(get_video))
        .route("/api/downloads", get(list_downloads).post(start_download))
        .route("/api/downloads/stats", get(download_stats))
        .route("/api/downloads/{filename}", delete(delete_download))
        .route("/api/stream/{filename}", get(stream_file))
        .with_state(state)
}

/// Runs blocking collaborator work off the async workers.
async fn blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f).await.map_err(|err| {
        error!(error = %err, "blocking task failed");
        ApiError::internal("internal server error")
    })
}

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    fetcher: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthPayload> {
    Json(HealthPayload {
        status: "ok",
        fetcher: state.fetcher.name(),
    })
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
}

#[derive(Serialize)]
struct SearchPayload {
    query: String,
    results: Vec<VideoSummary>,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchPayload>> {
    let fetcher = state.fetcher.clone();
    let results = blocking({
        let query = params.q.clone();
        move || fetcher.search(&query)
    })
    .await?
    .map_err(ApiError::from)?;

    Ok(Json(SearchPayload {
        query: params.q,
        results,
    }))
}

async fn get_video(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<VideoDetails>> {
    let details = state.get_video(&id).await?;
    Ok(Json(details))
}

#[derive(Deserialize)]
struct DownloadRequest {
    id: String,
}

async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<(StatusCode, Json<LibraryEntry>)> {
    let fetcher = state.fetcher.clone();
    let root = state.library.path().to_path_buf();
    let path = blocking(move || fetcher.download(&request.id, &root))
        .await?
        .map_err(ApiError::from)?;

    // Confirm the new file is a playable member of the library.
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ApiError::internal("download produced no file"))?;
    state.library.resolve(&filename).await?;

    let root = state.library.path().to_path_buf();
    let entry = blocking(move || library::describe_file(&root, &filename))
        .await?
        .ok_or_else(|| ApiError::internal("downloaded file is not a playable video"))?;

    info!(file = %entry.filename, size = entry.size_bytes, "added to library");
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_downloads(State(state): State<AppState>) -> ApiResult<Json<Vec<LibraryEntry>>> {
    let root = state.library.path().to_path_buf();
    let entries = blocking(move || library::scan_library(&root)).await?;
    Ok(Json(entries))
}

async fn download_stats(State(state): State<AppState>) -> ApiResult<Json<LibraryStats>> {
    let root = state.library.path().to_path_buf();
    let stats = blocking(move || library::library_stats(&library::scan_library(&root))).await?;
    Ok(Json(stats))
}

#[derive(Serialize)]
struct DeletePayload {
    success: bool,
    message: String,
}

async fn delete_download(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
) -> ApiResult<Json<DeletePayload>> {
    let file = state.library.resolve(&filename).await?;
    tokio::fs::remove_file(file.path()).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ApiError::not_found("file not found")
        } else {
            error!(file = %filename, error = %err, "deleting library file failed");
            ApiError::internal("could not delete file")
        }
    })?;

    info!(file = %filename, "deleted from library");
    Ok(Json(DeletePayload {
        success: true,
        message: format!("Deleted {filename}"),
    }))
}

async fn stream_file(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
    headers: HeaderMap,
) -> Result<Response, StreamError> {
    stream_response(
        &state.library,
        &filename,
        headers.get(header::RANGE),
        state.chunk_size,
    )
    .await
}
