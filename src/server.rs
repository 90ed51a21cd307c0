//! HTTP front for the file system service
//!
//! Query parsing is forgiving: an absent or unusable `root` means root 0 and
//! an absent or unusable `page` means page 1.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, get_service, post},
    Json, Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::filesystem::FileSystemService;
use crate::protocol::{FileEntry, FilePage, FileSystemError, RootInfo, SearchResults};

pub struct AppState {
    pub fs: Arc<FileSystemService>,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(fs: FileSystemService, static_dir: PathBuf) -> Self {
        Self {
            fs: Arc::new(fs),
            static_dir,
        }
    }
}

/// Raw query string values; interpreted leniently by the accessors below
#[derive(Debug, Default, Deserialize)]
struct FileQuery {
    root: Option<String>,
    path: Option<String>,
    page: Option<String>,
    q: Option<String>,
    name: Option<String>,
    hidden: Option<String>,
}

impl FileQuery {
    fn root_index(&self, root_count: usize) -> usize {
        self.root
            .as_deref()
            .and_then(|r| r.trim().parse::<usize>().ok())
            .filter(|&index| index < root_count)
            .unwrap_or(0)
    }

    fn page(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(1)
    }

    fn path_or_root(&self) -> &str {
        self.path.as_deref().unwrap_or("/")
    }

    fn required_path(&self) -> Result<&str, ApiError> {
        required(self.path.as_deref(), "path")
    }

    fn include_hidden(&self) -> bool {
        !matches!(self.hidden.as_deref(), Some("false") | Some("0"))
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ApiError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError(FileSystemError::invalid(format!(
            "{} parameter is required",
            name
        )))),
    }
}

/// Transport wrapper mapping service errors to HTTP statuses
pub struct ApiError(pub FileSystemError);

impl From<FileSystemError> for ApiError {
    fn from(err: FileSystemError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            FileSystemError::AccessDenied { .. } | FileSystemError::WritesDisabled => {
                StatusCode::FORBIDDEN
            }
            FileSystemError::NotFound { .. } => StatusCode::NOT_FOUND,
            FileSystemError::IsADirectory { .. }
            | FileSystemError::NotADirectory { .. }
            | FileSystemError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            FileSystemError::AlreadyExists { .. } => StatusCode::CONFLICT,
            FileSystemError::LineTooLong { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            FileSystemError::IoError { .. } | FileSystemError::OperationCancelled => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }
        let body = serde_json::json!({
            "error": self.0.to_string(),
            "kind": self.0.kind(),
        });
        (status, Json(body)).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let index = ServeFile::new(state.static_dir.join("index.html"));
    let assets = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/", get_service(index))
        .route("/api/roots", get(handle_roots))
        .route("/api/list", get(handle_list))
        .route("/api/view", get(handle_view))
        .route("/api/search", get(handle_search))
        .route("/api/mkdir", post(handle_mkdir))
        .route("/api/upload", post(handle_upload))
        .route("/api/delete", delete(handle_delete))
        .nest_service("/static", assets)
        .fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl+C or SIGTERM
pub async fn run(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("Serving file browser on http://{}", local_addr);
    if !local_addr.ip().is_loopback() {
        tracing::warn!(
            "Listening on non-loopback address {}; there is no authentication in front of the roots",
            local_addr
        );
    }

    let app = router(Arc::new(state));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Shutting down (Ctrl+C)");
                    }
                    _ = sigterm.recv() => {
                        tracing::info!("Shutting down (SIGTERM)");
                    }
                }
                return;
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to set up SIGTERM handler: {:?}. Only Ctrl+C will work for shutdown.",
                    e
                );
            }
        }
    }

    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down (Ctrl+C)");
}

async fn handle_roots(State(state): State<Arc<AppState>>) -> Json<Vec<RootInfo>> {
    Json(state.fs.roots())
}

async fn handle_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<Json<Vec<FileEntry>>, ApiError> {
    let root = query.root_index(state.fs.root_count());
    let entries = state
        .fs
        .list_directory(root, query.path_or_root(), query.include_hidden())
        .await?;
    Ok(Json(entries))
}

async fn handle_view(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<Json<FilePage>, ApiError> {
    let path = query.required_path()?;
    let root = query.root_index(state.fs.root_count());

    // Dropping this handler (client went away) cancels the scan.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let page = state.fs.view_file(root, path, query.page(), cancel).await?;
    Ok(Json(page))
}

async fn handle_search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<Json<SearchResults>, ApiError> {
    let path = query.required_path()?;
    let root = query.root_index(state.fs.root_count());
    let needle = query.q.as_deref().unwrap_or("");

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let results = state.fs.search_file(root, path, needle, cancel).await?;
    Ok(Json(results))
}

async fn handle_mkdir(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<(StatusCode, Json<FileEntry>), ApiError> {
    let name = required(query.name.as_deref(), "name")?;
    let root = query.root_index(state.fs.root_count());
    let entry = state
        .fs
        .create_directory(root, query.path_or_root(), name)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn handle_upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
    body: Body,
) -> Result<(StatusCode, Json<FileEntry>), ApiError> {
    let config = state.fs.config();
    // Refuse before buffering anything
    if !config.allow_writes {
        return Err(FileSystemError::WritesDisabled.into());
    }
    let name = required(query.name.as_deref(), "name")?;
    let root = query.root_index(state.fs.root_count());

    let limit = usize::try_from(config.max_upload_size).unwrap_or(usize::MAX);
    let content = axum::body::to_bytes(body, limit).await.map_err(|e| {
        FileSystemError::invalid(format!(
            "upload body rejected (limit {} bytes): {}",
            config.max_upload_size, e
        ))
    })?;
    let entry = state
        .fs
        .write_file(root, query.path_or_root(), name, &content)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<StatusCode, ApiError> {
    let path = query.required_path()?;
    let root = query.root_index(state.fs.root_count());
    state.fs.delete_path(root, path).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "page not found" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, Request},
    };
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::filesystem::config::FileSystemConfig;
    use crate::filesystem::roots::{RootConfig, RootRegistry};

    fn app(temp: &TempDir, config: FileSystemConfig) -> Router {
        let registry = RootRegistry::new(&[RootConfig::new("files", temp.path())]).unwrap();
        let state = AppState::new(
            FileSystemService::new(config, registry),
            temp.path().join("static"),
        );
        router(Arc::new(state))
    }

    async fn send(app: Router, method: Method, uri: &str, body: Body) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        send(app, Method::GET, uri, Body::empty()).await
    }

    #[tokio::test]
    async fn view_returns_page_json() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("abc.txt"), "a\nb\nc").unwrap();

        let (status, json) = get_json(app(&temp, FileSystemConfig::default()), "/api/view?path=/abc.txt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["lines"], serde_json::json!(["a", "b", "c"]));
        assert_eq!(json["totalLines"], 3);
        assert_eq!(json["page"], 1);
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["isPartial"], false);
        assert_eq!(json["path"], "/abc.txt");
    }

    #[tokio::test]
    async fn invalid_root_and_page_fall_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let lines: Vec<String> = (0..25).map(|i| i.to_string()).collect();
        std::fs::write(temp.path().join("n.txt"), lines.join("\n")).unwrap();
        let config = FileSystemConfig {
            page_size: 10,
            large_file_threshold: 0,
            ..Default::default()
        };

        for uri in [
            "/api/view?path=/n.txt&root=zzz&page=abc",
            "/api/view?path=/n.txt&root=9&page=",
            "/api/view?path=/n.txt&page=0",
        ] {
            let (status, json) = get_json(app(&temp, config.clone()), uri).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
            assert_eq!(json["page"], 1);
            assert_eq!(json["lines"][0], "0");
        }

        let (_, json) = get_json(app(&temp, config), "/api/view?path=/n.txt&page=50").await;
        assert_eq!(json["page"], 3);
        assert_eq!(json["lines"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn traversal_is_forbidden_without_leaking_host_paths() {
        let temp = TempDir::new().unwrap();
        let (status, json) = get_json(
            app(&temp, FileSystemConfig::default()),
            "/api/view?path=/../../etc/passwd",
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["kind"], "access_denied");
        let message = json["error"].as_str().unwrap();
        assert!(!message.contains(&temp.path().display().to_string()));
    }

    #[tokio::test]
    async fn view_requires_path_and_rejects_directories() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("dir")).unwrap();

        let (status, json) = get_json(app(&temp, FileSystemConfig::default()), "/api/view").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["kind"], "invalid_argument");

        let (status, _) = get_json(app(&temp, FileSystemConfig::default()), "/api/view?path=/dir").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(app(&temp, FileSystemConfig::default()), "/api/view?path=/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_and_roots_endpoints() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();
        std::fs::write(temp.path().join("a.rs"), "fn main() {}").unwrap();

        let (status, json) = get_json(app(&temp, FileSystemConfig::default()), "/api/list").await;
        assert_eq!(status, StatusCode::OK);
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["name"], "a.rs");
        assert_eq!(entries[0]["extension"], "rs");
        assert_eq!(entries[1]["path"], "/sub");
        assert_eq!(entries[1]["isDir"], true);
        assert!(entries[1].get("extension").is_none());

        let (_, roots) = get_json(app(&temp, FileSystemConfig::default()), "/api/roots").await;
        assert_eq!(roots, serde_json::json!([{"index": 0, "name": "files"}]));
    }

    #[tokio::test]
    async fn search_endpoint_returns_hits() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("app.log"), "start\nERROR boom\nend").unwrap();

        let (status, json) = get_json(
            app(&temp, FileSystemConfig::default()),
            "/api/search?path=/app.log&q=error",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["hits"][0]["lineNumber"], 2);
        assert_eq!(json["hits"][0]["page"], 1);
        assert_eq!(json["hits"][0]["line"], "ERROR boom");
        assert_eq!(json["truncated"], false);

        let (status, _) = get_json(app(&temp, FileSystemConfig::default()), "/api/search?path=/app.log").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn overlong_lines_are_unprocessable() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("wide.txt"), "w".repeat(64)).unwrap();
        let config = FileSystemConfig {
            large_file_threshold: 0,
            initial_line_buffer: 8,
            max_line_length: 32,
            ..Default::default()
        };

        let (status, json) = get_json(app(&temp, config), "/api/view?path=/wide.txt").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["kind"], "line_too_long");
    }

    #[tokio::test]
    async fn writes_are_forbidden_unless_enabled() {
        let temp = TempDir::new().unwrap();
        let (status, json) = send(
            app(&temp, FileSystemConfig::default()),
            Method::POST,
            "/api/upload?path=/&name=a.txt",
            Body::from("hello"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["kind"], "writes_disabled");
    }

    #[tokio::test]
    async fn disabled_upload_is_refused_before_reading_the_body() {
        let temp = TempDir::new().unwrap();
        let config = FileSystemConfig {
            max_upload_size: 4,
            ..Default::default()
        };
        let (status, json) = send(
            app(&temp, config),
            Method::POST,
            "/api/upload?path=/&name=big.bin",
            Body::from(vec![b'x'; 64 * 1024]),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["kind"], "writes_disabled");
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_when_enabled() {
        let temp = TempDir::new().unwrap();
        let config = FileSystemConfig {
            allow_writes: true,
            max_upload_size: 4,
            ..Default::default()
        };
        let (status, json) = send(
            app(&temp, config),
            Method::POST,
            "/api/upload?path=/&name=big.bin",
            Body::from("0123456789"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["kind"], "invalid_argument");
        assert!(!temp.path().join("big.bin").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dropped_request_cancels_the_scan() {
        use crate::filesystem::tests::{assert_reader_closed, endless_pipe};

        let temp = TempDir::new().unwrap();
        let writer = endless_pipe(&temp.path().join("endless.log"));
        let config = FileSystemConfig {
            large_file_threshold: 0,
            ..Default::default()
        };
        let request = Request::builder()
            .uri("/api/view?path=/endless.log")
            .body(Body::empty())
            .unwrap();

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            app(&temp, config).oneshot(request),
        )
        .await;
        assert!(outcome.is_err(), "an endless file cannot finish paging");

        // The abandoned request cancelled its scan, which closed the pipe.
        assert_reader_closed(writer).await;
    }

    #[tokio::test]
    async fn upload_mkdir_and_delete_when_enabled() {
        let temp = TempDir::new().unwrap();
        let config = FileSystemConfig {
            allow_writes: true,
            ..Default::default()
        };

        let (status, json) = send(
            app(&temp, config.clone()),
            Method::POST,
            "/api/mkdir?path=/&name=docs",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["path"], "/docs");

        let (status, json) = send(
            app(&temp, config.clone()),
            Method::POST,
            "/api/upload?path=/docs&name=hello.txt",
            Body::from("hello"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["size"], 5);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("docs/hello.txt")).unwrap(),
            "hello"
        );

        let (status, _) = send(
            app(&temp, config.clone()),
            Method::POST,
            "/api/upload?path=/docs&name=../../x.txt",
            Body::from("x"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            app(&temp, config),
            Method::DELETE,
            "/api/delete?path=/docs",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(!temp.path().join("docs").exists());
    }

    #[tokio::test]
    async fn unknown_routes_are_json_404() {
        let temp = TempDir::new().unwrap();
        let (status, json) = get_json(app(&temp, FileSystemConfig::default()), "/nowhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "page not found");
    }
}
