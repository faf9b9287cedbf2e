//! HTTP API server for search and playback.
//!
//! Exposes the catalog over REST: a liveness route, the natural-language
//! search endpoint, and a static mount of the music directory so results
//! can be played back directly.

use crate::ai::AiClient;
use crate::catalog::{CatalogItem, SqliteCatalog};
use crate::cli::Output;
use crate::config::Settings;
use crate::search::{playback_url, SearchEngine};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

/// Shared application state.
struct AppState {
    engine: SearchEngine,
    bound_addr: String,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let music_dir: PathBuf = settings.music_dir();

    let store = Arc::new(SqliteCatalog::new(&settings.sqlite_path())?);
    let ai = Arc::new(AiClient::from_settings(&settings)?);
    let engine = SearchEngine::new(store, ai);

    let addr = format!("{}:{}", host, port);
    let state = Arc::new(AppState {
        engine,
        bound_addr: addr.clone(),
    });

    let app = build_router(state, &music_dir);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Lydtag API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Liveness", "GET /");
    Output::kv("Search", "GET /search?q=<text>");
    Output::kv("Playback", "GET /music/<filename>");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Assemble the router: liveness, search, and the static music mount, with
/// permissive CORS for browser clients.
fn build_router(state: Arc<AppState>, music_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/search", get(search))
        .nest_service("/music", ServeDir::new(music_dir))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct SearchParams {
    /// Natural-language search query. Required: a request without it is
    /// rejected by the extractor with a 400 before the handler runs.
    q: String,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SongResponse>,
}

#[derive(Serialize)]
struct SongResponse {
    id: String,
    filename: String,
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    genre: Option<String>,
    year: Option<String>,
    comment: Option<String>,
    playback_url: String,
}

impl SongResponse {
    fn from_item(item: CatalogItem, origin: &str) -> Self {
        let playback_url = playback_url(origin, &item.filename);
        Self {
            id: item.id.to_string(),
            filename: item.filename,
            title: item.fields.title,
            artist: item.fields.artist,
            album: item.fields.album,
            genre: item.fields.genre,
            year: item.fields.year,
            comment: item.fields.comment,
            playback_url,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// The origin clients should use for playback links: the Host header they
/// reached us through, falling back to the bound address.
fn request_origin(headers: &HeaderMap, bound_addr: &str) -> String {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| format!("http://{}", host))
        .unwrap_or_else(|| format!("http://{}", bound_addr))
}

// === Handlers ===

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "lydtag API is running" }))
}

async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    match state.engine.search(&params.q).await {
        Ok(items) => {
            let origin = request_origin(&headers, &state.bound_addr);
            Json(SearchResponse {
                results: items
                    .into_iter()
                    .map(|item| SongResponse::from_item(item, &origin))
                    .collect(),
            })
            .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::{client, CannedBackend};
    use crate::catalog::{CatalogStore, TagFields};
    use crate::tags::GeneratedTags;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Utc;
    use tempfile::tempdir;
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn router_with_one_song() -> (Router, tempfile::TempDir) {
        let store = Arc::new(SqliteCatalog::in_memory().unwrap());
        store
            .upsert(
                "/music/rain.mp3",
                "rain.mp3",
                &TagFields {
                    title: Some("Heavy Rain".to_string()),
                    ..TagFields::default()
                },
            )
            .await
            .unwrap();

        let backend = Arc::new(CannedBackend::new(GeneratedTags::default(), vec!["rain"]));
        let engine = SearchEngine::new(store, Arc::new(client(backend.clone(), backend)));
        let state = Arc::new(AppState {
            engine,
            bound_addr: "127.0.0.1:8000".to_string(),
        });

        let music_dir = tempdir().unwrap();
        (build_router(state, music_dir.path()), music_dir)
    }

    #[tokio::test]
    async fn test_search_without_query_param_is_rejected() {
        let (app, _music_dir) = router_with_one_song().await;

        let response = app
            .oneshot(Request::get("/search").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_with_query_returns_matches() {
        let (app, _music_dir) = router_with_one_song().await;

        let response = app
            .oneshot(
                Request::get("/search?q=rainy%20weather")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let reply: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(reply["results"][0]["filename"], "rain.mp3");
        assert!(reply["results"][0]["playback_url"]
            .as_str()
            .unwrap()
            .ends_with("/music/rain.mp3"));
    }

    #[test]
    fn test_request_origin_prefers_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "music.example.com:8000".parse().unwrap());

        assert_eq!(
            request_origin(&headers, "0.0.0.0:8000"),
            "http://music.example.com:8000"
        );
        assert_eq!(
            request_origin(&HeaderMap::new(), "0.0.0.0:8000"),
            "http://0.0.0.0:8000"
        );
    }

    #[test]
    fn test_song_response_carries_playback_url() {
        let now = Utc::now();
        let item = CatalogItem {
            id: Uuid::new_v4(),
            path: "/music/rain.mp3".to_string(),
            filename: "rain.mp3".to_string(),
            fields: TagFields {
                title: Some("Heavy Rain".to_string()),
                ..TagFields::default()
            },
            created_at: now,
            updated_at: now,
        };

        let resp = SongResponse::from_item(item, "http://localhost:8000");
        assert_eq!(resp.playback_url, "http://localhost:8000/music/rain.mp3");
        assert_eq!(resp.title.as_deref(), Some("Heavy Rain"));
    }
}
