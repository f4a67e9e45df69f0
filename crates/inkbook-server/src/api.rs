//! Page persistence routes.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use inkbook_core::{PageStorage, SaveCoordinator, SaveError, SaveOutcome, StoredPage};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared application state
pub struct AppState<S: PageStorage + 'static> {
    pub saves: SaveCoordinator<S>,
}

impl<S: PageStorage + 'static> AppState<S> {
    pub fn new(saves: SaveCoordinator<S>) -> Self {
        Self { saves }
    }
}

#[derive(Debug, Deserialize)]
struct LoadQuery {
    document_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SaveRequest {
    document_id: Option<String>,
    pages: Option<Vec<StoredPage>>,
}

pub fn router<S: PageStorage + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/api/pages/load", get(load_pages::<S>))
        .route("/api/pages/save", post(save_pages::<S>))
        .route("/health", get(health))
        .with_state(state)
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn load_pages<S: PageStorage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<LoadQuery>,
) -> Response {
    let Some(document_id) = query.document_id.filter(|id| !id.is_empty()) else {
        return Json(json!({ "pages": [] })).into_response();
    };

    match state.saves.storage().load_pages(&document_id).await {
        Ok(pages) => Json(json!({ "pages": pages })).into_response(),
        Err(e) => {
            error!("Failed to load pages for {}: {}", document_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn save_pages<S: PageStorage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Bytes,
) -> Response {
    let request = match serde_json::from_slice::<SaveRequest>(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected save payload: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Invalid payload");
        }
    };
    let (Some(document_id), Some(pages)) = (request.document_id, request.pages) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid payload");
    };
    if document_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid payload");
    }

    match state.saves.save_batch(&document_id, pages).await {
        Ok(SaveOutcome::Conflict) => {
            info!("Save already in progress for {}", document_id);
            error_response(StatusCode::CONFLICT, "Save already in progress")
        }
        Ok(_) => Json(json!({ "ok": true })).into_response(),
        Err(SaveError::DuplicatePageIndex(index)) => {
            warn!("Rejected save for {}: page index {} repeated", document_id, index);
            error_response(StatusCode::BAD_REQUEST, "Invalid payload")
        }
        Err(e) => {
            error!("Failed to save pages for {}: {}", document_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;
    use inkbook_core::{MemoryPageStorage, SaveConfig};
    use serde_json::Value;
    use std::time::Duration;

    fn setup() -> (TestServer, Arc<AppState<MemoryPageStorage>>) {
        let config = SaveConfig {
            settle_delay: Duration::from_millis(20),
            ..SaveConfig::default()
        };
        let state = Arc::new(AppState::new(SaveCoordinator::new(
            Arc::new(MemoryPageStorage::new()),
            config,
        )));
        let server = TestServer::new(router(Arc::clone(&state))).expect("Failed to create test server");
        (server, state)
    }

    #[tokio::test]
    async fn test_health() {
        let (server, _) = setup();
        let response = server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "ok");
    }

    #[tokio::test]
    async fn test_load_without_document_id() {
        let (server, _) = setup();
        let response = server.get("/api/pages/load").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!({ "pages": [] }));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (server, _) = setup();
        let response = server
            .post("/api/pages/save")
            .json(&json!({
                "document_id": "doc",
                "pages": [
                    { "page_index": 1, "data": { "objects": [] } },
                    { "page_index": 0, "data": {
                        "version": "5.3.0",
                        "objects": [{ "type": "arrow", "points": [0, 0, 10, 10] }],
                        "background": "#ffffff"
                    } }
                ]
            }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!({ "ok": true }));

        let response = server
            .get("/api/pages/load")
            .add_query_param("document_id", "doc")
            .await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        let pages = body["pages"].as_array().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0]["page_index"], 0);
        assert_eq!(pages[0]["data"]["objects"][0]["points"], json!([0, 0, 10, 10]));
        // Page data is stored as sent.
        assert_eq!(pages[0]["data"]["version"], "5.3.0");
        assert!(pages[0]["data"].get("canvasWidth").is_none());
        assert_eq!(pages[1]["data"], json!({ "objects": [] }));
    }

    #[tokio::test]
    async fn test_duplicate_page_index_rejected() {
        let (server, state) = setup();
        let response = server
            .post("/api/pages/save")
            .json(&json!({
                "document_id": "doc",
                "pages": [
                    { "page_index": 0, "data": { "objects": [] } },
                    { "page_index": 0, "data": { "objects": [] } }
                ]
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "Invalid payload");
        assert_eq!(state.saves.storage().write_count(), 0);
        assert!(!state.saves.is_saving("doc"));
    }

    #[tokio::test]
    async fn test_invalid_payload() {
        let (server, state) = setup();
        for body in [
            json!({ "pages": [] }),
            json!({ "document_id": "doc" }),
            json!({ "document_id": "", "pages": [] }),
            json!({ "document_id": "doc", "pages": "nope" }),
        ] {
            let response = server.post("/api/pages/save").json(&body).await;
            response.assert_status(StatusCode::BAD_REQUEST);
            assert_eq!(response.json::<Value>()["error"], "Invalid payload");
        }

        let response = server.post("/api/pages/save").text("{not json").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(state.saves.storage().write_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_save_conflicts() {
        let (server, state) = setup();
        let body = json!({ "document_id": "doc", "pages": [{ "page_index": 0, "data": {} }] });
        let (a, b) = tokio::join!(
            async { server.post("/api/pages/save").json(&body).await },
            async { server.post("/api/pages/save").json(&body).await },
        );
        let mut statuses = vec![a.status_code().as_u16(), b.status_code().as_u16()];
        statuses.sort();
        assert_eq!(statuses, vec![200, 409]);
        assert_eq!(state.saves.storage().write_count(), 1);

        let conflict = if a.status_code() == StatusCode::CONFLICT { a } else { b };
        assert_eq!(conflict.json::<Value>()["error"], "Save already in progress");
    }

    #[tokio::test]
    async fn test_storage_failure() {
        let (server, state) = setup();
        state.saves.storage().set_fail_inserts(true);
        let response = server
            .post("/api/pages/save")
            .json(&json!({ "document_id": "doc", "pages": [] }))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.json::<Value>()["error"].is_string());
        assert!(!state.saves.is_saving("doc"));
    }
}
