//! Axum router: report submission, status lookup, listing and health.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use quill_core::{Orchestrator, ReportId, ReportSnapshot, StatusCounts};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub user_input: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tasks: StatusCounts,
}

pub fn build(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/reports", get(list_reports).post(submit_report))
        .route("/api/reports/{id}", get(get_report))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

async fn submit_report(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<ReportSnapshot>, ApiError> {
    Ok(Json(orchestrator.submit(request.user_input).await?))
}

async fn get_report(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(raw_id): Path<String>,
) -> Result<Json<ReportSnapshot>, ApiError> {
    let id: ReportId = raw_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid report id: {raw_id}")))?;
    Ok(Json(orchestrator.get_status(id).await?))
}

async fn list_reports(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Result<Json<Vec<ReportSnapshot>>, ApiError> {
    Ok(Json(orchestrator.list_all().await?))
}

async fn health(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "ok",
        tasks: orchestrator.counts().await?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use quill_core::AppBuilder;
    use quill_core::domain::ReportDocument;
    use quill_core::impls::{InMemoryTaskStore, ScriptedGateway};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> (Arc<Orchestrator>, Router) {
        let orchestrator = Arc::new(
            AppBuilder::new()
                .task_store(Arc::new(InMemoryTaskStore::new()))
                .gateway(Arc::new(ScriptedGateway::ok(ReportDocument::new("ok"))))
                .build()
                .unwrap(),
        );
        (orchestrator.clone(), build(orchestrator))
    }

    async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn submit(body: &str) -> Request<Body> {
        Request::post("/api/reports")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn submit_then_poll_until_completed() {
        let (orchestrator, router) = app();

        let (status, body) = call(&router, submit(r#"{"userInput":"hello"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 1);
        assert_eq!(body["status"], "PENDING");
        assert_eq!(body["reportResult"], "");
        assert!(body["createdAt"].is_string());

        orchestrator.wait_idle().await;

        let (status, body) = call(&router, get("/api/reports/1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "COMPLETED");
        assert_eq!(body["reportResult"], r#"{"summary":"ok"}"#);
    }

    #[tokio::test]
    async fn unknown_report_is_404_with_error_body() {
        let (_, router) = app();
        let (status, body) = call(&router, get("/api/reports/999")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "report 999 not found");
    }

    #[tokio::test]
    async fn malformed_id_is_400() {
        let (_, router) = app();
        let (status, body) = call(&router, get("/api/reports/abc")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("abc"));
    }

    #[tokio::test]
    async fn blank_input_is_400() {
        let (_, router) = app();
        let (status, _) = call(&router, submit(r#"{"userInput":"  "}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_and_health_reflect_submissions() {
        let (orchestrator, router) = app();
        call(&router, submit(r#"{"userInput":"a"}"#)).await;
        call(&router, submit(r#"{"userInput":"b"}"#)).await;
        orchestrator.wait_idle().await;

        let (status, body) = call(&router, get("/api/reports")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, body) = call(&router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["tasks"]["completed"], 2);
        assert_eq!(body["tasks"]["pending"], 0);
    }
}
