//! Job API Handlers
//!
//! HTTP endpoints for submitting, inspecting and cancelling jobs.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use ferry_core::domain::job::Job;
use ferry_core::dto::job::{CancelJobResponse, SubmitJob, SubmitJobResponse};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::service::JobService;

/// POST /jobs
/// Queue a new job
pub async fn submit_job(
    State(service): State<Arc<JobService>>,
    payload: Result<Json<SubmitJob>, JsonRejection>,
) -> ApiResult<Json<SubmitJobResponse>> {
    let Json(req) = payload?;
    tracing::debug!("Submitting job for repo: {}", req.repo_url);

    let job = service.submit(req).await?;

    Ok(Json(SubmitJobResponse::from(&job)))
}

/// GET /jobs/{id}
/// Get job details, logs included
pub async fn get_job(
    State(service): State<Arc<JobService>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    tracing::debug!("Getting job: {}", id);

    let job = service.get(parse_id(&id)?)?;

    Ok(Json(job))
}

/// POST /jobs/{id}/cancel
/// Request cancellation of a running job
pub async fn cancel_job(
    State(service): State<Arc<JobService>>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<CancelJobResponse>)> {
    let id = parse_id(&id)?;

    service.cancel(id).inspect_err(|e| {
        tracing::warn!("Cancel request for job {} rejected: {}", id, e);
    })?;

    Ok((StatusCode::ACCEPTED, Json(CancelJobResponse::requested(id))))
}

/// Ids that are not UUIDs cannot name a job
fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("Job {} not found", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use crate::repository::InMemoryJobRepository;
    use crate::scheduler::{CancellationRegistry, PoolConfig, WorkerPool};
    use crate::service::{ExecutionError, ExecutionReport, ExecutionService};
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::IntoResponse;
    use ferry_core::domain::job::JobStatus;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    /// `wait` blocks until cancelled, anything else succeeds
    struct StubExecutor;

    #[async_trait::async_trait]
    impl ExecutionService for StubExecutor {
        async fn execute_job(&self, cancel: CancellationToken, job: Job) -> ExecutionReport {
            if job.steps[0] == "wait" {
                cancel.cancelled().await;
                return ExecutionReport::failure(String::new(), ExecutionError::Interrupted);
            }
            ExecutionReport::success("ok\n".to_string())
        }
    }

    struct Fixture {
        service: Arc<JobService>,
        registry: Arc<CancellationRegistry>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryJobRepository::new());
        let registry = Arc::new(CancellationRegistry::new());
        let pool = Arc::new(WorkerPool::new(
            PoolConfig {
                worker_count: 1,
                queue_capacity: 4,
            },
            store.clone(),
            registry.clone(),
            Arc::new(StubExecutor),
            CancellationToken::new(),
        ));
        pool.start().unwrap();

        Fixture {
            service: Arc::new(JobService::new(store, pool)),
            registry,
        }
    }

    fn request(step: &str) -> SubmitJob {
        SubmitJob {
            repo_url: String::new(),
            commit: String::new(),
            steps: vec![step.to_string()],
        }
    }

    async fn submit(fixture: &Fixture, step: &str) -> Uuid {
        let Json(resp) = submit_job(State(fixture.service.clone()), Ok(Json(request(step))))
            .await
            .unwrap();
        assert_eq!(resp.status, JobStatus::Queued);
        resp.job_id
    }

    async fn fetch(fixture: &Fixture, id: Uuid) -> Job {
        let Json(job) = get_job(State(fixture.service.clone()), Path(id.to_string()))
            .await
            .unwrap();
        job
    }

    async fn send(router: axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_routes_submit_get_and_cancel() {
        let fixture = fixture();
        let router = create_router(fixture.service.clone());

        let (status, body) = send(
            router.clone(),
            post_json("/jobs", r#"{"repo_url":"","steps":["wait"]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "queued");
        let id: Uuid = body["job_id"].as_str().unwrap().parse().unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !fixture.registry.contains(id) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let get = Request::builder()
            .uri(format!("/jobs/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router.clone(), get).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");

        let (status, body) = send(router.clone(), post_json(&format!("/jobs/{id}/cancel"), "")).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "cancel_requested");

        let (status, body) = send(
            router,
            post_json(&format!("/jobs/{}/cancel", Uuid::new_v4()), ""),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_submission_is_bad_request() {
        let fixture = fixture();
        let router = create_router(fixture.service.clone());

        for body in [r#"{"repo_url":"x"}"#, r#"{"steps":"true"}"#, "{not json"] {
            let (status, value) = send(router.clone(), post_json("/jobs", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
            assert!(value["error"].is_string(), "body: {body}");
        }

        let (_, value) = send(router, post_json("/jobs", r#"{"repo_url":"x"}"#)).await;
        assert!(value["error"].as_str().unwrap().contains("steps"));
    }

    #[tokio::test]
    async fn test_submit_then_get() {
        let fixture = fixture();
        let id = submit(&fixture, "true").await;

        let job = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let job = fetch(&fixture, id).await;
                if job.status.is_terminal() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.logs, "ok\n");
    }

    #[tokio::test]
    async fn test_submit_without_steps_is_bad_request() {
        let fixture = fixture();
        let mut req = request("true");
        req.steps.clear();

        let err = submit_job(State(fixture.service.clone()), Ok(Json(req)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_unknown_or_malformed_id_is_not_found() {
        let fixture = fixture();

        let err = get_job(State(fixture.service.clone()), Path(Uuid::new_v4().to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = get_job(State(fixture.service.clone()), Path("not-a-uuid".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_running_then_finished_job() {
        let fixture = fixture();
        let id = submit(&fixture, "wait").await;

        tokio::time::timeout(Duration::from_secs(5), async {
            while !fixture.registry.contains(id) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let (status, Json(resp)) = cancel_job(State(fixture.service.clone()), Path(id.to_string()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(resp.job_id, id);
        assert_eq!(resp.status, "cancel_requested");

        tokio::time::timeout(Duration::from_secs(5), async {
            while !fetch(&fixture, id).await.status.is_terminal() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(fetch(&fixture, id).await.status, JobStatus::Canceled);

        let err = cancel_job(State(fixture.service.clone()), Path(id.to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_not_found() {
        let fixture = fixture();
        let err = cancel_job(State(fixture.service.clone()), Path(Uuid::new_v4().to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let response = ApiError::Conflict("Job x is not running".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!({ "error": "Job x is not running" }));
    }
}
