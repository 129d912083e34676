use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::domain::Classification;
use super::repository::{ArchiveError, RepositoryError, SessionRepository};
use super::service::{OriginWorkflowService, WorkflowServiceError};
use super::session::{SessionError, SessionId, WorkflowAction};
use super::wizard::WizardError;
use crate::gateway::GatewayError;

type SharedService<R> = Arc<OriginWorkflowService<R>>;

/// Router builder exposing the certificate workflow session endpoints.
pub fn certificate_router<R>(service: SharedService<R>) -> Router
where
    R: SessionRepository + 'static,
{
    Router::new()
        .route("/api/v1/origin/sessions", post(start_handler::<R>))
        .route(
            "/api/v1/origin/sessions/:session_id",
            get(session_handler::<R>).delete(abandon_handler::<R>),
        )
        .route(
            "/api/v1/origin/sessions/:session_id/actions",
            post(action_handler::<R>),
        )
        .route(
            "/api/v1/origin/sessions/:session_id/hs-verification",
            post(verify_handler::<R>),
        )
        .route(
            "/api/v1/origin/sessions/:session_id/save",
            post(save_handler::<R>),
        )
        .route(
            "/api/v1/origin/sessions/:session_id/generate",
            post(generate_handler::<R>),
        )
        .with_state(service)
}

pub(crate) async fn start_handler<R>(
    State(service): State<SharedService<R>>,
    axum::Json(classification): axum::Json<Classification>,
) -> Response
where
    R: SessionRepository + 'static,
{
    match service.start(classification) {
        Ok(view) => (StatusCode::CREATED, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn session_handler<R>(
    State(service): State<SharedService<R>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
{
    match service.get(&SessionId(session_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn action_handler<R>(
    State(service): State<SharedService<R>>,
    Path(session_id): Path<String>,
    axum::Json(action): axum::Json<WorkflowAction>,
) -> Response
where
    R: SessionRepository + 'static,
{
    match service.apply(&SessionId(session_id), action).await {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn verify_handler<R>(
    State(service): State<SharedService<R>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
{
    match service.verify_hs_code(&SessionId(session_id)).await {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn save_handler<R>(
    State(service): State<SharedService<R>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
{
    match service.save(&SessionId(session_id)).await {
        Ok(saved) => (StatusCode::CREATED, axum::Json(saved)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn generate_handler<R>(
    State(service): State<SharedService<R>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
{
    match service.generate(&SessionId(session_id)).await {
        Ok(generated) => (StatusCode::CREATED, axum::Json(generated)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn abandon_handler<R>(
    State(service): State<SharedService<R>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
{
    match service.abandon(&SessionId(session_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: WorkflowServiceError) -> Response {
    let status = match &err {
        WorkflowServiceError::Session(SessionError::Wizard(WizardError::Incomplete { issues })) => {
            let payload = json!({
                "error": err.to_string(),
                "issues": issues,
            });
            return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
        }
        WorkflowServiceError::Session(SessionError::Wizard(WizardError::Closed(_))) => {
            StatusCode::CONFLICT
        }
        WorkflowServiceError::Session(_) | WorkflowServiceError::InvalidHsCode(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        WorkflowServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        WorkflowServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        WorkflowServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        WorkflowServiceError::Gateway(GatewayError::InvalidRequest(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        WorkflowServiceError::Gateway(gateway) if gateway.is_timeout() => {
            StatusCode::GATEWAY_TIMEOUT
        }
        WorkflowServiceError::Gateway(_) => StatusCode::BAD_GATEWAY,
        WorkflowServiceError::ConsentRequired => StatusCode::PRECONDITION_FAILED,
        WorkflowServiceError::Archive(ArchiveError::Collision { .. }) => StatusCode::CONFLICT,
        WorkflowServiceError::Archive(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": err.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
