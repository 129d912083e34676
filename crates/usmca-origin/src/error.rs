use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::telemetry::TelemetryError;
use crate::workflows::certificate::WorkflowServiceError;
use crate::workflows::origin::{BomImportError, HsCodeError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Gateway(GatewayError),
    Bom(BomImportError),
    HsCode(HsCodeError),
    Workflow(WorkflowServiceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Gateway(err) => write!(f, "trust api error: {}", err),
            AppError::Bom(err) => write!(f, "bill of materials error: {}", err),
            AppError::HsCode(err) => write!(f, "classification error: {}", err),
            AppError::Workflow(err) => write!(f, "workflow error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Gateway(err) => Some(err),
            AppError::Bom(err) => Some(err),
            AppError::HsCode(err) => Some(err),
            AppError::Workflow(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Bom(_) | AppError::HsCode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Gateway(err) if err.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Workflow(_)
            | AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<GatewayError> for AppError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

impl From<BomImportError> for AppError {
    fn from(value: BomImportError) -> Self {
        Self::Bom(value)
    }
}

impl From<HsCodeError> for AppError {
    fn from(value: HsCodeError) -> Self {
        Self::HsCode(value)
    }
}

impl From<WorkflowServiceError> for AppError {
    fn from(value: WorkflowServiceError) -> Self {
        Self::Workflow(value)
    }
}
