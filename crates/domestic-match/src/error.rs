use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::domestic_work::{
    DirectoryImportError, DraftStoreError, GatewayError, WizardError,
};
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
    Wizard(WizardError),
    Gateway(GatewayError),
    DirectoryImport(DirectoryImportError),
    DraftStore(DraftStoreError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Wizard(err) => write!(f, "wizard error: {}", err),
            AppError::Gateway(err) => write!(f, "gateway error: {}", err),
            AppError::DirectoryImport(err) => write!(f, "directory import error: {}", err),
            AppError::DraftStore(err) => write!(f, "draft store error: {}", err),
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
            AppError::Wizard(err) => Some(err),
            AppError::Gateway(err) => Some(err),
            AppError::DirectoryImport(err) => Some(err),
            AppError::DraftStore(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Wizard(_) | AppError::DirectoryImport(_) => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::DraftStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
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

impl From<WizardError> for AppError {
    fn from(value: WizardError) -> Self {
        Self::Wizard(value)
    }
}

impl From<GatewayError> for AppError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

impl From<DirectoryImportError> for AppError {
    fn from(value: DirectoryImportError) -> Self {
        Self::DirectoryImport(value)
    }
}

impl From<DraftStoreError> for AppError {
    fn from(value: DraftStoreError) -> Self {
        Self::DraftStore(value)
    }
}
