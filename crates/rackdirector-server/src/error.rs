//! HTTP boundary errors
//!
//! Every failed request is logged here and answered with a JSON
//! [`ErrorResponse`] carrying the error kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rackdirector_provision::ProvisionError;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use thiserror::Error;
use tracing::{error, warn};

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Error type for HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// Caller is not reachable over IPv4
    #[error("peer {0} has no IPv4 address")]
    UnsupportedPeer(IpAddr),

    /// Static file or route does not exist
    #[error("{0} not found")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    /// Machine-readable error code
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Provision(err) => err.kind(),
            ApiError::UnsupportedPeer(_) => "unsupported_peer",
            ApiError::NotFound(_) => "not_found",
            ApiError::Io { .. } => "io_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Provision(err) => match err {
                ProvisionError::HostNotFound(_) | ProvisionError::PlanNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                ProvisionError::PlanAlreadyActive { .. }
                | ProvisionError::NotInInstallStage { .. } => StatusCode::CONFLICT,
                ProvisionError::UnknownPlan(_) => StatusCode::BAD_REQUEST,
                ProvisionError::TemplateMissing(_) | ProvisionError::Render { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                ProvisionError::ManagementCommandFailure { .. } => StatusCode::BAD_GATEWAY,
            },
            ApiError::UnsupportedPeer(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(kind = self.kind(), status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
