use axum::{http::StatusCode, response::IntoResponse, Json};
use orbit_core::{DomainError, PermissionError};
use orbit_protocol::ProtocolError;

use super::types::ApiError;

#[derive(Debug)]
pub(crate) enum ApiFailure {
    InvalidRequest,
    NotFound,
    CapacityExceeded,
    Conflict,
    CategoryMismatch,
    Internal,
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<PermissionError> for ApiFailure {
    fn from(error: PermissionError) -> Self {
        match error {
            PermissionError::CapacityExceeded => Self::CapacityExceeded,
            PermissionError::CategoryMismatch { .. } => Self::CategoryMismatch,
            PermissionError::UnknownPlanet
            | PermissionError::UnknownMember
            | PermissionError::UnknownChannel
            | PermissionError::UnknownRole => Self::NotFound,
            PermissionError::DanglingParent { .. } => Self::InvalidRequest,
            PermissionError::SlotInUse(_)
            | PermissionError::InheritanceCycle { .. }
            | PermissionError::DefaultRoleImmutable
            | PermissionError::AlreadyMember
            | PermissionError::OwnerImmutable
            | PermissionError::ChannelHasChildren { .. } => Self::Conflict,
        }
    }
}

impl From<DomainError> for ApiFailure {
    fn from(_: DomainError) -> Self {
        Self::InvalidRequest
    }
}

impl From<ProtocolError> for ApiFailure {
    fn from(_: ProtocolError) -> Self {
        Self::InvalidRequest
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            Self::InvalidRequest => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            Self::CapacityExceeded => (StatusCode::CONFLICT, "capacity_exceeded"),
            Self::Conflict => (StatusCode::CONFLICT, "conflict"),
            Self::CategoryMismatch => (StatusCode::UNPROCESSABLE_ENTITY, "category_mismatch"),
            Self::Internal => {
                tracing::error!(event = "http.response", outcome = "internal_error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };
        (status, Json(ApiError { error })).into_response()
    }
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .with_span_list(true)
        .init();
}
