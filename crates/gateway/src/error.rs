//! Mapping from domain errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use outreach_core::error::Error;
use outreach_core::report::{Subject, ValidationReport};
use serde::Serialize;
use tracing::error;

/// A domain error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

/// JSON error body: `{ "error": kind, "message": ..., "report": ... }`.
#[derive(Debug, Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ValidationReport>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Schema(_) | Error::InvalidValue(_) | Error::Validation(_) | Error::Mapping(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::Serialization(_) => StatusCode::BAD_REQUEST,
            Error::Store(_) | Error::Config { .. } | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn report(&self) -> Option<ValidationReport> {
        match &self.0 {
            Error::Validation(report) => Some(report.clone()),
            Error::InvalidValue(e) => {
                let mut report = ValidationReport::new();
                report.reject(Subject::Field(e.field.clone()), e.clone());
                Some(report)
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        let body = ErrorBody {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
            report: self.report(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_core::error::{ConflictError, EntityKind, MappingError, Rule, StoreError, ValidationError};

    #[test]
    fn status_per_kind() {
        let cases = [
            (Error::not_found(EntityKind::Record, "1"), StatusCode::NOT_FOUND),
            (
                ConflictError::DuplicateField("city".into()).into(),
                StatusCode::CONFLICT,
            ),
            (
                MappingError::MissingKeyHeader.into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                StoreError::Unavailable("down".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn invalid_value_carries_report() {
        let err = ApiError(ValidationError::new("city", Rule::Options, "must be one of: Delhi").into());
        let report = err.report().unwrap();
        assert_eq!(report.issues[0].rule, Some(Rule::Options));
        assert_eq!(report.issues[0].subject, Subject::Field("city".into()));
    }
}
