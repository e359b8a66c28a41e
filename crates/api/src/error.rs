//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses carry a JSON body `{"error": <kind>, "message": <text>}`; stock
//! and product errors add `product_id` and the stock figures. Server-side
//! failures never expose their details.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::orders::OrderError;

/// Seconds a client should wait before retrying a transient failure.
const RETRY_AFTER_SECS: &str = "1";

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Order engine rejected or failed the operation.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but may not do this.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// How an error is presented to the client.
struct Rendered {
    status: StatusCode,
    kind: &'static str,
    message: String,
    details: Option<Value>,
}

impl Rendered {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            details: None,
        }
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "Internal server error",
        )
    }

    fn transient() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "transient",
            "Temporarily unavailable, please retry",
        )
    }
}

fn render_repository(err: &RepositoryError) -> Rendered {
    if err.is_transient() {
        return Rendered::transient();
    }
    match err {
        RepositoryError::NotFound => Rendered::new(StatusCode::NOT_FOUND, "not_found", "Not found"),
        RepositoryError::Conflict(msg) => Rendered::new(StatusCode::CONFLICT, "conflict", msg),
        RepositoryError::InvalidReference(msg) => {
            Rendered::new(StatusCode::BAD_REQUEST, "validation", msg)
        }
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => Rendered::internal(),
    }
}

fn render_order(err: &OrderError) -> Rendered {
    match err {
        OrderError::Validation(msg) => Rendered::new(StatusCode::BAD_REQUEST, "validation", msg),
        OrderError::ProductNotFound { product_id } => Rendered {
            details: Some(json!({ "product_id": product_id })),
            ..Rendered::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
        },
        OrderError::OrderNotFound(_) => {
            Rendered::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        OrderError::InsufficientStock {
            product_id,
            product_name,
            requested,
            available,
        } => Rendered {
            details: Some(json!({
                "product_id": product_id,
                "product_name": product_name,
                "requested": requested,
                "available": available,
            })),
            ..Rendered::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "insufficient_stock",
                err.to_string(),
            )
        },
        OrderError::Conflict(msg) => Rendered::new(StatusCode::CONFLICT, "conflict", msg),
        OrderError::Transient(_) => Rendered::transient(),
        OrderError::Internal(_) => Rendered::internal(),
    }
}

impl AppError {
    fn render(&self) -> Rendered {
        match self {
            Self::Database(err) => render_repository(err),
            Self::Order(err) => render_order(err),
            Self::NotFound(msg) => Rendered::new(StatusCode::NOT_FOUND, "not_found", msg),
            Self::Unauthorized(msg) => Rendered::new(StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Self::Forbidden(msg) => Rendered::new(StatusCode::FORBIDDEN, "forbidden", msg),
            Self::BadRequest(msg) => Rendered::new(StatusCode::BAD_REQUEST, "validation", msg),
            Self::Internal(_) => Rendered::internal(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let rendered = self.render();

        // Capture server errors to Sentry
        if rendered.status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let mut body = json!({
            "error": rendered.kind,
            "message": rendered.message,
        });
        if let (Some(Value::Object(details)), Some(obj)) = (rendered.details, body.as_object_mut())
        {
            obj.extend(details);
        }

        let mut response = (rendered.status, Json(body)).into_response();
        if rendered.status == StatusCode::SERVICE_UNAVAILABLE {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from_static(RETRY_AFTER_SECS),
            );
        }
        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for an authenticated shop owner.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}
