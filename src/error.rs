use std::any::Any;

use axum::{
    extract::rejection::FormRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Everything a handler can fail with besides form validation.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Form(#[from] FormRejection),
    #[error("session encoding failed: {0}")]
    Session(#[from] jsonwebtoken::errors::Error),
    #[error("Not Found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Form(rejection) => rejection.status(),
            AppError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn message_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        message_response(status, self.to_string())
    }
}

/// Turns a handler panic into the same JSON body as [`AppError`].
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    error!(panic = %message, "request panicked");
    message_response(StatusCode::INTERNAL_SERVER_ERROR, message)
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}
