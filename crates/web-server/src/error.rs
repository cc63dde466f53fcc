use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Engine error: {0}")]
    Engine(#[from] engine::EngineError),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Engine(engine::EngineError::BotNotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("bot {} not found", id))
            }
            AppError::Engine(engine::EngineError::WrongStrategy(id, kind)) => (
                StatusCode::BAD_REQUEST,
                format!("bot {} is not a {} bot", id, kind),
            ),
            AppError::Engine(err) => {
                tracing::error!(error = ?err, "Engine error.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal engine error occurred".to_string(),
                )
            }
            AppError::UnknownStrategy(name) => (
                StatusCode::BAD_REQUEST,
                format!("unknown strategy \"{}\"", name),
            ),
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
