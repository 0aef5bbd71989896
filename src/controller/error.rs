use axum::{
    Json,
    response::{IntoResponse, Response},
};
use reqwest::StatusCode;
use serde_json::json;

#[derive(Debug)]
pub enum BaseError {
    ParamInvalid(Option<String>),
    NotFound(Option<String>),
    DatabaseFatal(Option<String>),
    ServiceUnavailable(Option<String>),
    UpstreamGateway(Option<String>),
    InternalServerError(Option<String>),
}

impl From<diesel::result::Error> for BaseError {
    fn from(err: diesel::result::Error) -> Self {
        BaseError::DatabaseFatal(Some(err.to_string()))
    }
}

impl std::fmt::Display for BaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (_, _, msg) = self.parts();
        write!(f, "{}", msg)
    }
}

impl BaseError {
    fn parts(&self) -> (StatusCode, usize, String) {
        match self {
            BaseError::ParamInvalid(msg) => (
                StatusCode::BAD_REQUEST,
                1001,
                msg.clone()
                    .unwrap_or_else(|| "request params invalid".to_string()),
            ),
            BaseError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                1002,
                msg.clone().unwrap_or_else(|| "data not found".to_string()),
            ),
            BaseError::DatabaseFatal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                1100,
                msg.clone()
                    .unwrap_or_else(|| "database unknown error".to_string()),
            ),
            BaseError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                1300,
                msg.clone()
                    .unwrap_or_else(|| "no video provider available".to_string()),
            ),
            BaseError::UpstreamGateway(msg) => (
                StatusCode::BAD_GATEWAY,
                1301,
                msg.clone()
                    .unwrap_or_else(|| "video provider request failed".to_string()),
            ),
            BaseError::InternalServerError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                0,
                msg.clone()
                    .unwrap_or_else(|| "internal server error".to_string()),
            ),
        }
    }
}

impl IntoResponse for BaseError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message) = self.parts();
        let body = Json(json!({
            "code": error_code,
            "msg": error_message,
        }));
        (status, body).into_response()
    }
}
