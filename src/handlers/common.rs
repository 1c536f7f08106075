use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::errors::ServiceError;
use crate::ApiResponse;

/// Standard success response
pub fn success_response<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    envelope(StatusCode::OK, message, data)
}

/// Standard created response
pub fn created_response<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    envelope(StatusCode::CREATED, message, data)
}

fn envelope<T: Serialize>(status: StatusCode, message: impl Into<String>, data: T) -> Response {
    (status, Json(ApiResponse::new(status, message, data))).into_response()
}

/// Unwraps a JSON body, reporting malformed input as a 422.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    let Json(body) = payload?;
    Ok(body)
}

/// Unwraps a path parameter, reporting malformed ids as a 422.
pub fn path_param<T>(param: Result<Path<T>, PathRejection>) -> Result<T, ServiceError> {
    param
        .map(|Path(value)| value)
        .map_err(|rejection| ServiceError::ValidationError(rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    #[tokio::test]
    async fn created_response_carries_status_in_body() {
        let response = created_response("store created", serde_json::json!({"name": "Deli"}));
        assert_eq!(response.status(), StatusCode::CREATED);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["status"], 201);
        assert_eq!(body["message"], "store created");
        assert_eq!(body["data"]["name"], "Deli");
    }
}
