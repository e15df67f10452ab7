use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use crate::engine::EngineError;

/// Error type for HTTP handlers. Renders the `{"error": {...}}` envelope.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    /// Identity headers missing or unusable.
    Unauthenticated(String),
    /// Request body or query string could not be decoded.
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

/// HTTP status for a machine-readable error code.
pub fn status_for(code: &str) -> StatusCode {
    match code {
        "VALIDATION" | "FIELD_NOT_FOUND" | "FIELD_INACTIVE" | "SELF_CLAIM" | "LIMIT_EXCEEDED" => {
            StatusCode::BAD_REQUEST
        }
        "UNAUTHENTICATED" => StatusCode::UNAUTHORIZED,
        "TEAM_MISMATCH" | "TEAM_REQUIRED" | "DIVISION_MISMATCH" | "FORBIDDEN" => {
            StatusCode::FORBIDDEN
        }
        "NOT_FOUND" => StatusCode::NOT_FOUND,
        "NOT_OPEN" | "CANCELLED" | "CONFLICT" | "DOUBLE_BOOKING" => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message, details): (&str, String, Option<Value>) = match &self {
            ApiError::Engine(e) if e.code() == "INTERNAL" => {
                tracing::error!(error = %e, "internal error");
                ("INTERNAL", "An internal error occurred".to_string(), None)
            }
            ApiError::Engine(EngineError::DoubleBooking(conflicts)) => (
                "DOUBLE_BOOKING",
                self.to_string(),
                Some(json!({ "conflicts": conflicts })),
            ),
            ApiError::Engine(e) => (e.code(), e.to_string(), None),
            ApiError::Unauthenticated(msg) => ("UNAUTHENTICATED", msg.clone(), None),
            ApiError::BadRequest(msg) => ("VALIDATION", msg.clone(), None),
        };

        let mut error = json!({ "code": code, "message": message });
        if let Some(details) = details {
            error["details"] = details;
        }
        (status_for(code), Json(json!({ "error": error }))).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Engine(e) => write!(f, "{e}"),
            ApiError::Unauthenticated(msg) | ApiError::BadRequest(msg) => write!(f, "{msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SlotConflict, SlotStatus};
    use http_body_util::BodyExt;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn business_errors_map_to_statuses() {
        let cases = [
            (EngineError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (EngineError::FieldInactive("p/f".into()), StatusCode::BAD_REQUEST),
            (EngineError::SelfClaim, StatusCode::BAD_REQUEST),
            (EngineError::TeamRequired, StatusCode::FORBIDDEN),
            (
                EngineError::DivisionMismatch {
                    expected: "10U".into(),
                    actual: "12U".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (EngineError::NotFound("slot".into()), StatusCode::NOT_FOUND),
            (EngineError::NotOpen(SlotStatus::Confirmed), StatusCode::CONFLICT),
            (EngineError::Cancelled, StatusCode::CONFLICT),
            (EngineError::Conflict("lost".into()), StatusCode::CONFLICT),
        ];
        for (err, expected) in cases {
            let code = err.code();
            let (status, body) = render(ApiError::Engine(err)).await;
            assert_eq!(status, expected, "{code}");
            assert_eq!(body["error"]["code"], code);
            assert!(body["error"].get("details").is_none());
        }
    }

    #[tokio::test]
    async fn double_booking_carries_conflicts() {
        let err = EngineError::DoubleBooking(vec![SlotConflict {
            team_id: "A".into(),
            slot_id: "s-12u".into(),
            division: "12U".into(),
            game_date: "2026-04-10".into(),
            start_time: "18:00".into(),
            end_time: "20:00".into(),
            offering_team_id: "A".into(),
            confirmed_team_id: Some("X".into()),
        }]);
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "DOUBLE_BOOKING");
        let conflict = &body["error"]["details"]["conflicts"][0];
        assert_eq!(conflict["slotId"], "s-12u");
        assert_eq!(conflict["division"], "12U");
        assert_eq!(conflict["confirmedTeamId"], "X");
        assert_eq!(conflict["teamId"], "A");
    }

    #[tokio::test]
    async fn internal_errors_are_sanitized() {
        let (status, body) =
            render(EngineError::WalError("disk on fire at /var/data".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL");
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn unauthenticated_is_401() {
        let (status, body) = render(ApiError::Unauthenticated("missing x-user-id".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
    }
}
