use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::{Map, Value, json};

/// Errors surfaced to API clients.
///
/// Domain failures render as `{"detail": ["..."]}`; field validation failures
/// render keyed by the offending field, e.g. `{"premise_id": "..."}`.
#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    BadRequest(String),

    #[display(fmt = "{}: {}", field, message)]
    Field {
        field: &'static str,
        message: String,
    },

    /// Rejection carrying extra context fields next to `detail`.
    #[display(fmt = "{}", message)]
    Rejected {
        message: String,
        context: Map<String, Value>,
    },

    #[display(fmt = "{}", _0)]
    Unauthorized(String),

    #[display(fmt = "{}", _0)]
    Forbidden(String),

    #[display(fmt = "{}", _0)]
    NotFound(String),

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "{}", _0)]
    TooManyRequests(String),

    #[display(fmt = "Internal Server Error")]
    Internal,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Field {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Field { .. } | ApiError::Rejected { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Field { field, message } => {
                let mut body = Map::new();
                body.insert((*field).to_string(), json!(message));
                Value::Object(body)
            }
            ApiError::Rejected { message, context } => {
                let mut body = context.clone();
                body.insert("detail".to_string(), json!([message]));
                Value::Object(body)
            }
            other => json!({ "detail": [other.to_string()] }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "Database error");
        ApiError::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_json(err: ApiError) -> (StatusCode, Value) {
        let resp = err.error_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_web::test]
    async fn domain_errors_render_detail_list() {
        let (status, body) = body_json(ApiError::bad_request("no suitable shift")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "detail": ["no suitable shift"] }));
    }

    #[actix_web::test]
    async fn field_errors_are_keyed_by_field() {
        let (status, body) =
            body_json(ApiError::field("premise_id", "This field is required.")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "premise_id": "This field is required." }));
    }

    #[actix_web::test]
    async fn rejected_keeps_context() {
        let mut context = Map::new();
        context.insert("shift_id".into(), json!(7));
        let (_, body) = body_json(ApiError::Rejected {
            message: "outside allowed window".into(),
            context,
        })
        .await;
        assert_eq!(body["shift_id"], 7);
        assert_eq!(body["detail"][0], "outside allowed window");
    }

    #[actix_web::test]
    async fn internal_hides_cause() {
        let (status, body) = body_json(ApiError::from(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"][0], "Internal Server Error");
    }
}
