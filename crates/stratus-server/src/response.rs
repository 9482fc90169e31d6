//! Response envelope and error mapping
//!
//! Success is `{code: 20000, message: "ok", data}`. Error kinds map onto
//! business codes and HTTP statuses; 416 additionally carries the
//! `Content-Range: bytes */{total}` header required for range probes.

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::{Response, StatusCode};
use serde::Serialize;

use stratus_core::domain::CoreError;

pub const CODE_OK: i64 = 20000;
pub const CODE_INVALID: i64 = 20001;
pub const CODE_UNAUTHORIZED: i64 = 40001;
pub const CODE_NOT_FOUND: i64 = 40004;
pub const CODE_CONFLICT: i64 = 40900;
pub const CODE_INTEGRITY: i64 = 41200;
pub const CODE_BAD_RANGE: i64 = 41600;
pub const CODE_RATE_LIMITED: i64 = 42900;
pub const CODE_CANCELLED: i64 = 49900;
pub const CODE_INTERNAL: i64 = 50000;
pub const CODE_STORAGE: i64 = 50300;

/// The wire envelope
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub type Body = BoxBody<Bytes, std::convert::Infallible>;

pub fn full_body(bytes: Bytes) -> Body {
    Full::new(bytes).boxed()
}

fn json_response<T: Serialize>(status: StatusCode, envelope: &Envelope<T>) -> Response<Body> {
    let body = serde_json::to_vec(envelope).unwrap_or_else(|e| {
        tracing::error!(error = %e, "envelope serialization failed");
        br#"{"code":50000,"message":"encoding failure"}"#.to_vec()
    });
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(full_body(Bytes::from(body)))
        .expect("static response parts are valid")
}

/// 200 with data.
pub fn success<T: Serialize>(data: T) -> Response<Body> {
    json_response(
        StatusCode::OK,
        &Envelope {
            code: CODE_OK,
            message: "ok".to_string(),
            data: Some(data),
        },
    )
}

/// 200 without data.
pub fn success_empty() -> Response<Body> {
    json_response::<()>(
        StatusCode::OK,
        &Envelope {
            code: CODE_OK,
            message: "ok".to_string(),
            data: None,
        },
    )
}

/// Arbitrary business error.
pub fn business_error(status: StatusCode, code: i64, message: impl Into<String>) -> Response<Body> {
    json_response::<()>(
        status,
        &Envelope {
            code,
            message: message.into(),
            data: None,
        },
    )
}

/// Maps a core error onto status, business code and (for 416) headers.
pub fn core_error(err: &CoreError) -> Response<Body> {
    let (status, code) = match err {
        CoreError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, CODE_INVALID),
        CoreError::NotFound(_) => (StatusCode::NOT_FOUND, CODE_NOT_FOUND),
        CoreError::Conflict(_) => (StatusCode::CONFLICT, CODE_CONFLICT),
        CoreError::Integrity(_) => (StatusCode::UNPROCESSABLE_ENTITY, CODE_INTEGRITY),
        CoreError::RangeNotSatisfiable { total } => {
            let mut resp = business_error(
                StatusCode::RANGE_NOT_SATISFIABLE,
                CODE_BAD_RANGE,
                err.to_string(),
            );
            let value = format!("bytes */{total}");
            if let Ok(header) = value.parse() {
                resp.headers_mut().insert("Content-Range", header);
            }
            return resp;
        }
        CoreError::StorageUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, CODE_STORAGE),
        CoreError::Cancelled => (StatusCode::INTERNAL_SERVER_ERROR, CODE_CANCELLED),
        CoreError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, CODE_INTERNAL),
    };

    if matches!(err, CoreError::Internal(_) | CoreError::StorageUnavailable(_)) {
        tracing::error!(kind = err.kind(), error = %err, "request failed");
    }
    business_error(status, code, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let resp = success(serde_json::json!({"id": 7}));
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_error_code_mapping() {
        let resp = core_error(&CoreError::NotFound("x".to_string()));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = core_error(&CoreError::Conflict("x".to_string()));
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = core_error(&CoreError::Integrity("x".to_string()));
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_range_error_carries_content_range() {
        let resp = core_error(&CoreError::RangeNotSatisfiable { total: 1000 });
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            resp.headers().get("Content-Range").unwrap(),
            "bytes */1000"
        );
    }

    #[test]
    fn test_envelope_serialization() {
        let envelope = Envelope {
            code: CODE_OK,
            message: "ok".to_string(),
            data: Some(serde_json::json!({"x": 1})),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert_eq!(json, r#"{"code":20000,"message":"ok","data":{"x":1}}"#);
    }
}
