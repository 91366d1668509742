//! HTTP response helpers
//!
//! Successful lock calls answer with their bare JSON body (a denied acquire
//! is a 200 with `granted=false`). Failures use the `{code, message, data}`
//! envelope.

use actix_web::{HttpResponse, HttpResponseBuilder, error, http::StatusCode};
use serde::{Deserialize, Serialize};

use editlock_common::LockError;
use editlock_common::error::{ErrorCode, PARAMETER_MISSING};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Result<T> {
    pub code: i32,
    pub message: String,
    pub data: T,
}

impl<T> Result<T> {
    pub fn new(code: i32, message: String, data: T) -> Self {
        Result::<T> {
            code,
            message,
            data,
        }
    }

    pub fn http_response(
        status: StatusCode,
        code: i32,
        message: String,
        data: impl Serialize,
    ) -> HttpResponse {
        HttpResponseBuilder::new(status).json(Result::new(code, message, data))
    }
}

/// HTTP status for a lock failure
pub fn status_for(err: &LockError) -> StatusCode {
    match err {
        LockError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        LockError::TransientIo(_) => StatusCode::SERVICE_UNAVAILABLE,
        LockError::Configuration(_) | LockError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn http_error(err: &LockError) -> HttpResponse {
    let code: ErrorCode<'static> = err.error_code();
    Result::<()>::http_response(status_for(err), code.code, err.to_string(), ())
}

/// Malformed or incomplete JSON bodies become a 400 in the error envelope
pub fn json_error_handler(
    err: error::JsonPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    let message = format!("{}: {}", PARAMETER_MISSING.message, err);
    let response = Result::<()>::http_response(
        StatusCode::BAD_REQUEST,
        PARAMETER_MISSING.code,
        message,
        (),
    );
    error::InternalError::from_response(err, response).into()
}

/// Missing query parameters become a 400 in the error envelope
pub fn query_error_handler(
    err: error::QueryPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    let message = format!("{}: {}", PARAMETER_MISSING.message, err);
    let response = Result::<()>::http_response(
        StatusCode::BAD_REQUEST,
        PARAMETER_MISSING.code,
        message,
        (),
    );
    error::InternalError::from_response(err, response).into()
}
