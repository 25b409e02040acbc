//! Panic containment
//!
//! Outermost layer of the chain: `tower-http`'s `CatchPanicLayer` with a
//! custom mapper, so a panicking handler produces the gateway's standard
//! `internal_error` JSON body instead of tearing down the connection. The
//! layer never re-panics; the fault is logged before the response is
//! built.

use std::any::Any;

use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::ApiError;

type PanicMapper = fn(Box<dyn Any + Send + 'static>) -> Response;

/// Build the panic-containment layer
pub fn layer() -> CatchPanicLayer<PanicMapper> {
    CatchPanicLayer::custom(response_for_panic as PanicMapper)
}

fn response_for_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    tracing::error!(panic = %detail, "request handler panicked");
    ApiError::internal().into_response()
}
