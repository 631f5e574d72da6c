//! Buffers handler responses so they can be stored.

use axum::{
    body::{Body, Bytes, HttpBody as _},
    http::{Response, response::Parts},
};

/// A handler response after capture.
#[derive(Debug)]
pub enum Captured {
    /// Body read into memory.
    Buffered { parts: Parts, body: Bytes },
    /// Body size unknown or above the limit; returned untouched.
    Passthrough(Response<Body>),
}

/// Reads the response body if its size is known and at most `max_body_bytes`.
pub async fn capture(
    response: Response<Body>,
    max_body_bytes: usize,
) -> Result<Captured, axum::Error> {
    let within_limit = response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= max_body_bytes as u64);

    if !within_limit {
        return Ok(Captured::Passthrough(response));
    }

    let (parts, body) = response.into_parts();
    let body = axum::body::to_bytes(body, max_body_bytes).await?;
    Ok(Captured::Buffered { parts, body })
}
