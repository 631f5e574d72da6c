//! Middleware stack para el servidor HTTP.
//!
//! Este modulo contiene los middleware de Tower que se aplican a todas las requests,
//! de afuera hacia adentro:
//! - `RequestIdLayer`: Genera/propaga X-Request-Id
//! - `LoggingLayer`: Logging estructurado de requests
//! - `RateLimitLayer`: Admision por cliente y clase de politica
//! - `ResponseCacheLayer`: Cache de respuestas con validacion condicional

mod capture;
mod logging;
mod rate_limit;
mod request_id;
mod response_cache;

pub use capture::{Captured, capture};
pub use logging::{LoggingLayer, LoggingMiddleware};
pub use rate_limit::{
    RATE_LIMIT_LIMIT, RATE_LIMIT_POLICY, RATE_LIMIT_REMAINING, RATE_LIMIT_RESET, RateLimitLayer,
    RateLimitMiddleware,
};
pub use request_id::{REQUEST_ID_HEADER, RequestIdLayer, RequestIdMiddleware};
pub use response_cache::{ResponseCacheLayer, ResponseCacheMiddleware, X_CACHE};
