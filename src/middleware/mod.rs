//! Middleware del sistema
//!
//! CORS configurable por entorno; el tracing de requests lo aporta
//! `tower_http::trace::TraceLayer` al armar el router.

pub mod cors;

pub use cors::cors_layer;
