//! HTTP middleware layers: CORS and per-request correlation ids.

pub mod cors;
pub mod trace;

pub use trace::TraceLayer;
