//! Transport glue. The engine itself speaks neither HTTP nor SSE wire
//! framing directly — [`crate::fanout::SseSink`] is transport-agnostic — but
//! something has to bridge a sink to an actual HTTP response body. This
//! module is that bridge for `axum`; a caller using a different web
//! framework writes their own `SseSink` impl instead.

#[cfg(feature = "server")]
pub mod sse;
