//! # edge-http
//!
//! HTTP adapter for edge. Wraps a named template and its context in a
//! [`TemplateResponse`] that renders into an axum response, or into any
//! [`std::io::Write`] sink.

pub mod response;

pub use response::{TemplateResponse, HTML_CONTENT_TYPE};
