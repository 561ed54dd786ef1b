//! Template-backed HTTP responses.
//!
//! A [`TemplateResponse`] defers rendering until it is written out. Render
//! failures become a plain-text `500 Internal Server Error`; the error itself
//! is logged, not sent to the client.

use std::fmt;
use std::io;
use std::sync::Arc;

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use edge_core::error::EdgeResult;
use edge_template::{Context, Renderer};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, StatusCode};

/// The content type sent with rendered templates.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

const ERROR_BODY: &str = "Internal Server Error";

/// A response that renders a named template.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use edge_http::TemplateResponse;
/// use edge_template::{Context, Engine, StringLoader};
///
/// let loader = StringLoader::new();
/// loader.add("hello", "<p>{{ name }}</p>");
/// let engine = Arc::new(Engine::builder().loader(loader).build());
///
/// let response = TemplateResponse::new(engine, "hello", Context::new().with("name", "ada"));
/// assert_eq!(response.render().unwrap(), b"<p>ada</p>");
/// ```
pub struct TemplateResponse {
    renderer: Arc<dyn Renderer>,
    name: String,
    context: Context,
    status: StatusCode,
}

impl TemplateResponse {
    /// Creates a `200 OK` response for the named template.
    pub fn new(renderer: Arc<dyn Renderer>, name: impl Into<String>, context: Context) -> Self {
        Self {
            renderer,
            name: name.into(),
            context,
            status: StatusCode::OK,
        }
    }

    /// Sets the status used when rendering succeeds.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Returns the template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the render context.
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Returns the status used when rendering succeeds.
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Renders the template to bytes.
    ///
    /// # Errors
    ///
    /// Returns any loading, compilation or evaluation error.
    pub fn render(&self) -> EdgeResult<Vec<u8>> {
        self.renderer.render(&self.name, &self.context)
    }

    /// Sets the HTML content type unless `headers` already carries one.
    pub fn write_content_type(&self, headers: &mut HeaderMap) {
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
        }
    }

    /// Renders the template into `writer`.
    ///
    /// Nothing is written if rendering fails.
    ///
    /// # Errors
    ///
    /// Returns the render error, or `IoError` if the write fails.
    pub fn write_to(&self, writer: &mut impl io::Write) -> EdgeResult<()> {
        let bytes = self.render()?;
        writer.write_all(&bytes)?;
        Ok(())
    }
}

impl fmt::Debug for TemplateResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateResponse")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl IntoResponse for TemplateResponse {
    fn into_response(self) -> Response {
        match self.render() {
            Ok(bytes) => {
                let mut response = Response::new(Body::from(bytes));
                *response.status_mut() = self.status;
                self.write_content_type(response.headers_mut());
                response
            }
            Err(e) => {
                tracing::warn!(template = %self.name, error = %e, "failed to render template");
                let mut response = Response::new(Body::from(ERROR_BODY));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                );
                response
            }
        }
    }
}
