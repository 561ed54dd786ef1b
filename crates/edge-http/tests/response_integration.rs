//! Integration tests for serving templates over axum.
//!
//! Tests cover: rendering through a handler, body and header contents,
//! layouts behind a response, and failure responses.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use edge_http::{TemplateResponse, HTML_CONTENT_TYPE};
use edge_template::{Context, Engine, StringLoader};
use http::header::CONTENT_TYPE;
use http::StatusCode;
use http_body_util::BodyExt;

fn engine() -> Arc<Engine> {
    let loader = StringLoader::new();
    loader.add("main", "<html><body>@!section('body')</body></html>");
    loader.add("home", "@layout('main') @section('body')<h1>{{ title }}</h1>@end");
    loader.add("broken", "{{ missing_variable }}");
    Arc::new(Engine::builder().loader(loader).build())
}

async fn home(State(engine): State<Arc<Engine>>) -> TemplateResponse {
    TemplateResponse::new(engine, "home", Context::new().with("title", "Welcome"))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ═════════════════════════════════════════════════════════════════════
// 1. Successful renders
// ═════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_handler_renders_layout() {
    let engine = engine();
    let response = home(State(Arc::clone(&engine))).await.into_response();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        HTML_CONTENT_TYPE
    );
    assert_eq!(
        body_string(response).await,
        "<html><body><h1>Welcome</h1></body></html>"
    );
    assert!(engine.is_cached("home"));
    assert!(engine.is_cached("main"));
}

#[tokio::test]
async fn test_response_from_spawned_tasks() {
    let engine = engine();
    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let ctx = Context::new().with("title", i);
                let response = TemplateResponse::new(engine, "home", ctx).into_response();
                body_string(response).await
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(
            task.await.unwrap(),
            format!("<html><body><h1>{i}</h1></body></html>")
        );
    }
}

// ═════════════════════════════════════════════════════════════════════
// 2. Failures
// ═════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_evaluation_failure_is_500_without_details() {
    let response = TemplateResponse::new(engine(), "broken", Context::new()).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_string(response).await;
    assert_eq!(body, "Internal Server Error");
    assert!(!body.contains("missing_variable"));
}

#[tokio::test]
async fn test_missing_template_is_500() {
    let response = TemplateResponse::new(engine(), "nope", Context::new()).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_write_to_buffer() {
    let response = TemplateResponse::new(engine(), "home", Context::new().with("title", "x"));
    let mut buffer = Vec::new();
    response.write_to(&mut buffer).unwrap();
    assert_eq!(buffer, b"<html><body><h1>x</h1></body></html>");
}
