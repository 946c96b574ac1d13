//! Integration tests for the HTTP emulated transports.
//!
//! These tests drive the full router the way a browser client would:
//! 1. A sending request (`xhr`) opens the session and receives `o`
//! 2. A receiving request (`xhr_send`) posts a batch of messages
//! 3. The echo handler queues replies, which the next poll collects
//!
//! Every request goes through `tower::ServiceExt::oneshot`; no socket is bound.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use std::sync::Arc;
use tower::ServiceExt;

use sockjs_transport::adapters::TransportService;
use sockjs_transport::config::TransportConfig;
use sockjs_transport::domain::session::{CloseStatus, SessionId, SessionState};
use sockjs_transport::ports::{HandlerError, MessageHandler, SessionHandle, TransportError};

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Echo;

#[async_trait]
impl MessageHandler for Echo {
    async fn after_connection_established(
        &self,
        _session: Arc<dyn SessionHandle>,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn handle_message(
        &self,
        session: Arc<dyn SessionHandle>,
        message: String,
    ) -> Result<(), HandlerError> {
        session.send_message(message).await?;
        Ok(())
    }

    async fn handle_transport_error(&self, _session: Arc<dyn SessionHandle>, _error: &TransportError) {
    }

    async fn after_connection_closed(&self, _session: Arc<dyn SessionHandle>, _status: &CloseStatus) {
    }
}

fn echo_service() -> Arc<TransportService> {
    TransportService::builder(Arc::new(Echo))
        .config(TransportConfig::default())
        .build()
}

async fn request(service: &Arc<TransportService>, method: Method, uri: &str, body: &str) -> Response {
    service
        .router()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// =============================================================================
// Polling
// =============================================================================

#[tokio::test]
async fn xhr_polling_echoes_posted_messages() {
    let service = echo_service();

    let open = request(&service, Method::POST, "/echo/000/abc/xhr", "").await;
    assert_eq!(open.status(), StatusCode::OK);
    assert_eq!(
        open.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/javascript;charset=UTF-8"
    );
    assert_eq!(body_text(open).await, "o\n");

    let send = request(
        &service,
        Method::POST,
        "/echo/000/abc/xhr_send",
        "[\"hello\",\"world\"]",
    )
    .await;
    assert_eq!(send.status(), StatusCode::NO_CONTENT);

    let poll = request(&service, Method::POST, "/echo/000/abc/xhr", "").await;
    assert_eq!(body_text(poll).await, "a[\"hello\",\"world\"]\n");
}

#[tokio::test]
async fn xhr_send_to_unknown_session_is_404() {
    let service = echo_service();

    let response = request(&service, Method::POST, "/echo/000/nobody/xhr_send", "[\"x\"]").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(service.registry().is_empty().await);
}

#[tokio::test]
async fn xhr_send_rejects_empty_and_broken_payloads() {
    let service = echo_service();
    request(&service, Method::POST, "/echo/000/abc/xhr", "").await;

    let empty = request(&service, Method::POST, "/echo/000/abc/xhr_send", "").await;
    assert_eq!(empty.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(empty).await, "Payload expected.");

    let broken = request(&service, Method::POST, "/echo/000/abc/xhr_send", "[\"x\"").await;
    assert_eq!(broken.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(broken).await, "Broken JSON encoding.");
}

#[tokio::test]
async fn closed_session_answers_go_away() {
    let service = echo_service();
    request(&service, Method::POST, "/echo/000/abc/xhr", "").await;

    let session = service
        .registry()
        .get(&SessionId::parse("abc").unwrap())
        .await
        .unwrap();
    session.close(CloseStatus::NORMAL).await;
    assert_eq!(session.state().await, SessionState::Closed);

    let poll = request(&service, Method::POST, "/echo/000/abc/xhr", "").await;
    assert_eq!(body_text(poll).await, "c[3000,\"Go away!\"]\n");
}

// =============================================================================
// JSONP
// =============================================================================

#[tokio::test]
async fn jsonp_polling_requires_a_callback() {
    let service = echo_service();

    let response = request(&service, Method::GET, "/echo/000/abc/jsonp", "").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "\"callback\" parameter required");
    assert!(service.registry().is_empty().await);
}

#[tokio::test]
async fn jsonp_round_trip_through_form_encoded_send() {
    let service = echo_service();

    let open = request(&service, Method::GET, "/echo/000/abc/jsonp?c=cb", "").await;
    assert_eq!(body_text(open).await, "/**/cb(\"o\");\r\n");

    let send = Request::builder()
        .method(Method::POST)
        .uri("/echo/000/abc/jsonp_send")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("d=%5B%22ping%22%5D"))
        .unwrap();
    let send = service.router().oneshot(send).await.unwrap();
    assert_eq!(send.status(), StatusCode::OK);
    assert_eq!(body_text(send).await, "ok");

    let poll = request(&service, Method::GET, "/echo/000/abc/jsonp?c=cb", "").await;
    assert_eq!(body_text(poll).await, "/**/cb(\"a[\\\"ping\\\"]\");\r\n");
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn browser_preflight_on_cors_transport_is_204() {
    let service = echo_service();

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/echo/000/abc/xhr_send")
        .header(header::ORIGIN, "http://client.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = service.router().oneshot(preflight).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
        "OPTIONS, POST"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://client.example"
    );
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=31536000"
    );
}

#[tokio::test]
async fn preflight_on_jsonp_transport_is_404() {
    let service = echo_service();

    let response = request(&service, Method::OPTIONS, "/echo/000/abc/jsonp", "").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
