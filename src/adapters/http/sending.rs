//! Sending transports: polling and streaming.
//!
//! | Transport | Mode | Format | Prelude |
//! |---|---|---|---|
//! | `xhr` | polling | newline | |
//! | `jsonp` | polling | callback | |
//! | `xhr_streaming` | streaming | newline | 2048 × `h` |
//! | `eventsource` | streaming | `data:` event | `\r\n` |
//! | `htmlfile` | streaming | `<script>` | HTML page |

use async_trait::async_trait;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::request::Parts;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::application::{Admission, Session};
use crate::config::TransportConfig;
use crate::domain::frame::{validate_callback, FrameFormat};
use crate::domain::session::Attributes;
use crate::domain::transport::{TransportRole, TransportType};
use crate::ports::Connection;

use super::exchange::{ExchangeMode, HttpExchange};
use super::{HttpTransportError, TransportHandler};

const HTMLFILE_MIN_LENGTH: usize = 1024;

const HTMLFILE_PAGE: &str = r#"<!doctype html>
<html><head>
  <meta http-equiv="X-UA-Compatible" content="IE=edge" />
  <meta http-equiv="Content-Type" content="text/html; charset=UTF-8" />
</head><body><h2>Don't panic!</h2>
  <script>
    document.domain = document.domain;
    var c = parent.{callback};
    c.start();
    function p(d) {c.message(d);};
    window.onload = function() {c.stop();};
  </script>"#;

pub struct SendingTransportHandler {
    transport: TransportType,
    config: Arc<TransportConfig>,
}

impl SendingTransportHandler {
    pub fn new(transport: TransportType, config: Arc<TransportConfig>) -> Self {
        Self { transport, config }
    }

    fn content_type(&self) -> &'static str {
        match self.transport {
            TransportType::EventSource => "text/event-stream;charset=UTF-8",
            TransportType::HtmlFile => "text/html;charset=UTF-8",
            _ => "application/javascript;charset=UTF-8",
        }
    }

    fn needs_callback(&self) -> bool {
        matches!(
            self.transport,
            TransportType::JsonpPolling | TransportType::HtmlFile
        )
    }

    fn mode(&self) -> ExchangeMode {
        match self.transport.role() {
            TransportRole::Streaming => ExchangeMode::Streaming {
                bytes_limit: self.config.streaming_bytes_limit,
            },
            _ => ExchangeMode::Polling,
        }
    }

    fn format(&self, callback: Option<&str>) -> FrameFormat {
        match (self.transport, callback) {
            (TransportType::JsonpPolling, Some(callback)) => FrameFormat::Jsonp {
                callback: callback.to_string(),
            },
            (TransportType::EventSource, _) => FrameFormat::EventSource,
            (TransportType::HtmlFile, _) => FrameFormat::HtmlFile,
            _ => FrameFormat::Newline,
        }
    }

    fn prelude(&self, callback: Option<&str>) -> Option<Bytes> {
        match self.transport {
            TransportType::XhrStreaming => {
                let mut prelude = "h".repeat(2048);
                prelude.push('\n');
                Some(Bytes::from(prelude))
            }
            TransportType::EventSource => Some(Bytes::from_static(b"\r\n")),
            TransportType::HtmlFile => {
                let mut page = HTMLFILE_PAGE.replace("{callback}", callback.unwrap_or_default());
                while page.len() < HTMLFILE_MIN_LENGTH {
                    page.push(' ');
                }
                page.push_str("\r\n");
                Some(Bytes::from(page))
            }
            _ => None,
        }
    }

    /// Reads and validates the `c` query parameter of script based transports.
    fn callback(&self, request: &Parts) -> Result<Option<String>, HttpTransportError> {
        if !self.needs_callback() {
            return Ok(None);
        }
        let query = request.uri.query().unwrap_or_default();
        let callback = url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "c")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .ok_or(HttpTransportError::CallbackRequired)?;
        validate_callback(&callback).map_err(|_| HttpTransportError::InvalidCallback)?;
        Ok(Some(callback))
    }

    fn spawn_time_limit(&self, session: Arc<Session>, exchange: Arc<HttpExchange>) {
        let Some(limit) = self.config.streaming_time_limit() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            if exchange.is_open() {
                trace!(session_id = %session.id(), "Streaming time limit reached");
                session.detach(exchange.id()).await;
                exchange.complete();
            }
        });
    }
}

#[async_trait]
impl TransportHandler for SendingTransportHandler {
    fn transport_type(&self) -> TransportType {
        self.transport
    }

    fn check_request(&self, request: &Parts) -> Result<(), HttpTransportError> {
        self.callback(request).map(|_| ())
    }

    async fn handle_request(
        &self,
        request: &Parts,
        _body: Bytes,
        session: Arc<Session>,
        attributes: Attributes,
    ) -> Result<Response, HttpTransportError> {
        let callback = self.callback(request)?;
        let (exchange, body) = HttpExchange::new(self.format(callback.as_deref()), self.mode());
        let exchange = Arc::new(exchange);

        if let Some(prelude) = self.prelude(callback.as_deref()) {
            // The body receiver is alive until this function returns.
            let _ = exchange.write_prelude(prelude);
        }

        match session.connect(exchange.clone(), attributes).await {
            Ok(Admission::Opened) | Ok(Admission::Resumed) => {
                if exchange.is_open() && matches!(self.mode(), ExchangeMode::Streaming { .. }) {
                    self.spawn_time_limit(session.clone(), exchange.clone());
                }
            }
            Ok(Admission::Rejected(status)) => {
                debug!(session_id = %session.id(), code = status.code(), "Sending request rejected");
            }
            Err(err) => {
                debug!(session_id = %session.id(), error = %err, "Sending request failed");
                exchange.complete();
            }
        }

        Ok((
            StatusCode::OK,
            [(CONTENT_TYPE, self.content_type())],
            body,
        )
            .into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::codec::JsonMessageCodec;
    use crate::adapters::memory::RecordingMessageHandler;
    use crate::application::SessionContext;
    use crate::domain::session::{CloseStatus, SessionId};
    use http::Request;

    fn session(config: &Arc<TransportConfig>) -> Arc<Session> {
        let context = SessionContext::new(
            Arc::new(RecordingMessageHandler::new()),
            Arc::new(JsonMessageCodec),
            config.clone(),
        );
        Session::new(
            SessionId::parse("s1").unwrap(),
            TransportType::XhrPolling,
            None,
            &context,
        )
    }

    fn parts(uri: &str) -> Parts {
        Request::builder()
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn xhr_polling_delivers_open_frame_then_completes() {
        let config = Arc::new(TransportConfig::default());
        let handler = SendingTransportHandler::new(TransportType::XhrPolling, config.clone());
        let session = session(&config);

        let response = handler
            .handle_request(&parts("/echo/0/s1/xhr"), Bytes::new(), session.clone(), Attributes::new())
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/javascript;charset=UTF-8"
        );
        assert_eq!(body_text(response).await, "o\n");
        assert!(!session.is_attached().await);
    }

    #[tokio::test]
    async fn polling_after_messages_flushes_cache() {
        let config = Arc::new(TransportConfig::default());
        let handler = SendingTransportHandler::new(TransportType::XhrPolling, config.clone());
        let session = session(&config);
        let open = handler
            .handle_request(&parts("/echo/0/s1/xhr"), Bytes::new(), session.clone(), Attributes::new())
            .await
            .unwrap();
        assert_eq!(body_text(open).await, "o\n");

        session.send_message("one".into()).await.unwrap();
        session.send_message("two".into()).await.unwrap();
        let poll = handler
            .handle_request(&parts("/echo/0/s1/xhr"), Bytes::new(), session, Attributes::new())
            .await
            .unwrap();

        assert_eq!(body_text(poll).await, "a[\"one\",\"two\"]\n");
    }

    #[tokio::test]
    async fn closed_session_answers_go_away() {
        let config = Arc::new(TransportConfig::default());
        let handler = SendingTransportHandler::new(TransportType::XhrPolling, config.clone());
        let session = session(&config);
        session.close(CloseStatus::NORMAL).await;

        let response = handler
            .handle_request(&parts("/echo/0/s1/xhr"), Bytes::new(), session, Attributes::new())
            .await
            .unwrap();

        assert_eq!(body_text(response).await, "c[3000,\"Go away!\"]\n");
    }

    #[tokio::test]
    async fn xhr_streaming_completes_after_byte_limit() {
        let config = Arc::new(TransportConfig {
            streaming_bytes_limit: 4,
            ..Default::default()
        });
        let handler = SendingTransportHandler::new(TransportType::XhrStreaming, config.clone());
        let session = session(&config);

        let response = handler
            .handle_request(
                &parts("/echo/0/s1/xhr_streaming"),
                Bytes::new(),
                session.clone(),
                Attributes::new(),
            )
            .await
            .unwrap();
        session.send_message("hello".into()).await.unwrap();

        let text = body_text(response).await;
        assert_eq!(text, format!("{}\no\na[\"hello\"]\n", "h".repeat(2048)));
        assert!(!session.is_attached().await);
    }

    #[tokio::test]
    async fn eventsource_wraps_frames_as_events() {
        let config = Arc::new(TransportConfig {
            streaming_bytes_limit: 1,
            ..Default::default()
        });
        let handler = SendingTransportHandler::new(TransportType::EventSource, config.clone());
        let session = session(&config);

        let response = handler
            .handle_request(&parts("/echo/0/s1/eventsource"), Bytes::new(), session, Attributes::new())
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/event-stream;charset=UTF-8"
        );
        assert_eq!(body_text(response).await, "\r\ndata: o\r\n\r\n");
    }

    #[tokio::test]
    async fn htmlfile_prelude_is_padded_and_names_callback() {
        let config = Arc::new(TransportConfig {
            streaming_bytes_limit: 1,
            ..Default::default()
        });
        let handler = SendingTransportHandler::new(TransportType::HtmlFile, config.clone());
        let session = session(&config);

        let response = handler
            .handle_request(&parts("/echo/0/s1/htmlfile?c=cb"), Bytes::new(), session, Attributes::new())
            .await
            .unwrap();
        let text = body_text(response).await;

        let (prelude, frames) = text.split_at(HTMLFILE_MIN_LENGTH + 2);
        assert!(prelude.contains("var c = parent.cb;"));
        assert!(prelude.ends_with("\r\n"));
        assert_eq!(frames, "<script>\np(\"o\");\n</script>\r\n");
    }

    #[test]
    fn jsonp_requires_valid_callback() {
        let config = Arc::new(TransportConfig::default());
        let handler = SendingTransportHandler::new(TransportType::JsonpPolling, config);

        assert!(matches!(
            handler.check_request(&parts("/echo/0/s1/jsonp")),
            Err(HttpTransportError::CallbackRequired)
        ));
        assert!(matches!(
            handler.check_request(&parts("/echo/0/s1/jsonp?c=alert(1)")),
            Err(HttpTransportError::InvalidCallback)
        ));
        assert!(handler.check_request(&parts("/echo/0/s1/jsonp?c=cb")).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn streaming_time_limit_completes_exchange_without_closing_session() {
        let config = Arc::new(TransportConfig {
            streaming_time_limit_ms: Some(1_000),
            ..Default::default()
        });
        let handler = SendingTransportHandler::new(TransportType::XhrStreaming, config.clone());
        let session = session(&config);

        let response = handler
            .handle_request(
                &parts("/echo/0/s1/xhr_streaming"),
                Bytes::new(),
                session.clone(),
                Attributes::new(),
            )
            .await
            .unwrap();
        let text = body_text(response).await;

        assert!(text.ends_with("o\n"));
        assert!(!session.is_attached().await);
        assert!(session.state().await.is_open());
    }
}
