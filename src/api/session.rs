//! Long-lived, authenticated WebSocket session to the venue.
//!
//! One connection is reused across discovery, candle fetch, and execution.
//! Requests are tagged with a `req_id` and the matching response is picked
//! out of the stream, skipping unsolicited frames. A dropped connection is
//! re-established (with exponential backoff) on the next request, and the
//! session re-authorizes after every reconnect.

use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::transport::{check_response, SessionError, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const DEFAULT_ENDPOINT: &str = "wss://ws.derivws.com/websockets/v3";

/// Connection settings for the venue session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// WebSocket endpoint, without query string
    pub endpoint: String,

    /// Registered application id, sent as `app_id`
    pub app_id: String,

    /// API token; empty means read-only (no authorization)
    #[serde(skip_serializing)]
    pub token: String,

    pub connect_timeout_secs: u64,
    pub response_timeout_secs: u64,

    /// Reconnect backoff: first delay, delay cap, and total budget per attempt
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_max_elapsed_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            app_id: "1089".to_string(),
            token: String::new(),
            connect_timeout_secs: 10,
            response_timeout_secs: 30,
            backoff_initial_ms: 1_000,
            backoff_max_ms: 30_000,
            backoff_max_elapsed_secs: 120,
        }
    }
}

impl SessionConfig {
    pub fn url(&self) -> String {
        format!("{}?app_id={}", self.endpoint, self.app_id)
    }

    fn backoff_policy(&self) -> ExponentialBackoff {
        let initial = Duration::from_millis(self.backoff_initial_ms);
        ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            max_interval: Duration::from_millis(self.backoff_max_ms),
            max_elapsed_time: Some(Duration::from_secs(self.backoff_max_elapsed_secs)),
            ..ExponentialBackoff::default()
        }
    }
}

/// WebSocket session implementing [`Transport`].
pub struct DerivSession {
    config: SessionConfig,
    ws: Option<WsStream>,
    next_req_id: u64,
    login_id: Option<String>,
}

impl DerivSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ws: None,
            next_req_id: 1,
            login_id: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.ws.is_some()
    }

    /// Account the session is authorized as, if any.
    pub fn login_id(&self) -> Option<&str> {
        self.login_id.as_deref()
    }

    /// Connect and authorize if there is no live connection.
    pub async fn ensure_connected(&mut self) -> Result<(), SessionError> {
        if self.ws.is_some() {
            return Ok(());
        }

        let url = self.config.url();
        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);

        let stream = backoff::future::retry(self.config.backoff_policy(), || {
            let url = url.clone();
            async move {
                connect_once(&url, connect_timeout).await.map_err(|e| {
                    warn!(error = %e, "Connection attempt failed, backing off");
                    backoff::Error::transient(e)
                })
            }
        })
        .await?;

        info!(endpoint = %self.config.endpoint, "Connected to venue");
        self.ws = Some(stream);

        if let Err(e) = self.authorize().await {
            self.ws = None;
            return Err(e);
        }

        Ok(())
    }

    async fn authorize(&mut self) -> Result<(), SessionError> {
        if self.config.token.is_empty() {
            warn!("No API token configured; session is read-only");
            return Ok(());
        }

        let response = self.round_trip(json!({ "authorize": self.config.token })).await?;
        let response = check_response(response).map_err(|e| match e {
            SessionError::Api { message, .. } => SessionError::Unauthorized(message),
            other => other,
        })?;

        self.login_id = response
            .pointer("/authorize/loginid")
            .and_then(Value::as_str)
            .map(str::to_string);

        info!(login_id = ?self.login_id, "Authorized");
        Ok(())
    }

    /// Send one request and wait for the response with the same `req_id`.
    async fn round_trip(&mut self, mut request: Value) -> Result<Value, SessionError> {
        let req_id = self.next_req_id;
        self.next_req_id += 1;

        if let Some(obj) = request.as_object_mut() {
            obj.insert("req_id".to_string(), json!(req_id));
        }

        let response_timeout = Duration::from_secs(self.config.response_timeout_secs);
        let ws = self.ws.as_mut().ok_or(SessionError::Closed)?;

        ws.send(Message::Text(request.to_string()))
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))?;

        let deadline = Instant::now() + response_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let frame = match timeout(remaining, ws.next()).await {
                Err(_) => return Err(SessionError::Timeout(response_timeout)),
                Ok(None) => return Err(SessionError::Closed),
                Ok(Some(Err(e))) => return Err(SessionError::Protocol(e.to_string())),
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Message::Text(text) => {
                    let value: Value = serde_json::from_str(&text)
                        .map_err(|e| SessionError::Protocol(format!("invalid JSON: {}", e)))?;

                    if value.get("req_id").and_then(Value::as_u64) == Some(req_id) {
                        return Ok(value);
                    }
                    debug!(
                        msg_type = ?value.get("msg_type"),
                        "Skipping unsolicited message"
                    );
                }
                Message::Ping(payload) => {
                    ws.send(Message::Pong(payload))
                        .await
                        .map_err(|e| SessionError::Protocol(e.to_string()))?;
                }
                Message::Close(_) => return Err(SessionError::Closed),
                _ => {}
            }
        }
    }

    /// Close the connection, if open.
    pub async fn close(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            if let Err(e) = ws.close(None).await {
                debug!(error = %e, "Error while closing session");
            }
            info!("Session closed");
        }
    }
}

#[async_trait]
impl Transport for DerivSession {
    async fn send(&mut self, request: Value) -> Result<Value, SessionError> {
        self.ensure_connected().await?;

        match self.round_trip(request).await {
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Session fault, dropping connection");
                self.ws = None;
                Err(e)
            }
            result => result,
        }
    }
}

async fn connect_once(url: &str, connect_timeout: Duration) -> Result<WsStream, SessionError> {
    match timeout(connect_timeout, connect_async(url)).await {
        Ok(Ok((stream, response))) => {
            debug!(status = ?response.status(), "WebSocket handshake complete");
            Ok(stream)
        }
        Ok(Err(e)) => Err(SessionError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(SessionError::Connect {
            url: url.to_string(),
            reason: format!("timed out after {:?}", connect_timeout),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::accept_async;

    type ServerStream = WebSocketStream<TcpStream>;

    async fn next_request(ws: &mut ServerStream) -> Value {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("client went away: {:?}", other),
            }
        }
    }

    fn reply(request: &Value, mut body: Value) -> Message {
        body["req_id"] = request["req_id"].clone();
        Message::Text(body.to_string())
    }

    fn local_config(port: u16) -> SessionConfig {
        SessionConfig {
            endpoint: format!("ws://127.0.0.1:{}", port),
            token: "tok".to_string(),
            connect_timeout_secs: 2,
            response_timeout_secs: 5,
            backoff_initial_ms: 10,
            backoff_max_ms: 50,
            backoff_max_elapsed_secs: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_url_includes_app_id() {
        let config = SessionConfig {
            app_id: "109903".to_string(),
            ..Default::default()
        };
        assert_eq!(config.url(), "wss://ws.derivws.com/websockets/v3?app_id=109903");
    }

    #[test]
    fn test_token_is_not_serialized() {
        let config = SessionConfig {
            token: "secret".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_with_connect_error() {
        let mut session = DerivSession::new(SessionConfig {
            endpoint: "ws://127.0.0.1:1".to_string(),
            connect_timeout_secs: 1,
            backoff_initial_ms: 10,
            backoff_max_ms: 20,
            backoff_max_elapsed_secs: 0,
            ..Default::default()
        });

        let result = session.send(json!({"ping": 1})).await;
        assert!(matches!(result, Err(SessionError::Connect { .. })));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_session_correlates_replies_and_reauthorizes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<Value>();

        let server = tokio::spawn(async move {
            // First connection: noise before the reply, then hang up.
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let auth = next_request(&mut ws).await;
            ws.send(reply(&auth, json!({"authorize": {"loginid": "CR1"}}))).await.unwrap();

            let request = next_request(&mut ws).await;
            ws.send(Message::Text(json!({"req_id": 999, "msg_type": "tick"}).to_string()))
                .await
                .unwrap();
            ws.send(Message::Ping(vec![7])).await.unwrap();
            let pong = loop {
                match ws.next().await {
                    Some(Ok(Message::Pong(payload))) => break payload,
                    Some(Ok(_)) => continue,
                    other => panic!("no pong: {:?}", other),
                }
            };
            ws.send(reply(&request, json!({"ping": "pong"}))).await.unwrap();
            ws.close(None).await.ok();
            drop(ws);

            // Second connection: record what the client sends first.
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let auth = next_request(&mut ws).await;
            seen_tx.send(auth.clone()).unwrap();
            ws.send(reply(&auth, json!({"authorize": {"loginid": "CR1"}}))).await.unwrap();

            let request = next_request(&mut ws).await;
            seen_tx.send(request.clone()).unwrap();
            ws.send(reply(&request, json!({"ping": "pong"}))).await.unwrap();

            pong
        });

        let mut session = DerivSession::new(local_config(port));

        let first = session.send(json!({"ping": 1})).await.unwrap();
        assert_eq!(first["req_id"], 2);
        assert_eq!(first["ping"], "pong");
        assert_eq!(session.login_id(), Some("CR1"));

        let dropped = session.send(json!({"ping": 1})).await;
        assert!(matches!(dropped, Err(ref e) if e.is_transient()), "{:?}", dropped);
        assert!(!session.is_connected());

        let third = session.send(json!({"ping": 1})).await.unwrap();
        assert_eq!(third["ping"], "pong");
        assert!(session.is_connected());

        let reauth = seen_rx.recv().await.unwrap();
        assert_eq!(reauth["authorize"], "tok");
        let request = seen_rx.recv().await.unwrap();
        assert_eq!(request["ping"], 1);
        assert!(request["req_id"].as_u64() > reauth["req_id"].as_u64());

        assert_eq!(server.await.unwrap(), vec![7]);
        session.close().await;
    }
}
