//! Request/response capability the trading core needs from the venue.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by a venue session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("authorization rejected: {0}")]
    Unauthorized(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("connection closed by venue")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The venue answered with an `error` object.
    #[error("venue error {code}: {message}")]
    Api { code: String, message: String },
}

impl SessionError {
    /// Whether the fault lies with the connection rather than the request,
    /// so reconnecting and retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionError::Connect { .. }
                | SessionError::Timeout(_)
                | SessionError::Closed
                | SessionError::Protocol(_)
        )
    }
}

/// Send one JSON request and receive its correlated JSON response.
#[async_trait]
pub trait Transport: Send {
    /// Raw exchange; the response may still carry a venue `error` object.
    async fn send(&mut self, request: Value) -> Result<Value, SessionError>;

    /// Exchange and treat any response with an `error` field as a failed call.
    async fn request(&mut self, request: Value) -> Result<Value, SessionError> {
        let response = self.send(request).await?;
        check_response(response)
    }
}

/// Convert a response carrying an `error` object into [`SessionError::Api`].
pub fn check_response(response: Value) -> Result<Value, SessionError> {
    match response.get("error") {
        None | Some(Value::Null) => Ok(response),
        Some(error) => {
            let code = error
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            Err(SessionError::Api { code, message })
        }
    }
}

/// Encode a typed request as the JSON object sent on the wire.
pub fn to_request<Req: Serialize + ?Sized>(request: &Req) -> Result<Value, SessionError> {
    serde_json::to_value(request).map_err(|e| SessionError::Protocol(format!("invalid request: {}", e)))
}

/// Send a typed request and decode the typed response.
///
/// A response that does not match `Resp` is a protocol error.
pub async fn call<T, Req, Resp>(transport: &mut T, request: &Req) -> Result<Resp, SessionError>
where
    T: Transport + ?Sized,
    Req: Serialize + Sync + ?Sized,
    Resp: DeserializeOwned,
{
    let response = transport.request(to_request(request)?).await?;
    serde_json::from_value(response)
        .map_err(|e| SessionError::Protocol(format!("unexpected response shape: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_response_passes_clean_responses() {
        let response = json!({"msg_type": "proposal", "proposal": {"id": "abc"}});
        assert!(check_response(response).is_ok());

        let response = json!({"proposal": {"id": "abc"}, "error": null});
        assert!(check_response(response).is_ok());
    }

    #[test]
    fn test_check_response_extracts_error() {
        let response = json!({"error": {"code": "InvalidSymbol", "message": "Symbol R_0 is invalid"}});
        match check_response(response) {
            Err(SessionError::Api { code, message }) => {
                assert_eq!(code, "InvalidSymbol");
                assert_eq!(message, "Symbol R_0 is invalid");
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn test_check_response_without_message() {
        let response = json!({"error": "no_proposal_id"});
        match check_response(response) {
            Err(SessionError::Api { code, message }) => {
                assert_eq!(code, "Unknown");
                assert_eq!(message, "\"no_proposal_id\"");
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(SessionError::Closed.is_transient());
        assert!(SessionError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!SessionError::Unauthorized("bad token".into()).is_transient());
        assert!(!SessionError::Api {
            code: "x".into(),
            message: "y".into()
        }
        .is_transient());
    }
}
