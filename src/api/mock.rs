//! Scripted in-memory transport for tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use serde_json::Value;

use super::transport::{SessionError, Transport};

const OPERATIONS: &[&str] = &[
    "authorize",
    "active_symbols",
    "contracts_for",
    "ticks_history",
    "proposal",
    "buy",
];

/// Replays canned responses per operation and records every request sent.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: HashMap<&'static str, VecDeque<Result<Value, SessionError>>>,
    pub sent: Vec<Value>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, op: &'static str, response: Value) -> Self {
        self.push(op, Ok(response));
        self
    }

    pub fn fail(mut self, op: &'static str, error: SessionError) -> Self {
        self.push(op, Err(error));
        self
    }

    pub fn push(&mut self, op: &'static str, response: Result<Value, SessionError>) {
        self.responses.entry(op).or_default().push_back(response);
    }

    /// Requests sent for one operation, in order.
    pub fn sent_for(&self, op: &str) -> Vec<&Value> {
        self.sent.iter().filter(|r| r.get(op).is_some()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, request: Value) -> Result<Value, SessionError> {
        let op = OPERATIONS
            .iter()
            .copied()
            .find(|op| request.get(*op).is_some())
            .ok_or_else(|| SessionError::Protocol(format!("unknown operation: {}", request)))?;

        self.sent.push(request);

        self.responses
            .get_mut(op)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(SessionError::Protocol(format!("no scripted response for {}", op))))
    }
}
