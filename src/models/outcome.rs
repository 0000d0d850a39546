//! Result of a single execution attempt.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why an execution attempt did not produce a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The venue declined the proposal (quote rejected). Not retried in-call.
    VenueRejected,
    /// The buy step did not return a fill.
    ConfirmationMissing,
    /// Connection or protocol fault; eligible for the controller's backoff.
    TransportFailure,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::VenueRejected => "venue_rejected",
            FailureReason::ConfirmationMissing => "confirmation_missing",
            FailureReason::TransportFailure => "transport_failure",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one execution attempt, consumed by the risk governor and the
/// loop controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub accepted: bool,

    /// Profit reported by the venue's fill confirmation (zero on failure)
    pub realized_profit: Decimal,

    pub failure_reason: Option<FailureReason>,

    /// Venue contract id, when a fill was confirmed
    #[serde(default)]
    pub contract_id: Option<String>,

    /// Venue message accompanying a failure
    #[serde(default)]
    pub detail: Option<String>,
}

impl TradeOutcome {
    pub fn filled(realized_profit: Decimal, contract_id: Option<String>) -> Self {
        Self {
            accepted: true,
            realized_profit,
            failure_reason: None,
            contract_id,
            detail: None,
        }
    }

    pub fn failed(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            accepted: false,
            realized_profit: Decimal::ZERO,
            failure_reason: Some(reason),
            contract_id: None,
            detail: Some(detail.into()),
        }
    }
}
