//! Request and response shapes for the venue's JSON API.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::Candle;

/// Candle history request (`ticks_history`, candle style).
#[derive(Debug, Clone, Serialize)]
pub struct CandlesRequest {
    pub ticks_history: String,
    pub end: &'static str,
    pub count: usize,
    /// Bar size in seconds
    pub granularity: u32,
    pub style: &'static str,
}

impl CandlesRequest {
    pub fn latest(symbol: &str, count: usize, granularity_mins: u32) -> Self {
        Self {
            ticks_history: symbol.to_string(),
            end: "latest",
            count,
            granularity: granularity_mins * 60,
            style: "candles",
        }
    }
}

/// Price proposal for a rise/fall contract.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalRequest {
    pub proposal: u8,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub basis: String,
    pub contract_type: String,
    pub currency: String,
    pub duration: u32,
    pub duration_unit: String,
    pub symbol: String,
}

/// Confirmation of a previously quoted proposal.
#[derive(Debug, Clone, Serialize)]
pub struct BuyRequest {
    pub buy: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveSymbolsRequest {
    pub active_symbols: &'static str,
    pub product_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractsForRequest {
    pub contracts_for: String,
}

/// Candle history response. Bars that fail to parse are dropped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandlesResponse {
    #[serde(default)]
    pub candles: Option<Vec<Value>>,
}

impl CandlesResponse {
    pub fn into_candles(self) -> Vec<Candle> {
        self.candles
            .unwrap_or_default()
            .into_iter()
            .filter_map(|bar| serde_json::from_value(bar).ok())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveSymbolsResponse {
    #[serde(default)]
    pub active_symbols: Vec<ActiveSymbol>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveSymbol {
    pub symbol: String,
    #[serde(default)]
    pub is_trading_suspended: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsForResponse {
    #[serde(default)]
    pub contracts_for: ContractsFor,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractsFor {
    #[serde(default)]
    pub available: Vec<AvailableContract>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailableContract {
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub min_contract_duration: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub max_contract_duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProposalResponse {
    pub proposal: Proposal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Proposal {
    pub id: String,
    #[serde(default)]
    pub ask_price: Option<Decimal>,
    #[serde(default)]
    pub payout: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuyResponse {
    pub buy: Buy,
}

/// Fill confirmation. Realized profit comes from the venue, never recomputed.
#[derive(Debug, Clone, Deserialize)]
pub struct Buy {
    #[serde(default, deserialize_with = "lenient_string")]
    pub contract_id: Option<String>,
    #[serde(default)]
    pub buy_price: Option<Decimal>,
    #[serde(default)]
    pub profit: Option<Decimal>,
}

/// Accept a string or a number and keep it as a string.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_candles_request_shape() {
        let request = serde_json::to_value(CandlesRequest::latest("R_25", 60, 1)).unwrap();
        assert_eq!(
            request,
            json!({
                "ticks_history": "R_25",
                "end": "latest",
                "count": 60,
                "granularity": 60,
                "style": "candles"
            })
        );
    }

    #[test]
    fn test_candles_response_skips_bad_bars() {
        let response: CandlesResponse = serde_json::from_value(json!({
            "candles": [
                {"open": 1.0, "high": 1.2, "low": 0.9, "close": 1.1, "epoch": 60},
                {"open": "oops", "high": 1.2, "low": 0.9, "close": 1.1, "epoch": 120},
                {"open": "1.1", "high": "1.3", "low": "1.0", "close": "1.2", "epoch": 180}
            ]
        }))
        .unwrap();

        let candles = response.into_candles();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 1.2);
    }

    #[test]
    fn test_candles_response_missing_sequence() {
        let response: CandlesResponse = serde_json::from_value(json!({"msg_type": "candles"})).unwrap();
        assert!(response.into_candles().is_empty());
    }

    #[test]
    fn test_buy_response_profit() {
        let response: BuyResponse =
            serde_json::from_value(json!({"buy": {"profit": -0.85, "contract_id": 12345}})).unwrap();
        assert_eq!(response.buy.profit, Some(dec!(-0.85)));
        assert_eq!(response.buy.contract_id.as_deref(), Some("12345"));
    }

    #[test]
    fn test_contract_durations_accept_numbers() {
        let response: ContractsForResponse = serde_json::from_value(json!({
            "contracts_for": {"available": [
                {"contract_type": "CALL", "min_contract_duration": "15s", "max_contract_duration": 365}
            ]}
        }))
        .unwrap();
        let contract = &response.contracts_for.available[0];
        assert_eq!(contract.min_contract_duration.as_deref(), Some("15s"));
        assert_eq!(contract.max_contract_duration.as_deref(), Some("365"));
    }
}
