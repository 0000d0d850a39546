//! Instrument discovery: pick a tradable symbol and a contract duration.
//!
//! Discovery never fails the cycle. If the venue cannot be asked, the first
//! configured symbol and the preferred duration are used.

use tracing::{debug, info, warn};

use crate::api::{
    call, ActiveSymbolsRequest, ActiveSymbolsResponse, AvailableContract, ContractsForRequest,
    ContractsForResponse, Transport,
};
use crate::models::{ContractDuration, Instrument};

use super::config::DiscoveryConfig;

const RISE_FALL: &[&str] = &["CALL", "PUT"];

pub struct InstrumentDiscovery {
    config: DiscoveryConfig,
}

impl InstrumentDiscovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    fn fallback_symbol(&self) -> String {
        self.config.symbols.first().cloned().unwrap_or_default()
    }

    fn preferred_duration(&self) -> ContractDuration {
        ContractDuration::minutes(self.config.preferred_duration_mins)
    }

    /// Resolve symbol then duration.
    pub async fn resolve<T: Transport + ?Sized>(&self, transport: &mut T) -> Instrument {
        let symbol = self.select_symbol(transport).await;
        let duration = self.negotiate_duration(transport, &symbol).await;
        Instrument::new(symbol, duration)
    }

    /// First configured symbol the venue lists as open for trading.
    pub async fn select_symbol<T: Transport + ?Sized>(&self, transport: &mut T) -> String {
        let request = ActiveSymbolsRequest {
            active_symbols: "brief",
            product_type: self.config.product_type.clone(),
        };

        let response: ActiveSymbolsResponse = match call(transport, &request).await {
            Ok(response) => response,
            Err(e) => {
                let fallback = self.fallback_symbol();
                warn!(error = %e, symbol = %fallback, "Symbol lookup failed, using first candidate");
                return fallback;
            }
        };

        let open: Vec<&str> = response
            .active_symbols
            .iter()
            .filter(|s| s.is_trading_suspended == 0)
            .map(|s| s.symbol.as_str())
            .collect();

        match self.config.symbols.iter().find(|c| open.contains(&c.as_str())) {
            Some(symbol) => {
                info!(symbol = %symbol, "Selected symbol");
                symbol.clone()
            }
            None => {
                let fallback = self.fallback_symbol();
                warn!(
                    candidates = ?self.config.symbols,
                    symbol = %fallback,
                    "No candidate symbol is active, using first candidate"
                );
                fallback
            }
        }
    }

    /// Contract duration for rise/fall on `symbol`, preferring the configured one.
    pub async fn negotiate_duration<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        symbol: &str,
    ) -> ContractDuration {
        let preferred = self.preferred_duration();
        let request = ContractsForRequest {
            contracts_for: symbol.to_string(),
        };

        let response: ContractsForResponse = match call(transport, &request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, duration = %preferred, "Duration lookup failed, using preferred");
                return preferred;
            }
        };

        match choose_duration(&response.contracts_for.available, self.config.preferred_duration_mins) {
            Some(duration) => {
                debug!(symbol = %symbol, duration = %duration, "Negotiated duration");
                duration
            }
            None => {
                warn!(symbol = %symbol, duration = %preferred, "No usable duration offered, using preferred");
                preferred
            }
        }
    }
}

/// Offered (min, max) durations in seconds for rise/fall contracts.
fn offered_ranges(available: &[AvailableContract]) -> Vec<(u64, u64)> {
    let is_rise_fall = |c: &&AvailableContract| {
        c.contract_type
            .as_deref()
            .map_or(false, |t| RISE_FALL.contains(&t))
    };

    let mut contracts: Vec<&AvailableContract> = available.iter().filter(is_rise_fall).collect();
    if contracts.is_empty() {
        // Untyped listings: consider everything.
        contracts = available.iter().collect();
    }

    contracts
        .into_iter()
        .filter_map(|c| {
            let min = ContractDuration::parse(c.min_contract_duration.as_deref()?)?.as_seconds();
            let max = match c.max_contract_duration.as_deref() {
                Some(max) => ContractDuration::parse(max)?.as_seconds(),
                None => min,
            };
            (min <= max).then_some((min, max))
        })
        .collect()
}

/// Preferred whole-minute duration if any range allows it, otherwise the
/// smallest whole minute above it that some range allows.
pub fn choose_duration(available: &[AvailableContract], preferred_mins: u32) -> Option<ContractDuration> {
    let ranges = offered_ranges(available);
    let preferred_secs = u64::from(preferred_mins) * 60;

    if ranges.iter().any(|(min, max)| (*min..=*max).contains(&preferred_secs)) {
        return Some(ContractDuration::minutes(preferred_mins));
    }

    ranges
        .iter()
        .filter_map(|(min, max)| {
            let mins = u64::from(preferred_mins).max(min.div_ceil(60));
            (mins * 60 <= *max).then_some(mins)
        })
        .min()
        .and_then(|mins| u32::try_from(mins).ok())
        .map(ContractDuration::minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::ScriptedTransport;
    use crate::api::SessionError;
    use serde_json::json;

    fn contract(kind: &str, min: &str, max: &str) -> AvailableContract {
        AvailableContract {
            contract_type: Some(kind.to_string()),
            min_contract_duration: Some(min.to_string()),
            max_contract_duration: Some(max.to_string()),
        }
    }

    fn discovery() -> InstrumentDiscovery {
        InstrumentDiscovery::new(DiscoveryConfig::default())
    }

    #[test]
    fn test_choose_preferred_when_offered() {
        let offered = vec![contract("CALL", "15s", "365d"), contract("PUT", "15s", "365d")];
        assert_eq!(choose_duration(&offered, 1), Some(ContractDuration::minutes(1)));
    }

    #[test]
    fn test_choose_smallest_above_preferred() {
        let offered = vec![contract("CALL", "3m", "1h"), contract("PUT", "5m", "1h")];
        assert_eq!(choose_duration(&offered, 1), Some(ContractDuration::minutes(3)));
    }

    #[test]
    fn test_choose_ignores_other_contract_types() {
        let offered = vec![contract("DIGITMATCH", "1m", "10m"), contract("CALL", "2m", "10m")];
        assert_eq!(choose_duration(&offered, 1), Some(ContractDuration::minutes(2)));
    }

    #[test]
    fn test_choose_none_when_nothing_fits() {
        let offered = vec![contract("CALL", "1s", "30s")];
        assert_eq!(choose_duration(&offered, 1), None);
        assert_eq!(choose_duration(&[], 1), None);
    }

    #[tokio::test]
    async fn test_select_first_active_candidate() {
        let mut transport = ScriptedTransport::new().respond(
            "active_symbols",
            json!({"active_symbols": [
                {"symbol": "R_25", "is_trading_suspended": 1},
                {"symbol": "R_10", "is_trading_suspended": 0},
                {"symbol": "R_100", "is_trading_suspended": 0}
            ]}),
        );

        let symbol = discovery().select_symbol(&mut transport).await;
        assert_eq!(symbol, "R_10");

        let sent = transport.sent_for("active_symbols")[0];
        assert_eq!(sent["active_symbols"], "brief");
        assert_eq!(sent["product_type"], "synthetic_index");
    }

    #[tokio::test]
    async fn test_resolve_falls_back_on_errors() {
        let mut transport = ScriptedTransport::new()
            .fail("active_symbols", SessionError::Closed)
            .respond("contracts_for", json!({"error": {"code": "InvalidSymbol", "message": "bad"}}));

        let instrument = discovery().resolve(&mut transport).await;
        assert_eq!(instrument, Instrument::new("R_25", ContractDuration::minutes(1)));
    }

    #[tokio::test]
    async fn test_resolve_negotiates_duration() {
        let mut transport = ScriptedTransport::new()
            .respond("active_symbols", json!({"active_symbols": [{"symbol": "R_25"}]}))
            .respond(
                "contracts_for",
                json!({"contracts_for": {"available": [
                    {"contract_type": "CALL", "min_contract_duration": "2m", "max_contract_duration": "1d"}
                ]}}),
            );

        let instrument = discovery().resolve(&mut transport).await;
        assert_eq!(instrument.to_string(), "R_25 (2m)");
        assert_eq!(transport.sent_for("contracts_for")[0]["contracts_for"], "R_25");
    }
}
