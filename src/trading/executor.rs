//! Two-step execution: request a price proposal, then confirm it with a buy.
//!
//! Every failure is reported as a [`TradeOutcome`] with a reason; nothing is
//! retried here. Realized profit is taken from the venue's buy confirmation.

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{
    to_request, BuyRequest, BuyResponse, Proposal, ProposalRequest, ProposalResponse, SessionError,
    Transport,
};
use crate::models::{FailureReason, Instrument, Signal, TradeOutcome};

use super::config::ExecutionConfig;

/// Rise/fall contract direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractType {
    Call,
    Put,
}

impl ContractType {
    pub fn from_signal(signal: Signal) -> Option<Self> {
        match signal {
            Signal::Buy => Some(ContractType::Call),
            Signal::Sell => Some(ContractType::Put),
            Signal::None => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::Call => "CALL",
            ContractType::Put => "PUT",
        }
    }
}

impl std::fmt::Display for ContractType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Venue rejections keep their category; anything else is a transport fault.
fn classify(error: &SessionError, venue_reason: FailureReason) -> FailureReason {
    match error {
        SessionError::Api { .. } => venue_reason,
        _ => FailureReason::TransportFailure,
    }
}

pub struct Executor {
    config: ExecutionConfig,
}

impl Executor {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    fn proposal_request(&self, instrument: &Instrument, contract: ContractType, stake: Decimal) -> ProposalRequest {
        ProposalRequest {
            proposal: 1,
            amount: stake,
            basis: self.config.basis.clone(),
            contract_type: contract.as_str().to_string(),
            currency: self.config.currency.clone(),
            duration: instrument.duration.amount,
            duration_unit: instrument.duration.unit.as_str().to_string(),
            symbol: instrument.symbol.clone(),
        }
    }

    /// Request a price proposal only. Used on its own for dry runs.
    pub async fn quote<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        instrument: &Instrument,
        contract: ContractType,
        stake: Decimal,
    ) -> Result<Proposal, TradeOutcome> {
        let request = self.proposal_request(instrument, contract, stake);

        let response = match exchange(transport, &request).await {
            Ok(response) => response,
            Err(e) => {
                let reason = classify(&e, FailureReason::VenueRejected);
                warn!(symbol = %instrument.symbol, contract = %contract, error = %e, "Proposal failed");
                return Err(TradeOutcome::failed(reason, e.to_string()));
            }
        };

        match serde_json::from_value::<ProposalResponse>(response) {
            Ok(ProposalResponse { proposal }) => {
                debug!(
                    proposal_id = %proposal.id,
                    ask_price = ?proposal.ask_price,
                    payout = ?proposal.payout,
                    "Proposal received"
                );
                Ok(proposal)
            }
            Err(e) => {
                warn!(error = %e, "Proposal response had no id");
                Err(TradeOutcome::failed(FailureReason::VenueRejected, "no_proposal_id"))
            }
        }
    }

    /// Quote and buy one contract at `stake`.
    pub async fn execute<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        instrument: &Instrument,
        contract: ContractType,
        stake: Decimal,
    ) -> TradeOutcome {
        let proposal = match self.quote(transport, instrument, contract, stake).await {
            Ok(proposal) => proposal,
            Err(outcome) => return outcome,
        };

        let request = BuyRequest {
            buy: proposal.id.clone(),
            price: stake,
        };

        let response = match exchange(transport, &request).await {
            Ok(response) => response,
            Err(e) => {
                let reason = classify(&e, FailureReason::ConfirmationMissing);
                warn!(proposal_id = %proposal.id, error = %e, "Buy failed");
                return TradeOutcome::failed(reason, e.to_string());
            }
        };

        let buy = match serde_json::from_value::<BuyResponse>(response) {
            Ok(BuyResponse { buy }) => buy,
            Err(e) => {
                warn!(proposal_id = %proposal.id, error = %e, "Buy response had no confirmation");
                return TradeOutcome::failed(FailureReason::ConfirmationMissing, "no buy confirmation");
            }
        };

        let profit = buy.profit.unwrap_or_else(|| {
            debug!("Buy confirmation carried no profit, recording zero");
            Decimal::ZERO
        });

        info!(
            symbol = %instrument.symbol,
            contract = %contract,
            contract_id = ?buy.contract_id,
            buy_price = ?buy.buy_price,
            profit = %profit,
            "Trade filled"
        );

        TradeOutcome::filled(profit, buy.contract_id)
    }
}

async fn exchange<T, Req>(transport: &mut T, request: &Req) -> Result<Value, SessionError>
where
    T: Transport + ?Sized,
    Req: serde::Serialize + Sync,
{
    transport.request(to_request(request)?).await
}
