//! Candle window fetch.

use tracing::debug;

use crate::api::{call, CandlesRequest, CandlesResponse, SessionError, Transport};
use crate::models::CandleWindow;

/// Fetch the latest `count` bars of `granularity_mins` for `symbol`.
///
/// Malformed bars are dropped; the result may be shorter than requested.
pub async fn fetch_window<T: Transport + ?Sized>(
    transport: &mut T,
    symbol: &str,
    count: usize,
    granularity_mins: u32,
) -> Result<CandleWindow, SessionError> {
    let request = CandlesRequest::latest(symbol, count, granularity_mins);
    let response: CandlesResponse = call(transport, &request).await?;

    let window = CandleWindow::new(response.into_candles(), count);
    debug!(symbol = %symbol, bars = window.len(), requested = count, "Fetched candles");
    Ok(window)
}
