use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("Exchange call failed: {0}")]
    Exchange(#[from] exchange_client::error::ExchangeError),

    #[error("Snapshot fetch failed: {0}")]
    Fetch(String),

    #[error("Order book for {0} is empty and no last trade is known")]
    EmptyMarket(String),
}
