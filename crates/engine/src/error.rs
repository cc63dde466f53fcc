use core_types::StrategyKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Repository error: {0}")]
    Db(#[from] database::DbError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] exchange_client::error::ExchangeError),

    #[error("Market data error: {0}")]
    Market(#[from] market_data::error::MarketDataError),

    #[error("Invalid bot document: {0}")]
    Document(#[from] core_types::CoreError),

    #[error("Engine for {0} is not running")]
    NotRunning(StrategyKind),

    #[error("Engine for {0} is already running")]
    AlreadyRunning(StrategyKind),

    #[error("Bot {0} was not found")]
    BotNotFound(uuid::Uuid),

    #[error("User {0} has no stored credentials")]
    MissingCredentials(uuid::Uuid),

    #[error("Bot {0} is not a {1} bot")]
    WrongStrategy(uuid::Uuid, StrategyKind),

    #[error("Work unit deadline exceeded")]
    Timeout,
}
