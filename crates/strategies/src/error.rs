use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}
