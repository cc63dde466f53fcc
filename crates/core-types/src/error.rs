use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Unknown strategy discriminator: {0}")]
    UnknownStrategy(String),

    #[error("Failed to parse strategy payload: {0}")]
    Payload(#[from] serde_json::Error),
}
