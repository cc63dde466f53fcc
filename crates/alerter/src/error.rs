use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlerterError {
    #[error("Failed to send the notification request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Notification API returned an error: {0}")]
    Api(String),
}
