use thiserror::Error;

#[derive(Error, Debug)]
pub enum VestnikError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Processing lock held by another instance")]
    LockHeld,

    #[error("Source fetch error: {0}")]
    Fetch(String),

    #[error("LLM classification error: {0}")]
    Llm(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VestnikError>;
