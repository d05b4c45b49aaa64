pub mod config;
pub mod error;
pub mod fnv;
pub mod time;
pub mod types;

pub use config::Config;
pub use error::VestnikError;
pub use types::*;
