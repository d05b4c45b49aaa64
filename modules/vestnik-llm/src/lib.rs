pub mod budget;
pub mod circuit_breaker;
pub mod client;
pub mod parse;
pub mod prompt;
pub mod throttle;
pub mod types;

pub use budget::{BudgetGuard, UsageLedger};
pub use circuit_breaker::CircuitBreaker;
pub use client::{LlmClient, LlmClientConfig, ModelPricing};
pub use throttle::CycleThrottle;
pub use types::{Classification, ClassificationRequest, UsageEntry};
