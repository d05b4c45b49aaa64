pub mod broadcaster;
pub mod message;
pub mod outcome;

pub use broadcaster::{BroadcastReport, Broadcaster};
pub use message::{format_signal, SignalMessageInput};
pub use outcome::{classify_error, DeliveryOutcome};
