pub mod fanout;
pub mod rss;
pub mod search_feed;
pub mod types;
pub mod user_agent;
pub mod web;

pub use fanout::{fetch_all, FetchConfig};
pub use types::{RawItem, Source, SourceHealth, SourceKind};
