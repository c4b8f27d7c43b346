//! Market data seam between the kernel and external bar sources.

pub mod feed;

pub use feed::{FeedError, HistoricalFeed, MarketDataFeed};
