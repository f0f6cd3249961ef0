//! Social Adapter
//!
//! Keyword search over HTTP and the poller that turns search results into
//! `social_metric` signals.

mod poller;
mod search;

pub use poller::{SocialMetricsConfig, SocialMetricsPoller};
pub use search::{clip_posts, HttpSocialSearch, SearchConfig};
