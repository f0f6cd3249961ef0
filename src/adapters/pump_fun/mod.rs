//! Pump.fun Adapter
//!
//! Push-stream source for new token launches. Each launch is published as a
//! `price_event` signal and its raw payload recorded in `new_tokens`.

mod stream;
mod types;

pub use stream::{PumpFunConfig, PumpFunStream, DEFAULT_WS_URL};
pub use types::{extract_event, LaunchSummary, SubscribeRequest};
