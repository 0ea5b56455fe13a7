pub mod channel;
pub mod client;
pub mod error;
pub mod retry;

pub use channel::{ChannelEvent, EventChannel};
pub use client::{push_channel_url, ApiClient};
pub use error::ApiError;
pub use retry::{fetch_run_with_retry, RetryConfig};
pub use shopwatch_api_types;
