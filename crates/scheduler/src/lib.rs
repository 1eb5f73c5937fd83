//! Periodic subscription expiration.
//!
//! The [`ExpirationScanner`] finds active subscriptions whose end date has
//! passed, marks them expired and enqueues one `subscription_expired`
//! notification for each. A [`Ticker`] decides when scans happen.

pub mod error;
pub mod scanner;
pub mod subscriptions;
pub mod ticker;

pub use error::ScanError;
pub use scanner::{ExpirationScanner, ScanReport};
pub use subscriptions::{
    MemorySubscriptionRepository, PgSubscriptionRepository, SubscriptionRepository,
};
pub use ticker::{FixedTicks, IntervalTicker, Ticker};
