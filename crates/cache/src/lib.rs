//! # Cache
//!
//! Memoization layer that sits in front of value decoding.
//!
//! - [`TtlCache`] holds decoded strings for a fixed time-to-live. Expired
//!   entries are dropped lazily on read, and a bulk sweep runs at most once
//!   per sweep interval, piggybacking on writes.
//! - [`AdaptivePromoter`] counts accesses per key and reports a key as *hot*
//!   once it crosses a threshold, so callers can keep cold keys out of the
//!   cache.
//! - [`Clock`] supplies monotonic time to both; [`ManualClock`] lets tests
//!   drive it by hand.
//!
//! ## Example
//! ```rust
//! use cache::{ManualClock, TtlCache};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let clock = Arc::new(ManualClock::new());
//! let cache = TtlCache::new(Duration::from_secs(5), Duration::from_secs(60), clock.clone());
//!
//! cache.set("greeting", "hello".to_string());
//! assert_eq!(cache.get("greeting").as_deref(), Some("hello"));
//!
//! clock.advance(Duration::from_secs(6));
//! assert!(cache.get("greeting").is_none());
//! ```

mod clock;
mod promoter;
mod ttl;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use promoter::{AccessStat, AdaptivePromoter, DEFAULT_HOT_THRESHOLD};
pub use ttl::{CacheStats, TtlCache, DEFAULT_SWEEP_INTERVAL};
