//! Live gold/silver rates for Zakat calculations.
//!
//! Rates come from a [`PriceFeed`], are persisted through a
//! [`KeyValueCache`], and are served by a [`RateService`] that falls back to
//! built-in defaults whenever the feed is unavailable.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zakat_providers::prelude::*;
//!
//! # #[cfg(feature = "live-pricing")]
//! # async fn run() -> Result<(), zakat_core::ZakatError> {
//! let service = RateService::new(
//!     Arc::new(GoldPriceFeed::default()),
//!     Arc::new(FileSystemCache::default_location()?),
//!     RateServiceConfig::default(),
//! );
//! let report = service.get_rates().await;
//! println!("Gold: {}/g", report.snapshot.gold.per_gram);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod feed;
pub mod rates;
pub mod service;
pub mod store;

pub use cache::{FileSystemCache, KeyValueCache, MemoryCache};
pub use clock::{Clock, ManualClock, SystemClock};
#[cfg(feature = "live-pricing")]
pub use feed::GoldPriceFeed;
pub use feed::{NetworkConfig, PriceFeed, StaticPriceFeed};
pub use rates::{GoldRates, MetalRateSnapshot, SilverRates, SpotPrices};
pub use service::{
    FALLBACK_WARNING, RateReport, RateService, RateServiceConfig, RateSource, RateState,
    RefreshHandle, spawn_refresh_task,
};

pub mod prelude {
    pub use crate::cache::{FileSystemCache, KeyValueCache, MemoryCache};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    #[cfg(feature = "live-pricing")]
    pub use crate::feed::GoldPriceFeed;
    pub use crate::feed::{NetworkConfig, PriceFeed, StaticPriceFeed};
    pub use crate::rates::{MetalRateSnapshot, SpotPrices};
    pub use crate::service::{
        RateReport, RateService, RateServiceConfig, RateSource, RateState, RefreshHandle,
        spawn_refresh_task,
    };
}
