//! Incremental technical indicators over a mutable, time-ordered series.
//!
//! A [`QuoteProvider`] caches quotes in timestamp order and accepts
//! appends, revisions of the newest quote, late arrivals and removals.
//! Each indicator attached to it becomes a [`Hub`]: it keeps one result per
//! upstream record and follows every mutation, recomputing only what the
//! change invalidated. Hubs are providers themselves, so indicators chain
//! (an SMA of an RSI, a [`PriceSource`] stage feeding an EMA).
//!
//! After any sequence of mutations a hub's results equal a batch
//! computation ([`Sma::series`] and friends) over the upstream's current
//! contents.
//!
//! Each indicator type ([`Sma`], [`Ema`], [`Rsi`], [`Bb`]) exposes
//! [`new`](Sma::new), [`attach`](Sma::attach) and [`series`](Sma::series)
//! as inherent methods, no trait import needed. Import [`Indicator`] only
//! for generic code or to write your own indicator.
//!
//! Everything here is single-threaded: handles are `Rc`-based and neither
//! `Send` nor `Sync`.

mod bb;
mod cache;
mod chain;
mod config;
mod ema;
mod error;
mod hub;
mod indicator;
mod price_source;
mod quote_provider;
mod rsi;
mod series;
mod sma;
mod state_cache;
mod window;

pub use crate::chain::{Event, Observer, Provider, SubscriberId, Upstream};
pub use crate::config::{DEFAULT_MAX_REPEATS, ProviderConfig, ProviderConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::hub::Hub;
pub use crate::indicator::{Context, Indicator, IndicatorConfig, IndicatorConfigBuilder, batch};
pub use crate::price_source::{PriceHub, PriceSource};
pub use crate::quote_provider::{Act, QuoteProvider};
pub use crate::series::{Ohlcv, Price, Quote, Reusable, Series, Timestamp, Value};

pub use crate::bb::{Bb, BbConfig, BbConfigBuilder, BbHub, BbResult, BbValue, StdDev};
pub use crate::ema::{Ema, EmaConfig, EmaConfigBuilder, EmaHub, EmaResult, EmaState};
pub use crate::rsi::{Rsi, RsiConfig, RsiConfigBuilder, RsiHub, RsiResult, RsiState};
pub use crate::sma::{Sma, SmaConfig, SmaConfigBuilder, SmaHub, SmaResult};

macro_rules! impl_indicator_methods {
    ($type:ty, $config:ty, $output:ty) => {
        impl $type {
            #[must_use]
            pub fn new(config: $config) -> Self {
                Self { config }
            }

            #[must_use]
            pub fn config(&self) -> &$config {
                &self.config
            }

            /// Attaches to `upstream` and computes results for its current
            /// history. See [`Hub::new`].
            ///
            /// # Errors
            ///
            /// [`Error::Reentrant`] when called while the upstream is being
            /// mutated.
            pub fn attach<In>(self, upstream: &impl Upstream<In>) -> Result<Hub<In, Self>>
            where
                In: Reusable + 'static,
            {
                Hub::new(upstream, self)
            }

            /// Batch computation over `items`. See [`batch`].
            #[must_use]
            pub fn series<In: Reusable>(&self, items: &[In]) -> Vec<$output> {
                batch(self, items)
            }
        }
    };
}

impl_indicator_methods!(Sma, SmaConfig, SmaResult);
impl_indicator_methods!(Ema, EmaConfig, EmaResult);
impl_indicator_methods!(Rsi, RsiConfig, RsiResult);
impl_indicator_methods!(Bb, BbConfig, BbResult);

#[cfg(test)]
mod test_util;
