use crate::{Context, Hub, Indicator, Ohlcv, Price, Quote, Result, Upstream, Value};

use std::fmt::{Debug, Display};

/// Part of an [`Ohlcv`] bar, usable as a stage that turns bars into plain
/// [`Value`]s.
///
/// Indicators chain on a single value per record. Attach a `PriceSource`
/// to a bar provider to choose which value that is; without one, a
/// [`Quote`] feeds its close.
///
/// # Example
///
/// ```
/// use quantedge_hub::{PriceSource, Quote, QuoteProvider, Sma, SmaConfig};
/// use std::num::NonZero;
///
/// let quotes = QuoteProvider::new();
/// let median = PriceSource::HL2.attach(&quotes).unwrap();
/// let sma = Sma::new(SmaConfig::new(NonZero::new(2).unwrap()))
///     .attach(&median)
///     .unwrap();
///
/// quotes.add(Quote { timestamp: 1, open: 0.0, high: 20.0, low: 10.0, close: 0.0, volume: 0.0 }).unwrap();
/// quotes.add(Quote { timestamp: 2, open: 0.0, high: 30.0, low: 20.0, close: 0.0, volume: 0.0 }).unwrap();
///
/// // (15 + 25) / 2
/// assert_eq!(sma.results().unwrap()[1].sma, Some(20.0));
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Copy, Default, Debug)]
pub enum PriceSource {
    /// Opening price.
    Open,
    /// Highest price.
    High,
    /// Closing price.
    #[default]
    Close,
    /// Lowest price.
    Low,
    /// Median price: `(high + low) / 2`.
    HL2,
    /// Typical price: `(high + low + close) / 3`.
    HLC3,
    /// Average price: `(open + high + low + close) / 4`.
    OHLC4,
    /// Weighted close: `(high + low + close + close) / 4`.
    HLCC4,
    /// True range: `max(high - low, |high - prev_close|, |low - prev_close|)`.
    ///
    /// On the first cached bar (no previous close), falls back to `high - low`.
    TrueRange,
}

impl Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl PriceSource {
    #[inline]
    pub(crate) fn extract(self, ohlcv: &impl Ohlcv, prev_close: Option<Price>) -> Price {
        match self {
            Self::Open => ohlcv.open(),
            Self::High => ohlcv.high(),
            Self::Close => ohlcv.close(),
            Self::Low => ohlcv.low(),
            Self::HL2 => f64::midpoint(ohlcv.high(), ohlcv.low()),
            Self::HLC3 => (ohlcv.high() + ohlcv.low() + ohlcv.close()) / 3.0,
            Self::OHLC4 => (ohlcv.open() + ohlcv.high() + ohlcv.low() + ohlcv.close()) / 4.0,
            Self::HLCC4 => (ohlcv.high() + ohlcv.low() + ohlcv.close() + ohlcv.close()) / 4.0,
            Self::TrueRange => {
                let hl = ohlcv.high() - ohlcv.low();

                match prev_close {
                    Some(prev_close) => {
                        let hc = (ohlcv.high() - prev_close).abs();
                        let lc = (ohlcv.low() - prev_close).abs();
                        hl.max(hc).max(lc)
                    }
                    None => hl,
                }
            }
        }
    }

    /// Attaches this price part to a bar provider.
    ///
    /// # Errors
    ///
    /// See [`Hub::new`].
    pub fn attach<Q>(self, upstream: &impl Upstream<Q>) -> Result<Hub<Q, Self>>
    where
        Q: Ohlcv + 'static,
    {
        Hub::new(upstream, self)
    }

    /// Extracts this price part from every bar.
    #[must_use]
    pub fn series<Q: Ohlcv>(self, bars: &[Q]) -> Vec<Value> {
        crate::indicator::batch(&self, bars)
    }
}

impl<Q: Ohlcv> Indicator<Q> for PriceSource {
    type Output = Value;
    type State = ();

    #[inline]
    fn compute(&self, ctx: &Context<'_, Q, Value>, _: &mut ()) -> Value {
        let prev_close = ctx.previous_item().map(Ohlcv::close);
        let bar = ctx.item();

        Value::new(bar.timestamp(), self.extract(bar, prev_close))
    }
}

/// [`PriceSource`] attached to a bar provider.
pub type PriceHub<Q = Quote> = Hub<Q, PriceSource>;
