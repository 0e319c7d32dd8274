use std::{fmt::Display, num::NonZero};

use crate::{
    Context, Error, Hub, Indicator, IndicatorConfig, IndicatorConfigBuilder, Price, Quote,
    Reusable, Series, Timestamp,
};

/// Configuration for the Relative Strength Index ([`Rsi`])
/// indicator.
///
/// RSI uses Wilder's smoothing, which has infinite memory: the
/// SMA seed (first `length` changes) influences all subsequent
/// values. Output begins at bar `length + 1`.
///
/// # Example
///
/// ```
/// use quantedge_hub::{IndicatorConfig, RsiConfig};
/// use std::num::NonZero;
///
/// let config = RsiConfig::new(NonZero::new(14).unwrap());
/// assert_eq!(config.length(), 14);
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct RsiConfig {
    length: usize,
}

impl IndicatorConfig for RsiConfig {
    type Builder = RsiConfigBuilder;

    #[inline]
    fn builder() -> Self::Builder {
        RsiConfigBuilder::new()
    }

    #[inline]
    fn length(&self) -> usize {
        self.length
    }
}

impl RsiConfig {
    #[must_use]
    pub fn new(length: NonZero<usize>) -> Self {
        Self {
            length: length.get(),
        }
    }
}

impl Display for RsiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RsiConfig({})", self.length)
    }
}

/// Builder for [`RsiConfig`].
///
/// Length must be set before calling
/// [`build`](IndicatorConfigBuilder::build).
pub struct RsiConfigBuilder {
    length: Option<usize>,
}

impl RsiConfigBuilder {
    #[must_use]
    fn new() -> Self {
        Self { length: None }
    }
}

impl IndicatorConfigBuilder<RsiConfig> for RsiConfigBuilder {
    #[inline]
    fn length(mut self, length: NonZero<usize>) -> Self {
        self.length = Some(length.get());
        self
    }

    #[inline]
    fn build(self) -> Result<RsiConfig, Error> {
        let length = self.length.ok_or(Error::MissingParameter("length"))?;

        Ok(RsiConfig { length })
    }
}

/// One [`Rsi`] result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RsiResult {
    pub timestamp: Timestamp,
    pub rsi: Option<Price>,
}

impl Series for RsiResult {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for RsiResult {
    #[inline]
    fn value(&self) -> Option<Price> {
        self.rsi
    }
}

/// Wilder averages after a bar, `None` while seeding, and the bar's input
/// so the next step never looks back at the upstream.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RsiState {
    averages: Option<(f64, f64)>,
    prev: Option<Price>,
}

/// Relative Strength Index (RSI) with Wilder's smoothing.
///
/// Measures the speed and magnitude of recent changes on
/// a 0–100 scale. Values above 70 are conventionally considered
/// overbought; below 30, oversold.
///
/// The first `length` changes are averaged with a simple
/// mean (SMA seed). After seeding, gains and losses are smoothed
/// with Wilder's method (`α = 1 / length`):
///
/// ```text
/// avg_gain = (prev_avg_gain × (length − 1) + gain) / length
/// avg_loss = (prev_avg_loss × (length − 1) + loss) / length
/// RSI      = 100 × avg_gain / (avg_gain + avg_loss)
/// ```
///
/// A flat window (no gains, no losses) reads 50. A missing upstream
/// value resets the averages; seeding starts over.
///
/// The averages are hidden state, so a hub revising the newest bar
/// restores the averages of the bar before and recomputes only that bar.
///
/// # Example
///
/// ```
/// use quantedge_hub::{Quote, QuoteProvider, Rsi, RsiConfig};
/// use std::num::NonZero;
///
/// let quotes = QuoteProvider::new();
/// let rsi = Rsi::new(RsiConfig::new(NonZero::new(3).unwrap()))
///     .attach(&quotes)
///     .unwrap();
///
/// // Seeding: need 3 changes (4 bars)
/// for (ts, price) in [(1, 10.0), (2, 12.0), (3, 11.0), (4, 13.0)] {
///     quotes.add(Quote::flat(ts, price)).unwrap();
/// }
///
/// // changes = +2, −1, +2 → avg_gain=4/3, avg_loss=1/3 → RSI=80
/// let last = rsi.results().unwrap()[3].rsi.unwrap();
/// assert!((last - 80.0).abs() < 1e-10);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Rsi {
    pub(crate) config: RsiConfig,
}

impl Rsi {
    #[inline]
    fn gain_and_loss(prev: Price, price: Price) -> (Price, Price) {
        let change = price - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        (gain, loss)
    }

    #[inline]
    fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
        let sum = avg_gain + avg_loss;
        if sum == 0.0 {
            50.0
        } else {
            100.0 * avg_gain / sum
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn length_reciprocal(&self) -> f64 {
        1.0 / self.config.length as f64
    }

    /// Simple averages of the gains and losses across `window`.
    fn seed<In: Reusable>(&self, window: &[In]) -> Option<(f64, f64)> {
        let (sum_gain, sum_loss) = window.windows(2).try_fold((0.0, 0.0), |(g, l), pair| {
            let (gain, loss) = Self::gain_and_loss(pair[0].value()?, pair[1].value()?);
            Some((g + gain, l + loss))
        })?;

        let reciprocal = self.length_reciprocal();
        Some((sum_gain * reciprocal, sum_loss * reciprocal))
    }

    /// One Wilder step from the previous averages.
    fn smooth(&self, (avg_gain, avg_loss): (f64, f64), prev: Price, price: Price) -> (f64, f64) {
        let (gain, loss) = Self::gain_and_loss(prev, price);

        #[allow(clippy::cast_precision_loss)]
        let length_minus_one = (self.config.length - 1) as f64;
        let reciprocal = self.length_reciprocal();

        (
            avg_gain.mul_add(length_minus_one, gain) * reciprocal,
            avg_loss.mul_add(length_minus_one, loss) * reciprocal,
        )
    }
}

impl<In: Reusable> Indicator<In> for Rsi {
    type Output = RsiResult;
    type State = RsiState;
    const STATEFUL: bool = true;

    #[inline]
    fn lookback(&self) -> usize {
        self.config.length + 1
    }

    fn compute(&self, ctx: &Context<'_, In, RsiResult>, state: &mut RsiState) -> RsiResult {
        let price = ctx.item().value();

        state.averages = match (state.averages, state.prev, price) {
            (Some(averages), Some(prev), Some(price)) => Some(self.smooth(averages, prev, price)),
            _ => ctx
                .lookback(self.config.length + 1)
                .and_then(|window| self.seed(window)),
        };
        state.prev = price;

        RsiResult {
            timestamp: ctx.item().timestamp(),
            rsi: state
                .averages
                .map(|(gain, loss)| Self::rsi_from_averages(gain, loss)),
        }
    }
}

impl Display for Rsi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RSI({})", self.config.length)
    }
}

/// [`Rsi`] attached to an upstream.
pub type RsiHub<In = Quote> = Hub<In, Rsi>;
