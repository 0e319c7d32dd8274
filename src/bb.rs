use std::{
    fmt::Display,
    hash::{Hash, Hasher},
    num::NonZero,
};

use crate::{
    Context, Error, Hub, Indicator, IndicatorConfig, IndicatorConfigBuilder, Price, Quote,
    Reusable, Series, Timestamp, window,
};

/// Standard deviation multiplier for Bollinger Bands.
///
/// Wraps a positive, non-NaN `f64`.
///
/// Defaults to `2.0` (the standard Bollinger Bands setting).
///
/// Implements `Eq` and `Hash` via bit-level comparison, which is sound
/// because NaN is rejected at construction.
#[derive(Clone, Copy, Debug)]
pub struct StdDev(f64);

impl StdDev {
    /// Creates a new standard deviation multiplier.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `value` is zero, negative, or NaN.
    pub fn new(value: f64) -> Result<Self, Error> {
        if value.is_nan() || value <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "std_dev",
                reason: format!("must be a positive number, got {value}"),
            });
        }

        Ok(Self(value))
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for StdDev {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for StdDev {}

impl Hash for StdDev {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl Default for StdDev {
    fn default() -> Self {
        Self(2.0)
    }
}

/// Configuration for the Bollinger Bands ([`Bb`]) indicator.
///
/// # Example
///
/// ```
/// use quantedge_hub::{BbConfig, IndicatorConfig, IndicatorConfigBuilder};
/// use std::num::NonZero;
///
/// // Default: 2.0 std devs
/// let config = BbConfig::builder()
///     .length(NonZero::new(20).unwrap())
///     .build()
///     .unwrap();
///
/// assert_eq!(config.length(), 20);
/// assert_eq!(config.std_dev().value(), 2.0);
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct BbConfig {
    length: usize,
    std_dev: StdDev,
}

impl IndicatorConfig for BbConfig {
    type Builder = BbConfigBuilder;

    #[inline]
    fn builder() -> Self::Builder {
        BbConfigBuilder::new()
    }

    #[inline]
    fn length(&self) -> usize {
        self.length
    }
}

impl BbConfig {
    /// Standard deviation multiplier for the upper and lower bands.
    #[inline]
    #[must_use]
    pub fn std_dev(&self) -> StdDev {
        self.std_dev
    }

    /// BB(20, 2σ), the standard Bollinger Bands setting.
    #[must_use]
    pub fn default_20() -> Self {
        Self {
            length: 20,
            std_dev: StdDev::default(),
        }
    }

    /// BB with custom length and 2σ.
    #[must_use]
    pub fn new(length: NonZero<usize>) -> Self {
        Self {
            length: length.get(),
            std_dev: StdDev::default(),
        }
    }
}

impl Display for BbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BbConfig({}, {})", self.length, self.std_dev.value())
    }
}

/// Builder for [`BbConfig`].
///
/// Defaults: `std_dev` = `2.0`.
/// Length must be set before calling
/// [`build`](IndicatorConfigBuilder::build).
pub struct BbConfigBuilder {
    length: Option<usize>,
    std_dev: StdDev,
}

impl BbConfigBuilder {
    fn new() -> Self {
        Self {
            length: None,
            std_dev: StdDev::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn std_dev(mut self, std_dev: StdDev) -> Self {
        self.std_dev = std_dev;
        self
    }
}

impl IndicatorConfigBuilder<BbConfig> for BbConfigBuilder {
    #[inline]
    fn length(mut self, length: NonZero<usize>) -> Self {
        self.length.replace(length.get());
        self
    }

    #[inline]
    fn build(self) -> Result<BbConfig, Error> {
        Ok(BbConfig {
            length: self.length.ok_or(Error::MissingParameter("length"))?,
            std_dev: self.std_dev,
        })
    }
}

/// Bollinger Bands value: upper, middle, and lower bands.
///
/// The middle band is the SMA. Upper and lower bands are offset by
/// `std_dev × σ`, where `σ` is the population standard deviation of the window.
///
/// ```text
/// upper  = SMA + k × σ
/// middle = SMA
/// lower  = SMA − k × σ
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BbValue {
    upper: Price,
    middle: Price,
    lower: Price,
}

impl BbValue {
    /// Upper band: `SMA + k × σ`.
    #[inline]
    #[must_use]
    pub fn upper(&self) -> Price {
        self.upper
    }

    /// Middle band: SMA of the window.
    #[inline]
    #[must_use]
    pub fn middle(&self) -> Price {
        self.middle
    }

    /// Lower band: `SMA − k × σ`.
    #[inline]
    #[must_use]
    pub fn lower(&self) -> Price {
        self.lower
    }

    /// Band width: `upper − lower`.
    ///
    /// Narrow width indicates consolidation (Bollinger squeeze); wide width
    /// indicates high volatility.
    #[inline]
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

impl Display for BbValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BB(u: {}, m: {}, l: {})",
            self.upper, self.middle, self.lower
        )
    }
}

/// One [`Bb`] result. Its chainable value is the middle band.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BbResult {
    pub timestamp: Timestamp,
    pub bands: Option<BbValue>,
}

impl Series for BbResult {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for BbResult {
    #[inline]
    fn value(&self) -> Option<Price> {
        self.bands.map(|bands| bands.middle)
    }
}

/// Bollinger Bands (BB).
///
/// A volatility indicator consisting of three bands: a simple moving average
/// (middle) with upper and lower bands offset by a configurable number of
/// standard deviations.
///
/// The deviation is computed in two passes over the window, so revising or
/// inserting a record yields exactly the value a fresh computation would.
///
/// # Example
///
/// ```
/// use quantedge_hub::{Bb, BbConfig, Quote, QuoteProvider};
/// use std::num::NonZero;
///
/// let quotes = QuoteProvider::new();
/// let bb = Bb::new(BbConfig::new(NonZero::new(2).unwrap()))
///     .attach(&quotes)
///     .unwrap();
///
/// quotes.add(Quote::flat(1, 3.0)).unwrap();
/// quotes.add(Quote::flat(2, 5.0)).unwrap();
///
/// // mean 4, σ 1, k 2
/// let bands = bb.results().unwrap()[1].bands.unwrap();
/// assert_eq!((bands.upper(), bands.middle(), bands.lower()), (6.0, 4.0, 2.0));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Bb {
    pub(crate) config: BbConfig,
}

impl<In: Reusable> Indicator<In> for Bb {
    type Output = BbResult;
    type State = ();

    #[inline]
    fn lookback(&self) -> usize {
        self.config.length
    }

    fn compute(&self, ctx: &Context<'_, In, BbResult>, _: &mut ()) -> BbResult {
        let bands = ctx.lookback(self.config.length).and_then(|window| {
            let mean = window::mean(window)?;
            let offset = window::std_dev(window, mean)? * self.config.std_dev.value();

            Some(BbValue {
                upper: mean + offset,
                middle: mean,
                lower: mean - offset,
            })
        });

        BbResult {
            timestamp: ctx.item().timestamp(),
            bands,
        }
    }
}

impl Display for Bb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BB({}, {})",
            self.config.length,
            self.config.std_dev.value()
        )
    }
}

/// [`Bb`] attached to an upstream.
pub type BbHub<In = Quote> = Hub<In, Bb>;
