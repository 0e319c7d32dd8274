use std::{
    fmt::{Debug, Display},
    num::NonZero,
};

use crate::{
    Context, Error, Hub, Indicator, IndicatorConfig, IndicatorConfigBuilder, Price, Quote,
    Reusable, Series, Timestamp, window,
};

/// Configuration for the Simple Moving Average ([`Sma`]) indicator.
///
/// # Example
///
/// ```rust
/// use quantedge_hub::{IndicatorConfig, SmaConfig};
/// use std::num::NonZero;
///
/// let config = SmaConfig::new(NonZero::new(20).unwrap());
/// assert_eq!(config.length(), 20);
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct SmaConfig {
    length: usize,
}

impl IndicatorConfig for SmaConfig {
    type Builder = SmaConfigBuilder;

    #[inline]
    fn builder() -> Self::Builder {
        SmaConfigBuilder::new()
    }

    #[inline]
    fn length(&self) -> usize {
        self.length
    }
}

impl SmaConfig {
    #[must_use]
    pub fn new(length: NonZero<usize>) -> Self {
        Self {
            length: length.get(),
        }
    }
}

impl Display for SmaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SmaConfig({})", self.length)
    }
}

/// Builder for [`SmaConfig`].
///
/// Length must be set before calling [`build`](IndicatorConfigBuilder::build).
pub struct SmaConfigBuilder {
    length: Option<usize>,
}

impl SmaConfigBuilder {
    fn new() -> Self {
        Self { length: None }
    }
}

impl IndicatorConfigBuilder<SmaConfig> for SmaConfigBuilder {
    #[inline]
    fn length(mut self, length: NonZero<usize>) -> Self {
        self.length.replace(length.get());
        self
    }

    #[inline]
    fn build(self) -> Result<SmaConfig, Error> {
        Ok(SmaConfig {
            length: self.length.ok_or(Error::MissingParameter("length"))?,
        })
    }
}

/// One [`Sma`] result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmaResult {
    pub timestamp: Timestamp,
    pub sma: Option<Price>,
}

impl Series for SmaResult {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for SmaResult {
    #[inline]
    fn value(&self) -> Option<Price> {
        self.sma
    }
}

/// Simple Moving Average (SMA).
///
/// The unweighted mean of the last *n* upstream values. `None` until *n*
/// values are available, or while any of them is missing.
///
/// The window is re-read from the upstream cache for every result, so a
/// result depends only on the values in its window, never on the order in
/// which they arrived.
#[derive(Clone, Copy, Debug)]
pub struct Sma {
    pub(crate) config: SmaConfig,
}

impl<In: Reusable> Indicator<In> for Sma {
    type Output = SmaResult;
    type State = ();

    #[inline]
    fn lookback(&self) -> usize {
        self.config.length
    }

    #[inline]
    fn compute(&self, ctx: &Context<'_, In, SmaResult>, _: &mut ()) -> SmaResult {
        SmaResult {
            timestamp: ctx.item().timestamp(),
            sma: ctx.lookback(self.config.length).and_then(window::mean),
        }
    }
}

impl Display for Sma {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SMA({})", self.config.length)
    }
}

/// [`Sma`] attached to an upstream.
pub type SmaHub<In = Quote> = Hub<In, Sma>;
