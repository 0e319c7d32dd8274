use std::{
    fmt::{Debug, Display},
    num::NonZero,
};

use crate::{
    Context, Error, Hub, Indicator, IndicatorConfig, IndicatorConfigBuilder, Price, Quote,
    Reusable, Series, Timestamp, window,
};

/// Configuration for the Exponential Moving Average ([`Ema`])
/// indicator.
///
/// # Convergence
///
/// EMA has infinite memory: the initial seed value (SMA of the
/// first `length` values) influences all subsequent values. With
/// `enforce_convergence` enabled, results stay `None` until the
/// seed's contribution decays below 1%.
///
/// For EMA(20), that's 63 bars (`3 × (length + 1)`).
/// Without enforcement, values appear as soon as the SMA seed is
/// ready (after `length` bars).
///
/// # Example
///
/// ```
/// use quantedge_hub::{EmaConfig, IndicatorConfig, IndicatorConfigBuilder};
/// use std::num::NonZero;
///
/// let config = EmaConfig::builder()
///     .length(NonZero::new(20).unwrap())
///     .enforce_convergence(true)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.length(), 20);
/// assert_eq!(config.required_bars_to_converge(), 63);
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct EmaConfig {
    length: usize,
    convergence: bool,
    bars_to_converge: usize,
}

impl IndicatorConfig for EmaConfig {
    type Builder = EmaConfigBuilder;

    #[inline]
    fn builder() -> Self::Builder {
        EmaConfigBuilder::new()
    }

    #[inline]
    fn length(&self) -> usize {
        self.length
    }
}

impl EmaConfig {
    #[must_use]
    pub fn new(length: NonZero<usize>) -> Self {
        Self {
            length: length.get(),
            convergence: false,
            bars_to_converge: length.get(),
        }
    }

    /// When `true`, results stay `None` until
    /// [`required_bars_to_converge`](Self::required_bars_to_converge) upstream
    /// records are cached. Default: `false`.
    #[inline]
    #[must_use]
    pub fn enforce_convergence(&self) -> bool {
        self.convergence
    }

    /// Number of bars needed before the EMA output is fully converged.
    ///
    /// When convergence is not enforced, this equals the window length.
    /// When enforced, this is `3 × (length + 1)`.
    #[must_use]
    pub fn required_bars_to_converge(&self) -> usize {
        self.bars_to_converge
    }

    #[inline]
    fn alpha(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let alpha = 2.0 / (self.length + 1) as f64;
        alpha
    }
}

impl Display for EmaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EmaConfig({})", self.length)
    }
}

/// Builder for [`EmaConfig`].
///
/// Defaults: convergence enforcement = `false`.
/// Length must be set before calling
/// [`build`](IndicatorConfigBuilder::build).
pub struct EmaConfigBuilder {
    length: Option<usize>,
    convergence: bool,
}

impl EmaConfigBuilder {
    fn new() -> Self {
        Self {
            length: None,
            convergence: false,
        }
    }

    /// Enables or disables convergence enforcement.
    #[inline]
    #[must_use]
    pub fn enforce_convergence(mut self, enforce: bool) -> Self {
        self.convergence = enforce;
        self
    }
}

impl IndicatorConfigBuilder<EmaConfig> for EmaConfigBuilder {
    #[inline]
    fn length(mut self, length: NonZero<usize>) -> Self {
        self.length.replace(length.get());
        self
    }

    #[inline]
    fn build(self) -> Result<EmaConfig, Error> {
        let length = self.length.ok_or(Error::MissingParameter("length"))?;
        let bars_to_converge = if self.convergence {
            3 * (length + 1)
        } else {
            length
        };

        Ok(EmaConfig {
            length,
            convergence: self.convergence,
            bars_to_converge,
        })
    }
}

/// One [`Ema`] result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmaResult {
    pub timestamp: Timestamp,
    pub ema: Option<Price>,
}

impl Series for EmaResult {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for EmaResult {
    #[inline]
    fn value(&self) -> Option<Price> {
        self.ema
    }
}

/// Running EMA, kept even while the visible result is held back by
/// convergence enforcement.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmaState {
    ema: Option<Price>,
}

/// Exponential Moving Average (EMA).
///
/// A weighted moving average that gives more weight to recent
/// values. Uses the standard smoothing factor
/// `α = 2 / (length + 1)`:
///
/// ```text
/// EMA = α × value + (1 − α) × prev_EMA
/// ```
///
/// The first EMA is the SMA of the first `length` values. A missing
/// upstream value drops the running EMA; it is re-seeded from the next
/// complete window.
///
/// # Example
///
/// ```
/// use quantedge_hub::{Ema, EmaConfig, Value};
/// use std::num::NonZero;
///
/// let ema = Ema::new(EmaConfig::new(NonZero::new(3).unwrap()));
/// let values: Vec<_> = [2.0, 4.0, 6.0, 8.0]
///     .into_iter()
///     .zip(1..)
///     .map(|(v, ts)| Value::new(ts, v))
///     .collect();
///
/// let out = ema.series(&values);
/// // SMA seed = (2 + 4 + 6) / 3 = 4.0
/// assert_eq!(out[2].ema, Some(4.0));
/// // EMA(3) α = 0.5: 8 × 0.5 + 4 × 0.5 = 6.0
/// assert_eq!(out[3].ema, Some(6.0));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Ema {
    pub(crate) config: EmaConfig,
}

impl<In: Reusable> Indicator<In> for Ema {
    type Output = EmaResult;
    type State = EmaState;
    const STATEFUL: bool = true;

    #[inline]
    fn lookback(&self) -> usize {
        self.config.bars_to_converge
    }

    fn compute(&self, ctx: &Context<'_, In, EmaResult>, state: &mut EmaState) -> EmaResult {
        let alpha = self.config.alpha();

        state.ema = match (state.ema, ctx.item().value()) {
            (Some(prev), Some(value)) => Some(alpha.mul_add(value - prev, prev)),
            _ => ctx.lookback(self.config.length).and_then(window::mean),
        };

        let converged = ctx.index() + 1 >= self.config.bars_to_converge;

        EmaResult {
            timestamp: ctx.item().timestamp(),
            ema: state.ema.filter(|_| converged),
        }
    }
}

impl Display for Ema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EMA({})", self.config.length)
    }
}

/// [`Ema`] attached to an upstream.
pub type EmaHub<In = Quote> = Hub<In, Ema>;
