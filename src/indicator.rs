use crate::{Error, Series};

use std::{
    fmt::{Debug, Display},
    hash::Hash,
    num::NonZero,
};

/// Configuration for a technical [`Indicator`].
///
/// Every indicator has a corresponding config type that holds its parameters.
/// Configs are value types: cheap to clone, compare, and hash.
pub trait IndicatorConfig: Sized + PartialEq + Eq + Hash + Display + Debug {
    /// Builder type for constructing this config.
    type Builder: IndicatorConfigBuilder<Self>;

    /// Returns a new builder with default values.
    fn builder() -> Self::Builder;

    /// Window length (number of bars).
    fn length(&self) -> usize;
}

/// Builder for an [`IndicatorConfig`].
pub trait IndicatorConfigBuilder<Config>
where
    Config: IndicatorConfig,
{
    /// Sets the indicator window length.
    #[must_use]
    fn length(self, length: NonZero<usize>) -> Self;

    /// Builds the config.
    ///
    /// # Errors
    ///
    /// [`Error::MissingParameter`] when a required field was never set, or
    /// [`Error::InvalidParameter`] when a value is out of range.
    fn build(self) -> Result<Config, Error>;
}

/// Per-item computation run by a [`Hub`](crate::Hub).
///
/// `compute` must be a pure function of the [`Context`] and the hidden
/// `state` carried over from the previous bar: the hub replays it freely
/// during rebuilds and revisions, and relies on it producing identical
/// results to a batch pass over the same history.
///
/// Indicators whose only memory is the upstream window or their own
/// previous results keep `State = ()` and `STATEFUL = false`. Indicators
/// with hidden accumulators (RSI averages, the EMA seed) set
/// `STATEFUL = true`; the hub then snapshots the state after every bar so a
/// revision or a replay can resume from any retained bar.
pub trait Indicator<In: Series>: Display {
    /// One result per upstream record, keyed by the same timestamp.
    type Output: Series + Clone + Debug;

    /// Hidden state carried from one bar to the next.
    type State: Clone + Debug + Default;

    const STATEFUL: bool = false;

    /// Upstream records needed before the first value appears.
    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, ctx: &Context<'_, In, Self::Output>, state: &mut Self::State)
    -> Self::Output;
}

/// What an [`Indicator`] may observe while computing one item: upstream
/// records up to and including the item, and its own results strictly
/// before it. Nothing later is reachable.
#[derive(Debug)]
pub struct Context<'a, In, Out> {
    upstream: &'a [In],
    results: &'a [Out],
}

impl<'a, In, Out> Context<'a, In, Out> {
    /// `None` when `index` is outside `upstream`.
    #[must_use]
    pub(crate) fn new(upstream: &'a [In], index: usize, results: &'a [Out]) -> Option<Self> {
        let upstream = upstream.get(..=index)?;
        Some(Self { upstream, results })
    }

    /// Position of the item within the upstream cache.
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.upstream.len() - 1
    }

    #[inline]
    #[must_use]
    pub fn item(&self) -> &'a In {
        &self.upstream[self.upstream.len() - 1]
    }

    /// Upstream records up to and including the item.
    #[inline]
    #[must_use]
    pub fn history(&self) -> &'a [In] {
        self.upstream
    }

    #[inline]
    #[must_use]
    pub fn previous_item(&self) -> Option<&'a In> {
        self.upstream.len().checked_sub(2).map(|i| &self.upstream[i])
    }

    /// The last `len` upstream records ending at the item, `None` while
    /// fewer are cached.
    #[inline]
    #[must_use]
    pub fn lookback(&self, len: usize) -> Option<&'a [In]> {
        let start = self.upstream.len().checked_sub(len)?;
        Some(&self.upstream[start..])
    }

    /// Own results preceding the item.
    #[inline]
    #[must_use]
    pub fn results(&self) -> &'a [Out] {
        self.results
    }

    #[inline]
    #[must_use]
    pub fn previous_result(&self) -> Option<&'a Out> {
        self.results.last()
    }
}

/// Computes `indicator` over `items` from scratch.
///
/// This is the batch reference every hub must agree with.
pub fn batch<In, I>(indicator: &I, items: &[In]) -> Vec<I::Output>
where
    In: Series,
    I: Indicator<In>,
{
    let mut results = Vec::with_capacity(items.len());
    let mut state = I::State::default();

    for index in 0..items.len() {
        let Some(ctx) = Context::new(items, index, &results) else {
            break;
        };
        let out = indicator.compute(&ctx, &mut state);
        results.push(out);
    }

    results
}
