use std::{fmt::Display, num::NonZero};

use crate::Error;

/// Identical consecutive arrivals tolerated before a provider faults.
pub const DEFAULT_MAX_REPEATS: u8 = 100;

/// Configuration for a [`QuoteProvider`](crate::QuoteProvider).
///
/// Hubs attached downstream inherit `max_cache_size`, so one setting
/// bounds the memory of a whole chain.
///
/// # Example
///
/// ```
/// use quantedge_hub::ProviderConfig;
///
/// let config = ProviderConfig::builder()
///     .max_cache_size(500)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.max_cache_size().map(|n| n.get()), Some(500));
/// assert_eq!(config.max_repeats(), 100);
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct ProviderConfig {
    max_cache_size: Option<NonZero<usize>>,
    max_repeats: u8,
}

impl ProviderConfig {
    #[must_use]
    pub fn builder() -> ProviderConfigBuilder {
        ProviderConfigBuilder::new()
    }

    /// No cache bound.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            max_cache_size: None,
            max_repeats: DEFAULT_MAX_REPEATS,
        }
    }

    /// Keeps at most `max_cache_size` records per node.
    #[must_use]
    pub fn bounded(max_cache_size: NonZero<usize>) -> Self {
        Self {
            max_cache_size: Some(max_cache_size),
            ..Self::unbounded()
        }
    }

    #[inline]
    #[must_use]
    pub fn max_cache_size(&self) -> Option<NonZero<usize>> {
        self.max_cache_size
    }

    #[inline]
    #[must_use]
    pub fn max_repeats(&self) -> u8 {
        self.max_repeats
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Display for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.max_cache_size {
            Some(max) => write!(f, "ProviderConfig({max}, {})", self.max_repeats),
            None => write!(f, "ProviderConfig(unbounded, {})", self.max_repeats),
        }
    }
}

/// Builder for [`ProviderConfig`].
///
/// Defaults: unbounded cache, [`DEFAULT_MAX_REPEATS`].
pub struct ProviderConfigBuilder {
    max_cache_size: Option<usize>,
    max_repeats: u8,
}

impl ProviderConfigBuilder {
    fn new() -> Self {
        Self {
            max_cache_size: None,
            max_repeats: DEFAULT_MAX_REPEATS,
        }
    }

    #[must_use]
    pub fn max_cache_size(mut self, max_cache_size: usize) -> Self {
        self.max_cache_size = Some(max_cache_size);
        self
    }

    #[must_use]
    pub fn max_repeats(mut self, max_repeats: u8) -> Self {
        self.max_repeats = max_repeats;
        self
    }

    /// # Errors
    ///
    /// [`Error::InvalidParameter`] for a zero cache size.
    pub fn build(self) -> Result<ProviderConfig, Error> {
        let max_cache_size = self
            .max_cache_size
            .map(|size| {
                NonZero::new(size).ok_or(Error::InvalidParameter {
                    name: "max_cache_size",
                    reason: "must be greater than zero".into(),
                })
            })
            .transpose()?;

        Ok(ProviderConfig {
            max_cache_size,
            max_repeats: self.max_repeats,
        })
    }
}
