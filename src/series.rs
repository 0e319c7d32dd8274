/// Price value type used throughout the crate.
pub type Price = f64;

/// Record key: milliseconds since the Unix epoch.
///
/// Keys are strictly increasing within every cache; an equal key means
/// "revision of that record".
pub type Timestamp = u64;

/// A timestamped record that can live in a cache.
pub trait Series {
    /// Key ordering this record within its cache.
    fn timestamp(&self) -> Timestamp;
}

/// A record carrying one chainable value.
///
/// Every indicator result implements this, so any stage can feed another.
/// `None` means the value is not available yet (warm-up).
pub trait Reusable: Series {
    fn value(&self) -> Option<Price>;
}

/// An OHLCV bar.
///
/// Implement this for your own bar type to feed it into a
/// [`QuoteProvider`](crate::QuoteProvider) and derive price parts from it
/// with [`PriceSource`](crate::PriceSource).
///
/// # Example
///
/// ```
/// use quantedge_hub::{Ohlcv, Price, Series, Timestamp};
///
/// struct Candle {
///     open_time: u64,
///     o: f64,
///     h: f64,
///     l: f64,
///     c: f64,
/// }
///
/// impl Series for Candle {
///     fn timestamp(&self) -> Timestamp { self.open_time }
/// }
///
/// impl Ohlcv for Candle {
///     fn open(&self) -> Price { self.o }
///     fn high(&self) -> Price { self.h }
///     fn low(&self) -> Price { self.l }
///     fn close(&self) -> Price { self.c }
/// }
/// ```
pub trait Ohlcv: Series {
    fn open(&self) -> Price;
    fn high(&self) -> Price;
    fn low(&self) -> Price;
    fn close(&self) -> Price;

    /// Traded volume. Defaults to `0.0` for sources without volume.
    fn volume(&self) -> f64 {
        0.0
    }
}

/// Plain OHLCV quote.
///
/// Its chainable [`value`](Reusable::value) is the close price.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quote {
    pub timestamp: Timestamp,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: f64,
}

impl Quote {
    /// Quote with open, high, low and close all equal to `price`.
    #[must_use]
    pub fn flat(timestamp: Timestamp, price: Price) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }
}

impl Series for Quote {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Ohlcv for Quote {
    #[inline]
    fn open(&self) -> Price {
        self.open
    }

    #[inline]
    fn high(&self) -> Price {
        self.high
    }

    #[inline]
    fn low(&self) -> Price {
        self.low
    }

    #[inline]
    fn close(&self) -> Price {
        self.close
    }

    #[inline]
    fn volume(&self) -> f64 {
        self.volume
    }
}

impl Reusable for Quote {
    #[inline]
    fn value(&self) -> Option<Price> {
        Some(self.close)
    }
}

/// A single timestamped value.
///
/// Output of [`PriceSource`](crate::PriceSource) stages and a convenient
/// root record for chains that do not start from bars.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Value {
    pub timestamp: Timestamp,
    pub value: Option<Price>,
}

impl Value {
    #[must_use]
    pub fn new(timestamp: Timestamp, value: Price) -> Self {
        Self {
            timestamp,
            value: Some(value),
        }
    }
}

impl Series for Value {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for Value {
    #[inline]
    fn value(&self) -> Option<Price> {
        self.value
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn quote_value_is_close() {
        let quote = Quote {
            timestamp: 7,
            open: 1.0,
            high: 4.0,
            low: 0.5,
            close: 3.0,
            volume: 10.0,
        };
        assert_eq!(quote.value(), Some(3.0));
        assert_eq!(quote.timestamp(), 7);
        assert_eq!(quote.volume(), 10.0);
    }

    #[test]
    fn flat_quote_repeats_price() {
        let quote = Quote::flat(1, 42.0);
        assert_eq!(quote.open(), 42.0);
        assert_eq!(quote.high(), 42.0);
        assert_eq!(quote.low(), 42.0);
        assert_eq!(quote.close(), 42.0);
    }

    #[test]
    fn value_keeps_missing_value() {
        let value = Value {
            timestamp: 3,
            value: None,
        };
        assert_eq!(Reusable::value(&value), None);
        assert_eq!(Value::new(3, 1.5).value, Some(1.5));
    }
}
