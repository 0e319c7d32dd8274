use crate::{Price, Quote, QuoteProvider, Timestamp, Value};

/// Asserts that two `f64` values are approximately equal using a
/// relative epsilon of `4 * f64::EPSILON`.
macro_rules! assert_approx {
    ($actual:expr, $expected:expr) => {{
        let (a, e) = ($actual, $expected);
        assert!(
            (a - e).abs() <= e.abs() * 4.0 * f64::EPSILON,
            "assert_approx failed: actual={a}, expected={e}, diff={}",
            (a - e).abs(),
        );
    }};
}

pub(crate) use assert_approx;

/// Convenience: bar with just a close price and timestamp (OHLC all equal to close).
pub fn bar(close: Price, time: Timestamp) -> Quote {
    Quote::flat(time, close)
}

/// Bar with distinct OHLC parts.
pub fn ohlc(open: Price, high: Price, low: Price, close: Price, time: Timestamp) -> Quote {
    Quote {
        timestamp: time,
        open,
        high,
        low,
        close,
        volume: 0.0,
    }
}

/// Values at timestamps `1, 2, 3, ...`.
pub fn values(prices: &[Price]) -> Vec<Value> {
    prices
        .iter()
        .zip(1..)
        .map(|(&p, ts)| Value::new(ts, p))
        .collect()
}

/// Provider pre-filled with flat bars at timestamps `1, 2, 3, ...`.
pub fn quotes(prices: &[Price]) -> QuoteProvider<Quote> {
    let provider = QuoteProvider::new();
    for (&price, ts) in prices.iter().zip(1..) {
        provider.add(bar(price, ts)).unwrap();
    }
    provider
}
