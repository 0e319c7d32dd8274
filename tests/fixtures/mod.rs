#![allow(dead_code)]

use quantedge_hub::{BbValue, Quote, Timestamp};
use serde::{Deserialize, de::DeserializeOwned};

/// OHLCV row of the quote fixture.
#[derive(Debug, Clone, Deserialize)]
pub struct RefQuote {
    pub timestamp: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<RefQuote> for Quote {
    fn from(row: RefQuote) -> Self {
        Quote {
            timestamp: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        }
    }
}

/// Reference value with timestamp.
#[derive(Debug, Deserialize)]
pub struct RefValue {
    pub timestamp: Timestamp,
    pub expected: f64,
}

/// Reference BB value with timestamp.
#[derive(Debug, Deserialize)]
pub struct RefBbValue {
    pub timestamp: Timestamp,
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

const QUOTES_PATH: &str = "tests/fixtures/data/quotes.csv";

/// Hourly quotes, 400 bars.
pub fn load_quotes() -> Vec<Quote> {
    load_records::<RefQuote>(QUOTES_PATH, "invalid quote record")
        .into_iter()
        .map(Quote::from)
        .collect()
}

/// Load single-value reference data (SMA, EMA, RSI).
pub fn load_ref_values(path: &str) -> Vec<RefValue> {
    load_records(path, "invalid reference record")
}

/// Load BB reference data (upper, middle, lower).
pub fn load_bb_ref(path: &str) -> Vec<RefBbValue> {
    load_records(path, "invalid BB reference record")
}

/// Assert two f64 values are within tolerance.
pub fn assert_near(actual: f64, expected: f64, tolerance: f64, context: &str) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "{context}: expected {expected:.10}, got {actual:.10}, diff {diff:.2e} > tolerance {tolerance:.2e}"
    );
}

/// Walks `results` against `reference`, which starts at the first
/// converged timestamp. Every result before it must be `None`.
pub fn assert_matches_reference<T>(
    label: &str,
    results: &[T],
    timestamp: impl Fn(&T) -> Timestamp,
    value: impl Fn(&T) -> Option<f64>,
    reference: &[RefValue],
    tolerance: f64,
) {
    let mut ref_idx = 0;
    for result in results {
        let ts = timestamp(result);

        if ref_idx < reference.len() && ts == reference[ref_idx].timestamp {
            let actual = value(result).unwrap_or_else(|| panic!("{label} returned None at t={ts}"));
            assert_near(
                actual,
                reference[ref_idx].expected,
                tolerance,
                &format!("{label} at bar {ref_idx} (t={ts})"),
            );
            ref_idx += 1;
        } else if ref_idx == 0 {
            assert!(value(result).is_none(), "{label} converged early at t={ts}");
        }
    }

    assert_eq!(
        ref_idx,
        reference.len(),
        "not all reference values checked: {ref_idx}/{}",
        reference.len()
    );
}

/// Creates perturbed versions of a quote to simulate live repaints.
///
/// Returns 2 intermediate quotes (with shifted close/high/low) followed
/// by the unchanged quote. All share the same `timestamp`.
pub fn repaint_sequence(quote: &Quote) -> Vec<Quote> {
    let t = quote.timestamp;
    vec![
        // First tick: only open is known, close near open
        Quote {
            timestamp: t,
            open: quote.open,
            high: quote.open * 1.001,
            low: quote.open * 0.999,
            close: quote.open * 1.0005,
            volume: quote.volume - 2.0,
        },
        // Mid-bar: partial movement toward final values
        Quote {
            timestamp: t,
            open: quote.open,
            high: quote.open.midpoint(quote.high),
            low: quote.open.midpoint(quote.low),
            close: quote.open.midpoint(quote.close),
            volume: quote.volume - 1.0,
        },
        // Final: real values
        *quote,
    ]
}

/// Arrival order with every `every`-th quote delayed past its successor.
pub fn late_arrivals(quotes: &[Quote], every: usize) -> Vec<Quote> {
    let mut out = quotes.to_vec();
    for i in (every..out.len()).step_by(every) {
        out.swap(i - 1, i);
    }
    out
}

pub fn assert_values_match(
    bar_idx: usize,
    closed: Option<f64>,
    repainted: Option<f64>,
    tolerance: f64,
) {
    match (closed, repainted) {
        (None, None) => {} // both pre-convergence, fine
        (Some(c), Some(r)) => {
            let diff = (c - r).abs();
            assert!(
                diff <= tolerance,
                "diverged at bar {bar_idx}: closed={c:.10}, repainted={r:.10}, diff={diff:.2e}"
            );
        }
        (c, r) => {
            panic!("convergence mismatch at bar {bar_idx}: closed={c:?}, repainted={r:?}");
        }
    }
}

/// Assert BB values match between two hubs.
pub fn assert_bb_values_match(
    bar_idx: usize,
    closed: Option<BbValue>,
    repainted: Option<BbValue>,
    tolerance: f64,
) {
    match (closed, repainted) {
        (None, None) => {}
        (Some(c), Some(r)) => {
            for (band, cv, rv) in [
                ("upper", c.upper(), r.upper()),
                ("middle", c.middle(), r.middle()),
                ("lower", c.lower(), r.lower()),
            ] {
                let diff = (cv - rv).abs();
                assert!(
                    diff <= tolerance,
                    "BB {band} diverged at bar {bar_idx}: closed={cv:.10}, repainted={rv:.10}, diff={diff:.2e}"
                );
            }
        }
        (c, r) => {
            panic!("BB convergence mismatch at bar {bar_idx}: closed={c:?}, repainted={r:?}");
        }
    }
}

fn load_records<D>(path: &str, expect_msg: &str) -> Vec<D>
where
    D: DeserializeOwned,
{
    let mut rdr =
        csv::Reader::from_path(path).unwrap_or_else(|e| panic!("failed to open {path}: {e}"));

    rdr.deserialize().map(|r| r.expect(expect_msg)).collect()
}
