mod fixtures;

use fixtures::{assert_matches_reference, load_ref_values};
use quantedge_hub::{Ema, EmaConfig, IndicatorConfig, IndicatorConfigBuilder, QuoteProvider};
use std::num::NonZero;

use crate::fixtures::{assert_values_match, late_arrivals, load_quotes, repaint_sequence};

const REF_PATH: &str = "tests/fixtures/data/ema-20.csv";

/// Tolerance: 1e-6.
/// EMA has infinite memory, but the seed is the same SMA so the
/// recursion stays deterministic.
const TOLERANCE: f64 = 1e-6;

fn ema_20() -> Ema {
    Ema::new(EmaConfig::new(NonZero::new(20).unwrap()))
}

#[test]
fn ema_20_matches_reference() {
    let provider = QuoteProvider::new();
    let hub = ema_20().attach(&provider).unwrap();

    for quote in load_quotes() {
        provider.add(quote).unwrap();
    }

    assert_matches_reference(
        "EMA(20)",
        &hub.results().unwrap(),
        |r| r.timestamp,
        |r| r.ema,
        &load_ref_values(REF_PATH),
        TOLERANCE,
    );
}

#[test]
fn ema_20_repaint_matches_closed() {
    let closed_quotes = QuoteProvider::new();
    let repainted_quotes = QuoteProvider::new();
    let closed = ema_20().attach(&closed_quotes).unwrap();
    let repainted = ema_20().attach(&repainted_quotes).unwrap();

    for (i, quote) in load_quotes().iter().enumerate() {
        closed_quotes.add(*quote).unwrap();

        for tick in repaint_sequence(quote) {
            repainted_quotes.add(tick).unwrap();
        }

        assert_values_match(
            i,
            closed.results().unwrap()[i].ema,
            repainted.results().unwrap()[i].ema,
            TOLERANCE,
        );
    }
}

#[test]
fn ema_20_late_arrivals_match_batch() {
    let quotes = load_quotes();
    let provider = QuoteProvider::new();
    let hub = ema_20().attach(&provider).unwrap();

    for quote in late_arrivals(&quotes, 5) {
        provider.add(quote).unwrap();
    }

    assert_eq!(hub.to_vec().unwrap(), ema_20().series(&quotes));
}

#[test]
fn ema_20_enforced_convergence_hides_warmup() {
    let config = EmaConfig::builder()
        .length(NonZero::new(20).unwrap())
        .enforce_convergence(true)
        .build()
        .unwrap();
    let provider = QuoteProvider::new();
    let hub = Ema::new(config).attach(&provider).unwrap();

    for quote in load_quotes() {
        provider.add(quote).unwrap();
    }

    let reference = load_ref_values(REF_PATH);
    let results = hub.results().unwrap();
    let first = config.required_bars_to_converge() - 1;

    assert!(results[..first].iter().all(|r| r.ema.is_none()));
    assert_matches_reference(
        "EMA(20) converged",
        &results[first..],
        |r| r.timestamp,
        |r| r.ema,
        &reference[first + 1 - config.length()..],
        TOLERANCE,
    );
}
