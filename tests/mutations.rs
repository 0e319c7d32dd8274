use approx::assert_abs_diff_eq;
use quantedge_hub::{
    Act, Ema, EmaConfig, PriceSource, ProviderConfig, Quote, QuoteProvider, Rsi, RsiConfig, Sma,
    SmaConfig,
};
use std::num::NonZero;

fn nz(n: usize) -> NonZero<usize> {
    NonZero::new(n).unwrap()
}

fn sma(length: usize) -> Sma {
    Sma::new(SmaConfig::new(nz(length)))
}

fn five_bars() -> QuoteProvider<Quote> {
    let provider = QuoteProvider::new();
    for (ts, price) in [(10, 10.0), (20, 11.0), (30, 12.0), (40, 11.0), (50, 13.0)] {
        provider.add(Quote::flat(ts, price)).unwrap();
    }
    provider
}

#[test]
fn streamed_sma_matches_batch() {
    let provider = QuoteProvider::new();
    let hub = sma(3).attach(&provider).unwrap();

    for (ts, price) in [(10, 10.0), (20, 11.0), (30, 12.0), (40, 11.0), (50, 13.0)] {
        provider.add(Quote::flat(ts, price)).unwrap();
    }

    let results = hub.results().unwrap();
    assert_eq!(results[0].sma, None);
    assert_eq!(results[1].sma, None);
    assert_abs_diff_eq!(results[2].sma.unwrap(), 11.0, epsilon = 1e-12);
    assert_abs_diff_eq!(results[3].sma.unwrap(), 34.0 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(results[4].sma.unwrap(), 12.0, epsilon = 1e-12);
}

#[test]
fn late_bar_rebuilds_to_corrected_batch() {
    let provider = five_bars();
    let hub = sma(3).attach(&provider).unwrap();

    assert_eq!(provider.add(Quote::flat(25, 100.0)).unwrap(), Act::InsertLate);

    let corrected = provider.to_vec().unwrap();
    assert_eq!(corrected.len(), 6);
    assert_eq!(hub.to_vec().unwrap(), sma(3).series(&corrected));
    // unaffected prefix
    assert_eq!(hub.results().unwrap()[1].sma, None);
}

#[test]
fn revision_changes_only_the_newest_result() {
    let provider = five_bars();
    let hub = sma(3).attach(&provider).unwrap();
    let before = hub.to_vec().unwrap();

    assert_eq!(provider.add(Quote::flat(50, 16.0)).unwrap(), Act::ReviseLast);

    let after = hub.to_vec().unwrap();
    assert_eq!(after[..4], before[..4]);
    assert_abs_diff_eq!(after[4].sma.unwrap(), 13.0, epsilon = 1e-12);
}

#[test]
fn removal_rebuilds_from_removed_timestamp() {
    let provider = five_bars();
    let hub = sma(3).attach(&provider).unwrap();

    provider.remove(30).unwrap();

    assert_eq!(hub.index_of(30), None);
    assert_eq!(hub.to_vec().unwrap(), sma(3).series(&provider.to_vec().unwrap()));
}

#[test]
fn range_removal_then_replay_matches_batch() {
    let provider = five_bars();
    let rsi = Rsi::new(RsiConfig::new(nz(2)));
    let hub = rsi.attach(&provider).unwrap();

    assert_eq!(provider.remove_range(30).unwrap(), 3);
    assert_eq!(hub.len(), 2);

    for (ts, price) in [(30, 9.0), (40, 14.0), (50, 12.0)] {
        provider.add(Quote::flat(ts, price)).unwrap();
    }
    assert_eq!(hub.to_vec().unwrap(), rsi.series(&provider.to_vec().unwrap()));
}

#[test]
fn chain_equals_composed_batch() {
    let provider = five_bars();
    let rsi = Rsi::new(RsiConfig::new(nz(2)));
    let inner = rsi.attach(&provider).unwrap();
    let outer = sma(2).attach(&inner).unwrap();

    provider.add(Quote::flat(25, 100.0)).unwrap();
    provider.add(Quote::flat(60, 12.5)).unwrap();
    provider.add(Quote::flat(60, 12.0)).unwrap();
    provider.remove(40).unwrap();

    let quotes = provider.to_vec().unwrap();
    assert_eq!(outer.to_vec().unwrap(), sma(2).series(&rsi.series(&quotes)));
}

#[test]
fn price_stage_feeds_indicator() {
    let provider = QuoteProvider::new();
    let median = PriceSource::HL2.attach(&provider).unwrap();
    let ema = Ema::new(EmaConfig::new(nz(2)));
    let hub = ema.attach(&median).unwrap();

    for ts in 1..=6u32 {
        let mid = f64::from(ts) * 10.0;
        provider
            .add(Quote {
                timestamp: u64::from(ts),
                open: mid,
                high: mid + 2.0,
                low: mid - 2.0,
                close: mid + 1.0,
                volume: 0.0,
            })
            .unwrap();
    }

    let medians = median.to_vec().unwrap();
    assert_eq!(medians[0].value, Some(10.0));
    assert_eq!(hub.to_vec().unwrap(), ema.series(&medians));
}

#[test]
fn bounded_chain_tail_equals_full_history_tail() {
    let bounded = QuoteProvider::with_config(ProviderConfig::bounded(nz(8)));
    let full = QuoteProvider::new();
    let rsi = Rsi::new(RsiConfig::new(nz(3)));
    let bounded_hub = rsi.attach(&bounded).unwrap();
    let full_hub = rsi.attach(&full).unwrap();

    for i in 1..=40u32 {
        let quote = Quote::flat(u64::from(i), 100.0 + f64::from(i * 5 % 9));
        bounded.add(quote).unwrap();
        full.add(quote).unwrap();
    }

    let full_results = full_hub.to_vec().unwrap();
    assert_eq!(bounded.len(), 8);
    assert_eq!(bounded_hub.to_vec().unwrap(), full_results[32..]);
}

#[test]
fn detached_hub_is_frozen() {
    let provider = five_bars();
    let hub = sma(3).attach(&provider).unwrap();
    let frozen = hub.to_vec().unwrap();

    hub.unsubscribe();
    provider.add(Quote::flat(60, 20.0)).unwrap();
    provider.remove(10).unwrap();

    assert_eq!(hub.to_vec().unwrap(), frozen);
}
