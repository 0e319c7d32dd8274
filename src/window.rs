use crate::{Price, Reusable};

/// Sum of the window's values, `None` if any value is missing.
#[inline]
pub(crate) fn sum<R: Reusable>(window: &[R]) -> Option<Price> {
    window
        .iter()
        .try_fold(0.0, |acc, item| item.value().map(|v| acc + v))
}

/// Arithmetic mean of the window, `None` if it is empty or any value is
/// missing.
#[inline]
#[allow(clippy::cast_precision_loss)]
pub(crate) fn mean<R: Reusable>(window: &[R]) -> Option<Price> {
    if window.is_empty() {
        return None;
    }

    sum(window).map(|sum| sum / window.len() as f64)
}

/// Population standard deviation around `mean`.
///
/// Two-pass over the window rather than a running sum of squares, so the
/// result does not depend on how the window was reached.
#[inline]
#[allow(clippy::cast_precision_loss)]
pub(crate) fn std_dev<R: Reusable>(window: &[R], mean: Price) -> Option<f64> {
    if window.is_empty() {
        return None;
    }

    let squares = window.iter().try_fold(0.0, |acc, item| {
        item.value().map(|v| {
            let d = v - mean;
            d.mul_add(d, acc)
        })
    })?;

    Some((squares / window.len() as f64).sqrt())
}
