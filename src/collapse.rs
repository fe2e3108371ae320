//! Group-reduce primitives over stably sorted keys.
//!
//! The scatter-accumulate operations in this crate all follow one idiom:
//! form integer keys, stable-sort, then collapse runs of equal keys with
//! an order-dependent reduction. The sort must be stable so that entries
//! sharing a key are reduced in insertion order; floating-point addition
//! is evaluated in a deterministic order and last-write-wins collapses
//! keep the correct survivor.

/// Indices that visit `keys` in ascending order, preserving insertion
/// order among equal keys (std's sort is stable).
pub(crate) fn argsort_stable(keys: &[i64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by_key(|&i| keys[i]);
    order
}

/// Collapse `(key, delta)` pairs into unique ascending keys with the sum
/// of the deltas attached to each key.
pub(crate) fn sum_by_key(keys: &[i64], deltas: &[f64]) -> (Vec<i64>, Vec<f64>) {
    debug_assert_eq!(keys.len(), deltas.len());
    let order = argsort_stable(keys);
    let mut out_keys = Vec::new();
    let mut out_sums: Vec<f64> = Vec::new();
    for &i in &order {
        match out_keys.last() {
            Some(&last) if last == keys[i] => {
                // In-order accumulation within the run.
                let n = out_sums.len() - 1;
                out_sums[n] += deltas[i];
            }
            _ => {
                out_keys.push(keys[i]);
                out_sums.push(deltas[i]);
            }
        }
    }
    (out_keys, out_sums)
}

/// Collapse `(key, delta)` pairs into unique ascending keys carrying the
/// running total of every delta at or before each key. This is the
/// difference-array view of superposing step functions: the total at key
/// `k` is the merged signal's value on the segment starting at `k`.
pub(crate) fn cumsum_by_key(keys: &[i64], deltas: &[f64]) -> (Vec<i64>, Vec<f64>) {
    debug_assert_eq!(keys.len(), deltas.len());
    let order = argsort_stable(keys);
    let mut out_keys = Vec::new();
    let mut out_totals: Vec<f64> = Vec::new();
    let mut running = 0.0;
    for &i in &order {
        running += deltas[i];
        match out_keys.last() {
            Some(&last) if last == keys[i] => {
                let n = out_totals.len() - 1;
                out_totals[n] = running;
            }
            _ => {
                out_keys.push(keys[i]);
                out_totals.push(running);
            }
        }
    }
    (out_keys, out_totals)
}

/// Keep-mask for last-write-wins de-duplication of a non-decreasing run
/// of mapped coordinates: an element survives when the next element maps
/// elsewhere, and the final element always survives to anchor the row
/// length.
pub(crate) fn last_write_mask(mapped: &[i64]) -> Vec<bool> {
    let n = mapped.len();
    let mut mask = vec![false; n];
    for i in 0..n {
        if i + 1 == n || mapped[i + 1] > mapped[i] {
            mask[i] = true;
        }
    }
    mask
}
