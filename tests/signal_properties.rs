//! Integration tests for the compressed signal algebra.
//!
//! These exercise cross-module properties: extraction composed with
//! joining, batch summation, strand symmetry, and the pileup/threshold
//! pair as approximate inverses.

use bgat::prelude::*;

fn fixture() -> BedGraph {
    BedGraph::new(
        vec![0, 10, 15, 25, 40],
        vec![0.0, 1.0, 2.0, 3.0, 4.0],
        50,
    )
    .unwrap()
}

#[test]
fn test_tiling_extraction_preserves_values() {
    // Extract adjacent windows tiling the domain, stitch them back, and
    // compare pointwise. Breakpoint sets may differ (a segment split at
    // a window border stays split), so compare values, not structure.
    let signal = fixture();
    let tiles = Regions::forward(vec![0, 20], vec![20, 50]).unwrap();
    let joined = signal
        .extract_regions(&tiles)
        .unwrap()
        .join_rows(&[0, 2])
        .unwrap();
    let row = joined.row(0).unwrap();
    assert_eq!(row.size(), signal.size());
    for x in 0..50 {
        assert_eq!(row.value_at(x), signal.value_at(x), "at {}", x);
    }
}

#[test]
fn test_sum_rows_is_additive_over_vstack() {
    let signal = fixture();
    let a = signal
        .extract_regions(&Regions::forward(vec![0, 10], vec![20, 30]).unwrap())
        .unwrap();
    let b = signal
        .extract_regions(&Regions::forward(vec![25], vec![45]).unwrap())
        .unwrap();
    let stacked = BedGraphArray::vstack(&[a.clone(), b.clone()]).unwrap();

    let merged = stacked.sum_rows().unwrap();
    for x in 0..20 {
        let want: f64 = a
            .rows()
            .chain(b.rows())
            .map(|row| row.value_at(x))
            .sum();
        assert_eq!(merged.value_at(x), want, "at {}", x);
    }
}

#[test]
fn test_reverse_window_matches_reversed_forward_window() {
    let signal = fixture();
    let forward = Regions::forward(vec![5], vec![45]).unwrap();
    let reverse = Regions::new(vec![5], vec![45], vec![Strand::Reverse]).unwrap();

    let fwd_row = signal
        .extract_regions(&forward)
        .unwrap()
        .row(0)
        .unwrap()
        .to_owned();
    let rev_row = signal
        .extract_regions(&reverse)
        .unwrap()
        .row(0)
        .unwrap()
        .to_owned();
    assert_eq!(fwd_row.reverse().unwrap(), rev_row);
}

#[test]
fn test_threshold_then_pileup_recovers_indicator() {
    // For a 0/1 signal the >= 1 runs piled back up give the signal.
    let indicator =
        BedGraph::new(vec![0, 5, 12, 18], vec![0.0, 1.0, 0.0, 1.0], 30).unwrap();
    let runs = indicator.threshold(1.0).unwrap();
    let piled = coverage(&runs).unwrap().finalize(30).unwrap();
    assert_eq!(piled, indicator);
}

#[test]
fn test_scale_then_extract_commutes_on_aligned_windows() {
    // Doubling the domain then halving window coordinates visits the
    // same segments: values agree at corresponding positions.
    let signal = fixture();
    let doubled = signal.scale(100).unwrap();
    for x in 0..50 {
        assert_eq!(doubled.value_at(2 * x), signal.value_at(x), "at {}", x);
    }
}

#[test]
fn test_spliced_extraction_skips_introns() {
    let signal = fixture();
    let exons = Regions::forward(vec![5, 30], vec![15, 45]).unwrap();
    let split = SplitRegions::new(exons, vec![0, 2]).unwrap();
    let transcript = split.extract_signals(&signal).unwrap();
    let row = transcript.row(0).unwrap();
    assert_eq!(row.size(), Some(25));
    // Local 0..10 maps to genomic 5..15, local 10..25 to genomic 30..45.
    assert_eq!(row.value_at(0), 0.0);
    assert_eq!(row.value_at(6), 1.0);
    assert_eq!(row.value_at(10), 3.0);
    assert_eq!(row.value_at(20), 4.0);
}
