//! Compressed step-function signals ("BedGraph" tracks).
//!
//! A [`BedGraph`] stores a piecewise-constant function over the half-open
//! integer domain `[0, size)` as strictly increasing breakpoints plus the
//! value holding from each breakpoint to the next. No operation ever
//! materializes a dense per-base array; extraction, reversal, slicing and
//! rescaling are all sorted-array algebra over the breakpoints.

use ndarray::ArrayViewMut1;

use crate::bedgraph_array::BedGraphArray;
use crate::collapse::last_write_mask;
use crate::error::{Result, TrackError};
use crate::regions::{Regions, Strand};

/// `searchsorted(side="right")`: first position whose element is > x.
#[inline]
pub(crate) fn upper_bound(sorted: &[i64], x: i64) -> usize {
    sorted.partition_point(|&v| v <= x)
}

/// `searchsorted(side="left")`: first position whose element is >= x.
#[inline]
pub(crate) fn lower_bound(sorted: &[i64], x: i64) -> usize {
    sorted.partition_point(|&v| v < x)
}

/// Shared read capability for owned signals and batch-row views.
///
/// Implementors expose their breakpoint arrays; the query and transform
/// logic is written once here. Transforms return owned [`BedGraph`]s.
pub trait Track {
    fn indices(&self) -> &[i64];
    fn values(&self) -> &[f64];
    /// Domain size; `None` for open-ended intermediates.
    fn size(&self) -> Option<i64>;

    /// Value of the step function at position `x`; 0 left of the domain.
    fn value_at(&self, x: i64) -> f64 {
        let idx = upper_bound(self.indices(), x);
        if idx == 0 {
            0.0
        } else {
            self.values()[idx - 1]
        }
    }

    /// Sum of segment width times value over the whole domain.
    fn integral(&self) -> Result<f64> {
        let size = require_size(self.size())?;
        let indices = self.indices();
        let values = self.values();
        let mut total = 0.0;
        for k in 0..indices.len() {
            let next = if k + 1 < indices.len() {
                indices[k + 1]
            } else {
                size
            };
            total += (next - indices[k]) as f64 * values[k];
        }
        Ok(total)
    }

    /// Mirror the domain: position `x` maps to `size - 1 - x` segment-wise,
    /// so the last segment becomes the first. The first output breakpoint
    /// is forced back to 0.
    fn reverse(&self) -> Result<BedGraph> {
        let size = require_size(self.size())?;
        let (indices, values) = reversed_parts(self.indices(), self.values(), size);
        BedGraph::new(indices, values, size)
    }

    /// Extract the sub-domain `[start, stop)`. The value active at
    /// `start` becomes the new breakpoint-0 value even when `start`
    /// falls mid-segment. `step` must be 1 or -1; -1 composes the slice
    /// with a reversal.
    fn slice(&self, start: i64, stop: i64, step: i8) -> Result<BedGraph> {
        if step != 1 && step != -1 {
            return Err(TrackError::domain(format!(
                "slice step must be 1 or -1, got {}",
                step
            )));
        }
        let size = require_size(self.size())?;
        if start < 0 || stop <= start || stop > size {
            return Err(TrackError::domain(format!(
                "slice [{}, {}) outside domain [0, {})",
                start, stop, size
            )));
        }
        let indices = self.indices();
        let values = self.values();
        let start_idx = upper_bound(indices, start);
        let end_idx = lower_bound(indices, stop);

        let mut new_indices = Vec::with_capacity(end_idx - start_idx + 1);
        let mut new_values = Vec::with_capacity(end_idx - start_idx + 1);
        new_indices.push(0);
        new_values.push(values[start_idx - 1]);
        for k in start_idx..end_idx {
            new_indices.push(indices[k] - start);
            new_values.push(values[k]);
        }
        let sliced = BedGraph::new(new_indices, new_values, stop - start)?;
        if step == -1 {
            sliced.reverse()
        } else {
            Ok(sliced)
        }
    }
}

fn require_size(size: Option<i64>) -> Result<i64> {
    size.ok_or_else(|| {
        TrackError::invariant("operation requires a finalized signal (no size set)")
    })
}

/// Reverse a breakpoint/value run over `[0, size)`. Shared by
/// [`Track::reverse`] and the mirrored branch of region extraction.
pub(crate) fn reversed_parts(indices: &[i64], values: &[f64], size: i64) -> (Vec<i64>, Vec<f64>) {
    let m = indices.len();
    let mut rev_indices = Vec::with_capacity(m);
    let mut rev_values = Vec::with_capacity(m);
    rev_indices.push(0);
    for k in (1..m).rev() {
        rev_indices.push(size - indices[k]);
    }
    for k in (0..m).rev() {
        rev_values.push(values[k]);
    }
    (rev_indices, rev_values)
}

/// A single compressed step-function signal.
#[derive(Debug, Clone, PartialEq)]
pub struct BedGraph {
    indices: Vec<i64>,
    values: Vec<f64>,
    size: Option<i64>,
}

impl Track for BedGraph {
    #[inline]
    fn indices(&self) -> &[i64] {
        &self.indices
    }

    #[inline]
    fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    fn size(&self) -> Option<i64> {
        self.size
    }
}

impl BedGraph {
    /// Build a finalized signal over `[0, size)`.
    ///
    /// Invariants checked: matching array lengths, non-empty, first
    /// breakpoint 0, strictly increasing breakpoints, last breakpoint
    /// inside the domain.
    pub fn new(indices: Vec<i64>, values: Vec<f64>, size: i64) -> Result<Self> {
        validate_run(&indices, &values)?;
        let last = indices[indices.len() - 1];
        if last >= size {
            return Err(TrackError::invariant(format!(
                "breakpoint {} outside domain [0, {})",
                last, size
            )));
        }
        Ok(Self {
            indices,
            values,
            size: Some(size),
        })
    }

    /// Build an open-ended signal (no size yet). Intermediate results
    /// only; must be finalized before slicing, scaling or extraction.
    pub fn open_ended(indices: Vec<i64>, values: Vec<f64>) -> Result<Self> {
        validate_run(&indices, &values)?;
        Ok(Self {
            indices,
            values,
            size: None,
        })
    }

    /// Attach a domain size to an open-ended signal.
    pub fn finalize(self, size: i64) -> Result<Self> {
        BedGraph::new(self.indices, self.values, size)
    }

    /// Construct from parts whose invariants are already guaranteed by
    /// the caller (batch rows hold them by construction).
    pub(crate) fn from_validated(indices: Vec<i64>, values: Vec<f64>, size: i64) -> Self {
        debug_assert!(validate_run(&indices, &values).is_ok());
        debug_assert!(indices[indices.len() - 1] < size);
        Self {
            indices,
            values,
            size: Some(size),
        }
    }

    /// Number of breakpoints.
    #[inline]
    pub fn num_segments(&self) -> usize {
        self.indices.len()
    }

    /// Map every breakpoint to `x * new_size / size` (integer floor).
    ///
    /// When several source breakpoints collapse onto one target
    /// coordinate only the last in source order is kept: any earlier
    /// sub-pixel segment is fully shadowed by the final one. The last
    /// breakpoint always survives to anchor the row length. At high
    /// compression this drops segments instead of area-weighting them; a
    /// known fidelity limitation that is preserved deliberately.
    pub fn scale(&self, new_size: i64) -> Result<BedGraph> {
        let size = require_size(self.size)?;
        if new_size <= 0 {
            return Err(TrackError::domain(format!(
                "scale target must be positive, got {}",
                new_size
            )));
        }
        let mapped: Vec<i64> = self.indices.iter().map(|&x| x * new_size / size).collect();
        let mask = last_write_mask(&mapped);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        for k in 0..mapped.len() {
            if mask[k] {
                indices.push(mapped[k]);
                values.push(self.values[k]);
            }
        }
        BedGraph::new(indices, values, new_size)
    }

    /// Extract one batch row per query interval, in one pass with
    /// prefix-sum offset bookkeeping.
    ///
    /// Each row lives in local coordinates `[0, end-start)`. On reverse
    /// rows the coordinates are mirrored and the value order reversed so
    /// local position 0 is always the interval's strand 5' end.
    pub fn extract_regions(&self, regions: &Regions) -> Result<BedGraphArray> {
        let size = require_size(self.size)?;
        let mut indices = Vec::new();
        let mut values = Vec::new();
        let mut sizes = Vec::with_capacity(regions.len());
        let mut offsets = Vec::with_capacity(regions.len() + 1);
        offsets.push(0);

        for region in regions.iter() {
            if region.start < 0 || region.end > size {
                return Err(TrackError::domain(format!(
                    "query [{}, {}) outside signal domain [0, {})",
                    region.start, region.end, size
                )));
            }
            let start_idx = upper_bound(&self.indices, region.start);
            let end_idx = lower_bound(&self.indices, region.end);
            // start_idx >= 1 because indices[0] == 0 <= start.
            match region.direction {
                Strand::Forward => {
                    indices.push(0);
                    values.push(self.values[start_idx - 1]);
                    for k in start_idx..end_idx {
                        indices.push(self.indices[k] - region.start);
                        values.push(self.values[k]);
                    }
                }
                Strand::Reverse => {
                    // Mirrored in place: breakpoint k becomes
                    // end - indices[k], paired with the value left of it.
                    indices.push(0);
                    values.push(self.values[end_idx - 1]);
                    for k in (start_idx..end_idx).rev() {
                        indices.push(region.end - self.indices[k]);
                        values.push(self.values[k - 1]);
                    }
                }
            }
            sizes.push(region.len());
            offsets.push(indices.len());
        }
        BedGraphArray::new(indices, values, sizes, offsets)
    }

    /// Maximal runs where the value is at least `value`, as forward
    /// intervals. Runs touching the domain edges are closed at 0 and
    /// `size`.
    pub fn threshold(&self, value: f64) -> Result<Regions> {
        let size = require_size(self.size)?;
        let mut starts = Vec::new();
        let mut ends = Vec::new();
        let mut open: Option<i64> = None;
        for k in 0..self.indices.len() {
            let over = self.values[k] >= value;
            match (open, over) {
                (None, true) => open = Some(self.indices[k]),
                (Some(start), false) => {
                    starts.push(start);
                    ends.push(self.indices[k]);
                    open = None;
                }
                _ => {}
            }
        }
        if let Some(start) = open {
            starts.push(start);
            ends.push(size);
        }
        Regions::forward(starts, ends)
    }

    /// End-to-end join of finalized signals into one longer domain.
    pub fn concatenate(signals: &[BedGraph]) -> Result<BedGraph> {
        if signals.is_empty() {
            return Err(TrackError::invariant("concatenate of zero signals"));
        }
        let mut indices = Vec::new();
        let mut values = Vec::new();
        let mut offset = 0i64;
        for signal in signals {
            let size = require_size(signal.size)?;
            for (&idx, &val) in signal.indices.iter().zip(&signal.values) {
                let shifted = idx + offset;
                if let Some(&prev) = indices.last() {
                    if shifted <= prev {
                        return Err(TrackError::invariant(format!(
                            "concatenated breakpoints not strictly increasing at {}",
                            shifted
                        )));
                    }
                }
                indices.push(shifted);
                values.push(val);
            }
            offset += size;
        }
        BedGraph::new(indices, values, offset)
    }

    /// Add this signal's step contributions into a shared difference
    /// buffer: `diffs[0] += values[0]`, then the value delta at every
    /// later breakpoint. The caller reconstructs absolute values with a
    /// prefix sum, so superposing many signals costs O(breakpoints)
    /// each, not O(domain).
    pub fn update_dense_diffs(&self, mut diffs: ArrayViewMut1<f64>) -> Result<()> {
        let last = self.indices[self.indices.len() - 1];
        if last >= diffs.len() as i64 {
            return Err(TrackError::domain(format!(
                "breakpoint {} outside dense buffer of width {}",
                last,
                diffs.len()
            )));
        }
        diffs[0] += self.values[0];
        for k in 1..self.indices.len() {
            diffs[self.indices[k] as usize] += self.values[k] - self.values[k - 1];
        }
        Ok(())
    }
}

fn validate_run(indices: &[i64], values: &[f64]) -> Result<()> {
    if indices.is_empty() {
        return Err(TrackError::invariant("signal must have at least one breakpoint"));
    }
    if indices.len() != values.len() {
        return Err(TrackError::invariant(format!(
            "mismatched signal arrays: {} breakpoints, {} values",
            indices.len(),
            values.len()
        )));
    }
    if indices[0] != 0 {
        return Err(TrackError::invariant(format!(
            "first breakpoint must be 0, got {}",
            indices[0]
        )));
    }
    if indices.windows(2).any(|w| w[1] <= w[0]) {
        return Err(TrackError::invariant(
            "breakpoints must be strictly increasing",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn fixture() -> BedGraph {
        BedGraph::new(
            vec![0, 10, 15, 25, 40],
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            50,
        )
        .unwrap()
    }

    #[test]
    fn test_value_at() {
        let bg = fixture();
        let got: Vec<f64> = [10, 11, 14, 15, 16].iter().map(|&x| bg.value_at(x)).collect();
        assert_eq!(got, vec![1.0, 1.0, 1.0, 2.0, 2.0]);
        assert_eq!(bg.value_at(-1), 0.0);
        assert_eq!(bg.value_at(49), 4.0);
    }

    #[test]
    fn test_slice_scenarios() {
        let bg = fixture();
        assert_eq!(
            bg.slice(9, 25, 1).unwrap(),
            BedGraph::new(vec![0, 1, 6], vec![0.0, 1.0, 2.0], 16).unwrap()
        );
        assert_eq!(
            bg.slice(10, 26, 1).unwrap(),
            BedGraph::new(vec![0, 5, 15], vec![1.0, 2.0, 3.0], 16).unwrap()
        );
        assert_eq!(
            bg.slice(0, 9, 1).unwrap(),
            BedGraph::new(vec![0], vec![0.0], 9).unwrap()
        );
        assert_eq!(
            bg.slice(1, 9, 1).unwrap(),
            BedGraph::new(vec![0], vec![0.0], 8).unwrap()
        );
        assert_eq!(
            bg.slice(15, 42, 1).unwrap(),
            BedGraph::new(vec![0, 10, 25], vec![2.0, 3.0, 4.0], 27).unwrap()
        );
        assert_eq!(
            bg.slice(16, 41, 1).unwrap(),
            BedGraph::new(vec![0, 9, 24], vec![2.0, 3.0, 4.0], 25).unwrap()
        );
    }

    #[test]
    fn test_slice_bounds() {
        let bg = fixture();
        assert!(bg.slice(-1, 10, 1).is_err());
        assert!(bg.slice(0, 51, 1).is_err());
        assert!(bg.slice(10, 10, 1).is_err());
        assert!(bg.slice(0, 10, 2).is_err());
    }

    #[test]
    fn test_reverse() {
        assert_eq!(
            fixture().reverse().unwrap(),
            BedGraph::new(
                vec![0, 10, 25, 35, 40],
                vec![4.0, 3.0, 2.0, 1.0, 0.0],
                50
            )
            .unwrap()
        );
    }

    #[test]
    fn test_reverse_roundtrip() {
        let bg = fixture();
        assert_eq!(bg.reverse().unwrap().reverse().unwrap(), bg);
    }

    #[test]
    fn test_negative_step_slice_is_slice_then_reverse() {
        let bg = fixture();
        let direct = bg.slice(13, 27, -1).unwrap();
        let composed = bg.slice(13, 27, 1).unwrap().reverse().unwrap();
        assert_eq!(direct, composed);
    }

    #[test]
    fn test_integral() {
        // 10*0 + 5*1 + 10*2 + 15*3 + 10*4 = 110
        assert_eq!(fixture().integral().unwrap(), 110.0);
    }

    #[test]
    fn test_scale_identity_at_native_size() {
        let bg = fixture();
        assert_eq!(bg.scale(50).unwrap(), bg);
    }

    #[test]
    fn test_scale_last_write_wins() {
        let bg = fixture();
        // 50 -> 10: breakpoints map to [0, 2, 3, 5, 8], no collision.
        let scaled = bg.scale(10).unwrap();
        assert_eq!(scaled.indices(), &[0, 2, 3, 5, 8]);
        // 50 -> 5: [0, 1, 1, 2, 4]; the 15 -> 1 entry shadows 10 -> 1.
        let scaled = bg.scale(5).unwrap();
        assert_eq!(scaled.indices(), &[0, 1, 2, 4]);
        assert_eq!(scaled.values(), &[0.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_scale_integral_bounded_drift() {
        let bg = fixture();
        let k = 4;
        let scaled = bg.scale(50 * k).unwrap();
        let drift = (scaled.integral().unwrap() / k as f64 - bg.integral().unwrap()).abs();
        assert!(drift <= bg.num_segments() as f64);
    }

    #[test]
    fn test_extract_regions_fixture() {
        let bg = fixture();
        let regions = Regions::new(
            vec![2, 13, 17],
            vec![12, 27, 36],
            vec![Strand::Forward, Strand::Reverse, Strand::Reverse],
        )
        .unwrap();
        let batch = bg.extract_regions(&regions).unwrap();
        assert_eq!(batch.num_rows(), 3);

        let expected = [
            BedGraph::new(vec![0, 8], vec![0.0, 1.0], 10).unwrap(),
            BedGraph::new(vec![0, 2, 12], vec![3.0, 2.0, 1.0], 14).unwrap(),
            BedGraph::new(vec![0, 11], vec![3.0, 2.0], 19).unwrap(),
        ];
        for (i, want) in expected.iter().enumerate() {
            assert_eq!(&batch.row(i).unwrap().to_owned(), want);
        }
    }

    #[test]
    fn test_extract_full_domain_roundtrip() {
        let bg = fixture();
        let full = Regions::forward(vec![0], vec![50]).unwrap();
        let batch = bg.extract_regions(&full).unwrap();
        assert_eq!(batch.row(0).unwrap().to_owned(), bg);
    }

    #[test]
    fn test_extract_strand_symmetry() {
        let bg = fixture();
        let fwd = Regions::forward(vec![13], vec![27]).unwrap();
        let rev = Regions::new(vec![13], vec![27], vec![Strand::Reverse]).unwrap();
        let fwd_row = bg.extract_regions(&fwd).unwrap().row(0).unwrap().reverse().unwrap();
        let rev_row = bg.extract_regions(&rev).unwrap().row(0).unwrap().to_owned();
        assert_eq!(fwd_row, rev_row);
    }

    #[test]
    fn test_extract_out_of_domain() {
        let bg = fixture();
        let regions = Regions::forward(vec![40], vec![60]).unwrap();
        assert!(bg.extract_regions(&regions).is_err());
    }

    #[test]
    fn test_threshold() {
        let bg = fixture();
        let over = bg.threshold(2.0).unwrap();
        // Value >= 2 from breakpoint 15 onwards; closed at the domain end.
        assert_eq!(over.starts(), &[15]);
        assert_eq!(over.ends(), &[50]);

        let bg = BedGraph::new(vec![0, 5, 10], vec![3.0, 0.0, 3.0], 20).unwrap();
        let over = bg.threshold(1.0).unwrap();
        assert_eq!(over.starts(), &[0, 10]);
        assert_eq!(over.ends(), &[5, 20]);
    }

    #[test]
    fn test_concatenate() {
        let bg = fixture();
        let combined = BedGraph::concatenate(&[bg.clone(), bg]).unwrap();
        let want = BedGraph::new(
            vec![0, 10, 15, 25, 40, 50, 60, 65, 75, 90],
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 0.0, 1.0, 2.0, 3.0, 4.0],
            100,
        )
        .unwrap();
        assert_eq!(combined, want);
    }

    #[test]
    fn test_update_dense_diffs_prefix_sum_reconstructs() {
        let bg = fixture();
        let mut diffs = Array1::<f64>::zeros(50);
        bg.update_dense_diffs(diffs.view_mut()).unwrap();
        let mut running = 0.0;
        for x in 0..50 {
            running += diffs[x];
            assert_eq!(running, bg.value_at(x as i64));
        }
    }

    #[test]
    fn test_update_dense_diffs_buffer_too_small() {
        let bg = fixture();
        let mut diffs = Array1::<f64>::zeros(30);
        assert!(bg.update_dense_diffs(diffs.view_mut()).is_err());
    }

    #[test]
    fn test_open_ended_requires_finalize() {
        let bg = BedGraph::open_ended(vec![0, 10], vec![1.0, 0.0]).unwrap();
        assert!(bg.integral().is_err());
        let bg = bg.finalize(20).unwrap();
        assert_eq!(bg.integral().unwrap(), 10.0);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(BedGraph::new(vec![], vec![], 10).is_err());
        assert!(BedGraph::new(vec![1, 5], vec![0.0, 1.0], 10).is_err());
        assert!(BedGraph::new(vec![0, 5, 5], vec![0.0, 1.0, 2.0], 10).is_err());
        assert!(BedGraph::new(vec![0, 10], vec![0.0, 1.0], 10).is_err());
        assert!(BedGraph::new(vec![0, 5], vec![0.0], 10).is_err());
    }
}
