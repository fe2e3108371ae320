//! Batched step-function signals packed into shared flat arrays.
//!
//! A [`BedGraphArray`] holds many logical signal rows in one breakpoint
//! array, one value array, per-row sizes and an offset table: row `r`
//! occupies `indices[offsets[r]..offsets[r+1]]` in its own local
//! coordinates (first breakpoint always 0). Bulk transforms walk the flat
//! arrays once instead of touching rows individually.

use ndarray::ArrayViewMut2;

use crate::bedgraph::{lower_bound, upper_bound, BedGraph, Track};
use crate::collapse::{cumsum_by_key, last_write_mask, sum_by_key};
use crate::error::{Result, TrackError};
use crate::regions::{Regions, Strand};

/// Many compressed signals in shared flat arrays with row offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct BedGraphArray {
    indices: Vec<i64>,
    values: Vec<f64>,
    sizes: Vec<i64>,
    offsets: Vec<usize>,
}

/// Non-owning view of one batch row. Shares the [`Track`] capability
/// with [`BedGraph`], so query code is written once for both.
#[derive(Debug, Clone, Copy)]
pub struct BedGraphRow<'a> {
    indices: &'a [i64],
    values: &'a [f64],
    size: i64,
}

impl Track for BedGraphRow<'_> {
    #[inline]
    fn indices(&self) -> &[i64] {
        self.indices
    }

    #[inline]
    fn values(&self) -> &[f64] {
        self.values
    }

    #[inline]
    fn size(&self) -> Option<i64> {
        Some(self.size)
    }
}

impl BedGraphRow<'_> {
    /// Copy the row out as an owned signal.
    pub fn to_owned(&self) -> BedGraph {
        BedGraph::from_validated(self.indices.to_vec(), self.values.to_vec(), self.size)
    }
}

impl BedGraphArray {
    /// Build a batch from flat arrays, validating the packing
    /// invariants: monotonically increasing offsets spanning the whole
    /// breakpoint array, a positive size and a leading local breakpoint
    /// 0 for every row, and all breakpoints inside their row's domain.
    pub fn new(
        indices: Vec<i64>,
        values: Vec<f64>,
        sizes: Vec<i64>,
        offsets: Vec<usize>,
    ) -> Result<Self> {
        if offsets.is_empty() || offsets[0] != 0 {
            return Err(TrackError::invariant("offsets must start at 0"));
        }
        if offsets[offsets.len() - 1] != indices.len() {
            return Err(TrackError::invariant(format!(
                "offsets end at {} but there are {} breakpoints",
                offsets[offsets.len() - 1],
                indices.len()
            )));
        }
        if indices.len() != values.len() {
            return Err(TrackError::invariant(format!(
                "mismatched batch arrays: {} breakpoints, {} values",
                indices.len(),
                values.len()
            )));
        }
        if sizes.len() + 1 != offsets.len() {
            return Err(TrackError::invariant(format!(
                "{} sizes for {} rows",
                sizes.len(),
                offsets.len() - 1
            )));
        }
        for r in 0..sizes.len() {
            let (lo, hi) = (offsets[r], offsets[r + 1]);
            if hi <= lo {
                return Err(TrackError::invariant(format!(
                    "row {} has no breakpoints",
                    r
                )));
            }
            if sizes[r] <= 0 {
                return Err(TrackError::invariant(format!(
                    "row {} has non-positive size {}",
                    r, sizes[r]
                )));
            }
            if indices[lo] != 0 {
                return Err(TrackError::invariant(format!(
                    "row {} must start at local breakpoint 0, got {}",
                    r, indices[lo]
                )));
            }
            for k in lo..hi {
                if indices[k] < 0 || indices[k] >= sizes[r] {
                    return Err(TrackError::invariant(format!(
                        "row {} breakpoint {} outside [0, {})",
                        r, indices[k], sizes[r]
                    )));
                }
                if k > lo && indices[k] <= indices[k - 1] {
                    return Err(TrackError::invariant(format!(
                        "row {} breakpoints not strictly increasing",
                        r
                    )));
                }
            }
        }
        Ok(Self {
            indices,
            values,
            sizes,
            offsets,
        })
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.sizes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    #[inline]
    pub fn sizes(&self) -> &[i64] {
        &self.sizes
    }

    #[inline]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    #[inline]
    pub fn indices(&self) -> &[i64] {
        &self.indices
    }

    /// Borrow row `i` as a signal view.
    pub fn row(&self, i: usize) -> Result<BedGraphRow<'_>> {
        if i >= self.num_rows() {
            return Err(TrackError::domain(format!(
                "row {} out of bounds for batch of {} rows",
                i,
                self.num_rows()
            )));
        }
        let (lo, hi) = (self.offsets[i], self.offsets[i + 1]);
        Ok(BedGraphRow {
            indices: &self.indices[lo..hi],
            values: &self.values[lo..hi],
            size: self.sizes[i],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = BedGraphRow<'_>> {
        (0..self.num_rows()).map(|i| {
            let (lo, hi) = (self.offsets[i], self.offsets[i + 1]);
            BedGraphRow {
                indices: &self.indices[lo..hi],
                values: &self.values[lo..hi],
                size: self.sizes[i],
            }
        })
    }

    /// Rescale every row to the common width `new_size`, each against
    /// its own size. Collided breakpoints collapse last-write-wins per
    /// row and every row's final breakpoint is kept as the row-length
    /// anchor.
    pub fn scale_x(&self, new_size: i64) -> Result<BedGraphArray> {
        if new_size <= 0 {
            return Err(TrackError::domain(format!(
                "scale target must be positive, got {}",
                new_size
            )));
        }
        let mut indices = Vec::with_capacity(self.indices.len());
        let mut values = Vec::with_capacity(self.values.len());
        let mut offsets = Vec::with_capacity(self.offsets.len());
        offsets.push(0);
        let mut mapped_row = Vec::new();
        for r in 0..self.num_rows() {
            let (lo, hi) = (self.offsets[r], self.offsets[r + 1]);
            mapped_row.clear();
            mapped_row.extend(
                self.indices[lo..hi]
                    .iter()
                    .map(|&x| x * new_size / self.sizes[r]),
            );
            let mask = last_write_mask(&mapped_row);
            for k in 0..mapped_row.len() {
                if mask[k] {
                    indices.push(mapped_row[k]);
                    values.push(self.values[lo + k]);
                }
            }
            offsets.push(indices.len());
        }
        let sizes = vec![new_size; self.num_rows()];
        BedGraphArray::new(indices, values, sizes, offsets)
    }

    /// Scatter-add every row's step deltas into row `rows[r]` of a dense
    /// difference matrix. Composite keys `row * ncols + local_index` are
    /// stably sorted and group-summed before the scatter, so duplicate
    /// targets accumulate deterministically.
    pub fn update_dense_diffs(
        &self,
        mut diffs: ArrayViewMut2<f64>,
        rows: &[usize],
    ) -> Result<()> {
        if rows.len() != self.num_rows() {
            return Err(TrackError::invariant(format!(
                "{} target rows for a batch of {} rows",
                rows.len(),
                self.num_rows()
            )));
        }
        let (nrows, ncols) = diffs.dim();
        let mut keys = Vec::with_capacity(self.indices.len());
        let mut deltas = Vec::with_capacity(self.indices.len());
        for r in 0..self.num_rows() {
            if rows[r] >= nrows {
                return Err(TrackError::domain(format!(
                    "target row {} outside dense matrix of {} rows",
                    rows[r], nrows
                )));
            }
            if self.sizes[r] > ncols as i64 {
                return Err(TrackError::domain(format!(
                    "row of width {} outside dense matrix of {} columns",
                    self.sizes[r], ncols
                )));
            }
            let (lo, hi) = (self.offsets[r], self.offsets[r + 1]);
            for k in lo..hi {
                keys.push(rows[r] as i64 * ncols as i64 + self.indices[k]);
                deltas.push(if k == lo {
                    self.values[k]
                } else {
                    self.values[k] - self.values[k - 1]
                });
            }
        }
        let (unique, totals) = sum_by_key(&keys, &deltas);
        for (&key, &total) in unique.iter().zip(&totals) {
            let r = (key / ncols as i64) as usize;
            let c = (key % ncols as i64) as usize;
            diffs[[r, c]] += total;
        }
        Ok(())
    }

    /// Collapse all rows into their elementwise sum as one merged
    /// signal. Rows must share a common size. Breakpoints of all rows
    /// are united by a stable sort; the running cumulative sum of the
    /// per-row deltas at each unique breakpoint is the merged value.
    pub fn sum_rows(&self) -> Result<BedGraph> {
        if self.is_empty() {
            return Err(TrackError::invariant("sum of an empty batch"));
        }
        let size = self.sizes[0];
        if self.sizes.iter().any(|&s| s != size) {
            return Err(TrackError::invariant(
                "sum requires all rows to share one size",
            ));
        }
        let mut deltas = Vec::with_capacity(self.indices.len());
        for r in 0..self.num_rows() {
            let (lo, hi) = (self.offsets[r], self.offsets[r + 1]);
            for k in lo..hi {
                deltas.push(if k == lo {
                    self.values[k]
                } else {
                    self.values[k] - self.values[k - 1]
                });
            }
        }
        let (indices, totals) = cumsum_by_key(&self.indices, &deltas);
        BedGraph::new(indices, totals, size)
    }

    /// Merge contiguous groups of rows into one longer row per group by
    /// concatenating their local domains end-to-end. Used to stitch
    /// exon-level rows into transcript-length rows.
    pub fn join_rows(&self, group_offsets: &[usize]) -> Result<BedGraphArray> {
        if group_offsets.first() != Some(&0)
            || group_offsets.last() != Some(&self.num_rows())
            || group_offsets.windows(2).any(|w| w[1] <= w[0])
        {
            return Err(TrackError::invariant(
                "group offsets must increase strictly from 0 to the row count",
            ));
        }
        let mut indices = Vec::with_capacity(self.indices.len());
        let mut values = Vec::with_capacity(self.values.len());
        let mut sizes = Vec::with_capacity(group_offsets.len() - 1);
        let mut offsets = Vec::with_capacity(group_offsets.len());
        offsets.push(0);
        for g in 0..group_offsets.len() - 1 {
            let mut shift = 0i64;
            for r in group_offsets[g]..group_offsets[g + 1] {
                let (lo, hi) = (self.offsets[r], self.offsets[r + 1]);
                for k in lo..hi {
                    indices.push(self.indices[k] + shift);
                    values.push(self.values[k]);
                }
                shift += self.sizes[r];
            }
            sizes.push(shift);
            offsets.push(indices.len());
        }
        BedGraphArray::new(indices, values, sizes, offsets)
    }

    /// Sub-slice each row by a per-row `[start, end)` bound. Forward
    /// orientation only; carving reverse windows out of batch rows is
    /// rejected rather than approximated.
    pub fn extract_regions(&self, regions: &Regions) -> Result<BedGraphArray> {
        if regions.len() != self.num_rows() {
            return Err(TrackError::invariant(format!(
                "{} query rows for a batch of {} rows",
                regions.len(),
                self.num_rows()
            )));
        }
        let mut indices = Vec::new();
        let mut values = Vec::new();
        let mut sizes = Vec::with_capacity(self.num_rows());
        let mut offsets = Vec::with_capacity(self.num_rows() + 1);
        offsets.push(0);
        for (r, region) in regions.iter().enumerate() {
            if region.direction == Strand::Reverse {
                return Err(TrackError::UnsupportedOrientation(format!(
                    "reverse-strand sub-slice of batch row {}",
                    r
                )));
            }
            if region.end > self.sizes[r] {
                return Err(TrackError::domain(format!(
                    "sub-slice [{}, {}) outside row {} domain [0, {})",
                    region.start, region.end, r, self.sizes[r]
                )));
            }
            let (lo, hi) = (self.offsets[r], self.offsets[r + 1]);
            let row_indices = &self.indices[lo..hi];
            let start_idx = upper_bound(row_indices, region.start);
            let end_idx = lower_bound(row_indices, region.end);
            indices.push(0);
            values.push(self.values[lo + start_idx - 1]);
            for k in start_idx..end_idx {
                indices.push(row_indices[k] - region.start);
                values.push(self.values[lo + k]);
            }
            sizes.push(region.len());
            offsets.push(indices.len());
        }
        BedGraphArray::new(indices, values, sizes, offsets)
    }

    /// Rescale K per-row segments independently onto fixed-width
    /// destination panels. `cuts[r]` gives each row's K+1 source
    /// boundaries (starting at 0, ending at the row size, strictly
    /// increasing); segment k lands on a panel of width `new_sizes[k]`,
    /// so the cut coordinates align on the same output columns across
    /// rows of differing lengths. De-duplication is last-write-wins per
    /// row, as in [`BedGraphArray::scale_x`].
    pub fn piecewise_scale(
        &self,
        cuts: &[Vec<i64>],
        new_sizes: &[i64],
    ) -> Result<BedGraphArray> {
        if cuts.len() != self.num_rows() {
            return Err(TrackError::invariant(format!(
                "{} cut rows for a batch of {} rows",
                cuts.len(),
                self.num_rows()
            )));
        }
        if new_sizes.is_empty() || new_sizes.iter().any(|&s| s <= 0) {
            return Err(TrackError::domain(
                "piecewise scale targets must be positive".to_string(),
            ));
        }
        let total: i64 = new_sizes.iter().sum();
        let mut indices = Vec::new();
        let mut values = Vec::new();
        let mut offsets = Vec::with_capacity(self.num_rows() + 1);
        offsets.push(0);
        let mut mapped_row = Vec::new();
        let mut values_row = Vec::new();
        for r in 0..self.num_rows() {
            let row_cuts = &cuts[r];
            if row_cuts.len() != new_sizes.len() + 1
                || row_cuts[0] != 0
                || row_cuts[row_cuts.len() - 1] != self.sizes[r]
                || row_cuts.windows(2).any(|w| w[1] <= w[0])
            {
                return Err(TrackError::invariant(format!(
                    "row {} cuts must increase strictly from 0 to {}",
                    r, self.sizes[r]
                )));
            }
            let (lo, hi) = (self.offsets[r], self.offsets[r + 1]);
            let row_indices = &self.indices[lo..hi];
            mapped_row.clear();
            values_row.clear();
            let mut dest = 0i64;
            for (seg, &panel) in new_sizes.iter().enumerate() {
                let c0 = row_cuts[seg];
                let c1 = row_cuts[seg + 1];
                let width = c1 - c0;
                let start_idx = upper_bound(row_indices, c0);
                let end_idx = lower_bound(row_indices, c1);
                mapped_row.push(dest);
                values_row.push(self.values[lo + start_idx - 1]);
                for k in start_idx..end_idx {
                    mapped_row.push(dest + (row_indices[k] - c0) * panel / width);
                    values_row.push(self.values[lo + k]);
                }
                dest += panel;
            }
            let mask = last_write_mask(&mapped_row);
            for k in 0..mapped_row.len() {
                if mask[k] {
                    indices.push(mapped_row[k]);
                    values.push(values_row[k]);
                }
            }
            offsets.push(indices.len());
        }
        let sizes = vec![total; self.num_rows()];
        BedGraphArray::new(indices, values, sizes, offsets)
    }

    /// Concatenate batches row-wise, re-basing the offset tables.
    pub fn vstack(batches: &[BedGraphArray]) -> Result<BedGraphArray> {
        if batches.is_empty() {
            return Err(TrackError::invariant("vstack of zero batches"));
        }
        let mut indices = Vec::new();
        let mut values = Vec::new();
        let mut sizes = Vec::new();
        let mut offsets = vec![0];
        for batch in batches {
            let base = indices.len();
            indices.extend_from_slice(&batch.indices);
            values.extend_from_slice(&batch.values);
            sizes.extend_from_slice(&batch.sizes);
            offsets.extend(batch.offsets.iter().skip(1).map(|&o| base + o));
        }
        BedGraphArray::new(indices, values, sizes, offsets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn fixture_signal() -> BedGraph {
        BedGraph::new(
            vec![0, 10, 15, 25, 40],
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            50,
        )
        .unwrap()
    }

    fn fixture_batch() -> BedGraphArray {
        // Rows: ([0,8], [0,1], size 10), ([0,2,12], [3,2,1], size 14),
        //       ([0,11], [3,2], size 19)
        let regions = Regions::new(
            vec![2, 13, 17],
            vec![12, 27, 36],
            vec![Strand::Forward, Strand::Reverse, Strand::Reverse],
        )
        .unwrap();
        fixture_signal().extract_regions(&regions).unwrap()
    }

    fn equal_width_batch() -> BedGraphArray {
        BedGraphArray::new(
            vec![0, 4, 0, 2, 8, 0],
            vec![1.0, 2.0, 0.0, 3.0, 1.0, 5.0],
            vec![10, 10, 10],
            vec![0, 2, 5, 6],
        )
        .unwrap()
    }

    #[test]
    fn test_offset_consistency_invariants() {
        let batch = fixture_batch();
        assert_eq!(*batch.offsets().last().unwrap(), batch.indices().len());
        assert!(batch.offsets().windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_rejects_bad_offsets() {
        assert!(BedGraphArray::new(vec![0, 5], vec![1.0, 2.0], vec![10], vec![0, 1]).is_err());
        assert!(BedGraphArray::new(vec![0, 5], vec![1.0, 2.0], vec![10, 10], vec![0, 2]).is_err());
        // Row not starting at local 0.
        assert!(BedGraphArray::new(vec![0, 5, 3], vec![1.0, 2.0, 3.0], vec![10, 10], vec![0, 2, 3]).is_err());
        // Breakpoint outside the row's domain.
        assert!(BedGraphArray::new(vec![0, 12], vec![1.0, 2.0], vec![10], vec![0, 2]).is_err());
    }

    #[test]
    fn test_row_view() {
        let batch = fixture_batch();
        let row = batch.row(1).unwrap();
        assert_eq!(row.indices(), &[0, 2, 12]);
        assert_eq!(row.value_at(1), 3.0);
        assert_eq!(row.value_at(2), 2.0);
        assert_eq!(row.integral().unwrap(), 3.0 * 2.0 + 2.0 * 10.0 + 1.0 * 2.0);
        assert!(batch.row(3).is_err());
    }

    #[test]
    fn test_scale_x_common_width() {
        let batch = fixture_batch();
        let scaled = batch.scale_x(10).unwrap();
        assert_eq!(scaled.sizes(), &[10, 10, 10]);
        // Row 0 (size 10) is untouched at native width.
        assert_eq!(scaled.row(0).unwrap().indices(), &[0, 8]);
        // Row 1: [0, 2, 12] * 10 / 14 -> [0, 1, 8].
        assert_eq!(scaled.row(1).unwrap().indices(), &[0, 1, 8]);
        assert_eq!(scaled.row(1).unwrap().values(), &[3.0, 2.0, 1.0]);
        // Row 2: [0, 11] * 10 / 19 -> [0, 5].
        assert_eq!(scaled.row(2).unwrap().indices(), &[0, 5]);
    }

    #[test]
    fn test_scale_x_keeps_row_anchor() {
        // Both breakpoints of row 1 collapse to column 0; the final one
        // must survive with its value.
        let batch = BedGraphArray::new(
            vec![0, 0, 1],
            vec![7.0, 1.0, 9.0],
            vec![10, 100],
            vec![0, 1, 3],
        )
        .unwrap();
        let scaled = batch.scale_x(10).unwrap();
        assert_eq!(scaled.row(1).unwrap().indices(), &[0]);
        assert_eq!(scaled.row(1).unwrap().values(), &[9.0]);
    }

    #[test]
    fn test_sum_rows() {
        let batch = equal_width_batch();
        let merged = batch.sum_rows().unwrap();
        // Row values at x: r0 = 1 until 4 then 2; r1 = 0,3 from 2,1 from 8;
        // r2 = 5 everywhere.
        for x in 0..10 {
            let want: f64 = batch.rows().map(|row| row.value_at(x)).sum();
            assert_eq!(merged.value_at(x), want, "at {}", x);
        }
    }

    #[test]
    fn test_sum_rows_requires_equal_sizes() {
        assert!(fixture_batch().sum_rows().is_err());
    }

    #[test]
    fn test_join_rows() {
        let batch = fixture_batch();
        let joined = batch.join_rows(&[0, 2, 3]).unwrap();
        assert_eq!(joined.num_rows(), 2);
        assert_eq!(joined.sizes(), &[24, 19]);
        // Row 0 = row 0 (size 10) ++ row 1 shifted by 10.
        assert_eq!(joined.row(0).unwrap().indices(), &[0, 8, 10, 12, 22]);
        assert_eq!(
            joined.row(0).unwrap().values(),
            &[0.0, 1.0, 3.0, 2.0, 1.0]
        );
        assert_eq!(joined.row(1).unwrap().indices(), &[0, 11]);
    }

    #[test]
    fn test_join_rows_bad_groups() {
        let batch = fixture_batch();
        assert!(batch.join_rows(&[0, 2]).is_err());
        assert!(batch.join_rows(&[1, 3]).is_err());
        assert!(batch.join_rows(&[0, 2, 2, 3]).is_err());
    }

    #[test]
    fn test_batch_extract_forward_only() {
        let batch = fixture_batch();
        let bounds = Regions::forward(vec![2, 0, 5], vec![8, 12, 19]).unwrap();
        let carved = batch.extract_regions(&bounds).unwrap();
        assert_eq!(carved.sizes(), &[6, 12, 14]);
        // Row 1 carved to [0, 12): same breakpoints, truncated domain.
        assert_eq!(carved.row(1).unwrap().indices(), &[0, 2]);
        assert_eq!(carved.row(1).unwrap().values(), &[3.0, 2.0]);
        // Row 0 carved mid-segment: value at 2 becomes breakpoint 0.
        assert_eq!(carved.row(0).unwrap().indices(), &[0]);
        assert_eq!(carved.row(0).unwrap().values(), &[0.0]);

        let reverse = Regions::new(
            vec![2, 0, 5],
            vec![8, 12, 19],
            vec![Strand::Forward, Strand::Reverse, Strand::Forward],
        )
        .unwrap();
        assert!(matches!(
            batch.extract_regions(&reverse),
            Err(TrackError::UnsupportedOrientation(_))
        ));
    }

    #[test]
    fn test_batch_extract_out_of_row_domain() {
        let batch = fixture_batch();
        let bounds = Regions::forward(vec![0, 0, 0], vec![11, 12, 19]).unwrap();
        assert!(batch.extract_regions(&bounds).is_err());
    }

    #[test]
    fn test_piecewise_scale_aligns_cuts() {
        let batch = BedGraphArray::new(
            vec![0, 2, 12],
            vec![3.0, 2.0, 1.0],
            vec![14],
            vec![0, 3],
        )
        .unwrap();
        let scaled = batch
            .piecewise_scale(&[vec![0, 2, 12, 14]], &[4, 10, 4])
            .unwrap();
        assert_eq!(scaled.sizes(), &[18]);
        // Cut coordinates land exactly on panel boundaries 0, 4, 14.
        assert_eq!(scaled.row(0).unwrap().indices(), &[0, 4, 14]);
        assert_eq!(scaled.row(0).unwrap().values(), &[3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_piecewise_scale_bad_cuts() {
        let batch = equal_width_batch();
        // Wrong number of cut rows.
        assert!(batch.piecewise_scale(&[vec![0, 5, 10]], &[4, 4]).is_err());
        let cuts = vec![vec![0, 5, 10], vec![0, 5, 10], vec![0, 5, 9]];
        // Last row's cuts do not end at the row size.
        assert!(batch.piecewise_scale(&cuts, &[4, 4]).is_err());
    }

    #[test]
    fn test_vstack_rebases_offsets() {
        let a = equal_width_batch();
        let b = fixture_batch();
        let stacked = BedGraphArray::vstack(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(stacked.num_rows(), a.num_rows() + b.num_rows());
        assert_eq!(
            *stacked.offsets().last().unwrap(),
            stacked.indices().len()
        );
        assert_eq!(stacked.row(3).unwrap().indices(), b.row(0).unwrap().indices());
    }

    #[test]
    fn test_update_dense_diffs_scatter() {
        let batch = equal_width_batch();
        let mut diffs = Array2::<f64>::zeros((2, 10));
        // Rows 0 and 2 share dense row 0.
        batch.update_dense_diffs(diffs.view_mut(), &[0, 1, 0]).unwrap();
        // Prefix-sum each dense row and compare with value_at sums.
        for r in 0..2 {
            let mut running = 0.0;
            for x in 0..10 {
                running += diffs[[r, x]];
                let want: f64 = batch
                    .rows()
                    .zip([0usize, 1, 0])
                    .filter(|(_, target)| *target == r)
                    .map(|(row, _)| row.value_at(x as i64))
                    .sum();
                assert_eq!(running, want, "dense row {} col {}", r, x);
            }
        }
    }

    #[test]
    fn test_update_dense_diffs_validation() {
        let batch = equal_width_batch();
        let mut diffs = Array2::<f64>::zeros((2, 10));
        assert!(batch.update_dense_diffs(diffs.view_mut(), &[0, 1]).is_err());
        assert!(batch
            .update_dense_diffs(diffs.view_mut(), &[0, 1, 2])
            .is_err());
        let mut narrow = Array2::<f64>::zeros((3, 5));
        assert!(batch
            .update_dense_diffs(narrow.view_mut(), &[0, 1, 2])
            .is_err());
    }
}
