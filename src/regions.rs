//! Interval collections addressing compressed coverage tracks.
//!
//! A [`Regions`] is an immutable set of half-open genomic intervals stored
//! as parallel coordinate arrays, each interval carrying a [`Strand`].
//! Transformations never mutate in place; they return new collections.

use std::fmt;

use crate::error::{Result, TrackError};

/// Interval orientation. Decides which physical end of an interval is
/// logical position 0 when a signal is extracted over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    /// Map a BED strand column character. `'+'` is forward, anything
    /// else (including `'.'`) is treated as reverse, matching the
    /// upstream convention this tool replaces.
    #[inline]
    pub fn from_char(c: char) -> Self {
        if c == '+' {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }

    #[inline]
    pub fn is_forward(self) -> bool {
        matches!(self, Strand::Forward)
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// A single interval row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: i64,
    pub end: i64,
    pub direction: Strand,
}

impl Region {
    #[inline]
    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// An immutable collection of stranded intervals in parallel arrays.
///
/// Invariants, checked at construction: all three arrays share a length,
/// `starts[i] >= 0` and `ends[i] > starts[i]` for every row. Operations
/// that binary-search downstream additionally require `starts` sorted
/// ascending; [`Regions::concatenate`] and [`Regions::expand`] restore
/// that ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Regions {
    starts: Vec<i64>,
    ends: Vec<i64>,
    directions: Vec<Strand>,
}

impl Regions {
    /// Build a collection from parallel arrays, validating the row
    /// invariants.
    pub fn new(starts: Vec<i64>, ends: Vec<i64>, directions: Vec<Strand>) -> Result<Self> {
        if starts.len() != ends.len() || starts.len() != directions.len() {
            return Err(TrackError::invariant(format!(
                "mismatched region arrays: {} starts, {} ends, {} directions",
                starts.len(),
                ends.len(),
                directions.len()
            )));
        }
        for (i, (&s, &e)) in starts.iter().zip(&ends).enumerate() {
            if s < 0 {
                return Err(TrackError::invariant(format!(
                    "negative start {} at row {}",
                    s, i
                )));
            }
            if e <= s {
                return Err(TrackError::invariant(format!(
                    "empty or inverted interval [{}, {}) at row {}",
                    s, e, i
                )));
            }
        }
        Ok(Self {
            starts,
            ends,
            directions,
        })
    }

    /// Build an all-forward collection. The direction array is fully
    /// materialized; there is no implicit broadcast default.
    pub fn forward(starts: Vec<i64>, ends: Vec<i64>) -> Result<Self> {
        let directions = vec![Strand::Forward; starts.len()];
        Self::new(starts, ends, directions)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    #[inline]
    pub fn starts(&self) -> &[i64] {
        &self.starts
    }

    #[inline]
    pub fn ends(&self) -> &[i64] {
        &self.ends
    }

    #[inline]
    pub fn directions(&self) -> &[Strand] {
        &self.directions
    }

    /// Interval widths, `ends[i] - starts[i]`.
    pub fn sizes(&self) -> Vec<i64> {
        self.starts
            .iter()
            .zip(&self.ends)
            .map(|(&s, &e)| e - s)
            .collect()
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<Region> {
        Some(Region {
            start: *self.starts.get(i)?,
            end: *self.ends.get(i)?,
            direction: *self.directions.get(i)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Region> + '_ {
        (0..self.len()).map(|i| Region {
            start: self.starts[i],
            end: self.ends[i],
            direction: self.directions[i],
        })
    }

    /// Whether `starts` is sorted ascending.
    pub fn is_sorted(&self) -> bool {
        self.starts.windows(2).all(|w| w[0] <= w[1])
    }

    /// Merge several collections, re-sorting the union by start with a
    /// stable sort so downstream binary searches stay valid.
    pub fn concatenate(collections: &[Regions]) -> Result<Regions> {
        let total: usize = collections.iter().map(|r| r.len()).sum();
        let mut rows = Vec::with_capacity(total);
        for regions in collections {
            rows.extend(regions.iter());
        }
        rows.sort_by_key(|r| r.start);
        Self::from_rows(rows)
    }

    /// Fixed-width windows around each interval's strand-aware anchor:
    /// the start on forward rows, `end - 1` on reverse rows. The window
    /// covers `upstream` positions before the anchor and `downstream`
    /// after, in transcript orientation, and the result is re-sorted by
    /// start. Fails if any window would leave the genome (negative
    /// start).
    pub fn expand(&self, upstream: i64, downstream: i64) -> Result<Regions> {
        let mut rows = Vec::with_capacity(self.len());
        for region in self.iter() {
            let (anchor, before, after) = match region.direction {
                Strand::Forward => (region.start, upstream, downstream),
                Strand::Reverse => (region.end - 1, downstream, upstream),
            };
            rows.push(Region {
                start: anchor - before,
                end: anchor + after,
                direction: region.direction,
            });
        }
        rows.sort_by_key(|r| r.start);
        Self::from_rows(rows)
    }

    /// Complementary gaps between consecutive intervals.
    ///
    /// Precondition (documented, not checked): the collection is sorted
    /// and non-overlapping. Zero-width gaps between adjacent intervals
    /// are skipped.
    pub fn holes(&self) -> Result<Regions> {
        let mut starts = Vec::new();
        let mut ends = Vec::new();
        for w in 0..self.len().saturating_sub(1) {
            let gap_start = self.ends[w];
            let gap_end = self.starts[w + 1];
            if gap_end > gap_start {
                starts.push(gap_start);
                ends.push(gap_end);
            }
        }
        Regions::forward(starts, ends)
    }

    fn from_rows(rows: Vec<Region>) -> Result<Regions> {
        let mut starts = Vec::with_capacity(rows.len());
        let mut ends = Vec::with_capacity(rows.len());
        let mut directions = Vec::with_capacity(rows.len());
        for row in rows {
            starts.push(row.start);
            ends.push(row.end);
            directions.push(row.direction);
        }
        Regions::new(starts, ends, directions)
    }
}
