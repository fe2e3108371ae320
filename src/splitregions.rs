//! Multi-part (spliced) features: exon groups and gene models.
//!
//! A [`SplitRegions`] groups exon-level intervals into transcripts via an
//! offset table, with exons ordered 5' to 3' in transcript orientation
//! (the first exon of each group is the 5'-most one). Extracting a signal
//! over a spliced feature concatenates the per-exon rows into one
//! transcript-length row.

use crate::bedgraph::BedGraph;
use crate::bedgraph_array::BedGraphArray;
use crate::error::{Result, TrackError};
use crate::regions::Regions;

/// Exon intervals grouped into multi-exon features.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitRegions {
    regions: Regions,
    offsets: Vec<usize>,
}

impl SplitRegions {
    /// Group `regions` rows into features. `offsets` must increase
    /// strictly from 0 to the number of exon rows. Exon ordering within
    /// each group must follow the feature's strand; that ordering is the
    /// producer's responsibility and is not validated here.
    pub fn new(regions: Regions, offsets: Vec<usize>) -> Result<Self> {
        if offsets.first() != Some(&0)
            || offsets.last() != Some(&regions.len())
            || offsets.windows(2).any(|w| w[1] <= w[0])
        {
            return Err(TrackError::invariant(
                "feature offsets must increase strictly from 0 to the exon count",
            ));
        }
        Ok(Self { regions, offsets })
    }

    #[inline]
    pub fn num_features(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    pub fn regions(&self) -> &Regions {
        &self.regions
    }

    #[inline]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Spliced (exon-sum) length of each feature.
    pub fn sizes(&self) -> Vec<i64> {
        let exon_sizes = self.regions.sizes();
        (0..self.num_features())
            .map(|g| exon_sizes[self.offsets[g]..self.offsets[g + 1]].iter().sum())
            .collect()
    }

    /// Genomic start of the first (5'-most) exon of each feature.
    pub fn starts(&self) -> Vec<i64> {
        self.offsets[..self.offsets.len() - 1]
            .iter()
            .map(|&o| self.regions.starts()[o])
            .collect()
    }

    /// Genomic end of the first (5'-most) exon of each feature.
    pub fn ends(&self) -> Vec<i64> {
        self.offsets[..self.offsets.len() - 1]
            .iter()
            .map(|&o| self.regions.ends()[o])
            .collect()
    }

    /// Extract the signal over every exon and stitch each feature's
    /// exon rows into one transcript-length row.
    pub fn extract_signals(&self, signal: &BedGraph) -> Result<BedGraphArray> {
        signal
            .extract_regions(&self.regions)?
            .join_rows(&self.offsets)
    }
}

/// Gene models: spliced transcripts annotated with a coding sub-range in
/// transcript-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Genes {
    split: SplitRegions,
    coding: Regions,
}

impl Genes {
    /// `coding` holds one `[cds_start, cds_end)` row per feature, in
    /// transcript-local coordinates; each must sit inside its
    /// transcript's spliced length.
    pub fn new(split: SplitRegions, coding: Regions) -> Result<Self> {
        if coding.len() != split.num_features() {
            return Err(TrackError::invariant(format!(
                "{} coding rows for {} features",
                coding.len(),
                split.num_features()
            )));
        }
        let sizes = split.sizes();
        for (g, (&cds_end, &size)) in coding.ends().iter().zip(&sizes).enumerate() {
            if cds_end > size {
                return Err(TrackError::invariant(format!(
                    "coding end {} outside transcript {} of length {}",
                    cds_end, g, size
                )));
            }
        }
        Ok(Self { split, coding })
    }

    #[inline]
    pub fn split(&self) -> &SplitRegions {
        &self.split
    }

    #[inline]
    pub fn num_features(&self) -> usize {
        self.split.num_features()
    }

    /// Coding sub-ranges in transcript-local coordinates, one forward
    /// interval per transcript. Suitable for carving CDS rows out of
    /// joined transcript signals with [`BedGraphArray::extract_regions`].
    #[inline]
    pub fn coding(&self) -> &Regions {
        &self.coding
    }

    pub fn sizes(&self) -> Vec<i64> {
        self.split.sizes()
    }

    /// Extract one transcript-length signal row per gene.
    pub fn extract_signals(&self, signal: &BedGraph) -> Result<BedGraphArray> {
        self.split.extract_signals(signal)
    }

    /// Per-transcript `[0, cds_start, cds_end, length]` boundaries for
    /// [`BedGraphArray::piecewise_scale`]. Only meaningful for genes
    /// with non-empty UTRs on both sides (the RefSeq reader filters to
    /// those); piecewise scaling rejects degenerate cuts.
    pub fn cuts(&self) -> Vec<Vec<i64>> {
        let sizes = self.split.sizes();
        (0..self.num_features())
            .map(|g| {
                vec![
                    0,
                    self.coding.starts()[g],
                    self.coding.ends()[g],
                    sizes[g],
                ]
            })
            .collect()
    }
}
