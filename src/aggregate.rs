//! Aggregation commands: meta-profiles and heat matrices over many
//! genomic windows.
//!
//! Each command consumes per-chromosome signals plus a region (or gene)
//! map and produces a finished table. Accumulation stays in compressed
//! difference space: every window contributes O(breakpoints) work and
//! the dense prefix sum happens once, at finalization. Chromosomes are
//! processed in parallel with one accumulator per worker.

use std::io::Write;

use ndarray::{Array1, Array2};
use rustc_hash::FxHashMap;

use crate::bedgraph::{BedGraph, Track};
use crate::collapse::argsort_stable;
use crate::error::{Result, TrackError};
use crate::io::TrackWriter;
use crate::parallel::par_accumulate;
use crate::regions::{Region, Regions, Strand};
use crate::splitregions::{Genes, SplitRegions};

const DEFAULT_FIGURE_WIDTH: usize = 2000;

/// A 1-D profile: x positions and the averaged signal at each.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileTable {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl ProfileTable {
    pub fn write_tsv<W: Write>(&self, writer: W) -> Result<()> {
        let mut w = TrackWriter::new(writer);
        w.write_bytes(b"x\ty\n")?;
        for (&x, &y) in self.x.iter().zip(&self.y) {
            w.write_float(x)?;
            w.write_tab()?;
            w.write_float(y)?;
            w.write_newline()?;
        }
        w.flush()
    }
}

/// A 2-D profile: per-row y labels, per-column x positions, dense values.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixTable {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub values: Array2<f64>,
}

impl MatrixTable {
    pub fn write_tsv<W: Write>(&self, writer: W) -> Result<()> {
        let mut w = TrackWriter::new(writer);
        w.write_bytes(b"y")?;
        for &x in &self.x {
            w.write_tab()?;
            w.write_float(x)?;
        }
        w.write_newline()?;
        for (r, row) in self.values.outer_iter().enumerate() {
            w.write_float(self.y[r])?;
            for &v in row.iter() {
                w.write_tab()?;
                w.write_float(v)?;
            }
            w.write_newline()?;
        }
        w.flush()
    }
}

fn domain_size(signal: &BedGraph) -> Result<i64> {
    signal
        .size()
        .ok_or_else(|| TrackError::invariant("aggregation requires finalized signals"))
}

/// `x[i] = i * region_size / width - region_size / 2`, the genomic
/// offset of each output column from the window center.
fn genomic_x_axis(width: usize, region_size: i64) -> Vec<f64> {
    (0..width)
        .map(|i| (i as i64 * region_size / width as i64 - region_size / 2) as f64)
        .collect()
}

/// Fixed windows around each interval's strand 5' anchor, keeping only
/// rows whose window stays inside `[0, size)`.
fn anchor_windows(regions: &Regions, half: i64, size: i64) -> Result<Regions> {
    let mut starts = Vec::new();
    let mut ends = Vec::new();
    let mut directions = Vec::new();
    for region in regions.iter() {
        let anchor = match region.direction {
            Strand::Forward => region.start,
            Strand::Reverse => region.end - 1,
        };
        if anchor - half >= 0 && anchor + half <= size {
            starts.push(region.start);
            ends.push(region.end);
            directions.push(region.direction);
        }
    }
    Regions::new(starts, ends, directions)?.expand(half, half)
}

/// Fixed windows around each interval's midpoint, keeping only rows
/// whose window stays inside `[0, size)`. Returns the surviving source
/// row indices alongside, so per-row metadata can be filtered in step.
fn midpoint_windows(
    regions: &Regions,
    half: i64,
    size: i64,
) -> Result<(Regions, Vec<usize>)> {
    let mut rows = Vec::new();
    let mut kept = Vec::new();
    for (i, region) in regions.iter().enumerate() {
        let mid = (region.start + region.end) / 2;
        if mid - half >= 0 && mid + half <= size {
            rows.push(Region {
                start: mid - half,
                end: mid + half,
                direction: region.direction,
            });
            kept.push(i);
        }
    }
    let mut starts = Vec::with_capacity(rows.len());
    let mut ends = Vec::with_capacity(rows.len());
    let mut directions = Vec::with_capacity(rows.len());
    for row in rows {
        starts.push(row.start);
        ends.push(row.end);
        directions.push(row.direction);
    }
    Ok((Regions::new(starts, ends, directions)?, kept))
}

/// Ascending size rank of each element, ties broken by position.
fn size_ranks(sizes: &[i64]) -> Vec<usize> {
    let order = argsort_stable(sizes);
    let mut ranks = vec![0; sizes.len()];
    for (rank, &i) in order.iter().enumerate() {
        ranks[i] = rank;
    }
    ranks
}

struct LineAccum {
    diffs: Array1<f64>,
    count: u64,
    coverage: f64,
}

impl LineAccum {
    fn new(width: usize) -> Self {
        Self {
            diffs: Array1::zeros(width),
            count: 0,
            coverage: 0.0,
        }
    }

    fn merge(mut self, other: LineAccum) -> Result<LineAccum> {
        self.diffs += &other.diffs;
        self.count += other.count;
        self.coverage += other.coverage;
        Ok(self)
    }
}

/// Extract, rescale to the common figure width, and fold every window's
/// step deltas into the shared 1-D difference buffer.
fn accumulate_line(
    signal: &BedGraph,
    windows: &Regions,
    width: usize,
    acc: &mut LineAccum,
) -> Result<()> {
    let batch = signal.extract_regions(windows)?.scale_x(width as i64)?;
    batch.sum_rows()?.update_dense_diffs(acc.diffs.view_mut())?;
    acc.count += windows.len() as u64;
    Ok(())
}

fn finalize_line(acc: LineAccum, normalize: bool, x: Vec<f64>) -> Result<ProfileTable> {
    let denom = acc.count.max(1) as f64;
    let mut y = Vec::with_capacity(acc.diffs.len());
    let mut running = 0.0;
    for &d in acc.diffs.iter() {
        running += d;
        y.push(running / denom);
    }
    if normalize {
        let per_million = per_million_factor(acc.coverage)?;
        for v in &mut y {
            *v /= per_million;
        }
    }
    Ok(ProfileTable { x, y })
}

fn per_million_factor(coverage: f64) -> Result<f64> {
    if coverage <= 0.0 {
        return Err(TrackError::invariant(
            "cannot normalize by zero total coverage",
        ));
    }
    Ok(coverage / 1_000_000.0)
}

struct MatrixAccum {
    diffs: Array2<f64>,
    counts: Vec<u64>,
    coverage: f64,
}

impl MatrixAccum {
    fn new(nrows: usize, width: usize) -> Self {
        Self {
            diffs: Array2::zeros((nrows, width)),
            counts: vec![0; nrows],
            coverage: 0.0,
        }
    }

    fn merge(mut self, other: MatrixAccum) -> Result<MatrixAccum> {
        self.diffs += &other.diffs;
        for (c, o) in self.counts.iter_mut().zip(&other.counts) {
            *c += o;
        }
        self.coverage += other.coverage;
        Ok(self)
    }
}

/// Prefix-sum each difference row and divide by its window count.
fn prefix_sum_rows(diffs: &Array2<f64>, counts: &[u64]) -> Array2<f64> {
    let mut values = diffs.clone();
    for (r, mut row) in values.outer_iter_mut().enumerate() {
        let denom = counts[r].max(1) as f64;
        let mut running = 0.0;
        for v in row.iter_mut() {
            running += *v;
            *v = running / denom;
        }
    }
    values
}

/// Average signal in a fixed window around each interval's strand 5'
/// anchor (for single-base inputs, the TSS).
#[derive(Debug, Clone)]
pub struct TssProfile {
    pub figure_width: usize,
    pub region_size: i64,
    pub normalize: bool,
}

impl Default for TssProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl TssProfile {
    pub fn new() -> Self {
        Self {
            figure_width: DEFAULT_FIGURE_WIDTH,
            region_size: 2000,
            normalize: true,
        }
    }

    pub fn run(
        &self,
        tracks: &[(String, BedGraph)],
        regions: &FxHashMap<String, Regions>,
    ) -> Result<ProfileTable> {
        let width = self.figure_width;
        let half = self.region_size / 2;
        let acc = par_accumulate(
            tracks,
            || LineAccum::new(width),
            |chrom, signal| {
                let mut acc = LineAccum::new(width);
                acc.coverage = signal.integral()?;
                if let Some(chrom_regions) = regions.get(chrom) {
                    let size = domain_size(signal)?;
                    let windows = anchor_windows(chrom_regions, half, size)?;
                    if !windows.is_empty() {
                        accumulate_line(signal, &windows, width, &mut acc)?;
                    }
                }
                Ok(acc)
            },
            LineAccum::merge,
        )?;
        finalize_line(acc, self.normalize, genomic_x_axis(width, self.region_size))
    }
}

/// Average signal over whole intervals padded by half their own length,
/// each rescaled to a common width. The x axis runs from -2 to 2 in
/// units of interval halves: the interval proper spans [-1, 1].
#[derive(Debug, Clone)]
pub struct AverageProfile {
    pub figure_width: usize,
    pub normalize: bool,
}

impl Default for AverageProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl AverageProfile {
    pub fn new() -> Self {
        Self {
            figure_width: DEFAULT_FIGURE_WIDTH,
            normalize: true,
        }
    }

    fn padded_windows(regions: &Regions, size: i64) -> Result<Regions> {
        let mut starts = Vec::new();
        let mut ends = Vec::new();
        let mut directions = Vec::new();
        for region in regions.iter() {
            let pad = region.len() / 2;
            if region.start - pad >= 0 && region.end + pad <= size {
                starts.push(region.start - pad);
                ends.push(region.end + pad);
                directions.push(region.direction);
            }
        }
        Regions::new(starts, ends, directions)
    }

    pub fn run(
        &self,
        tracks: &[(String, BedGraph)],
        regions: &FxHashMap<String, Regions>,
    ) -> Result<ProfileTable> {
        let width = self.figure_width;
        let acc = par_accumulate(
            tracks,
            || LineAccum::new(width),
            |chrom, signal| {
                let mut acc = LineAccum::new(width);
                acc.coverage = signal.integral()?;
                if let Some(chrom_regions) = regions.get(chrom) {
                    let size = domain_size(signal)?;
                    let windows = Self::padded_windows(chrom_regions, size)?;
                    if !windows.is_empty() {
                        accumulate_line(signal, &windows, width, &mut acc)?;
                    }
                }
                Ok(acc)
            },
            LineAccum::merge,
        )?;
        let x = (0..width)
            .map(|i| -2.0 + 4.0 * i as f64 / (width.max(2) - 1) as f64)
            .collect();
        finalize_line(acc, self.normalize, x)
    }
}

/// Per-interval heat matrix: fixed windows around interval midpoints,
/// rows ordered by interval size rank across all chromosomes.
#[derive(Debug, Clone)]
pub struct HeatProfile {
    pub figure_width: usize,
    pub region_size: i64,
    pub aspect_ratio: f64,
    pub normalize: bool,
}

impl Default for HeatProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl HeatProfile {
    pub fn new() -> Self {
        Self {
            figure_width: DEFAULT_FIGURE_WIDTH,
            region_size: 100_000,
            aspect_ratio: 2.0,
            normalize: true,
        }
    }

    /// Matrix row of every interval: global size rank compressed onto
    /// the figure height. Chromosomes are ranked together so the row
    /// order is a property of the whole region set.
    fn rank_rows(
        regions: &FxHashMap<String, Regions>,
        nrows: usize,
    ) -> FxHashMap<String, Vec<usize>> {
        let mut chroms: Vec<&String> = regions.keys().collect();
        chroms.sort();
        let mut all_sizes = Vec::new();
        let mut spans = Vec::with_capacity(chroms.len());
        for chrom in &chroms {
            let sizes = regions[*chrom].sizes();
            spans.push((all_sizes.len(), all_sizes.len() + sizes.len()));
            all_sizes.extend(sizes);
        }
        let total = all_sizes.len().max(1);
        let ranks = size_ranks(&all_sizes);
        chroms
            .into_iter()
            .zip(spans)
            .map(|(chrom, (lo, hi))| {
                let rows = ranks[lo..hi].iter().map(|&r| r * nrows / total).collect();
                (chrom.clone(), rows)
            })
            .collect()
    }

    pub fn run(
        &self,
        tracks: &[(String, BedGraph)],
        regions: &FxHashMap<String, Regions>,
    ) -> Result<MatrixTable> {
        let width = self.figure_width;
        let nrows = ((self.aspect_ratio * width as f64) as usize).max(1);
        let half = self.region_size / 2;
        let row_of = Self::rank_rows(regions, nrows);

        let acc = par_accumulate(
            tracks,
            || MatrixAccum::new(nrows, width),
            |chrom, signal| {
                let mut acc = MatrixAccum::new(nrows, width);
                acc.coverage = signal.integral()?;
                if let Some(chrom_regions) = regions.get(chrom) {
                    let size = domain_size(signal)?;
                    let (windows, kept) = midpoint_windows(chrom_regions, half, size)?;
                    if !windows.is_empty() {
                        let chrom_rows = &row_of[chrom];
                        let rows: Vec<usize> = kept.iter().map(|&i| chrom_rows[i]).collect();
                        signal
                            .extract_regions(&windows)?
                            .scale_x(width as i64)?
                            .update_dense_diffs(acc.diffs.view_mut(), &rows)?;
                        for &row in &rows {
                            acc.counts[row] += 1;
                        }
                    }
                }
                Ok(acc)
            },
            MatrixAccum::merge,
        )?;

        let mut values = prefix_sum_rows(&acc.diffs, &acc.counts);
        if self.normalize {
            let per_million = per_million_factor(acc.coverage)?;
            values /= per_million;
        }
        // y labels: cumulative interval count up to each row.
        let mut y = Vec::with_capacity(nrows);
        let mut cum = 0u64;
        for &c in &acc.counts {
            cum += c;
            y.push(cum as f64);
        }
        Ok(MatrixTable {
            x: genomic_x_axis(width, self.region_size),
            y,
            values,
        })
    }
}

/// V-plot: fixed windows around interval midpoints, each interval's row
/// chosen in proportion to its size. Rows no interval landed on are
/// filled by linear interpolation between their populated neighbors.
#[derive(Debug, Clone)]
pub struct VProfile {
    pub figure_width: usize,
    pub region_size: i64,
    pub aspect_ratio: f64,
    pub normalize: bool,
}

impl Default for VProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl VProfile {
    pub fn new() -> Self {
        Self {
            figure_width: DEFAULT_FIGURE_WIDTH,
            region_size: 50_000,
            aspect_ratio: 1.0,
            normalize: true,
        }
    }

    pub fn run(
        &self,
        tracks: &[(String, BedGraph)],
        regions: &FxHashMap<String, Regions>,
    ) -> Result<MatrixTable> {
        let width = self.figure_width;
        let nrows = ((self.aspect_ratio * width as f64) as usize).max(1);
        let half = self.region_size / 2;

        let acc = par_accumulate(
            tracks,
            || MatrixAccum::new(nrows, width),
            |chrom, signal| {
                let mut acc = MatrixAccum::new(nrows, width);
                acc.coverage = signal.integral()?;
                if let Some(chrom_regions) = regions.get(chrom) {
                    let size = domain_size(signal)?;
                    let mut starts = Vec::new();
                    let mut ends = Vec::new();
                    let mut directions = Vec::new();
                    let mut rows = Vec::new();
                    for region in chrom_regions.iter() {
                        let row = region.len() * nrows as i64 / self.region_size;
                        if row >= nrows as i64 {
                            continue;
                        }
                        let mid = (region.start + region.end) / 2;
                        if mid - half < 0 || mid + half > size {
                            continue;
                        }
                        starts.push(mid - half);
                        ends.push(mid + half);
                        directions.push(region.direction);
                        rows.push(row as usize);
                    }
                    if !rows.is_empty() {
                        let windows = Regions::new(starts, ends, directions)?;
                        signal
                            .extract_regions(&windows)?
                            .scale_x(width as i64)?
                            .update_dense_diffs(acc.diffs.view_mut(), &rows)?;
                        for &row in &rows {
                            acc.counts[row] += 1;
                        }
                    }
                }
                Ok(acc)
            },
            MatrixAccum::merge,
        )?;

        let mut values = prefix_sum_rows(&acc.diffs, &acc.counts);
        interpolate_empty_rows(&mut values, &acc.counts);
        if self.normalize {
            let per_million = per_million_factor(acc.coverage)?;
            values /= per_million;
        }
        let y = (0..nrows)
            .map(|r| (r as i64 * self.region_size / nrows as i64) as f64)
            .collect();
        Ok(MatrixTable {
            x: genomic_x_axis(width, self.region_size),
            y,
            values,
        })
    }
}

/// Linear interpolation between populated rows; rows outside the
/// populated span are left untouched.
fn interpolate_empty_rows(values: &mut Array2<f64>, counts: &[u64]) {
    let marked: Vec<usize> = counts
        .iter()
        .enumerate()
        .filter(|(_, &c)| c > 0)
        .map(|(i, _)| i)
        .collect();
    for pair in marked.windows(2) {
        let (pre, post) = (pair[0], pair[1]);
        let gap = post - pre;
        if gap == 1 {
            continue;
        }
        let top = values.row(pre).to_owned();
        let bottom = values.row(post).to_owned();
        for j in 1..gap {
            let frac = j as f64 / gap as f64;
            let mut row = values.row_mut(pre + j);
            for (c, v) in row.iter_mut().enumerate() {
                *v = (1.0 - frac) * top[c] + frac * bottom[c];
            }
        }
    }
}

/// Meta-gene profile: spliced transcript signals rescaled onto fixed
/// 5'UTR / CDS / 3'UTR panels so start and stop codons align across
/// genes of different lengths.
#[derive(Debug, Clone)]
pub struct GeneProfile {
    pub figure_width: usize,
    pub normalize: bool,
}

impl Default for GeneProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneProfile {
    pub fn new() -> Self {
        Self {
            figure_width: DEFAULT_FIGURE_WIDTH,
            normalize: true,
        }
    }

    /// Keep only genes whose exons all fit inside the signal domain.
    fn fit_genes(genes: &Genes, size: i64) -> Result<Genes> {
        let regions = genes.split().regions();
        let offsets = genes.split().offsets();
        let mut starts = Vec::new();
        let mut ends = Vec::new();
        let mut directions = Vec::new();
        let mut new_offsets = vec![0usize];
        let mut cds_starts = Vec::new();
        let mut cds_ends = Vec::new();
        for g in 0..genes.num_features() {
            let (lo, hi) = (offsets[g], offsets[g + 1]);
            if regions.ends()[lo..hi].iter().any(|&e| e > size) {
                continue;
            }
            starts.extend_from_slice(&regions.starts()[lo..hi]);
            ends.extend_from_slice(&regions.ends()[lo..hi]);
            directions.extend_from_slice(&regions.directions()[lo..hi]);
            new_offsets.push(starts.len());
            cds_starts.push(genes.coding().starts()[g]);
            cds_ends.push(genes.coding().ends()[g]);
        }
        let split = SplitRegions::new(Regions::new(starts, ends, directions)?, new_offsets)?;
        Genes::new(split, Regions::forward(cds_starts, cds_ends)?)
    }

    pub fn run(
        &self,
        tracks: &[(String, BedGraph)],
        genes: &FxHashMap<String, Genes>,
    ) -> Result<ProfileTable> {
        let width = self.figure_width;
        if width < 4 {
            return Err(TrackError::domain(format!(
                "figure width {} too small for UTR/CDS/UTR panels",
                width
            )));
        }
        let utr = (width / 4) as i64;
        let cds = width as i64 - 2 * utr;
        let panels = [utr, cds, utr];

        let acc = par_accumulate(
            tracks,
            || LineAccum::new(width),
            |chrom, signal| {
                let mut acc = LineAccum::new(width);
                acc.coverage = signal.integral()?;
                if let Some(chrom_genes) = genes.get(chrom) {
                    let size = domain_size(signal)?;
                    let fitted = Self::fit_genes(chrom_genes, size)?;
                    if fitted.num_features() > 0 {
                        let scaled = fitted
                            .extract_signals(signal)?
                            .piecewise_scale(&fitted.cuts(), &panels)?;
                        scaled.sum_rows()?.update_dense_diffs(acc.diffs.view_mut())?;
                        acc.count += fitted.num_features() as u64;
                    }
                }
                Ok(acc)
            },
            LineAccum::merge,
        )?;
        let x = (0..width).map(|i| i as f64).collect();
        finalize_line(acc, self.normalize, x)
    }
}
