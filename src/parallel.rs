//! Per-chromosome parallel accumulation using Rayon.

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::bedgraph::BedGraph;
use crate::error::{Result, TrackError};
use crate::regions::Regions;

/// Configure the global Rayon pool. `0` keeps Rayon's default
/// (one worker per logical CPU).
pub fn init_thread_pool(threads: usize) -> Result<()> {
    if threads == 0 {
        return Ok(());
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .map_err(|e| TrackError::invariant(format!("thread pool init failed: {}", e)))
}

/// Map every `(chrom, signal)` pair in parallel and merge the partial
/// accumulators pairwise. Each worker builds its own accumulator, so no
/// locking is involved; `merge` must be associative and commutative.
pub fn par_accumulate<T, I, F, M>(
    tracks: &[(String, BedGraph)],
    identity: I,
    map: F,
    merge: M,
) -> Result<T>
where
    T: Send,
    I: Fn() -> T + Sync + Send,
    F: Fn(&str, &BedGraph) -> Result<T> + Sync + Send,
    M: Fn(T, T) -> Result<T> + Sync + Send,
{
    tracks
        .par_iter()
        .map(|(chrom, signal)| map(chrom, signal))
        .try_reduce(identity, merge)
}

/// Work-distribution summary printed by `--stats`.
#[derive(Debug, Clone)]
pub struct ChromStats {
    pub total_regions: usize,
    pub num_chromosomes: usize,
    pub regions_per_chrom: Vec<(String, usize)>,
}

impl ChromStats {
    pub fn from_regions(map: &FxHashMap<String, Regions>) -> Self {
        let mut regions_per_chrom: Vec<(String, usize)> = map
            .iter()
            .map(|(chrom, regions)| (chrom.clone(), regions.len()))
            .collect();
        regions_per_chrom.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        Self {
            total_regions: map.values().map(|r| r.len()).sum(),
            num_chromosomes: map.len(),
            regions_per_chrom,
        }
    }
}
