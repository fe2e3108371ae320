//! Interval pileup: turn a set of intervals into a coverage signal.

use crate::bedgraph::BedGraph;
use crate::collapse::cumsum_by_key;
use crate::error::Result;
use crate::regions::Regions;

/// Depth-of-coverage of `regions` as an open-ended [`BedGraph`].
///
/// Start and end events are collapsed with the running-total reduction:
/// the value at each unique coordinate is the number of intervals
/// covering the segment that starts there. Repeated values are dropped
/// and a leading 0 breakpoint is forced so the result is a valid run.
/// Callers finalize with the chromosome size.
pub fn coverage(regions: &Regions) -> Result<BedGraph> {
    if regions.is_empty() {
        return BedGraph::open_ended(vec![0], vec![0.0]);
    }
    let n = regions.len();
    let mut keys = Vec::with_capacity(2 * n);
    let mut deltas = Vec::with_capacity(2 * n);
    keys.extend_from_slice(regions.starts());
    deltas.resize(n, 1.0);
    keys.extend_from_slice(regions.ends());
    deltas.resize(2 * n, -1.0);

    let (positions, counts) = cumsum_by_key(&keys, &deltas);

    let mut indices = Vec::with_capacity(positions.len());
    let mut values = Vec::with_capacity(positions.len());
    for (k, (&pos, &count)) in positions.iter().zip(&counts).enumerate() {
        if k > 0 && count == values[values.len() - 1] {
            continue;
        }
        indices.push(pos);
        values.push(count);
    }
    if indices[0] != 0 {
        indices.insert(0, 0);
        values.insert(0, 0.0);
    }
    BedGraph::open_ended(indices, values)
}
