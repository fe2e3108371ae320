//! BGAT: BedGraph Aggregation Toolkit
//!
//! This library operates on compressed coverage tracks: piecewise-constant
//! signals stored as breakpoint/value runs, never expanded to per-base
//! arrays. On top of the signal algebra it provides batched extraction
//! over stranded region sets, spliced gene models, interval pileup, and
//! the aggregation commands behind the `bgat` binary.
//!
//! # Example
//!
//! ```rust
//! use bgat::{BedGraph, Regions, Track};
//!
//! let signal = BedGraph::new(vec![0, 100], vec![0.0, 2.0], 200).unwrap();
//! let peaks = Regions::forward(vec![90], vec![190]).unwrap();
//!
//! let rows = signal.extract_regions(&peaks).unwrap();
//! assert_eq!(rows.row(0).unwrap().value_at(50), 2.0);
//! ```

pub mod aggregate;
pub mod bedgraph;
pub mod bedgraph_array;
mod collapse;
pub mod coverage;
pub mod error;
pub mod io;
pub mod parallel;
pub mod regions;
pub mod splitregions;

// Re-export commonly used types
pub use bedgraph::{BedGraph, Track};
pub use bedgraph_array::{BedGraphArray, BedGraphRow};
pub use error::{Result, TrackError};
pub use regions::{Region, Regions, Strand};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::aggregate::{
        AverageProfile, GeneProfile, HeatProfile, MatrixTable, ProfileTable, TssProfile,
        VProfile,
    };
    pub use crate::bedgraph::{BedGraph, Track};
    pub use crate::bedgraph_array::{BedGraphArray, BedGraphRow};
    pub use crate::coverage::coverage;
    pub use crate::error::{Result, TrackError};
    pub use crate::io::{read_bed, read_bedgraph, read_refseq, write_bedgraph};
    pub use crate::regions::{Region, Regions, Strand};
    pub use crate::splitregions::{Genes, SplitRegions};
}
