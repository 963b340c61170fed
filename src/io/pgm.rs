//! ASCII greyscale (PGM `P2`) rendering of a label grid.
//!
//! The `ncluster` largest cluster sizes are shaded from `ncluster` (largest,
//! white) down to 1; everything else, blocked cells included, is 0. Image
//! rows run from `n = L - 1` at the top to `n = 0` at the bottom, columns
//! follow `m`.

use crate::grid::global::GlobalGrid;
use crate::percolate_error::PercolateError;
use hashbrown::HashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Shades must fit in one digit.
pub const MAX_CLUSTERS: usize = 9;

/// The plain PGM format caps lines at 70 characters.
const PIXELS_PER_LINE: usize = 32;

/// Sizes of the highlighted clusters, largest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub highlighted: usize,
    pub sizes: Vec<usize>,
}

/// Cell count per positive label.
pub fn cluster_sizes(grid: &GlobalGrid) -> HashMap<u32, usize> {
    let mut sizes = HashMap::new();
    for v in grid.labels().into_iter().filter(|&v| v > 0) {
        *sizes.entry(v).or_insert(0) += 1;
    }
    sizes
}

/// Write `grid` as PGM to `writer`, highlighting `ncluster` cluster sizes.
pub fn write_pgm<W: Write>(
    writer: &mut W,
    grid: &GlobalGrid,
    ncluster: usize,
) -> Result<ClusterSummary, PercolateError> {
    let ncluster = if ncluster > MAX_CLUSTERS {
        log::warn!("cannot shade {ncluster} clusters, highlighting {MAX_CLUSTERS}");
        MAX_CLUSTERS
    } else {
        ncluster.max(1)
    };

    let sizes = cluster_sizes(grid);
    let mut found: Vec<usize> = sizes
        .values()
        .copied()
        .sorted_unstable_by(|a, b| b.cmp(a))
        .dedup()
        .take(ncluster)
        .collect();
    log::info!("largest cluster sizes: {found:?}");
    // shade by rank of size; ties share a shade
    let shade: HashMap<usize, usize> = found
        .iter()
        .enumerate()
        .map(|(rank, &size)| (size, ncluster - rank))
        .collect();
    found.resize(ncluster, 0);

    let l = grid.size();
    writeln!(writer, "P2")?;
    writeln!(writer, "{l} {l}")?;
    writeln!(writer, "{ncluster}")?;

    let mut npix = 0;
    for j in (0..l).rev() {
        for i in 0..l {
            let label = grid.get(i, j);
            let colour = if label > 0 {
                shade.get(&sizes[&label]).copied().unwrap_or(0)
            } else {
                0
            };
            npix += 1;
            if npix == 1 {
                write!(writer, "{colour}")?;
            } else if npix < PIXELS_PER_LINE {
                write!(writer, " {colour}")?;
            } else {
                writeln!(writer, " {colour}")?;
                npix = 0;
            }
        }
    }
    if npix != 0 {
        writeln!(writer)?;
    }
    writer.flush()?;

    Ok(ClusterSummary {
        highlighted: ncluster,
        sizes: found,
    })
}

/// [`write_pgm`] into a file at `path`.
pub fn write_pgm_file<P: AsRef<Path>>(
    path: P,
    grid: &GlobalGrid,
    ncluster: usize,
) -> Result<ClusterSummary, PercolateError> {
    let path = path.as_ref();
    log::info!("writing cluster map to {}", path.display());
    let mut out = BufWriter::new(File::create(path)?);
    write_pgm(&mut out, grid, ncluster)
}
