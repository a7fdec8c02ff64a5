//! Distance-field construction: seeds occupied voxels into the lattice, runs
//! the exact distance transform and weights every cell with the sensor model.

pub mod edt;

pub use edt::DistanceField;

use crate::grid::VoxelMap;
use crate::types::{GridCell, MapInfo};

/// Likelihood cells of `map` over the lattice `info`, in index order.
///
/// Cells keep [`GridCell::default`] when the map has no occupied voxel.
pub fn build_cells(map: &VoxelMap, info: &MapInfo, sensor_deviation: f32) -> Vec<GridCell> {
    let mut seeds = vec![false; info.cell_count()];
    for &center in map.occupied() {
        seeds[info.index(info.cell_of(center))] = true;
    }

    let field = DistanceField::from_seeds(
        info.width as usize,
        info.height as usize,
        info.depth as usize,
        &seeds,
    );

    field
        .distances()
        .map(|distance| match distance {
            Some(cells) => GridCell::from_distance(cells * info.resolution, sensor_deviation),
            None => GridCell::default(),
        })
        .collect()
}
