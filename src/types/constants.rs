/// Occupancy-slice cell values, same convention as a ROS `OccupancyGrid`.
pub const UNKNOWN: i8 = -1;
pub const FREE: i8 = 0;
pub const OCCUPIED: i8 = 100;

/// Distance stored in a cell that has no occupied voxel to measure against.
pub const DISTANCE_UNKNOWN: f32 = -1.0;

pub const DEFAULT_SENSOR_DEVIATION: f32 = 0.05;

/// Extension of the grid cache written next to the map file.
pub const CACHE_EXTENSION: &str = "grid";

/// Upper bound on lattice size (2^28 cells, 2 GiB of cells).
pub const MAX_LATTICE_CELLS: usize = 1 << 28;
