/// Occupancy value of a grid cell that holds no code.
pub const EMPTY_CELL: u32 = u32::MAX;

/// Best-candidate slot value for a cell that found no admissible partner.
pub const NO_CANDIDATE: u32 = u32::MAX;

/// Bits per packed storage word of a sparse code.
pub const WORD_BITS: usize = 64;

/// Default candidate search radius (in cells).
pub const DEFAULT_FAR_RADIUS: usize = 4;

/// Default radius of the short-range polish pass.
pub const DEFAULT_POLISH_RADIUS: usize = 2;

/// Upper bound on the device work-group size accepted by the program build.
pub const MAX_WORKGROUP_SIZE: usize = 1024;

/// Default device work-group size (work items per scheduling chunk).
pub const DEFAULT_WORKGROUP_SIZE: usize = 64;

/// Largest grid a `u32` cell index can address with `u32::MAX` kept free
/// for the empty-cell and no-candidate sentinels.
pub const MAX_GRID_CELLS: usize = u32::MAX as usize;

/// Upper bound on the spare-cell margin.
pub const MAX_MARGIN: f32 = 1000.0;
