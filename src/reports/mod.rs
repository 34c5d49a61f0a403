mod grid;
mod tables;

pub use self::grid::print_placement as print_placement_grid;
pub use self::tables::summary as print_run_summary;
