use comfy_table::presets::ASCII_FULL;
use comfy_table::{Cell, CellAlignment, Table};
use gridforge::optimizer::Placement;
use tracing::info;

const MAX_PRINTED_SIDE: usize = 32;
const MAX_LABEL_CHARS: usize = 8;

fn short_label(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL_CHARS {
        label.to_string()
    } else {
        let head: String = label.chars().take(MAX_LABEL_CHARS - 1).collect();
        format!("{}~", head)
    }
}

pub fn print_placement(placement: &Placement<String>) {
    let side = placement.side;
    if side > MAX_PRINTED_SIDE {
        info!("Grid is {}x{}; skipping the cell table", side, side);
        return;
    }

    let mut labels = vec![String::new(); side * side];
    for entry in &placement.entries {
        labels[entry.cell] = short_label(&entry.label);
    }

    println!("\nGrid: {}x{}", side, side);
    let mut table = Table::new();
    table.load_preset(ASCII_FULL);

    for row in labels.chunks(side) {
        let cells: Vec<Cell> = row
            .iter()
            .map(|l| Cell::new(l).set_alignment(CellAlignment::Center))
            .collect();
        table.add_row(cells);
    }
    println!("{}", table);
}
