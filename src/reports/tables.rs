use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use gridforge::optimizer::RunOutcome;

fn energy(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |e| format!("{:.3}", e))
}

pub fn summary(runs: &[(String, &RunOutcome)]) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Backend").add_attribute(Attribute::Bold),
        Cell::new("State").fg(Color::Cyan),
        Cell::new("Epochs"),
        Cell::new("Swaps"),
        Cell::new("Polish"),
        Cell::new("E0"),
        Cell::new("E1").fg(Color::Green),
        Cell::new("Secs"),
    ]);

    for i in 2..=7 {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    for (name, o) in runs {
        let polish = match o.polish_state {
            Some(state) => format!("{} ({}/{})", state, o.polish_epochs, o.polish_swaps),
            None => "off".to_string(),
        };
        table.add_row(vec![
            Cell::new(name).add_attribute(Attribute::Bold),
            Cell::new(o.state.to_string()).fg(Color::Cyan),
            Cell::new(o.epochs),
            Cell::new(o.swaps),
            Cell::new(polish),
            Cell::new(energy(o.initial_energy)),
            Cell::new(energy(o.final_energy)).fg(Color::Green),
            Cell::new(format!("{:.3}", o.elapsed_secs)),
        ]);
    }
    println!("\n{}", table);
}
