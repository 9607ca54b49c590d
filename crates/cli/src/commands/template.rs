use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use trapmark_core::{ControlTable, Project};

pub fn list(project: &Project) -> Result<()> {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Order"),
        Cell::new("Spreadsheet"),
        Cell::new("Type"),
        Cell::new("Data Label"),
        Cell::new("Label"),
        Cell::new("Default"),
        Cell::new("Copyable"),
    ]);
    for row in project.template().rows() {
        table.add_row(vec![
            Cell::new(row.control_order),
            Cell::new(row.spreadsheet_order),
            Cell::new(row.control_type.as_str()),
            Cell::new(&row.data_label),
            Cell::new(&row.label),
            Cell::new(&row.default_value),
            Cell::new(if row.copyable { "yes" } else { "no" }),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Move a control in the display order. Both template copies are updated
/// so the standalone template file does not drift from the data file's.
pub fn move_control(project: &mut Project, data_label: &str, position: i64) -> Result<()> {
    ControlTable::set_control_order(project.data_db(), data_label, position)?;
    ControlTable::set_control_order(project.template_db(), data_label, position)?;
    project.reload_template()?;

    println!("Moved {data_label} to position {position}.");
    list(project)
}
