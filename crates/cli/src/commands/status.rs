use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use trapmark_core::Project;

pub fn run(project: &Project) -> Result<()> {
    let version = project.version()?;
    let total = project.count_files(None)?;
    let deleted = project.count_files(Some("DeleteFlag = 'true'"))?;
    let columns = project.list_columns();

    println!();
    println!("  Trapmark Status");
    println!("  ===============");
    println!();
    println!("   Version:          {version}");
    println!("   Files:            {total:>8}");
    println!("   Marked deleted:   {deleted:>8}");
    println!("   Data columns:     {:>8}", columns.len());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Order"),
        Cell::new("Type"),
        Cell::new("Data Label"),
        Cell::new("Default"),
        Cell::new("Visible"),
    ]);
    for row in project.template().rows() {
        table.add_row(vec![
            Cell::new(row.control_order),
            Cell::new(row.control_type.as_str()),
            Cell::new(&row.data_label),
            Cell::new(&row.default_value),
            Cell::new(if row.visible { "yes" } else { "no" }),
        ]);
    }

    println!();
    println!("  Template");
    println!("  --------");
    println!("{table}");
    println!();

    Ok(())
}
