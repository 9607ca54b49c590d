use std::path::Path;

use anyhow::Result;
use trapmark_core::{upgrade, SqlDatabase, CURRENT_VERSION};

/// Run the upgrade sequence on both files and report each step, instead
/// of the silent upgrade a plain open performs.
pub fn run(template_path: &Path, data_path: &Path) -> Result<()> {
    let mut template_db = SqlDatabase::open(template_path)?;
    let report = upgrade::upgrade_template_file(&mut template_db)?;
    print_report(&format!("Template ({})", template_path.display()), &report.applied);

    let mut data_db = SqlDatabase::open(data_path)?;
    let report = upgrade::upgrade_data_file(&mut data_db)?;
    println!(
        "Data file was at version {}, current is {CURRENT_VERSION}.",
        report.from_version
    );
    print_report(&format!("Data ({})", data_path.display()), &report.applied);

    Ok(())
}

fn print_report(label: &str, applied: &[&'static str]) {
    if applied.is_empty() {
        println!("{label}: already up to date.");
        return;
    }
    println!("{label}: applied {} step(s):", applied.len());
    for step in applied {
        println!("  - {step}");
    }
}
