use std::path::Path;

use anyhow::{bail, Result};
use trapmark_core::{Project, CURRENT_VERSION};

pub fn run(template_path: &Path, data_path: &Path) -> Result<()> {
    if template_path.exists() {
        bail!("refusing to overwrite {}", template_path.display());
    }
    if data_path.exists() {
        bail!("refusing to overwrite {}", data_path.display());
    }

    let project = Project::create(template_path, data_path)?;
    println!(
        "Created project at version {CURRENT_VERSION} with {} standard control(s).",
        project.template().len()
    );
    println!("  Template: {}", template_path.display());
    println!("  Data:     {}", data_path.display());
    Ok(())
}
