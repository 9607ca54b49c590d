mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use trapmark_core::Project;

/// Trapmark — camera trap annotation store
#[derive(Parser)]
#[command(name = "trapmark", version, about)]
struct Cli {
    /// Path to the template (.tdb) file
    #[arg(long, default_value = "TimelapseTemplate.tdb")]
    template: PathBuf,

    /// Path to the data (.ddb) file
    #[arg(long, default_value = "TimelapseData.ddb")]
    data: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a fresh project with the standard controls
    Create,
    /// Show project summary: version, file count, template controls
    Status,
    /// Upgrade both files to the current shape and report what changed
    Upgrade,
    /// Inspect or reorder the template controls
    Template {
        #[command(subcommand)]
        action: Option<TemplateAction>,
    },
}

#[derive(Subcommand)]
enum TemplateAction {
    /// List the controls in display order
    List,
    /// Move a control to a new position (one-based) in the display order
    Move {
        /// The control's data label
        data_label: String,
        /// Target position
        position: i64,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Create => commands::create::run(&cli.template, &cli.data)?,
        Commands::Status => {
            let project = Project::open(&cli.template, &cli.data)?;
            commands::status::run(&project)?;
        }
        Commands::Upgrade => commands::upgrade::run(&cli.template, &cli.data)?,
        Commands::Template { action } => {
            let mut project = Project::open(&cli.template, &cli.data)?;
            match action {
                None | Some(TemplateAction::List) => commands::template::list(&project)?,
                Some(TemplateAction::Move {
                    data_label,
                    position,
                }) => commands::template::move_control(&mut project, &data_label, position)?,
            }
        }
    }

    Ok(())
}
