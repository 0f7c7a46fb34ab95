mod config;
mod template_cmds;
mod transform_cmd;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use retab_core::{GeminiBackend, TemplateRegistry};

use config::RetabConfig;

#[derive(Parser)]
#[command(
    name = "retab",
    about = "Streams free-text daily reports into tab-separated tables"
)]
struct Cli {
    /// Model id (overrides RETAB_MODEL and the config file)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Extra template file merged over the built-in presets
    #[arg(long, global = true)]
    templates: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Transform a report into a tab-separated table
    Transform {
        /// Report file to read; `-` or omitted reads stdin
        input: Option<String>,
        /// Template id supplying columns, hint, and roster
        #[arg(long)]
        template: Option<String>,
        /// Comma-separated column names (overrides the template's)
        #[arg(long)]
        columns: Option<String>,
        /// Comma-separated expected participants (overrides the template's)
        #[arg(long)]
        roster: Option<String>,
        /// Extraction hint (overrides the template's)
        #[arg(long)]
        hint: Option<String>,
    },
    /// Inspect report templates
    Templates {
        #[command(subcommand)]
        command: TemplateCommands,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// List available templates
    List,
    /// Show one template in full
    Show { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Keep stdout clean for the exported table; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RetabConfig::resolve(cli.model.as_deref(), cli.templates.as_deref())?;

    let mut registry = TemplateRegistry::builtin();
    if let Some(path) = &config.templates_path {
        registry.merge_file(path)?;
    }

    match cli.command {
        Commands::Init { force } => {
            let path = config::write_starter_config(force)?;
            println!("wrote {}", path.display());
            Ok(())
        }
        Commands::Transform {
            input,
            template,
            columns,
            roster,
            hint,
        } => {
            let report = transform_cmd::read_report(input.as_deref())?;
            let args = transform_cmd::TransformArgs {
                template,
                columns,
                roster,
                hint,
            };
            let request = transform_cmd::build_request(&registry, &args, report)?;
            let backend = GeminiBackend::new(config.gemini)?;
            let table = transform_cmd::execute(Arc::new(backend), request).await?;
            println!("{table}");
            Ok(())
        }
        Commands::Templates { command } => match command {
            TemplateCommands::List => {
                template_cmds::list(&registry);
                Ok(())
            }
            TemplateCommands::Show { id } => template_cmds::show(&registry, &id),
        },
    }
}
