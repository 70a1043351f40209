pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "remco")]
#[command(about = "Remco CLI - inspect and validate remittance commission setups")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "List commission cells and their form prefixes for enabled partners")]
    Matrix,

    #[command(about = "Validate an urlencoded commission form body without writing anything")]
    Validate {
        #[arg(help = "File holding the urlencoded form body")]
        form_file: PathBuf,

        #[arg(long = "partner", help = "Partner code to validate (repeatable); defaults to the enabled partners")]
        partners: Vec<String>,
    },

    #[command(about = "Push the remittance commission configuration to the partner hub")]
    Sync,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Matrix => commands::matrix::handle(output_format).await,
        Commands::Validate { form_file, partners } => {
            commands::validate::handle(&form_file, &partners, output_format).await
        }
        Commands::Sync => commands::sync::handle(output_format).await,
    }
}
