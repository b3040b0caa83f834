//! CLI module for the home maintenance assistants.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Home maintenance assistants and PDF manual ingestion.
#[derive(Debug, Parser)]
#[command(name = "homecare")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Embed a folder of PDF manuals into a new Qdrant collection
    Ingest(commands::IngestArgs),

    /// Check Qdrant connectivity and OpenAI configuration
    Status(commands::StatusArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),

    /// Chat with a maintenance assistant
    Chat(commands::ChatArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::parse_from(["homecare", "ingest", "./pdfs", "-c", "Manuals", "-f", "json"]);
        assert_eq!(cli.format, Some(OutputFormat::Json));
        match cli.command {
            Commands::Ingest(args) => {
                assert_eq!(args.collection.as_deref(), Some("Manuals"));
                assert!(!args.dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_chat_category() {
        let cli = Cli::parse_from(["homecare", "chat", "pest", "-m", "ants!"]);
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.category, Category::PestControl);
                assert_eq!(args.message.as_deref(), Some("ants!"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_category() {
        assert!(Cli::try_parse_from(["homecare", "chat", "gardening"]).is_err());
    }
}
