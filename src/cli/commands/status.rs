use anyhow::Result;
use clap::Args;

use crate::cli::output::{CollectionStatus, StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::connect_vector_store;

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Also report on this collection
    #[arg(long, short = 'c')]
    pub collection: Option<String>,
}

pub async fn handle_status(args: StatusArgs, format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let mut status = StatusInfo {
        config_path: Config::config_path()
            .filter(|p| p.exists())
            .map(|p| p.display().to_string()),
        qdrant_url: config.vector_store.url.clone(),
        qdrant_connected: false,
        qdrant_error: None,
        collection: None,
        embedding_model: config.openai.embedding_model.clone(),
        embedding_dimension: config.openai.embedding_dimension,
        openai_configured: config.openai.api_key.is_some(),
    };

    match config.require_vector_store() {
        Err(e) => status.qdrant_error = Some(e.to_string()),
        Ok(_) => match connect_vector_store(&config.vector_store).await {
            Err(e) => status.qdrant_error = Some(e.to_string()),
            Ok(store) => {
                status.qdrant_connected = true;
                if let Some(name) = args.collection {
                    match store.collection_info(&name).await {
                        Ok(info) => {
                            status.collection = Some(CollectionStatus {
                                name,
                                exists: info.is_some(),
                                dimension: info.as_ref().map(|i| i.dimension),
                                metric: info.as_ref().map(|i| i.metric.to_string()),
                                points: info.map_or(0, |i| i.points_count),
                            });
                        }
                        Err(e) => status.qdrant_error = Some(e.to_string()),
                    }
                }
            }
        },
    }

    print!("{}", formatter.format_status(&status));

    if !status.qdrant_connected || !status.openai_configured {
        eprintln!();
        if !status.qdrant_connected {
            eprintln!("Hint: set QDRANT_URL and QDRANT_API_KEY (environment or .env file).");
        }
        if !status.openai_configured {
            eprintln!("Hint: set OPENAI_API_KEY to ingest documents or chat.");
        }
    }

    Ok(())
}
