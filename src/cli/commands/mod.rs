mod chat;
mod config;
mod ingest;
mod status;

pub use chat::ChatArgs;
pub use config::ConfigCommand;
pub use ingest::IngestArgs;
pub use status::StatusArgs;

pub use chat::handle_chat;
pub use config::handle_config;
pub use ingest::handle_ingest;
pub use status::handle_status;
