//! Utility modules.

pub mod file;
pub mod retry;

pub use file::{is_pdf_file_name, list_pdf_files};
pub use retry::{
    RetryPolicy, RetryResult, RetryState, Retryable, is_grpc_rate_limited, is_rate_limited,
};
