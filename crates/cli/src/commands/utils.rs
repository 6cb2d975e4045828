use thiserror::Error;

/// Everything a CLI command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx answer from the gateway, with its `detail` when present.
    #[error("Error: {status} - {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Error: {0}")]
    General(String),
}

pub type CliResult<T> = Result<T, CliError>;

pub fn print_success(message: &str) {
    println!("[SUCCESS] {message}");
}

pub fn print_error(message: &str) {
    eprintln!("[ERROR] {message}");
}
