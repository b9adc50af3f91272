use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("No files selected")]
    NoSelection,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed state file {path}: {source}")]
    Malformed {
        path: String,
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
