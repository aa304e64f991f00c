//! Errors raised while resolving, generating and rendering content.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    /// A plugin factory failed; the message is prefixed with the relative path.
    #[error("{path}: {source}")]
    Factory {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("generator `{name}` failed: {source}")]
    Generator {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unknown view `{0}`")]
    UnknownView(String),

    #[error("view for `{filename}` failed: {source}")]
    View {
        filename: String,
        #[source]
        source: anyhow::Error,
    },

    /// Malformed tree; merge logs these instead of returning them.
    #[error("malformed content tree: {0}")]
    Structural(String),

    #[error("unknown color `{color}` declared by plugin `{plugin}`")]
    UnknownColor { color: String, plugin: String },

    #[error("IO error at `{0}`: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid locals file `{0}`")]
    Locals(PathBuf, #[source] serde_json::Error),

    #[error("locals file `{0}` must contain a JSON object")]
    LocalsNotObject(PathBuf),

    #[error("failed to start the scan pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
