use async_trait::async_trait;
use thiserror::Error;

/// Source of raw semantic model documents.
///
/// Stores only hand out text; parsing is left to [`super::load`] so that it
/// stays free of I/O.
#[async_trait]
pub trait SemanticModelStore: Send + Sync {
    /// Raw YAML of the named model.
    async fn read_model(&self, name: &str) -> Result<String, SemanticModelStoreError>;

    /// Names of the available models, sorted.
    async fn list_models(&self) -> Result<Vec<String>, SemanticModelStoreError>;
}

#[derive(Error, Debug)]
pub enum SemanticModelStoreError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Invalid model name: {0}")]
    InvalidModelName(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
