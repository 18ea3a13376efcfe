use crate::semantic_model::store::{SemanticModelStore, SemanticModelStoreError};
use async_trait::async_trait;
use log::debug;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Reads `<dir>/<name>.yaml` (or `.yml`) files.
#[derive(Clone, Debug)]
pub struct LocalSemanticModelStore {
    dir: PathBuf,
}

impl LocalSemanticModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl SemanticModelStore for LocalSemanticModelStore {
    async fn read_model(&self, name: &str) -> Result<String, SemanticModelStoreError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(SemanticModelStoreError::InvalidModelName(name.to_string()));
        }

        for extension in EXTENSIONS {
            let path = self.dir.join(format!("{}.{}", name, extension));
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    debug!("Read semantic model {} from {}", name, path.display());
                    return Ok(content);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(SemanticModelStoreError::Io {
                        path: path.display().to_string(),
                        source: e,
                    })
                }
            }
        }
        Err(SemanticModelStoreError::ModelNotFound(name.to_string()))
    }

    async fn list_models(&self) -> Result<Vec<String>, SemanticModelStoreError> {
        let io_error = |source| SemanticModelStoreError::Io {
            path: self.dir.display().to_string(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_error)?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            let is_model = path
                .extension()
                .and_then(|extension| extension.to_str())
                .is_some_and(|extension| EXTENSIONS.contains(&extension));
            if let (true, Some(stem)) = (is_model, path.file_stem().and_then(|s| s.to_str())) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Models held in memory, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct InMemorySemanticModelStore {
    semantic_models: BTreeMap<String, String>,
}

impl InMemorySemanticModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, name: impl Into<String>, yaml: impl Into<String>) -> Self {
        self.insert(name, yaml);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, yaml: impl Into<String>) {
        self.semantic_models.insert(name.into(), yaml.into());
    }
}

#[async_trait]
impl SemanticModelStore for InMemorySemanticModelStore {
    async fn read_model(&self, name: &str) -> Result<String, SemanticModelStoreError> {
        self.semantic_models
            .get(name)
            .cloned()
            .ok_or_else(|| SemanticModelStoreError::ModelNotFound(name.to_string()))
    }

    async fn list_models(&self) -> Result<Vec<String>, SemanticModelStoreError> {
        Ok(self.semantic_models.keys().cloned().collect())
    }
}

#[cfg(test)]
mod test {
    use super::{InMemorySemanticModelStore, LocalSemanticModelStore};
    use crate::semantic_model::store::{SemanticModelStore, SemanticModelStoreError};
    use std::path::PathBuf;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "semantic-charts-{}-{}",
            label,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_local_store_reads_yaml_and_yml() {
        let dir = scratch_dir("read");
        std::fs::write(dir.join("sales.yaml"), "tables: []\n").unwrap();
        std::fs::write(dir.join("hr.yml"), "tables: []\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let store = LocalSemanticModelStore::new(&dir);
        assert_eq!(store.read_model("sales").await.unwrap(), "tables: []\n");
        assert_eq!(store.read_model("hr").await.unwrap(), "tables: []\n");
        assert_eq!(store.list_models().await.unwrap(), vec!["hr", "sales"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_local_store_missing_and_invalid_names() {
        let dir = scratch_dir("missing");
        let store = LocalSemanticModelStore::new(&dir);

        assert!(matches!(
            store.read_model("nope").await,
            Err(SemanticModelStoreError::ModelNotFound(_))
        ));
        assert!(matches!(
            store.read_model("../etc/passwd").await,
            Err(SemanticModelStoreError::InvalidModelName(_))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemorySemanticModelStore::new()
            .with_model("b", "tables: []")
            .with_model("a", "tables: []");

        assert_eq!(store.list_models().await.unwrap(), vec!["a", "b"]);
        assert!(store.read_model("c").await.is_err());
    }
}
