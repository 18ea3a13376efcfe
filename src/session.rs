//! Per-user state: the active semantic model and the columns picked from it.

use crate::prompt;
use crate::selection::{ResultOperation, SelectionError, SelectionState};
use crate::semantic_model::index::{ColumnEntry, ColumnRef};
use crate::semantic_model::{
    load, MetadataIndex, SemanticModel, SemanticModelError, SemanticModelStore,
    SemanticModelStoreError,
};
use log::{debug, info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No semantic model is active")]
    NoActiveModel,

    #[error(transparent)]
    Store(#[from] SemanticModelStoreError),

    #[error(transparent)]
    Model(#[from] SemanticModelError),

    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// A parsed and indexed model, ready to be installed in a session.
#[derive(Debug, Clone)]
pub struct ActiveModel {
    pub name: String,
    pub index: MetadataIndex,
}

impl ActiveModel {
    pub fn load(name: &str, raw_yaml: &str) -> Result<Self, SemanticModelError> {
        let model = load(raw_yaml)?;
        Ok(Self {
            name: name.to_string(),
            index: MetadataIndex::new(Arc::new(model)),
        })
    }

    pub fn model(&self) -> &SemanticModel {
        self.index.model()
    }
}

#[derive(Debug, Default)]
pub struct Session {
    active: Option<ActiveModel>,
    selection: SelectionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `raw_yaml` and make it the active model, dropping every
    /// selection. A model that fails to load leaves the session untouched.
    pub fn switch_model(&mut self, name: &str, raw_yaml: &str) -> Result<(), SessionError> {
        let active = ActiveModel::load(name, raw_yaml).map_err(|e| {
            warn!("Rejected semantic model {}: {}", name, e);
            e
        })?;
        self.install(active);
        Ok(())
    }

    pub fn install(&mut self, active: ActiveModel) {
        info!(
            "Activated semantic model {} ({} tables)",
            active.name,
            active.model().tables.len()
        );
        *self = Session {
            active: Some(active),
            selection: SelectionState::new(),
        };
    }

    pub fn model_name(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.name.as_str())
    }

    pub fn index(&self) -> Result<&MetadataIndex, SessionError> {
        self.active
            .as_ref()
            .map(|active| &active.index)
            .ok_or(SessionError::NoActiveModel)
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn toggle(&mut self, column_ref: &ColumnRef) -> Result<(), SessionError> {
        let index = self
            .active
            .as_ref()
            .map(|active| &active.index)
            .ok_or(SessionError::NoActiveModel)?;
        let entry = resolve(index, column_ref)?;
        self.selection.toggle(&entry);
        Ok(())
    }

    /// Select a column unless it is already selected.
    pub fn select(&mut self, column_ref: &ColumnRef) -> Result<(), SessionError> {
        if self.selection.is_selected(column_ref) {
            return Ok(());
        }
        self.toggle(column_ref)
    }

    pub fn set_operation(
        &mut self,
        column_ref: &ColumnRef,
        op: ResultOperation,
    ) -> Result<(), SessionError> {
        self.index()?;
        Ok(self.selection.set_operation(column_ref, op)?)
    }

    pub fn set_operation_str(
        &mut self,
        column_ref: &ColumnRef,
        op: &str,
    ) -> Result<(), SessionError> {
        self.index()?;
        Ok(self.selection.set_operation_str(column_ref, op)?)
    }

    pub fn set_filter(&mut self, column_ref: &ColumnRef, text: &str) -> Result<(), SessionError> {
        self.index()?;
        Ok(self.selection.set_filter(column_ref, text)?)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn prompt(&self) -> Result<String, SessionError> {
        Ok(prompt::synthesize(&self.selection, self.index()?))
    }
}

fn resolve<'a>(
    index: &'a MetadataIndex,
    column_ref: &ColumnRef,
) -> Result<ColumnEntry<'a>, SelectionError> {
    index
        .resolve(column_ref)
        .ok_or_else(|| SelectionError::UnknownColumn(column_ref.to_string()))
}

/// A [`Session`] shared between tasks.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().await
    }

    /// Fetch, parse and install a model. Fetching and parsing happen outside
    /// the lock, so when loads overlap the one that completes last wins.
    pub async fn load_from_store<S>(&self, store: &S, name: &str) -> Result<(), SessionError>
    where
        S: SemanticModelStore + ?Sized,
    {
        debug!("Loading semantic model {}", name);
        let raw_yaml = store.read_model(name).await?;
        let active = ActiveModel::load(name, &raw_yaml).map_err(|e| {
            warn!("Rejected semantic model {}: {}", name, e);
            e
        })?;
        self.inner.lock().await.install(active);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Session, SessionError, SharedSession};
    use crate::selection::{ResultOperation, SelectionError};
    use crate::semantic_model::index::ColumnRef;
    use crate::semantic_model::local_store::InMemorySemanticModelStore;
    use crate::semantic_model::{SemanticModelStore, SemanticModelStoreError};
    use async_trait::async_trait;
    use rstest::*;
    use std::sync::Arc;
    use tokio::sync::Notify;

    const SALES: &str = r#"
tables:
  - name: ORDERS
    dimensions:
      - name: REGION
    facts:
      - name: AMOUNT
"#;

    const HR: &str = r#"
tables:
  - name: EMPLOYEES
    dimensions:
      - name: DEPARTMENT
"#;

    #[fixture]
    fn session() -> Session {
        let mut session = Session::new();
        session.switch_model("sales", SALES).unwrap();
        session
    }

    #[test]
    fn test_empty_session_has_no_model() {
        let mut session = Session::new();
        assert!(matches!(session.index(), Err(SessionError::NoActiveModel)));
        assert!(matches!(
            session.toggle(&ColumnRef::new("ORDERS", "REGION")),
            Err(SessionError::NoActiveModel)
        ));
    }

    #[rstest]
    fn test_switch_model_resets_selection(mut session: Session) {
        session.toggle(&ColumnRef::new("ORDERS", "REGION")).unwrap();
        assert_eq!(session.selection().len(), 1);

        session.switch_model("hr", HR).unwrap();
        assert_eq!(session.model_name(), Some("hr"));
        assert!(session.selection().is_empty());
    }

    #[rstest]
    fn test_failed_switch_keeps_previous_state(mut session: Session) {
        session.toggle(&ColumnRef::new("ORDERS", "REGION")).unwrap();

        let err = session.switch_model("broken", "tables: 5").unwrap_err();
        assert!(matches!(err, SessionError::Model(_)));
        assert_eq!(session.model_name(), Some("sales"));
        assert_eq!(session.selection().len(), 1);
    }

    #[rstest]
    fn test_unknown_column_is_rejected(mut session: Session) {
        let err = session
            .toggle(&ColumnRef::new("ORDERS", "MISSING"))
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Selection(SelectionError::UnknownColumn(_))
        ));
        assert!(session.selection().is_empty());
    }

    #[rstest]
    fn test_rejected_operation_leaves_selection(mut session: Session) {
        let amount = ColumnRef::new("ORDERS", "AMOUNT");
        session.select(&amount).unwrap();
        assert!(session.set_operation_str(&amount, "median").is_err());
        assert_eq!(
            session.selection().get(&amount).unwrap().result_operation,
            ResultOperation::Sum
        );
    }

    #[rstest]
    fn test_prompt(mut session: Session) {
        session.select(&ColumnRef::new("ORDERS", "AMOUNT")).unwrap();
        session.select(&ColumnRef::new("ORDERS", "REGION")).unwrap();
        assert_eq!(
            session.prompt().unwrap(),
            "Show me total of ORDERS AMOUNT, ORDERS REGION grouped by ORDERS REGION"
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_load_from_store() {
        let store = InMemorySemanticModelStore::new()
            .with_model("sales", SALES)
            .with_model("broken", "not: [valid");
        let shared = SharedSession::default();

        shared.load_from_store(&store, "sales").await.unwrap();
        shared
            .lock()
            .await
            .toggle(&ColumnRef::new("ORDERS", "REGION"))
            .unwrap();

        assert!(shared.load_from_store(&store, "broken").await.is_err());
        assert!(matches!(
            shared.load_from_store(&store, "missing").await,
            Err(SessionError::Store(_))
        ));

        let session = shared.lock().await;
        assert_eq!(session.model_name(), Some("sales"));
        assert_eq!(session.selection().len(), 1);
    }

    /// Holds back reads of one model until released.
    struct GatedStore {
        inner: InMemorySemanticModelStore,
        gated: &'static str,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl SemanticModelStore for GatedStore {
        async fn read_model(&self, name: &str) -> Result<String, SemanticModelStoreError> {
            if name == self.gated {
                self.gate.notified().await;
            }
            self.inner.read_model(name).await
        }

        async fn list_models(&self) -> Result<Vec<String>, SemanticModelStoreError> {
            self.inner.list_models().await
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_last_completed_load_wins() {
        let gate = Arc::new(Notify::new());
        let store = GatedStore {
            inner: InMemorySemanticModelStore::new()
                .with_model("sales", SALES)
                .with_model("hr", HR),
            gated: "sales",
            gate: gate.clone(),
        };
        let shared = SharedSession::default();

        // "sales" starts first but completes after "hr".
        let slow = shared.load_from_store(&store, "sales");
        let fast = async {
            shared.load_from_store(&store, "hr").await?;
            {
                let mut session = shared.lock().await;
                assert_eq!(session.model_name(), Some("hr"));
                session.toggle(&ColumnRef::new("EMPLOYEES", "DEPARTMENT"))?;
            }
            gate.notify_one();
            Ok::<(), SessionError>(())
        };
        let (slow, fast) = tokio::join!(slow, fast);
        slow.unwrap();
        fast.unwrap();

        let session = shared.lock().await;
        assert_eq!(session.model_name(), Some("sales"));
        assert!(session.index().unwrap().table("ORDERS").is_some());
        assert!(session.selection().is_empty());
    }
}
