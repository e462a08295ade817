//! Background setup task.

use chrono::{DateTime, Utc};
use converge_engine::{Cloud, SchemaStore, SetupOutcome, SyncOptions};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::declarations;

/// Progress of the one-time setup, as reported by `/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupStatus {
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// `None` while setup is still running
    pub outcome: Option<SetupOutcome>,
}

impl SetupStatus {
    pub fn pending() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            outcome: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }
}

impl Default for SetupStatus {
    fn default() -> Self {
        Self::pending()
    }
}

/// Load the declarations, reconcile and record the outcome.
///
/// Loading the declarations is the initialization step awaited before the
/// pass, so an unreadable file ends setup as failed instead of stopping the
/// server.
pub async fn run(
    cloud: Arc<Cloud>,
    store: Arc<dyn SchemaStore>,
    schema_path: PathBuf,
    options: SyncOptions,
    status: Arc<RwLock<SetupStatus>>,
) -> SetupOutcome {
    let module = async {
        declarations::register(&cloud, &schema_path)
            .await
            .map(|_| ())
    };
    let outcome = cloud.setup(store.as_ref(), options, module).await;

    match &outcome {
        SetupOutcome::Converged { report } if report.is_noop() => {
            tracing::info!("schemas already converged")
        }
        SetupOutcome::Converged { report } => tracing::info!(
            created = report.created_classes.len(),
            deleted = report.deleted_classes.len(),
            fields = report.added_fields.len() + report.removed_fields.len() + report.replaced_fields.len(),
            indexes = report.added_indexes.len()
                + report.removed_indexes.len()
                + report.replaced_indexes.len(),
            "schemas converged"
        ),
        SetupOutcome::Skipped => tracing::info!("setup finished without reconciliation"),
        SetupOutcome::Failed { .. } => tracing::warn!("serving with unconverged schemas"),
    }

    let mut status = status.write().await;
    status.finished_at = Some(Utc::now());
    status.outcome = Some(outcome.clone());
    outcome
}

/// Run [`run`] on a background task.
pub fn spawn(
    cloud: Arc<Cloud>,
    store: Arc<dyn SchemaStore>,
    schema_path: PathBuf,
    options: SyncOptions,
    status: Arc<RwLock<SetupStatus>>,
) -> JoinHandle<SetupOutcome> {
    tokio::spawn(run(cloud, store, schema_path, options, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_engine::MemoryStore;

    #[tokio::test]
    async fn missing_declarations_fail_setup() {
        let cloud = Cloud::new_shared();
        let store: Arc<dyn SchemaStore> = Arc::new(MemoryStore::new());
        let status = Arc::new(RwLock::new(SetupStatus::pending()));

        let outcome = run(
            cloud,
            store,
            PathBuf::from("/nonexistent/converge.json"),
            SyncOptions::sync(),
            status.clone(),
        )
        .await;

        assert!(outcome.is_failed());
        let status = status.read().await;
        assert!(status.is_finished());
        assert!(status.finished_at.is_some());
    }
}
