//! Training board
//!
//! Lists the company's trainings with per-row actions. Uploads are offered
//! only while a training is unfinished; deletes go through a confirmation
//! step and, like projects, reach the list through the store's subscription.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::{Training, TrainingPhase};
use crate::error::{Error, Result};
use crate::gateway::{Filter, Gateway};
use crate::session::{CompanyId, SessionContext};
use crate::store::{Record, TrainingStore};

/// Action offered on a training row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingAction {
    Upload {
        training_id: String,
        phase: TrainingPhase,
    },
    Delete {
        training_id: String,
        /// A delete for this row is in flight
        busy: bool,
    },
}

/// Actions available for `training`
pub fn actions_for(training: &Training, deleting: Option<&str>) -> Vec<TrainingAction> {
    let mut actions = Vec::with_capacity(2);
    if !training.phase.is_finished() {
        actions.push(TrainingAction::Upload {
            training_id: training.id.clone(),
            phase: training.phase.clone(),
        });
    }
    actions.push(TrainingAction::Delete {
        training_id: training.id.clone(),
        busy: deleting == Some(training.id.as_str()),
    });
    actions
}

/// Controller for the training screen
pub struct TrainingBoard {
    store: Arc<TrainingStore>,
    session: SessionContext,
    upload_target: Option<Training>,
    pending_delete: Option<String>,
    deleting: Option<String>,
    last_error: Option<String>,
}

impl std::fmt::Debug for TrainingBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingBoard")
            .field("upload_target", &self.upload_target.as_ref().map(|t| &t.id))
            .field("pending_delete", &self.pending_delete)
            .field("deleting", &self.deleting)
            .finish()
    }
}

impl TrainingBoard {
    pub fn new(store: Arc<TrainingStore>, session: SessionContext) -> Self {
        Self {
            store,
            session,
            upload_target: None,
            pending_delete: None,
            deleting: None,
            last_error: None,
        }
    }

    pub fn store(&self) -> &Arc<TrainingStore> {
        &self.store
    }

    pub fn trainings(&self) -> Vec<Training> {
        self.store.records()
    }

    /// Every row paired with its actions
    pub fn rows(&self) -> Vec<(Training, Vec<TrainingAction>)> {
        let deleting = self.deleting.as_deref();
        self.trainings()
            .into_iter()
            .map(|t| {
                let actions = actions_for(&t, deleting);
                (t, actions)
            })
            .collect()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ========== Upload ==========

    /// Open the upload dialog for an unfinished training
    pub fn open_upload(&mut self, training_id: &str) -> Result<&Training> {
        let training = self
            .store
            .records()
            .into_iter()
            .find(|t| t.id == training_id)
            .ok_or_else(|| Error::InvalidInput(format!("unknown training '{}'", training_id)))?;

        if training.phase.is_finished() {
            return Err(Error::InvalidInput(format!(
                "training '{}' is finished and no longer accepts uploads",
                training_id
            )));
        }

        Ok(self.upload_target.insert(training))
    }

    pub fn upload_target(&self) -> Option<&Training> {
        self.upload_target.as_ref()
    }

    pub fn close_upload(&mut self) {
        self.upload_target = None;
    }

    // ========== Delete ==========

    /// Ask for confirmation before deleting `training_id`
    pub fn open_delete(&mut self, training_id: &str) {
        self.pending_delete = Some(training_id.to_string());
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Training currently being deleted, if any
    pub fn deleting(&self) -> Option<&str> {
        self.deleting.as_deref()
    }

    /// Start deleting the training awaiting confirmation
    ///
    /// The row reports `busy` until the returned request is handed back to
    /// [`finish_delete`](Self::finish_delete). On error the confirmation is kept.
    pub fn begin_delete(&mut self) -> Result<DeleteRequest> {
        let company = self.session.require_company()?;
        let Some(training_id) = self.pending_delete.take() else {
            return Err(Error::InvalidInput("no training selected for deletion".to_string()));
        };

        let filter = self
            .store
            .scope(&company)
            .and_eq(Training::ID_COLUMN, training_id.as_str());
        self.deleting = Some(training_id.clone());

        Ok(DeleteRequest {
            gateway: self.store.gateway().clone(),
            table: self.store.table().to_string(),
            filter,
            training_id,
            company,
        })
    }

    /// Record the outcome of a request started with [`begin_delete`](Self::begin_delete)
    pub fn finish_delete(&mut self, request: DeleteRequest, result: Result<u64>) -> Result<u64> {
        if self.deleting.as_deref() == Some(request.training_id.as_str()) {
            self.deleting = None;
        }

        let training_id = request.training_id;
        match result {
            Ok(0) => {
                warn!(training_id = %training_id, company = %request.company, "Training to delete was not found");
                self.last_error = None;
                Ok(0)
            }
            Ok(removed) => {
                info!(training_id = %training_id, "Training deleted");
                self.last_error = None;
                Ok(removed)
            }
            Err(err) => {
                error!(training_id = %training_id, error = %err, "Failed to delete training");
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Delete the training awaiting confirmation
    pub async fn confirm_delete(&mut self) -> Result<u64> {
        let request = self.begin_delete()?;
        let result = request.send().await;
        self.finish_delete(request, result)
    }
}

/// A confirmed training delete, detached from the board while in flight
pub struct DeleteRequest {
    gateway: Arc<dyn Gateway>,
    table: String,
    filter: Filter,
    training_id: String,
    company: CompanyId,
}

impl std::fmt::Debug for DeleteRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteRequest")
            .field("table", &self.table)
            .field("training_id", &self.training_id)
            .field("company", &self.company)
            .finish()
    }
}

impl DeleteRequest {
    pub fn training_id(&self) -> &str {
        &self.training_id
    }

    /// Issue the delete; returns how many rows the backend removed
    pub async fn send(&self) -> Result<u64> {
        self.gateway.delete(&self.table, &self.filter).await
    }
}
