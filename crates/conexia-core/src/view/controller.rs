//! Project list controller
//!
//! Derives the paginated view of a [`ProjectStore`] and dispatches the add
//! and delete actions. New and removed projects show up in the list only
//! when the store's subscription reports them.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::pagination::{Pagination, total_pages};
use super::view_mode::ViewMode;
use crate::domain::{NewProject, Project};
use crate::error::{Error, Result};
use crate::preferences::PreferenceStore;
use crate::session::SessionContext;
use crate::store::{ProjectStore, Record};

/// Whether any existing project already uses `name`, ignoring case
pub fn is_duplicate_name(projects: &[Project], name: &str) -> bool {
    projects.iter().any(|p| p.has_name(name))
}

/// Load state of the project list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListStatus {
    Loading,
    /// The initial fetch failed; the list is not known to be empty
    Failed(String),
    Ready,
}

/// State of the "new project" dialog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddDialog {
    pub open: bool,
    /// Message from the last failed submission
    pub error: Option<String>,
}

/// Everything needed to render the project screen
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectView {
    pub status: ListStatus,
    /// Projects on the current page
    pub projects: Vec<Project>,
    pub total: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub view_mode: ViewMode,
    /// Whether the list is receiving live updates
    pub live: bool,
    pub add_dialog: AddDialog,
}

/// Controller for the project screen
pub struct ProjectViewController {
    store: Arc<ProjectStore>,
    session: SessionContext,
    preferences: Arc<dyn PreferenceStore>,
    view_mode_key: String,
    view_mode: ViewMode,
    pagination: Pagination,
    add_dialog: AddDialog,
}

impl std::fmt::Debug for ProjectViewController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectViewController")
            .field("view_mode", &self.view_mode)
            .field("page", &self.pagination.current())
            .field("add_dialog", &self.add_dialog)
            .finish()
    }
}

impl ProjectViewController {
    /// Create the controller, reading the stored view mode once
    pub fn new(
        store: Arc<ProjectStore>,
        session: SessionContext,
        preferences: Arc<dyn PreferenceStore>,
        view_mode_key: impl Into<String>,
    ) -> Self {
        let view_mode_key = view_mode_key.into();
        let view_mode = match preferences.get(&view_mode_key) {
            Ok(stored) => ViewMode::from_stored(stored.as_deref()),
            Err(err) => {
                warn!(key = %view_mode_key, error = %err, "Could not read view mode, using grid");
                ViewMode::default()
            }
        };

        Self {
            store,
            session,
            preferences,
            view_mode_key,
            view_mode,
            pagination: Pagination::new(),
            add_dialog: AddDialog::default(),
        }
    }

    pub fn store(&self) -> &Arc<ProjectStore> {
        &self.store
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    // ========== View state ==========

    /// Derive the current view, clamping the page if the list shrank
    pub fn refresh(&mut self) -> ProjectView {
        let snapshot = self.store.snapshot();
        let before = self.pagination.current();
        if self.pagination.sync(snapshot.len()) {
            debug!(from = before, to = self.pagination.current(), "Clamped current page");
        }

        let status = if snapshot.loading {
            ListStatus::Loading
        } else if let Some(message) = &snapshot.error {
            ListStatus::Failed(message.clone())
        } else {
            ListStatus::Ready
        };

        ProjectView {
            status,
            projects: self.pagination.slice(&snapshot.records).to_vec(),
            total: snapshot.len(),
            current_page: self.pagination.current(),
            total_pages: total_pages(snapshot.len()),
            view_mode: self.view_mode,
            live: snapshot.subscribed,
            add_dialog: self.add_dialog.clone(),
        }
    }

    pub fn current_page(&self) -> usize {
        self.pagination.current()
    }

    /// Move to `page`, bounded by the current list length
    pub fn go_to_page(&mut self, page: usize) -> usize {
        let len = self.store.snapshot().len();
        self.pagination.go_to(page, len)
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    /// Switch layout and persist the choice immediately
    ///
    /// The in-memory mode changes even if persisting fails.
    pub fn set_view_mode(&mut self, mode: ViewMode) -> Result<()> {
        if mode == self.view_mode {
            return Ok(());
        }
        self.view_mode = mode;
        self.preferences
            .set(&self.view_mode_key, mode.as_str())
            .inspect_err(|err| warn!(error = %err, "Could not persist view mode"))
    }

    // ========== Add dialog ==========

    pub fn add_dialog(&self) -> &AddDialog {
        &self.add_dialog
    }

    pub fn open_add_dialog(&mut self) {
        self.add_dialog = AddDialog {
            open: true,
            error: None,
        };
    }

    pub fn close_add_dialog(&mut self) {
        self.add_dialog = AddDialog::default();
    }

    // ========== Actions ==========

    /// Create a project for the session's company
    ///
    /// Identity and name are validated locally before any request is made.
    /// On success the dialog closes; the new project appears once the
    /// store's subscription delivers it. On failure the dialog stays open
    /// with the error message.
    pub async fn add_project(&mut self, name: &str) -> Result<Project> {
        let result = self.create_project(name).await;
        match &result {
            Ok(_) => self.close_add_dialog(),
            Err(err) => self.add_dialog.error = Some(err.to_string()),
        }
        result
    }

    async fn create_project(&self, name: &str) -> Result<Project> {
        let company = self.session.require_company().inspect_err(|_| {
            error!("Cannot add project: no company identity in session");
        })?;

        if name.trim().is_empty() {
            return Err(Error::InvalidInput("project name must not be empty".to_string()));
        }

        // The duplicate check needs this company's list fully loaded
        let snapshot = self.store.snapshot();
        if snapshot.loading
            || snapshot.error.is_some()
            || snapshot.company.as_ref() != Some(&company)
        {
            warn!(company = %company, "Cannot add project: project list is not loaded");
            return Err(Error::NotLoaded(Project::KIND));
        }

        // Checked against the local list only; a concurrent insert from another
        // session is caught by the backend's own constraint, if it has one.
        if is_duplicate_name(&snapshot.records, name) {
            return Err(Error::DuplicateName(name.to_string()));
        }

        let payload = serde_json::to_value(NewProject::new(company.clone(), name))?;
        info!(company = %company, name, "Creating project");

        let row = self
            .store
            .gateway()
            .create(self.store.table(), payload)
            .await
            .inspect_err(|err| error!(company = %company, name, error = %err, "Failed to create project"))?;

        let project = Project::decode(row)?;
        info!(project_id = %project.id, "Project created");
        Ok(project)
    }

    /// Delete one of the company's projects
    ///
    /// Returns how many rows the backend removed. The list itself changes
    /// only through the store's subscription.
    pub async fn delete_project(&self, id: &str) -> Result<u64> {
        let company = self.session.require_company()?;
        let filter = self
            .store
            .scope(&company)
            .and_eq(Project::ID_COLUMN, id);

        let removed = self
            .store
            .gateway()
            .delete(self.store.table(), &filter)
            .await
            .inspect_err(|err| error!(project_id = id, error = %err, "Failed to delete project"))?;

        if removed == 0 {
            warn!(project_id = id, company = %company, "Project to delete was not found");
        } else {
            info!(project_id = id, "Project deleted");
        }
        Ok(removed)
    }
}
