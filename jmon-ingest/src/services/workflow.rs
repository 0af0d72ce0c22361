//! Monitoring workflow
//!
//! Strings registry fetches, the engines and the coordinator together, one
//! request at a time. Each call runs to completion before returning; registry
//! failures surface as [`crate::error::WorkflowError::Registry`] without retries.

use jmon_common::models::{Action, Classification, Document, PartyHint, Process};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::WorkflowResult;
use crate::models::{ActionRecord, DocumentRecord, NameQuery, NumberQuery, ProcessDetailRecord, SearchResponse};
use crate::services::classifier::Classifier;
use crate::services::engines::Engines;
use crate::services::ingestion::{IngestOutcome, IngestionCoordinator};
use crate::services::registry_client::JudicialRegistry;
use crate::services::summarizer::Summarizer;

/// One search page and what was stored from it
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub response: SearchResponse,
    pub stored: Vec<Process>,
    /// Listed processes without an id
    pub skipped: usize,
}

/// Every page walked by an all-pages search
#[derive(Debug, Clone, Default)]
pub struct PagedSearchOutcome {
    pub pages_fetched: u32,
    pub stored: Vec<Process>,
    pub skipped: usize,
}

/// One fetched action with the classification attached to it
#[derive(Debug, Clone)]
pub struct ClassifiedAction {
    pub record: ActionRecord,
    pub classification: Classification,
}

/// Result of refreshing one process
#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub detail: ProcessDetailRecord,
    pub summary: String,
    pub actions: Vec<ClassifiedAction>,
    /// Stored process after all writes
    pub process: Option<Process>,
    /// Stored actions with their classification, in registry order
    pub stored_actions: Vec<Action>,
    /// The process is not stored, so nothing was written
    pub process_missing: bool,
}

/// Result of refreshing one action's documents
#[derive(Debug, Clone)]
pub struct DocumentsReport {
    pub documents: Vec<DocumentRecord>,
    pub stored: Vec<Document>,
    /// The action is not stored, so nothing was written
    pub action_missing: bool,
}

pub struct MonitorWorkflow {
    registry: Arc<dyn JudicialRegistry>,
    coordinator: IngestionCoordinator,
    classifier: Arc<dyn Classifier>,
    summarizer: Arc<dyn Summarizer>,
    max_pages: u32,
}

impl MonitorWorkflow {
    pub fn new(
        registry: Arc<dyn JudicialRegistry>,
        coordinator: IngestionCoordinator,
        engines: Engines,
        max_pages: u32,
    ) -> Self {
        Self {
            registry,
            coordinator,
            classifier: engines.classifier,
            summarizer: engines.summarizer,
            max_pages: max_pages.max(1),
        }
    }

    pub fn coordinator(&self) -> &IngestionCoordinator {
        &self.coordinator
    }

    /// Search by party name and store every listed process linked to that party
    pub async fn search_by_name(&self, query: &NameQuery) -> WorkflowResult<SearchOutcome> {
        let response = self.registry.search_by_name(query).await?;
        let hint = PartyHint::new(query.name.clone(), query.person_type);
        self.store_listing(response, Some(&hint)).await
    }

    /// Search by registration number and store every listed process
    pub async fn search_by_number(&self, query: &NumberQuery) -> WorkflowResult<SearchOutcome> {
        let response = self.registry.search_by_number(query).await?;
        self.store_listing(response, None).await
    }

    /// Walk a name search page by page from `query.page`
    ///
    /// Stops on an empty page, on the registry's last page, or after the
    /// configured page cap.
    pub async fn search_by_name_all_pages(&self, query: &NameQuery) -> WorkflowResult<PagedSearchOutcome> {
        let mut outcome = PagedSearchOutcome::default();
        let mut page_query = query.clone();

        loop {
            if outcome.pages_fetched >= self.max_pages {
                warn!(name = %query.name, max_pages = self.max_pages, "Stopped name search at page cap");
                break;
            }

            let page = self.search_by_name(&page_query).await?;
            outcome.pages_fetched += 1;

            if page.response.processes.is_empty() {
                break;
            }
            outcome.stored.extend(page.stored);
            outcome.skipped += page.skipped;

            let total_pages = page.response.pagination.as_ref().and_then(|p| p.total_pages);
            if matches!(total_pages, Some(total) if i64::from(page_query.page) >= total) {
                break;
            }
            page_query.page += 1;
        }

        info!(
            name = %query.name,
            pages = outcome.pages_fetched,
            processes = outcome.stored.len(),
            "Paged name search completed"
        );
        Ok(outcome)
    }

    async fn store_listing(&self, response: SearchResponse, hint: Option<&PartyHint>) -> WorkflowResult<SearchOutcome> {
        let mut stored = Vec::with_capacity(response.processes.len());
        let mut skipped = 0;

        for record in &response.processes {
            if record.process_id.is_none() {
                warn!(process_key = ?record.process_key, "Skipping listed process without idProceso");
                skipped += 1;
                continue;
            }
            stored.push(self.coordinator.upsert_process(record, hint).await?);
        }

        Ok(SearchOutcome {
            response,
            stored,
            skipped,
        })
    }

    /// Fetch detail and actions, then store, summarize and classify
    ///
    /// A process not stored yet is still summarized and classified, but nothing
    /// is written; it has to come in through a search first so that its party
    /// link is set.
    pub async fn refresh_process(&self, process_id: &str) -> WorkflowResult<ProcessReport> {
        let detail = self.registry.process_detail(process_id).await?;
        let actions = self.registry.process_actions(process_id).await?.actions;

        let process_missing = self
            .coordinator
            .upsert_process_detail(process_id, &detail)
            .await?
            .is_parent_not_found();
        if !process_missing {
            self.coordinator.upsert_actions(process_id, &actions).await?;
        }

        let summary = self.summarizer.summarize(&detail, &actions).await;
        let process = if process_missing {
            None
        } else {
            self.coordinator.attach_summary(process_id, &summary).await?.applied()
        };

        let mut classified = Vec::with_capacity(actions.len());
        let mut stored_actions = Vec::with_capacity(actions.len());
        for record in actions {
            let classification = self.classifier.classify(&record).await;
            if let Some(action_id) = record.action_id.as_deref().filter(|_| !process_missing) {
                let outcome = self.coordinator.attach_classification(action_id, &classification).await?;
                stored_actions.extend(outcome.applied());
            }
            classified.push(ClassifiedAction { record, classification });
        }

        info!(
            process_id = %process_id,
            actions = classified.len(),
            stored = !process_missing,
            classifier = self.classifier.name(),
            summarizer = self.summarizer.name(),
            "Process refreshed"
        );

        Ok(ProcessReport {
            detail,
            summary,
            actions: classified,
            process,
            stored_actions,
            process_missing,
        })
    }

    /// Fetch and store the documents of a stored action
    pub async fn refresh_action_documents(&self, action_id: &str) -> WorkflowResult<DocumentsReport> {
        let documents = self.registry.action_documents(action_id).await?.documents;

        let (stored, action_missing) = match self.coordinator.upsert_documents(action_id, &documents).await? {
            IngestOutcome::Applied(stored) => (stored, false),
            IngestOutcome::ParentNotFound { .. } => (Vec::new(), true),
        };

        Ok(DocumentsReport {
            documents,
            stored,
            action_missing,
        })
    }

    /// Download a document to `<dir>/<document_id>.pdf` and record the path
    pub async fn download_document(&self, document_id: &str, dir: &Path) -> WorkflowResult<PathBuf> {
        let bytes = self.registry.download_document(document_id).await?;

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}.pdf", file_stem(document_id)));
        tokio::fs::write(&path, &bytes).await?;

        let local_path = path.to_string_lossy();
        if self.coordinator.record_local_path(document_id, &local_path).await?.is_parent_not_found() {
            warn!(document_id = %document_id, "Document saved but not stored, local path not recorded");
        }

        info!(document_id = %document_id, path = %path.display(), bytes = bytes.len(), "Saved document");
        Ok(path)
    }
}

/// Document id made safe for use as a file name
fn file_stem(document_id: &str) -> String {
    document_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
