//! Ingestion & persistence coordinator
//!
//! Maps registry records into store rows. Each operation runs in its own
//! transaction and returns the rows as they read after the write.
//!
//! Upsert semantics are deliberately asymmetric:
//! - a process that already exists only gets its last action date and fetch
//!   timestamp refreshed; every other listing field keeps its first value
//! - actions and documents that already exist are returned untouched
//! - detail, summary and classification attachments overwrite their fields
//!
//! A missing parent (process for actions, action for documents and
//! classification) is reported as [`IngestOutcome::ParentNotFound`] so a caller
//! iterating many records is not aborted by one bad reference.
//!
//! Two concurrent callers can both miss the existence check for the same
//! external id. Inserts use `ON CONFLICT DO NOTHING`; the loser re-reads the
//! winner's row and continues as if it had already existed. A transaction whose
//! snapshot went stale before its first write fails with a lock error instead;
//! every write operation is retried whole through [`retry_on_lock`], and the
//! retry then takes the "already exists" path.

use jmon_common::db::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use jmon_common::models::{Action, Classification, Document, Party, PartyHint, Process};
use jmon_common::time::{now, parse_date};
use jmon_common::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use std::fmt;
use tracing::{debug, info, warn};

use crate::db::actions::{self, NewAction};
use crate::db::documents::{self, NewDocument};
use crate::db::parties;
use crate::db::processes::{self, NewProcess};
use crate::models::{ActionRecord, DocumentRecord, ProcessDetailRecord, ProcessRecord};

/// Stored entity kinds, for parent-miss reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Process,
    Action,
    Document,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Process => "process",
            EntityKind::Action => "action",
            EntityKind::Document => "document",
        })
    }
}

/// Result of a coordinator write that depends on an existing row
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome<T> {
    Applied(T),
    /// The referenced row is not stored; nothing was written
    ParentNotFound { kind: EntityKind, external_id: String },
}

impl<T> IngestOutcome<T> {
    fn parent_missing(kind: EntityKind, external_id: &str, operation: &str) -> Self {
        warn!(kind = %kind, external_id = %external_id, operation = operation, "Referenced row not found, nothing stored");
        IngestOutcome::ParentNotFound {
            kind,
            external_id: external_id.to_string(),
        }
    }

    pub fn applied(self) -> Option<T> {
        match self {
            IngestOutcome::Applied(value) => Some(value),
            IngestOutcome::ParentNotFound { .. } => None,
        }
    }

    pub fn is_parent_not_found(&self) -> bool {
        matches!(self, IngestOutcome::ParentNotFound { .. })
    }
}

/// Writes registry data into the relational store
#[derive(Clone)]
pub struct IngestionCoordinator {
    pool: SqlitePool,
    registry_base_url: String,
}

impl IngestionCoordinator {
    /// `registry_base_url` is the base for derived document download URLs
    pub fn new(pool: SqlitePool, registry_base_url: impl Into<String>) -> Self {
        Self {
            pool,
            registry_base_url: registry_base_url.into(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Find or create the party a hint describes
    ///
    /// Lookup order: nit (when the hint has a non-blank one), then exact name.
    /// A name match without a nit gets the hint's nit backfilled.
    pub async fn resolve_party(&self, hint: &PartyHint) -> Result<Party> {
        retry_on_lock("resolve_party", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.try_resolve_party(hint)
        })
        .await
    }

    /// Create or partially refresh a process from a search listing
    pub async fn upsert_process(&self, record: &ProcessRecord, hint: Option<&PartyHint>) -> Result<Process> {
        retry_on_lock("upsert_process", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.try_upsert_process(record, hint)
        })
        .await
    }

    /// Overwrite a stored process's detail fields
    pub async fn upsert_process_detail(
        &self,
        process_id: &str,
        detail: &ProcessDetailRecord,
    ) -> Result<IngestOutcome<Process>> {
        retry_on_lock("upsert_process_detail", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.try_upsert_process_detail(process_id, detail)
        })
        .await
    }

    /// Replace a stored process's summary
    pub async fn attach_summary(&self, process_id: &str, summary: &str) -> Result<IngestOutcome<Process>> {
        retry_on_lock("attach_summary", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.try_attach_summary(process_id, summary)
        })
        .await
    }

    /// Insert the actions not yet stored for a process
    ///
    /// Returns one row per input record that carries an action id, in input
    /// order; existing rows come back unchanged.
    pub async fn upsert_actions(
        &self,
        process_id: &str,
        records: &[ActionRecord],
    ) -> Result<IngestOutcome<Vec<Action>>> {
        retry_on_lock("upsert_actions", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.try_upsert_actions(process_id, records)
        })
        .await
    }

    /// Overwrite an action's classification fields
    pub async fn attach_classification(
        &self,
        action_id: &str,
        classification: &Classification,
    ) -> Result<IngestOutcome<Action>> {
        retry_on_lock("attach_classification", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.try_attach_classification(action_id, classification)
        })
        .await
    }

    /// Insert the documents not yet stored for an action
    ///
    /// Same shape as [`Self::upsert_actions`]. New rows get a download URL derived
    /// from the document id.
    pub async fn upsert_documents(
        &self,
        action_id: &str,
        records: &[DocumentRecord],
    ) -> Result<IngestOutcome<Vec<Document>>> {
        retry_on_lock("upsert_documents", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.try_upsert_documents(action_id, records)
        })
        .await
    }

    /// Record where a downloaded document was written
    pub async fn record_local_path(&self, document_id: &str, local_path: &str) -> Result<IngestOutcome<Document>> {
        retry_on_lock("record_local_path", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.try_record_local_path(document_id, local_path)
        })
        .await
    }

    async fn try_resolve_party(&self, hint: &PartyHint) -> Result<Party> {
        let mut tx = self.pool.begin().await?;
        let party = resolve_party_in(&mut tx, hint).await?;
        tx.commit().await?;
        Ok(party)
    }

    async fn try_upsert_process(&self, record: &ProcessRecord, hint: Option<&PartyHint>) -> Result<Process> {
        let process_id = record
            .process_id
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("Process record has no idProceso".to_string()))?;
        let fetched_at = now();
        let last_action_date = parse_date(record.last_action_date.as_deref());

        let mut tx = self.pool.begin().await?;

        if processes::find_by_process_id(&mut *tx, process_id).await?.is_some() {
            info!(process_id = %process_id, "Updating existing process");
            processes::refresh_listing(&mut *tx, process_id, last_action_date, fetched_at).await?;
        } else {
            let party_ref = match hint {
                Some(hint) => Some(resolve_party_in(&mut tx, hint).await?.id),
                None => None,
            };

            let new_process = NewProcess::from_record(process_id, record, party_ref, fetched_at);
            if processes::insert_process(&mut *tx, &new_process).await? {
                info!(process_id = %process_id, party_ref = ?party_ref, "Created new process");
            } else {
                warn!(process_id = %process_id, "Process inserted concurrently, applying listing refresh");
                processes::refresh_listing(&mut *tx, process_id, last_action_date, fetched_at).await?;
            }
        }

        let process = processes::find_by_process_id(&mut *tx, process_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Process {} vanished after upsert", process_id)))?;
        tx.commit().await?;

        Ok(process)
    }

    async fn try_upsert_process_detail(
        &self,
        process_id: &str,
        detail: &ProcessDetailRecord,
    ) -> Result<IngestOutcome<Process>> {
        let mut tx = self.pool.begin().await?;

        if processes::update_detail(&mut *tx, process_id, detail).await? == 0 {
            return Ok(IngestOutcome::parent_missing(EntityKind::Process, process_id, "upsert_process_detail"));
        }

        let process = reread_process(&mut tx, process_id).await?;
        tx.commit().await?;

        debug!(process_id = %process_id, "Stored process detail");
        Ok(IngestOutcome::Applied(process))
    }

    async fn try_attach_summary(&self, process_id: &str, summary: &str) -> Result<IngestOutcome<Process>> {
        let mut tx = self.pool.begin().await?;

        if processes::set_summary(&mut *tx, process_id, summary).await? == 0 {
            return Ok(IngestOutcome::parent_missing(EntityKind::Process, process_id, "attach_summary"));
        }

        let process = reread_process(&mut tx, process_id).await?;
        tx.commit().await?;

        debug!(process_id = %process_id, "Stored process summary");
        Ok(IngestOutcome::Applied(process))
    }

    async fn try_upsert_actions(
        &self,
        process_id: &str,
        records: &[ActionRecord],
    ) -> Result<IngestOutcome<Vec<Action>>> {
        let mut tx = self.pool.begin().await?;

        let Some(process) = processes::find_by_process_id(&mut *tx, process_id).await? else {
            return Ok(IngestOutcome::parent_missing(EntityKind::Process, process_id, "upsert_actions"));
        };

        let mut stored = Vec::with_capacity(records.len());
        let mut created = 0usize;

        for record in records {
            let Some(action_id) = record.action_id.as_deref() else {
                warn!(process_id = %process_id, label = ?record.label, "Skipping action without idRegActuacion");
                continue;
            };

            if let Some(existing) = actions::find_by_action_id(&mut *tx, action_id).await? {
                stored.push(existing);
                continue;
            }

            let new_action = NewAction::from_record(action_id, process.id, record);
            if actions::insert_action(&mut *tx, &new_action).await? {
                created += 1;
            }

            let action = actions::find_by_action_id(&mut *tx, action_id)
                .await?
                .ok_or_else(|| Error::Internal(format!("Action {} vanished after insert", action_id)))?;
            stored.push(action);
        }

        tx.commit().await?;

        info!(
            process_id = %process_id,
            received = records.len(),
            created = created,
            "Stored actions"
        );
        Ok(IngestOutcome::Applied(stored))
    }

    async fn try_attach_classification(
        &self,
        action_id: &str,
        classification: &Classification,
    ) -> Result<IngestOutcome<Action>> {
        let mut tx = self.pool.begin().await?;

        if actions::set_classification(&mut *tx, action_id, classification).await? == 0 {
            return Ok(IngestOutcome::parent_missing(EntityKind::Action, action_id, "attach_classification"));
        }

        let action = actions::find_by_action_id(&mut *tx, action_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Action {} vanished after update", action_id)))?;
        tx.commit().await?;

        debug!(action_id = %action_id, urgency = %classification.urgency, "Stored classification");
        Ok(IngestOutcome::Applied(action))
    }

    async fn try_upsert_documents(
        &self,
        action_id: &str,
        records: &[DocumentRecord],
    ) -> Result<IngestOutcome<Vec<Document>>> {
        let mut tx = self.pool.begin().await?;

        let Some(action) = actions::find_by_action_id(&mut *tx, action_id).await? else {
            return Ok(IngestOutcome::parent_missing(EntityKind::Action, action_id, "upsert_documents"));
        };

        let mut stored = Vec::with_capacity(records.len());
        let mut created = 0usize;

        for record in records {
            let Some(document_id) = record.document_id.as_deref() else {
                warn!(action_id = %action_id, name = ?record.name, "Skipping document without idRegDocumento");
                continue;
            };

            if let Some(existing) = documents::find_by_document_id(&mut *tx, document_id).await? {
                stored.push(existing);
                continue;
            }

            let new_document = NewDocument::from_record(document_id, action.id, record, &self.registry_base_url);
            if documents::insert_document(&mut *tx, &new_document).await? {
                created += 1;
            }

            let document = documents::find_by_document_id(&mut *tx, document_id)
                .await?
                .ok_or_else(|| Error::Internal(format!("Document {} vanished after insert", document_id)))?;
            stored.push(document);
        }

        tx.commit().await?;

        info!(
            action_id = %action_id,
            received = records.len(),
            created = created,
            "Stored documents"
        );
        Ok(IngestOutcome::Applied(stored))
    }

    async fn try_record_local_path(&self, document_id: &str, local_path: &str) -> Result<IngestOutcome<Document>> {
        let mut tx = self.pool.begin().await?;

        if documents::set_local_path(&mut *tx, document_id, local_path).await? == 0 {
            return Ok(IngestOutcome::parent_missing(EntityKind::Document, document_id, "record_local_path"));
        }

        let document = documents::find_by_document_id(&mut *tx, document_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Document {} vanished after update", document_id)))?;
        tx.commit().await?;

        Ok(IngestOutcome::Applied(document))
    }

    pub async fn find_process(&self, process_id: &str) -> Result<Option<Process>> {
        processes::find_by_process_id(&self.pool, process_id).await
    }

    pub async fn find_action(&self, action_id: &str) -> Result<Option<Action>> {
        actions::find_by_action_id(&self.pool, action_id).await
    }

    pub async fn find_document(&self, document_id: &str) -> Result<Option<Document>> {
        documents::find_by_document_id(&self.pool, document_id).await
    }

    pub async fn find_party_by_nit(&self, nit: &str) -> Result<Option<Party>> {
        parties::find_by_nit(&self.pool, nit).await
    }

    /// Processes linked to a party (store id)
    pub async fn processes_for_party(&self, party_id: i64) -> Result<Vec<Process>> {
        processes::list_for_party(&self.pool, party_id).await
    }

    /// Actions of a process (store id)
    pub async fn actions_for_process(&self, process_ref: i64) -> Result<Vec<Action>> {
        actions::list_for_process(&self.pool, process_ref).await
    }

    /// Documents of an action (store id)
    pub async fn documents_for_action(&self, action_ref: i64) -> Result<Vec<Document>> {
        documents::list_for_action(&self.pool, action_ref).await
    }
}

async fn reread_process(conn: &mut SqliteConnection, process_id: &str) -> Result<Process> {
    processes::find_by_process_id(&mut *conn, process_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Process {} vanished after update", process_id)))
}

async fn resolve_party_in(conn: &mut SqliteConnection, hint: &PartyHint) -> Result<Party> {
    let nit = hint.usable_nit();

    if let Some(nit) = nit {
        if let Some(party) = parties::find_by_nit(&mut *conn, nit).await? {
            return Ok(party);
        }
    }

    if let Some(mut party) = parties::find_by_name(&mut *conn, &hint.name).await? {
        if let Some(nit) = nit.filter(|_| party.nit.is_none()) {
            if parties::backfill_nit(&mut *conn, party.id, nit).await? {
                info!(party_id = party.id, nit = %nit, "Backfilled party nit");
                party.nit = Some(nit.to_string());
            }
        }
        return Ok(party);
    }

    match parties::insert_party(&mut *conn, hint, now()).await? {
        Some(id) => {
            info!(party_id = id, name = %hint.name, "Created new party");
            parties::find_by_id(&mut *conn, id)
                .await?
                .ok_or_else(|| Error::Internal(format!("Party {} vanished after insert", id)))
        }
        None => {
            let nit = nit.unwrap_or_default();
            warn!(nit = %nit, "Party inserted concurrently, re-reading");
            parties::find_by_nit(&mut *conn, nit)
                .await?
                .ok_or_else(|| Error::Internal(format!("Party with nit {} not found after conflict", nit)))
        }
    }
}
