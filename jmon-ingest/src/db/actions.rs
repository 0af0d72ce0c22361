//! Action database operations

use chrono::NaiveDate;
use jmon_common::models::{Action, Classification, UrgencyTier};
use jmon_common::time::parse_date;
use jmon_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use crate::models::ActionRecord;

const SELECT_ACTION: &str = r#"
    SELECT id, action_id, process_ref, sequence, action_date, label, annotation,
           initial_date, final_date, registration_date, has_documents,
           urgency, category, action_required, justification
    FROM actions
"#;

/// Normalized row for first insertion
#[derive(Debug, Clone)]
pub struct NewAction {
    pub action_id: String,
    pub process_ref: i64,
    pub sequence: Option<i64>,
    pub action_date: Option<NaiveDate>,
    pub label: Option<String>,
    pub annotation: Option<String>,
    pub initial_date: Option<NaiveDate>,
    pub final_date: Option<NaiveDate>,
    pub registration_date: Option<NaiveDate>,
    pub has_documents: bool,
}

impl NewAction {
    pub fn from_record(action_id: &str, process_ref: i64, record: &ActionRecord) -> Self {
        Self {
            action_id: action_id.to_string(),
            process_ref,
            sequence: record.sequence,
            action_date: parse_date(record.action_date.as_deref()),
            label: record.label.clone(),
            annotation: record.annotation.clone(),
            initial_date: parse_date(record.initial_date.as_deref()),
            final_date: parse_date(record.final_date.as_deref()),
            registration_date: parse_date(record.registration_date.as_deref()),
            has_documents: record.has_documents.unwrap_or(false),
        }
    }
}

fn action_from_row(row: &SqliteRow) -> Result<Action> {
    let urgency: Option<String> = row.try_get("urgency")?;

    Ok(Action {
        id: row.try_get("id")?,
        action_id: row.try_get("action_id")?,
        process_ref: row.try_get("process_ref")?,
        sequence: row.try_get("sequence")?,
        action_date: row.try_get("action_date")?,
        label: row.try_get("label")?,
        annotation: row.try_get("annotation")?,
        initial_date: row.try_get("initial_date")?,
        final_date: row.try_get("final_date")?,
        registration_date: row.try_get("registration_date")?,
        has_documents: row.try_get("has_documents")?,
        urgency: urgency.as_deref().map(str::parse::<UrgencyTier>).transpose()?,
        category: row.try_get("category")?,
        action_required: row.try_get("action_required")?,
        justification: row.try_get("justification")?,
    })
}

pub async fn find_by_action_id<'e, E>(executor: E, action_id: &str) -> Result<Option<Action>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("{} WHERE action_id = ?", SELECT_ACTION))
        .bind(action_id)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(action_from_row).transpose()
}

/// Actions of one process, in insertion order
pub async fn list_for_process<'e, E>(executor: E, process_ref: i64) -> Result<Vec<Action>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!("{} WHERE process_ref = ? ORDER BY id", SELECT_ACTION))
        .bind(process_ref)
        .fetch_all(executor)
        .await?;

    rows.iter().map(action_from_row).collect()
}

/// Insert unless the action id already exists; returns whether a row was written
pub async fn insert_action<'e, E>(executor: E, action: &NewAction) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO actions (
            action_id, process_ref, sequence, action_date, label, annotation,
            initial_date, final_date, registration_date, has_documents
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(action_id) DO NOTHING
        "#,
    )
    .bind(&action.action_id)
    .bind(action.process_ref)
    .bind(action.sequence)
    .bind(action.action_date)
    .bind(&action.label)
    .bind(&action.annotation)
    .bind(action.initial_date)
    .bind(action.final_date)
    .bind(action.registration_date)
    .bind(action.has_documents)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Overwrite the four classification fields
pub async fn set_classification<'e, E>(executor: E, action_id: &str, classification: &Classification) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE actions
        SET urgency = ?, category = ?, action_required = ?, justification = ?
        WHERE action_id = ?
        "#,
    )
    .bind(classification.urgency.as_str())
    .bind(&classification.category)
    .bind(classification.action_required)
    .bind(&classification.justification)
    .bind(action_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}
