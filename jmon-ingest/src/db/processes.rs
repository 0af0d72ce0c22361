//! Process database operations

use chrono::{DateTime, NaiveDate, Utc};
use jmon_common::models::Process;
use jmon_common::time::parse_date;
use jmon_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use crate::models::{ProcessDetailRecord, ProcessRecord};

const SELECT_PROCESS: &str = r#"
    SELECT id, process_id, process_key, filing_date, last_action_date, office, department,
           parties_summary, process_class, process_type, process_subtype, file_location,
           is_private, claimants, respondents, summary, fetched_at, party_ref
    FROM processes
"#;

/// Normalized row for first insertion from a search listing
#[derive(Debug, Clone)]
pub struct NewProcess {
    pub process_id: String,
    pub process_key: Option<String>,
    pub filing_date: Option<NaiveDate>,
    pub last_action_date: Option<NaiveDate>,
    pub office: Option<String>,
    pub department: Option<String>,
    pub parties_summary: Option<String>,
    pub is_private: bool,
    pub fetched_at: DateTime<Utc>,
    pub party_ref: Option<i64>,
}

impl NewProcess {
    pub fn from_record(
        process_id: &str,
        record: &ProcessRecord,
        party_ref: Option<i64>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            process_id: process_id.to_string(),
            process_key: record.process_key.clone(),
            filing_date: parse_date(record.filing_date.as_deref()),
            last_action_date: parse_date(record.last_action_date.as_deref()),
            office: record.office.clone(),
            department: record.department.clone(),
            parties_summary: record.parties_summary.clone(),
            is_private: record.is_private.unwrap_or(false),
            fetched_at,
            party_ref,
        }
    }
}

fn encode_names(names: Option<&Vec<String>>) -> Result<Option<String>> {
    Ok(names.map(serde_json::to_string).transpose()?)
}

fn decode_names(raw: Option<String>) -> Result<Option<Vec<String>>> {
    Ok(raw.as_deref().map(serde_json::from_str).transpose()?)
}

fn process_from_row(row: &SqliteRow) -> Result<Process> {
    Ok(Process {
        id: row.try_get("id")?,
        process_id: row.try_get("process_id")?,
        process_key: row.try_get("process_key")?,
        filing_date: row.try_get("filing_date")?,
        last_action_date: row.try_get("last_action_date")?,
        office: row.try_get("office")?,
        department: row.try_get("department")?,
        parties_summary: row.try_get("parties_summary")?,
        process_class: row.try_get("process_class")?,
        process_type: row.try_get("process_type")?,
        process_subtype: row.try_get("process_subtype")?,
        file_location: row.try_get("file_location")?,
        is_private: row.try_get("is_private")?,
        claimants: decode_names(row.try_get("claimants")?)?,
        respondents: decode_names(row.try_get("respondents")?)?,
        summary: row.try_get("summary")?,
        fetched_at: row.try_get("fetched_at")?,
        party_ref: row.try_get("party_ref")?,
    })
}

pub async fn find_by_process_id<'e, E>(executor: E, process_id: &str) -> Result<Option<Process>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("{} WHERE process_id = ?", SELECT_PROCESS))
        .bind(process_id)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(process_from_row).transpose()
}

pub async fn list_for_party<'e, E>(executor: E, party_id: i64) -> Result<Vec<Process>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!("{} WHERE party_ref = ? ORDER BY id", SELECT_PROCESS))
        .bind(party_id)
        .fetch_all(executor)
        .await?;

    rows.iter().map(process_from_row).collect()
}

/// Insert unless the process id already exists; returns whether a row was written
pub async fn insert_process<'e, E>(executor: E, process: &NewProcess) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO processes (
            process_id, process_key, filing_date, last_action_date, office, department,
            parties_summary, is_private, fetched_at, party_ref
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(process_id) DO NOTHING
        "#,
    )
    .bind(&process.process_id)
    .bind(&process.process_key)
    .bind(process.filing_date)
    .bind(process.last_action_date)
    .bind(&process.office)
    .bind(&process.department)
    .bind(&process.parties_summary)
    .bind(process.is_private)
    .bind(process.fetched_at)
    .bind(process.party_ref)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Partial update applied when a listed process is already stored
///
/// Only the last action date (when the listing carries a parseable one) and the
/// fetch timestamp change; everything else keeps its first-insert value.
pub async fn refresh_listing<'e, E>(
    executor: E,
    process_id: &str,
    last_action_date: Option<NaiveDate>,
    fetched_at: DateTime<Utc>,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE processes
        SET last_action_date = COALESCE(?, last_action_date),
            fetched_at = ?
        WHERE process_id = ?
        "#,
    )
    .bind(last_action_date)
    .bind(fetched_at)
    .bind(process_id)
    .execute(executor)
    .await?;

    Ok(())
}

/// Overwrite the detail fields
pub async fn update_detail<'e, E>(
    executor: E,
    process_id: &str,
    detail: &ProcessDetailRecord,
) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE processes
        SET process_class = ?,
            process_type = ?,
            process_subtype = ?,
            file_location = ?,
            is_private = ?,
            claimants = ?,
            respondents = ?
        WHERE process_id = ?
        "#,
    )
    .bind(&detail.process_class)
    .bind(&detail.process_type)
    .bind(&detail.process_subtype)
    .bind(&detail.file_location)
    .bind(detail.is_private.unwrap_or(false))
    .bind(encode_names(detail.claimants.as_ref())?)
    .bind(encode_names(detail.respondents.as_ref())?)
    .bind(process_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn set_summary<'e, E>(executor: E, process_id: &str, summary: &str) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE processes SET summary = ? WHERE process_id = ?")
        .bind(summary)
        .bind(process_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
