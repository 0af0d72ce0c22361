//! Document database operations

use chrono::NaiveDate;
use jmon_common::models::Document;
use jmon_common::time::parse_date;
use jmon_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use crate::models::DocumentRecord;

const SELECT_DOCUMENT: &str = r#"
    SELECT id, document_id, action_ref, name, document_date, publication_date,
           download_url, local_path
    FROM documents
"#;

/// Download URL for a document, derived from its id alone
pub fn document_download_url(base_url: &str, document_id: &str) -> String {
    format!("{}/Descarga/Documento/{}", base_url.trim_end_matches('/'), document_id)
}

/// Normalized row for first insertion
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub document_id: String,
    pub action_ref: i64,
    pub name: Option<String>,
    pub document_date: Option<NaiveDate>,
    pub publication_date: Option<NaiveDate>,
    pub download_url: String,
}

impl NewDocument {
    /// Any URL carried by the record is ignored
    pub fn from_record(document_id: &str, action_ref: i64, record: &DocumentRecord, base_url: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            action_ref,
            name: record.name.clone(),
            document_date: parse_date(record.document_date.as_deref()),
            publication_date: parse_date(record.publication_date.as_deref()),
            download_url: document_download_url(base_url, document_id),
        }
    }
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    Ok(Document {
        id: row.try_get("id")?,
        document_id: row.try_get("document_id")?,
        action_ref: row.try_get("action_ref")?,
        name: row.try_get("name")?,
        document_date: row.try_get("document_date")?,
        publication_date: row.try_get("publication_date")?,
        download_url: row.try_get("download_url")?,
        local_path: row.try_get("local_path")?,
    })
}

pub async fn find_by_document_id<'e, E>(executor: E, document_id: &str) -> Result<Option<Document>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("{} WHERE document_id = ?", SELECT_DOCUMENT))
        .bind(document_id)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(document_from_row).transpose()
}

pub async fn list_for_action<'e, E>(executor: E, action_ref: i64) -> Result<Vec<Document>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!("{} WHERE action_ref = ? ORDER BY id", SELECT_DOCUMENT))
        .bind(action_ref)
        .fetch_all(executor)
        .await?;

    rows.iter().map(document_from_row).collect()
}

/// Insert unless the document id already exists; returns whether a row was written
pub async fn insert_document<'e, E>(executor: E, document: &NewDocument) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO documents (
            document_id, action_ref, name, document_date, publication_date, download_url
        ) VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(document_id) DO NOTHING
        "#,
    )
    .bind(&document.document_id)
    .bind(document.action_ref)
    .bind(&document.name)
    .bind(document.document_date)
    .bind(document.publication_date)
    .bind(&document.download_url)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_local_path<'e, E>(executor: E, document_id: &str, local_path: &str) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE documents SET local_path = ? WHERE document_id = ?")
        .bind(local_path)
        .bind(document_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
