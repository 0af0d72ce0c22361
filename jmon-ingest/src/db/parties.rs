//! Party database operations

use chrono::{DateTime, Utc};
use jmon_common::models::{Party, PartyHint};
use jmon_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

const SELECT_PARTY: &str = "SELECT id, nit, name, person_type, created_at FROM parties";

fn party_from_row(row: &SqliteRow) -> Result<Party> {
    let person_type: String = row.try_get("person_type")?;

    Ok(Party {
        id: row.try_get("id")?,
        nit: row.try_get("nit")?,
        name: row.try_get("name")?,
        person_type: person_type.parse()?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Party>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_PARTY))
        .bind(id)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(party_from_row).transpose()
}

pub async fn find_by_nit<'e, E>(executor: E, nit: &str) -> Result<Option<Party>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("{} WHERE nit = ?", SELECT_PARTY))
        .bind(nit)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(party_from_row).transpose()
}

/// Oldest party with exactly this name
pub async fn find_by_name<'e, E>(executor: E, name: &str) -> Result<Option<Party>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("{} WHERE name = ? ORDER BY id LIMIT 1", SELECT_PARTY))
        .bind(name)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(party_from_row).transpose()
}

/// Insert a party from a hint
///
/// Returns the new row id, or `None` when another party already holds the nit.
pub async fn insert_party<'e, E>(executor: E, hint: &PartyHint, created_at: DateTime<Utc>) -> Result<Option<i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO parties (nit, name, person_type, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(nit) DO NOTHING
        "#,
    )
    .bind(hint.usable_nit())
    .bind(&hint.name)
    .bind(hint.person_type.code())
    .bind(created_at)
    .execute(executor)
    .await?;

    Ok((result.rows_affected() > 0).then(|| result.last_insert_rowid()))
}

/// Set the nit of a party that has none
pub async fn backfill_nit<'e, E>(executor: E, id: i64, nit: &str) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE parties SET nit = ? WHERE id = ? AND nit IS NULL")
        .bind(nit)
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}
