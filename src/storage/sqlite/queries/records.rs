use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

const UPSERT_SQL: &str = r#"
INSERT INTO records (key, value)
VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value=excluded.value
"#;

/// One pending write: the key and its JSON-encoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOp {
    pub key: String,
    pub value: String,
}

pub fn put(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(UPSERT_SQL, params![key, value])
        .with_context(|| format!("Failed to put record: {key}"))?;
    Ok(())
}

/// Writes all of `ops` in one transaction. Later ops win over earlier ops
/// with the same key.
pub fn batch_put(conn: &mut Connection, ops: &[PutOp]) -> Result<()> {
    let tx = conn
        .transaction()
        .context("Failed to begin batch transaction")?;
    {
        let mut stmt = tx
            .prepare_cached(UPSERT_SQL)
            .context("Failed to prepare batch put")?;
        for op in ops {
            stmt.execute(params![op.key, op.value])
                .with_context(|| format!("Failed to put record: {}", op.key))?;
        }
    }
    tx.commit().context("Failed to commit batch")?;
    Ok(())
}

pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM records WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("Failed to get record: {key}"))
}

/// Streams every `(key, value)` with `low <= key < high` in key order.
pub fn scan_range<F>(conn: &Connection, low: &str, high: &str, mut visit: F) -> Result<()>
where
    F: FnMut(&str, &str) -> Result<()>,
{
    let mut stmt = conn
        .prepare_cached("SELECT key, value FROM records WHERE key >= ?1 AND key < ?2 ORDER BY key")
        .context("Failed to prepare range scan")?;
    let mut rows = stmt
        .query(params![low, high])
        .with_context(|| format!("Failed to scan range [{low}, {high})"))?;
    while let Some(row) = rows.next()? {
        let key: String = row.get(0)?;
        let value: String = row.get(1)?;
        visit(&key, &value)?;
    }
    Ok(())
}

pub fn delete_range(conn: &Connection, low: &str, high: &str) -> Result<usize> {
    conn.execute(
        "DELETE FROM records WHERE key >= ?1 AND key < ?2",
        params![low, high],
    )
    .with_context(|| format!("Failed to delete range [{low}, {high})"))
}

pub fn count_range(conn: &Connection, low: &str, high: &str) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM records WHERE key >= ?1 AND key < ?2",
            params![low, high],
            |row| row.get(0),
        )
        .context("Failed to count records")?;
    Ok(count.max(0) as u64)
}
