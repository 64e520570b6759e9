//! Oldest-first selection of documents due for a stage.

use super::documents::load_document;
use crate::database::Database;
use crate::error::DbResult;
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;
use vitae_core::{sortable_timestamp, DocumentRecord, Eligibility};

/// Shared filter. `?1` is the stage, `?2` the process whose entry marks the
/// document done (NULL means any entry), `?3` the prerequisite process (or
/// NULL), `?4` the current time when live claims should hide documents (or
/// NULL).
const ELIGIBLE_FILTER: &str = r#"
    NOT EXISTS (
        SELECT 1 FROM stage_results r
        WHERE r.file_id = d.file_id AND (?2 IS NULL OR r.process = ?2))
    AND (?3 IS NULL OR EXISTS (
        SELECT 1 FROM stage_results r WHERE r.file_id = d.file_id AND r.process = ?3))
    AND NOT EXISTS (
        SELECT 1 FROM stage_failures f
        WHERE f.file_id = d.file_id AND f.stage = ?1 AND f.dead_lettered = 1)
    AND (?4 IS NULL OR NOT EXISTS (
        SELECT 1 FROM stage_claims c
        WHERE c.file_id = d.file_id AND c.stage = ?1 AND c.expires_at > ?4))
"#;

/// The process tag whose entry completes `predicate`; `None` for any entry.
fn completed_by(predicate: &Eligibility) -> Option<&str> {
    match predicate {
        Eligibility::NoResults => None,
        Eligibility::Missing { stage, .. } => Some(stage.as_str()),
    }
}

fn prerequisite(predicate: &Eligibility) -> Option<&str> {
    match predicate {
        Eligibility::NoResults => None,
        Eligibility::Missing { after, .. } => after.as_deref(),
    }
}

fn select_eligible_id(
    conn: &Connection,
    stage: &str,
    predicate: &Eligibility,
    now: Option<&str>,
) -> DbResult<Option<String>> {
    let sql = format!(
        "SELECT d.file_id FROM documents d
         WHERE {}
         ORDER BY d.creation_date ASC, d.rowid ASC
         LIMIT 1",
        ELIGIBLE_FILTER
    );

    let file_id = conn
        .query_row(
            &sql,
            params![stage, completed_by(predicate), prerequisite(predicate), now],
            |row| row.get(0),
        )
        .optional()?;
    Ok(file_id)
}

impl Database {
    /// The oldest document matching `predicate` for `stage`, or `None`.
    ///
    /// Read-only: repeated calls with no intervening writes return the same
    /// document. Dead-lettered documents are skipped; claims are ignored.
    pub fn find_oldest_eligible(
        &self,
        stage: &str,
        predicate: &Eligibility,
    ) -> DbResult<Option<DocumentRecord>> {
        let conn = self.conn()?;
        match select_eligible_id(&conn, stage, predicate, None)? {
            Some(id) => load_document(&conn, &id),
            None => Ok(None),
        }
    }

    /// Select the oldest eligible document that no live claim covers and take
    /// a lease on it for `owner`.
    pub fn claim_oldest_eligible(
        &self,
        stage: &str,
        predicate: &Eligibility,
        owner: &str,
        lease: Duration,
    ) -> DbResult<Option<DocumentRecord>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let now = Utc::now();
        let Some(file_id) = select_eligible_id(&tx, stage, predicate, Some(&sortable_timestamp(&now)))?
        else {
            return Ok(None);
        };

        tx.execute(
            r#"
            INSERT INTO stage_claims (file_id, stage, owner, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(file_id, stage) DO UPDATE SET
                owner = excluded.owner,
                expires_at = excluded.expires_at
            "#,
            params![file_id, stage, owner, sortable_timestamp(&(now + lease))],
        )?;

        let record = load_document(&tx, &file_id)?;
        tx.commit()?;

        debug!("{} claimed {} for {}", owner, file_id, stage);
        Ok(record)
    }

    /// Drop a claim held by `owner`. Releasing a claim that is gone is a no-op.
    pub fn release_claim(&self, file_id: &str, stage: &str, owner: &str) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM stage_claims WHERE file_id = ?1 AND stage = ?2 AND owner = ?3",
            params![file_id, stage, owner],
        )?;
        Ok(())
    }

    /// Number of documents currently due for `stage`, ignoring claims.
    pub fn count_eligible(&self, stage: &str, predicate: &Eligibility) -> DbResult<i64> {
        let conn = self.conn()?;
        let sql = format!("SELECT COUNT(*) FROM documents d WHERE {}", ELIGIBLE_FILTER);
        let count = conn.query_row(
            &sql,
            params![
                stage,
                completed_by(predicate),
                prerequisite(predicate),
                Option::<String>::None
            ],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
