//! Persistent ledger of applied migrations.
//!
//! The ledger is a single table, created lazily and owned exclusively by
//! this module: no other component reads or writes it directly. Records are
//! append-only except for deletion during rollback. The primary key on
//! `migration_id` is what turns a racing duplicate apply into a
//! distinguishable conflict instead of a silent double-apply.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction};
use schema_migrate_core::{AppliedRecord, MigrationId};

use crate::error::{MigrateError, Result, conflict_on_unique};

/// Applied-state store backed by a dedicated table in the target database.
///
/// All mutating methods take a [`Transaction`] so the ledger write commits
/// or rolls back together with the unit's schema statements; a crash between
/// schema mutation and ledger write cannot happen.
///
/// # Examples
///
/// ```
/// use rusqlite::Connection;
/// use schema_migrate_sqlite::Ledger;
///
/// let conn = Connection::open_in_memory().unwrap();
/// let ledger = Ledger::new("schema_migrations").unwrap();
/// ledger.ensure(&conn).unwrap();
/// assert_eq!(ledger.next_batch(&conn).unwrap(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
}

impl Ledger {
    /// Creates a ledger handle for the given table name.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::InvalidTableName`] if the name contains
    /// characters other than ASCII alphanumerics and underscores.
    pub fn new(table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { table })
    }

    /// Returns the ledger table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the ledger table if absent. Idempotent, safe on every
    /// startup.
    pub fn ensure(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                migration_id TEXT PRIMARY KEY,\n    \
                batch INTEGER NOT NULL,\n    \
                applied_at TIMESTAMP NOT NULL\n\
            );",
            self.table
        ))?;
        Ok(())
    }

    /// Returns `true` if the ledger table exists. Pure read, used by the
    /// status reporter to avoid creating the table as a side effect.
    pub fn exists(&self, conn: &Connection) -> Result<bool> {
        let mut stmt =
            conn.prepare("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1")?;
        let count: i64 = stmt.query_row([&self.table], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Returns the set of applied migration ids.
    pub fn applied_ids(&self, conn: &Connection) -> Result<HashSet<MigrationId>> {
        let mut stmt = conn.prepare(&format!("SELECT migration_id FROM {}", self.table))?;
        let raw: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        raw.into_iter().map(|id| parse_id(&id)).collect()
    }

    /// Returns every applied record, ordered by batch then application
    /// time.
    pub fn records(&self, conn: &Connection) -> Result<Vec<AppliedRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT migration_id, batch, applied_at FROM {} \
             ORDER BY batch ASC, applied_at ASC, rowid ASC",
            self.table
        ))?;
        let rows: Vec<(String, i64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<_>>()?;

        rows.into_iter()
            .map(|(id, batch, applied_at)| {
                Ok(AppliedRecord {
                    migration_id: parse_id(&id)?,
                    batch,
                    applied_at: parse_timestamp(&applied_at)?,
                })
            })
            .collect()
    }

    /// Returns the batch number the next `up` invocation should use:
    /// `MAX(batch) + 1`, or 1 for an empty ledger.
    pub fn next_batch(&self, conn: &Connection) -> Result<i64> {
        Ok(self.current_batch(conn)?.unwrap_or(0) + 1)
    }

    /// Returns the highest existing batch number, if any.
    pub fn current_batch(&self, conn: &Connection) -> Result<Option<i64>> {
        let mut stmt = conn.prepare(&format!("SELECT MAX(batch) FROM {}", self.table))?;
        let max: Option<i64> = stmt.query_row([], |row| row.get(0))?;
        Ok(max)
    }

    /// Returns the ids of the highest existing batch in
    /// reverse-application order (most recently applied first).
    pub fn last_batch_ids(&self, conn: &Connection) -> Result<Vec<MigrationId>> {
        // rowid breaks ties between records sharing one timestamp
        let mut stmt = conn.prepare(&format!(
            "SELECT migration_id FROM {t} \
             WHERE batch = (SELECT MAX(batch) FROM {t}) \
             ORDER BY applied_at DESC, rowid DESC",
            t = self.table
        ))?;
        let raw: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        raw.into_iter().map(|id| parse_id(&id)).collect()
    }

    /// Records a unit as applied, on the same transaction as its schema
    /// statements.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Conflict`] if a record for `id` already
    /// exists, meaning a concurrent invocation won the race.
    pub fn record_applied(&self, tx: &Transaction<'_>, id: &MigrationId, batch: i64) -> Result<()> {
        tx.execute(
            &format!(
                "INSERT INTO {} (migration_id, batch, applied_at) VALUES (?1, ?2, ?3)",
                self.table
            ),
            rusqlite::params![id.as_str(), batch, Utc::now().to_rfc3339()],
        )
        .map_err(|err| conflict_on_unique(id, err))?;
        Ok(())
    }

    /// Removes a unit's applied record, on the same transaction as its
    /// reverse statements.
    pub fn unrecord(&self, tx: &Transaction<'_>, id: &MigrationId) -> Result<()> {
        tx.execute(
            &format!("DELETE FROM {} WHERE migration_id = ?1", self.table),
            [id.as_str()],
        )?;
        Ok(())
    }
}

fn validate_table_name(table: &str) -> Result<()> {
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(MigrateError::InvalidTableName(table.to_string()));
    }
    Ok(())
}

fn parse_id(raw: &str) -> Result<MigrationId> {
    raw.parse()
        .map_err(|err| MigrateError::Ledger(format!("bad migration_id '{raw}': {err}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| MigrateError::Ledger(format!("bad applied_at '{raw}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> MigrationId {
        raw.parse().unwrap()
    }

    fn setup() -> (Connection, Ledger) {
        let conn = Connection::open_in_memory().unwrap();
        let ledger = Ledger::new("schema_migrations").unwrap();
        ledger.ensure(&conn).unwrap();
        (conn, ledger)
    }

    fn record(conn: &mut Connection, ledger: &Ledger, raw: &str, batch: i64) {
        let tx = conn.transaction().unwrap();
        ledger.record_applied(&tx, &id(raw), batch).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn test_new_validates_table_name() {
        assert!(Ledger::new("schema_migrations").is_ok());
        assert!(Ledger::new("").is_err());
        assert!(Ledger::new("drop table;--").is_err());
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let (conn, ledger) = setup();
        ledger.ensure(&conn).unwrap();
        ledger.ensure(&conn).unwrap();
        assert!(ledger.exists(&conn).unwrap());
    }

    #[test]
    fn test_exists_without_ensure() {
        let conn = Connection::open_in_memory().unwrap();
        let ledger = Ledger::new("schema_migrations").unwrap();
        assert!(!ledger.exists(&conn).unwrap());
    }

    #[test]
    fn test_next_batch_empty_ledger() {
        let (conn, ledger) = setup();
        assert_eq!(ledger.current_batch(&conn).unwrap(), None);
        assert_eq!(ledger.next_batch(&conn).unwrap(), 1);
    }

    #[test]
    fn test_next_batch_increments_past_max() {
        let (mut conn, ledger) = setup();
        record(&mut conn, &ledger, "m_20250101000000_a", 1);
        record(&mut conn, &ledger, "m_20250102000000_b", 3);
        assert_eq!(ledger.next_batch(&conn).unwrap(), 4);
    }

    #[test]
    fn test_applied_ids_roundtrip() {
        let (mut conn, ledger) = setup();
        record(&mut conn, &ledger, "m_20250101000000_a", 1);
        record(&mut conn, &ledger, "m_20250102000000_b", 1);

        let applied = ledger.applied_ids(&conn).unwrap();
        assert_eq!(applied.len(), 2);
        assert!(applied.contains(&id("m_20250101000000_a")));
    }

    #[test]
    fn test_duplicate_record_is_conflict() {
        let (mut conn, ledger) = setup();
        record(&mut conn, &ledger, "m_20250101000000_a", 1);

        let tx = conn.transaction().unwrap();
        let err = ledger
            .record_applied(&tx, &id("m_20250101000000_a"), 2)
            .unwrap_err();
        assert!(matches!(err, MigrateError::Conflict { .. }));
    }

    #[test]
    fn test_unrecord_removes_row() {
        let (mut conn, ledger) = setup();
        record(&mut conn, &ledger, "m_20250101000000_a", 1);

        let tx = conn.transaction().unwrap();
        ledger.unrecord(&tx, &id("m_20250101000000_a")).unwrap();
        tx.commit().unwrap();

        assert!(ledger.applied_ids(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_last_batch_ids_reverse_application_order() {
        let (mut conn, ledger) = setup();
        record(&mut conn, &ledger, "m_20250101000000_a", 1);
        record(&mut conn, &ledger, "m_20250102000000_b", 2);
        record(&mut conn, &ledger, "m_20250103000000_c", 2);

        let ids = ledger.last_batch_ids(&conn).unwrap();
        assert_eq!(ids.len(), 2);
        // c applied after b, so c comes first
        assert_eq!(ids[0], id("m_20250103000000_c"));
        assert_eq!(ids[1], id("m_20250102000000_b"));
    }

    #[test]
    fn test_last_batch_ids_empty_ledger() {
        let (conn, ledger) = setup();
        assert!(ledger.last_batch_ids(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_records_ordered_by_batch_then_time() {
        let (mut conn, ledger) = setup();
        record(&mut conn, &ledger, "m_20250103000000_c", 2);
        record(&mut conn, &ledger, "m_20250101000000_a", 1);

        let records = ledger.records(&conn).unwrap();
        assert_eq!(records[0].batch, 1);
        assert_eq!(records[1].batch, 2);
    }

    #[test]
    fn test_ledger_write_rolls_back_with_transaction() {
        let (mut conn, ledger) = setup();
        {
            let tx = conn.transaction().unwrap();
            ledger
                .record_applied(&tx, &id("m_20250101000000_a"), 1)
                .unwrap();
            // dropped without commit
        }
        assert!(ledger.applied_ids(&conn).unwrap().is_empty());
    }
}
