//! Read-only status reporting.
//!
//! Covers every unit in the catalog, annotating applied units with their
//! batch. Never opens a write transaction and never creates the ledger
//! table: against a fresh database everything simply reports as pending.

use std::collections::HashMap;

use rusqlite::Connection;
use schema_migrate_catalog::MigrationCatalog;
use schema_migrate_core::{MigrationId, MigrationState};
use serde::Serialize;

use crate::error::Result;
use crate::ledger::Ledger;

/// State of one catalog unit, as reported by [`status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    /// Unit id.
    pub id: MigrationId,
    /// Pending, or applied with its batch.
    #[serde(flatten)]
    pub state: MigrationState,
}

/// Reports the state of every catalog unit, in catalog (chronological)
/// order.
pub fn status(
    conn: &Connection,
    catalog: &MigrationCatalog,
    ledger: &Ledger,
) -> Result<Vec<StatusEntry>> {
    let batches: HashMap<MigrationId, i64> = if ledger.exists(conn)? {
        ledger
            .records(conn)?
            .into_iter()
            .map(|record| (record.migration_id, record.batch))
            .collect()
    } else {
        HashMap::new()
    };

    Ok(catalog
        .list_all()
        .iter()
        .map(|unit| StatusEntry {
            id: unit.id.clone(),
            state: match batches.get(&unit.id) {
                Some(&batch) => MigrationState::Applied { batch },
                None => MigrationState::Pending,
            },
        })
        .collect())
}
