pub mod config;
pub mod session;
pub mod stats;
pub mod task;
pub mod timer;

use pomofocus_core::{Database, DatabaseError};

/// Fails with `NotFound` unless `id` names a task in the local database.
/// Sessions credited to a missing task could never be saved.
pub(crate) fn require_task(db: &Database, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    match db.get_task(id)? {
        Some(_) => Ok(()),
        None => Err(DatabaseError::NotFound {
            entity: "task",
            id: id.to_string(),
        }
        .into()),
    }
}
