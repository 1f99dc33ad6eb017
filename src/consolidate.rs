use std::{fs, path::Path};

use tracing::{info, warn};

use crate::{error::StoreError, store};


/// What a successful merge did to the master file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Consolidation {
    pub(crate) appended: usize,
    pub(crate) first_index: u32,
    pub(crate) last_index: u32,
    pub(crate) session_removed: bool
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MergeOutcome {
    Merged(Consolidation),
    /// Nothing was done.
    SessionMissing,
    /// Nothing was done.
    SessionEmpty
}


/// The index the next record appended to `master` must get: one past the largest present, or 1.
pub(crate) fn next_index(master: &Path, delimiter: u8) -> Result<u32, StoreError> {
    Ok(store::read_records_if_present(master, delimiter)?
        .and_then(|records| records.iter().map(|r| r.index).max())
        .map_or(1, |max| max + 1))
}


/// Folds a finished session file into the master file.
///
/// Session records keep their order but are renumbered contiguously after the master's last
/// index, so the master index never repeats or skips. The master only gets a header if it is
/// created here. With `delete_session` the session file is removed after a successful merge.
pub(crate) fn merge_session(
    session: &Path,
    master: &Path,
    delimiter: u8,
    delete_session: bool
) -> Result<MergeOutcome, StoreError> {
    info!("Consolidating {} into {}", session.display(), master.display());

    if !session.exists() {
        warn!("Session file {} not found, nothing to consolidate", session.display());
        return Ok(MergeOutcome::SessionMissing);
    }
    let records = store::read_records_if_present(session, delimiter)?.unwrap_or_default();
    if records.is_empty() {
        warn!("Session file {} is empty, nothing to consolidate", session.display());
        return Ok(MergeOutcome::SessionEmpty);
    }

    let first_index = next_index(master, delimiter)?;
    info!("Starting index for new records will be {first_index}");

    let renumbered: Vec<_> = records
        .into_iter()
        .zip(first_index..)
        .map(|(mut record, index)| {
            record.index = index;
            record
        })
        .collect();
    store::append_records(master, &renumbered, delimiter)?;

    let appended = renumbered.len();
    let last_index = first_index + appended as u32 - 1;
    info!("{appended} records from {} copied to {} (indices {first_index}..={last_index})", session.display(), master.display());

    let session_removed = delete_session && match fs::remove_file(session) {
        Ok(()) => {
            info!("Deleted session file {}", session.display());
            true
        }
        Err(e) => {
            warn!("Failed to delete session file {}: {e}", session.display());
            false
        }
    };

    Ok(MergeOutcome::Merged(Consolidation { appended, first_index, last_index, session_removed }))
}
