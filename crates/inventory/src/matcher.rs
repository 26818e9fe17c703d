use crate::error::InventoryError;
use crate::lookup::{TargetLookup, TargetRecord};
use crate::model::{CartonEntry, EntryStage, MatchError, MatchResult};

/// Outcome of one identity lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidates {
    Unique(MatchResult),
    Ambiguous(Vec<String>),
}

/// Exactly one record is a match, none is a new target, more than one is
/// ambiguous. Never picks among several.
pub fn classify_candidates(records: &[TargetRecord]) -> Candidates {
    match records {
        [] => Candidates::Unique(MatchResult { found: false, key: None }),
        [only] => Candidates::Unique(MatchResult {
            found: true,
            key: Some(only.key.clone()),
        }),
        many => Candidates::Ambiguous(many.iter().map(|r| r.key.clone()).collect()),
    }
}

/// Match every `Raw` entry against the lookup in one batch. Unique outcomes
/// advance to `Matched`; ambiguous ones are halted and returned as errors.
/// Entries with a missing identity value are never looked up and come out
/// new. A failing lookup is fatal for the carton.
pub fn match_entries(
    carton: &str,
    entries: &mut [CartonEntry],
    lookup: &dyn TargetLookup,
) -> Result<Vec<MatchError>, InventoryError> {
    let mut pending = Vec::new();
    for (i, entry) in entries.iter_mut().enumerate() {
        if entry.stage != EntryStage::Raw {
            continue;
        }
        if entry.identity.is_complete() {
            pending.push(i);
            continue;
        }
        log::debug!(
            "carton '{carton}': row {} identity {} is incomplete, reported as new",
            entry.row,
            entry.identity
        );
        entry.match_result = Some(MatchResult { found: false, key: None });
        entry.advance(EntryStage::Matched)?;
    }

    let keys: Vec<_> = pending.iter().map(|&i| entries[i].identity.clone()).collect();
    let found = lookup.find_batch(&keys).map_err(|e| InventoryError::Lookup {
        carton: carton.to_string(),
        message: e.to_string(),
    })?;

    if found.len() != keys.len() {
        return Err(InventoryError::Lookup {
            carton: carton.to_string(),
            message: format!("batch returned {} results for {} keys", found.len(), keys.len()),
        });
    }

    let mut errors = Vec::new();
    for (&i, records) in pending.iter().zip(found.iter()) {
        let entry = &mut entries[i];
        match classify_candidates(records) {
            Candidates::Unique(result) => {
                entry.match_result = Some(result);
                entry.advance(EntryStage::Matched)?;
            }
            Candidates::Ambiguous(candidates) => {
                log::warn!(
                    "carton '{carton}': row {} identity {} is ambiguous ({} candidates)",
                    entry.row,
                    entry.identity,
                    candidates.len()
                );
                entry.advance(EntryStage::Halted)?;
                errors.push(MatchError {
                    row: entry.row,
                    identity: entry.identity.clone(),
                    candidates,
                });
            }
        }
    }

    Ok(errors)
}
