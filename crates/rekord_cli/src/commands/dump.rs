//! Dump command implementation.

use super::{open, scan_segment, CliResult};
use rekord_codec::Value;
use rekord_core::segment::{EntryKind, SegmentEntry};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// A record rebuilt from segment entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DumpedRecord {
    /// Record id.
    pub id: u64,
    /// Revision that inserted the record.
    pub inserted_at: u64,
    /// Revision that removed the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<u64>,
    /// Field values in schema order.
    pub fields: Vec<Value>,
}

impl DumpedRecord {
    fn is_live_at(&self, revision: u64) -> bool {
        self.inserted_at <= revision && self.removed_at.map_or(true, |r| revision < r)
    }
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    table: &str,
    at: Option<u64>,
    all: bool,
    format: &str,
) -> CliResult<()> {
    let opened = open(path)?;
    if opened.manifest.table(table).is_none() {
        return Err(format!("Table {table} not found").into());
    }

    let scan = scan_segment(&opened.dir, table)?;
    let latest = scan
        .entries
        .iter()
        .map(|e| e.revision.as_u64())
        .fold(opened.manifest.revision.as_u64(), u64::max);
    let revision = at.unwrap_or(latest);

    let records = rebuild(&scan.entries)?;
    let records: Vec<DumpedRecord> = if all {
        records
    } else {
        records
            .into_iter()
            .filter(|r| r.is_live_at(revision))
            .collect()
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(table, if all { None } else { Some(revision) }, &records);
        }
    }

    Ok(())
}

/// Replays segment entries into records ordered by id.
pub fn rebuild(entries: &[SegmentEntry]) -> CliResult<Vec<DumpedRecord>> {
    let mut records: BTreeMap<u64, DumpedRecord> = BTreeMap::new();
    for entry in entries {
        let id = entry.record_id.as_u64();
        match entry.kind {
            EntryKind::Insert => {
                records.insert(
                    id,
                    DumpedRecord {
                        id,
                        inserted_at: entry.revision.as_u64(),
                        removed_at: None,
                        fields: rekord_codec::decode_row(&entry.payload)?,
                    },
                );
            }
            EntryKind::Remove => match records.get_mut(&id) {
                Some(record) => record.removed_at = Some(entry.revision.as_u64()),
                None => tracing::warn!(id, "removal of unknown record"),
            },
        }
    }
    Ok(records.into_values().collect())
}

fn print_text_output(table: &str, revision: Option<u64>, records: &[DumpedRecord]) {
    match revision {
        Some(revision) => println!("{table} at revision {revision}: {} records", records.len()),
        None => println!("{table}, all records: {}", records.len()),
    }
    println!();
    for record in records {
        let fields: Vec<String> = record.fields.iter().map(ToString::to_string).collect();
        let removed = record
            .removed_at
            .map_or_else(String::new, |r| format!(" removed@{r}"));
        println!(
            "#{:<6} inserted@{}{} [{}]",
            record.id,
            record.inserted_at,
            removed,
            fields.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekord_core::{RecordId, RevisionId};

    fn insert(id: u64, revision: u64, name: &str) -> SegmentEntry {
        let row = rekord_codec::encode_row(&[Value::from(name)]).unwrap();
        SegmentEntry::insert(RecordId(id), RevisionId(revision), row)
    }

    #[test]
    fn rebuild_applies_removals() {
        let records = rebuild(&[
            insert(0, 1, "Miku"),
            insert(1, 2, "Yukari"),
            SegmentEntry::remove(RecordId(0), RevisionId(3)),
        ])
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].removed_at, Some(3));
        assert!(records[0].is_live_at(2));
        assert!(!records[0].is_live_at(3));
        assert!(!records[1].is_live_at(1));
        assert_eq!(records[1].fields, vec![Value::from("Yukari")]);
    }
}
