//! Inspect command implementation.

use super::{open, scan_segment, CliResult};
use rekord_core::segment::EntryKind;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database path.
    pub path: String,
    /// Format version (major, minor).
    pub format_version: (u16, u16),
    /// Revision stored in the manifest.
    pub revision: u64,
    /// Per-table statistics in manifest order.
    pub tables: Vec<TableStats>,
    /// Segment files with no manifest entry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub orphaned_segments: Vec<String>,
}

/// Statistics for a single table.
#[derive(Debug, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Schema fingerprint.
    pub fingerprint: String,
    /// Next id the table will allocate.
    pub next_id: u64,
    /// Segment size in bytes.
    pub segment_size: u64,
    /// Complete entries in the segment.
    pub entries: usize,
    /// Insert entries.
    pub inserts: usize,
    /// Remove entries.
    pub removes: usize,
    /// Records not removed.
    pub live: usize,
    /// Bytes of an incomplete trailing entry.
    pub torn_bytes: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> CliResult<()> {
    let result = collect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Gathers inspection data without printing it.
pub fn collect(path: &Path) -> CliResult<InspectResult> {
    let opened = open(path)?;
    let manifest = &opened.manifest;

    let mut tables = Vec::with_capacity(manifest.tables.len());
    for entry in &manifest.tables {
        let scan = scan_segment(&opened.dir, &entry.name)?;
        let mut live = HashSet::new();
        let (mut inserts, mut removes) = (0, 0);
        for e in &scan.entries {
            match e.kind {
                EntryKind::Insert => {
                    inserts += 1;
                    live.insert(e.record_id);
                }
                EntryKind::Remove => {
                    removes += 1;
                    live.remove(&e.record_id);
                }
            }
        }

        tables.push(TableStats {
            name: entry.name.clone(),
            fingerprint: entry.fingerprint.clone(),
            next_id: entry.next_id,
            segment_size: scan.valid_len + scan.torn_bytes,
            entries: scan.entries.len(),
            inserts,
            removes,
            live: live.len(),
            torn_bytes: scan.torn_bytes,
        });
    }

    let orphaned_segments = opened
        .dir
        .segment_names()?
        .into_iter()
        .filter(|name| manifest.table(name).is_none())
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        format_version: manifest.format_version,
        revision: manifest.revision.as_u64(),
        tables,
        orphaned_segments,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Rekord Database Inspection");
    println!("==========================");
    println!();
    println!("Path:     {}", result.path);
    println!(
        "Format:   {}.{}",
        result.format_version.0, result.format_version.1
    );
    println!("Revision: {}", result.revision);
    println!();
    println!("Tables:");
    for table in &result.tables {
        println!(
            "  {} ({}): {} live, {} inserts, {} removes, next id {}, {}",
            table.name,
            &table.fingerprint[..table.fingerprint.len().min(12)],
            table.live,
            table.inserts,
            table.removes,
            table.next_id,
            format_size(table.segment_size)
        );
        if table.torn_bytes > 0 {
            println!("    torn tail: {} bytes", table.torn_bytes);
        }
    }

    if !result.orphaned_segments.is_empty() {
        println!();
        println!("Orphaned segments: {}", result.orphaned_segments.join(", "));
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekord_codec::{FieldType, Value};
    use rekord_core::{Database, TableSchema};
    use tempfile::tempdir;

    #[test]
    fn counts_entries_per_table() {
        let dir = tempdir().unwrap();
        {
            let db = Database::builder()
                .table(
                    TableSchema::builder("persons")
                        .unique("name", FieldType::Text)
                        .build()
                        .unwrap(),
                )
                .open_directory(dir.path())
                .unwrap();
            let persons = db.table("persons").unwrap();
            let miku = persons.insert(vec![Value::from("Miku")]).unwrap();
            persons.insert(vec![Value::from("Rin")]).unwrap();
            persons.remove(miku).unwrap();
        }

        let result = collect(dir.path()).unwrap();
        assert_eq!(result.revision, 3);
        assert_eq!(result.tables.len(), 1);
        let persons = &result.tables[0];
        assert_eq!(persons.entries, 3);
        assert_eq!(persons.inserts, 2);
        assert_eq!(persons.removes, 1);
        assert_eq!(persons.live, 1);
        assert_eq!(persons.next_id, 2);
        assert!(result.orphaned_segments.is_empty());
    }

    #[test]
    fn missing_database_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(collect(&dir.path().join("absent")).is_err());
    }
}
