//! Verify command implementation.

use super::{open, read_segment, CliResult};
use rekord_core::segment::{EntryKind, SegmentEntry};
use std::collections::HashMap;
use std::path::Path;

/// Verification result for one table.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of entries checked.
    pub entries_checked: usize,
    /// Bytes of an incomplete trailing entry, truncated on next open.
    pub torn_bytes: u64,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> CliResult<()> {
    println!("Verifying database at {}", path.display());
    println!();

    let mut failed = false;
    for (table, result) in verify_all(path)? {
        print_result(&table, &result);
        failed |= !result.is_ok();
    }

    println!();
    if failed {
        println!("✗ Database verification failed");
        Err("Verification failed".into())
    } else {
        println!("✓ Database verification passed");
        Ok(())
    }
}

/// Verifies every table listed in the manifest.
pub fn verify_all(path: &Path) -> CliResult<Vec<(String, VerifyResult)>> {
    let opened = open(path)?;
    let mut results = Vec::with_capacity(opened.manifest.tables.len());
    for entry in &opened.manifest.tables {
        let data = read_segment(&opened.dir, &entry.name)?;
        tracing::debug!(table = %entry.name, bytes = data.len(), "verifying segment");
        results.push((entry.name.clone(), verify_segment(&data)));
    }
    Ok(results)
}

/// Checks entry framing, checksums, row payloads and the insert/remove
/// sequence of one segment.
pub fn verify_segment(data: &[u8]) -> VerifyResult {
    let mut result = VerifyResult::default();

    let scan = match SegmentEntry::decode_all(data) {
        Ok(scan) => scan,
        Err(e) => {
            result.errors.push(e.to_string());
            return result;
        }
    };
    result.torn_bytes = scan.torn_bytes;

    // id -> removed
    let mut seen: HashMap<u64, bool> = HashMap::new();
    let mut last_revision = 0u64;
    for entry in &scan.entries {
        result.entries_checked += 1;
        let id = entry.record_id;

        if entry.revision.as_u64() < last_revision {
            result.errors.push(format!(
                "{id}: revision {} follows revision {last_revision}",
                entry.revision.as_u64()
            ));
        }
        last_revision = last_revision.max(entry.revision.as_u64());

        match entry.kind {
            EntryKind::Insert => {
                if let Err(e) = rekord_codec::decode_row(&entry.payload) {
                    result.errors.push(format!("{id}: undecodable row: {e}"));
                }
                if seen.insert(id.as_u64(), false).is_some() {
                    result.errors.push(format!("{id}: inserted twice"));
                }
            }
            EntryKind::Remove => match seen.get_mut(&id.as_u64()) {
                None => result.errors.push(format!("{id}: removed before insert")),
                Some(true) => result.errors.push(format!("{id}: removed twice")),
                Some(removed) => *removed = true,
            },
        }
    }

    result
}

fn print_result(table: &str, result: &VerifyResult) {
    println!("{table}:");
    println!("  Entries checked: {}", result.entries_checked);
    if result.torn_bytes > 0 {
        println!("  Torn tail:       {} bytes", result.torn_bytes);
    }
    if !result.errors.is_empty() {
        println!("  Errors:");
        for error in result.errors.iter().take(10) {
            println!("    - {error}");
        }
        if result.errors.len() > 10 {
            println!("    ... and {} more", result.errors.len() - 10);
        }
    }
}
