//! JSONL write journal.
//!
//! Appends one [`JournalEntry`] per committed write operation to
//! `{journal_dir}/writes.jsonl`. Uses `serde_jsonlines::append_json_lines`
//! for per-line appends. The journal is an audit trail; the store never
//! replays it.

use std::path::{Path, PathBuf};

use lec_core::documents::WriteOp;
use lec_core::responses::JournalEntry;

use crate::error::StoreError;

const JOURNAL_FILE: &str = "writes.jsonl";

/// Appends committed batches to a JSONL file.
#[derive(Debug, Clone)]
pub struct WriteJournal {
    journal_dir: PathBuf,
    enabled: bool,
}

impl WriteJournal {
    /// Create a journal writing into `journal_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Journal` if the directory cannot be created.
    pub fn new(journal_dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&journal_dir)
            .map_err(|e| StoreError::Journal(format!("{}: {e}", journal_dir.display())))?;
        Ok(Self {
            journal_dir,
            enabled: true,
        })
    }

    /// A journal that records nothing.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            journal_dir: PathBuf::new(),
            enabled: false,
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Full path of the journal file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.journal_dir.join(JOURNAL_FILE)
    }

    /// Append every operation of a committed batch, all stamped with `ts`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Journal` if the file write fails.
    pub fn append_batch(&self, ops: &[WriteOp], ts: &str) -> Result<(), StoreError> {
        if !self.enabled || ops.is_empty() {
            return Ok(());
        }
        let entries = ops.iter().map(|op| JournalEntry {
            v: 1,
            ts: ts.to_string(),
            collection: op.collection,
            id: op.id.clone(),
            mode: op.mode,
            data: op.data.clone(),
        });
        serde_jsonlines::append_json_lines(self.path(), entries)
            .map_err(|e| StoreError::Journal(e.to_string()))
    }

    /// Read every entry from the journal file in `journal_dir`.
    ///
    /// A missing file reads as an empty journal.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Journal` if the file exists but cannot be parsed.
    pub fn read_entries(journal_dir: &Path) -> Result<Vec<JournalEntry>, StoreError> {
        let path = journal_dir.join(JOURNAL_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        serde_jsonlines::json_lines(&path)
            .map_err(|e| StoreError::Journal(format!("{}: {e}", path.display())))?
            .collect::<Result<Vec<JournalEntry>, _>>()
            .map_err(|e| StoreError::Journal(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lec_core::entities::AssignmentInstance;
    use lec_core::enums::{Collection, WriteMode};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn op(id: &str, assignment: &str) -> WriteOp {
        WriteOp::create(&AssignmentInstance::unsubmitted(id.into(), assignment, "stu-1")).unwrap()
    }

    #[test]
    fn append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let journal = WriteJournal::new(dir.path().to_path_buf()).unwrap();
        journal
            .append_batch(&[op("ins-1", "asg-1"), op("ins-2", "asg-2")], "2026-01-01T00:00:00Z")
            .unwrap();
        journal
            .append_batch(&[op("ins-3", "asg-3")], "2026-01-01T00:00:01Z")
            .unwrap();

        let entries = WriteJournal::read_entries(dir.path()).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].id, "ins-1");
        assert_eq!(entries[0].collection, Collection::AssignmentInstances);
        assert_eq!(entries[0].mode, WriteMode::Create);
        assert_eq!(entries[2].ts, "2026-01-01T00:00:01Z");
    }

    #[test]
    fn disabled_journal_writes_nothing() {
        let journal = WriteJournal::disabled();
        assert!(!journal.is_enabled());
        journal.append_batch(&[op("ins-1", "asg-1")], "now").unwrap();
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(WriteJournal::read_entries(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn new_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("journal");
        let journal = WriteJournal::new(nested.clone()).unwrap();
        assert!(nested.is_dir());
        assert_eq!(journal.path(), nested.join("writes.jsonl"));
    }
}
