use std::path::Path;

use lec_config::LecConfig;
use lec_core::responses::JournalEntry;
use lec_store::WriteJournal;

use crate::cli::GlobalFlags;
use crate::output::output;

/// The most recent `limit` entries, oldest first.
pub fn recent(journal_dir: &Path, limit: usize) -> anyhow::Result<Vec<JournalEntry>> {
    let mut entries = WriteJournal::read_entries(journal_dir)?;
    let skip = entries.len().saturating_sub(limit);
    entries.drain(..skip);
    Ok(entries)
}

/// Handle `lec journal`.
pub fn handle(config: &LecConfig, flags: &GlobalFlags) -> anyhow::Result<()> {
    if !config.store.has_journal() {
        anyhow::bail!("write journal is disabled: set store.journal_dir");
    }
    let limit = flags.limit_or(config.general.default_limit);
    let entries = recent(Path::new(&config.store.journal_dir), limit)?;
    output(&entries, flags.format)
}
