//! Loaded ledger with write-driven invalidation

use std::path::{Path, PathBuf};

use crate::ledger::loader::{canonical, LedgerSnapshot};
use crate::types::*;

/// The ledger as last read from disk
///
/// Line numbers recorded in the entries are only trusted until something is
/// written to one of the files they came from. Writers report their writes
/// through [`LedgerIndex::mark_written`]; [`LedgerIndex::refresh`] then
/// reloads before the entries are used again.
#[derive(Debug, Clone)]
pub struct LedgerIndex {
    root: PathBuf,
    snapshot: LedgerSnapshot,
    files: Vec<PathBuf>,
    stale: bool,
    generation: u64,
}

impl LedgerIndex {
    /// Load the ledger rooted at `root`
    pub fn load(root: &Path) -> ImportResult<Self> {
        let snapshot = LedgerSnapshot::load(root)?;
        Ok(Self::from_snapshot(root, snapshot))
    }

    /// Wrap an already loaded snapshot
    pub fn from_snapshot(root: &Path, snapshot: LedgerSnapshot) -> Self {
        let files = snapshot.files.iter().map(|f| canonical(f)).collect();
        Self {
            root: root.to_path_buf(),
            snapshot,
            files,
            stale: false,
            generation: 0,
        }
    }

    /// Transactions in file order
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.snapshot.entries
    }

    /// Options, accounts, tags and links
    pub fn summary(&self) -> &LedgerSummary {
        &self.snapshot.summary
    }

    /// Whether `path` is one of the files the ledger was read from
    pub fn contains_file(&self, path: &Path) -> bool {
        let path = canonical(path);
        self.files.iter().any(|f| *f == path)
    }

    /// Note a successful write; invalidates the index if it touched the ledger
    pub fn mark_written(&mut self, path: &Path) {
        self.invalidate(path);
    }

    /// Stop trusting what was read from `path`, e.g. after a write to it
    /// was refused because it changed on disk
    pub fn invalidate(&mut self, path: &Path) {
        if self.contains_file(path) {
            tracing::debug!(path = %path.display(), "ledger index invalidated");
            self.stale = true;
        }
    }

    /// Whether entries may carry outdated line numbers
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// How many times the ledger has been reloaded
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reload if stale; returns whether a reload happened
    pub fn refresh(&mut self) -> ImportResult<bool> {
        if !self.stale {
            return Ok(false);
        }

        let snapshot = LedgerSnapshot::load(&self.root)?;
        self.files = snapshot.files.iter().map(|f| canonical(f)).collect();
        self.snapshot = snapshot;
        self.stale = false;
        self.generation += 1;
        tracing::debug!(
            root = %self.root.display(),
            generation = self.generation,
            entries = self.snapshot.entries.len(),
            "ledger reloaded"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_refresh_only_after_write() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("main.bean");
        fs::write(
            &root,
            "2024-03-01 * \"A\"\n  Expenses:Food  1.00 USD\n  Assets:Checking\n",
        )
        .unwrap();

        let mut index = LedgerIndex::load(&root).unwrap();
        assert!(!index.refresh().unwrap());

        index.mark_written(&dir.path().join("elsewhere.bean"));
        assert!(!index.is_stale());

        fs::write(
            &root,
            "; moved\n2024-03-01 * \"A\"\n  Expenses:Food  1.00 USD\n  Assets:Checking\n",
        )
        .unwrap();
        index.mark_written(&root);
        assert!(index.is_stale());
        assert_eq!(index.entries()[0].location().unwrap().lineno, 1);

        assert!(index.refresh().unwrap());
        assert_eq!(index.generation(), 1);
        assert_eq!(index.entries()[0].location().unwrap().lineno, 2);
    }
}
