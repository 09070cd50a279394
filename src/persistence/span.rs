//! In-place replacement of a line span in a ledger file

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::types::*;

/// SHA-256 (hex) of a run of lines, line endings included
pub fn span_digest<S: AsRef<str>>(lines: &[S]) -> String {
    let mut hasher = Sha256::new();
    for line in lines {
        hasher.update(line.as_ref().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// A line range of a file and what is expected to be there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSpan {
    pub path: PathBuf,
    /// 1-based first line
    pub start_line: usize,
    pub line_count: usize,
    /// Digest of the span as last read; `None` skips the check
    pub expected_digest: Option<String>,
}

impl LineSpan {
    /// The span an entry was loaded from
    pub fn of_entry(entry: &LedgerEntry) -> ImportResult<Self> {
        let location = entry.location().ok_or_else(|| {
            ImportError::Write("entry has no location in the ledger".to_string())
        })?;
        Ok(Self {
            path: location.filename.clone(),
            start_line: location.lineno,
            line_count: location.line_count,
            expected_digest: Some(location.digest.clone()),
        })
    }
}

/// Overwrite `span` with what `edit` makes of its current text, keeping
/// every other byte
///
/// The file is re-read and the span's digest compared before writing; the
/// new content goes to a temporary file in the same directory which is then
/// renamed over the original.
pub fn replace_span_with<F>(span: &LineSpan, edit: F) -> ImportResult<()>
where
    F: FnOnce(&str) -> String,
{
    let path = &span.path;
    let text = fs::read_to_string(path).map_err(|e| write_error(path, e))?;
    let lines: Vec<&str> = text.split_inclusive('\n').collect();

    let first = span.start_line.checked_sub(1).ok_or_else(|| {
        ImportError::Write(format!("{}: line numbers start at 1", path.display()))
    })?;
    let last = first + span.line_count;
    if span.line_count == 0 || last > lines.len() {
        return Err(ImportError::Write(format!(
            "{}: lines {}..{} are outside the file ({} lines)",
            path.display(),
            span.start_line,
            span.start_line + span.line_count,
            lines.len()
        )));
    }

    if let Some(expected) = &span.expected_digest {
        if span_digest(&lines[first..last]) != *expected {
            return Err(ImportError::Write(format!(
                "{}: lines {}..{} changed on disk since the ledger was loaded",
                path.display(),
                span.start_line,
                span.start_line + span.line_count
            )));
        }
    }

    let replacement = edit(&lines[first..last].concat());
    let mut content = String::with_capacity(text.len() + replacement.len());
    content.extend(lines[..first].iter().copied());
    content.push_str(&replacement);
    if !replacement.ends_with('\n') && last < lines.len() {
        content.push('\n');
    }
    content.extend(lines[last..].iter().copied());

    write_atomically(path, content.as_bytes())?;
    tracing::info!(
        path = %path.display(),
        line = span.start_line,
        replaced = span.line_count,
        "replaced ledger span"
    );
    Ok(())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> ImportResult<()> {
    let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()));

    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        if let Ok(metadata) = fs::metadata(path) {
            fs::set_permissions(&temp, metadata.permissions())?;
        }
        fs::rename(&temp, path)
    })();

    result.map_err(|e| {
        let _ = fs::remove_file(&temp);
        write_error(path, e)
    })
}

fn write_error(path: &Path, e: std::io::Error) -> ImportError {
    ImportError::Write(format!("{}: {}", path.display(), e))
}
