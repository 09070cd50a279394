//! Destination for newly built entries

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::types::*;

/// Where appended entries go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    /// Append to this file
    File(PathBuf),
    /// Collect in memory, emitted at the end of the run
    Buffer(String),
}

impl OutputSink {
    /// File sink if `output` is given, memory buffer otherwise
    pub fn new(output: Option<&Path>) -> Self {
        match output {
            Some(path) => OutputSink::File(path.to_path_buf()),
            None => OutputSink::Buffer(String::new()),
        }
    }

    /// Append a rendered entry preceded by a separating blank line
    pub fn append(&mut self, rendered: &str) -> ImportResult<()> {
        let mut text = String::with_capacity(rendered.len() + 2);
        text.push('\n');
        text.push_str(rendered);
        if !rendered.ends_with('\n') {
            text.push('\n');
        }

        match self {
            OutputSink::Buffer(buffer) => {
                buffer.push_str(&text);
                Ok(())
            }
            OutputSink::File(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&*path)
                    .map_err(|e| ImportError::Write(format!("{}: {}", path.display(), e)))?;
                file.write_all(text.as_bytes())
                    .map_err(|e| ImportError::Write(format!("{}: {}", path.display(), e)))?;
                tracing::info!(path = %path.display(), "appended entry");
                Ok(())
            }
        }
    }

    /// The output file, if writing to one
    pub fn path(&self) -> Option<&Path> {
        match self {
            OutputSink::File(path) => Some(path.as_path()),
            OutputSink::Buffer(_) => None,
        }
    }

    /// Hand over the buffered entries, leaving the buffer empty
    pub fn take_buffer(&mut self) -> Option<String> {
        match self {
            OutputSink::Buffer(buffer) => Some(std::mem::take(buffer)),
            OutputSink::File(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_buffer_sink() {
        let mut sink = OutputSink::new(None);
        sink.append("2024-03-05 * \"A\" \"\"\n").unwrap();
        sink.append("2024-03-06 * \"B\" \"\"").unwrap();

        assert_eq!(sink.path(), None);
        assert_eq!(
            sink.take_buffer().unwrap(),
            "\n2024-03-05 * \"A\" \"\"\n\n2024-03-06 * \"B\" \"\"\n"
        );
        assert_eq!(sink.take_buffer().unwrap(), "");
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bean");
        std::fs::write(&path, "; existing\n").unwrap();

        let mut sink = OutputSink::new(Some(&path));
        sink.append("2024-03-05 * \"A\" \"\"\n").unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "; existing\n\n2024-03-05 * \"A\" \"\"\n"
        );
        assert!(sink.take_buffer().is_none());
    }
}
