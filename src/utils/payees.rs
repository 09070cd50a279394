//! Payee alias map, loaded once per run and flushed when changed

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::*;

/// Bank payee names mapped to the names used in the ledger
#[derive(Debug, Clone, Default)]
pub struct PayeeAliases {
    path: Option<PathBuf>,
    aliases: BTreeMap<String, String>,
    dirty: bool,
}

impl PayeeAliases {
    /// An alias map that is never written anywhere
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the alias file at `path`
    ///
    /// A missing, empty or unreadable-as-JSON file yields an empty map; the
    /// file is (re)written on the first save.
    pub fn load(path: &Path) -> ImportResult<Self> {
        let aliases = match fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed payee file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(ImportError::Io(e)),
        };

        tracing::debug!(path = %path.display(), count = aliases.len(), "loaded payee aliases");

        Ok(Self {
            path: Some(path.to_path_buf()),
            aliases,
            dirty: false,
        })
    }

    /// Look up the ledger name for a bank payee
    pub fn get(&self, payee: &str) -> Option<&str> {
        self.aliases.get(payee).map(String::as_str)
    }

    /// Record an alias, marking the map for saving if it changed
    pub fn set(&mut self, payee: &str, alias: &str) {
        if self.get(payee) != Some(alias) {
            self.aliases.insert(payee.to_string(), alias.to_string());
            self.dirty = true;
        }
    }

    /// Distinct alias values, sorted
    pub fn values(&self) -> Vec<&str> {
        let mut values: Vec<&str> = self.aliases.values().map(String::as_str).collect();
        values.sort_unstable();
        values.dedup();
        values
    }

    /// Complete a typed ledger name against the names already in use
    ///
    /// A case-insensitive exact match wins; otherwise a prefix shared by
    /// exactly one name picks that name.
    pub fn complete(&self, typed: &str) -> Option<&str> {
        let typed = typed.trim().to_lowercase();
        if typed.is_empty() {
            return None;
        }
        let values = self.values();
        if let Some(exact) = values.iter().copied().find(|v| v.to_lowercase() == typed) {
            return Some(exact);
        }
        let mut prefixed = values
            .into_iter()
            .filter(|v| v.to_lowercase().starts_with(&typed));
        match (prefixed.next(), prefixed.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    /// Number of aliases
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Whether the map has no aliases
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Whether there are unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the map as sorted, four-space indented JSON if it changed
    pub fn save(&mut self) -> ImportResult<()> {
        let Some(path) = &self.path else {
            self.dirty = false;
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.aliases
            .serialize(&mut ser)
            .map_err(|e| ImportError::Write(format!("{}: {}", path.display(), e)))?;
        buf.push(b'\n');

        fs::write(path, buf)
            .map_err(|e| ImportError::Write(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), count = self.aliases.len(), "saved payee aliases");
        self.dirty = false;
        Ok(())
    }
}
