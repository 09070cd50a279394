//! Rendering of entries in ledger syntax

use bigdecimal::BigDecimal;
use std::fmt::{self, Display, Formatter, Write};

use crate::types::*;

const INDENT: &str = "  ";
const META_INDENT: &str = "    ";

/// Format an amount with at least two decimal places
pub fn format_amount(amount: &BigDecimal) -> String {
    let (_, scale) = amount.as_bigint_and_exponent();
    if scale < 2 {
        amount.with_scale(2).to_string()
    } else {
        amount.to_string()
    }
}

/// Quote a string the way the ledger expects
pub fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// One-line summary: date, flag, payee, narration, tags, links and the
/// positive total
pub fn format_head(entry: &LedgerEntry) -> String {
    let mut head = format!("{} {}", entry.date, entry.flag);
    write_description(&mut head, entry);
    head.push(' ');
    head.push_str(&format_amount(&entry.positive_total()));
    head
}

fn write_description(out: &mut String, entry: &LedgerEntry) {
    match (&entry.payee, &entry.narration) {
        (Some(payee), narration) => {
            let _ = write!(
                out,
                " {} {}",
                quoted(payee),
                quoted(narration.as_deref().unwrap_or_default())
            );
        }
        (None, Some(narration)) => {
            let _ = write!(out, " {}", quoted(narration));
        }
        (None, None) => {}
    }
    for tag in &entry.tags {
        let _ = write!(out, " #{}", tag);
    }
    for link in &entry.links {
        let _ = write!(out, " ^{}", link);
    }
}

impl Display for Posting {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(INDENT)?;
        if let Some(flag) = self.flag {
            write!(f, "{} ", flag)?;
        }
        write!(
            f,
            "{}  {} {}",
            self.account,
            format_amount(&self.amount),
            self.currency
        )?;
        if let Some(annotation) = &self.annotation {
            write!(f, " {}", annotation)?;
        }
        if let Some(rec) = &self.meta.rec {
            write!(f, "\n{}{}: {}", META_INDENT, REC_KEY, quoted(rec))?;
        }
        for (key, value) in &self.meta.extra {
            write!(f, "\n{}{}: {}", META_INDENT, key, value)?;
        }
        Ok(())
    }
}

impl Display for LedgerEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut head = format!("{} {}", self.date, self.flag);
        write_description(&mut head, self);
        f.write_str(&head)?;

        if let Some(account) = &self.meta.account {
            write!(f, "\n{}{}: {}", INDENT, ACCOUNT_KEY, quoted(account))?;
        }
        if let Some(id) = &self.meta.id {
            write!(f, "\n{}{}: {}", INDENT, ID_KEY, quoted(id))?;
        }
        for (key, value) in &self.meta.extra {
            write!(f, "\n{}{}: {}", INDENT, key, value)?;
        }
        for posting in &self.postings {
            write!(f, "\n{}", posting)?;
        }
        Ok(())
    }
}

/// Render an entry as ledger text, terminated by a newline
pub fn render_entry(entry: &LedgerEntry) -> String {
    format!("{}\n", entry)
}

/// New text for an edited entry's lines, given their `current` text
///
/// When the only change from `loaded` is new `rec` markers, those lines are
/// slotted in under their postings and the rest of `current` is kept as is,
/// comments included. Any other change re-renders the whole entry.
pub fn render_in_place(current: &str, loaded: &LedgerEntry, edited: &LedgerEntry) -> String {
    added_recs(loaded, edited)
        .and_then(|added| insert_rec_lines(current, loaded, &added))
        .unwrap_or_else(|| render_entry(edited))
}

/// `(posting index, rec)` pairs, if nothing else differs
fn added_recs<'e>(loaded: &LedgerEntry, edited: &'e LedgerEntry) -> Option<Vec<(usize, &'e str)>> {
    if loaded.postings.len() != edited.postings.len() {
        return None;
    }

    let mut unmarked = edited.clone();
    let mut added = Vec::new();
    for (index, (before, after)) in loaded.postings.iter().zip(&edited.postings).enumerate() {
        if let (None, Some(rec)) = (&before.meta.rec, &after.meta.rec) {
            added.push((index, rec.as_str()));
            unmarked.postings[index].meta.rec = None;
        }
    }
    (unmarked == *loaded).then_some(added)
}

fn insert_rec_lines(current: &str, loaded: &LedgerEntry, added: &[(usize, &str)]) -> Option<String> {
    let location = loaded.location()?;
    let mut lines: Vec<String> = current.split_inclusive('\n').map(str::to_string).collect();

    for &(index, rec) in added.iter().rev() {
        let range = location.postings.get(index)?;
        let first = range.first.checked_sub(location.lineno)?;
        let last = range.last.checked_sub(location.lineno)?;
        if last >= lines.len() {
            return None;
        }

        let indent: String = lines[first]
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect();
        if !lines[last].ends_with('\n') {
            lines[last].push('\n');
        }
        lines.insert(
            last + 1,
            format!("{}{}{}: {}\n", indent, INDENT, REC_KEY, quoted(rec)),
        );
    }
    Some(lines.concat())
}
