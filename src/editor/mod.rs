//! Interactive editing of an entry before it is committed
//!
//! The editor is a small state machine. It waits for a command, edits the
//! selected field, and goes back to waiting until the entry is saved:
//!
//! ```text
//! AwaitingCommand --(d|f|p|n|t|l|o)--> Edit(field) --(done | cancel)--> AwaitingCommand
//! AwaitingCommand --(s)--> Save
//! ```
//!
//! A cancelled field edit leaves the field as it was. Cancelling at the
//! command prompt abandons the entry; the caller leaves its record
//! unresolved.

pub mod command;

pub use command::*;

use crate::ledger::builder::{build_postings, BuildSettings, PostingBuilder, CANCEL_HINT};
use crate::ledger::format::{format_amount, render_entry};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{parse_date, parse_tokens};

/// Where the editor is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    AwaitingCommand,
    Edit(Field),
    Save,
}

/// How an editing session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The entry is ready to be written
    Saved,
    /// The user backed out; nothing should be written
    Abandoned,
}

/// Edits one entry in place
pub struct EntryEditor<'a> {
    entry: &'a mut LedgerEntry,
    record: &'a TransactionRecord,
    target_account: &'a str,
    settings: &'a BuildSettings,
    state: EditState,
}

impl<'a> EntryEditor<'a> {
    /// Editor for `entry`, which was built or matched for `record`
    pub fn new(
        entry: &'a mut LedgerEntry,
        record: &'a TransactionRecord,
        target_account: &'a str,
        settings: &'a BuildSettings,
    ) -> Self {
        Self {
            entry,
            record,
            target_account,
            settings,
            state: EditState::AwaitingCommand,
        }
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    /// Drive the editor until the entry is saved or abandoned
    pub fn run<P: Prompter + ?Sized>(&mut self, prompter: &mut P) -> ImportResult<EditOutcome> {
        loop {
            match self.state {
                EditState::AwaitingCommand => {
                    prompter.say(render_entry(self.entry).trim_end());
                    let question = Question::new("...Edit? > ")
                        .with_default("s")
                        .with_hint(EDIT_HINT);
                    match ask_valid(prompter, &question, str::parse::<EditCommand>)? {
                        Some(EditCommand::Edit(field)) => self.state = EditState::Edit(field),
                        Some(EditCommand::Save) => self.state = EditState::Save,
                        None => {
                            tracing::debug!(record = %self.record.id, "entry abandoned");
                            return Ok(EditOutcome::Abandoned);
                        }
                    }
                }
                EditState::Edit(field) => {
                    let changed = self.edit(prompter, field)?;
                    if changed {
                        tracing::debug!(record = %self.record.id, %field, "field edited");
                    }
                    self.state = EditState::AwaitingCommand;
                }
                EditState::Save => return Ok(EditOutcome::Saved),
            }
        }
    }

    /// Edit a single field; returns whether it changed
    fn edit<P: Prompter + ?Sized>(&mut self, prompter: &mut P, field: Field) -> ImportResult<bool> {
        match field {
            Field::Date => {
                let question = self.question("...Date? > ", Some(self.entry.date.to_string()));
                Ok(match ask_valid(prompter, &question, parse_date)? {
                    Some(date) => replace(&mut self.entry.date, date),
                    None => false,
                })
            }
            Field::Flag => {
                let question = self.question("...Flag? > ", Some(self.entry.flag.to_string()));
                Ok(match ask_valid(prompter, &question, str::parse::<Flag>)? {
                    Some(flag) => replace(&mut self.entry.flag, flag),
                    None => false,
                })
            }
            Field::Payee => {
                let question = self.question("...Payee? > ", self.entry.payee.clone());
                Ok(match ask_valid(prompter, &question, optional_text)? {
                    Some(payee) => replace(&mut self.entry.payee, payee),
                    None => false,
                })
            }
            Field::Narration => {
                let question = self.question("...Narration? > ", self.entry.narration.clone());
                Ok(match ask_valid(prompter, &question, optional_text)? {
                    Some(narration) => replace(&mut self.entry.narration, narration),
                    None => false,
                })
            }
            Field::Tags => {
                let question = self.question("...Tags? > ", None);
                Ok(match ask_valid(prompter, &question, |s| parse_tokens(s, '#'))? {
                    Some(Some(tags)) => replace(&mut self.entry.tags, tags),
                    _ => false,
                })
            }
            Field::Links => {
                let question = self.question("...Links? > ", None);
                Ok(match ask_valid(prompter, &question, |s| parse_tokens(s, '^'))? {
                    Some(Some(links)) => replace(&mut self.entry.links, links),
                    _ => false,
                })
            }
            Field::Postings => self.rebuild_postings(prompter),
        }
    }

    /// Start the postings over from empty
    ///
    /// The old postings stay in place until the new set balances, so a
    /// cancelled rebuild changes nothing.
    fn rebuild_postings<P: Prompter + ?Sized>(&mut self, prompter: &mut P) -> ImportResult<bool> {
        prompter.say(&format!(
            "...Rebuilding postings for {}",
            format_amount(&self.record.amount)
        ));
        let builder = PostingBuilder::new(
            self.record,
            self.target_account,
            &self.settings.default_currency,
        );
        match build_postings(prompter, builder, self.settings)? {
            Some(postings) => {
                self.entry.postings = postings;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn question(&self, text: &str, default: Option<String>) -> Question {
        let question = Question::new(text).with_hint(CANCEL_HINT);
        match default {
            Some(default) => question.with_default(default),
            None => question,
        }
    }
}

fn optional_text(text: &str) -> ImportResult<Option<String>> {
    let text = text.trim();
    Ok(if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    })
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::scripted::{ScriptedPrompter, CANCEL};
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn record() -> TransactionRecord {
        TransactionRecord::new(
            "1001".to_string(),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            "ACME".to_string(),
            dec("-42.50"),
        )
    }

    fn built_entry(record: &TransactionRecord) -> LedgerEntry {
        let mut builder = PostingBuilder::new(record, "Assets:Checking", "USD");
        builder
            .add_posting("Expenses:Shopping", dec("42.50"), "USD")
            .unwrap();
        let mut entry = LedgerEntry::new(record.date, Flag::Complete, Some(record.payee.clone()));
        entry.postings = builder.finish().unwrap();
        entry
    }

    fn settings() -> BuildSettings {
        BuildSettings::new("USD").with_default_currency_only(true)
    }

    #[test]
    fn test_save_immediately() {
        let record = record();
        let mut entry = built_entry(&record);
        let original = entry.clone();
        let settings = settings();
        let mut prompter = ScriptedPrompter::new([""]);

        let mut editor = EntryEditor::new(&mut entry, &record, "Assets:Checking", &settings);
        assert_eq!(editor.state(), EditState::AwaitingCommand);
        assert_eq!(editor.run(&mut prompter).unwrap(), EditOutcome::Saved);
        assert_eq!(editor.state(), EditState::Save);
        assert_eq!(entry, original);
    }

    #[test]
    fn test_edit_fields_then_save() {
        let record = record();
        let mut entry = built_entry(&record);
        let settings = settings();
        let mut prompter = ScriptedPrompter::new([
            "d", "2024-02-30", "2024-03-07",
            "f", "?", "!",
            "n", "Groceries",
            "t", "#food bad!tag", "#food trip-2024",
            "l", "^receipt-1",
            "p", "Acme Corp",
            "s",
        ]);

        let outcome = EntryEditor::new(&mut entry, &record, "Assets:Checking", &settings)
            .run(&mut prompter)
            .unwrap();

        assert_eq!(outcome, EditOutcome::Saved);
        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(entry.flag, Flag::Incomplete);
        assert_eq!(entry.narration.as_deref(), Some("Groceries"));
        assert_eq!(entry.payee.as_deref(), Some("Acme Corp"));
        assert_eq!(
            entry.tags.iter().map(String::as_str).collect::<Vec<_>>(),
            ["food", "trip-2024"]
        );
        assert!(entry.links.contains("receipt-1"));
        assert_eq!(prompter.warned.len(), 3);
    }

    #[test]
    fn test_flag_accepts_only_ledger_flags() {
        let record = record();
        let mut entry = built_entry(&record);
        let settings = settings();
        let mut prompter = ScriptedPrompter::new(["f", "txn", "!", "s"]);

        EntryEditor::new(&mut entry, &record, "Assets:Checking", &settings)
            .run(&mut prompter)
            .unwrap();

        assert_eq!(entry.flag, Flag::Incomplete);
        assert_eq!(prompter.warned, vec!["Flag must be '*' or '!', got 'txn'".to_string()]);
    }

    #[test]
    fn test_cancel_and_empty_leave_fields_unchanged() {
        let record = record();
        let mut entry = built_entry(&record);
        entry.tags.insert("keep".to_string());
        let original = entry.clone();
        let settings = settings();
        let mut prompter = ScriptedPrompter::new([
            "d", CANCEL,
            "t", "",
            "l", CANCEL,
            "x",
            "o", "Expenses:Food", CANCEL,
            "s",
        ]);

        let outcome = EntryEditor::new(&mut entry, &record, "Assets:Checking", &settings)
            .run(&mut prompter)
            .unwrap();

        assert_eq!(outcome, EditOutcome::Saved);
        assert_eq!(entry, original);
        assert_eq!(prompter.warned, vec!["Please enter a valid response".to_string()]);
    }

    #[test]
    fn test_rebuild_postings_rebalances() {
        let record = record();
        let mut entry = built_entry(&record);
        let settings = settings();
        let mut prompter = ScriptedPrompter::new([
            "o",
            "Expenses:Food", "30",
            "Expenses:Home", "",
            "s",
        ]);

        EntryEditor::new(&mut entry, &record, "Assets:Checking", &settings)
            .run(&mut prompter)
            .unwrap();

        assert_eq!(entry.postings.len(), 3);
        assert_eq!(entry.positive_total(), dec("42.50"));
        assert!(entry.is_balanced());
        assert!(entry.reconciles("Assets:Checking", None, "1001"));
    }

    #[test]
    fn test_cancel_at_command_abandons() {
        let record = record();
        let mut entry = built_entry(&record);
        let settings = settings();
        let mut prompter = ScriptedPrompter::new([CANCEL]);

        let outcome = EntryEditor::new(&mut entry, &record, "Assets:Checking", &settings)
            .run(&mut prompter)
            .unwrap();
        assert_eq!(outcome, EditOutcome::Abandoned);
    }

    #[test]
    fn test_closed_input_propagates() {
        let record = record();
        let mut entry = built_entry(&record);
        let settings = settings();
        let mut prompter = ScriptedPrompter::new(["d"]);

        let result = EntryEditor::new(&mut entry, &record, "Assets:Checking", &settings)
            .run(&mut prompter);
        assert!(matches!(result, Err(ImportError::PromptClosed)));
    }
}
