//! Per-record reconcile/insert loop

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::editor::{EditOutcome, EntryEditor};
use crate::importer::config::{ImportConfig, Period};
use crate::ledger::builder::{build_postings, BuildSettings, PostingBuilder, CANCEL_HINT};
use crate::ledger::format::{format_amount, format_head, render_entry, render_in_place};
use crate::ledger::index::LedgerIndex;
use crate::persistence::{replace_span_with, LineSpan, OutputSink};
use crate::reconciliation::{mark_reconciled, Matcher, PendingResolver, ReconcileTarget};
use crate::traits::*;
use crate::types::*;
use crate::utils::payees::PayeeAliases;

/// Help line for the per-record prompt
pub const RESOLVE_HINT: &str = "[R]econcile  [I]nsert  [S]kip  [Q]uit";
/// Help line for yes/no questions
pub const CONFIRM_HINT: &str = "[Y]es  [N]o";
/// Currency used when neither the run, the ledger nor the statement names one
pub const FALLBACK_CURRENCY: &str = "USD";

/// What to do with a pending record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveCommand {
    Reconcile,
    Insert,
    Skip,
    Quit,
}

impl FromStr for ResolveCommand {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r" | "reconcile" => Ok(ResolveCommand::Reconcile),
            "i" | "insert" => Ok(ResolveCommand::Insert),
            "s" | "skip" => Ok(ResolveCommand::Skip),
            "q" | "quit" => Ok(ResolveCommand::Quit),
            _ => Err(ImportError::Validation(
                "Please enter a valid response".to_string(),
            )),
        }
    }
}

/// Counts of what happened to the pending records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    pub reconciled: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reconciled, {} inserted, {} skipped, {} failed",
            self.reconciled, self.inserted, self.skipped, self.failed
        )
    }
}

/// Result of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub stats: ImportStats,
    /// Entries collected in memory when no output file was given
    pub output: Option<String>,
}

enum Flow {
    Continue,
    Quit,
}

/// Walks the pending records of one statement through the ledger
pub struct Importer<P: Prompter> {
    prompter: P,
    index: LedgerIndex,
    target: ReconcileTarget,
    settings: BuildSettings,
    aliases: PayeeAliases,
    sink: OutputSink,
    period: Option<Period>,
    window_days: Option<i64>,
    stats: ImportStats,
}

impl<P: Prompter> Importer<P> {
    /// Create an importer from its parts
    pub fn new(
        prompter: P,
        index: LedgerIndex,
        target: ReconcileTarget,
        settings: BuildSettings,
        aliases: PayeeAliases,
        sink: OutputSink,
    ) -> Self {
        Self {
            prompter,
            index,
            target,
            settings,
            aliases,
            sink,
            period: None,
            window_days: None,
            stats: ImportStats::default(),
        }
    }

    /// Set up an importer for `statement` as described by `config`
    ///
    /// The target account is `config.account`, or the ledger account opened
    /// with the statement's account id as `accid`. The default currency comes
    /// from the config, the ledger or the statement, in that order.
    pub fn from_config(config: &ImportConfig, statement: &Statement, mut prompter: P) -> ImportResult<Self> {
        let index = LedgerIndex::load(&config.ledger)?;
        let summary = index.summary();

        let account = match &config.account {
            Some(account) => account.clone(),
            None => summary
                .account_for(&statement.account_id)
                .map(str::to_string)
                .ok_or_else(|| {
                    ImportError::Config(format!(
                        "No account given and no ledger account has {}: \"{}\"",
                        ACCID_KEY, statement.account_id
                    ))
                })?,
        };

        let currency = match config
            .currency
            .clone()
            .or_else(|| summary.default_currency.clone())
            .or_else(|| statement.currency.clone())
        {
            Some(currency) => currency,
            None => {
                prompter.warn(&format!(
                    "No operating currency in the ledger, using {}",
                    FALLBACK_CURRENCY
                ));
                FALLBACK_CURRENCY.to_string()
            }
        };

        let settings = BuildSettings::new(currency)
            .with_default_currency_only(config.use_default_currency)
            .with_known_accounts(summary.accounts.clone());
        let target = ReconcileTarget::new(account).with_statement_account(statement.account_id.clone());
        let aliases = PayeeAliases::load(&config.payees)?;
        let sink = OutputSink::new(config.output_path());

        tracing::info!(
            account = %target.account,
            currency = %settings.default_currency,
            entries = index.entries().len(),
            "importer ready"
        );

        let mut importer = Self::new(prompter, index, target, settings, aliases, sink);
        importer.period = config.period.clone();
        importer.window_days = config.match_window_days;
        Ok(importer)
    }

    /// Only process records inside `period`
    pub fn with_period(mut self, period: Option<Period>) -> Self {
        self.period = period;
        self
    }

    /// Only match entries within `days` of the record date
    pub fn with_window(mut self, days: Option<i64>) -> Self {
        self.window_days = days;
        self
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    pub fn index(&self) -> &LedgerIndex {
        &self.index
    }

    pub fn target(&self) -> &ReconcileTarget {
        &self.target
    }

    pub fn stats(&self) -> ImportStats {
        self.stats
    }

    /// Process every pending record of `records`
    ///
    /// Failures scoped to one record are reported and counted; the run moves
    /// on to the next record. Closed input ends the run like `quit`.
    pub fn run(&mut self, records: &[TransactionRecord]) -> ImportResult<ImportStats> {
        if records.is_empty() {
            self.prompter.warn("No transactions found in statement");
            return Ok(self.stats);
        }

        let selected: Vec<&TransactionRecord> = match &self.period {
            Some(period) => records.iter().filter(|r| period.contains(r.date)).collect(),
            None => records.iter().collect(),
        };
        if let Some(period) = &self.period {
            if selected.is_empty() {
                self.prompter
                    .warn(&format!("No transactions found within period {}", period));
                return Ok(self.stats);
            }
            self.prompter.say(&format!(
                "Found {} transactions within period {}",
                selected.len(),
                period
            ));
        }

        let pending = PendingResolver::new(&self.target).resolve(selected, self.index.entries());
        if pending.is_empty() {
            self.prompter.warn("No pending transactions found");
            return Ok(self.stats);
        }
        self.prompter.say(&format!(
            "Found {} transactions not in ledger",
            pending.len()
        ));

        for record in pending {
            self.index.refresh()?;
            if !PendingResolver::new(&self.target).is_pending(record, self.index.entries()) {
                tracing::debug!(record = %record.id, "reconciled earlier in this run");
                continue;
            }

            let flow = self.process(record);
            self.save_aliases();
            match flow {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(ImportError::PromptClosed) => {
                    self.prompter.warn("Input closed, exiting");
                    break;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(record = %record.id, error = %e, "record left unresolved");
                    self.prompter.warn(&format!("{} left unresolved: {}", record.id, e));
                    self.stats.failed += 1;
                }
            }
        }

        Ok(self.stats)
    }

    /// Flush aliases and hand back the results
    pub fn finish(&mut self) -> ImportReport {
        self.save_aliases();
        ImportReport {
            stats: self.stats,
            output: self.sink.take_buffer().filter(|b| !b.is_empty()),
        }
    }

    fn process(&mut self, record: &TransactionRecord) -> ImportResult<Flow> {
        self.prompter.say(&format!("Parsing: {}", record));
        let question = Question::new("...Reconcile, Insert or Skip? > ").with_hint(RESOLVE_HINT);
        let command = ask_valid(&mut self.prompter, &question, str::parse::<ResolveCommand>)?
            .unwrap_or(ResolveCommand::Skip);

        let resolved = match command {
            ResolveCommand::Skip => false,
            ResolveCommand::Quit => {
                self.prompter.warn("Exiting");
                return Ok(Flow::Quit);
            }
            ResolveCommand::Reconcile => {
                let record = self.substitute_payee(record)?;
                self.reconcile(&record)?
            }
            ResolveCommand::Insert => {
                let record = self.substitute_payee(record)?;
                self.insert(&record)?
            }
        };

        if !resolved {
            self.prompter.say("...Skipping");
            self.stats.skipped += 1;
        }
        Ok(Flow::Continue)
    }

    /// Copy of `record` with the payee replaced by its alias
    ///
    /// Unknown payees may be renamed on the spot; the new name is remembered.
    fn substitute_payee(&mut self, record: &TransactionRecord) -> ImportResult<TransactionRecord> {
        let mut record = record.clone();

        let replacement = match self.aliases.get(&record.payee) {
            Some(alias) => Some(alias.to_string()),
            None => {
                let question = Question::new(format!("...Replace '{}'? > ", record.payee))
                    .with_hint(CANCEL_HINT);
                match self.prompter.ask(&question)? {
                    Reply::Text(text) if !text.trim().is_empty() => {
                        let typed = text.trim();
                        let alias = self.aliases.complete(typed).unwrap_or(typed).to_string();
                        self.aliases.set(&record.payee, &alias);
                        Some(alias)
                    }
                    _ => None,
                }
            }
        };

        if let Some(alias) = replacement {
            if alias != record.payee {
                self.prompter
                    .say(&format!("...Replaced {} with {}", record.payee, alias));
            }
            record.payee = alias;
        }
        Ok(record)
    }

    fn reconcile(&mut self, record: &TransactionRecord) -> ImportResult<bool> {
        self.prompter.say("...Reconciling");
        let candidates = Matcher::new(&self.target)
            .with_window(self.window_days)
            .candidates(record, self.index.entries());

        if candidates.is_empty() {
            let empty = ImportError::EmptyResult(format!(
                "no unreconciled {} postings on {}",
                format_amount(&record.magnitude()),
                self.target.account
            ));
            self.prompter.warn(&empty.to_string());
            let question = Question::new("...Insert instead? > ")
                .with_default("y")
                .with_hint(CONFIRM_HINT);
            return match ask_valid(&mut self.prompter, &question, parse_confirm)? {
                Some(true) => self.insert(record),
                _ => Ok(false),
            };
        }

        let entries = self.index.entries();
        let listing: Vec<String> = candidates
            .iter()
            .enumerate()
            .map(|(n, c)| format!("  {}) {}", n + 1, format_head(&entries[c.entry_index])))
            .collect();
        for line in &listing {
            self.prompter.say(line);
        }

        let count = candidates.len();
        let question = Question::new("...Which entry? > ")
            .with_default("1")
            .with_hint(CANCEL_HINT);
        let Some(choice) = ask_valid(&mut self.prompter, &question, |s| {
            s.parse::<usize>()
                .ok()
                .filter(|n| (1..=count).contains(n))
                .ok_or_else(|| {
                    ImportError::Validation(format!("Please enter a number from 1 to {}", count))
                })
        })?
        else {
            return Ok(false);
        };

        let candidate = &candidates[choice - 1];
        let loaded = self.index.entries()[candidate.entry_index].clone();
        let mut entry = loaded.clone();
        mark_reconciled(&mut entry, candidate.posting_index, &record.id)?;
        let span = LineSpan::of_entry(&entry)?;

        if self.edit(&mut entry, record)? == EditOutcome::Abandoned {
            return Ok(false);
        }

        if let Err(e) = replace_span_with(&span, |current| render_in_place(current, &loaded, &entry)) {
            self.index.invalidate(&span.path);
            return Err(e);
        }
        self.index.mark_written(&span.path);
        self.stats.reconciled += 1;
        tracing::info!(record = %record.id, path = %span.path.display(), "reconciled");
        Ok(true)
    }

    fn insert(&mut self, record: &TransactionRecord) -> ImportResult<bool> {
        if record.magnitude() == BigDecimal::from(0) {
            tracing::warn!(record = %record.id, "zero amount, nothing to insert");
            self.prompter
                .warn(&format!("{} has a zero amount, nothing to insert", record.id));
            return Ok(false);
        }
        self.prompter.say("...Inserting");
        let builder = PostingBuilder::new(record, &self.target.account, &self.settings.default_currency);
        let Some(postings) = build_postings(&mut self.prompter, builder, &self.settings)? else {
            return Ok(false);
        };

        let mut entry = LedgerEntry::new(record.date, Flag::Complete, Some(record.payee.clone()));
        entry.postings = postings;

        if self.edit(&mut entry, record)? == EditOutcome::Abandoned {
            return Ok(false);
        }
        if entry.positive_total() != record.magnitude() {
            return Err(ImportError::Validation(format!(
                "postings total {} instead of {}",
                format_amount(&entry.positive_total()),
                format_amount(&record.magnitude())
            )));
        }

        self.sink.append(&render_entry(&entry))?;
        if let Some(path) = self.sink.path() {
            self.index.mark_written(path);
        }
        self.stats.inserted += 1;
        tracing::info!(record = %record.id, "inserted");
        Ok(true)
    }

    fn edit(&mut self, entry: &mut LedgerEntry, record: &TransactionRecord) -> ImportResult<EditOutcome> {
        EntryEditor::new(entry, record, &self.target.account, &self.settings).run(&mut self.prompter)
    }

    fn save_aliases(&mut self) {
        if !self.aliases.is_dirty() {
            return;
        }
        if let Err(e) = self.aliases.save() {
            tracing::warn!(error = %e, "payee aliases not saved");
            self.prompter.warn(&e.to_string());
        }
    }
}

fn parse_confirm(text: &str) -> ImportResult<bool> {
    match text.to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Err(ImportError::Validation(
            "Please enter a valid response".to_string(),
        )),
    }
}
