//! Posting construction for new entries
//!
//! The builder collects the counter postings for a bank record until their
//! total reaches the record's absolute amount, then closes the entry with a
//! posting on the reconciled account carrying the record's `rec` marker.

use bigdecimal::BigDecimal;
use std::collections::BTreeSet;

use crate::ledger::format::format_amount;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{parse_positive_amount, validate_account, validate_currency};

/// Hint shown while a prompt can be cancelled
pub const CANCEL_HINT: &str = "[c-x] to Cancel";

/// Currency and account context for building postings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// Currency used for, or offered as default on, every posting
    pub default_currency: String,
    /// Use `default_currency` without asking
    pub use_default_currency: bool,
    /// Accounts opened in the ledger; empty disables the check
    pub known_accounts: BTreeSet<String>,
}

impl BuildSettings {
    /// Settings that prompt for a currency on each posting
    pub fn new(default_currency: impl Into<String>) -> Self {
        Self {
            default_currency: default_currency.into(),
            use_default_currency: false,
            known_accounts: BTreeSet::new(),
        }
    }

    /// Skip the per-posting currency prompt
    pub fn with_default_currency_only(mut self, enabled: bool) -> Self {
        self.use_default_currency = enabled;
        self
    }

    /// Warn about accounts outside this set
    pub fn with_known_accounts(mut self, accounts: BTreeSet<String>) -> Self {
        self.known_accounts = accounts;
        self
    }
}

/// Accumulates balanced postings for one bank record
#[derive(Debug, Clone)]
pub struct PostingBuilder {
    record_id: String,
    amount: BigDecimal,
    target_account: String,
    default_currency: String,
    postings: Vec<Posting>,
    total: BigDecimal,
}

impl PostingBuilder {
    /// Start an empty builder for `record`, closing on `target_account`
    pub fn new(record: &TransactionRecord, target_account: &str, default_currency: &str) -> Self {
        Self {
            record_id: record.id.clone(),
            amount: record.amount.clone(),
            target_account: target_account.to_string(),
            default_currency: default_currency.to_string(),
            postings: Vec::new(),
            total: BigDecimal::from(0),
        }
    }

    /// The absolute amount the counter postings must reach
    pub fn target(&self) -> BigDecimal {
        self.amount.abs()
    }

    /// Sum of the counter postings so far
    pub fn total(&self) -> &BigDecimal {
        &self.total
    }

    /// What is left before the entry balances
    pub fn remaining(&self) -> BigDecimal {
        self.target() - &self.total
    }

    /// Whether the counter postings reach the target exactly
    pub fn is_balanced(&self) -> bool {
        self.total == self.target()
    }

    /// Counter postings collected so far
    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    /// Add `amount` (positive) on `account`
    ///
    /// Counter postings take the opposite sign of the bank amount, so a
    /// withdrawal yields positive postings and a deposit negative ones. A
    /// second posting on the same account is merged into the first.
    pub fn add_posting(&mut self, account: &str, amount: BigDecimal, currency: &str) -> ImportResult<()> {
        validate_account(account)?;
        validate_currency(currency)?;
        if amount <= BigDecimal::from(0) {
            return Err(ImportError::Validation("Amount must be positive".to_string()));
        }
        if account == self.target_account {
            return Err(ImportError::Validation(format!(
                "{} is the account being reconciled",
                account
            )));
        }
        if amount > self.remaining() {
            return Err(ImportError::Validation(format!(
                "{} exceeds the remaining {}",
                format_amount(&amount),
                format_amount(&self.remaining())
            )));
        }

        let signed = if self.amount < BigDecimal::from(0) {
            amount
        } else {
            -amount
        };

        match self.postings.iter_mut().find(|p| p.account == account) {
            Some(existing) if existing.currency != currency => {
                return Err(ImportError::Validation(format!(
                    "{} already has a posting in {}",
                    account, existing.currency
                )));
            }
            Some(existing) => existing.amount += signed,
            None => self
                .postings
                .push(Posting::new(account.to_string(), signed, currency.to_string())),
        }

        self.recompute();
        Ok(())
    }

    /// Drop every counter posting
    pub fn clear(&mut self) {
        self.postings.clear();
        self.recompute();
    }

    fn recompute(&mut self) {
        self.total = self.postings.iter().map(|p| p.amount.abs()).sum();
    }

    /// Close the entry with the posting on the reconciled account
    ///
    /// The closing posting carries the full signed bank amount and the
    /// record's `rec` marker. Fails unless the counter postings balance and
    /// there is at least one of them.
    pub fn finish(self) -> ImportResult<Vec<Posting>> {
        if self.postings.is_empty() {
            return Err(ImportError::Validation(
                "An entry needs at least one counter posting".to_string(),
            ));
        }
        if !self.is_balanced() {
            return Err(ImportError::Validation(format!(
                "Postings total {} of {}",
                format_amount(&self.total),
                format_amount(&self.target())
            )));
        }

        let currency = self
            .postings
            .first()
            .map_or(self.default_currency.clone(), |p| p.currency.clone());
        let mut closing = Posting::new(self.target_account, self.amount, currency);
        closing.meta.rec = Some(self.record_id);

        let mut postings = self.postings;
        postings.push(closing);
        Ok(postings)
    }
}

/// Ask for postings until the builder balances
///
/// Returns `Ok(None)` if the user cancels; the builder's postings are
/// discarded in that case.
pub fn build_postings<P: Prompter + ?Sized>(
    prompter: &mut P,
    mut builder: PostingBuilder,
    settings: &BuildSettings,
) -> ImportResult<Option<Vec<Posting>>> {
    while !builder.is_balanced() {
        prompter.say(&format!(
            "...Remaining {} of {}",
            format_amount(&builder.remaining()),
            format_amount(&builder.target())
        ));

        let question = Question::new("...Account? > ").with_hint(CANCEL_HINT);
        let Some(account) = ask_valid(prompter, &question, |s| {
            validate_account(s)?;
            Ok(s.to_string())
        })?
        else {
            return Ok(None);
        };
        if !settings.known_accounts.is_empty() && !settings.known_accounts.contains(&account) {
            prompter.warn(&format!("{} is not opened in the ledger", account));
        }

        let question = Question::new("...Amount? > ")
            .with_default(format_amount(&builder.remaining()))
            .with_hint(CANCEL_HINT);
        let Some(amount) = ask_valid(prompter, &question, parse_positive_amount)? else {
            return Ok(None);
        };

        let currency = if settings.use_default_currency {
            settings.default_currency.clone()
        } else {
            let question = Question::new("...Currency? > ")
                .with_default(settings.default_currency.clone())
                .with_hint(CANCEL_HINT);
            let Some(currency) = ask_valid(prompter, &question, |s| {
                validate_currency(s)?;
                Ok(s.to_string())
            })?
            else {
                return Ok(None);
            };
            currency
        };

        match builder.add_posting(&account, amount, &currency) {
            Ok(()) => {}
            Err(ImportError::Validation(message)) => prompter.warn(&message),
            Err(other) => return Err(other),
        }
    }

    builder.finish().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::scripted::{ScriptedPrompter, CANCEL};
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn record(amount: &str) -> TransactionRecord {
        TransactionRecord::new(
            "1001".to_string(),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            "ACME".to_string(),
            dec(amount),
        )
    }

    #[test]
    fn test_single_posting_closes_withdrawal() {
        let mut builder = PostingBuilder::new(&record("-42.50"), "Assets:Checking", "USD");
        builder
            .add_posting("Expenses:Shopping", dec("42.50"), "USD")
            .unwrap();
        assert!(builder.is_balanced());

        let postings = builder.finish().unwrap();
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].amount, dec("42.50"));
        assert_eq!(postings[1].account, "Assets:Checking");
        assert_eq!(postings[1].amount, dec("-42.50"));
        assert_eq!(postings[1].currency, "USD");
        assert_eq!(postings[1].meta.rec.as_deref(), Some("1001"));

        let total: BigDecimal = postings.iter().map(|p| &p.amount).sum();
        assert_eq!(total, BigDecimal::from(0));
    }

    #[test]
    fn test_zero_amount_cannot_close() {
        let builder = PostingBuilder::new(&record("0.00"), "Assets:Checking", "USD");
        assert!(builder.is_balanced());
        assert!(matches!(builder.finish(), Err(ImportError::Validation(_))));
    }

    #[test]
    fn test_deposit_counter_postings_are_negative() {
        let mut builder = PostingBuilder::new(&record("100"), "Assets:Checking", "USD");
        builder.add_posting("Income:Salary", dec("100"), "USD").unwrap();
        let postings = builder.finish().unwrap();

        assert_eq!(postings[0].amount, dec("-100"));
        assert_eq!(postings[1].amount, dec("100"));

        let mut entry = LedgerEntry::new(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(), Flag::Complete, None);
        entry.postings = postings;
        assert_eq!(entry.positive_total(), dec("100"));
        assert!(entry.is_balanced());
    }

    #[test]
    fn test_merge_by_account_and_exact_total() {
        let mut builder = PostingBuilder::new(&record("-0.30"), "Assets:Checking", "USD");
        builder.add_posting("Expenses:Food", dec("0.10"), "USD").unwrap();
        builder.add_posting("Expenses:Home", dec("0.10"), "USD").unwrap();
        builder.add_posting("Expenses:Food", dec("0.10"), "USD").unwrap();

        assert_eq!(builder.postings().len(), 2);
        assert_eq!(builder.postings()[0].amount, dec("0.20"));
        assert_eq!(*builder.total(), dec("0.30"));
        assert!(builder.is_balanced());
    }

    #[test]
    fn test_rejected_postings_leave_state_unchanged() {
        let mut builder = PostingBuilder::new(&record("-10"), "Assets:Checking", "USD");
        builder.add_posting("Expenses:Food", dec("4"), "USD").unwrap();

        assert!(builder.add_posting("Expenses:Food", dec("7"), "USD").is_err());
        assert!(builder.add_posting("Expenses:Food", dec("1"), "EUR").is_err());
        assert!(builder.add_posting("Assets:Checking", dec("1"), "USD").is_err());
        assert!(builder.add_posting("Expenses:Food", dec("0"), "USD").is_err());
        assert!(builder.add_posting("food", dec("1"), "USD").is_err());

        assert_eq!(*builder.total(), dec("4"));
        assert_eq!(builder.remaining(), dec("6"));
        assert!(builder.clone().finish().is_err());

        builder.clear();
        assert_eq!(*builder.total(), BigDecimal::from(0));
    }

    #[test]
    fn test_interactive_loop_with_defaults() {
        let settings = BuildSettings::new("USD").with_default_currency_only(true);
        let mut prompter = ScriptedPrompter::new([
            "Expenses:Food",
            "30",
            "Expenses:Home",
            "",
        ]);
        let builder = PostingBuilder::new(&record("-42.50"), "Assets:Checking", "USD");

        let postings = build_postings(&mut prompter, builder, &settings)
            .unwrap()
            .unwrap();

        assert_eq!(postings.len(), 3);
        assert_eq!(postings[1].account, "Expenses:Home");
        assert_eq!(postings[1].amount, dec("12.50"));
        assert_eq!(postings[2].amount, dec("-42.50"));
        assert_eq!(prompter.remaining(), 0);
    }

    #[test]
    fn test_interactive_loop_reprompts_and_cancels() {
        let settings = BuildSettings::new("USD")
            .with_known_accounts(["Expenses:Food".to_string()].into_iter().collect());
        let mut prompter = ScriptedPrompter::new([
            "not an account",
            "Expenses:Gifts",
            "99",
            "USD",
            "Expenses:Food",
            CANCEL,
        ]);
        let builder = PostingBuilder::new(&record("-10"), "Assets:Checking", "USD");

        let result = build_postings(&mut prompter, builder, &settings).unwrap();

        assert!(result.is_none());
        assert!(prompter
            .warned
            .iter()
            .any(|w| w.contains("not opened in the ledger")));
        assert!(prompter.warned.iter().any(|w| w.contains("exceeds")));
    }
}
