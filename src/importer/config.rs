//! Run configuration

use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::types::*;

/// Default location of the payee alias file
pub const DEFAULT_PAYEES: &str = "payees.json";

/// A year, month or day that statement records are filtered to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period(String);

impl Period {
    /// Whether `date` falls inside the period
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.format("%Y-%m-%d").to_string().starts_with(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Period {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ImportError::Config(
                "Please enter a valid date format for --period (YYYY, YYYY-MM or YYYY-MM-DD)"
                    .to_string(),
            )
        };
        let parts: Vec<&str> = s.trim().split('-').collect();
        let numeric = |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());
        let in_range = |part: &str, max: u32| part.parse::<u32>().is_ok_and(|n| (1..=max).contains(&n));

        let valid = match parts[..] {
            [year] => numeric(year, 4),
            [year, month] => numeric(year, 4) && numeric(month, 2) && in_range(month, 12),
            [year, month, day] => {
                numeric(year, 4)
                    && numeric(month, 2)
                    && in_range(month, 12)
                    && numeric(day, 2)
                    && in_range(day, 31)
            }
            _ => false,
        };

        if valid {
            Ok(Period(s.trim().to_string()))
        } else {
            Err(invalid())
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a run needs to know
#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    /// Bank statement to import
    pub statement: PathBuf,
    /// Root ledger file
    pub ledger: PathBuf,
    /// File new entries are appended to; stdout when `None`
    pub output: Option<PathBuf>,
    /// Only import records inside this period
    pub period: Option<Period>,
    /// Ledger account being reconciled; looked up by `accid` when `None`
    pub account: Option<String>,
    /// Payee alias file
    pub payees: PathBuf,
    /// Use the default currency without asking on every posting
    pub use_default_currency: bool,
    /// Overrides the ledger's operating currency
    pub currency: Option<String>,
    /// Only match entries dated within this many days of the record
    pub match_window_days: Option<i64>,
}

impl ImportConfig {
    /// Configuration with defaults for everything but the two inputs
    pub fn new(statement: impl Into<PathBuf>, ledger: impl Into<PathBuf>) -> Self {
        Self {
            statement: statement.into(),
            ledger: ledger.into(),
            output: None,
            period: None,
            account: None,
            payees: PathBuf::from(DEFAULT_PAYEES),
            use_default_currency: false,
            currency: None,
            match_window_days: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_payees(mut self, payees: impl Into<PathBuf>) -> Self {
        self.payees = payees.into();
        self
    }

    pub fn with_default_currency_only(mut self, enabled: bool) -> Self {
        self.use_default_currency = enabled;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_match_window(mut self, days: i64) -> Self {
        self.match_window_days = Some(days);
        self
    }

    /// Check that the inputs exist and the options are well formed
    pub fn validate(&self) -> ImportResult<()> {
        for input in [&self.statement, &self.ledger] {
            if !input.is_file() {
                return Err(ImportError::InputNotFound(input.clone()));
            }
        }
        if let Some(account) = &self.account {
            crate::utils::validation::validate_account(account)
                .map_err(|e| ImportError::Config(format!("--account: {}", e)))?;
        }
        if let Some(currency) = &self.currency {
            crate::utils::validation::validate_currency(currency)
                .map_err(|e| ImportError::Config(format!("--currency: {}", e)))?;
        }
        if self.match_window_days.is_some_and(|days| days < 0) {
            return Err(ImportError::Config(
                "--window must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Output file, if any
    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }
}
