//! Validation utilities for interactive input and ledger tokens

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::types::*;

/// Root names an account may start with
pub const ACCOUNT_ROOTS: [&str; 6] = [
    "Assets",
    "Liabilities",
    "Equity",
    "Capital",
    "Income",
    "Expenses",
];

/// Parse a calendar date written as `YYYY-MM-DD`
pub fn parse_date(text: &str) -> ImportResult<NaiveDate> {
    let bytes = text.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped || text.starts_with("0000") {
        return Err(ImportError::Validation(format!(
            "Not a valid date (YYYY-MM-DD): '{}'",
            text
        )));
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| ImportError::Validation(format!("Not a real calendar date: '{}'", text)))
}

/// Validate that an account name is well formed
pub fn validate_account(account: &str) -> ImportResult<()> {
    let mut components = account.split(':');
    let root = components.next().unwrap_or_default();
    if !ACCOUNT_ROOTS.contains(&root) {
        return Err(ImportError::Validation(format!(
            "Account must start with one of {}: '{}'",
            ACCOUNT_ROOTS.join(", "),
            account
        )));
    }

    let mut count = 0;
    for component in components {
        count += 1;
        let mut chars = component.chars();
        let leading_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !leading_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ImportError::Validation(format!(
                "Not a valid account component '{}' in '{}'",
                component, account
            )));
        }
    }

    if count == 0 {
        return Err(ImportError::Validation(format!(
            "Account needs at least one component below '{}'",
            root
        )));
    }

    Ok(())
}

/// Parse a decimal amount, allowing thousands separators
pub fn parse_amount(text: &str) -> ImportResult<BigDecimal> {
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty()
        || !cleaned
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == '-' || c == '+')
    {
        return Err(ImportError::Validation(format!(
            "Not a valid number: '{}'",
            text
        )));
    }

    BigDecimal::from_str(&cleaned)
        .map_err(|_| ImportError::Validation(format!("Not a valid number: '{}'", text)))
}

/// Parse an amount that must be strictly positive
pub fn parse_positive_amount(text: &str) -> ImportResult<BigDecimal> {
    let amount = parse_amount(text)?;
    if amount <= BigDecimal::from(0) {
        Err(ImportError::Validation(
            "Amount must be positive".to_string(),
        ))
    } else {
        Ok(amount)
    }
}

/// Validate a commodity name such as `USD` or `VBMPX`
pub fn validate_currency(currency: &str) -> ImportResult<()> {
    let valid = (1..=24).contains(&currency.len())
        && currency.starts_with(|c: char| c.is_ascii_uppercase())
        && currency.ends_with(|c: char| c.is_ascii_uppercase() || c.is_ascii_digit())
        && currency
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || "'._-".contains(c));

    if valid {
        Ok(())
    } else {
        Err(ImportError::Validation(format!(
            "Not a valid currency: '{}'",
            currency
        )))
    }
}

/// Check a tag or link body against `[A-Za-z0-9-_/.]+`
pub fn is_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_/.".contains(c))
}

/// Parse whitespace separated tags or links
///
/// A leading `sigil` (`#` for tags, `^` for links) on a token is optional.
/// Returns `None` for empty input, which leaves the field unchanged.
pub fn parse_tokens(text: &str, sigil: char) -> ImportResult<Option<BTreeSet<String>>> {
    let mut tokens = BTreeSet::new();
    for raw in text.split_whitespace() {
        let token = raw.strip_prefix(sigil).unwrap_or(raw);
        if !is_token(token) {
            return Err(ImportError::Validation(format!(
                "Not a valid {} '{}': use letters, digits, '-', '_', '/' or '.'",
                if sigil == '#' { "tag" } else { "link" },
                raw
            )));
        }
        tokens.insert(token.to_string());
    }

    Ok(if tokens.is_empty() { None } else { Some(tokens) })
}
