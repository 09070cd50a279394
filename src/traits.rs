//! Traits for the interactive and input seams of the importer

use std::path::Path;

use crate::types::*;

/// A question put to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Prompt text, e.g. `...Reconcile, Insert or Skip? > `
    pub text: String,
    /// Answer used when the user enters nothing
    pub default: Option<String>,
    /// Short help line listing the accepted answers
    pub hint: Option<String>,
}

impl Question {
    /// Create a question without default or hint
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            default: None,
            hint: None,
        }
    }

    /// Set the answer used on empty input
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set the help line
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// What the user answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text entered (the default already substituted for empty input)
    Text(String),
    /// The cancel key was pressed
    Cancel,
}

/// Interaction abstraction for the importer
///
/// Every prompt blocks until answered. `ask` returns
/// [`ImportError::PromptClosed`] once no more input can be read.
pub trait Prompter {
    /// Ask a question and wait for the answer
    fn ask(&mut self, question: &Question) -> ImportResult<Reply>;

    /// Show an informational line
    fn say(&mut self, message: &str);

    /// Show a warning line
    fn warn(&mut self, message: &str);
}

/// Ask until `parse` accepts the answer
///
/// Invalid answers are reported and the question is asked again; they never
/// reach the caller. `Ok(None)` means the user cancelled.
pub fn ask_valid<P, T, F>(prompter: &mut P, question: &Question, mut parse: F) -> ImportResult<Option<T>>
where
    P: Prompter + ?Sized,
    F: FnMut(&str) -> ImportResult<T>,
{
    loop {
        match prompter.ask(question)? {
            Reply::Cancel => return Ok(None),
            Reply::Text(text) => match parse(text.trim()) {
                Ok(value) => return Ok(Some(value)),
                Err(ImportError::Validation(message)) => {
                    tracing::debug!(input = %text, %message, "rejected answer");
                    prompter.warn(&message);
                }
                Err(other) => return Err(other),
            },
        }
    }
}

/// A bank statement as delivered by a statement parser
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Bank account id of the statement
    pub account_id: String,
    /// Default currency declared by the statement
    pub currency: Option<String>,
    /// Transactions in statement order
    pub transactions: Vec<TransactionRecord>,
}

/// Parser abstraction for bank-statement containers
pub trait StatementReader {
    /// Read and parse the statement at `path`
    fn read(&self, path: &Path) -> ImportResult<Statement>;
}
