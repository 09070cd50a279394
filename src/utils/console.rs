//! Line-based terminal prompter

use std::io::{self, BufRead, Write};

use crate::traits::*;
use crate::types::*;

const CTRL_X: char = '\u{18}';
const ESCAPE: char = '\u{1b}';

/// Prompter reading answers from a line source and writing prompts to a sink
///
/// A line holding only Ctrl-X or Escape is the cancel key.
pub struct ConsolePrompter<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompter<io::StdinLock<'static>, io::Stderr> {
    /// Prompter on stdin, writing to stderr so stdout carries only ledger text
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> ConsolePrompter<R, W> {
    /// Create a prompter over arbitrary streams
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn line(&mut self, text: &str) {
        // a broken terminal is noticed by the next read
        let _ = writeln!(self.output, "{}", text);
    }
}

impl<R: BufRead, W: Write> Prompter for ConsolePrompter<R, W> {
    fn ask(&mut self, question: &Question) -> ImportResult<Reply> {
        if let Some(hint) = &question.hint {
            self.line(&format!("    {}", hint));
        }
        match &question.default {
            Some(default) => write!(self.output, "{}[{}] ", question.text, default)?,
            None => write!(self.output, "{}", question.text)?,
        }
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Err(ImportError::PromptClosed);
        }
        let answer = answer.trim_end_matches(['\r', '\n']);

        if answer.trim() == CTRL_X.to_string() || answer.trim() == ESCAPE.to_string() {
            self.line("...Canceling");
            return Ok(Reply::Cancel);
        }
        match (&question.default, answer.trim().is_empty()) {
            (Some(default), true) => Ok(Reply::Text(default.clone())),
            _ => Ok(Reply::Text(answer.to_string())),
        }
    }

    fn say(&mut self, message: &str) {
        self.line(message);
    }

    fn warn(&mut self, message: &str) {
        self.line(&format!("warning: {}", message));
    }
}
