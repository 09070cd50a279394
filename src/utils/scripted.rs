//! Scripted prompter implementation for testing

use std::collections::VecDeque;

use crate::traits::*;
use crate::types::*;

/// Token that a script uses to press the cancel key
pub const CANCEL: &str = "<cancel>";

/// Prompter that replays canned answers and records everything shown
///
/// An empty answer takes the question's default, as a console would. Running
/// out of answers behaves like closed input.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    /// Questions asked, in order
    pub asked: Vec<String>,
    /// Informational lines shown
    pub said: Vec<String>,
    /// Warning lines shown
    pub warned: Vec<String>,
}

impl ScriptedPrompter {
    /// Create a prompter that answers with `answers` in order
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Answers not consumed yet
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &Question) -> ImportResult<Reply> {
        self.asked.push(question.text.clone());
        let answer = self.answers.pop_front().ok_or(ImportError::PromptClosed)?;

        if answer == CANCEL {
            return Ok(Reply::Cancel);
        }
        match (&question.default, answer.trim().is_empty()) {
            (Some(default), true) => Ok(Reply::Text(default.clone())),
            _ => Ok(Reply::Text(answer)),
        }
    }

    fn say(&mut self, message: &str) {
        self.said.push(message.to_string());
    }

    fn warn(&mut self, message: &str) {
        self.warned.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_answers_and_defaults() {
        let mut prompter = ScriptedPrompter::new(["", "x", CANCEL]);
        let question = Question::new("? ").with_default("d");

        assert_eq!(prompter.ask(&question).unwrap(), Reply::Text("d".to_string()));
        assert_eq!(prompter.ask(&question).unwrap(), Reply::Text("x".to_string()));
        assert_eq!(prompter.ask(&question).unwrap(), Reply::Cancel);
        assert!(matches!(
            prompter.ask(&question),
            Err(ImportError::PromptClosed)
        ));
        assert_eq!(prompter.asked.len(), 4);
    }

    #[test]
    fn test_ask_valid_reprompts() {
        let mut prompter = ScriptedPrompter::new(["nope", "42"]);
        let value = ask_valid(&mut prompter, &Question::new("n? "), |s| {
            s.parse::<u32>()
                .map_err(|_| ImportError::Validation("Not a number".to_string()))
        })
        .unwrap();

        assert_eq!(value, Some(42));
        assert_eq!(prompter.warned, vec!["Not a number".to_string()]);
    }
}
