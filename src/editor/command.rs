//! Commands accepted by the entry editor

use std::fmt;
use std::str::FromStr;

use crate::types::*;

/// Help line listing the editor commands
pub const EDIT_HINT: &str = "[D]ate  [F]lag  [P]ayee  [N]arration  [T]ags  [L]inks  P[O]stings  [S]ave";

/// An editable part of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    Flag,
    Payee,
    Narration,
    Tags,
    Links,
    Postings,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Date => "date",
            Field::Flag => "flag",
            Field::Payee => "payee",
            Field::Narration => "narration",
            Field::Tags => "tags",
            Field::Links => "links",
            Field::Postings => "postings",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One command typed at the editor prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditCommand {
    Edit(Field),
    Save,
}

impl FromStr for EditCommand {
    type Err = ImportError;

    /// Accepts the one-letter shortcut or the full word, in any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s.trim().to_ascii_lowercase().as_str() {
            "d" | "date" => EditCommand::Edit(Field::Date),
            "f" | "flag" => EditCommand::Edit(Field::Flag),
            "p" | "payee" => EditCommand::Edit(Field::Payee),
            "n" | "narration" => EditCommand::Edit(Field::Narration),
            "t" | "tags" => EditCommand::Edit(Field::Tags),
            "l" | "links" => EditCommand::Edit(Field::Links),
            "o" | "postings" => EditCommand::Edit(Field::Postings),
            "s" | "save" => EditCommand::Save,
            _ => {
                return Err(ImportError::Validation(
                    "Please enter a valid response".to_string(),
                ))
            }
        };
        Ok(command)
    }
}
