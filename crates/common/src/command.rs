use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Label used in prompts for codes outside a target's enumeration.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Kind of record a batch command is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Target {
    Scan,
    Scanner,
}

impl Target {
    /// Commands the server accepts for this target.
    pub fn actions(self) -> &'static [Action] {
        match self {
            Target::Scan => &[
                Action::Create,
                Action::Start,
                Action::Pause,
                Action::Resume,
                Action::Stop,
                Action::Retrieve,
                Action::Delete,
            ],
            Target::Scanner => &[Action::Delete],
        }
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Noun used when counting records in a prompt.
    pub fn noun(self) -> &'static str {
        self.as_str()
    }

    /// Human-readable label for `command`, or `"unknown"`.
    pub fn label(self, command: &Command) -> &'static str {
        command
            .action()
            .filter(|a| self.actions().contains(a))
            .map(Action::label)
            .unwrap_or(UNKNOWN_LABEL)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, IntoStaticStr)]
pub enum Action {
    #[strum(serialize = "CR")]
    Create,
    #[strum(serialize = "ST")]
    Start,
    #[strum(serialize = "PS")]
    Pause,
    #[strum(serialize = "RS")]
    Resume,
    #[strum(serialize = "SP")]
    Stop,
    #[strum(serialize = "RT")]
    Retrieve,
    #[strum(serialize = "DL")]
    Delete,
}

impl Action {
    pub fn code(self) -> &'static str {
        self.into()
    }

    pub fn label(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Start => "start",
            Action::Pause => "pause",
            Action::Resume => "resume",
            Action::Stop => "stop",
            Action::Retrieve => "retrieve",
            Action::Delete => "delete",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Action::iter().find(|a| a.label().eq_ignore_ascii_case(label))
    }
}

/// A batch command code, sent to the server verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(String);

impl Command {
    /// Wraps a raw code without any validation.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Accepts a code (`ST`) or a label (`start`); anything else is kept as typed.
    pub fn parse(input: &str) -> Self {
        match Action::from_label(input) {
            Some(action) => action.into(),
            None => Self::new(input),
        }
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn action(&self) -> Option<Action> {
        Action::from_str(&self.0).ok()
    }
}

impl From<Action> for Command {
    fn from(action: Action) -> Self {
        Self::new(action.code())
    }
}

impl FromStr for Command {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_labels() {
        let expected = [
            ("CR", "create"),
            ("ST", "start"),
            ("PS", "pause"),
            ("RS", "resume"),
            ("SP", "stop"),
            ("RT", "retrieve"),
            ("DL", "delete"),
        ];
        for (code, label) in expected {
            assert_eq!(Target::Scan.label(&Command::new(code)), label);
        }
        assert_eq!(Target::Scan.label(&Command::new("XX")), "unknown");
    }

    #[test]
    fn scanner_only_knows_delete() {
        assert_eq!(Target::Scanner.label(&Command::new("DL")), "delete");
        assert_eq!(Target::Scanner.label(&Command::new("ST")), "unknown");
    }

    #[test]
    fn parse_accepts_labels_and_keeps_unknown_codes() {
        assert_eq!(Command::parse("start").code(), "ST");
        assert_eq!(Command::parse("Retrieve").code(), "RT");
        assert_eq!(Command::parse("PS").code(), "PS");
        assert_eq!(Command::parse("zz").code(), "zz");
        assert_eq!(Command::parse("zz").action(), None);
    }

    #[test]
    fn target_wire_names() {
        assert_eq!(Target::Scan.to_string(), "scan");
        assert_eq!("scanner".parse::<Target>().unwrap(), Target::Scanner);
        assert_eq!(serde_json::to_string(&Target::Scanner).unwrap(), "\"scanner\"");
    }
}
