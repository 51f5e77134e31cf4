//! Classification of batch-control replies.
//!
//! The server's reply is loosely typed: every field may be missing and the
//! status is free text. [`CommandResult::classify`] turns it into an
//! [`Outcome`] so each front end matches on variants rather than strings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::command::Target;

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILURE: &str = "failure";
pub const STATUS_INVALID_COMMAND: &str = "invalid command";

/// Identifier echoed back by the server: a scan name or a PK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ident {
    Number(i64),
    Text(String),
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ident::Number(n) => write!(f, "{n}"),
            Ident::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub unsuccessful: Option<Vec<Ident>>,
    #[serde(default)]
    pub missing: Option<Vec<Ident>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureDetails {
    pub unsuccessful: Option<Vec<Ident>>,
    pub missing: Option<Vec<Ident>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(FailureDetails),
    InvalidCommand,
    Unknown(String),
    NoStatus,
}

impl CommandResult {
    pub fn classify(self) -> Outcome {
        match self.status.as_deref() {
            None => Outcome::NoStatus,
            Some(STATUS_SUCCESS) => Outcome::Success,
            Some(STATUS_FAILURE) => Outcome::Failure(FailureDetails {
                unsuccessful: self.unsuccessful,
                missing: self.missing,
            }),
            Some(STATUS_INVALID_COMMAND) => Outcome::InvalidCommand,
            Some(other) => Outcome::Unknown(other.to_string()),
        }
    }
}

/// Comma-joined, the way the browser stringified arrays.
fn join(idents: &[Ident]) -> String {
    idents
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl Outcome {
    /// Alert text for `target`, or `None` when the reply warrants silence.
    pub fn message(&self, target: Target) -> Option<String> {
        match target {
            Target::Scan => self.scan_message(),
            Target::Scanner => self.scanner_message(),
        }
    }

    fn scan_message(&self) -> Option<String> {
        match self {
            Outcome::Success => Some("Commands successfully issued.".to_string()),
            Outcome::Failure(details) => {
                let mut clauses = vec![];
                if let Some(unsuccessful) = &details.unsuccessful {
                    clauses.push(format!("Command unsuccessful on: {}", join(unsuccessful)));
                }
                if let Some(missing) = &details.missing {
                    clauses.push(format!("Objects not found for PKs: {}", join(missing)));
                }
                if clauses.is_empty() {
                    Some("Command failed.".to_string())
                } else {
                    Some(clauses.join("\n\n"))
                }
            }
            Outcome::InvalidCommand => Some(STATUS_INVALID_COMMAND.to_string()),
            Outcome::Unknown(status) if status.is_empty() => None,
            Outcome::Unknown(status) => Some(status.clone()),
            Outcome::NoStatus => None,
        }
    }

    fn scanner_message(&self) -> Option<String> {
        match self {
            Outcome::Success => Some("Success".to_string()),
            Outcome::InvalidCommand => Some("Invalid command issued".to_string()),
            Outcome::Failure(details) => Some(format!(
                "Command unsuccessful on: {} and scanner objects not found for PKs: {}",
                join(details.unsuccessful.as_deref().unwrap_or_default()),
                join(details.missing.as_deref().unwrap_or_default()),
            )),
            Outcome::Unknown(_) | Outcome::NoStatus => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(json: &str) -> Outcome {
        serde_json::from_str::<CommandResult>(json).unwrap().classify()
    }

    #[test]
    fn classifies_statuses() {
        assert_eq!(reply(r#"{"status": "success"}"#), Outcome::Success);
        assert_eq!(reply(r#"{"status": "invalid command"}"#), Outcome::InvalidCommand);
        assert_eq!(
            reply(r#"{"status": "invalid params"}"#),
            Outcome::Unknown("invalid params".into())
        );
        assert_eq!(reply(r#"{"unsuccessful": ["a"]}"#), Outcome::NoStatus);
        assert!(matches!(
            reply(r#"{"status": "failure", "missing": ["7"]}"#),
            Outcome::Failure(FailureDetails { unsuccessful: None, missing: Some(_) })
        ));
    }

    #[test]
    fn scan_failure_lists_both_clauses() {
        let msg = reply(r#"{"status": "failure", "unsuccessful": ["A"], "missing": ["B"]}"#)
            .message(Target::Scan)
            .unwrap();
        assert_eq!(msg, "Command unsuccessful on: A\n\nObjects not found for PKs: B");
    }

    #[test]
    fn scan_failure_omits_absent_clauses() {
        let only_unsuccessful = reply(r#"{"status": "failure", "unsuccessful": ["A", "C"]}"#)
            .message(Target::Scan)
            .unwrap();
        assert_eq!(only_unsuccessful, "Command unsuccessful on: A,C");

        let only_missing = reply(r#"{"status": "failure", "missing": [3, "4"]}"#)
            .message(Target::Scan)
            .unwrap();
        assert_eq!(only_missing, "Objects not found for PKs: 3,4");
        assert!(!only_missing.contains("unsuccessful"));
    }

    #[test]
    fn scan_reports_other_statuses_verbatim() {
        assert_eq!(
            reply(r#"{"status": "invalid method"}"#).message(Target::Scan),
            Some("invalid method".into())
        );
        assert_eq!(reply(r#"{"status": ""}"#).message(Target::Scan), None);
        assert_eq!(reply("{}").message(Target::Scan), None);
    }

    #[test]
    fn null_status_is_silent() {
        assert_eq!(reply(r#"{"status": null}"#), Outcome::NoStatus);
        assert_eq!(reply(r#"{"status": null}"#).message(Target::Scan), None);
        assert_eq!(reply(r#"{"status": null}"#).message(Target::Scanner), None);
    }

    #[test]
    fn scanner_alerts_are_distinct() {
        let success = reply(r#"{"status": "success"}"#).message(Target::Scanner).unwrap();
        let invalid = reply(r#"{"status": "invalid command"}"#)
            .message(Target::Scanner)
            .unwrap();
        let failure = reply(r#"{"status": "failure", "missing": ["9"]}"#)
            .message(Target::Scanner)
            .unwrap();
        assert_eq!(success, "Success");
        assert_eq!(invalid, "Invalid command issued");
        assert_eq!(
            failure,
            "Command unsuccessful on:  and scanner objects not found for PKs: 9"
        );
        assert_ne!(invalid, failure);
        assert_ne!(invalid, success);
    }

    #[test]
    fn scanner_ignores_unrecognized_statuses() {
        assert_eq!(reply(r#"{"status": "invalid params"}"#).message(Target::Scanner), None);
        assert_eq!(reply("{}").message(Target::Scanner), None);
    }
}
