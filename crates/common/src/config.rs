use std::{fs, path::Path, str::FromStr};

use logos::Logos;
use strum::EnumString;
use thiserror::Error;
use url::Url;

use crate::grid::DEFAULT_PAGE_LEN;

const DEFAULT_CONFIG: &str = include_str!("../assets/default.conf");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("line {line}: unrecognized character")]
    Lex { line: usize },
    #[error("line {line}: unknown statement {name:?}")]
    UnknownStatement { line: usize, name: String },
    #[error("line {line}: {statement} requires {expected} argument(s), got {got}")]
    Arity {
        line: usize,
        statement: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("line {line}: invalid server url: {source}")]
    Url {
        line: usize,
        #[source]
        source: url::ParseError,
    },
    #[error("line {line}: invalid page length {value:?}")]
    PageLength { line: usize, value: String },
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// Represents valid tokens in a configuration file.
#[derive(Debug, Logos)]
enum Token {
    #[regex("[ \t]+")]
    ArgDelim,

    #[token("\n")]
    StatementDelim,

    #[regex("[^ \t\n]+", |lex| lex.slice().to_owned())]
    String(String),
}

#[derive(Debug, EnumString, Clone, Copy)]
enum Statement {
    SetServer,
    PageLength,
    CsrfToken,
    Bind,
}

impl Statement {
    fn name(self) -> &'static str {
        match self {
            Statement::SetServer => "SetServer",
            Statement::PageLength => "PageLength",
            Statement::CsrfToken => "CsrfToken",
            Statement::Bind => "Bind",
        }
    }

    fn arity(self) -> usize {
        match self {
            Statement::SetServer | Statement::PageLength | Statement::CsrfToken => 1,
            Statement::Bind => 2,
        }
    }
}

/// A key sequence and the name of the action it triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub keys: String,
    pub action: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: Url,
    pub page_length: usize,
    /// Anti-forgery token to use instead of the server-issued cookie.
    pub csrf_token: Option<String>,
    pub bindings: Vec<Binding>,
}

impl Settings {
    fn empty() -> Self {
        Self {
            server: Url::parse("http://localhost:8000/").expect("static url"),
            page_length: DEFAULT_PAGE_LEN,
            csrf_token: None,
            bindings: vec![],
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::from_str(&fs::read_to_string(path)?)
    }

    fn apply(&mut self, line: usize, name: &str, args: &[String]) -> Result<(), ConfigError> {
        // Comment lines are lexed like any other statement.
        if name.starts_with('#') {
            return Ok(());
        }
        let statement = Statement::from_str(name).map_err(|_| ConfigError::UnknownStatement {
            line,
            name: name.to_string(),
        })?;
        if args.len() != statement.arity() {
            return Err(ConfigError::Arity {
                line,
                statement: statement.name(),
                expected: statement.arity(),
                got: args.len(),
            });
        }
        match statement {
            Statement::SetServer => {
                let mut server =
                    Url::parse(&args[0]).map_err(|source| ConfigError::Url { line, source })?;
                // Endpoints are joined relative to the base.
                if !server.path().ends_with('/') {
                    let path = format!("{}/", server.path());
                    server.set_path(&path);
                }
                self.server = server;
            }
            Statement::PageLength => {
                self.page_length = args[0]
                    .parse()
                    .ok()
                    .filter(|&n: &usize| n > 0)
                    .ok_or_else(|| ConfigError::PageLength {
                        line,
                        value: args[0].clone(),
                    })?;
            }
            Statement::CsrfToken => self.csrf_token = Some(args[0].clone()),
            Statement::Bind => self.bindings.push(Binding {
                keys: args[0].clone(),
                action: args[1].clone(),
            }),
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_str(DEFAULT_CONFIG).unwrap_or_else(|_| Self::empty())
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sanitized = s.chars().filter(|&c| c != '\r').collect::<String>();
        let lexer = Token::lexer(&sanitized);

        let mut out = Settings::empty();
        let mut line = 1;
        let mut words: Vec<String> = vec![];

        for token in lexer {
            match token {
                Ok(Token::String(s)) => words.push(s),
                Ok(Token::ArgDelim) => {}
                Ok(Token::StatementDelim) => {
                    if let Some((name, args)) = words.split_first() {
                        out.apply(line, name, args)?;
                    }
                    words.clear();
                    line += 1;
                }
                Err(()) => return Err(ConfigError::Lex { line }),
            }
        }
        if let Some((name, args)) = words.split_first() {
            out.apply(line, name, args)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let settings = Settings::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(settings.server.as_str(), "http://localhost:8000/");
        assert_eq!(settings.page_length, 10);
        assert!(settings.bindings.iter().any(|b| b.action == "Refresh"));
    }

    #[test]
    fn parses_statements_without_trailing_newline() {
        let settings =
            Settings::from_str("SetServer https://scans.example/dd\r\nCsrfToken abc\nPageLength 25").unwrap();
        assert_eq!(settings.server.as_str(), "https://scans.example/dd/");
        assert_eq!(settings.csrf_token.as_deref(), Some("abc"));
        assert_eq!(settings.page_length, 25);
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let settings = Settings::from_str("# comment line\n\n  \nBind Ctrl+r Refresh\n").unwrap();
        assert_eq!(
            settings.bindings,
            vec![Binding {
                keys: "Ctrl+r".into(),
                action: "Refresh".into()
            }]
        );
    }

    #[test]
    fn reports_errors_with_line_numbers() {
        let err = Settings::from_str("PageLength 5\nFrobnicate x\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownStatement { line: 2, .. }));

        let err = Settings::from_str("Bind r\n").unwrap_err();
        assert!(matches!(err, ConfigError::Arity { expected: 2, got: 1, .. }));

        let err = Settings::from_str("PageLength 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::PageLength { .. }));

        let err = Settings::from_str("SetServer not-a-url\n").unwrap_err();
        assert!(matches!(err, ConfigError::Url { line: 1, .. }));
    }
}
