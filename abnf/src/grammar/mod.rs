//! [ABNF][1] grammar parser
//!
//! Augmented Backus–Naur Form is the grammar notation used throughout the
//! RFC series. This module parses RFC 5234 grammar text (with the RFC 7405
//! `%s`/`%i` string prefixes) into a [`Grammar`]: an ordered list of named
//! rules over a recursive [`Element`](ast::Element) tree. The companion
//! [`validator`](crate::validator) module interprets that tree against an
//! input string.
//!
//! # Example
//!
//! ```
//! # use abnf::grammar::{self, ParseOptions};
//! # fn main() -> Result<(), grammar::Error> {
//! let grammar = grammar::parse(
//!     "date = 4DIGIT \"-\" 2DIGIT \"-\" 2DIGIT\r\n",
//!     ParseOptions::default(),
//! )?;
//!
//! assert_eq!(grammar.rules().len(), 1);
//! assert_eq!(grammar.rules()[0].name.as_str(), "date");
//! # Ok(())
//! # }
//! ```
//!
//! [1]: https://www.rfc-editor.org/rfc/rfc5234

pub mod ast;
pub mod core;
mod parser;

use std::path::Path;

use self::{
    ast::Grammar,
    parser::GrammarParser,
};

/// Grammar parser error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parse error:\n{0}")]
    Parse(String),

    #[error("duplicate rule: {name}")]
    DuplicateRule { name: String },

    #[error("incremental alternative for undefined rule: {name}")]
    UndefinedIncremental { name: String },
}

/// Set of code points permitted in quoted literals and in the `VCHAR` core
/// rule.
#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Ascii,
    Latin1,
    Unicode,
}

/// Knobs for [`parse`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    /// Accept a bare `\n` as a line ending anywhere CRLF is expected.
    pub allow_unix_newlines: bool,

    /// The grammar text need not end with a newline.
    pub allow_omitting_final_newline: bool,

    /// Code points allowed inside quoted literals.
    pub encoding: Encoding,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            allow_unix_newlines: true,
            allow_omitting_final_newline: true,
            encoding: Encoding::default(),
        }
    }
}

/// Parse grammar source to a [`Grammar`].
///
/// Repeated `=/` definitions are folded into a single rule; rule order is
/// first-appearance order.
pub fn parse(input: &str, options: ParseOptions) -> Result<Grammar, Error> {
    tracing::trace!(bytes = input.len(), "parsing grammar");

    let definitions = match GrammarParser::new(options).parse_complete(input) {
        Ok((_, definitions)) => definitions,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(Error::Parse(nom::error::convert_error(input, e)))
        }
        _ => unreachable!(),
    };

    let mut grammar = Grammar::default();
    for definition in definitions {
        if definition.incremental {
            grammar.extend(definition.name, definition.element)?;
        } else {
            grammar.define(definition.name, definition.element)?;
        }
    }

    Ok(grammar)
}

/// Parse a grammar from a source file.
pub fn parse_from_source(path: impl AsRef<Path>) -> Result<Grammar, crate::Error> {
    let source = std::fs::read_to_string(path)?;
    let grammar = parse(&source, ParseOptions::default())?;
    Ok(grammar)
}

#[cfg(test)]
mod tests {
    use super::{
        ast::Element,
        *,
    };

    #[test]
    fn it_preserves_rule_order() {
        let grammar = parse("b = \"1\"\r\na = \"2\"\r\nc = \"3\"\r\n", ParseOptions::default())
            .unwrap();
        let names = grammar
            .rules()
            .iter()
            .map(|rule| rule.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["b", "a", "c"]);
    }

    #[test]
    fn it_folds_incremental_alternatives() {
        let grammar = parse(
            "a = \"x\"\r\nb = \"q\"\r\na =/ \"y\"\r\n",
            ParseOptions::default(),
        )
        .unwrap();

        let names = grammar
            .rules()
            .iter()
            .map(|rule| rule.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["a", "b"]);

        assert_eq!(
            grammar.get("a").unwrap().element,
            Element::Alternation(vec![
                Element::Literal {
                    text: "x".to_owned(),
                    case_sensitive: false,
                },
                Element::Literal {
                    text: "y".to_owned(),
                    case_sensitive: false,
                },
            ])
        );
    }

    #[test]
    fn it_rejects_duplicate_rules() {
        assert!(matches!(
            parse("a = \"x\"\r\nA = \"y\"\r\n", ParseOptions::default()),
            Err(Error::DuplicateRule { .. })
        ));
        assert!(matches!(
            parse("a =/ \"x\"\r\n", ParseOptions::default()),
            Err(Error::UndefinedIncremental { .. })
        ));
    }

    #[test]
    fn it_reports_parse_errors_with_context() {
        let error = parse("a = %x5A-41\r\n", ParseOptions::default()).unwrap_err();
        assert!(matches!(error, Error::Parse(_)));
    }

    #[test]
    fn it_round_trips_through_serialization() {
        let source = "suffix = (\"Jr.\" / \"Sr.\" / 1*(\"I\" / \"V\" / \"X\")) %x20-7E [2DIGIT]\r\n";
        let grammar = parse(source, ParseOptions::default()).unwrap();
        let rendered = grammar.to_string();
        let reparsed = parse(&rendered, ParseOptions::default()).unwrap();
        assert_eq!(grammar, reparsed);
    }
}
