//! Validation engine
//!
//! Interprets a parsed [`Grammar`] against an input string. Matching is
//! non-deterministic: alternatives and variable-length repetitions may
//! match a position in several ways, and the engine enumerates them all,
//! returning the first tree that covers the whole input. Positions are
//! code-point offsets throughout.
//!
//! # Example
//!
//! ```
//! # use abnf::{
//! #     grammar::{self, ParseOptions},
//! #     validator::{self, ValidateOptions},
//! # };
//! # fn main() -> Result<(), abnf::Error> {
//! let grammar = grammar::parse(
//!     "greeting = %s\"Hello\" SP %s\"World\"\r\n",
//!     ParseOptions::default(),
//! )?;
//!
//! let tree = validator::validate(&grammar, "Hello World", None, ValidateOptions::default())?;
//! assert_eq!((tree.start, tree.end), (0, 11));
//! assert_eq!(tree.matched, "Hello World");
//! # Ok(())
//! # }
//! ```

mod matcher;
mod tree;

pub use self::tree::ParseTree;

use std::fmt;

use self::matcher::Matcher;
use crate::grammar::{
    ast::{
        Element,
        Grammar,
    },
    core,
    Encoding,
};

/// The input does not match the grammar. `index` is the code-point offset
/// of the deepest failed sub-match.
#[derive(Clone, Debug, Hash, PartialEq, Eq, thiserror::Error)]
#[error("mismatch at {index}: {message}")]
pub struct Mismatch {
    pub index: usize,
    pub message: String,
}

/// Several alternative paths all failed.
///
/// Construction flattens nested collections, so `errors` is always a flat
/// list of leaf mismatches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorCollection {
    pub errors: Vec<Mismatch>,
}

impl ErrorCollection {
    pub(super) fn absorb(&mut self, error: Error) {
        match error {
            Error::Mismatch(mismatch) => self.errors.push(mismatch),
            Error::Collection(collection) => self.errors.extend(collection.errors),
        }
    }
}

impl fmt::Display for ErrorCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "all {} alternatives failed", self.errors.len())?;
        for mismatch in &self.errors {
            write!(f, "\n  {mismatch}")?;
        }
        Ok(())
    }
}

/// Validation error
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Mismatch(Mismatch),

    #[error("{0}")]
    Collection(ErrorCollection),
}

impl From<Mismatch> for Error {
    fn from(mismatch: Mismatch) -> Self {
        Error::Mismatch(mismatch)
    }
}

impl From<ErrorCollection> for Error {
    fn from(collection: ErrorCollection) -> Self {
        Error::Collection(collection)
    }
}

/// Knobs for [`validate`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Let the `CRLF` core rule accept bare line endings.
    pub allow_unix_newlines: bool,

    /// Code points covered by the `VCHAR` core rule.
    pub encoding: Encoding,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            allow_unix_newlines: true,
            encoding: Encoding::default(),
        }
    }
}

/// Validate `input` against the rule `entry` of `grammar`.
///
/// `entry` defaults to the grammar's first rule. On success the returned
/// tree spans the whole input and its root element is the reference to the
/// entry rule. Core rules are merged under the grammar, so user rules of
/// the same name shadow them. Exactly one tree or one error is returned;
/// repeated calls with the same arguments return structurally equal
/// results.
pub fn validate<'input>(
    grammar: &Grammar,
    input: &'input str,
    entry: Option<&str>,
    options: ValidateOptions,
) -> Result<ParseTree<'input>, Error> {
    let entry = match entry {
        Some(name) => name.to_owned(),
        None => grammar
            .rules()
            .first()
            .map(|rule| rule.name.as_str().to_owned())
            .ok_or_else(|| Mismatch {
                index: 0,
                message: "grammar has no rules".to_owned(),
            })?,
    };
    tracing::debug!(entry = %entry, "validating input");

    let core = core::rules(options.encoding, options.allow_unix_newlines);
    let root = Element::RuleRef(entry.into());
    let mut matcher = Matcher::new(grammar, &core, input);

    let outcomes = matcher.outcomes(&root, 0)?;
    let length = matcher.input_len();

    let mut furthest = 0;
    for (end, tree) in outcomes {
        if end == length {
            return Ok(tree);
        }
        furthest = furthest.max(end);
    }
    Err(Mismatch {
        index: furthest,
        message: "expected end of input".to_owned(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{
        self,
        ast::Radix,
        ParseOptions,
    };

    fn parse(source: &str) -> Grammar {
        grammar::parse(source, ParseOptions::default()).unwrap()
    }

    fn check<'input>(source: &str, input: &'input str) -> Result<ParseTree<'input>, Error> {
        validate(&parse(source), input, None, ValidateOptions::default())
    }

    fn assert_spans(tree: &ParseTree, input: &str) {
        assert!(tree.start <= tree.end);
        let bytes = |offset| {
            input
                .char_indices()
                .map(|(byte, _)| byte)
                .chain([input.len()])
                .nth(offset)
                .unwrap()
        };
        assert_eq!(tree.matched, &input[bytes(tree.start)..bytes(tree.end)]);
        if !tree.children.is_empty() {
            assert_eq!(tree.children[0].start, tree.start);
            assert_eq!(tree.children.last().unwrap().end, tree.end);
            for pair in tree.children.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
        }
        for child in &tree.children {
            assert_spans(child, input);
        }
    }

    #[test]
    fn it_matches_a_single_code_point() {
        let tree = check("single-space = %b100000\r\n", " ").unwrap();
        assert_eq!(tree.element, Element::RuleRef("single-space".into()));
        assert_eq!((tree.start, tree.end), (0, 1));
        assert_eq!(tree.matched, " ");

        assert!(matches!(
            check("single-space = %b100000\r\n", "  "),
            Err(Error::Mismatch(Mismatch { index: 1, .. }))
        ));
    }

    #[test]
    fn it_matches_code_point_series() {
        let tree = check("double-space = %d32.32\r\n", "  ").unwrap();
        assert_eq!(tree.children.len(), 1);

        let leaf = &tree.children[0];
        assert_eq!(
            leaf.element,
            Element::NumericSeries {
                values: vec![32, 32],
                radix: Radix::Decimal,
            }
        );
        assert_eq!((leaf.start, leaf.end), (0, 2));
        assert!(leaf.children.is_empty());
    }

    #[test]
    fn it_matches_unbounded_repetitions() {
        for input in ["", " ", "    "] {
            let tree = check("any-space = *%x20\r\n", input).unwrap();
            assert_eq!(tree.matched, input);
        }
    }

    #[test]
    fn it_enforces_repetition_bounds() {
        let source = "two-or-three = 2*3%x20\r\n";
        assert!(check(source, " ").is_err());
        assert!(check(source, "  ").is_ok());
        assert!(check(source, "   ").is_ok());
        assert!(check(source, "    ").is_err());
    }

    #[test]
    fn it_respects_literal_case_sensitivity() {
        assert!(check("hello = %s\"hello\"\r\n", "hello").is_ok());
        assert!(matches!(
            check("hello = %s\"hello\"\r\n", "Hello"),
            Err(Error::Mismatch(Mismatch { index: 0, .. }))
        ));

        assert!(check("hello = \"hello\"\r\n", "HeLLo").is_ok());
    }

    #[test]
    fn it_validates_the_rfc_postal_address_example() {
        let source = concat!(
            "name-part = *(personal-part SP) last-name [SP suffix] CRLF\r\n",
            "personal-part = first-name / (initial \".\")\r\n",
            "first-name = *ALPHA\r\n",
            "initial = ALPHA\r\n",
            "last-name = *ALPHA\r\n",
            "suffix = (\"Jr.\" / \"Sr.\" / 1*(\"I\" / \"V\" / \"X\"))\r\n",
        );

        let tree = check(source, "J. Doe IX\r\n").unwrap();
        assert_eq!(tree.matched, "J. Doe IX\r\n");
        assert_spans(&tree, "J. Doe IX\r\n");

        assert!(check(source, "J. Doe QQ").is_err());
    }

    #[test]
    fn it_returns_correct_spans() {
        let input = "2026-08-02";
        let tree = check("date = 4DIGIT \"-\" 2DIGIT \"-\" 2DIGIT\r\n", input).unwrap();
        assert_eq!((tree.start, tree.end), (0, 10));
        assert_spans(&tree, input);
    }

    #[test]
    fn it_is_deterministic() {
        let source = "word = *ALPHA *ALPHA\r\n";
        let grammar = parse(source);
        let first = validate(&grammar, "abc", None, ValidateOptions::default()).unwrap();
        let second = validate(&grammar, "abc", None, ValidateOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn it_indexes_by_code_points() {
        let source = "word = 3%x41-10FFFD\r\n";
        let input = "h\u{e9}\u{20ac}";
        let tree = check(source, input).unwrap();
        assert_eq!((tree.start, tree.end), (0, 3));
        assert_eq!(tree.matched, input);
        assert_spans(&tree, input);

        assert!(check(source, "h\u{e9}").is_err());
    }

    #[test]
    fn it_widens_vchar_with_the_encoding() {
        let grammar = parse("v = 1*VCHAR\r\n");
        let run = |input, encoding| {
            validate(
                &grammar,
                input,
                None,
                ValidateOptions {
                    encoding,
                    ..ValidateOptions::default()
                },
            )
        };

        assert!(run("hello", Encoding::Ascii).is_ok());
        assert!(run("h\u{e9}llo", Encoding::Ascii).is_err());
        assert!(run("h\u{e9}llo", Encoding::Latin1).is_ok());
        assert!(run("h\u{e9}llo", Encoding::Unicode).is_ok());

        assert!(run("h\u{20ac}llo", Encoding::Latin1).is_err());
        assert!(run("h\u{20ac}llo", Encoding::Unicode).is_ok());
    }

    #[test]
    fn it_relaxes_crlf_for_unix_newlines() {
        let grammar = parse("line = \"a\" CRLF\r\n");
        let run = |input, allow_unix_newlines| {
            validate(
                &grammar,
                input,
                None,
                ValidateOptions {
                    allow_unix_newlines,
                    ..ValidateOptions::default()
                },
            )
        };

        assert!(run("a\r\n", true).is_ok());
        assert!(run("a\r\n", false).is_ok());
        assert!(run("a\n", true).is_ok());
        assert!(run("a\n", false).is_err());
    }

    #[test]
    fn it_uses_the_first_rule_by_default() {
        let grammar = parse("first = \"1\"\r\nsecond = \"2\"\r\n");
        assert!(validate(&grammar, "1", None, ValidateOptions::default()).is_ok());
        assert!(validate(&grammar, "2", None, ValidateOptions::default()).is_err());
        assert!(validate(&grammar, "2", Some("second"), ValidateOptions::default()).is_ok());
        // entry lookup is case-insensitive
        assert!(validate(&grammar, "2", Some("SECOND"), ValidateOptions::default()).is_ok());
    }

    #[test]
    fn it_fails_on_undefined_rules() {
        let error = check("a = b\r\n", "x").unwrap_err();
        assert!(matches!(
            &error,
            Error::Mismatch(Mismatch { index: 0, message }) if message.contains("not defined")
        ));

        let grammar = parse("a = \"x\"\r\n");
        assert!(validate(&grammar, "x", Some("nope"), ValidateOptions::default()).is_err());
    }

    #[test]
    fn it_fails_on_an_empty_grammar() {
        let error = validate(&Grammar::default(), "x", None, ValidateOptions::default())
            .unwrap_err();
        assert!(matches!(
            error,
            Error::Mismatch(Mismatch { index: 0, .. })
        ));
    }

    #[test]
    fn it_collects_errors_from_failed_alternatives() {
        let error = check("t = \"abc\" / \"abd\" / %x58\r\n", "abX").unwrap_err();
        match error {
            Error::Collection(collection) => assert_eq!(collection.errors.len(), 3),
            other => panic!("expected a collection, got {other:?}"),
        }
    }

    #[test]
    fn it_flattens_nested_collections() {
        let error = check("t = (\"a\" / \"b\") / \"c\"\r\n", "z").unwrap_err();
        match error {
            Error::Collection(collection) => assert_eq!(collection.errors.len(), 3),
            other => panic!("expected a collection, got {other:?}"),
        }
    }

    #[test]
    fn it_surfaces_a_single_failure_bare() {
        assert!(matches!(
            check("t = \"ab\"\r\n", "ax"),
            Err(Error::Mismatch(Mismatch { index: 1, .. }))
        ));
    }

    #[test]
    fn it_guards_zero_width_repetitions() {
        // without the guard a zero-width iteration would repeat forever
        assert!(check("z = *[\"a\"]\r\n", "").is_ok());
        assert!(check("z = *[\"a\"]\r\n", "aa").is_ok());
        assert!(check("z = *[\"a\"]\r\n", "b").is_err());
    }

    #[test]
    fn it_lets_user_rules_shadow_core_rules() {
        let source = "num = 1*DIGIT\r\nDIGIT = \"x\"\r\n";
        assert!(check(source, "xxx").is_ok());
        assert!(check(source, "123").is_err());
    }

    #[test]
    fn it_detects_left_recursion() {
        let error = check("a = a \"x\"\r\n", "x").unwrap_err();
        assert!(matches!(
            &error,
            Error::Mismatch(Mismatch { message, .. }) if message.contains("left-recursive")
        ));
    }

    #[test]
    fn it_formats_errors() {
        let mismatch = Mismatch {
            index: 2,
            message: "expected %x58".to_owned(),
        };
        assert_eq!(mismatch.to_string(), "mismatch at 2: expected %x58");

        let collection = ErrorCollection {
            errors: vec![mismatch.clone(), mismatch],
        };
        assert!(collection.to_string().starts_with("all 2 alternatives failed"));
    }
}
