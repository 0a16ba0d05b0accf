//! [ABNF][1] grammars as defined by RFC 5234 and RFC 7405.
//!
//! The [`grammar`] module parses grammar text into an in-memory rule list;
//! the [`validator`] module matches an input string against a rule of that
//! grammar and returns a parse tree annotated with matched spans, or a
//! precise diagnostic when the input does not match.
//!
//! # Example
//!
//! ```
//! # fn main() -> Result<(), abnf::Error> {
//! let tree = abnf::parse_and_validate(
//!     "greeting = %s\"Hello\" SP %s\"World\"\r\n",
//!     "Hello World",
//! )?;
//!
//! assert_eq!(tree.matched, "Hello World");
//! # Ok(())
//! # }
//! ```
//!
//! [1]: https://www.rfc-editor.org/rfc/rfc5234

pub mod grammar;
pub mod validator;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("grammar error")]
    Grammar(#[from] crate::grammar::Error),

    #[error("validation error")]
    Validation(#[from] crate::validator::Error),
}

/// Parse a grammar and validate `input` against its first rule.
pub fn parse_and_validate<'input>(
    grammar: &str,
    input: &'input str,
) -> Result<validator::ParseTree<'input>, Error> {
    let grammar = grammar::parse(grammar, grammar::ParseOptions::default())?;
    let tree = validator::validate(&grammar, input, None, validator::ValidateOptions::default())?;
    Ok(tree)
}
