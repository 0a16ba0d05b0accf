use std::path::PathBuf;

use abnf::{
    grammar::{
        self,
        ast::Element,
        Encoding,
        ParseOptions,
    },
    validator::{
        self,
        ParseTree,
        ValidateOptions,
    },
};
use color_eyre::eyre::{
    eyre,
    Error,
};
use structopt::StructOpt;

fn parse_encoding(value: &str) -> Result<Encoding, Error> {
    match value.to_ascii_lowercase().as_str() {
        "ascii" => Ok(Encoding::Ascii),
        "latin1" => Ok(Encoding::Latin1),
        "unicode" => Ok(Encoding::Unicode),
        _ => Err(eyre!("unknown encoding: {value}")),
    }
}

#[derive(Debug, StructOpt)]
enum Args {
    /// Parse a grammar file and print the rules that were found.
    Check {
        #[structopt(short, long)]
        grammar: PathBuf,
    },
    /// Validate an input string against a rule of a grammar.
    Validate {
        #[structopt(short, long)]
        grammar: PathBuf,

        /// Rule to validate against, defaults to the first rule of the
        /// grammar.
        #[structopt(short, long)]
        rule: Option<String>,

        /// Reject bare LF line endings.
        #[structopt(long)]
        strict_newlines: bool,

        /// Code points allowed in literals and VCHAR: ascii, latin1 or
        /// unicode.
        #[structopt(short, long, default_value = "ascii", parse(try_from_str = parse_encoding))]
        encoding: Encoding,

        input: String,
    },
}

impl Args {
    pub fn run(self) -> Result<(), Error> {
        match self {
            Self::Check { grammar } => {
                let grammar = grammar::parse_from_source(&grammar)?;
                for rule in grammar.rules() {
                    println!("{rule}");
                }
            }
            Self::Validate {
                grammar,
                rule,
                strict_newlines,
                encoding,
                input,
            } => {
                let source = std::fs::read_to_string(&grammar)?;
                let grammar = grammar::parse(
                    &source,
                    ParseOptions {
                        allow_unix_newlines: !strict_newlines,
                        encoding,
                        ..ParseOptions::default()
                    },
                )?;

                let tree = validator::validate(
                    &grammar,
                    &input,
                    rule.as_deref(),
                    ValidateOptions {
                        allow_unix_newlines: !strict_newlines,
                        encoding,
                    },
                )?;

                print_tree(&tree, 0);
            }
        }

        Ok(())
    }
}

fn print_tree(tree: &ParseTree, depth: usize) {
    let label = match &tree.element {
        Element::RuleRef(name) => name.to_string(),
        Element::Alternation(_) => "alternation".to_owned(),
        Element::Concatenation(_) => "concatenation".to_owned(),
        Element::Repetition { .. } => "repetition".to_owned(),
        Element::Optional(_) => "optional".to_owned(),
        terminal => terminal.to_string(),
    };
    println!(
        "{:indent$}{label} [{}..{}) {:?}",
        "",
        tree.start,
        tree.end,
        tree.matched,
        indent = depth * 2,
    );
    for child in &tree.children {
        print_tree(child, depth + 1);
    }
}

fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let args = Args::from_args();
    args.run()?;

    Ok(())
}
