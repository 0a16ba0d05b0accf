use std::{
    collections::HashMap,
    fmt,
};

use super::Error;

/// The name of a rule, `[A-Za-z][A-Za-z0-9-]*`.
///
/// Names compare and hash with their exact spelling; use [`Grammar::get`]
/// for the case-insensitive lookup ABNF prescribes.
#[derive(
    Clone,
    Debug,
    Hash,
    PartialEq,
    Eq,
    derive_more::Display,
    derive_more::From,
    derive_more::AsRef,
)]
pub struct Rulename(String);

impl Rulename {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'a> From<&'a str> for Rulename {
    fn from(value: &'a str) -> Self {
        value.to_owned().into()
    }
}

/// Base used to spell a numeric terminal in the grammar source.
///
/// It has no effect on matching and is carried only so that equality and
/// re-serialization reproduce the source spelling.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Radix {
    Binary,
    Decimal,
    Hexadecimal,
}

impl Radix {
    pub fn base(self) -> u32 {
        match self {
            Radix::Binary => 2,
            Radix::Decimal => 10,
            Radix::Hexadecimal => 16,
        }
    }

    fn prefix(self) -> char {
        match self {
            Radix::Binary => 'b',
            Radix::Decimal => 'd',
            Radix::Hexadecimal => 'x',
        }
    }

    fn write_value(self, f: &mut fmt::Formatter<'_>, value: u32) -> fmt::Result {
        match self {
            Radix::Binary => write!(f, "{value:b}"),
            Radix::Decimal => write!(f, "{value}"),
            Radix::Hexadecimal => write!(f, "{value:X}"),
        }
    }
}

/// One fragment of a rule body.
///
/// The variant set is fixed by RFC 5234/7405. Values are trees; cycles
/// between rules exist only through the name-indexed table of [`Grammar`],
/// so elements stay serializable and side-effect-free to build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Element {
    /// Reference to a named rule, resolved at validation time.
    RuleRef(Rulename),
    /// Ordered choice, `a / b / c`.
    Alternation(Vec<Element>),
    /// Elements that must match in sequence, `a b c`.
    Concatenation(Vec<Element>),
    /// `n*m element`; a missing lower bound is 0, a missing upper bound is
    /// unbounded.
    Repetition {
        at_least: u32,
        up_to: Option<u32>,
        inner: Box<Element>,
    },
    /// `[ element ]`, equivalent to `0*1 element` but kept distinct so the
    /// parse tree mirrors the source.
    Optional(Box<Element>),
    /// Quoted string, `"text"` or `%s"text"` (RFC 7405).
    Literal { text: String, case_sensitive: bool },
    /// Single code point, e.g. `%x41`.
    Numeric { value: u32, radix: Radix },
    /// Dot-separated code points, e.g. `%x41.42.43`.
    NumericSeries { values: Vec<u32>, radix: Radix },
    /// Inclusive code-point range, e.g. `%x41-5A`.
    NumericRange { min: u32, max: u32, radix: Radix },
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::RuleRef(name) => write!(f, "{name}"),
            Element::Alternation(alternatives) => {
                for (position, alternative) in alternatives.iter().enumerate() {
                    if position > 0 {
                        write!(f, " / ")?;
                    }
                    write_operand(f, alternative, false)?;
                }
                Ok(())
            }
            Element::Concatenation(elements) => {
                for (position, element) in elements.iter().enumerate() {
                    if position > 0 {
                        write!(f, " ")?;
                    }
                    write_operand(f, element, false)?;
                }
                Ok(())
            }
            Element::Repetition {
                at_least,
                up_to,
                inner,
            } => {
                match (*at_least, *up_to) {
                    (at_least, Some(up_to)) if at_least == up_to => write!(f, "{at_least}")?,
                    (at_least, up_to) => {
                        if at_least > 0 {
                            write!(f, "{at_least}")?;
                        }
                        write!(f, "*")?;
                        if let Some(up_to) = up_to {
                            write!(f, "{up_to}")?;
                        }
                    }
                }
                write_operand(f, inner, true)
            }
            Element::Optional(inner) => write!(f, "[{inner}]"),
            Element::Literal {
                text,
                case_sensitive,
            } => {
                if *case_sensitive {
                    write!(f, "%s\"{text}\"")
                } else {
                    write!(f, "\"{text}\"")
                }
            }
            Element::Numeric { value, radix } => {
                write!(f, "%{}", radix.prefix())?;
                radix.write_value(f, *value)
            }
            Element::NumericSeries { values, radix } => {
                write!(f, "%{}", radix.prefix())?;
                for (position, value) in values.iter().enumerate() {
                    if position > 0 {
                        write!(f, ".")?;
                    }
                    radix.write_value(f, *value)?;
                }
                Ok(())
            }
            Element::NumericRange { min, max, radix } => {
                write!(f, "%{}", radix.prefix())?;
                radix.write_value(f, *min)?;
                write!(f, "-")?;
                radix.write_value(f, *max)
            }
        }
    }
}

/// Writes `element` as an operand, parenthesized where ABNF precedence
/// requires a group. `tight` marks repetition position, where a
/// concatenation needs parentheses too.
fn write_operand(f: &mut fmt::Formatter<'_>, element: &Element, tight: bool) -> fmt::Result {
    let grouped = match element {
        Element::Alternation(_) => true,
        Element::Concatenation(_) => tight,
        _ => false,
    };
    if grouped {
        write!(f, "({element})")
    } else {
        write!(f, "{element}")
    }
}

/// A named rule: `name = element`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub name: Rulename,
    pub element: Element,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.element)
    }
}

/// An ordered list of rules plus a case-folded name index.
///
/// Order is first-appearance order in the source; it is observable because
/// validation defaults to the first rule when no entry rule is given.
#[derive(Clone, Debug, Default)]
pub struct Grammar {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
}

impl Grammar {
    /// The rules in first-appearance order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Case-insensitive rule lookup.
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.index
            .get(&name.to_ascii_lowercase())
            .map(|&position| &self.rules[position])
    }

    pub(crate) fn from_rules(rules: Vec<Rule>) -> Self {
        let index = rules
            .iter()
            .enumerate()
            .map(|(position, rule)| (rule.name.as_str().to_ascii_lowercase(), position))
            .collect();
        Self { rules, index }
    }

    /// Adds a `name = element` definition.
    pub(crate) fn define(&mut self, name: Rulename, element: Element) -> Result<(), Error> {
        let key = name.as_str().to_ascii_lowercase();
        if self.index.contains_key(&key) {
            return Err(Error::DuplicateRule {
                name: name.to_string(),
            });
        }
        self.index.insert(key, self.rules.len());
        self.rules.push(Rule { name, element });
        Ok(())
    }

    /// Folds a `name =/ element` definition into the existing rule as one
    /// more alternation branch.
    pub(crate) fn extend(&mut self, name: Rulename, element: Element) -> Result<(), Error> {
        let position = self
            .index
            .get(&name.as_str().to_ascii_lowercase())
            .copied()
            .ok_or_else(|| Error::UndefinedIncremental {
                name: name.to_string(),
            })?;
        let body = &mut self.rules[position].element;
        match body {
            Element::Alternation(alternatives) => alternatives.push(element),
            _ => {
                let previous = std::mem::replace(body, Element::Alternation(Vec::new()));
                *body = Element::Alternation(vec![previous, element]);
            }
        }
        Ok(())
    }
}

impl PartialEq for Grammar {
    fn eq(&self, other: &Self) -> bool {
        self.rules == other.rules
    }
}

impl Eq for Grammar {}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.rules {
            write!(f, "{rule}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_range(min: u32, max: u32) -> Element {
        Element::NumericRange {
            min,
            max,
            radix: Radix::Hexadecimal,
        }
    }

    #[test]
    fn it_serializes_terminals() {
        assert_eq!(
            Element::Numeric {
                value: 32,
                radix: Radix::Binary
            }
            .to_string(),
            "%b100000"
        );
        assert_eq!(
            Element::NumericSeries {
                values: vec![32, 32],
                radix: Radix::Decimal
            }
            .to_string(),
            "%d32.32"
        );
        assert_eq!(hex_range(0x41, 0x5A).to_string(), "%x41-5A");
        assert_eq!(
            Element::Literal {
                text: "hello".to_owned(),
                case_sensitive: true
            }
            .to_string(),
            "%s\"hello\""
        );
        assert_eq!(
            Element::Literal {
                text: "hello".to_owned(),
                case_sensitive: false
            }
            .to_string(),
            "\"hello\""
        );
    }

    #[test]
    fn it_serializes_composites_with_groups() {
        let alternation = Element::Alternation(vec![
            Element::RuleRef("a".into()),
            Element::RuleRef("b".into()),
        ]);
        let concatenation =
            Element::Concatenation(vec![alternation.clone(), Element::RuleRef("c".into())]);
        assert_eq!(concatenation.to_string(), "(a / b) c");

        let repeated = Element::Repetition {
            at_least: 2,
            up_to: None,
            inner: Box::new(concatenation),
        };
        assert_eq!(repeated.to_string(), "2*((a / b) c)");

        let optional = Element::Optional(Box::new(alternation));
        assert_eq!(optional.to_string(), "[a / b]");
    }

    #[test]
    fn it_serializes_repetition_bounds() {
        let inner = Box::new(Element::RuleRef("x".into()));
        let render = |at_least, up_to| {
            Element::Repetition {
                at_least,
                up_to,
                inner: inner.clone(),
            }
            .to_string()
        };
        assert_eq!(render(0, None), "*x");
        assert_eq!(render(2, None), "2*x");
        assert_eq!(render(0, Some(3)), "*3x");
        assert_eq!(render(2, Some(3)), "2*3x");
        assert_eq!(render(2, Some(2)), "2x");
    }

    #[test]
    fn it_looks_up_rules_case_insensitively() {
        let mut grammar = Grammar::default();
        grammar
            .define("Date".into(), Element::RuleRef("DIGIT".into()))
            .unwrap();
        assert!(grammar.get("date").is_some());
        assert!(grammar.get("DATE").is_some());
        assert_eq!(grammar.get("date").unwrap().name.as_str(), "Date");
        assert!(grammar.get("time").is_none());
    }

    #[test]
    fn it_rejects_duplicate_definitions() {
        let mut grammar = Grammar::default();
        grammar
            .define("a".into(), Element::RuleRef("x".into()))
            .unwrap();
        assert!(matches!(
            grammar.define("A".into(), Element::RuleRef("y".into())),
            Err(Error::DuplicateRule { .. })
        ));
    }

    #[test]
    fn it_folds_incremental_definitions() {
        let mut grammar = Grammar::default();
        grammar
            .define("a".into(), Element::RuleRef("x".into()))
            .unwrap();
        grammar
            .extend("a".into(), Element::RuleRef("y".into()))
            .unwrap();
        grammar
            .extend("A".into(), Element::RuleRef("z".into()))
            .unwrap();
        assert_eq!(
            grammar.get("a").unwrap().element,
            Element::Alternation(vec![
                Element::RuleRef("x".into()),
                Element::RuleRef("y".into()),
                Element::RuleRef("z".into()),
            ])
        );

        assert!(matches!(
            grammar.extend("b".into(), Element::RuleRef("x".into())),
            Err(Error::UndefinedIncremental { .. })
        ));
    }
}
