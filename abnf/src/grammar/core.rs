//! Core rules from RFC 5234 appendix B.1.
//!
//! The table is materialized per `(encoding, allow_unix_newlines)`
//! configuration: `VCHAR` widens with the encoding and `CRLF` also accepts
//! bare line endings when unix newlines are allowed. The validator merges
//! the table *under* the user grammar, so a user rule of the same name
//! shadows its core definition.

use super::{
    ast::{
        Element,
        Grammar,
        Radix,
        Rule,
    },
    Encoding,
};

fn hex(value: u32) -> Element {
    Element::Numeric {
        value,
        radix: Radix::Hexadecimal,
    }
}

fn hex_range(min: u32, max: u32) -> Element {
    Element::NumericRange {
        min,
        max,
        radix: Radix::Hexadecimal,
    }
}

fn rule_ref(name: &str) -> Element {
    Element::RuleRef(name.into())
}

fn literal(text: &str) -> Element {
    Element::Literal {
        text: text.to_owned(),
        case_sensitive: false,
    }
}

fn crlf(allow_unix_newlines: bool) -> Element {
    let strict = Element::Concatenation(vec![rule_ref("CR"), rule_ref("LF")]);
    if allow_unix_newlines {
        // bare CR kept for compatibility with the historical behavior
        Element::Alternation(vec![strict, rule_ref("LF"), rule_ref("CR")])
    } else {
        strict
    }
}

fn vchar(encoding: Encoding) -> Element {
    let ascii = hex_range(0x21, 0x7E);
    match encoding {
        Encoding::Ascii => ascii,
        Encoding::Latin1 => Element::Alternation(vec![ascii, hex_range(0xA0, 0xFF)]),
        Encoding::Unicode => Element::Alternation(vec![ascii, hex_range(0xA0, 0x10FFFD)]),
    }
}

/// Builds the core-rule table for the given configuration.
pub fn rules(encoding: Encoding, allow_unix_newlines: bool) -> Grammar {
    let rule = |name: &str, element: Element| Rule {
        name: name.into(),
        element,
    };

    Grammar::from_rules(vec![
        rule(
            "ALPHA",
            Element::Alternation(vec![hex_range(0x41, 0x5A), hex_range(0x61, 0x7A)]),
        ),
        rule("BIT", Element::Alternation(vec![literal("0"), literal("1")])),
        rule("CHAR", hex_range(0x01, 0x7F)),
        rule("CR", hex(0x0D)),
        rule("CRLF", crlf(allow_unix_newlines)),
        rule(
            "CTL",
            Element::Alternation(vec![hex_range(0x00, 0x1F), hex(0x7F)]),
        ),
        rule("DIGIT", hex_range(0x30, 0x39)),
        rule("DQUOTE", hex(0x22)),
        rule(
            "HEXDIG",
            Element::Alternation(vec![
                rule_ref("DIGIT"),
                literal("A"),
                literal("B"),
                literal("C"),
                literal("D"),
                literal("E"),
                literal("F"),
            ]),
        ),
        rule("HTAB", hex(0x09)),
        rule("LF", hex(0x0A)),
        rule(
            "LWSP",
            Element::Repetition {
                at_least: 0,
                up_to: None,
                inner: Box::new(Element::Alternation(vec![
                    rule_ref("WSP"),
                    Element::Concatenation(vec![rule_ref("CRLF"), rule_ref("WSP")]),
                ])),
            },
        ),
        rule("OCTET", hex_range(0x00, 0xFF)),
        rule("SP", hex(0x20)),
        rule("VCHAR", vchar(encoding)),
        rule(
            "WSP",
            Element::Alternation(vec![rule_ref("SP"), rule_ref("HTAB")]),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_defines_the_standard_rules() {
        let table = rules(Encoding::Ascii, false);
        for name in [
            "ALPHA", "BIT", "CHAR", "CR", "CRLF", "CTL", "DIGIT", "DQUOTE", "HEXDIG", "HTAB",
            "LF", "LWSP", "OCTET", "SP", "VCHAR", "WSP",
        ] {
            assert!(table.get(name).is_some(), "{name} missing");
        }
    }

    #[test]
    fn it_widens_vchar_with_the_encoding() {
        assert_eq!(
            rules(Encoding::Ascii, false).get("VCHAR").unwrap().element,
            hex_range(0x21, 0x7E)
        );
        assert_eq!(
            rules(Encoding::Latin1, false).get("VCHAR").unwrap().element,
            Element::Alternation(vec![hex_range(0x21, 0x7E), hex_range(0xA0, 0xFF)])
        );
        assert_eq!(
            rules(Encoding::Unicode, false).get("VCHAR").unwrap().element,
            Element::Alternation(vec![hex_range(0x21, 0x7E), hex_range(0xA0, 0x10FFFD)])
        );
    }

    #[test]
    fn it_relaxes_crlf_for_unix_newlines() {
        let strict = Element::Concatenation(vec![rule_ref("CR"), rule_ref("LF")]);
        assert_eq!(
            rules(Encoding::Ascii, false).get("CRLF").unwrap().element,
            strict
        );
        assert_eq!(
            rules(Encoding::Ascii, true).get("CRLF").unwrap().element,
            Element::Alternation(vec![strict, rule_ref("LF"), rule_ref("CR")])
        );
    }
}
