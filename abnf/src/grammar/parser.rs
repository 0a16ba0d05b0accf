use nom::{
    branch::alt,
    bytes::complete::{
        tag,
        tag_no_case,
        take_while,
        take_while1,
    },
    character::complete::{
        char,
        digit1,
        one_of,
        satisfy,
    },
    combinator::{
        all_consuming,
        cut,
        eof,
        map,
        map_res,
        opt,
        peek,
        recognize,
        value,
        verify,
    },
    error::{
        context,
        ContextError,
        ErrorKind,
        ParseError,
        VerboseError,
    },
    multi::{
        many0,
        many0_count,
        many1,
        many1_count,
        separated_list1,
    },
    sequence::{
        delimited,
        pair,
        preceded,
        tuple,
    },
    IResult,
};

use super::{
    ast::{
        Element,
        Radix,
        Rulename,
    },
    Encoding,
    ParseOptions,
};

type Res<'a, U> = IResult<&'a str, U, VerboseError<&'a str>>;

/// One rule definition as written in the source, before `=/` folding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Definition {
    pub name: Rulename,
    pub incremental: bool,
    pub element: Element,
}

fn failure<'a>(
    input: &'a str,
    kind: ErrorKind,
    label: &'static str,
) -> nom::Err<VerboseError<&'a str>> {
    nom::Err::Failure(VerboseError::add_context(
        input,
        label,
        VerboseError::from_error_kind(input, kind),
    ))
}

/// Recursive-descent parser for the RFC 5234 §4 meta-grammar, one function
/// per production.
pub(super) struct GrammarParser {
    options: ParseOptions,
}

impl GrammarParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn parse_complete<'a>(&self, input: &'a str) -> Res<'a, Vec<Definition>> {
        all_consuming(|i| self.rulelist(i))(input)
    }

    /// `rulelist = 1*(rule / (*c-wsp c-nl))`
    fn rulelist<'a>(&self, input: &'a str) -> Res<'a, Vec<Definition>> {
        context(
            "rulelist",
            map(
                many1(alt((
                    map(|i| self.rule(i), Some),
                    // the blank-line branch must consume something, or the
                    // optional end-of-file newline would match forever
                    map(
                        verify(
                            recognize(pair(|i| self.c_wsp0(i), |i| self.c_nl(i))),
                            |consumed: &str| !consumed.is_empty(),
                        ),
                        |_| None,
                    ),
                ))),
                |definitions| definitions.into_iter().flatten().collect(),
            ),
        )(input)
    }

    /// `rule = rulename defined-as elements c-nl`
    fn rule<'a>(&self, input: &'a str) -> Res<'a, Definition> {
        context("rule", |input: &'a str| {
            let (input, name) = self.rulename(input)?;
            let (input, incremental) = self.defined_as(input)?;
            let (input, element) = cut(|i| self.alternation(i))(input)?;
            let (input, _) = cut(pair(|i| self.c_wsp0(i), |i| self.c_nl(i)))(input)?;
            Ok((
                input,
                Definition {
                    name,
                    incremental,
                    element,
                },
            ))
        })(input)
    }

    /// `rulename = ALPHA *(ALPHA / DIGIT / "-")`
    fn rulename<'a>(&self, input: &'a str) -> Res<'a, Rulename> {
        context(
            "rulename",
            map(
                recognize(pair(
                    satisfy(|c| c.is_ascii_alphabetic()),
                    take_while(|c: char| c.is_ascii_alphanumeric() || c == '-'),
                )),
                Rulename::from,
            ),
        )(input)
    }

    /// `defined-as = *c-wsp ("=" / "=/") *c-wsp`, returning whether the
    /// definition is incremental.
    fn defined_as<'a>(&self, input: &'a str) -> Res<'a, bool> {
        context(
            "defined-as",
            delimited(
                |i| self.c_wsp0(i),
                alt((value(true, tag("=/")), value(false, char('=')))),
                |i| self.c_wsp0(i),
            ),
        )(input)
    }

    /// `alternation = concatenation *(*c-wsp "/" *c-wsp concatenation)`
    fn alternation<'a>(&self, input: &'a str) -> Res<'a, Element> {
        context(
            "alternation",
            map(
                separated_list1(
                    delimited(|i| self.c_wsp0(i), char('/'), |i| self.c_wsp0(i)),
                    |i| self.concatenation(i),
                ),
                |mut alternatives| {
                    if alternatives.len() == 1 {
                        alternatives.remove(0)
                    } else {
                        Element::Alternation(alternatives)
                    }
                },
            ),
        )(input)
    }

    /// `concatenation = repetition *(1*c-wsp repetition)`
    fn concatenation<'a>(&self, input: &'a str) -> Res<'a, Element> {
        context(
            "concatenation",
            map(
                pair(
                    |i| self.repetition(i),
                    many0(preceded(|i| self.c_wsp1(i), |i| self.repetition(i))),
                ),
                |(first, rest)| {
                    if rest.is_empty() {
                        first
                    } else {
                        let mut elements = vec![first];
                        elements.extend(rest);
                        Element::Concatenation(elements)
                    }
                },
            ),
        )(input)
    }

    /// `repetition = [repeat] element`
    fn repetition<'a>(&self, input: &'a str) -> Res<'a, Element> {
        context("repetition", |input: &'a str| {
            let (input, bounds) = opt(|i| self.repeat(i))(input)?;
            let (input, element) = self.element(input)?;
            let element = match bounds {
                None => element,
                Some((at_least, up_to)) => Element::Repetition {
                    at_least,
                    up_to,
                    inner: Box::new(element),
                },
            };
            Ok((input, element))
        })(input)
    }

    /// `repeat = 1*DIGIT / (*DIGIT "*" *DIGIT)`
    fn repeat<'a>(&self, input: &'a str) -> Res<'a, (u32, Option<u32>)> {
        context("repeat", |input: &'a str| {
            let (rest, bounds) = alt((
                map(
                    tuple((opt(Self::number), char('*'), opt(Self::number))),
                    |(at_least, _, up_to)| (at_least.unwrap_or(0), up_to),
                ),
                map(Self::number, |exact| (exact, Some(exact))),
            ))(input)?;
            if let (at_least, Some(up_to)) = bounds {
                if at_least > up_to {
                    return Err(failure(input, ErrorKind::Verify, "repeat bounds"));
                }
            }
            Ok((rest, bounds))
        })(input)
    }

    fn number(input: &str) -> Res<'_, u32> {
        map_res(digit1, |digits: &str| digits.parse::<u32>())(input)
    }

    /// `element = rulename / group / option / char-val / num-val`
    fn element<'a>(&self, input: &'a str) -> Res<'a, Element> {
        context(
            "element",
            alt((
                |i| self.char_val(i),
                |i| self.num_val(i),
                |i| self.group(i),
                |i| self.option(i),
                map(|i| self.rulename(i), Element::RuleRef),
            )),
        )(input)
    }

    /// `group = "(" *c-wsp alternation *c-wsp ")"`
    fn group<'a>(&self, input: &'a str) -> Res<'a, Element> {
        context(
            "group",
            delimited(
                pair(char('('), |i| self.c_wsp0(i)),
                cut(|i| self.alternation(i)),
                cut(pair(|i| self.c_wsp0(i), char(')'))),
            ),
        )(input)
    }

    /// `option = "[" *c-wsp alternation *c-wsp "]"`
    fn option<'a>(&self, input: &'a str) -> Res<'a, Element> {
        context(
            "option",
            map(
                delimited(
                    pair(char('['), |i| self.c_wsp0(i)),
                    cut(|i| self.alternation(i)),
                    cut(pair(|i| self.c_wsp0(i), char(']'))),
                ),
                |element| Element::Optional(Box::new(element)),
            ),
        )(input)
    }

    /// `char-val` with the RFC 7405 `%s` / `%i` sensitivity prefixes.
    fn char_val<'a>(&self, input: &'a str) -> Res<'a, Element> {
        context("quoted string", |input: &'a str| {
            let (rest, case_sensitive) = alt((
                value(true, tag_no_case("%s")),
                value(false, tag_no_case("%i")),
                value(false, peek(char('"'))),
            ))(input)?;
            let (rest, text) = delimited(
                char('"'),
                take_while(|c| self.is_literal_char(c)),
                cut(char('"')),
            )(rest)?;
            if text.is_empty() {
                return Err(failure(input, ErrorKind::TakeWhile1, "empty quoted string"));
            }
            Ok((
                rest,
                Element::Literal {
                    text: text.to_owned(),
                    case_sensitive,
                },
            ))
        })(input)
    }

    /// `num-val = "%" (bin-val / dec-val / hex-val)`, each a single value,
    /// a dot-separated series or a hyphenated range.
    fn num_val<'a>(&self, input: &'a str) -> Res<'a, Element> {
        context("numeric value", |input: &'a str| {
            let (rest, _) = char('%')(input)?;
            let (rest, radix) = alt((
                value(Radix::Binary, one_of("bB")),
                value(Radix::Decimal, one_of("dD")),
                value(Radix::Hexadecimal, one_of("xX")),
            ))(rest)?;
            let result = cut(|i| Self::num_tail(i, radix))(rest);
            result
        })(input)
    }

    fn num_tail(input: &str, radix: Radix) -> Res<'_, Element> {
        let (rest, first) = Self::code_point(input, radix)?;
        let (rest, series) = many0(preceded(char('.'), |i| Self::code_point(i, radix)))(rest)?;
        if !series.is_empty() {
            let mut values = vec![first];
            values.extend(series);
            return Ok((rest, Element::NumericSeries { values, radix }));
        }
        let (rest, up_to) = opt(preceded(char('-'), |i| Self::code_point(i, radix)))(rest)?;
        let element = match up_to {
            Some(max) => {
                if first > max {
                    return Err(failure(input, ErrorKind::Verify, "numeric range"));
                }
                Element::NumericRange {
                    min: first,
                    max,
                    radix,
                }
            }
            None => Element::Numeric {
                value: first,
                radix,
            },
        };
        Ok((rest, element))
    }

    fn code_point(input: &str, radix: Radix) -> Res<'_, u32> {
        let base = radix.base();
        let (rest, number) = map_res(
            take_while1(move |c: char| c.is_digit(base)),
            move |digits: &str| u32::from_str_radix(digits, base),
        )(input)?;
        if number > 0x0010_FFFF {
            return Err(failure(input, ErrorKind::Verify, "code point out of range"));
        }
        Ok((rest, number))
    }

    /// `c-wsp = WSP / (c-nl WSP)`
    fn c_wsp<'a>(&self, input: &'a str) -> Res<'a, ()> {
        alt((
            value((), one_of(" \t")),
            value((), pair(|i| self.c_nl(i), one_of(" \t"))),
        ))(input)
    }

    fn c_wsp0<'a>(&self, input: &'a str) -> Res<'a, ()> {
        value((), many0_count(|i| self.c_wsp(i)))(input)
    }

    fn c_wsp1<'a>(&self, input: &'a str) -> Res<'a, ()> {
        value((), many1_count(|i| self.c_wsp(i)))(input)
    }

    /// `c-nl = comment / CRLF`
    fn c_nl<'a>(&self, input: &'a str) -> Res<'a, ()> {
        alt((|i| self.comment(i), |i| self.line_end(i)))(input)
    }

    /// `comment = ";" *(WSP / VCHAR) CRLF`
    fn comment<'a>(&self, input: &'a str) -> Res<'a, ()> {
        context(
            "comment",
            value(
                (),
                tuple((
                    char(';'),
                    take_while(|c| c == ' ' || c == '\t' || self.is_vchar(c)),
                    |i| self.line_end(i),
                )),
            ),
        )(input)
    }

    fn line_end<'a>(&self, input: &'a str) -> Res<'a, ()> {
        if self.options.allow_omitting_final_newline {
            alt((|i| self.newline(i), value((), eof)))(input)
        } else {
            self.newline(input)
        }
    }

    fn newline<'a>(&self, input: &'a str) -> Res<'a, ()> {
        if self.options.allow_unix_newlines {
            value((), alt((tag("\r\n"), tag("\n"))))(input)
        } else {
            value((), tag("\r\n"))(input)
        }
    }

    fn is_vchar(&self, c: char) -> bool {
        let value = c as u32;
        let ascii = matches!(value, 0x21..=0x7E);
        match self.options.encoding {
            Encoding::Ascii => ascii,
            Encoding::Latin1 => ascii || matches!(value, 0xA0..=0xFF),
            Encoding::Unicode => ascii || matches!(value, 0xA0..=0x0010_FFFD),
        }
    }

    fn is_literal_char(&self, c: char) -> bool {
        let value = c as u32;
        let ascii = matches!(value, 0x20..=0x21 | 0x23..=0x7E);
        match self.options.encoding {
            Encoding::Ascii => ascii,
            Encoding::Latin1 => ascii || matches!(value, 0xA0..=0xFF),
            Encoding::Unicode => ascii || matches!(value, 0xA0..=0x0010_FFFD),
        }
    }
}
