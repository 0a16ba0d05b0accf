use std::collections::{
    HashMap,
    HashSet,
};

use super::{
    tree::ParseTree,
    Error,
    ErrorCollection,
    Mismatch,
};
use crate::grammar::ast::{
    Element,
    Grammar,
    Rulename,
};

/// One way an element can match: the end offset and the tree for the span.
type Outcome<'input> = (usize, ParseTree<'input>);

/// A chain of sub-matches still being extended: the end offset reached so
/// far and the sub-trees matched up to it.
type Partial<'input> = (usize, Vec<ParseTree<'input>>);

/// Non-deterministic matcher for one validation call.
///
/// For every element/position pair the matcher enumerates the full set of
/// `(end, tree)` outcomes, so alternatives and variable-length repetitions
/// backtrack for free. Outcome sets are memoized on the element's address
/// and the position; elements are borrowed for the whole call, so the
/// address is a stable identity. The memo dies with the matcher.
pub(super) struct Matcher<'rules, 'input> {
    rules: &'rules Grammar,
    core: &'rules Grammar,
    input: &'input str,
    /// the input as code points; all offsets index into this
    chars: Vec<char>,
    /// byte offset of each code point, plus one entry for the end
    byte_offsets: Vec<usize>,
    memo: HashMap<(usize, usize), Result<Vec<Outcome<'input>>, Error>>,
    /// `(rule, position)` pairs currently being expanded, for
    /// left-recursion detection
    active: HashSet<(String, usize)>,
}

impl<'rules, 'input> Matcher<'rules, 'input> {
    pub fn new(rules: &'rules Grammar, core: &'rules Grammar, input: &'input str) -> Self {
        let chars = input.chars().collect();
        let mut byte_offsets = input
            .char_indices()
            .map(|(offset, _)| offset)
            .collect::<Vec<_>>();
        byte_offsets.push(input.len());

        Self {
            rules,
            core,
            input,
            chars,
            byte_offsets,
            memo: HashMap::new(),
            active: HashSet::new(),
        }
    }

    /// Length of the input in code points.
    pub fn input_len(&self) -> usize {
        self.chars.len()
    }

    /// All outcomes of `element` at code-point offset `at`.
    pub fn outcomes(
        &mut self,
        element: &Element,
        at: usize,
    ) -> Result<Vec<Outcome<'input>>, Error> {
        // rule references stay outside the memo so the recursion guard
        // always observes the live expansion stack
        if let Element::RuleRef(name) = element {
            return self.match_rule(element, name, at);
        }

        let key = (element as *const Element as usize, at);
        if let Some(cached) = self.memo.get(&key) {
            return cached.clone();
        }
        let result = self.expand(element, at);
        self.memo.insert(key, result.clone());
        result
    }

    fn expand(&mut self, element: &Element, at: usize) -> Result<Vec<Outcome<'input>>, Error> {
        match element {
            Element::RuleRef(_) => unreachable!("rule references are resolved in outcomes"),
            Element::Alternation(children) => self.match_alternation(element, children, at),
            Element::Concatenation(children) => self.match_concatenation(element, children, at),
            Element::Repetition {
                at_least,
                up_to,
                inner,
            } => self.match_repetition(element, inner, *at_least, *up_to, at),
            Element::Optional(inner) => self.match_optional(element, inner, at),
            Element::Literal {
                text,
                case_sensitive,
            } => self.match_literal(element, text, *case_sensitive, at),
            Element::Numeric { value, .. } => self.match_series(element, &[*value], at),
            Element::NumericSeries { values, .. } => self.match_series(element, values, at),
            Element::NumericRange { min, max, .. } => self.match_range(element, *min, *max, at),
        }
    }

    fn match_rule(
        &mut self,
        element: &Element,
        name: &Rulename,
        at: usize,
    ) -> Result<Vec<Outcome<'input>>, Error> {
        let rules: &'rules Grammar = self.rules;
        let core: &'rules Grammar = self.core;
        let rule = rules
            .get(name.as_str())
            .or_else(|| core.get(name.as_str()))
            .ok_or_else(|| Mismatch {
                index: at,
                message: format!("rule '{name}' is not defined"),
            })?;

        let guard = (name.as_str().to_ascii_lowercase(), at);
        if !self.active.insert(guard.clone()) {
            return Err(Mismatch {
                index: at,
                message: format!("rule '{name}' is left-recursive"),
            }
            .into());
        }
        let result = self.outcomes(&rule.element, at);
        self.active.remove(&guard);

        Ok(result?
            .into_iter()
            .map(|(end, sub)| (end, self.node(element, at, end, vec![sub])))
            .collect())
    }

    fn match_alternation(
        &mut self,
        element: &Element,
        children: &[Element],
        at: usize,
    ) -> Result<Vec<Outcome<'input>>, Error> {
        let mut outcomes = Vec::new();
        let mut failures = Vec::new();
        for child in children {
            match self.outcomes(child, at) {
                Ok(subs) => {
                    outcomes.extend(
                        subs.into_iter()
                            .map(|(end, sub)| (end, self.node(element, at, end, vec![sub]))),
                    );
                }
                Err(error) => failures.push(error),
            }
        }
        if outcomes.is_empty() {
            return Err(Self::aggregate(at, failures));
        }
        Ok(outcomes)
    }

    fn match_concatenation(
        &mut self,
        element: &Element,
        children: &[Element],
        at: usize,
    ) -> Result<Vec<Outcome<'input>>, Error> {
        let mut partials: Vec<Partial<'input>> = vec![(at, Vec::new())];
        let mut deepest: Option<Error> = None;

        for child in children {
            let mut extended = Vec::new();
            for (end, matched) in &partials {
                match self.outcomes(child, *end) {
                    Ok(subs) => {
                        for (sub_end, sub) in subs {
                            let mut chained = matched.clone();
                            chained.push(sub);
                            extended.push((sub_end, chained));
                        }
                    }
                    Err(error) => deepest = Self::deeper(deepest.take(), error),
                }
            }
            if extended.is_empty() {
                return Err(deepest.unwrap_or_else(|| {
                    Mismatch {
                        index: at,
                        message: "unsatisfiable concatenation".to_owned(),
                    }
                    .into()
                }));
            }
            partials = extended;
            deepest = None;
        }

        Ok(partials
            .into_iter()
            .map(|(end, children)| (end, self.node(element, at, end, children)))
            .collect())
    }

    fn match_repetition(
        &mut self,
        element: &Element,
        inner: &Element,
        at_least: u32,
        up_to: Option<u32>,
        at: usize,
    ) -> Result<Vec<Outcome<'input>>, Error> {
        let mut collected: Vec<Partial<'input>> = Vec::new();
        let mut partials: Vec<Partial<'input>> = vec![(at, Vec::new())];
        let mut iterations: u32 = 0;
        let mut deepest: Option<Error> = None;

        if at_least == 0 {
            collected.push((at, Vec::new()));
        }

        while !partials.is_empty() && up_to.map_or(true, |up_to| iterations < up_to) {
            let mut extended: Vec<Partial<'input>> = Vec::new();
            for (end, matched) in &partials {
                match self.outcomes(inner, *end) {
                    Ok(subs) => {
                        for (sub_end, sub) in subs {
                            let mut chained = matched.clone();
                            chained.push(sub);
                            if iterations + 1 >= at_least {
                                collected.push((sub_end, chained.clone()));
                            }
                            // a zero-width iteration counts once but is
                            // never chained again, or `*("")`-style bodies
                            // would spin forever
                            if sub_end != *end {
                                extended.push((sub_end, chained));
                            }
                        }
                    }
                    Err(error) => deepest = Self::deeper(deepest.take(), error),
                }
            }
            partials = extended;
            iterations += 1;
        }

        if collected.is_empty() {
            return Err(deepest.unwrap_or_else(|| {
                Mismatch {
                    index: at,
                    message: "unsatisfiable repetition".to_owned(),
                }
                .into()
            }));
        }

        // longer chains first, so the selected tree is the greedy one
        collected.reverse();
        Ok(collected
            .into_iter()
            .map(|(end, children)| (end, self.node(element, at, end, children)))
            .collect())
    }

    fn match_optional(
        &mut self,
        element: &Element,
        inner: &Element,
        at: usize,
    ) -> Result<Vec<Outcome<'input>>, Error> {
        let mut outcomes = Vec::new();
        if let Ok(subs) = self.outcomes(inner, at) {
            outcomes.extend(
                subs.into_iter()
                    .map(|(end, sub)| (end, self.node(element, at, end, vec![sub]))),
            );
        }
        outcomes.push((at, self.node(element, at, at, Vec::new())));
        Ok(outcomes)
    }

    fn match_literal(
        &self,
        element: &Element,
        text: &str,
        case_sensitive: bool,
        at: usize,
    ) -> Result<Vec<Outcome<'input>>, Error> {
        let mut offset = at;
        for expected in text.chars() {
            match self.chars.get(offset) {
                Some(&actual)
                    if actual == expected
                        || (!case_sensitive && actual.eq_ignore_ascii_case(&expected)) =>
                {
                    offset += 1;
                }
                Some(_) => {
                    return Err(Mismatch {
                        index: offset,
                        message: format!("expected {element}"),
                    }
                    .into())
                }
                None => {
                    return Err(Mismatch {
                        index: offset,
                        message: format!("unexpected end of input, expected {element}"),
                    }
                    .into())
                }
            }
        }
        Ok(vec![(offset, self.node(element, at, offset, Vec::new()))])
    }

    fn match_series(
        &self,
        element: &Element,
        values: &[u32],
        at: usize,
    ) -> Result<Vec<Outcome<'input>>, Error> {
        let mut offset = at;
        for &expected in values {
            match self.chars.get(offset) {
                Some(&actual) if actual as u32 == expected => offset += 1,
                Some(_) => {
                    return Err(Mismatch {
                        index: offset,
                        message: format!("expected {element}"),
                    }
                    .into())
                }
                None => {
                    return Err(Mismatch {
                        index: offset,
                        message: format!("unexpected end of input, expected {element}"),
                    }
                    .into())
                }
            }
        }
        Ok(vec![(offset, self.node(element, at, offset, Vec::new()))])
    }

    fn match_range(
        &self,
        element: &Element,
        min: u32,
        max: u32,
        at: usize,
    ) -> Result<Vec<Outcome<'input>>, Error> {
        match self.chars.get(at) {
            Some(&actual) if (min..=max).contains(&(actual as u32)) => {
                Ok(vec![(at + 1, self.node(element, at, at + 1, Vec::new()))])
            }
            Some(_) => Err(Mismatch {
                index: at,
                message: format!("expected {element}"),
            }
            .into()),
            None => Err(Mismatch {
                index: at,
                message: format!("unexpected end of input, expected {element}"),
            }
            .into()),
        }
    }

    fn node(
        &self,
        element: &Element,
        start: usize,
        end: usize,
        children: Vec<ParseTree<'input>>,
    ) -> ParseTree<'input> {
        ParseTree {
            element: element.clone(),
            start,
            end,
            matched: &self.input[self.byte_offsets[start]..self.byte_offsets[end]],
            children,
        }
    }

    /// Flattens alternation failures into the error taxonomy: one leaf
    /// surfaces bare, several surface as a collection.
    fn aggregate(at: usize, failures: Vec<Error>) -> Error {
        let mut collection = ErrorCollection::default();
        for failure in failures {
            collection.absorb(failure);
        }
        match collection.errors.len() {
            0 => Mismatch {
                index: at,
                message: "no alternative matched".to_owned(),
            }
            .into(),
            1 => collection.errors.remove(0).into(),
            _ => collection.into(),
        }
    }

    /// Keeps whichever error reached deeper into the input.
    fn deeper(current: Option<Error>, candidate: Error) -> Option<Error> {
        match current {
            None => Some(candidate),
            Some(current) if Self::depth(&candidate) > Self::depth(&current) => Some(candidate),
            current => current,
        }
    }

    fn depth(error: &Error) -> usize {
        match error {
            Error::Mismatch(mismatch) => mismatch.index,
            Error::Collection(collection) => collection
                .errors
                .iter()
                .map(|mismatch| mismatch.index)
                .max()
                .unwrap_or(0),
        }
    }
}
