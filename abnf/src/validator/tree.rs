use crate::grammar::ast::Element;

/// One node of the tree produced by a successful validation.
///
/// `start` and `end` are code-point offsets into the validated input and
/// `matched` is the corresponding slice, so `matched` always equals the
/// input between `start` and `end`. Non-terminal elements carry their
/// sub-matches in `children`, in match order; terminal elements are leaves.
/// Nodes own a clone of their originating element, so a tree borrows
/// nothing but the input string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseTree<'input> {
    pub element: Element,
    pub start: usize,
    pub end: usize,
    pub matched: &'input str,
    pub children: Vec<ParseTree<'input>>,
}
