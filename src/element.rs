/*
    MIT License

    Copyright (c) 2026 The semchart developers

    Permission is hereby granted, free of charge, to any person obtaining a copy
    of this software and associated documentation files (the "Software"), to deal
    in the Software without restriction, including without limitation the rights
    to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
    copies of the Software, and to permit persons to whom the Software is
    furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in all
    copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
    OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
    SOFTWARE.
*/

//! Grammar elements and their composition operators

use std::cell::RefCell;
use std::fmt;
use std::ops::{Add, BitOr, Mul};
use std::rc::Rc;
use std::sync::Arc;

use itertools::Itertools;
use regex::Regex;

use crate::grammar::GrammarError;
use crate::result::ResultHandle;

/// Error type a result action may return. The cause is preserved and
/// reported through `ParseError::Action`.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// A result action post-processes the value of its element after a parse,
/// through the get/set handle. It runs once per completed occurrence.
pub type ResultAction =
    Arc<dyn Fn(&mut ResultHandle<'_>) -> Result<(), ActionError> + Send + Sync>;

/// A node of the element graph. Shared subtrees are allowed; the graph is
/// acyclic by construction since nodes own their children.
pub(crate) enum ElemKind {
    /// Matches a single token equal to a fixed string.
    Literal(String),

    /// Matches any member of a finite set of phrases. Multi-word members
    /// consume the corresponding number of consecutive tokens.
    Set(Vec<Vec<String>>),

    /// Matches a token, or a window of consecutive tokens joined by single
    /// spaces when the pattern itself contains spaces. The pattern is kept
    /// as text and compiled (anchored) when the grammar is compiled, so the
    /// case policy of the grammar applies.
    Regex(String),

    /// Ordered concatenation.
    And(Vec<Elem>),

    /// Unordered alternatives, tried in declaration order.
    Or(Vec<Elem>),

    /// Zero or one occurrence.
    Optional(Elem),

    /// `min` or more occurrences, up to `max` if bounded.
    Repeat {
        elem: Elem,
        min: usize,
        max: Option<usize>,
    },

    /// Matches the empty string.
    Null,
}

pub(crate) struct ElemNode {
    kind: ElemKind,
    name: RefCell<Option<String>>,
    actions: RefCell<Vec<ResultAction>>,
}

/// Handle to an element. Cheap to clone; clones refer to the same node, so
/// an element can be shared between several places in a grammar.
#[derive(Clone)]
pub struct Elem(Rc<ElemNode>);

impl Elem {
    fn node(kind: ElemKind) -> Elem {
        Elem(Rc::new(ElemNode {
            kind,
            name: RefCell::new(None),
            actions: RefCell::new(Vec::new()),
        }))
    }

    /// A literal word, compared per the grammar's case policy.
    pub fn lit(word: &str) -> Elem {
        Elem::node(ElemKind::Literal(word.to_string()))
    }

    /// A finite set of words or multi-word phrases.
    pub fn set<I, S>(members: I) -> Elem
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = members
            .into_iter()
            .map(|m| {
                m.as_ref()
                    .split_ascii_whitespace()
                    .map(str::to_string)
                    .collect()
            })
            .collect();
        Elem::node(ElemKind::Set(phrases))
    }

    /// A regular expression terminal. The pattern is validated here and
    /// compiled anchored to the full token (or token window) later.
    pub fn regex(pattern: &str) -> Result<Elem, GrammarError> {
        if let Err(source) = Regex::new(pattern) {
            return Err(GrammarError::Regex {
                pattern: pattern.to_string(),
                source,
            });
        }
        Ok(Elem::node(ElemKind::Regex(pattern.to_string())))
    }

    /// The empty string.
    pub fn null() -> Elem {
        Elem::node(ElemKind::Null)
    }

    /// Ordered concatenation of the given elements. `a + b` is the usual
    /// way to spell this.
    pub fn and(parts: Vec<Elem>) -> Elem {
        Elem::node(ElemKind::And(parts))
    }

    /// Alternation over the given elements. `a | b` is the usual way to
    /// spell this.
    pub fn or(alts: Vec<Elem>) -> Elem {
        Elem::node(ElemKind::Or(alts))
    }

    /// Zero or one occurrence of this element.
    pub fn opt(self) -> Elem {
        Elem::node(ElemKind::Optional(self))
    }

    /// One or more occurrences of this element.
    pub fn one_or_more(self) -> Elem {
        self.repeat(1, None)
    }

    /// Zero or more occurrences of this element.
    pub fn zero_or_more(self) -> Elem {
        self.repeat(0, None)
    }

    /// Between `min` and `max` occurrences; `None` leaves the repetition
    /// unbounded above.
    pub fn repeat(self, min: usize, max: impl Into<Option<usize>>) -> Elem {
        let max = max.into();
        if let Some(m) = max {
            assert!(m >= 1 && min <= m, "repetition bounds must satisfy 1 <= min <= max");
        }
        Elem::node(ElemKind::Repeat {
            elem: self,
            min,
            max,
        })
    }

    /// Register a result action on this element, builder style. At most
    /// one action per element; a second registration is reported when the
    /// grammar is compiled.
    pub fn on_result<F>(self, action: F) -> Elem
    where
        F: Fn(&mut ResultHandle<'_>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.0.actions.borrow_mut().push(Arc::new(action));
        self
    }

    pub(crate) fn kind(&self) -> &ElemKind {
        &self.0.kind
    }

    /// Stable identity of the underlying node, for the compiler's visit map.
    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub(crate) fn given_name(&self) -> Option<String> {
        self.0.name.borrow().clone()
    }

    pub(crate) fn set_name(&self, name: &str) -> Result<(), GrammarError> {
        let mut slot = self.0.name.borrow_mut();
        match slot.as_ref() {
            Some(old) if old != name => Err(GrammarError::ConflictingName {
                old: old.clone(),
                new: name.to_string(),
            }),
            _ => {
                *slot = Some(name.to_string());
                Ok(())
            }
        }
    }

    /// The single registered action, if any. More than one is an error,
    /// reported under the element's display name.
    pub(crate) fn single_action(&self, name: &str) -> Result<Option<ResultAction>, GrammarError> {
        let actions = self.0.actions.borrow();
        match actions.len() {
            0 => Ok(None),
            1 => Ok(Some(actions[0].clone())),
            _ => Err(GrammarError::ConflictingActions(name.to_string())),
        }
    }

    fn is_anonymous(&self) -> bool {
        self.0.name.borrow().is_none() && self.0.actions.borrow().is_empty()
    }

    /// Children of an anonymous chain of the same operator, so that
    /// `a + b + c` builds one three-way concatenation instead of nesting.
    fn flat_and_parts(&self) -> Vec<Elem> {
        if self.is_anonymous() {
            if let ElemKind::And(parts) = self.kind() {
                return parts.clone();
            }
        }
        vec![self.clone()]
    }

    fn flat_or_parts(&self) -> Vec<Elem> {
        if self.is_anonymous() {
            if let ElemKind::Or(alts) = self.kind() {
                return alts.clone();
            }
        }
        vec![self.clone()]
    }

    /// The element's name if assigned, else its printable form. Used for
    /// synthetic symbol names and error messages.
    pub(crate) fn label(&self) -> String {
        match self.given_name() {
            Some(name) => name,
            None => format!("{}", self),
        }
    }
}

impl Add for Elem {
    type Output = Elem;

    fn add(self, rhs: Elem) -> Elem {
        let mut parts = self.flat_and_parts();
        parts.extend(rhs.flat_and_parts());
        Elem::and(parts)
    }
}

impl BitOr for Elem {
    type Output = Elem;

    fn bitor(self, rhs: Elem) -> Elem {
        let mut alts = self.flat_or_parts();
        alts.extend(rhs.flat_or_parts());
        Elem::or(alts)
    }
}

impl Mul<usize> for Elem {
    type Output = Elem;

    /// `a * n` concatenates n copies of a.
    fn mul(self, n: usize) -> Elem {
        assert!(n >= 1, "n-fold concatenation needs n >= 1");
        Elem::and(vec![self; n])
    }
}

impl Mul<(usize, usize)> for Elem {
    type Output = Elem;

    /// `a * (min, max)` repeats a between min and max times.
    fn mul(self, bounds: (usize, usize)) -> Elem {
        self.repeat(bounds.0, bounds.1)
    }
}

impl fmt::Display for Elem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind() {
            ElemKind::Literal(word) => write!(f, "'{}'", word),
            ElemKind::Set(phrases) => write!(
                f,
                "Set({})",
                phrases.iter().map(|p| p.join(" ")).join("|")
            ),
            ElemKind::Regex(pattern) => write!(f, "Regex({})", pattern),
            ElemKind::And(parts) => {
                write!(f, "({})", parts.iter().map(|p| p.label()).join(" + "))
            }
            ElemKind::Or(alts) => {
                write!(f, "({})", alts.iter().map(|a| a.label()).join(" | "))
            }
            ElemKind::Optional(inner) => write!(f, "Optional({})", inner.label()),
            ElemKind::Repeat {
                elem,
                min: 1,
                max: None,
            } => write!(f, "OneOrMore({})", elem.label()),
            ElemKind::Repeat {
                elem,
                min: 0,
                max: None,
            } => write!(f, "ZeroOrMore({})", elem.label()),
            ElemKind::Repeat { elem, min, max } => match max {
                Some(m) => write!(f, "Repeat({}, {}, {})", elem.label(), min, m),
                None => write!(f, "Repeat({}, {}+)", elem.label(), min),
            },
            ElemKind::Null => write!(f, "Null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_flatten() {
        let a = Elem::lit("a");
        let b = Elem::lit("b");
        let c = Elem::lit("c");
        let chain = a + b + c;
        match chain.kind() {
            ElemKind::And(parts) => assert_eq!(parts.len(), 3),
            _ => panic!("expected And"),
        }

        let alts = Elem::lit("x") | Elem::lit("y") | Elem::lit("z");
        match alts.kind() {
            ElemKind::Or(alts) => assert_eq!(alts.len(), 3),
            _ => panic!("expected Or"),
        }
    }

    #[test]
    fn named_chain_does_not_flatten() {
        let inner = Elem::lit("a") + Elem::lit("b");
        inner.set_name("pair").unwrap();
        let outer = inner + Elem::lit("c");
        match outer.kind() {
            ElemKind::And(parts) => assert_eq!(parts.len(), 2),
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn repetition_sugar() {
        let starred = Elem::lit("a") * 3;
        match starred.kind() {
            ElemKind::And(parts) => assert_eq!(parts.len(), 3),
            _ => panic!("expected And"),
        }

        let bounded = Elem::lit("a") * (1, 2);
        match bounded.kind() {
            ElemKind::Repeat { min, max, .. } => {
                assert_eq!(*min, 1);
                assert_eq!(*max, Some(2));
            }
            _ => panic!("expected Repeat"),
        }
    }

    #[test]
    fn printable_forms() {
        let times = Elem::set(vec!["once", "twice", "three times"]);
        assert_eq!(format!("{}", times), "Set(once|twice|three times)");
        times.set_name("times").unwrap();
        assert_eq!(format!("{}", times.clone().opt()), "Optional(times)");
        assert_eq!(
            format!("{}", Elem::regex(r"\d+ times").unwrap()),
            r"Regex(\d+ times)"
        );
        assert_eq!(format!("{}", Elem::lit("to")), "'to'");
        assert_eq!(
            format!("{}", Elem::lit("a").one_or_more()),
            "OneOrMore('a')"
        );
    }

    #[test]
    fn renaming_is_rejected() {
        let e = Elem::lit("a");
        e.set_name("first").unwrap();
        assert!(e.set_name("first").is_ok());
        assert!(e.set_name("second").is_err());
    }

    #[test]
    fn bad_regex_is_rejected() {
        assert!(Elem::regex("(unclosed").is_err());
    }
}
