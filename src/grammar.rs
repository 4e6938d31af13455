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

//! Grammar builder and compiler

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use regex::RegexBuilder;
use thiserror::Error;

use crate::element::{Elem, ElemKind, ResultAction};
use crate::token::TokenStream;

/// Symbol IDs are indices into the symbol table. As such, they can be
/// fairly small integers to save space. 16 bit should be sufficient for all
/// purposes. If not, file a feature request.
pub type SymbolId = u16;

pub(crate) type RuleId = usize;

/// Number of symbol ids.
const MAX_SYMBOL_ID: usize = u16::MAX as usize;

/// Errors raised while defining or compiling a grammar. A grammar that
/// fails to compile is unusable.
#[derive(Debug, Error)]
pub enum GrammarError {
    /// No goal element was set before compiling.
    #[error("no goal element was set")]
    MissingGoal,

    /// A defined element does not occur in the goal's element graph.
    #[error("defined element '{0}' is not reachable from the goal")]
    Unreachable(String),

    /// One element was registered under two different names.
    #[error("element named '{old}' cannot be renamed to '{new}'")]
    ConflictingName { old: String, new: String },

    /// More than one result action was registered on one element.
    #[error("element '{0}' carries more than one result action")]
    ConflictingActions(String),

    /// A regular expression failed to compile.
    #[error("invalid regular expression '{pattern}'")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// An element that needs content was empty.
    #[error("{0} must not be empty")]
    Empty(String),

    /// Too many entries to compile.
    #[error("too many {0} to compile")]
    TooLarge(String),
}

type Result<T> = std::result::Result<T, GrammarError>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum RuleKind {
    /// An ordinary production.
    Normal,

    /// The pseudo-rule of a terminal symbol. Edges over a lexical rule are
    /// always passive and denote a token match over their span.
    Lexical,
}

/// A production `lhs -> rhs0 rhs1 ..`. Symbols below `nt_count` are
/// nonterminals, all other ids are terminals.
#[derive(Clone, Debug)]
pub(crate) struct Rule {
    pub(crate) lhs: SymbolId,
    pub(crate) rhs: Vec<SymbolId>,
    pub(crate) kind: RuleKind,
}

/// Match function of a terminal symbol. Returns the exclusive end of the
/// longest match starting at a token position, or None.
#[derive(Clone)]
pub(crate) enum Terminal {
    Literal(String),
    Set(Vec<Vec<String>>),
    Pattern {
        re: regex::Regex,
        /// Upper bound on the token window, derived from the number of
        /// spaces in the pattern.
        max_words: usize,
    },
}

impl Terminal {
    pub(crate) fn matches(&self, toks: &TokenStream, at: usize) -> Option<usize> {
        match self {
            Terminal::Literal(word) => match toks.get(at) {
                Some(t) if t == word.as_str() => Some(at + 1),
                _ => None,
            },
            Terminal::Set(phrases) => {
                let mut best = None;
                for phrase in phrases {
                    if phrase.is_empty() || at + phrase.len() > toks.len() {
                        continue;
                    }
                    let hit = phrase
                        .iter()
                        .enumerate()
                        .all(|(k, w)| toks.get(at + k) == Some(w.as_str()));
                    if hit {
                        let end = at + phrase.len();
                        if best.map_or(true, |b| end > b) {
                            best = Some(end);
                        }
                    }
                }
                best
            }
            Terminal::Pattern { re, max_words } => {
                if at >= toks.len() {
                    return None;
                }
                let limit = (*max_words).min(toks.len() - at);
                // Longest window first.
                for len in (1..=limit).rev() {
                    if re.is_match(&toks.window(at, at + len)) {
                        return Some(at + len);
                    }
                }
                None
            }
        }
    }
}

/// Per-symbol facts needed after compilation, mostly by the result builder.
#[derive(Clone)]
pub(crate) struct SymbolInfo {
    /// True if the name was assigned by the user, which makes the symbol a
    /// binding site in parse results.
    pub(crate) named: bool,

    /// Result action, at most one per element.
    pub(crate) action: Option<ResultAction>,

    /// True for repetition symbols; their recursive spine collapses into a
    /// list of occurrences.
    pub(crate) repetition: bool,

    /// For generated repetition tails: the repetition symbol whose
    /// occurrence list absorbs this symbol's occurrences.
    pub(crate) splice_into: Option<SymbolId>,
}

/// A checked and compacted grammar. Immutable after compilation and safe to
/// share between parsers.
///
/// The invariant for symbol ids holds throughout: if an id is below
/// `nt_count()` it is a nonterminal, all other ids are terminals.
#[derive(Clone)]
pub struct Grammar {
    /// Names of all symbols, nonterminals first.
    names: Vec<String>,
    nt_count: SymbolId,
    /// Match functions, indexed by `symbol - nt_count`.
    terminals: Vec<Terminal>,
    rules: Vec<Rule>,
    /// Normal rules grouped by lhs, declaration order.
    rules_by_lhs: Vec<Vec<RuleId>>,
    /// Normal rules grouped by their first rhs symbol.
    rules_with_first: HashMap<SymbolId, Vec<RuleId>>,
    /// Lexical rule of each terminal, indexed by `symbol - nt_count`.
    lex_rules: Vec<RuleId>,
    /// Empty rules of each nonterminal.
    empty_rules: Vec<Vec<RuleId>>,
    goal: SymbolId,
    nullable: Vec<bool>,
    /// Transitive left-corner closure of each nonterminal, nullable
    /// prefixes included. Not reflexive.
    left_corners: Vec<HashSet<SymbolId>>,
    /// Terminals in the reflexive closure, per symbol.
    lc_terminals: Vec<Vec<SymbolId>>,
    /// Empty rules of nullable nonterminals in the reflexive closure, per
    /// symbol.
    lc_empty_rules: Vec<Vec<RuleId>>,
    info: Vec<SymbolInfo>,
    case_sensitive: bool,
}

impl Grammar {
    /// Id of the start symbol.
    pub fn goal(&self) -> SymbolId {
        self.goal
    }

    /// Number of nonterminal symbols.
    pub fn nt_count(&self) -> SymbolId {
        self.nt_count
    }

    /// Number of terminal symbols.
    pub fn t_count(&self) -> SymbolId {
        self.terminals.len() as SymbolId
    }

    /// Number of symbols of both kinds.
    pub fn symbol_count(&self) -> usize {
        self.names.len()
    }

    /// Printable name of a symbol.
    pub fn name(&self, sym: SymbolId) -> &str {
        &self.names[sym as usize]
    }

    /// Look up a symbol by name. Slow; meant for queries and tests, not for
    /// mass use.
    pub fn symbol(&self, name: &str) -> Option<SymbolId> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| i as SymbolId)
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub(crate) fn is_nonterminal(&self, sym: SymbolId) -> bool {
        sym < self.nt_count
    }

    pub(crate) fn rule(&self, rule: RuleId) -> &Rule {
        &self.rules[rule]
    }

    /// Number of rules, lexical pseudo-rules included.
    pub fn rules_count(&self) -> usize {
        self.rules.len()
    }

    pub(crate) fn rules_of(&self, nt: SymbolId) -> &[RuleId] {
        &self.rules_by_lhs[nt as usize]
    }

    pub(crate) fn rules_with_first(&self, sym: SymbolId) -> &[RuleId] {
        self.rules_with_first
            .get(&sym)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn lex_rule(&self, term: SymbolId) -> RuleId {
        self.lex_rules[(term - self.nt_count) as usize]
    }

    pub(crate) fn empty_rules_of(&self, nt: SymbolId) -> &[RuleId] {
        &self.empty_rules[nt as usize]
    }

    pub(crate) fn match_terminal(
        &self,
        term: SymbolId,
        toks: &TokenStream,
        at: usize,
    ) -> Option<usize> {
        self.terminals[(term - self.nt_count) as usize].matches(toks, at)
    }

    /// Can the nonterminal derive the empty string?
    pub fn nullable(&self, nt: SymbolId) -> bool {
        self.nullable[nt as usize]
    }

    /// Reflexive left-corner test: can a derivation of `sym` begin with
    /// `target`?
    pub(crate) fn lc_contains(&self, sym: SymbolId, target: SymbolId) -> bool {
        sym == target
            || (self.is_nonterminal(sym) && self.left_corners[sym as usize].contains(&target))
    }

    pub(crate) fn lc_terminals(&self, sym: SymbolId) -> &[SymbolId] {
        &self.lc_terminals[sym as usize]
    }

    pub(crate) fn lc_empty_rules(&self, sym: SymbolId) -> &[RuleId] {
        &self.lc_empty_rules[sym as usize]
    }

    pub(crate) fn info(&self, sym: SymbolId) -> &SymbolInfo {
        &self.info[sym as usize]
    }

    pub(crate) fn nonterminal_symbols(&self) -> impl Iterator<Item = SymbolId> {
        0..self.nt_count
    }

    pub(crate) fn terminal_symbols(&self) -> impl Iterator<Item = SymbolId> {
        self.nt_count..(self.names.len() as SymbolId)
    }

    /// Render a dotted rule for traces and tests.
    pub(crate) fn dotted_to_string(&self, rule: RuleId, dot: usize) -> String {
        let r = &self.rules[rule];
        if r.kind == RuleKind::Lexical {
            return format!("{} = <scan>", self.name(r.lhs));
        }
        let mut s = format!("{} =", self.name(r.lhs));
        for (k, sym) in r.rhs.iter().enumerate() {
            if k == dot {
                s.push_str(" .");
            }
            s.push(' ');
            s.push_str(self.name(*sym));
        }
        if dot == r.rhs.len() {
            s.push_str(" .");
        }
        s
    }
}

/// Collects named elements and the goal, then compiles them into a
/// [Grammar]. This replaces class-attribute collection in grammars written
/// as host-language classes: every attribute becomes a `define` call.
pub struct GrammarBuilder {
    defs: Vec<(String, Elem)>,
    goal: Option<Elem>,
    case_sensitive: bool,
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        GrammarBuilder::new()
    }
}

impl GrammarBuilder {
    pub fn new() -> Self {
        GrammarBuilder {
            defs: Vec::new(),
            goal: None,
            case_sensitive: false,
        }
    }

    /// Register `elem` as a named symbol of the grammar and hand it back
    /// for further composition.
    pub fn define(&mut self, name: &str, elem: Elem) -> Elem {
        self.defs.push((name.to_string(), elem.clone()));
        elem
    }

    /// Register the start element. It becomes a named symbol `GOAL`.
    pub fn goal(&mut self, elem: Elem) -> Elem {
        let elem = self.define("GOAL", elem);
        self.goal = Some(elem.clone());
        elem
    }

    /// Token comparison policy. Off by default: tokens and terminals are
    /// ASCII-lowercased before matching.
    pub fn case_sensitive(&mut self, flag: bool) -> &mut Self {
        self.case_sensitive = flag;
        self
    }

    /// Check the element graph and compile it into the flat form the
    /// parser works on.
    pub fn compile(self) -> Result<Grammar> {
        let goal_elem = match self.goal {
            Some(ref e) => e.clone(),
            None => return Err(GrammarError::MissingGoal),
        };
        for (name, elem) in &self.defs {
            elem.set_name(name)?;
        }
        if let ElemKind::Null = goal_elem.kind() {
            return Err(GrammarError::Empty("goal element".to_string()));
        }

        // Walk the graph once, splitting elements into compounds (future
        // nonterminals) and leaves (future terminals).
        let mut seen = HashSet::new();
        let mut compounds = Vec::new();
        let mut leaves = Vec::new();
        walk(&goal_elem, &mut seen, &mut compounds, &mut leaves);

        for (name, elem) in &self.defs {
            if !seen.contains(&elem.key()) {
                return Err(GrammarError::Unreachable(name.clone()));
            }
        }

        // Assign symbol ids: compounds, then generated repetition tails,
        // then a wrapper if the goal itself is a leaf, then terminals.
        let mut sym_of: HashMap<usize, SymbolId> = HashMap::new();
        for (i, e) in compounds.iter().enumerate() {
            sym_of.insert(e.key(), i as SymbolId);
        }
        let mut next = compounds.len();
        let mut tail_of: HashMap<usize, SymbolId> = HashMap::new();
        let mut tails: Vec<(SymbolId, Elem, SymbolId)> = Vec::new();
        for e in &compounds {
            if let ElemKind::Repeat {
                elem: child,
                min,
                max: None,
            } = e.kind()
            {
                if *min >= 2 && !is_null(child) {
                    if next > MAX_SYMBOL_ID {
                        return Err(GrammarError::TooLarge("symbols".to_string()));
                    }
                    let tail = next as SymbolId;
                    tail_of.insert(e.key(), tail);
                    tails.push((tail, child.clone(), sym_of[&e.key()]));
                    next += 1;
                }
            }
        }
        let goal_is_leaf = !sym_of.contains_key(&goal_elem.key());
        let wrapper = if goal_is_leaf {
            let w = next as SymbolId;
            next += 1;
            Some(w)
        } else {
            None
        };
        let nt_total = next;
        if nt_total + leaves.len() > MAX_SYMBOL_ID {
            return Err(GrammarError::TooLarge("symbols".to_string()));
        }
        for (k, t) in leaves.iter().enumerate() {
            sym_of.insert(t.key(), (nt_total + k) as SymbolId);
        }

        // Names and per-symbol info.
        let mut names = vec![String::new(); nt_total + leaves.len()];
        let mut info = vec![
            SymbolInfo {
                named: false,
                action: None,
                repetition: false,
                splice_into: None,
            };
            nt_total + leaves.len()
        ];
        for e in &compounds {
            let sym = sym_of[&e.key()] as usize;
            names[sym] = e.label();
            info[sym].named = e.given_name().is_some();
            info[sym].action = e.single_action(&names[sym])?;
            if let ElemKind::Repeat { .. } = e.kind() {
                info[sym].repetition = true;
            }
        }
        for (tail, child, parent) in &tails {
            let sym = *tail as usize;
            names[sym] = format!("OneOrMore({})", child.label());
            info[sym].repetition = true;
            info[sym].splice_into = Some(*parent);
        }
        if let Some(w) = wrapper {
            names[w as usize] = "GOAL".to_string();
        }
        for t in &leaves {
            let sym = sym_of[&t.key()] as usize;
            names[sym] = t.label();
            info[sym].named = t.given_name().is_some();
            info[sym].action = t.single_action(&names[sym])?;
        }

        // Compile the terminal match functions.
        let mut terminals = Vec::with_capacity(leaves.len());
        for t in &leaves {
            terminals.push(compile_terminal(t, self.case_sensitive)?);
        }

        // Emit the productions.
        let mut rules: Vec<Rule> = Vec::new();
        for e in &compounds {
            let lhs = sym_of[&e.key()];
            emit_rules(e, lhs, &sym_of, &tail_of, &mut rules)?;
        }
        for (tail, child, _) in &tails {
            let child_sym = sym_of[&child.key()];
            push_rule(&mut rules, *tail, vec![child_sym])?;
            push_rule(&mut rules, *tail, vec![child_sym, *tail])?;
        }
        if let Some(w) = wrapper {
            let goal_sym = sym_of[&goal_elem.key()];
            push_rule(&mut rules, w, vec![goal_sym])?;
        }
        let mut lex_rules = Vec::with_capacity(leaves.len());
        for k in 0..leaves.len() {
            lex_rules.push(rules.len());
            rules.push(Rule {
                lhs: (nt_total + k) as SymbolId,
                rhs: Vec::new(),
                kind: RuleKind::Lexical,
            });
        }

        // Index the rules.
        let mut rules_by_lhs = vec![Vec::new(); nt_total];
        let mut empty_rules = vec![Vec::new(); nt_total];
        let mut rules_with_first: HashMap<SymbolId, Vec<RuleId>> = HashMap::new();
        for (id, rule) in rules.iter().enumerate() {
            if rule.kind != RuleKind::Normal {
                continue;
            }
            rules_by_lhs[rule.lhs as usize].push(id);
            if rule.rhs.is_empty() {
                empty_rules[rule.lhs as usize].push(id);
            } else {
                rules_with_first.entry(rule.rhs[0]).or_default().push(id);
            }
        }

        // Nullability, to fixpoint.
        let mut nullable = vec![false; nt_total];
        loop {
            let mut changed = false;
            for rule in &rules {
                if rule.kind != RuleKind::Normal || nullable[rule.lhs as usize] {
                    continue;
                }
                let all = rule
                    .rhs
                    .iter()
                    .all(|&s| (s as usize) < nt_total && nullable[s as usize]);
                if all {
                    nullable[rule.lhs as usize] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        // Left-corner closure, to fixpoint. A symbol is a left corner of a
        // rule as long as everything before it can derive the empty string.
        let mut left_corners: Vec<HashSet<SymbolId>> = vec![HashSet::new(); nt_total];
        loop {
            let mut changed = false;
            for rule in &rules {
                if rule.kind != RuleKind::Normal {
                    continue;
                }
                let lhs = rule.lhs as usize;
                for &s in &rule.rhs {
                    if left_corners[lhs].insert(s) {
                        changed = true;
                    }
                    if (s as usize) < nt_total {
                        let inherited: Vec<SymbolId> =
                            left_corners[s as usize].iter().copied().collect();
                        for t in inherited {
                            if left_corners[lhs].insert(t) {
                                changed = true;
                            }
                        }
                        if !nullable[s as usize] {
                            break;
                        }
                    } else {
                        break;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        // Per-symbol caches for the left-corner strategy.
        let total = nt_total + leaves.len();
        let mut lc_terminals = Vec::with_capacity(total);
        let mut lc_empty_rules = Vec::with_capacity(total);
        for s in 0..total {
            if s >= nt_total {
                lc_terminals.push(vec![s as SymbolId]);
                lc_empty_rules.push(Vec::new());
                continue;
            }
            let terms: Vec<SymbolId> = left_corners[s]
                .iter()
                .copied()
                .filter(|&t| (t as usize) >= nt_total)
                .sorted()
                .collect();
            lc_terminals.push(terms);
            let mut er: Vec<RuleId> = Vec::new();
            er.extend(empty_rules[s].iter().copied());
            for &t in left_corners[s].iter() {
                if (t as usize) < nt_total {
                    er.extend(empty_rules[t as usize].iter().copied());
                }
            }
            er.sort();
            er.dedup();
            lc_empty_rules.push(er);
        }

        let goal = match wrapper {
            Some(w) => w,
            None => sym_of[&goal_elem.key()],
        };

        Ok(Grammar {
            names,
            nt_count: nt_total as SymbolId,
            terminals,
            rules,
            rules_by_lhs,
            rules_with_first,
            lex_rules,
            empty_rules,
            goal,
            nullable,
            left_corners,
            lc_terminals,
            lc_empty_rules,
            info,
            case_sensitive: self.case_sensitive,
        })
    }
}

fn walk(elem: &Elem, seen: &mut HashSet<usize>, compounds: &mut Vec<Elem>, leaves: &mut Vec<Elem>) {
    if !seen.insert(elem.key()) {
        return;
    }
    match elem.kind() {
        ElemKind::Literal(_) | ElemKind::Set(_) | ElemKind::Regex(_) => leaves.push(elem.clone()),
        ElemKind::Null => {}
        ElemKind::And(parts) => {
            compounds.push(elem.clone());
            for c in parts {
                walk(c, seen, compounds, leaves);
            }
        }
        ElemKind::Or(alts) => {
            compounds.push(elem.clone());
            for c in alts {
                walk(c, seen, compounds, leaves);
            }
        }
        ElemKind::Optional(inner) => {
            compounds.push(elem.clone());
            walk(inner, seen, compounds, leaves);
        }
        ElemKind::Repeat { elem: inner, .. } => {
            compounds.push(elem.clone());
            walk(inner, seen, compounds, leaves);
        }
    }
}

fn compile_terminal(elem: &Elem, case_sensitive: bool) -> Result<Terminal> {
    let norm = |s: &str| {
        if case_sensitive {
            s.to_string()
        } else {
            s.to_ascii_lowercase()
        }
    };
    match elem.kind() {
        ElemKind::Literal(word) => {
            if word.is_empty() {
                return Err(GrammarError::Empty("literal".to_string()));
            }
            Ok(Terminal::Literal(norm(word)))
        }
        ElemKind::Set(phrases) => {
            if phrases.is_empty() || phrases.iter().any(|p| p.is_empty()) {
                return Err(GrammarError::Empty("string set".to_string()));
            }
            Ok(Terminal::Set(
                phrases
                    .iter()
                    .map(|p| p.iter().map(|w| norm(w)).collect())
                    .collect(),
            ))
        }
        ElemKind::Regex(pattern) => {
            let re = RegexBuilder::new(&format!("^(?:{})$", pattern))
                .case_insensitive(!case_sensitive)
                .build()
                .map_err(|source| GrammarError::Regex {
                    pattern: pattern.clone(),
                    source,
                })?;
            let max_words = pattern.matches(' ').count() + 1;
            Ok(Terminal::Pattern { re, max_words })
        }
        _ => {
            debug_assert!(false, "compile_terminal called on a compound element");
            Err(GrammarError::Empty("terminal".to_string()))
        }
    }
}

fn push_rule(rules: &mut Vec<Rule>, lhs: SymbolId, rhs: Vec<SymbolId>) -> Result<()> {
    // The dot must be able to point past the last entry.
    if rhs.len() >= MAX_SYMBOL_ID {
        return Err(GrammarError::TooLarge("rule right-hand side".to_string()));
    }
    rules.push(Rule {
        lhs,
        rhs,
        kind: RuleKind::Normal,
    });
    Ok(())
}

fn is_null(elem: &Elem) -> bool {
    match elem.kind() {
        ElemKind::Null => true,
        _ => false,
    }
}

fn emit_rules(
    elem: &Elem,
    lhs: SymbolId,
    sym_of: &HashMap<usize, SymbolId>,
    tail_of: &HashMap<usize, SymbolId>,
    rules: &mut Vec<Rule>,
) -> Result<()> {
    let sym = |e: &Elem| sym_of[&e.key()];
    match elem.kind() {
        ElemKind::And(parts) => {
            if parts.is_empty() {
                return Err(GrammarError::Empty("concatenation".to_string()));
            }
            // Null children match the empty string and vanish from the rhs.
            let rhs: Vec<SymbolId> = parts
                .iter()
                .filter(|p| !is_null(p))
                .map(|p| sym(p))
                .collect();
            push_rule(rules, lhs, rhs)?;
        }
        ElemKind::Or(alts) => {
            if alts.is_empty() {
                return Err(GrammarError::Empty("alternation".to_string()));
            }
            let mut emitted_empty = false;
            for a in alts {
                if is_null(a) {
                    if !emitted_empty {
                        push_rule(rules, lhs, Vec::new())?;
                        emitted_empty = true;
                    }
                } else {
                    push_rule(rules, lhs, vec![sym(a)])?;
                }
            }
        }
        ElemKind::Optional(inner) => {
            if !is_null(inner) {
                push_rule(rules, lhs, vec![sym(inner)])?;
            }
            push_rule(rules, lhs, Vec::new())?;
        }
        ElemKind::Repeat {
            elem: inner,
            min,
            max,
        } => {
            if is_null(inner) {
                push_rule(rules, lhs, Vec::new())?;
                return Ok(());
            }
            let inner_sym = sym(inner);
            match max {
                Some(m) => {
                    for len in *min..=*m {
                        push_rule(rules, lhs, vec![inner_sym; len])?;
                    }
                }
                None => {
                    if *min <= 1 {
                        if *min == 0 {
                            push_rule(rules, lhs, Vec::new())?;
                        }
                        push_rule(rules, lhs, vec![inner_sym])?;
                        push_rule(rules, lhs, vec![inner_sym, lhs])?;
                    } else {
                        let tail = tail_of[&elem.key()];
                        let mut rhs = vec![inner_sym; *min - 1];
                        rhs.push(tail);
                        push_rule(rules, lhs, rhs)?;
                    }
                }
            }
        }
        _ => debug_assert!(false, "emit_rules called on a leaf element"),
    }
    Ok(())
}
