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

//! Parse trees: reconstruction from the chart, ranking, enumeration

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::io;

use crate::chart::{Backpointer, Chart, EdgeId};
use crate::grammar::{Grammar, RuleKind, SymbolId};
use crate::token::TokenStream;

/// A parse tree. Terminal leaves carry the matched text with its original
/// spacing; inner nodes carry their symbol and the production that built
/// them.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseTree {
    Leaf {
        symbol: SymbolId,
        start: usize,
        end: usize,
        text: String,
    },
    Node {
        symbol: SymbolId,
        rule: usize,
        start: usize,
        end: usize,
        children: Vec<ParseTree>,
    },
}

impl ParseTree {
    pub fn symbol(&self) -> SymbolId {
        match self {
            ParseTree::Leaf { symbol, .. } => *symbol,
            ParseTree::Node { symbol, .. } => *symbol,
        }
    }

    pub fn start(&self) -> usize {
        match self {
            ParseTree::Leaf { start, .. } => *start,
            ParseTree::Node { start, .. } => *start,
        }
    }

    pub fn end(&self) -> usize {
        match self {
            ParseTree::Leaf { end, .. } => *end,
            ParseTree::Node { end, .. } => *end,
        }
    }

    pub fn is_leaf(&self) -> bool {
        match self {
            ParseTree::Leaf { .. } => true,
            _ => false,
        }
    }

    /// Matched text of a leaf.
    pub fn text(&self) -> Option<&str> {
        match self {
            ParseTree::Leaf { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn children(&self) -> &[ParseTree] {
        match self {
            ParseTree::Leaf { .. } => &[],
            ParseTree::Node { children, .. } => children,
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Attach symbol names for rendering, e.g. with `ptree::print_tree`.
    pub fn display<'a>(&'a self, grammar: &'a Grammar) -> TreeDisplay<'a> {
        TreeDisplay {
            tree: self,
            grammar,
        }
    }
}

/// A parse tree paired with the grammar that names its symbols.
#[derive(Clone)]
pub struct TreeDisplay<'a> {
    tree: &'a ParseTree,
    grammar: &'a Grammar,
}

impl<'a> ptree::TreeItem for TreeDisplay<'a> {
    type Child = TreeDisplay<'a>;

    fn write_self<W: io::Write>(&self, f: &mut W, _: &ptree::Style) -> io::Result<()> {
        let name = self.grammar.name(self.tree.symbol());
        match self.tree {
            ParseTree::Leaf {
                text, start, end, ..
            } => write!(f, "{} '{}' # {}-{}", name, text, start, end),
            ParseTree::Node { start, end, .. } => write!(f, "{} # {}-{}", name, start, end),
        }
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(
            self.tree
                .children()
                .iter()
                .map(|c| TreeDisplay {
                    tree: c,
                    grammar: self.grammar,
                })
                .collect::<Vec<_>>(),
        )
    }
}

/// Ranking weight of a derivation: fewer nodes first, then fewer skipped
/// tokens. Declaration order breaks the remaining ties.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub(crate) struct Cost {
    pub(crate) nodes: usize,
    pub(crate) skips: usize,
}

impl Cost {
    fn plus(self, other: Cost) -> Cost {
        Cost {
            nodes: self.nodes + other.nodes,
            skips: self.skips + other.skips,
        }
    }
}

/// Tie handling between equally ranked derivations.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TieBreak {
    /// Prefer the alternative declared first in the grammar. The default.
    DefinitionOrder,

    /// Prefer whichever derivation the chart recorded first.
    InsertionOrder,
}

impl Default for TieBreak {
    fn default() -> Self {
        TieBreak::DefinitionOrder
    }
}

/// Ranking key of a root candidate: coverage first, then size, then
/// skips, then declaration order.
type RootKey = (usize, usize, usize, usize);

pub(crate) enum MemoEntry {
    /// On the evaluation stack. Derivations through such an edge would be
    /// infinite and are ignored.
    Busy,
    Done(Cost, usize),
}

/// Walks derivations recorded in the chart and turns edges into trees.
pub(crate) struct Extractor<'a> {
    g: &'a Grammar,
    chart: &'a Chart,
    toks: &'a TokenStream,
    tie: TieBreak,
}

impl<'a> Extractor<'a> {
    pub(crate) fn new(g: &'a Grammar, chart: &'a Chart, toks: &'a TokenStream, tie: TieBreak) -> Self {
        Extractor {
            g,
            chart,
            toks,
            tie,
        }
    }

    /// Minimal cost of any finite derivation of `id`, and the derivation
    /// chosen. Negative results are not memoized: an edge that looked
    /// infinite under one evaluation stack can still be finite elsewhere.
    fn best(&self, id: EdgeId, memo: &mut HashMap<EdgeId, MemoEntry>) -> Option<(Cost, usize)> {
        match memo.get(&id) {
            Some(MemoEntry::Busy) => return None,
            Some(MemoEntry::Done(cost, bi)) => return Some((*cost, *bi)),
            None => {}
        }
        memo.insert(id, MemoEntry::Busy);
        let node = self.chart.node(id);
        let bonus = if node.edge.is_passive(self.g) { 1 } else { 0 };
        let mut best: Option<(Cost, usize, usize)> = None;
        for (bi, &back) in node.backs.iter().enumerate() {
            let cand = match back {
                Backpointer::Seed => Some((
                    Cost {
                        nodes: bonus,
                        skips: 0,
                    },
                    0usize,
                )),
                Backpointer::Complete { active, passive } => {
                    match (self.best(active, memo), self.best(passive, memo)) {
                        (Some((ca, _)), Some((cp, _))) => Some((
                            Cost {
                                nodes: ca.nodes + cp.nodes + bonus,
                                skips: ca.skips + cp.skips,
                            },
                            self.chart.node(passive).edge.rule,
                        )),
                        _ => None,
                    }
                }
                Backpointer::Corner { passive } => self.best(passive, memo).map(|(cp, _)| {
                    (
                        Cost {
                            nodes: cp.nodes + bonus,
                            skips: cp.skips,
                        },
                        self.chart.node(passive).edge.rule,
                    )
                }),
                Backpointer::Skip { from } => self.best(from, memo).map(|(c, _)| {
                    (
                        Cost {
                            nodes: c.nodes + bonus,
                            skips: c.skips + 1,
                        },
                        0usize,
                    )
                }),
            };
            if let Some((cost, key)) = cand {
                let key = match self.tie {
                    TieBreak::DefinitionOrder => key,
                    TieBreak::InsertionOrder => 0,
                };
                let better = match best {
                    None => true,
                    Some((bc, bk, bbi)) => (cost, key, bi) < (bc, bk, bbi),
                };
                if better {
                    best = Some((cost, key, bi));
                }
            }
        }
        match best {
            Some((cost, _, bi)) => {
                memo.insert(id, MemoEntry::Done(cost, bi));
                Some((cost, bi))
            }
            None => {
                memo.remove(&id);
                None
            }
        }
    }

    pub(crate) fn cost_of(&self, id: EdgeId, memo: &mut HashMap<EdgeId, MemoEntry>) -> Option<Cost> {
        self.best(id, memo).map(|(c, _)| c)
    }

    /// Best tree below a passive edge, if any finite derivation exists.
    pub(crate) fn tree_of(
        &self,
        id: EdgeId,
        memo: &mut HashMap<EdgeId, MemoEntry>,
    ) -> Option<ParseTree> {
        self.best(id, memo)?;
        Some(self.node_tree(id, memo))
    }

    fn node_tree(&self, id: EdgeId, memo: &mut HashMap<EdgeId, MemoEntry>) -> ParseTree {
        let node = self.chart.node(id);
        let rule = self.g.rule(node.edge.rule);
        if rule.kind == RuleKind::Lexical {
            ParseTree::Leaf {
                symbol: rule.lhs,
                start: node.edge.start,
                end: node.edge.end,
                text: self.toks.span_text(node.edge.start, node.edge.end).to_string(),
            }
        } else {
            ParseTree::Node {
                symbol: rule.lhs,
                rule: node.edge.rule,
                start: node.edge.start,
                end: node.edge.end,
                children: self.chain_children(id, memo),
            }
        }
    }

    /// Children consumed by the chosen derivation chain of an edge.
    fn chain_children(&self, id: EdgeId, memo: &mut HashMap<EdgeId, MemoEntry>) -> Vec<ParseTree> {
        let bi = match memo.get(&id) {
            Some(MemoEntry::Done(_, bi)) => *bi,
            _ => {
                debug_assert!(false, "children requested for an uncosted edge");
                return Vec::new();
            }
        };
        match self.chart.node(id).backs[bi] {
            Backpointer::Seed => Vec::new(),
            Backpointer::Corner { passive } => vec![self.node_tree(passive, memo)],
            Backpointer::Complete { active, passive } => {
                let mut children = self.chain_children(active, memo);
                children.push(self.node_tree(passive, memo));
                children
            }
            Backpointer::Skip { from } => self.chain_children(from, memo),
        }
    }

    /// Best parse over the whole input. Trailing tokens beyond a root's
    /// end count as skips against the cap; among the surviving candidates
    /// the longest coverage wins, then the fewest nodes, then the fewest
    /// skips, then declaration order.
    pub(crate) fn best_root(&self, n: usize, cap: Option<usize>) -> Option<(ParseTree, Cost, usize)> {
        let mut memo = HashMap::new();
        let mut winner: Option<(EdgeId, Cost, RootKey, usize)> = None;
        for &rid in self.chart.roots() {
            let end = self.chart.node(rid).edge.end;
            let trailing = n - end;
            if let Some((cost, _)) = self.best(rid, &mut memo) {
                let total = Cost {
                    nodes: cost.nodes,
                    skips: cost.skips + trailing,
                };
                if let Some(cap) = cap {
                    if total.skips > cap {
                        continue;
                    }
                }
                let key = (trailing, cost.nodes, cost.skips, self.chart.node(rid).edge.rule);
                let better = match winner {
                    None => true,
                    Some((_, _, wk, _)) => key < wk,
                };
                if better {
                    winner = Some((rid, total, key, end));
                }
            }
        }
        let (rid, cost, _, end) = winner?;
        let tree = self.tree_of(rid, &mut memo)?;
        Some((tree, cost, end))
    }

    /// Longest (then cheapest) prefix parse, for budget-exceeded partials.
    pub(crate) fn best_prefix_root(&self) -> Option<(ParseTree, Cost, usize)> {
        let mut memo = HashMap::new();
        let mut winner: Option<(EdgeId, Cost, usize)> = None;
        for &rid in self.chart.roots() {
            let end = self.chart.node(rid).edge.end;
            if let Some((cost, _)) = self.best(rid, &mut memo) {
                let better = match winner {
                    None => true,
                    Some((_, wc, wend)) => end > wend || (end == wend && cost < wc),
                };
                if better {
                    winner = Some((rid, cost, end));
                }
            }
        }
        let (rid, cost, end) = winner?;
        let tree = self.tree_of(rid, &mut memo)?;
        Some((tree, cost, end))
    }

    /// All derivations, ranked. Enumeration is bounded by `limit` per edge
    /// and in total, which is plenty for top-k queries.
    ///
    /// TODO: replace full enumeration with lazy k-best extraction if large
    /// ambiguous grammars ever need it.
    pub(crate) fn ranked_trees(
        &self,
        n: usize,
        cap: Option<usize>,
        limit: usize,
    ) -> Vec<(ParseTree, Cost)> {
        let mut out: Vec<(ParseTree, Cost, RootKey)> = Vec::new();
        for &rid in self.chart.roots() {
            let end = self.chart.node(rid).edge.end;
            let trailing = n - end;
            let rule = self.chart.node(rid).edge.rule;
            let mut visiting = HashSet::new();
            for (tree, cost) in self.enum_node(rid, &mut visiting, limit) {
                let total = Cost {
                    nodes: cost.nodes,
                    skips: cost.skips + trailing,
                };
                if let Some(cap) = cap {
                    if total.skips > cap {
                        continue;
                    }
                }
                let key = (trailing, cost.nodes, cost.skips, rule);
                if !out.iter().any(|(t, _, _)| *t == tree) {
                    out.push((tree, total, key));
                }
            }
        }
        out.sort_by_key(|&(_, _, key)| key);
        out.truncate(limit);
        out.into_iter().map(|(tree, cost, _)| (tree, cost)).collect()
    }

    fn enum_node(
        &self,
        id: EdgeId,
        visiting: &mut HashSet<EdgeId>,
        limit: usize,
    ) -> Vec<(ParseTree, Cost)> {
        if !visiting.insert(id) {
            return Vec::new();
        }
        let node = self.chart.node(id);
        let rule = self.g.rule(node.edge.rule);
        let mut out = Vec::new();
        if rule.kind == RuleKind::Lexical {
            out.push((
                ParseTree::Leaf {
                    symbol: rule.lhs,
                    start: node.edge.start,
                    end: node.edge.end,
                    text: self.toks.span_text(node.edge.start, node.edge.end).to_string(),
                },
                Cost { nodes: 1, skips: 0 },
            ));
        } else {
            for (children, cost) in self.enum_children(id, visiting, limit) {
                out.push((
                    ParseTree::Node {
                        symbol: rule.lhs,
                        rule: node.edge.rule,
                        start: node.edge.start,
                        end: node.edge.end,
                        children,
                    },
                    Cost {
                        nodes: cost.nodes + 1,
                        skips: cost.skips,
                    },
                ));
            }
        }
        visiting.remove(&id);
        out.truncate(limit);
        out
    }

    fn enum_children(
        &self,
        id: EdgeId,
        visiting: &mut HashSet<EdgeId>,
        limit: usize,
    ) -> Vec<(Vec<ParseTree>, Cost)> {
        let backs = self.chart.node(id).backs.clone();
        let mut out = Vec::new();
        for back in backs {
            match back {
                Backpointer::Seed => out.push((Vec::new(), Cost { nodes: 0, skips: 0 })),
                Backpointer::Corner { passive } => {
                    for (tree, cost) in self.enum_node(passive, visiting, limit) {
                        out.push((vec![tree], cost));
                    }
                }
                Backpointer::Complete { active, passive } => {
                    let lefts = self.enum_children(active, visiting, limit);
                    let rights = self.enum_node(passive, visiting, limit);
                    for (left, lc) in &lefts {
                        for (right, rc) in &rights {
                            let mut children = left.clone();
                            children.push(right.clone());
                            out.push((children, lc.plus(*rc)));
                        }
                    }
                }
                Backpointer::Skip { from } => {
                    for (children, cost) in self.enum_children(from, visiting, limit) {
                        out.push((
                            children,
                            Cost {
                                nodes: cost.nodes,
                                skips: cost.skips + 1,
                            },
                        ));
                    }
                }
            }
        }
        out.truncate(limit);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_count_counts_every_node() {
        let leaf = |s| ParseTree::Leaf {
            symbol: s,
            start: 0,
            end: 1,
            text: "x".to_string(),
        };
        let tree = ParseTree::Node {
            symbol: 0,
            rule: 0,
            start: 0,
            end: 2,
            children: vec![
                leaf(4),
                ParseTree::Node {
                    symbol: 1,
                    rule: 1,
                    start: 1,
                    end: 2,
                    children: vec![leaf(5)],
                },
            ],
        };
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn cost_orders_nodes_before_skips() {
        let small = Cost { nodes: 3, skips: 9 };
        let large = Cost { nodes: 4, skips: 0 };
        assert!(small < large);
        assert!(Cost { nodes: 3, skips: 1 } > Cost { nodes: 3, skips: 0 });
    }
}
