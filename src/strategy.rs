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

//! Parsing strategies
//!
//! A strategy decides which rules fire for an edge, how the agenda is
//! ordered, and which terminals are scheduled for scanning at each token
//! position.

use std::collections::HashSet;

use crate::chart::{Backpointer, Chart, Discipline, Edge, EdgeId};
use crate::grammar::{Grammar, SymbolId};
use crate::rules::{
    bottom_up_predict, bottom_up_seed, climbs_for_expectation, complete_with_actives,
    complete_with_passives, init_goal, left_corner_climb, predict, Derived,
};
use crate::token::TokenStream;

/// How the chart rules are composed into a parser.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Strategy {
    /// Predict from the goal down, scan expected terminals.
    TopDown,

    /// Seed all terminal matches, build upward without a goal filter.
    BottomUp,

    /// Goal-directed like top-down, but driven by completed left corners.
    /// The default.
    LeftCorner,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::LeftCorner
    }
}

/// Scan attempts and skip contributors collected while the agenda drains,
/// consumed position by position by the engine.
pub(crate) struct ScanBoard {
    terms: Vec<Vec<SymbolId>>,
    scheduled: HashSet<(usize, SymbolId)>,
    contributors: Vec<Vec<EdgeId>>,
    contributed: HashSet<(usize, EdgeId)>,
}

impl ScanBoard {
    pub(crate) fn new(n: usize) -> Self {
        ScanBoard {
            terms: vec![Vec::new(); n + 1],
            scheduled: HashSet::new(),
            contributors: vec![Vec::new(); n + 1],
            contributed: HashSet::new(),
        }
    }

    /// Note that `edge` wants `term` tried at position `at`. Each terminal
    /// is scanned at most once per position; each edge shadows at most once
    /// per position when the skip rule fires.
    pub(crate) fn schedule(&mut self, at: usize, edge: EdgeId, term: SymbolId) {
        if at >= self.terms.len() {
            return;
        }
        if self.contributed.insert((at, edge)) {
            self.contributors[at].push(edge);
        }
        if self.scheduled.insert((at, term)) {
            self.terms[at].push(term);
        }
    }

    pub(crate) fn terms_at(&self, at: usize) -> &[SymbolId] {
        &self.terms[at]
    }

    pub(crate) fn contributors_at(&self, at: usize) -> &[EdgeId] {
        &self.contributors[at]
    }
}

impl Strategy {
    pub(crate) fn discipline(self) -> Discipline {
        match self {
            Strategy::LeftCorner => Discipline::DepthFirst,
            _ => Discipline::Fifo,
        }
    }

    /// Whether the strategy scans positions left to right. Bottom-up seeds
    /// everything up front instead, and without expectations there is no
    /// skip rule either.
    pub(crate) fn scans(self) -> bool {
        match self {
            Strategy::BottomUp => false,
            _ => true,
        }
    }

    pub(crate) fn seed(self, g: &Grammar, toks: &TokenStream) -> Vec<Derived> {
        match self {
            Strategy::TopDown | Strategy::LeftCorner => init_goal(g),
            Strategy::BottomUp => bottom_up_seed(g, toks),
        }
    }

    /// Rules fired for an active edge. Scan attempts go to the board; new
    /// edges are returned.
    pub(crate) fn on_active(
        self,
        g: &Grammar,
        chart: &Chart,
        id: EdgeId,
        board: &mut ScanBoard,
    ) -> Vec<Derived> {
        let edge = chart.node(id).edge;
        let mut out = complete_with_passives(g, chart, id);
        let sym = match edge.next_symbol(g) {
            Some(s) => s,
            None => return out,
        };
        match self {
            Strategy::TopDown => {
                if g.is_nonterminal(sym) {
                    out.extend(predict(g, sym, edge.end));
                } else {
                    board.schedule(edge.end, id, sym);
                }
            }
            Strategy::LeftCorner => {
                for &t in g.lc_terminals(sym) {
                    board.schedule(edge.end, id, t);
                }
                // Nullable symbols in the left-corner closure complete
                // without consuming input; seed their empty rules here.
                for &r in g.lc_empty_rules(sym) {
                    out.push((
                        Edge {
                            rule: r,
                            dot: 0,
                            start: edge.end,
                            end: edge.end,
                        },
                        Backpointer::Seed,
                        0,
                    ));
                }
                out.extend(climbs_for_expectation(g, chart, edge.end, sym));
            }
            Strategy::BottomUp => {}
        }
        out
    }

    /// Rules fired for a passive edge.
    pub(crate) fn on_passive(self, g: &Grammar, chart: &Chart, id: EdgeId) -> Vec<Derived> {
        let mut out = complete_with_actives(g, chart, id);
        match self {
            Strategy::LeftCorner => out.extend(left_corner_climb(g, chart, id)),
            Strategy::BottomUp => out.extend(bottom_up_predict(g, chart, id)),
            Strategy::TopDown => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::tests::light_grammar;

    #[test]
    fn left_corner_schedules_terminals_through_nonterminals() {
        let g = light_grammar();
        let toks = TokenStream::new("set top red", false);
        let mut chart = Chart::new(&g);
        let mut board = ScanBoard::new(toks.len());

        let strategy = Strategy::LeftCorner;
        for (edge, back, skips) in strategy.seed(&g, &toks) {
            let (id, fresh) = chart.insert(edge, back, skips, &g);
            assert!(fresh);
            strategy.on_active(&g, &chart, id, &mut board);
        }
        // Expecting one_parse schedules its left-corner terminal, action.
        let action = g.symbol("action").unwrap();
        assert_eq!(board.terms_at(0), &[action]);
        // Both goal productions contribute to a potential skip at 0.
        assert_eq!(board.contributors_at(0).len(), 2);
    }

    #[test]
    fn top_down_predicts_instead_of_scanning_nonterminals() {
        let g = light_grammar();
        let toks = TokenStream::new("set top red", false);
        let mut chart = Chart::new(&g);
        let mut board = ScanBoard::new(toks.len());

        let strategy = Strategy::TopDown;
        let mut derived = Vec::new();
        for (edge, back, skips) in strategy.seed(&g, &toks) {
            let (id, _) = chart.insert(edge, back, skips, &g);
            derived.extend(strategy.on_active(&g, &chart, id, &mut board));
        }
        // Nothing scanned yet; one_parse was predicted instead.
        assert!(board.terms_at(0).is_empty());
        let one_parse = g.symbol("one_parse").unwrap();
        assert!(derived
            .iter()
            .any(|(e, _, _)| g.rule(e.rule).lhs == one_parse && e.dot == 0));
    }

    #[test]
    fn scan_board_deduplicates() {
        let mut board = ScanBoard::new(3);
        board.schedule(1, 10, 7);
        board.schedule(1, 10, 7);
        board.schedule(1, 11, 7);
        assert_eq!(board.terms_at(1).len(), 1);
        assert_eq!(board.contributors_at(1).len(), 2);
    }
}
