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

//! Chart inference rules
//!
//! Each rule is a pure function from the chart and one edge to the edges it
//! licenses. The engine inserts the results; deduplication in the chart
//! keeps every rule firing at most once per collaborating pair.

use crate::chart::{Backpointer, Chart, Edge, EdgeId};
use crate::grammar::{Grammar, SymbolId};
use crate::token::TokenStream;

/// A licensed edge: the edge itself, its derivation, and the skip count it
/// inherits.
pub(crate) type Derived = (Edge, Backpointer, usize);

/// Seed active edges `GOAL -> . alpha` at [0,0) for every goal production.
pub(crate) fn init_goal(g: &Grammar) -> Vec<Derived> {
    let mut out = Vec::new();
    if g.is_nonterminal(g.goal()) {
        for &r in g.rules_of(g.goal()) {
            out.push((
                Edge {
                    rule: r,
                    dot: 0,
                    start: 0,
                    end: 0,
                },
                Backpointer::Seed,
                0,
            ));
        }
    }
    out
}

/// Top-down prediction: every production of the expected nonterminal, at
/// the position of the expectation.
pub(crate) fn predict(g: &Grammar, nt: SymbolId, at: usize) -> Vec<Derived> {
    g.rules_of(nt)
        .iter()
        .map(|&r| {
            (
                Edge {
                    rule: r,
                    dot: 0,
                    start: at,
                    end: at,
                },
                Backpointer::Seed,
                0,
            )
        })
        .collect()
}

fn fundamental(chart: &Chart, active: EdgeId, passive: EdgeId) -> Derived {
    let a = chart.node(active);
    let p = chart.node(passive);
    (
        Edge {
            rule: a.edge.rule,
            dot: a.edge.dot + 1,
            start: a.edge.start,
            end: p.edge.end,
        },
        Backpointer::Complete { active, passive },
        a.skips + p.skips,
    )
}

/// Fundamental rule, fired from a (usually fresh) active edge against the
/// passive edges already present at its dot position.
pub(crate) fn complete_with_passives(g: &Grammar, chart: &Chart, active: EdgeId) -> Vec<Derived> {
    let edge = chart.node(active).edge;
    match edge.next_symbol(g) {
        Some(sym) => chart
            .passives_from(edge.end, sym)
            .iter()
            .map(|&p| fundamental(chart, active, p))
            .collect(),
        None => Vec::new(),
    }
}

/// Fundamental rule, fired from a fresh passive edge against the active
/// edges already waiting for its lhs.
pub(crate) fn complete_with_actives(g: &Grammar, chart: &Chart, passive: EdgeId) -> Vec<Derived> {
    let edge = chart.node(passive).edge;
    let lhs = edge.lhs(g);
    chart
        .actives_expecting(edge.start, lhs)
        .iter()
        .map(|&a| fundamental(chart, a, passive))
        .collect()
}

/// Left-corner climb: a completed `N` starts every production `M -> N ...`
/// whose lhs is wanted here, moving the dot over the first symbol at once.
/// The filter keeps prediction goal-directed.
pub(crate) fn left_corner_climb(g: &Grammar, chart: &Chart, passive: EdgeId) -> Vec<Derived> {
    let node = chart.node(passive);
    let lhs = node.edge.lhs(g);
    let mut out = Vec::new();
    for &r in g.rules_with_first(lhs) {
        let target = g.rule(r).lhs;
        if chart.expects_left_corner(node.edge.start, target, g) {
            out.push((
                Edge {
                    rule: r,
                    dot: 1,
                    start: node.edge.start,
                    end: node.edge.end,
                },
                Backpointer::Corner { passive },
                node.skips,
            ));
        }
    }
    out
}

/// The symmetric direction of the climb: a fresh expectation at `at` can
/// legitimize climbs over passive edges that were inserted earlier.
pub(crate) fn climbs_for_expectation(
    g: &Grammar,
    chart: &Chart,
    at: usize,
    expected: SymbolId,
) -> Vec<Derived> {
    let mut out = Vec::new();
    for &p in chart.passives_starting(at) {
        let node = chart.node(p);
        let lhs = node.edge.lhs(g);
        for &r in g.rules_with_first(lhs) {
            let target = g.rule(r).lhs;
            if g.lc_contains(expected, target) {
                out.push((
                    Edge {
                        rule: r,
                        dot: 1,
                        start: node.edge.start,
                        end: node.edge.end,
                    },
                    Backpointer::Corner { passive: p },
                    node.skips,
                ));
            }
        }
    }
    out
}

/// Bottom-up prediction: a completed `N` proposes every production that
/// starts with `N`, dot at the beginning, unfiltered.
pub(crate) fn bottom_up_predict(g: &Grammar, chart: &Chart, passive: EdgeId) -> Vec<Derived> {
    let edge = chart.node(passive).edge;
    let lhs = edge.lhs(g);
    g.rules_with_first(lhs)
        .iter()
        .map(|&r| {
            (
                Edge {
                    rule: r,
                    dot: 0,
                    start: edge.start,
                    end: edge.start,
                },
                Backpointer::Seed,
                0,
            )
        })
        .collect()
}

/// Bottom-up seeding: every terminal match at every position becomes a
/// passive lexical edge, and every empty rule a passive edge at every
/// position.
pub(crate) fn bottom_up_seed(g: &Grammar, toks: &TokenStream) -> Vec<Derived> {
    let mut out = Vec::new();
    for at in 0..toks.len() {
        for term in g.terminal_symbols() {
            if let Some(end) = g.match_terminal(term, toks, at) {
                out.push((
                    Edge {
                        rule: g.lex_rule(term),
                        dot: 0,
                        start: at,
                        end,
                    },
                    Backpointer::Seed,
                    0,
                ));
            }
        }
    }
    for nt in g.nonterminal_symbols() {
        for &r in g.empty_rules_of(nt) {
            for at in 0..=toks.len() {
                out.push((
                    Edge {
                        rule: r,
                        dot: 0,
                        start: at,
                        end: at,
                    },
                    Backpointer::Seed,
                    0,
                ));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::tests::light_grammar;

    #[test]
    fn init_seeds_every_goal_production() {
        let g = light_grammar();
        let seeds = init_goal(&g);
        assert_eq!(seeds.len(), 2);
        for (edge, back, skips) in seeds {
            assert_eq!(edge.dot, 0);
            assert_eq!((edge.start, edge.end), (0, 0));
            assert_eq!(back, Backpointer::Seed);
            assert_eq!(skips, 0);
        }
    }

    #[test]
    fn completion_is_symmetric() {
        let g = light_grammar();
        let mut chart = Chart::new(&g);
        let goal = g.goal();
        let one_parse = g.symbol("one_parse").unwrap();

        let (active, _) = chart.insert(
            Edge {
                rule: g.rules_of(goal)[0],
                dot: 0,
                start: 0,
                end: 0,
            },
            Backpointer::Seed,
            0,
            &g,
        );
        let (passive, _) = chart.insert(
            Edge {
                rule: g.rules_of(one_parse)[0],
                dot: 4,
                start: 0,
                end: 3,
            },
            Backpointer::Seed,
            0,
            &g,
        );

        let from_active = complete_with_passives(&g, &chart, active);
        let from_passive = complete_with_actives(&g, &chart, passive);
        assert_eq!(from_active.len(), 1);
        assert_eq!(from_active, from_passive);
        let (edge, _, _) = from_active[0];
        assert_eq!(edge.dot, 1);
        assert_eq!((edge.start, edge.end), (0, 3));
    }

    #[test]
    fn climb_requires_an_expectation() {
        let g = light_grammar();
        let mut chart = Chart::new(&g);
        let one_parse = g.symbol("one_parse").unwrap();

        // A completed one_parse with nobody asking for it stays put.
        let (passive, _) = chart.insert(
            Edge {
                rule: g.rules_of(one_parse)[0],
                dot: 4,
                start: 0,
                end: 3,
            },
            Backpointer::Seed,
            0,
            &g,
        );
        assert!(left_corner_climb(&g, &chart, passive).is_empty());

        // With the goal expected at its start, it climbs into both goal
        // productions.
        chart.insert(
            Edge {
                rule: g.rules_of(g.goal())[1],
                dot: 1,
                start: 0,
                end: 0,
            },
            Backpointer::Seed,
            0,
            &g,
        );
        let climbs = left_corner_climb(&g, &chart, passive);
        assert_eq!(climbs.len(), 2);
    }

    #[test]
    fn bottom_up_seed_covers_tokens_and_empty_rules() {
        let g = light_grammar();
        let toks = TokenStream::new("set top red", false);
        let seeds = bottom_up_seed(&g, &toks);
        // Three token matches (set, top, red) and the optional slot's empty
        // rule at four positions.
        assert_eq!(seeds.len(), 7);
    }
}
