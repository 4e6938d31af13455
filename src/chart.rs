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

//! Parse chart and agenda

use std::collections::{HashMap, HashSet, VecDeque};

use log::trace;

use crate::grammar::{Grammar, RuleId, SymbolId};

/// Index of an edge in the chart's node table.
pub(crate) type EdgeId = usize;

/// Entry in the parsing chart: a dotted rule over a token span. The dot
/// counts consumed rhs symbols; `dot == |rhs|` makes the edge passive.
///
/// Positions are usize as to not limit the length of the input.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct Edge {
    pub(crate) rule: RuleId,
    pub(crate) dot: u16,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Edge {
    pub(crate) fn lhs(&self, g: &Grammar) -> SymbolId {
        g.rule(self.rule).lhs
    }

    pub(crate) fn is_passive(&self, g: &Grammar) -> bool {
        (self.dot as usize) == g.rule(self.rule).rhs.len()
    }

    /// The symbol right of the dot, if the edge is active.
    pub(crate) fn next_symbol(&self, g: &Grammar) -> Option<SymbolId> {
        g.rule(self.rule).rhs.get(self.dot as usize).copied()
    }
}

/// How an edge came to be. An edge can accumulate several derivations when
/// the input is ambiguous; each one yields its own tree.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Backpointer {
    /// Strategy seed, prediction, empty rule, or a lexical token match
    /// (distinguished by the rule kind).
    Seed,

    /// Fundamental rule: the active edge advanced over the passive one.
    Complete { active: EdgeId, passive: EdgeId },

    /// Left-corner climb: a dot-1 edge built directly on a passive child.
    Corner { passive: EdgeId },

    /// Unknown-token skip: same dot, end advanced past one token.
    Skip { from: EdgeId },
}

pub(crate) struct EdgeNode {
    pub(crate) edge: Edge,
    pub(crate) backs: Vec<Backpointer>,
    /// Fewest skipped tokens over all known derivations. Used to prune
    /// shadow edges against the skip cap; exact counts are recomputed per
    /// tree when ranking.
    pub(crate) skips: usize,
}

/// The set of all edges derived so far, with the lookup paths the rules
/// need. Insertion is idempotent: a duplicate edge only records another
/// derivation and produces no further work.
pub(crate) struct Chart {
    nodes: Vec<EdgeNode>,
    ids: HashMap<Edge, EdgeId>,
    /// Active edges keyed by (end, expected symbol), for the completer.
    active_by_end: HashMap<(usize, SymbolId), Vec<EdgeId>>,
    /// Passive edges keyed by (start, lhs), for the completer.
    passive_by_start: HashMap<(usize, SymbolId), Vec<EdgeId>>,
    /// All passive edges keyed by start, for late left-corner climbs.
    passives_at: HashMap<usize, Vec<EdgeId>>,
    /// Dot symbols of active edges ending at a position.
    expected: HashMap<usize, HashSet<SymbolId>>,
    /// Passive goal edges starting at 0, in insertion order.
    roots: Vec<EdgeId>,
    goal: SymbolId,
}

impl Chart {
    pub(crate) fn new(g: &Grammar) -> Self {
        Chart {
            nodes: Vec::new(),
            ids: HashMap::new(),
            active_by_end: HashMap::new(),
            passive_by_start: HashMap::new(),
            passives_at: HashMap::new(),
            expected: HashMap::new(),
            roots: Vec::new(),
            goal: g.goal(),
        }
    }

    /// Add an edge with one derivation. Returns its id and whether it was
    /// new. Known edges absorb the derivation (deduplicated) and the lower
    /// skip count.
    pub(crate) fn insert(
        &mut self,
        edge: Edge,
        back: Backpointer,
        skips: usize,
        g: &Grammar,
    ) -> (EdgeId, bool) {
        if let Some(&id) = self.ids.get(&edge) {
            let node = &mut self.nodes[id];
            if !node.backs.contains(&back) {
                node.backs.push(back);
            }
            if skips < node.skips {
                node.skips = skips;
            }
            return (id, false);
        }
        let id = self.nodes.len();
        debug_assert!(edge.start <= edge.end);
        self.ids.insert(edge, id);
        if edge.is_passive(g) {
            let lhs = edge.lhs(g);
            self.passive_by_start
                .entry((edge.start, lhs))
                .or_default()
                .push(id);
            self.passives_at.entry(edge.start).or_default().push(id);
            if lhs == self.goal && edge.start == 0 {
                self.roots.push(id);
            }
        } else {
            // Active edges have a dot symbol by definition.
            if let Some(sym) = edge.next_symbol(g) {
                self.active_by_end.entry((edge.end, sym)).or_default().push(id);
                self.expected.entry(edge.end).or_default().insert(sym);
            }
        }
        self.nodes.push(EdgeNode {
            edge,
            backs: vec![back],
            skips,
        });
        (id, true)
    }

    pub(crate) fn node(&self, id: EdgeId) -> &EdgeNode {
        &self.nodes[id]
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn actives_expecting(&self, end: usize, sym: SymbolId) -> &[EdgeId] {
        self.active_by_end
            .get(&(end, sym))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn passives_from(&self, start: usize, lhs: SymbolId) -> &[EdgeId] {
        self.passive_by_start
            .get(&(start, lhs))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn passives_starting(&self, start: usize) -> &[EdgeId] {
        self.passives_at
            .get(&start)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Is some active edge ending at `at` expecting a symbol that can begin
    /// with `target`? This is the top-down filter of the left-corner climb.
    pub(crate) fn expects_left_corner(&self, at: usize, target: SymbolId, g: &Grammar) -> bool {
        match self.expected.get(&at) {
            Some(set) => set.iter().any(|&s| g.lc_contains(s, target)),
            None => false,
        }
    }

    pub(crate) fn roots(&self) -> &[EdgeId] {
        &self.roots
    }

    /// Dump the chart through the log facade, one line per edge.
    pub(crate) fn trace_dump(&self, g: &Grammar) {
        for (id, node) in self.nodes.iter().enumerate() {
            trace!(
                "  {:6}: {} [{},{}) skips={} backs={}",
                id,
                g.dotted_to_string(node.edge.rule, node.edge.dot as usize),
                node.edge.start,
                node.edge.end,
                node.skips,
                node.backs.len()
            );
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Discipline {
    /// Process edges in insertion order.
    Fifo,

    /// Prefer the newest edges, for depth-first left-corner climbing.
    DepthFirst,
}

/// Work queue of edges still to be processed. Every edge enters the agenda
/// exactly once, when it is first inserted into the chart.
pub(crate) struct Agenda {
    queue: VecDeque<EdgeId>,
    discipline: Discipline,
}

impl Agenda {
    pub(crate) fn new(discipline: Discipline) -> Self {
        Agenda {
            queue: VecDeque::new(),
            discipline,
        }
    }

    pub(crate) fn push(&mut self, id: EdgeId) {
        match self.discipline {
            Discipline::Fifo => self.queue.push_back(id),
            Discipline::DepthFirst => self.queue.push_front(id),
        }
    }

    pub(crate) fn pop(&mut self) -> Option<EdgeId> {
        self.queue.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::tests::light_grammar;

    #[test]
    fn insertion_deduplicates() {
        let g = light_grammar();
        let mut chart = Chart::new(&g);
        let rule = g.rules_of(g.goal())[0];
        let edge = Edge {
            rule,
            dot: 0,
            start: 0,
            end: 0,
        };

        let (id, fresh) = chart.insert(edge, Backpointer::Seed, 0, &g);
        assert!(fresh);
        let (same, fresh) = chart.insert(edge, Backpointer::Seed, 0, &g);
        assert!(!fresh);
        assert_eq!(id, same);
        assert_eq!(chart.len(), 1);
        // The duplicate derivation was dropped as well.
        assert_eq!(chart.node(id).backs.len(), 1);
    }

    #[test]
    fn duplicate_edge_accumulates_new_derivations() {
        let g = light_grammar();
        let mut chart = Chart::new(&g);
        let rule = g.rules_of(g.goal())[0];
        let edge = Edge {
            rule,
            dot: 0,
            start: 0,
            end: 0,
        };
        let (id, _) = chart.insert(edge, Backpointer::Seed, 3, &g);
        chart.insert(edge, Backpointer::Skip { from: 7 }, 1, &g);
        assert_eq!(chart.node(id).backs.len(), 2);
        // The lower skip count wins.
        assert_eq!(chart.node(id).skips, 1);
    }

    #[test]
    fn indexes_split_active_and_passive() {
        let g = light_grammar();
        let mut chart = Chart::new(&g);
        let goal = g.goal();
        let one_parse = g.symbol("one_parse").unwrap();

        // GOAL -> . one_parse at [0,0) is active and expects one_parse.
        let active = Edge {
            rule: g.rules_of(goal)[0],
            dot: 0,
            start: 0,
            end: 0,
        };
        chart.insert(active, Backpointer::Seed, 0, &g);
        assert_eq!(chart.actives_expecting(0, one_parse).len(), 1);
        assert!(chart.passives_from(0, goal).is_empty());
        assert!(chart.roots().is_empty());
        assert!(chart.expects_left_corner(0, one_parse, &g));

        // GOAL -> one_parse . at [0,3) is passive and a root.
        let passive = Edge {
            rule: g.rules_of(goal)[0],
            dot: 1,
            start: 0,
            end: 3,
        };
        chart.insert(passive, Backpointer::Corner { passive: 0 }, 0, &g);
        assert_eq!(chart.passives_from(0, goal).len(), 1);
        assert_eq!(chart.roots().len(), 1);
        assert_eq!(chart.passives_starting(0).len(), 1);
    }

    #[test]
    fn agenda_disciplines() {
        let mut fifo = Agenda::new(Discipline::Fifo);
        fifo.push(1);
        fifo.push(2);
        assert_eq!(fifo.pop(), Some(1));

        let mut depth = Agenda::new(Discipline::DepthFirst);
        depth.push(1);
        depth.push(2);
        assert_eq!(depth.pop(), Some(2));
        assert_eq!(depth.pop(), Some(1));
        assert!(depth.is_empty());
    }
}
