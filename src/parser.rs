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

//! Robust chart parser
//!
//! Drives the chart rules over an input sentence: the agenda drains to
//! quiescence, the current position is scanned, and unknown tokens are
//! skipped when nothing expected matches. Completed goal edges surface as
//! incremental events and, at the end, as the best-ranked parse.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, trace};
use thiserror::Error;

use crate::chart::{Agenda, Backpointer, Chart, Edge, EdgeId};
use crate::grammar::Grammar;
use crate::result::{self, ParseResult};
use crate::strategy::{ScanBoard, Strategy};
use crate::token::TokenStream;
use crate::tree::{Cost, Extractor, ParseTree, TieBreak};

/// Errors surfaced by a parse. Grammar problems are caught earlier, at
/// compile time.
#[derive(Debug, Error)]
pub enum ParseError {
    /// No goal edge covers the input. Reports how far scanning got and
    /// which terminals were expected there.
    #[error("no parse covers the input (stuck at token {furthest}, expected {expected:?})")]
    Failure {
        furthest: usize,
        expected: Vec<String>,
    },

    /// The step budget ran out first. The best prefix parse, if any, is
    /// attached.
    #[error("step budget of {budget} rule firings exhausted")]
    Budget {
        budget: usize,
        partial: Option<Box<ParseTree>>,
    },

    /// A result action failed. The tree is still attached.
    #[error("result action for '{name}' failed")]
    Action {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        tree: Box<ParseTree>,
    },
}

/// Knobs of a parser. Everything defaults to the robust setup: left-corner
/// strategy, unlimited skipping, unlimited steps, declaration-order ties.
#[derive(Clone, Debug)]
pub struct ParserConfig {
    pub strategy: Strategy,

    /// Most tokens a single parse may skip, trailing junk included. None
    /// is unlimited.
    pub skip_cap: Option<usize>,

    /// Most rule firings before the parse aborts with `Budget`. None is
    /// unlimited.
    pub step_budget: Option<usize>,

    pub tie_break: TieBreak,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            strategy: Strategy::LeftCorner,
            skip_cap: None,
            step_budget: None,
            tie_break: TieBreak::DefinitionOrder,
        }
    }
}

/// Returned by an incremental listener to keep going or to settle for the
/// best parse found so far.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Signal {
    Continue,
    Stop,
}

/// An improving partial parse, delivered synchronously while the engine
/// runs. `spanning` marks parses that reach the end of the input.
#[derive(Clone, Debug)]
pub struct PartialParse {
    pub tree: ParseTree,
    pub result: ParseResult,
    pub end: usize,
    pub spanning: bool,
}

struct RunState {
    chart: Chart,
    budget_hit: bool,
    furthest: usize,
    expected: Vec<String>,
}

/// The parser. Holds a shared reference to a compiled grammar; each call
/// to parse owns its tokens, chart and agenda, so one parser is freely
/// reusable and the grammar can back several parsers at once.
pub struct RobustParser {
    grammar: Arc<Grammar>,
    config: ParserConfig,
}

impl RobustParser {
    pub fn new(grammar: Grammar) -> Self {
        RobustParser::with_config(grammar, ParserConfig::default())
    }

    pub fn with_config(grammar: Grammar, config: ParserConfig) -> Self {
        RobustParser {
            grammar: Arc::new(grammar),
            config,
        }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Parse a sentence into its best tree and the named result.
    pub fn parse(&self, text: &str) -> Result<(ParseTree, ParseResult), ParseError> {
        let toks = TokenStream::new(text, self.grammar.case_sensitive());
        let run = self.run(&toks, &mut |_| Signal::Continue)?;
        self.extract(&toks, &run)
    }

    /// Parse with a listener that sees every improving partial parse. The
    /// listener may stop the parse early; the best parse found so far is
    /// then extracted as usual.
    pub fn parse_incremental<F>(
        &self,
        text: &str,
        mut listener: F,
    ) -> Result<(ParseTree, ParseResult), ParseError>
    where
        F: FnMut(&PartialParse) -> Signal,
    {
        let toks = TokenStream::new(text, self.grammar.case_sensitive());
        let run = self.run(&toks, &mut listener)?;
        self.extract(&toks, &run)
    }

    /// The top `k` parses by ranking.
    pub fn parse_multi(
        &self,
        text: &str,
        k: usize,
    ) -> Result<Vec<(ParseTree, ParseResult)>, ParseError> {
        let g = &*self.grammar;
        let toks = TokenStream::new(text, g.case_sensitive());
        let run = self.run(&toks, &mut |_| Signal::Continue)?;
        if run.budget_hit {
            return Err(self.budget_error(&toks, &run));
        }
        let extractor = Extractor::new(g, &run.chart, &toks, self.config.tie_break);
        let limit = k.saturating_mul(4).saturating_add(8);
        let ranked = extractor.ranked_trees(toks.len(), self.config.skip_cap, limit);
        if ranked.is_empty() {
            return Err(ParseError::Failure {
                furthest: run.furthest,
                expected: run.expected.clone(),
            });
        }
        let mut out = Vec::new();
        for (tree, _) in ranked.into_iter().take(k) {
            let result = result::build(g, &tree).map_err(|failure| ParseError::Action {
                name: failure.name,
                source: failure.source,
                tree: Box::new(tree.clone()),
            })?;
            out.push((tree, result));
        }
        Ok(out)
    }

    /// Run the rule loop to quiescence over all token positions.
    fn run(
        &self,
        toks: &TokenStream,
        listener: &mut dyn FnMut(&PartialParse) -> Signal,
    ) -> Result<RunState, ParseError> {
        let g = &*self.grammar;
        let n = toks.len();
        let strategy = self.config.strategy;
        debug!("parse of {} tokens, {:?}", n, strategy);

        let mut chart = Chart::new(g);
        let mut agenda = Agenda::new(strategy.discipline());
        let mut board = ScanBoard::new(n);
        let mut best_prefix: Option<usize> = None;
        let mut best_span: Option<Cost> = None;
        let mut furthest = 0;
        let mut expected: Vec<String> = Vec::new();
        let mut steps = 0usize;
        let mut budget_hit = false;
        let mut stopped = false;

        for (edge, back, skips) in strategy.seed(g, toks) {
            let (id, fresh) = chart.insert(edge, back, skips, g);
            if fresh {
                agenda.push(id);
                self.note_root(
                    g,
                    &chart,
                    toks,
                    id,
                    n,
                    &mut best_prefix,
                    &mut best_span,
                    listener,
                    &mut stopped,
                )?;
            }
        }

        let mut pos = 0;
        'outer: loop {
            while let Some(id) = agenda.pop() {
                if let Some(budget) = self.config.step_budget {
                    if steps >= budget {
                        budget_hit = true;
                        break 'outer;
                    }
                }
                steps += 1;
                let passive = chart.node(id).edge.is_passive(g);
                let derived = if passive {
                    strategy.on_passive(g, &chart, id)
                } else {
                    strategy.on_active(g, &chart, id, &mut board)
                };
                for (edge, back, skips) in derived {
                    if let Some(cap) = self.config.skip_cap {
                        if skips > cap {
                            continue;
                        }
                    }
                    let (new_id, fresh) = chart.insert(edge, back, skips, g);
                    if fresh {
                        agenda.push(new_id);
                        self.note_root(
                            g,
                            &chart,
                            toks,
                            new_id,
                            n,
                            &mut best_prefix,
                            &mut best_span,
                            listener,
                            &mut stopped,
                        )?;
                        if stopped {
                            break 'outer;
                        }
                    }
                }
            }
            if pos >= n {
                break;
            }

            // Scan the current position: each scheduled terminal once.
            let mut matched = false;
            for &term in board.terms_at(pos) {
                if let Some(end) = g.match_terminal(term, toks, pos) {
                    matched = true;
                    trace!("scan {} at {}..{}", g.name(term), pos, end);
                    let edge = Edge {
                        rule: g.lex_rule(term),
                        dot: 0,
                        start: pos,
                        end,
                    };
                    let (id, fresh) = chart.insert(edge, Backpointer::Seed, 0, g);
                    if fresh {
                        agenda.push(id);
                        self.note_root(
                            g,
                            &chart,
                            toks,
                            id,
                            n,
                            &mut best_prefix,
                            &mut best_span,
                            listener,
                            &mut stopped,
                        )?;
                        if stopped {
                            break 'outer;
                        }
                    }
                }
            }
            if !board.terms_at(pos).is_empty() {
                furthest = pos;
                expected = board
                    .terms_at(pos)
                    .iter()
                    .map(|&t| g.name(t).to_string())
                    .unique()
                    .sorted()
                    .collect();
            }

            // Nothing expected matched here: the token is unknown. Every
            // contributor shadows itself one token further, within the cap.
            if !matched && strategy.scans() {
                let contributors: Vec<EdgeId> = board.contributors_at(pos).to_vec();
                for from in contributors {
                    let (shadow_of, skips) = {
                        let node = chart.node(from);
                        (node.edge, node.skips + 1)
                    };
                    if let Some(cap) = self.config.skip_cap {
                        if skips > cap {
                            continue;
                        }
                    }
                    trace!(
                        "skip token {} for {}",
                        pos,
                        g.dotted_to_string(shadow_of.rule, shadow_of.dot as usize)
                    );
                    let edge = Edge {
                        end: pos + 1,
                        ..shadow_of
                    };
                    let (id, fresh) = chart.insert(edge, Backpointer::Skip { from }, skips, g);
                    if fresh {
                        agenda.push(id);
                    }
                }
            }
            pos += 1;
        }

        debug!(
            "quiescent after {} steps, {} edges, {} roots",
            steps,
            chart.len(),
            chart.roots().len()
        );
        chart.trace_dump(g);
        Ok(RunState {
            chart,
            budget_hit,
            furthest,
            expected,
        })
    }

    /// Fire the listener for a freshly inserted goal edge when it improves
    /// the best prefix or the best spanning parse.
    #[allow(clippy::too_many_arguments)]
    fn note_root(
        &self,
        g: &Grammar,
        chart: &Chart,
        toks: &TokenStream,
        id: EdgeId,
        n: usize,
        best_prefix: &mut Option<usize>,
        best_span: &mut Option<Cost>,
        listener: &mut dyn FnMut(&PartialParse) -> Signal,
        stopped: &mut bool,
    ) -> Result<(), ParseError> {
        {
            let node = chart.node(id);
            if !(node.edge.start == 0
                && node.edge.lhs(g) == g.goal()
                && node.edge.is_passive(g))
            {
                return Ok(());
            }
        }
        let end = chart.node(id).edge.end;
        let spanning = end == n;
        let extractor = Extractor::new(g, chart, toks, self.config.tie_break);
        let mut memo = HashMap::new();
        let cost = match extractor.cost_of(id, &mut memo) {
            Some(cost) => cost,
            None => return Ok(()),
        };
        let prefix_improved = best_prefix.map_or(true, |b| end > b);
        let span_improved = spanning && best_span.map_or(true, |b| cost < b);
        if !prefix_improved && !span_improved {
            return Ok(());
        }
        if prefix_improved {
            *best_prefix = Some(end);
        }
        if span_improved {
            *best_span = Some(cost);
        }
        let tree = match extractor.tree_of(id, &mut memo) {
            Some(tree) => tree,
            None => return Ok(()),
        };
        let result = result::build(g, &tree).map_err(|failure| ParseError::Action {
            name: failure.name,
            source: failure.source,
            tree: Box::new(tree.clone()),
        })?;
        let partial = PartialParse {
            tree,
            result,
            end,
            spanning,
        };
        trace!("partial parse up to {} (spanning: {})", end, spanning);
        if listener(&partial) == Signal::Stop {
            *stopped = true;
        }
        Ok(())
    }

    fn budget_error(&self, toks: &TokenStream, run: &RunState) -> ParseError {
        let extractor = Extractor::new(
            &self.grammar,
            &run.chart,
            toks,
            self.config.tie_break,
        );
        ParseError::Budget {
            budget: self.config.step_budget.unwrap_or(0),
            partial: extractor
                .best_prefix_root()
                .map(|(tree, _, _)| Box::new(tree)),
        }
    }

    fn extract(
        &self,
        toks: &TokenStream,
        run: &RunState,
    ) -> Result<(ParseTree, ParseResult), ParseError> {
        let g = &*self.grammar;
        if run.budget_hit {
            return Err(self.budget_error(toks, run));
        }
        let extractor = Extractor::new(g, &run.chart, toks, self.config.tie_break);
        match extractor.best_root(toks.len(), self.config.skip_cap) {
            Some((tree, cost, end)) => {
                debug!(
                    "best parse: {} nodes, {} skips, covers [0,{})",
                    cost.nodes, cost.skips, end
                );
                let result = result::build(g, &tree).map_err(|failure| ParseError::Action {
                    name: failure.name,
                    source: failure.source,
                    tree: Box::new(tree.clone()),
                })?;
                Ok((tree, result))
            }
            None => Err(ParseError::Failure {
                furthest: run.furthest,
                expected: run.expected.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Elem;
    use crate::grammar::tests::{light_grammar, light_grammar_with_actions};
    use crate::grammar::GrammarBuilder;
    use crate::result::Value;

    fn entries<'a>(result: &'a ParseResult) -> &'a [Value] {
        result["one_parse"].as_list().expect("occurrence list")
    }

    #[test]
    fn parses_a_simple_command() {
        let parser = RobustParser::new(light_grammar());
        let (tree, result) = parser.parse("set my top light to red").unwrap();

        assert_eq!(result["GOAL"].as_list().unwrap().len(), 1);
        let first = &entries(&result)[0];
        assert_eq!(first["action"].as_str(), Some("set"));
        assert_eq!(first["light"].as_str(), Some("top"));
        assert_eq!(first["color"].as_str(), Some("red"));
        assert!(first.get("times").is_none());

        let goal = parser.grammar().goal();
        assert_eq!(tree.symbol(), goal);
        assert_eq!((tree.start(), tree.end()), (0, 6));
    }

    #[test]
    fn parses_two_conjoined_commands() {
        let parser = RobustParser::new(light_grammar());
        let (_, result) = parser
            .parse("set my top light to red and change middle light to yellow")
            .unwrap();

        let parses = entries(&result);
        assert_eq!(parses.len(), 2);
        assert_eq!(parses[0]["action"].as_str(), Some("set"));
        assert_eq!(parses[1]["action"].as_str(), Some("change"));
        assert_eq!(parses[1]["light"].as_str(), Some("middle"));
        assert_eq!(parses[1]["color"].as_str(), Some("yellow"));
    }

    #[test]
    fn optional_times_is_captured() {
        let parser = RobustParser::new(light_grammar());
        let (_, result) = parser.parse("flash bottom light twice in blue").unwrap();

        let parses = entries(&result);
        assert_eq!(parses.len(), 1);
        assert_eq!(parses[0]["times"].as_str(), Some("twice"));
        assert_eq!(parses[0]["color"].as_str(), Some("blue"));
    }

    #[test]
    fn multi_token_regex_matches() {
        let parser = RobustParser::new(light_grammar());
        let (_, result) = parser
            .parse("blink middle light 20 times in yellow")
            .unwrap();

        let parses = entries(&result);
        assert_eq!(parses.len(), 1);
        assert_eq!(parses[0]["times"].as_str(), Some("20 times"));
        assert_eq!(parses[0]["color"].as_str(), Some("yellow"));
    }

    #[test]
    fn actions_rewrite_values() {
        let parser = RobustParser::new(light_grammar_with_actions());
        let (_, result) = parser
            .parse("flash my top light twice in red and blink middle light 20 times in yellow")
            .unwrap();

        let parses = entries(&result);
        assert_eq!(parses.len(), 2);
        assert_eq!(parses[0]["times"].as_int(), Some(2));
        assert_eq!(
            parses[0]["color"],
            Value::List(vec![Value::Int(255), Value::Int(0), Value::Int(0)])
        );
        assert_eq!(parses[1]["times"].as_int(), Some(20));
        assert_eq!(
            parses[1]["color"],
            Value::List(vec![Value::Int(255), Value::Int(255), Value::Int(0)])
        );
    }

    #[test]
    fn unknown_tokens_are_skipped() {
        let parser = RobustParser::new(light_grammar());
        let (_, result) = parser
            .parse("please kindly set the top light to red thanks")
            .unwrap();

        let parses = entries(&result);
        assert_eq!(parses.len(), 1);
        assert_eq!(parses[0]["action"].as_str(), Some("set"));
        assert_eq!(parses[0]["light"].as_str(), Some("top"));
        assert_eq!(parses[0]["color"].as_str(), Some("red"));
    }

    #[test]
    fn ambiguity_prefers_declaration_order() {
        let mut b = GrammarBuilder::new();
        let head = b.define("head", Elem::lit("a"));
        let first = b.define("first", Elem::lit("b"));
        let second = b.define("second", Elem::regex("b").unwrap());
        let alt1 = head.clone() + first;
        let alt2 = head + second;
        b.goal(alt1 | alt2);
        let parser = RobustParser::new(b.compile().unwrap());

        let (_, result) = parser.parse("a b").unwrap();
        assert_eq!(result["first"].as_str(), Some("b"));
        assert!(result.get("second").is_none());
    }

    #[test]
    fn all_strategies_agree() {
        let mut trees = Vec::new();
        for strategy in [Strategy::LeftCorner, Strategy::TopDown, Strategy::BottomUp].iter() {
            let parser = RobustParser::with_config(
                light_grammar(),
                ParserConfig {
                    strategy: *strategy,
                    ..ParserConfig::default()
                },
            );
            let (tree, result) = parser.parse("set top red").unwrap();
            assert_eq!(entries(&result)[0]["action"].as_str(), Some("set"));
            trees.push(tree);
        }
        assert_eq!(trees[0], trees[1]);
        assert_eq!(trees[1], trees[2]);
    }

    #[test]
    fn top_down_skips_unknown_tokens_too() {
        let parser = RobustParser::with_config(
            light_grammar(),
            ParserConfig {
                strategy: Strategy::TopDown,
                ..ParserConfig::default()
            },
        );
        let (_, result) = parser.parse("set my top light to red").unwrap();
        assert_eq!(entries(&result)[0]["color"].as_str(), Some("red"));
    }

    #[test]
    fn parsing_is_deterministic() {
        let parser = RobustParser::new(light_grammar());
        let (tree1, result1) = parser.parse("flash bottom light twice in blue").unwrap();
        let (tree2, result2) = parser.parse("flash bottom light twice in blue").unwrap();
        assert_eq!(tree1, tree2);
        assert_eq!(result1, result2);
    }

    #[test]
    fn ranking_minimizes_node_count() {
        // Two ways to cover "a a": one two-occurrence parse, or one
        // occurrence plus a skipped token. The two-occurrence parse has
        // more nodes, so the skip-free requirement must come from the skip
        // rule never firing (the token matches), and the list has two
        // entries.
        let mut b = GrammarBuilder::new();
        let word = b.define("word", Elem::lit("a"));
        b.goal(word.one_or_more());
        let parser = RobustParser::new(b.compile().unwrap());
        let (_, result) = parser.parse("a a").unwrap();
        assert_eq!(result["word"].as_list().unwrap().len(), 2);
    }

    #[test]
    fn skip_cap_bounds_recovery() {
        let strict = RobustParser::with_config(
            light_grammar(),
            ParserConfig {
                skip_cap: Some(0),
                ..ParserConfig::default()
            },
        );
        assert!(strict.parse("set top red").is_ok());
        assert!(strict.parse("set my top light to red").is_err());

        let lenient = RobustParser::with_config(
            light_grammar(),
            ParserConfig {
                skip_cap: Some(3),
                ..ParserConfig::default()
            },
        );
        assert!(lenient.parse("set my top light to red").is_ok());

        let too_tight = RobustParser::with_config(
            light_grammar(),
            ParserConfig {
                skip_cap: Some(2),
                ..ParserConfig::default()
            },
        );
        assert!(too_tight.parse("set my top light to red").is_err());
    }

    #[test]
    fn step_budget_aborts() {
        let parser = RobustParser::with_config(
            light_grammar(),
            ParserConfig {
                step_budget: Some(3),
                ..ParserConfig::default()
            },
        );
        match parser.parse("set top red") {
            Err(ParseError::Budget { budget, .. }) => assert_eq!(budget, 3),
            other => panic!("expected Budget, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn failure_reports_expected_terminals() {
        let parser = RobustParser::new(light_grammar());
        match parser.parse("hello world") {
            Err(ParseError::Failure { expected, .. }) => {
                assert!(expected.iter().any(|name| name == "action"));
            }
            other => panic!("expected Failure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn empty_input_only_parses_nullable_goals() {
        let parser = RobustParser::new(light_grammar());
        assert!(parser.parse("").is_err());

        let mut b = GrammarBuilder::new();
        let word = b.define("word", Elem::lit("a"));
        b.goal(word.zero_or_more());
        let parser = RobustParser::new(b.compile().unwrap());
        let (_, result) = parser.parse("").unwrap();
        assert_eq!(result["GOAL"].as_list().unwrap().len(), 0);
    }

    #[test]
    fn incremental_listener_sees_prefix_then_spanning() {
        let parser = RobustParser::new(light_grammar());
        let mut events: Vec<(usize, bool)> = Vec::new();
        let (_, result) = parser
            .parse_incremental(
                "set my top light to red and change middle light to yellow",
                |partial| {
                    events.push((partial.end, partial.spanning));
                    Signal::Continue
                },
            )
            .unwrap();

        assert_eq!(entries(&result).len(), 2);
        // The first clause completes before the whole input does.
        assert!(events.iter().any(|&(end, spanning)| end == 6 && !spanning));
        let last = events.last().unwrap();
        assert_eq!(*last, (12, true));
    }

    #[test]
    fn incremental_stop_settles_for_the_prefix() {
        let parser = RobustParser::new(light_grammar());
        let (_, result) = parser
            .parse_incremental(
                "set my top light to red and change middle light to yellow",
                |_| Signal::Stop,
            )
            .unwrap();
        assert_eq!(entries(&result).len(), 1);
    }

    #[test]
    fn parse_multi_ranks_alternatives() {
        let mut b = GrammarBuilder::new();
        let head = b.define("head", Elem::lit("a"));
        let first = b.define("first", Elem::lit("b"));
        let second = b.define("second", Elem::regex("b").unwrap());
        let alt1 = head.clone() + first;
        let alt2 = head + second;
        b.goal(alt1 | alt2);
        let parser = RobustParser::new(b.compile().unwrap());

        let parses = parser.parse_multi("a b", 2).unwrap();
        assert_eq!(parses.len(), 2);
        assert!(parses[0].1.get("first").is_some());
        assert!(parses[1].1.get("second").is_some());
    }

    #[test]
    fn shared_grammar_reuses_across_parsers() {
        let grammar = light_grammar();
        let one = RobustParser::new(grammar.clone());
        let two = RobustParser::new(grammar);
        assert!(one.parse("set top red").is_ok());
        assert!(two.parse("flash bottom blue").is_ok());
    }
}
