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

//! Parse results: named values flattened out of a parse tree

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use crate::element::ActionError;
use crate::grammar::{Grammar, SymbolId};
use crate::tree::ParseTree;

/// A result value: a matched string, a number or list produced by a result
/// action, a list of repetition occurrences, or a mapping of named
/// bindings.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Keyed lookup into a mapping value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(name),
            _ => None,
        }
    }

    /// Number of entries of a list or mapping, 1 otherwise.
    pub fn len(&self) -> usize {
        match self {
            Value::List(items) => items.len(),
            Value::Map(map) => map.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Int(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::List(items)
    }
}

impl Index<&str> for Value {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        match self.get(name) {
            Some(v) => v,
            None => panic!("no binding '{}' in result value", name),
        }
    }
}

impl Index<usize> for Value {
    type Output = Value;

    fn index(&self, at: usize) -> &Value {
        match self {
            Value::List(items) => &items[at],
            _ => panic!("result value is not a list"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Value::Int(n) => write!(f, "{}", n),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Mutable view of one element's value during its result action. Valid
/// only for the duration of the call.
pub struct ResultHandle<'a> {
    value: &'a mut Value,
}

impl<'a> ResultHandle<'a> {
    pub(crate) fn new(value: &'a mut Value) -> Self {
        ResultHandle { value }
    }

    /// The current value of the element.
    pub fn get(&self) -> &Value {
        &*self.value
    }

    /// Replace the value of the element.
    pub fn set(&mut self, value: Value) {
        *self.value = value;
    }
}

/// The flattened, named result of a parse: a mapping from the goal's name
/// and every promoted binding to its value.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseResult {
    root: Value,
}

impl ParseResult {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.root.get(name)
    }

    /// The whole result as a mapping value.
    pub fn value(&self) -> &Value {
        &self.root
    }
}

impl Index<&str> for ParseResult {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        match self.get(name) {
            Some(v) => v,
            None => panic!("no binding '{}' in parse result", name),
        }
    }
}

impl fmt::Display for ParseResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

/// A result action reported an error; the build is abandoned.
pub(crate) struct ActionFailure {
    pub(crate) name: String,
    pub(crate) source: ActionError,
}

/// Convert the tree into its result. Bindings of named elements nest under
/// the nearest named ancestor; anonymous composites dissolve; repetitions
/// produce occurrence lists. Actions run post-order.
pub(crate) fn build(g: &Grammar, tree: &ParseTree) -> Result<ParseResult, ActionFailure> {
    let outcome = eval(g, tree)?;
    let mut root = BTreeMap::new();
    let goal_name = g.name(tree.symbol()).to_string();
    if let Some(v) = outcome.value {
        root.insert(goal_name, v);
    }
    // The goal's own bindings surface at top level unless they would
    // shadow something.
    for (name, v) in outcome.bindings {
        root.entry(name).or_insert(v);
    }
    Ok(ParseResult {
        root: Value::Map(root),
    })
}

struct Outcome {
    /// Value of the node, if it bound anything or matched any text.
    value: Option<Value>,

    /// Named bindings formed at this node. Parents merge these when the
    /// node is anonymous, and ignore them when it is named (the value
    /// already contains them).
    bindings: Vec<(String, Value)>,

    /// True if an action replaced the value; the stale bindings must not
    /// be promoted past it.
    acted: bool,
}

fn eval(g: &Grammar, node: &ParseTree) -> Result<Outcome, ActionFailure> {
    match node {
        ParseTree::Leaf { symbol, text, .. } => {
            let mut value = Some(Value::Str(text.clone()));
            let acted = apply_action(g, *symbol, &mut value)?;
            Ok(Outcome {
                value,
                bindings: Vec::new(),
                acted,
            })
        }
        ParseTree::Node {
            symbol, children, ..
        } => {
            if g.info(*symbol).repetition {
                eval_repetition(g, node, *symbol)
            } else {
                eval_composite(g, *symbol, children)
            }
        }
    }
}

fn eval_composite(
    g: &Grammar,
    symbol: SymbolId,
    children: &[ParseTree],
) -> Result<Outcome, ActionFailure> {
    let mut bindings: Vec<(String, Value)> = Vec::new();
    let mut lean: Vec<Value> = Vec::new();
    for child in children {
        let outcome = eval(g, child)?;
        let csym = child.symbol();
        if g.info(csym).named {
            if let Some(v) = outcome.value {
                push_binding(&mut bindings, g.name(csym).to_string(), v);
            }
        } else if !outcome.bindings.is_empty() && !outcome.acted {
            promote(&mut bindings, g.name(csym), outcome.bindings);
        } else if let Some(v) = outcome.value {
            lean.push(v);
        }
    }
    let mut value = if !bindings.is_empty() {
        Some(Value::Map(to_map(bindings.clone())))
    } else if lean.len() == 1 {
        lean.pop()
    } else if !lean.is_empty() {
        Some(Value::List(lean))
    } else {
        None
    };
    let acted = apply_action(g, symbol, &mut value)?;
    Ok(Outcome {
        value,
        bindings,
        acted,
    })
}

fn eval_repetition(
    g: &Grammar,
    node: &ParseTree,
    symbol: SymbolId,
) -> Result<Outcome, ActionFailure> {
    let mut occurrences = Vec::new();
    let mut occ_name = None;
    collect_occurrences(g, node, symbol, &mut occurrences, &mut occ_name)?;
    let list = Value::List(occurrences);
    let mut bindings = Vec::new();
    if let Some(name) = occ_name {
        bindings.push((name, list.clone()));
    }
    let mut value = Some(list);
    let acted = apply_action(g, symbol, &mut value)?;
    Ok(Outcome {
        value,
        bindings,
        acted,
    })
}

/// Flatten the recursive spine of a repetition into one occurrence list.
/// Spine nodes (the repetition symbol itself, or a generated tail spliced
/// into it) are invisible in the result.
fn collect_occurrences(
    g: &Grammar,
    node: &ParseTree,
    spine: SymbolId,
    occurrences: &mut Vec<Value>,
    occ_name: &mut Option<String>,
) -> Result<(), ActionFailure> {
    for child in node.children() {
        let csym = child.symbol();
        if csym == spine || g.info(csym).splice_into == Some(spine) {
            collect_occurrences(g, child, csym, occurrences, occ_name)?;
            continue;
        }
        let outcome = eval(g, child)?;
        if g.info(csym).named && occ_name.is_none() {
            *occ_name = Some(g.name(csym).to_string());
        }
        if let Some(v) = outcome.value {
            occurrences.push(v);
        }
    }
    Ok(())
}

/// Insert a binding; a repeated name accumulates into a list.
fn push_binding(bindings: &mut Vec<(String, Value)>, name: String, value: Value) {
    for (k, existing) in bindings.iter_mut() {
        if *k == name {
            let old = std::mem::replace(existing, Value::Int(0));
            *existing = match old {
                Value::List(mut items) => {
                    items.push(value);
                    Value::List(items)
                }
                scalar => Value::List(vec![scalar, value]),
            };
            return;
        }
    }
    bindings.push((name, value));
}

/// Merge the bindings of a dissolved anonymous child. A binding that would
/// collide stays grouped under the child's synthetic name instead.
fn promote(bindings: &mut Vec<(String, Value)>, child_name: &str, inner: Vec<(String, Value)>) {
    let mut clashed: Vec<(String, Value)> = Vec::new();
    for (name, value) in inner {
        if bindings.iter().any(|(k, _)| *k == name) {
            clashed.push((name, value));
        } else {
            bindings.push((name, value));
        }
    }
    if !clashed.is_empty() {
        push_binding(bindings, child_name.to_string(), Value::Map(to_map(clashed)));
    }
}

fn to_map(bindings: Vec<(String, Value)>) -> BTreeMap<String, Value> {
    let mut map = BTreeMap::new();
    for (name, value) in bindings {
        map.insert(name, value);
    }
    map
}

fn apply_action(
    g: &Grammar,
    symbol: SymbolId,
    value: &mut Option<Value>,
) -> Result<bool, ActionFailure> {
    let action = match g.info(symbol).action {
        Some(ref a) => a.clone(),
        None => return Ok(false),
    };
    let slot = match value {
        Some(v) => v,
        // An absent optional has no occurrence; its action does not run.
        None => return Ok(false),
    };
    let mut handle = ResultHandle::new(slot);
    (*action)(&mut handle).map_err(|source| ActionFailure {
        name: g.name(symbol).to_string(),
        source,
    })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Elem;
    use crate::grammar::GrammarBuilder;

    fn tree_for(g: &Grammar, input: &str) -> ParseTree {
        use crate::parser::RobustParser;
        let parser = RobustParser::new(g.clone());
        let (tree, _) = parser.parse(input).expect("input should parse");
        tree
    }

    #[test]
    fn named_terminals_bind_and_anonymous_composites_dissolve() {
        let mut b = GrammarBuilder::new();
        let action = b.define("action", Elem::set(vec!["set"]));
        let light = b.define("light", Elem::set(vec!["top"]));
        b.goal(action + light);
        let g = b.compile().unwrap();

        let tree = tree_for(&g, "set top");
        let result = build(&g, &tree).map_err(|e| e.name).unwrap();
        assert_eq!(result["action"].as_str(), Some("set"));
        assert_eq!(result["light"].as_str(), Some("top"));
        assert_eq!(result["GOAL"]["action"].as_str(), Some("set"));
    }

    #[test]
    fn collision_keeps_deeper_binding_under_synthetic_name() {
        let mut b = GrammarBuilder::new();
        let first = b.define("word", Elem::lit("a"));
        let second = b.define("other", Elem::lit("b"));
        // An inner anonymous pair that rebinds "word" through a second
        // element of the same name.
        let inner_word = Elem::lit("c");
        inner_word.set_name("word").unwrap();
        let inner = second + inner_word;
        b.goal(first + inner);
        let g = b.compile().unwrap();

        let tree = tree_for(&g, "a b c");
        let result = build(&g, &tree).map_err(|e| e.name).unwrap();
        // Outer binding wins the flat name.
        assert_eq!(result["word"].as_str(), Some("a"));
        assert_eq!(result["other"].as_str(), Some("b"));
        // The clashing inner binding is kept under the pair's synthetic
        // name.
        let goal = result.get("GOAL").unwrap();
        let synthetic = goal
            .as_map()
            .unwrap()
            .keys()
            .find(|k| k.starts_with('('))
            .expect("synthetic group present")
            .clone();
        assert_eq!(goal[synthetic.as_str()]["word"].as_str(), Some("c"));
    }

    #[test]
    fn building_twice_yields_equal_results() {
        let g = crate::grammar::tests::light_grammar_with_actions();
        let tree = tree_for(&g, "flash bottom light twice in blue");
        let once = build(&g, &tree).map_err(|e| e.name).unwrap();
        let again = build(&g, &tree).map_err(|e| e.name).unwrap();
        assert_eq!(once, again);
    }

    #[test]
    fn action_errors_carry_the_element_name() {
        let mut b = GrammarBuilder::new();
        let word = b.define(
            "word",
            Elem::lit("a").on_result(|_| Err("boom".into())),
        );
        b.goal(word);
        let g = b.compile().unwrap();

        let tree = tree_for(&g, "a");
        match build(&g, &tree) {
            Err(failure) => assert_eq!(failure.name, "word"),
            Ok(_) => panic!("the action error should surface"),
        }
    }

    #[test]
    fn value_accessors() {
        let mut map = BTreeMap::new();
        map.insert("color".to_string(), Value::from("red"));
        map.insert("times".to_string(), Value::from(2i64));
        let v = Value::Map(map);
        assert_eq!(v["color"].as_str(), Some("red"));
        assert_eq!(v["times"].as_int(), Some(2));
        assert_eq!(v.get("missing"), None);

        let list = Value::List(vec![Value::from(1i64), Value::from(2i64)]);
        assert_eq!(list[1].as_int(), Some(2));
        assert_eq!(list.len(), 2);
        assert_eq!(
            format!("{}", list),
            "[1, 2]"
        );
        assert_eq!(format!("{}", v), "{\"color\": \"red\", \"times\": 2}");
    }
}
