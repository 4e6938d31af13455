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

//! Robust, incremental chart parsing for small natural-language phrase
//! grammars.
//!
//! A grammar is composed from elements (literals, string sets, regexes,
//! concatenation, alternation, optionality, repetition), compiled once,
//! and then used to parse sentences into a parse tree plus a flattened,
//! named result suitable for driving an API. Unknown tokens are skipped
//! rather than failing the parse, multi-word phrases can match a single
//! terminal, and partial results are emitted while the parse runs.
//!
//! ```
//! use semchart::{Elem, GrammarBuilder, RobustParser};
//!
//! let mut g = GrammarBuilder::new();
//! let action = g.define("action", Elem::set(vec!["set", "flash"]));
//! let light = g.define("light", Elem::set(vec!["top", "bottom"]));
//! let color = g.define("color", Elem::regex("red|blue").unwrap());
//! g.goal(action + light + color);
//!
//! let parser = RobustParser::new(g.compile().unwrap());
//! let (_tree, result) = parser.parse("please set the top light to red").unwrap();
//! assert_eq!(result["action"].as_str(), Some("set"));
//! assert_eq!(result["color"].as_str(), Some("red"));
//! ```

mod chart;
mod element;
mod grammar;
mod parser;
mod result;
mod rules;
mod strategy;
mod token;
mod tree;

pub use element::{ActionError, Elem, ResultAction};
pub use grammar::{Grammar, GrammarBuilder, GrammarError, SymbolId};
pub use parser::{ParseError, ParserConfig, PartialParse, RobustParser, Signal};
pub use result::{ParseResult, ResultHandle, Value};
pub use strategy::Strategy;
pub use token::TokenStream;
pub use tree::{ParseTree, TieBreak, TreeDisplay};
