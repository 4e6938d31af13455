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

//! Demo: parse light-control commands from the command line
//!
//! Try:
//! ```text
//! semchart set my top light to red
//! semchart -- flash bottom light twice in blue and blink middle light 20 times in yellow
//! SEMCHART_LOG=trace semchart --incremental please kindly set the top light to red thanks
//! ```

use log::{debug, info};
use structopt::StructOpt;

use semchart::{
    Elem, Grammar, GrammarBuilder, GrammarError, ParserConfig, RobustParser, Signal, Strategy,
    Value,
};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "semchart",
    about = "Robust phrase parsing demo over a light-control grammar"
)]
struct CommandLine {
    /// Parsing strategy: left-corner, top-down, or bottom-up
    #[structopt(long, default_value = "left-corner")]
    strategy: String,

    /// Show the K best parses instead of only the winner
    #[structopt(long)]
    multi: Option<usize>,

    /// Report partial parses while the engine runs
    #[structopt(long)]
    incremental: bool,

    /// The sentence to parse
    sentence: Vec<String>,
}

/// The flagship grammar: commands like "flash my top light twice in red".
/// Colors become rgb triples, times become counts.
fn light_grammar() -> Result<Grammar, GrammarError> {
    let mut g = GrammarBuilder::new();
    let action = g.define("action", Elem::set(vec!["change", "flash", "set", "blink"]));
    let light = g.define("light", Elem::set(vec!["top", "middle", "bottom"]));
    let color = g.define(
        "color",
        Elem::regex("red|yellow|blue|orange|purple")?.on_result(|h| {
            let rgb = match h.get().as_str() {
                Some("red") => (255, 0, 0),
                Some("yellow") => (255, 255, 0),
                Some("blue") => (0, 0, 255),
                Some("orange") => (255, 165, 0),
                Some("purple") => (128, 0, 128),
                _ => (0, 0, 0),
            };
            h.set(Value::List(vec![
                Value::Int(rgb.0),
                Value::Int(rgb.1),
                Value::Int(rgb.2),
            ]));
            Ok(())
        }),
    );
    let times = g.define(
        "times",
        (Elem::set(vec!["once", "twice", "three times"]) | Elem::regex(r"\d+ times")?).on_result(
            |h| {
                let n = match h.get().as_str() {
                    Some("once") => 1,
                    Some("twice") => 2,
                    Some("three times") => 3,
                    Some(other) => other
                        .split_ascii_whitespace()
                        .next()
                        .and_then(|w| w.parse().ok())
                        .unwrap_or(0),
                    None => 0,
                };
                h.set(Value::Int(n));
                Ok(())
            },
        ),
    );
    let one_parse = g.define("one_parse", action + light + times.opt() + color);
    g.goal(one_parse.one_or_more());
    g.compile()
}

fn main() {
    // Initialise the logger first, but only when asked for.
    let _ = std::env::var("SEMCHART_LOG").and_then(|spec| {
        let _ = flexi_logger::Logger::with_str(spec)
            .format(flexi_logger::with_thread)
            .start();
        info!("logging is ready");
        Ok(())
    });

    let cmd_line = CommandLine::from_args();
    debug!("{:?}", cmd_line);
    if cmd_line.sentence.is_empty() {
        eprintln!("usage: semchart [--strategy S] [--multi K] [--incremental] <sentence>");
        std::process::exit(2);
    }
    let sentence = cmd_line.sentence.join(" ");

    let strategy = match cmd_line.strategy.as_str() {
        "left-corner" => Strategy::LeftCorner,
        "top-down" => Strategy::TopDown,
        "bottom-up" => Strategy::BottomUp,
        other => {
            eprintln!("unknown strategy '{}'", other);
            std::process::exit(2);
        }
    };

    let grammar = match light_grammar() {
        Ok(g) => g,
        Err(e) => {
            eprintln!("grammar error: {}", e);
            std::process::exit(2);
        }
    };
    let parser = RobustParser::with_config(
        grammar,
        ParserConfig {
            strategy,
            ..ParserConfig::default()
        },
    );

    if let Some(k) = cmd_line.multi {
        match parser.parse_multi(&sentence, k) {
            Ok(parses) => {
                for (rank, (tree, result)) in parses.iter().enumerate() {
                    println!("#{}", rank + 1);
                    let _ = ptree::print_tree(&tree.display(parser.grammar()));
                    println!("{}", result);
                }
            }
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let outcome = if cmd_line.incremental {
        parser.parse_incremental(&sentence, |partial| {
            println!(
                "partial parse up to token {}{}: {}",
                partial.end,
                if partial.spanning { " (spanning)" } else { "" },
                partial.result
            );
            Signal::Continue
        })
    } else {
        parser.parse(&sentence)
    };

    match outcome {
        Ok((tree, result)) => {
            let _ = ptree::print_tree(&tree.display(parser.grammar()));
            println!("{}", result);
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
