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

//! Whitespace tokenizer with positions

struct Word {
    /// Comparison form of the token. ASCII-lowercased unless the grammar is
    /// case sensitive.
    norm: String,

    /// Byte range in the raw input.
    start: usize,
    end: usize,
}

/// Tokenized input sentence with random access to tokens and to the raw
/// text of any token span. One stream is built per parse and owned by it.
pub struct TokenStream {
    raw: String,
    words: Vec<Word>,
}

impl TokenStream {
    /// Split `text` on ASCII whitespace, collapsing runs. Byte offsets into
    /// the raw input are kept so that multi-token matches can report their
    /// original spelling.
    pub fn new(text: &str, case_sensitive: bool) -> Self {
        let base = text.as_ptr() as usize;
        let words = text
            .split_ascii_whitespace()
            .map(|w| {
                let start = w.as_ptr() as usize - base;
                Word {
                    norm: if case_sensitive {
                        w.to_string()
                    } else {
                        w.to_ascii_lowercase()
                    },
                    start,
                    end: start + w.len(),
                }
            })
            .collect();
        TokenStream {
            raw: text.to_string(),
            words,
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Normalized text of token `i`.
    pub fn get(&self, i: usize) -> Option<&str> {
        self.words.get(i).map(|w| w.norm.as_str())
    }

    /// Normalized tokens of `[i, j)` joined by single spaces, the form
    /// multi-token terminals match against.
    pub fn window(&self, i: usize, j: usize) -> String {
        let mut out = String::new();
        for k in i..j.min(self.words.len()) {
            if k > i {
                out.push(' ');
            }
            out.push_str(&self.words[k].norm);
        }
        out
    }

    /// Raw input substring covering tokens `[i, j)`, original spacing
    /// preserved. Empty for an empty span.
    pub fn span_text(&self, i: usize, j: usize) -> &str {
        if i >= j || j > self.words.len() {
            return "";
        }
        &self.raw[self.words[i].start..self.words[j - 1].end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_collapses_whitespace() {
        let toks = TokenStream::new("  set   my\ttop ", false);
        assert_eq!(toks.len(), 3);
        assert_eq!(toks.get(0), Some("set"));
        assert_eq!(toks.get(1), Some("my"));
        assert_eq!(toks.get(2), Some("top"));
        assert_eq!(toks.get(3), None);
    }

    #[test]
    fn lowercases_unless_case_sensitive() {
        let toks = TokenStream::new("SET My Top", false);
        assert_eq!(toks.get(0), Some("set"));

        let exact = TokenStream::new("SET My Top", true);
        assert_eq!(exact.get(0), Some("SET"));
        assert_eq!(exact.get(1), Some("My"));
    }

    #[test]
    fn span_text_keeps_original_spacing() {
        let toks = TokenStream::new("blink  20   times", false);
        assert_eq!(toks.span_text(1, 3), "20   times");
        assert_eq!(toks.span_text(0, 1), "blink");
        assert_eq!(toks.span_text(2, 2), "");
        assert_eq!(toks.span_text(0, 9), "");
    }

    #[test]
    fn window_joins_with_single_spaces() {
        let toks = TokenStream::new("blink  20   Times", false);
        assert_eq!(toks.window(1, 3), "20 times");
        assert_eq!(toks.window(0, 0), "");
    }
}
