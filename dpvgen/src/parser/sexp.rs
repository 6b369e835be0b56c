//! Nested-list (S-expression) parser for KiCad board files.
//!
//! The parser is a single left-to-right scan with an explicit stack, so deeply
//! nested input is bounded by memory rather than call depth.
//!
//! Quoted strings are kept as written, including the surrounding quotes and
//! any escape sequences. [`Node::text`] decodes them on demand.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unbalanced parentheses: {0} list(s) still open at end of input")]
    UnclosedList(usize),
    #[error("Unbalanced parentheses: unexpected ')' at offset {0}")]
    UnexpectedClose(usize),
}

/// One element of the parsed tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Bare word, e.g. `footprint` or `F.Cu`.
    Symbol(String),
    /// Bare word that was entirely numeric.
    Number(f64),
    /// Quoted string literal, stored raw with its quotes (`"\"C12\""`).
    Str(String),
    List(Vec<Node>),
}

impl Node {
    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Node::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Node::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Raw text of an atom as it appeared in the file (quotes included).
    pub fn raw(&self) -> Option<String> {
        match self {
            Node::Symbol(s) | Node::Str(s) => Some(s.clone()),
            Node::Number(n) => Some(n.to_string()),
            Node::List(_) => None,
        }
    }

    /// Decoded text of an atom: quoted strings go through JSON string
    /// decoding, symbols and numbers are returned as written.
    pub fn text(&self) -> Option<String> {
        match self {
            Node::Str(raw) => Some(
                serde_json::from_str::<String>(raw)
                    .unwrap_or_else(|_| raw.trim_matches('"').to_string()),
            ),
            other => other.raw(),
        }
    }

    /// The leading symbol of a list, e.g. `gr_line` for `(gr_line ...)`.
    pub fn tag(&self) -> Option<&str> {
        self.as_list()
            .and_then(|items| items.first())
            .and_then(|first| first.as_symbol())
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag() == Some(tag)
    }

    /// First direct child list whose tag is `key`.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_list()?.iter().find(|item| item.is(key))
    }

    /// All direct child lists whose tag is `key`.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.as_list()
            .unwrap_or(&[])
            .iter()
            .filter(move |item| item.is(key))
    }

    /// Element `index` of a list (index 0 is the tag).
    pub fn item(&self, index: usize) -> Option<&Node> {
        self.as_list()?.get(index)
    }

    /// Numeric element `index` of a list.
    pub fn number_at(&self, index: usize) -> Option<f64> {
        self.item(index).and_then(Node::as_number)
    }

    /// True if a direct child `(key value ...)` exists whose second element
    /// is written exactly as `raw` (quotes included for strings).
    pub fn has_entry(&self, key: &str, raw: &str) -> bool {
        self.get_all(key)
            .any(|entry| entry.item(1).and_then(Node::raw).as_deref() == Some(raw))
    }

    /// Depth-first walk over this node and every nested list.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Node)) {
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if let Node::List(items) = node {
                visit(node);
                pending.extend(items.iter().rev());
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Symbol(s) | Node::Str(s) => write!(f, "{}", s),
            Node::Number(n) => write!(f, "{}", n),
            Node::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

pub struct SExpParser<'a> {
    input: &'a str,
    stack: Vec<Vec<Node>>,
    current: Vec<Node>,
    atom: Option<String>,
    in_string: bool,
    escape: bool,
}

impl<'a> SExpParser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            stack: Vec::new(),
            current: Vec::new(),
            atom: None,
            in_string: false,
            escape: false,
        }
    }

    /// Parse the whole input and return the root list.
    ///
    /// The root is the first top-level list. Input without any list yields
    /// the list of its top-level atoms.
    pub fn parse(mut self) -> Result<Node, ParseError> {
        for (offset, c) in self.input.char_indices() {
            if self.escape {
                self.push_char(c);
                self.escape = false;
            } else if c == '\\' {
                if self.in_string {
                    self.push_char(c);
                }
                self.escape = true;
            } else if self.in_string {
                self.push_char(c);
                self.in_string = c != '"';
            } else if (c as u32) <= 0x20 {
                self.close_atom();
            } else {
                match c {
                    '(' => {
                        // `(a b(c))` reads as `(a b (c))`
                        self.close_atom();
                        let parent = std::mem::take(&mut self.current);
                        self.stack.push(parent);
                    }
                    ')' => {
                        self.close_atom();
                        let parent = self
                            .stack
                            .pop()
                            .ok_or(ParseError::UnexpectedClose(offset))?;
                        let child = std::mem::replace(&mut self.current, parent);
                        self.current.push(Node::List(child));
                    }
                    '"' => {
                        self.in_string = true;
                        self.push_char(c);
                    }
                    _ => self.push_char(c),
                }
            }
        }

        if !self.stack.is_empty() {
            return Err(ParseError::UnclosedList(self.stack.len()));
        }
        self.close_atom();

        let mut top = self.current;
        match top.iter().position(|n| matches!(n, Node::List(_))) {
            Some(pos) => Ok(top.swap_remove(pos)),
            None => Ok(Node::List(top)),
        }
    }

    fn push_char(&mut self, c: char) {
        self.atom.get_or_insert_with(String::new).push(c);
    }

    fn close_atom(&mut self) {
        if let Some(atom) = self.atom.take() {
            self.current.push(classify_atom(atom));
        }
    }
}

fn classify_atom(atom: String) -> Node {
    if atom.starts_with('"') {
        return Node::Str(atom);
    }
    let numeric_chars = atom
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if numeric_chars && atom.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(n) = atom.parse::<f64>() {
            return Node::Number(n);
        }
    }
    Node::Symbol(atom)
}

/// Parse board file text into its root node.
pub fn parse(input: &str) -> Result<Node, ParseError> {
    SExpParser::new(input).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Node {
        Node::Symbol(s.to_string())
    }

    #[test]
    fn test_quoted_string_keeps_quotes() {
        let root = parse(r#"(test foo "bar 23")"#).unwrap();
        assert_eq!(
            root,
            Node::List(vec![sym("test"), sym("foo"), Node::Str("\"bar 23\"".to_string())])
        );
    }

    #[test]
    fn test_numbers_are_coerced() {
        let root = parse("(at 110.5 -95 90)").unwrap();
        assert_eq!(root.number_at(1), Some(110.5));
        assert_eq!(root.number_at(2), Some(-95.0));
        assert_eq!(root.number_at(3), Some(90.0));
    }

    #[test]
    fn test_non_numbers_stay_symbols() {
        let root = parse("(x inf NaN 1e 10k \"42\")").unwrap();
        let items = root.as_list().unwrap();
        assert_eq!(items[1], sym("inf"));
        assert_eq!(items[2], sym("NaN"));
        assert_eq!(items[3], sym("1e"));
        assert_eq!(items[4], sym("10k"));
        assert_eq!(items[5], Node::Str("\"42\"".to_string()));
    }

    #[test]
    fn test_list_glued_to_atom() {
        let glued = parse("(a b(c d))").unwrap();
        let spaced = parse("(a b (c d))").unwrap();
        assert_eq!(glued, spaced);
    }

    #[test]
    fn test_escapes_left_intact() {
        let root = parse(r#"(t "say \"hi\" (now)")"#).unwrap();
        let atom = root.item(1).unwrap();
        assert_eq!(atom, &Node::Str(r#""say \"hi\" (now)""#.to_string()));
        assert_eq!(atom.text().as_deref(), Some(r#"say "hi" (now)"#));
    }

    #[test]
    fn test_unbalanced_fails() {
        assert_eq!(parse("(a (b c)"), Err(ParseError::UnclosedList(1)));
        assert!(matches!(parse("(a b))"), Err(ParseError::UnexpectedClose(5))));
        assert!(parse(")").is_err());
    }

    #[test]
    fn test_balanced_inputs_never_fail() {
        for input in ["", "()", "abc", "(((a)))", "(a \")\")", "(a)(b)", "  \n\t"] {
            assert!(parse(input).is_ok(), "failed on {:?}", input);
        }
    }

    #[test]
    fn test_whitespace_control_chars() {
        let root = parse("(a\r\nb\u{1}c)").unwrap();
        assert_eq!(root, Node::List(vec![sym("a"), sym("b"), sym("c")]));
    }

    #[test]
    fn test_get_and_walk() {
        let root = parse("(kicad_pcb (version 20221018) (setup (aux_axis_origin 1 2)) (gr_line) (group (gr_line)))").unwrap();
        assert_eq!(root.get("version").and_then(|v| v.number_at(1)), Some(20221018.0));
        let origin = root.get("setup").and_then(|s| s.get("aux_axis_origin")).unwrap();
        assert_eq!(origin.number_at(2), Some(2.0));

        let mut lines = 0;
        root.walk(&mut |n| {
            if n.is("gr_line") {
                lines += 1;
            }
        });
        assert_eq!(lines, 2);
    }
}
