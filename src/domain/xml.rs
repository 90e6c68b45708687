//! Minimal XML tree used to fill in annotation templates.
//!
//! Supports what annotation templates contain: a prolog, comments, elements
//! with quoted attributes, and text. DTDs and CDATA sections are rejected.

use super::error::ConversionError;
use std::fmt::{self, Write as _};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Replaces the attribute's value, or appends it if absent.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Depth-first search, including `self`.
    pub fn find_mut<P>(&mut self, pred: &P) -> Option<&mut Element>
    where
        P: Fn(&Element) -> bool,
    {
        if pred(self) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| match child {
            Node::Element(el) => el.find_mut(pred),
            _ => None,
        })
    }

    pub fn find<P>(&self, pred: &P) -> Option<&Element>
    where
        P: Fn(&Element) -> bool,
    {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|child| match child {
            Node::Element(el) => el.find(pred),
            _ => None,
        })
    }

    /// Child elements with the given name, in document order.
    pub fn elements<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter_map(move |child| match child {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// Inserts `nodes` as the first children, keeping their order.
    pub fn prepend_children(&mut self, nodes: Vec<Node>) {
        self.children.splice(0..0, nodes);
    }

    fn write_to(&self, out: &mut String, depth: usize) -> fmt::Result {
        let indent = "    ".repeat(depth);
        write!(out, "{}<{}", indent, self.name)?;
        for (key, value) in &self.attributes {
            write!(out, " {}=\"{}\"", key, escape(value))?;
        }

        match self.children.as_slice() {
            [] => writeln!(out, "/>"),
            [Node::Text(text)] => writeln!(out, ">{}</{}>", escape(text), self.name),
            children => {
                writeln!(out, ">")?;
                for child in children {
                    match child {
                        Node::Element(el) => el.write_to(out, depth + 1)?,
                        Node::Text(text) => writeln!(out, "{}    {}", indent, escape(text))?,
                        Node::Comment(text) => writeln!(out, "{}    <!--{}-->", indent, text)?,
                    }
                }
                writeln!(out, "{}</{}>", indent, self.name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Raw processing instruction, e.g. `xml version="1.0" encoding="UTF-8"`
    pub prolog: Option<String>,
    pub root: Element,
}

impl Document {
    pub fn parse(input: &str) -> Result<Self, ConversionError> {
        let mut parser = Parser { input, pos: 0 };
        parser.skip_whitespace();

        let mut prolog = None;
        if parser.rest().starts_with("<?") {
            let body = parser.take_delimited("<?", "?>")?;
            prolog = Some(body.trim().to_string());
        }
        parser.skip_misc()?;
        let root = parser.element()?;
        parser.skip_misc()?;
        if !parser.rest().is_empty() {
            return Err(parser.error("content after the root element"));
        }
        Ok(Self { prolog, root })
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        if let Some(prolog) = &self.prolog {
            out.push_str("<?");
            out.push_str(prolog);
            out.push_str("?>\n");
        }
        // Writing into a String cannot fail.
        let _ = self.root.write_to(&mut out, 0);
        out
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn error(&self, what: &str) -> ConversionError {
        ConversionError::Template(format!("{} at byte {}", what, self.pos))
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn skip_misc(&mut self) -> Result<(), ConversionError> {
        loop {
            self.skip_whitespace();
            if self.rest().starts_with("<!--") {
                self.take_delimited("<!--", "-->")?;
            } else {
                return Ok(());
            }
        }
    }

    fn take_delimited(&mut self, open: &str, close: &str) -> Result<&'a str, ConversionError> {
        self.expect(open)?;
        let body_start = self.pos;
        let len = self.input[body_start..]
            .find(close)
            .ok_or_else(|| self.error(&format!("unterminated {}", open)))?;
        self.pos = body_start + len + close.len();
        Ok(&self.input[body_start..body_start + len])
    }

    fn expect(&mut self, token: &str) -> Result<(), ConversionError> {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}", token)))
        }
    }

    fn name(&mut self) -> Result<&'a str, ConversionError> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error("expected a name"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn element(&mut self) -> Result<Element, ConversionError> {
        self.expect("<")?;
        let mut element = Element::new(self.name()?);

        loop {
            self.skip_whitespace();
            if self.rest().starts_with("/>") {
                self.pos += 2;
                return Ok(element);
            }
            if self.rest().starts_with('>') {
                self.pos += 1;
                break;
            }
            let key = self.name()?;
            self.skip_whitespace();
            self.expect("=")?;
            self.skip_whitespace();
            let quote = if self.rest().starts_with('"') { "\"" } else { "'" };
            let value = self.take_delimited(quote, quote)?;
            element.set_attr(key, unescape(value));
        }

        loop {
            let rest = self.rest();
            if rest.starts_with("</") {
                self.pos += 2;
                let closing = self.name()?;
                if closing != element.name {
                    return Err(self.error(&format!(
                        "</{}> does not close <{}>",
                        closing, element.name
                    )));
                }
                self.skip_whitespace();
                self.expect(">")?;
                return Ok(element);
            } else if rest.starts_with("<!--") {
                let body = self.take_delimited("<!--", "-->")?;
                element.children.push(Node::Comment(body.to_string()));
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                return Err(self.error("unsupported markup"));
            } else if rest.starts_with('<') {
                element.children.push(Node::Element(self.element()?));
            } else if rest.is_empty() {
                return Err(self.error(&format!("unclosed <{}>", element.name)));
            } else {
                let len = rest.find('<').unwrap_or(rest.len());
                let text = rest[..len].trim();
                if !text.is_empty() {
                    element.children.push(Node::Text(unescape(text)));
                }
                self.pos += len;
            }
        }
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Decodes entity and character references in one pass. Unknown
/// references are left as written.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .and_then(|end| decode_reference(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(|c: char| c == 'x' || c == 'X') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
