//! Tolerant XML-to-tree parsing.
//!
//! Feeds in the wild are frequently sloppy: stray end tags, unclosed elements
//! and undeclared entities are common. The tree builder here recovers from
//! those where it can and only fails on input the tokenizer cannot read.

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML parse error at position {position}: {message}")]
    Syntax { position: u64, message: String },
}

/// A single element. Attributes are kept apart from child elements so that
/// values living in attributes (an Atom `link`'s `href`) never collide with
/// values living in text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    /// Qualified name as written, e.g. `content:encoded`.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Concatenated text and CDATA directly inside this element.
    pub text: String,
    /// Text of this element and all of its descendants, in document order.
    pub inner_text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn from_start(start: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

        let mut attrs = start.attributes();
        attrs.with_checks(false);
        let attributes = attrs
            .filter_map(|attr| attr.ok())
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = unescape_lenient(&String::from_utf8_lossy(&attr.value));
                (key, value)
            })
            .collect();

        Self {
            name,
            attributes,
            ..Default::default()
        }
    }

    fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
        self.inner_text.push_str(text);
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Trimmed text content, or `None` when the element holds no text.
    pub fn text(&self) -> Option<&str> {
        let text = self.text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Like [`XmlNode::text`], but includes text nested in child markup
    /// (an Atom `type="xhtml"` title wraps its text in a `div`).
    pub fn inner_text(&self) -> Option<&str> {
        let text = self.inner_text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given name, in document order. One matching
    /// child yields a one-element sequence, never a bare node.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// A parsed document: every top-level element in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlDocument {
    pub roots: Vec<XmlNode>,
}

impl XmlDocument {
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);

        let mut reader = Reader::from_str(xml);
        reader.config_mut().check_end_names = false;

        let mut roots = Vec::new();
        let mut stack: Vec<XmlNode> = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => stack.push(XmlNode::from_start(&e)),
                Ok(Event::Empty(e)) => attach(&mut stack, &mut roots, XmlNode::from_start(&e)),
                Ok(Event::End(e)) => {
                    let name = e.name();
                    let name = String::from_utf8_lossy(name.as_ref());
                    // A stray end tag with no open counterpart is dropped;
                    // one matching an outer element closes everything inside it.
                    if let Some(depth) = stack.iter().rposition(|n| n.name == name) {
                        while stack.len() > depth {
                            close(&mut stack, &mut roots);
                        }
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some(node) = stack.last_mut() {
                        node.push_text(&unescape_lenient(&String::from_utf8_lossy(&e)));
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(node) = stack.last_mut() {
                        node.push_text(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(XmlError::Syntax {
                        position: reader.buffer_position() as u64,
                        message: e.to_string(),
                    })
                }
                _ => {}
            }
        }

        // Unclosed elements at end of input are closed implicitly.
        while !stack.is_empty() {
            close(&mut stack, &mut roots);
        }

        Ok(Self { roots })
    }

    pub fn root(&self, name: &str) -> Option<&XmlNode> {
        self.roots.iter().find(|n| n.name == name)
    }
}

fn close(stack: &mut Vec<XmlNode>, roots: &mut Vec<XmlNode>) {
    if let Some(node) = stack.pop() {
        attach(stack, roots, node);
    }
}

fn attach(stack: &mut [XmlNode], roots: &mut Vec<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => {
            parent.inner_text.push_str(&node.inner_text);
            parent.children.push(node);
        }
        None => roots.push(node),
    }
}

/// Resolve the predefined XML entities and numeric character references.
/// Anything else, such as an HTML `&nbsp;` the feed never declared, stays
/// as written without affecting its neighbours.
fn unescape_lenient(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let resolved = tail[1..]
            .find(';')
            .filter(|&end| end <= MAX_REFERENCE_LEN)
            .and_then(|end| resolve_reference(&tail[1..=end]).map(|value| (value, end + 2)));

        match resolved {
            Some((value, consumed)) => {
                out.push_str(&value);
                rest = &tail[consumed..];
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

const MAX_REFERENCE_LEN: usize = 32;

fn resolve_reference(name: &str) -> Option<String> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_predefined_entity(name).map(str::to_string)
}
