//! Generic tagged-tree document model.
//!
//! The codec's only vocabulary: a node with a tag name, ordered children,
//! and optional text content. The dialect carries no attributes.
//!
//! Also implements the dialect's equivalent textual form (a restricted XML
//! subset) so devices posting `application/vnd.syncml.dm+xml` get the same
//! tree the binary path produces.

use std::fmt::Write as _;

use crate::error::{DmError, Result};

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name.
    pub tag: String,
    /// Text content, if any.
    pub text: Option<String>,
    /// Ordered child nodes.
    pub children: Vec<Element>,
}

impl Element {
    /// Create an empty element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Create an element with text content.
    pub fn with_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            text: Some(text.into()),
            children: Vec::new(),
        }
    }

    /// Append a child, returning self for chaining.
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Append a child in place.
    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// First direct child with the given tag.
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Text content of the first direct child with the given tag.
    pub fn child_text(&self, tag: &str) -> Option<&str> {
        self.find(tag).and_then(|c| c.text.as_deref())
    }

    /// Whether a direct child with the given tag exists.
    pub fn has_child(&self, tag: &str) -> bool {
        self.find(tag).is_some()
    }

    /// Strip XML-style namespace qualification from every tag in the tree.
    ///
    /// Handles both `{uri}Tag` (expanded form) and `ns:Tag` (prefixed form)
    /// in one pass, so parsing never has to reason about namespaces.
    pub fn strip_namespaces(&mut self) {
        self.tag = normalize_tag(&self.tag);
        for child in &mut self.children {
            child.strip_namespaces();
        }
    }

    /// Serialize to the dialect's textual form.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        if self.text.is_none() && self.children.is_empty() {
            let _ = write!(out, "<{}/>", self.tag);
            return;
        }
        let _ = write!(out, "<{}>", self.tag);
        if let Some(text) = &self.text {
            escape_into(text, out);
        }
        for child in &self.children {
            child.write_xml(out);
        }
        let _ = write!(out, "</{}>", self.tag);
    }

    /// Parse the dialect's textual form into a tree.
    ///
    /// Accepts the subset the fleet emits: a declaration, elements with
    /// optional attributes (attributes are discarded), text, and entity
    /// references. Anything else is a `Decode` error.
    pub fn from_xml(input: &str) -> Result<Element> {
        let mut parser = XmlReader::new(input);
        parser.skip_prolog()?;
        let root = parser.parse_element()?;
        parser.skip_whitespace();
        if !parser.at_end() {
            return Err(DmError::Decode(
                "trailing content after document element".to_string(),
            ));
        }
        Ok(root)
    }
}

fn normalize_tag(tag: &str) -> String {
    let tag = match tag.rfind('}') {
        Some(idx) => &tag[idx + 1..],
        None => tag,
    };
    match tag.rfind(':') {
        Some(idx) => tag[idx + 1..].to_string(),
        None => tag.to_string(),
    }
}

fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(ch),
        }
    }
}

struct XmlReader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> XmlReader<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn skip_prolog(&mut self) -> Result<()> {
        self.skip_whitespace();
        while self.input[self.pos..].starts_with(b"<?") || self.input[self.pos..].starts_with(b"<!")
        {
            let close = self.find(b">").ok_or_else(|| {
                DmError::Decode("unterminated declaration".to_string())
            })?;
            self.pos = close + 1;
            self.skip_whitespace();
        }
        Ok(())
    }

    fn find(&self, needle: &[u8]) -> Option<usize> {
        self.input[self.pos..]
            .windows(needle.len())
            .position(|w| w == needle)
            .map(|i| self.pos + i)
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(DmError::Decode(format!(
                "expected '{}' at offset {}",
                byte as char, self.pos
            )))
        }
    }

    fn read_name(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':') {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(DmError::Decode(format!(
                "expected tag name at offset {start}"
            )));
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    fn parse_element(&mut self) -> Result<Element> {
        self.expect(b'<')?;
        let tag = self.read_name()?;

        // Attributes are not part of the tree model; scan past them.
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') => {
                    self.pos += 1;
                    self.expect(b'>')?;
                    return Ok(Element::new(tag));
                }
                Some(_) => {
                    let _ = self.read_name()?;
                    self.skip_whitespace();
                    if self.peek() == Some(b'=') {
                        self.pos += 1;
                        self.skip_whitespace();
                        self.skip_attr_value()?;
                    }
                }
                None => {
                    return Err(DmError::Decode(format!("unterminated tag <{tag}")));
                }
            }
        }

        let mut elem = Element::new(tag);
        let mut text = String::new();

        loop {
            match self.peek() {
                Some(b'<') => {
                    if self.input[self.pos..].starts_with(b"</") {
                        self.pos += 2;
                        let close = self.read_name()?;
                        if close != elem.tag {
                            return Err(DmError::Decode(format!(
                                "mismatched close tag: <{}> vs </{}>",
                                elem.tag, close
                            )));
                        }
                        self.skip_whitespace();
                        self.expect(b'>')?;
                        break;
                    }
                    elem.push(self.parse_element()?);
                }
                Some(_) => {
                    let start = self.pos;
                    while self.peek().is_some_and(|b| b != b'<') {
                        self.pos += 1;
                    }
                    let raw = String::from_utf8_lossy(&self.input[start..self.pos]);
                    text.push_str(&unescape(&raw));
                }
                None => {
                    return Err(DmError::Decode(format!(
                        "unterminated element <{}>",
                        elem.tag
                    )));
                }
            }
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            elem.text = Some(trimmed.to_string());
        }
        Ok(elem)
    }

    fn skip_attr_value(&mut self) -> Result<()> {
        let quote = self.peek().ok_or_else(|| {
            DmError::Decode("unterminated attribute".to_string())
        })?;
        if quote != b'"' && quote != b'\'' {
            return Err(DmError::Decode(format!(
                "expected quoted attribute value at offset {}",
                self.pos
            )));
        }
        self.pos += 1;
        while self.peek().is_some_and(|b| b != quote) {
            self.pos += 1;
        }
        self.expect(quote)
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        let replaced = [
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&amp;", '&'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ]
        .iter()
        .find(|(ent, _)| rest.starts_with(ent));
        match replaced {
            Some((ent, ch)) => {
                out.push(*ch);
                rest = &rest[ent.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_find() {
        let elem = Element::new("SyncHdr")
            .child(Element::with_text("SessionID", "42"))
            .child(Element::with_text("MsgID", "1"));

        assert_eq!(elem.child_text("SessionID"), Some("42"));
        assert_eq!(elem.child_text("MsgID"), Some("1"));
        assert!(elem.find("VerDTD").is_none());
    }

    #[test]
    fn test_strip_namespaces() {
        let mut elem = Element::new("{SYNCML:SYNCML1.2}SyncML")
            .child(Element::new("syncml:SyncHdr").child(Element::with_text("MsgID", "1")));

        elem.strip_namespaces();
        assert_eq!(elem.tag, "SyncML");
        assert_eq!(elem.children[0].tag, "SyncHdr");
        assert_eq!(elem.children[0].children[0].tag, "MsgID");
    }

    #[test]
    fn test_xml_roundtrip() {
        let elem = Element::new("SyncML").child(
            Element::new("SyncHdr")
                .child(Element::with_text("VerDTD", "1.2"))
                .child(Element::with_text("SessionID", "7"))
                .child(Element::new("Final")),
        );

        let xml = elem.to_xml();
        let parsed = Element::from_xml(&xml).unwrap();
        assert_eq!(parsed, elem);
    }

    #[test]
    fn test_parse_with_attributes_and_decl() {
        let xml = r#"<?xml version="1.0"?>
            <SyncML xmlns="SYNCML:SYNCML1.2">
              <SyncHdr><MsgID>3</MsgID></SyncHdr>
            </SyncML>"#;

        let parsed = Element::from_xml(xml).unwrap();
        assert_eq!(parsed.tag, "SyncML");
        assert_eq!(parsed.children[0].child_text("MsgID"), Some("3"));
    }

    #[test]
    fn test_parse_escaped_text() {
        let xml = "<Data>a &lt;b&gt; &amp; c</Data>";
        let parsed = Element::from_xml(xml).unwrap();
        assert_eq!(parsed.text.as_deref(), Some("a <b> & c"));

        let back = parsed.to_xml();
        assert!(back.contains("&lt;b&gt; &amp; c"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Element::from_xml("<A><B></A>").is_err());
        assert!(Element::from_xml("<A>").is_err());
        assert!(Element::from_xml("<A/><B/>").is_err());
        assert!(Element::from_xml("no markup").is_err());
    }
}
