//! WBXML encoder/decoder.
//!
//! Pure bidirectional transform between the binary wire encoding and the
//! [`Element`] tree, driven by a supplied [`TokenTable`]. The decoder is
//! strict: a malformed length prefix, a reference to an unknown token, or a
//! truncated stream is a `Decode` error, never a partial tree. The encoder
//! must pick the representation a conformant encoder would, because the
//! fleet's decoder is fixed and non-lenient.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::element::Element;
use super::mbuint::{read_mbuint, write_mbuint};
use super::tokens::{
    TokenTable, CHARSET_UTF8, END, LITERAL, OPAQUE, STR_I, STR_T, SWITCH_PAGE,
    SYNCML_1_2_PUBLIC_ID, TAG_HAS_ATTRS, TAG_HAS_CONTENT, TAG_MASK, WBXML_VERSION,
};
use crate::error::{DmError, Result};

/// Decode a WBXML document into an element tree.
pub fn decode(data: &[u8], table: &TokenTable) -> Result<Element> {
    Decoder::new(data, table).decode()
}

/// Encode an element tree as a WBXML document.
pub fn encode(root: &Element, table: &TokenTable) -> Vec<u8> {
    Encoder::new(table).encode(root)
}

/// Whether a request body looks like WBXML rather than the textual form.
pub fn looks_binary(data: &[u8]) -> bool {
    matches!(data.first(), Some(0x01..=0x03))
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    string_table: &'a [u8],
    page: u8,
    table: &'a TokenTable,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8], table: &'a TokenTable) -> Self {
        Self {
            data,
            pos: 0,
            string_table: &[],
            page: 0,
            table,
        }
    }

    fn read_byte(&mut self) -> Result<u8> {
        let b = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| DmError::Decode(format!("unexpected end of data at {}", self.pos)))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_mbuint(&mut self) -> Result<u32> {
        let (value, consumed) = read_mbuint(&self.data[self.pos..])?;
        self.pos += consumed;
        Ok(value)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&e| e <= self.data.len())
            .ok_or_else(|| {
                DmError::Decode(format!("length {len} exceeds remaining data at {}", self.pos))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read a null-terminated inline string.
    fn read_inline_string(&mut self) -> Result<String> {
        let rest = &self.data[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| DmError::Decode("unterminated inline string".to_string()))?;
        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|e| DmError::Decode(format!("invalid UTF-8 in string: {e}")))?
            .to_string();
        self.pos += nul + 1;
        Ok(s)
    }

    fn table_string(&self, offset: u32) -> Result<String> {
        let offset = offset as usize;
        if offset > self.string_table.len() {
            return Err(DmError::Decode(format!(
                "string table offset {offset} out of range"
            )));
        }
        let rest = &self.string_table[offset..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        std::str::from_utf8(&rest[..end])
            .map(str::to_string)
            .map_err(|e| DmError::Decode(format!("invalid UTF-8 in string table: {e}")))
    }

    fn decode(mut self) -> Result<Element> {
        // Header: version, public id, charset, string table.
        let _version = self.read_byte()?;
        let public_id = self.read_mbuint()?;
        if public_id == 0 {
            let _public_id_index = self.read_mbuint()?;
        }
        let _charset = self.read_mbuint()?;

        let table_len = self.read_mbuint()? as usize;
        self.string_table = self.take(table_len)?;

        let root = self
            .parse_element()?
            .ok_or_else(|| DmError::Decode("document has no root element".to_string()))?;
        Ok(root)
    }

    fn parse_element(&mut self) -> Result<Option<Element>> {
        let mut token = self.read_byte()?;
        while token == SWITCH_PAGE {
            self.switch_page()?;
            token = self.read_byte()?;
        }

        if token == END {
            return Ok(None);
        }

        let has_content = token & TAG_HAS_CONTENT != 0;
        let has_attrs = token & TAG_HAS_ATTRS != 0;

        let tag = if token & TAG_MASK == LITERAL {
            let offset = self.read_mbuint()?;
            self.table_string(offset)?
        } else {
            self.table
                .tag_name(self.page, token)
                .ok_or_else(|| {
                    DmError::Decode(format!(
                        "unknown tag token 0x{:02X} in page 0x{:02X}",
                        token & TAG_MASK,
                        self.page
                    ))
                })?
                .to_string()
        };

        let mut elem = Element::new(tag);

        // The dialect carries no attributes; tolerate and discard any.
        if has_attrs {
            self.skip_attributes()?;
        }

        if has_content {
            self.parse_content(&mut elem)?;
        }

        Ok(Some(elem))
    }

    fn switch_page(&mut self) -> Result<()> {
        let page = self.read_byte()?;
        if !self.table.has_page(page) {
            return Err(DmError::Decode(format!("unknown code page 0x{page:02X}")));
        }
        self.page = page;
        Ok(())
    }

    fn skip_attributes(&mut self) -> Result<()> {
        loop {
            if self.read_byte()? == END {
                return Ok(());
            }
        }
    }

    fn parse_content(&mut self, elem: &mut Element) -> Result<()> {
        let mut text = String::new();

        loop {
            let token = self.read_byte()?;
            match token {
                END => break,
                SWITCH_PAGE => self.switch_page()?,
                STR_I => text.push_str(&self.read_inline_string()?),
                STR_T => {
                    let offset = self.read_mbuint()?;
                    text.push_str(&self.table_string(offset)?);
                }
                OPAQUE => {
                    let len = self.read_mbuint()? as usize;
                    let data = self.take(len)?;
                    // Text where possible; base64 keeps binary payloads
                    // representable in the tree.
                    match std::str::from_utf8(data) {
                        Ok(s) => text.push_str(s),
                        Err(_) => text.push_str(&BASE64.encode(data)),
                    }
                }
                _ => {
                    // A tag token: back up and parse as a child element.
                    self.pos -= 1;
                    if let Some(child) = self.parse_element()? {
                        elem.push(child);
                    }
                }
            }
        }

        if !text.is_empty() {
            elem.text = Some(text);
        }
        Ok(())
    }
}

struct Encoder<'a> {
    body: Vec<u8>,
    string_table: Vec<u8>,
    string_index: HashMap<String, u32>,
    page: u8,
    table: &'a TokenTable,
}

impl<'a> Encoder<'a> {
    fn new(table: &'a TokenTable) -> Self {
        Self {
            body: Vec::new(),
            string_table: Vec::new(),
            string_index: HashMap::new(),
            page: 0,
            table,
        }
    }

    fn encode(mut self, root: &Element) -> Vec<u8> {
        // Tags outside every code page are emitted as LITERAL references,
        // so their names must be in the string table up front.
        self.collect_literals(root);
        self.encode_element(root);

        let mut out = Vec::with_capacity(self.body.len() + self.string_table.len() + 8);
        out.push(WBXML_VERSION);
        write_mbuint(&mut out, SYNCML_1_2_PUBLIC_ID);
        write_mbuint(&mut out, CHARSET_UTF8);
        write_mbuint(&mut out, self.string_table.len() as u32);
        out.extend_from_slice(&self.string_table);
        out.extend_from_slice(&self.body);
        out
    }

    fn collect_literals(&mut self, elem: &Element) {
        if self.table.tag_token(&elem.tag).is_none() && !self.string_index.contains_key(&elem.tag) {
            let offset = self.string_table.len() as u32;
            self.string_index.insert(elem.tag.clone(), offset);
            self.string_table.extend_from_slice(elem.tag.as_bytes());
            self.string_table.push(0);
        }
        for child in &elem.children {
            self.collect_literals(child);
        }
    }

    fn switch_page(&mut self, page: u8) {
        if page != self.page {
            self.body.push(SWITCH_PAGE);
            self.body.push(page);
            self.page = page;
        }
    }

    fn encode_element(&mut self, elem: &Element) {
        let has_content = elem.text.is_some() || !elem.children.is_empty();

        match self.table.tag_token(&elem.tag) {
            Some((page, token)) => {
                self.switch_page(page);
                let mut token = token;
                if has_content {
                    token |= TAG_HAS_CONTENT;
                }
                self.body.push(token);
            }
            None => {
                self.switch_page(0);
                let mut token = LITERAL;
                if has_content {
                    token |= TAG_HAS_CONTENT;
                }
                self.body.push(token);
                let offset = self.string_index.get(&elem.tag).copied().unwrap_or(0);
                write_mbuint(&mut self.body, offset);
            }
        }

        if has_content {
            if let Some(text) = &elem.text {
                self.write_inline_string(text);
            }
            for child in &elem.children {
                self.encode_element(child);
            }
            self.body.push(END);
        }
    }

    fn write_inline_string(&mut self, s: &str) {
        self.body.push(STR_I);
        self.body.extend_from_slice(s.as_bytes());
        self.body.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TokenTable {
        TokenTable::syncml_dm()
    }

    fn sample_tree() -> Element {
        Element::new("SyncML")
            .child(
                Element::new("SyncHdr")
                    .child(Element::with_text("VerDTD", "1.2"))
                    .child(Element::with_text("VerProto", "DM/1.2"))
                    .child(Element::with_text("SessionID", "17"))
                    .child(Element::with_text("MsgID", "1"))
                    .child(Element::new("Source").child(Element::with_text("LocURI", "IMEI:0042")))
                    .child(Element::new("Target").child(Element::with_text(
                        "LocURI",
                        "https://update.example.net/dm",
                    ))),
            )
            .child(
                Element::new("SyncBody")
                    .child(
                        Element::new("Alert")
                            .child(Element::with_text("CmdID", "1"))
                            .child(Element::with_text("Data", "1201")),
                    )
                    .child(Element::new("Final")),
            )
    }

    #[test]
    fn test_roundtrip_sample_message() {
        let tree = sample_tree();
        let bytes = encode(&tree, &table());
        let decoded = decode(&bytes, &table()).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode(&Element::new("SyncML"), &table());
        assert_eq!(bytes[0], WBXML_VERSION);
        // Public id 0x1201, mb-uint encoded.
        assert_eq!(&bytes[1..3], &[0xA4, 0x01]);
        // Charset 106, empty string table, bare SyncML token.
        assert_eq!(&bytes[3..6], &[106, 0, 0x2D]);
    }

    #[test]
    fn test_code_page_switch_roundtrip() {
        // Meta content lives on page 1; siblings return to page 0.
        let tree = Element::new("SyncML").child(
            Element::new("SyncBody").child(
                Element::new("Status")
                    .child(Element::with_text("CmdID", "1"))
                    .child(
                        Element::new("Chal").child(
                            Element::new("Meta")
                                .child(Element::with_text("Format", "b64"))
                                .child(Element::with_text("NextNonce", "bm9uY2U=")),
                        ),
                    )
                    .child(Element::with_text("Data", "407")),
            ),
        );

        let bytes = encode(&tree, &table());
        let decoded = decode(&bytes, &table()).unwrap();
        assert_eq!(decoded, tree);

        // The page-1 tags survived, and the page-0 sibling after them did too.
        let status = &decoded.children[0].children[0];
        let meta = status.find("Chal").unwrap().find("Meta").unwrap();
        assert_eq!(meta.child_text("NextNonce"), Some("bm9uY2U="));
        assert_eq!(status.child_text("Data"), Some("407"));
    }

    #[test]
    fn test_literal_tag_roundtrip() {
        let tree = Element::new("SyncML")
            .child(Element::with_text("VendorExtension", "x"));

        let bytes = encode(&tree, &table());
        let decoded = decode(&bytes, &table()).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_truncated_prefixes_never_yield_tree() {
        let bytes = encode(&sample_tree(), &table());
        for len in 0..bytes.len() {
            assert!(
                decode(&bytes[..len], &table()).is_err(),
                "prefix of length {len} decoded to a tree"
            );
        }
    }

    #[test]
    fn test_unknown_token_rejected() {
        // Valid header, then token 0x3F which no page defines.
        let mut bytes = vec![WBXML_VERSION];
        write_mbuint(&mut bytes, SYNCML_1_2_PUBLIC_ID);
        write_mbuint(&mut bytes, CHARSET_UTF8);
        write_mbuint(&mut bytes, 0);
        bytes.push(0x3F);
        assert!(matches!(
            decode(&bytes, &table()),
            Err(DmError::Decode(_))
        ));
    }

    #[test]
    fn test_unknown_code_page_rejected() {
        let mut bytes = vec![WBXML_VERSION];
        write_mbuint(&mut bytes, SYNCML_1_2_PUBLIC_ID);
        write_mbuint(&mut bytes, CHARSET_UTF8);
        write_mbuint(&mut bytes, 0);
        bytes.extend_from_slice(&[SWITCH_PAGE, 0x42, 0x2D]);
        assert!(decode(&bytes, &table()).is_err());
    }

    #[test]
    fn test_oversized_opaque_length_rejected() {
        let mut bytes = vec![WBXML_VERSION];
        write_mbuint(&mut bytes, SYNCML_1_2_PUBLIC_ID);
        write_mbuint(&mut bytes, CHARSET_UTF8);
        write_mbuint(&mut bytes, 0);
        // Data element with OPAQUE claiming far more bytes than remain.
        bytes.push(0x0F | TAG_HAS_CONTENT);
        bytes.push(OPAQUE);
        write_mbuint(&mut bytes, 1_000_000);
        bytes.extend_from_slice(b"xy");
        assert!(matches!(
            decode(&bytes, &table()),
            Err(DmError::Decode(_))
        ));
    }

    #[test]
    fn test_opaque_text_decodes_as_text() {
        let mut bytes = vec![WBXML_VERSION];
        write_mbuint(&mut bytes, SYNCML_1_2_PUBLIC_ID);
        write_mbuint(&mut bytes, CHARSET_UTF8);
        write_mbuint(&mut bytes, 0);
        bytes.push(0x0F | TAG_HAS_CONTENT); // Data
        bytes.push(OPAQUE);
        write_mbuint(&mut bytes, 4);
        bytes.extend_from_slice(b"1201");
        bytes.push(END);

        let decoded = decode(&bytes, &table()).unwrap();
        assert_eq!(decoded.tag, "Data");
        assert_eq!(decoded.text.as_deref(), Some("1201"));
    }

    #[test]
    fn test_looks_binary() {
        assert!(looks_binary(&[0x02, 0xA4, 0x01]));
        assert!(looks_binary(&[0x03]));
        assert!(!looks_binary(b"<SyncML/>"));
        assert!(!looks_binary(&[]));
    }
}
