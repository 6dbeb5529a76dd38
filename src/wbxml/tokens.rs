//! WBXML token tables for the SyncML 1.2 / OMA DM dialect.
//!
//! Tag tokens are partitioned into numbered code pages. Page 0x00 carries the
//! SyncML representation protocol tags, page 0x01 the MetInf tags. Both
//! directions are compile-time maps so the codec does no allocation on the
//! lookup path.

use phf::phf_map;

// Global tokens, valid in every code page.

/// Switch the active code page; followed by the page number byte.
pub const SWITCH_PAGE: u8 = 0x00;
/// Close the current element (or attribute list).
pub const END: u8 = 0x01;
/// Inline null-terminated UTF-8 string.
pub const STR_I: u8 = 0x03;
/// Tag whose name lives in the string table.
pub const LITERAL: u8 = 0x04;
/// String table reference; followed by a byte offset.
pub const STR_T: u8 = 0x83;
/// Length-prefixed opaque binary content.
pub const OPAQUE: u8 = 0xC3;

/// Tag token flag: element has content.
pub const TAG_HAS_CONTENT: u8 = 0x40;
/// Tag token flag: element has attributes.
pub const TAG_HAS_ATTRS: u8 = 0x80;
/// Mask selecting the tag identity bits.
pub const TAG_MASK: u8 = 0x3F;

/// WBXML version byte the fleet's encoder emits (1.3).
pub const WBXML_VERSION: u8 = 0x03;
/// Public identifier for -//SYNCML//DTD SyncML 1.2//EN.
pub const SYNCML_1_2_PUBLIC_ID: u32 = 0x1201;
/// IANA MIBenum for UTF-8.
pub const CHARSET_UTF8: u32 = 106;

/// SyncML tag tokens (code page 0x00), token to name.
static SYNCML_TAGS: phf::Map<u8, &'static str> = phf_map! {
    0x05u8 => "Add",
    0x06u8 => "Alert",
    0x07u8 => "Archive",
    0x08u8 => "Atomic",
    0x09u8 => "Chal",
    0x0Au8 => "Cmd",
    0x0Bu8 => "CmdID",
    0x0Cu8 => "CmdRef",
    0x0Du8 => "Copy",
    0x0Eu8 => "Cred",
    0x0Fu8 => "Data",
    0x10u8 => "Delete",
    0x11u8 => "Exec",
    0x12u8 => "Final",
    0x13u8 => "Get",
    0x14u8 => "Item",
    0x15u8 => "Lang",
    0x16u8 => "LocName",
    0x17u8 => "LocURI",
    0x18u8 => "Map",
    0x19u8 => "MapItem",
    0x1Au8 => "Meta",
    0x1Bu8 => "MsgID",
    0x1Cu8 => "MsgRef",
    0x1Du8 => "NoResp",
    0x1Eu8 => "NoResults",
    0x1Fu8 => "Put",
    0x20u8 => "Replace",
    0x21u8 => "RespURI",
    0x22u8 => "Results",
    0x23u8 => "Search",
    0x24u8 => "Sequence",
    0x25u8 => "SessionID",
    0x26u8 => "SftDel",
    0x27u8 => "Source",
    0x28u8 => "SourceRef",
    0x29u8 => "Status",
    0x2Au8 => "Sync",
    0x2Bu8 => "SyncBody",
    0x2Cu8 => "SyncHdr",
    0x2Du8 => "SyncML",
    0x2Eu8 => "Target",
    0x2Fu8 => "TargetRef",
    0x31u8 => "VerDTD",
    0x32u8 => "VerProto",
    0x33u8 => "NumberOfChanges",
    0x34u8 => "MoreData",
    0x35u8 => "Field",
    0x36u8 => "Filter",
    0x37u8 => "Record",
    0x38u8 => "FilterType",
    0x39u8 => "SourceParent",
    0x3Au8 => "TargetParent",
    0x3Bu8 => "Move",
    0x3Cu8 => "Correlator",
};

/// SyncML tag tokens, name to token.
static SYNCML_TAGS_REV: phf::Map<&'static str, u8> = phf_map! {
    "Add" => 0x05,
    "Alert" => 0x06,
    "Archive" => 0x07,
    "Atomic" => 0x08,
    "Chal" => 0x09,
    "Cmd" => 0x0A,
    "CmdID" => 0x0B,
    "CmdRef" => 0x0C,
    "Copy" => 0x0D,
    "Cred" => 0x0E,
    "Data" => 0x0F,
    "Delete" => 0x10,
    "Exec" => 0x11,
    "Final" => 0x12,
    "Get" => 0x13,
    "Item" => 0x14,
    "Lang" => 0x15,
    "LocName" => 0x16,
    "LocURI" => 0x17,
    "Map" => 0x18,
    "MapItem" => 0x19,
    "Meta" => 0x1A,
    "MsgID" => 0x1B,
    "MsgRef" => 0x1C,
    "NoResp" => 0x1D,
    "NoResults" => 0x1E,
    "Put" => 0x1F,
    "Replace" => 0x20,
    "RespURI" => 0x21,
    "Results" => 0x22,
    "Search" => 0x23,
    "Sequence" => 0x24,
    "SessionID" => 0x25,
    "SftDel" => 0x26,
    "Source" => 0x27,
    "SourceRef" => 0x28,
    "Status" => 0x29,
    "Sync" => 0x2A,
    "SyncBody" => 0x2B,
    "SyncHdr" => 0x2C,
    "SyncML" => 0x2D,
    "Target" => 0x2E,
    "TargetRef" => 0x2F,
    "VerDTD" => 0x31,
    "VerProto" => 0x32,
    "NumberOfChanges" => 0x33,
    "MoreData" => 0x34,
    "Field" => 0x35,
    "Filter" => 0x36,
    "Record" => 0x37,
    "FilterType" => 0x38,
    "SourceParent" => 0x39,
    "TargetParent" => 0x3A,
    "Move" => 0x3B,
    "Correlator" => 0x3C,
};

/// MetInf tag tokens (code page 0x01), token to name.
static METINF_TAGS: phf::Map<u8, &'static str> = phf_map! {
    0x05u8 => "Anchor",
    0x06u8 => "EMI",
    0x07u8 => "Format",
    0x08u8 => "FreeID",
    0x09u8 => "FreeMem",
    0x0Au8 => "Last",
    0x0Bu8 => "Mark",
    0x0Cu8 => "MaxMsgSize",
    0x0Du8 => "Mem",
    0x0Eu8 => "MetInf",
    0x0Fu8 => "Next",
    0x10u8 => "NextNonce",
    0x11u8 => "SharedMem",
    0x12u8 => "Size",
    0x13u8 => "Type",
    0x14u8 => "Version",
    0x15u8 => "MaxObjSize",
    0x16u8 => "FieldLevel",
};

/// MetInf tag tokens, name to token.
static METINF_TAGS_REV: phf::Map<&'static str, u8> = phf_map! {
    "Anchor" => 0x05,
    "EMI" => 0x06,
    "Format" => 0x07,
    "FreeID" => 0x08,
    "FreeMem" => 0x09,
    "Last" => 0x0A,
    "Mark" => 0x0B,
    "MaxMsgSize" => 0x0C,
    "Mem" => 0x0D,
    "MetInf" => 0x0E,
    "Next" => 0x0F,
    "NextNonce" => 0x10,
    "SharedMem" => 0x11,
    "Size" => 0x12,
    "Type" => 0x13,
    "Version" => 0x14,
    "MaxObjSize" => 0x15,
    "FieldLevel" => 0x16,
};

/// One numbered partition of the token table.
#[derive(Debug, Clone, Copy)]
pub struct CodePage {
    /// Page number as carried on the wire after SWITCH_PAGE.
    pub number: u8,
    tags: &'static phf::Map<u8, &'static str>,
    rev: &'static phf::Map<&'static str, u8>,
}

/// Static mapping between tag identifiers and textual names, partitioned
/// into code pages. Supplied to the codec; carries no protocol knowledge.
#[derive(Debug, Clone, Copy)]
pub struct TokenTable {
    pages: &'static [CodePage],
}

static SYNCML_DM_PAGES: &[CodePage] = &[
    CodePage {
        number: 0x00,
        tags: &SYNCML_TAGS,
        rev: &SYNCML_TAGS_REV,
    },
    CodePage {
        number: 0x01,
        tags: &METINF_TAGS,
        rev: &METINF_TAGS_REV,
    },
];

impl TokenTable {
    /// The SyncML 1.2 / OMA DM table the device fleet speaks.
    pub const fn syncml_dm() -> Self {
        Self {
            pages: SYNCML_DM_PAGES,
        }
    }

    /// Look up the tag name for a token in the given code page.
    pub fn tag_name(&self, page: u8, token: u8) -> Option<&'static str> {
        self.pages
            .iter()
            .find(|p| p.number == page)
            .and_then(|p| p.tags.get(&(token & TAG_MASK)).copied())
    }

    /// Look up the (page, token) pair for a tag name, searching pages in
    /// order so encoding always picks the lowest page that knows the tag.
    pub fn tag_token(&self, name: &str) -> Option<(u8, u8)> {
        self.pages
            .iter()
            .find_map(|p| p.rev.get(name).map(|&t| (p.number, t)))
    }

    /// Whether the given page number exists in this table.
    pub fn has_page(&self, page: u8) -> bool {
        self.pages.iter().any(|p| p.number == page)
    }
}

impl Default for TokenTable {
    fn default() -> Self {
        Self::syncml_dm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_zero_lookup() {
        let table = TokenTable::syncml_dm();
        assert_eq!(table.tag_name(0x00, 0x2D), Some("SyncML"));
        assert_eq!(table.tag_token("SyncML"), Some((0x00, 0x2D)));
    }

    #[test]
    fn test_page_one_lookup() {
        let table = TokenTable::syncml_dm();
        assert_eq!(table.tag_name(0x01, 0x10), Some("NextNonce"));
        assert_eq!(table.tag_token("NextNonce"), Some((0x01, 0x10)));
    }

    #[test]
    fn test_content_flag_masked() {
        let table = TokenTable::syncml_dm();
        // 0x6D = SyncML | TAG_HAS_CONTENT
        assert_eq!(table.tag_name(0x00, 0x6D), Some("SyncML"));
    }

    #[test]
    fn test_unknown_token() {
        let table = TokenTable::syncml_dm();
        assert_eq!(table.tag_name(0x00, 0x3F), None);
        assert_eq!(table.tag_name(0x07, 0x05), None);
        assert_eq!(table.tag_token("NotATag"), None);
    }

    #[test]
    fn test_tables_are_inverse() {
        let table = TokenTable::syncml_dm();
        for (&token, &name) in SYNCML_TAGS.entries() {
            assert_eq!(table.tag_token(name), Some((0x00, token)), "{name}");
        }
        for (&token, &name) in METINF_TAGS.entries() {
            assert_eq!(table.tag_token(name), Some((0x01, token)), "{name}");
        }
    }
}
