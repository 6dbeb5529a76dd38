//! Response builder: typed commands back to a document tree.
//!
//! Assigns CmdID values as a strictly increasing counter starting at 1 per
//! message, and emits header fields with source/target swapped relative to
//! the inbound message. Status refs are supplied by the caller, which knows
//! which command each Status acknowledges.

use super::message::{Command, Item};
use super::{DM_VERSION, DTD_VERSION};
use crate::wbxml::Element;

/// Header fields for an outbound message.
#[derive(Debug, Clone)]
pub struct ResponseHeader {
    /// Session identifier, copied from the inbound message.
    pub session_id: String,
    /// Next outbound MsgID for this session.
    pub msg_id: u32,
    /// Device URI (the inbound message's source).
    pub target: String,
    /// Server identifier (the inbound message's target).
    pub source: String,
}

/// Build a complete response document.
///
/// Commands receive sequential CmdID values in the order given; any ids the
/// caller pre-set are overwritten.
pub fn build_response(
    header: &ResponseHeader,
    mut commands: Vec<Command>,
    is_final: bool,
) -> Element {
    let mut body = Element::new("SyncBody");

    let mut next_id = 0u32;
    for cmd in &mut commands {
        next_id += 1;
        cmd.set_cmd_id(next_id);
        body.push(command_element(cmd));
    }

    if is_final {
        body.push(Element::new("Final"));
    }

    Element::new("SyncML")
        .child(header_element(header))
        .child(body)
}

fn header_element(header: &ResponseHeader) -> Element {
    Element::new("SyncHdr")
        .child(Element::with_text("VerDTD", DTD_VERSION))
        .child(Element::with_text("VerProto", DM_VERSION))
        .child(Element::with_text("SessionID", &header.session_id))
        .child(Element::with_text("MsgID", header.msg_id.to_string()))
        .child(Element::new("Target").child(Element::with_text("LocURI", &header.target)))
        .child(Element::new("Source").child(Element::with_text("LocURI", &header.source)))
}

fn command_element(cmd: &Command) -> Element {
    let mut elem = Element::new(cmd.name());
    elem.push(Element::with_text("CmdID", cmd.cmd_id().to_string()));

    match cmd {
        Command::Alert { code, items, .. } => {
            elem.push(Element::with_text("Data", code.to_string()));
            for item in items {
                elem.push(item_element(item));
            }
        }
        Command::Get { items, .. }
        | Command::Replace { items, .. }
        | Command::Exec { items, .. } => {
            for item in items {
                elem.push(item_element(item));
            }
        }
        Command::Status {
            msg_ref,
            cmd_ref,
            cmd,
            code,
            target_ref,
            source_ref,
            chal,
            items,
            ..
        } => {
            elem.push(Element::with_text("MsgRef", msg_ref.to_string()));
            elem.push(Element::with_text("CmdRef", cmd_ref.to_string()));
            elem.push(Element::with_text("Cmd", cmd));
            if let Some(target_ref) = target_ref {
                elem.push(Element::with_text("TargetRef", target_ref));
            }
            if let Some(source_ref) = source_ref {
                elem.push(Element::with_text("SourceRef", source_ref));
            }
            if let Some(chal) = chal {
                elem.push(
                    Element::new("Chal").child(
                        Element::new("Meta")
                            .child(Element::with_text("Format", "b64"))
                            .child(Element::with_text("Type", "syncml:auth-MAC"))
                            .child(Element::with_text("NextNonce", &chal.next_nonce)),
                    ),
                );
            }
            elem.push(Element::with_text("Data", code.to_string()));
            for item in items {
                elem.push(item_element(item));
            }
        }
        Command::Results {
            msg_ref,
            cmd_ref,
            items,
            ..
        } => {
            elem.push(Element::with_text("MsgRef", msg_ref.to_string()));
            elem.push(Element::with_text("CmdRef", cmd_ref.to_string()));
            for item in items {
                elem.push(item_element(item));
            }
        }
    }

    elem
}

fn item_element(item: &Item) -> Element {
    let mut elem = Element::new("Item");
    if let Some(target) = &item.target {
        elem.push(Element::new("Target").child(Element::with_text("LocURI", target)));
    }
    if let Some(source) = &item.source {
        elem.push(Element::new("Source").child(Element::with_text("LocURI", source)));
    }
    if !item.meta.is_empty() {
        let mut meta = Element::new("Meta");
        for (key, value) in &item.meta {
            meta.push(Element::with_text(key.clone(), value.clone()));
        }
        elem.push(meta);
    }
    if let Some(data) = &item.data {
        elem.push(Element::with_text("Data", data));
    }
    elem
}
