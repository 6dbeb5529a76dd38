//! Message parser: element tree to typed [`Message`].
//!
//! The tree arrives from the WBXML codec or the textual form reader. One
//! namespace-normalization pass runs up front; after that, parsing walks
//! children in document order. Unknown top-level body elements are ignored
//! with a warning unless they carry a CmdID, in which case they are recorded
//! for a "not implemented" Status.

use std::collections::HashSet;

use tracing::warn;

use super::message::{Chal, Command, Credential, Item, Message, UnknownCommand};
use crate::error::{DmError, Result};
use crate::wbxml::Element;

/// Parse a document tree into a message.
pub fn parse(mut root: Element) -> Result<Message> {
    root.strip_namespaces();

    if root.tag != "SyncML" {
        return Err(DmError::Protocol(format!(
            "document element is <{}>, expected <SyncML>",
            root.tag
        )));
    }

    let hdr = root
        .find("SyncHdr")
        .ok_or_else(|| DmError::Protocol("message has no SyncHdr".to_string()))?;
    let mut msg = parse_header(hdr)?;

    let body = root
        .find("SyncBody")
        .ok_or_else(|| DmError::Protocol("message has no SyncBody".to_string()))?;
    parse_body(body, &mut msg)?;

    Ok(msg)
}

fn parse_header(hdr: &Element) -> Result<Message> {
    let session_id = hdr
        .child_text("SessionID")
        .ok_or_else(|| DmError::Protocol("header has no SessionID".to_string()))?;
    let msg_id = parse_number(
        hdr.child_text("MsgID")
            .ok_or_else(|| DmError::Protocol("header has no MsgID".to_string()))?,
        "MsgID",
    )?;
    if msg_id == 0 {
        return Err(DmError::Protocol("MsgID must be positive".to_string()));
    }

    let mut msg = Message::new(session_id, msg_id);

    if let Some(ver) = hdr.child_text("VerDTD") {
        msg.ver_dtd = ver.to_string();
    }
    if let Some(ver) = hdr.child_text("VerProto") {
        msg.ver_proto = ver.to_string();
    }
    msg.source = loc_uri(hdr.find("Source")).unwrap_or_default();
    msg.target = loc_uri(hdr.find("Target")).unwrap_or_default();

    if let Some(cred) = hdr.find("Cred") {
        let meta = cred.find("Meta");
        msg.credential = Some(Credential {
            auth_type: meta
                .and_then(|m| m.child_text("Type"))
                .unwrap_or_default()
                .to_string(),
            format: meta
                .and_then(|m| m.child_text("Format"))
                .map(str::to_string),
            data: cred.child_text("Data").unwrap_or_default().to_string(),
        });
    }

    if let Some(meta) = hdr.find("Meta") {
        msg.meta = parse_meta(meta);
    }

    Ok(msg)
}

fn parse_body(body: &Element, msg: &mut Message) -> Result<()> {
    let mut seen_ids: HashSet<u32> = HashSet::new();

    for child in &body.children {
        if child.tag == "Final" {
            msg.is_final = true;
            continue;
        }

        let cmd = match child.tag.as_str() {
            "Alert" => Some(Command::Alert {
                cmd_id: require_cmd_id(child)?,
                code: child
                    .child_text("Data")
                    .map(|d| parse_number(d, "Alert Data"))
                    .transpose()?
                    .unwrap_or(0),
                items: parse_items(child),
            }),
            "Get" => Some(Command::Get {
                cmd_id: require_cmd_id(child)?,
                items: parse_items(child),
            }),
            "Replace" => Some(Command::Replace {
                cmd_id: require_cmd_id(child)?,
                items: parse_items(child),
            }),
            "Exec" => Some(Command::Exec {
                cmd_id: require_cmd_id(child)?,
                items: parse_items(child),
            }),
            "Status" => Some(parse_status(child)?),
            "Results" => Some(Command::Results {
                cmd_id: require_cmd_id(child)?,
                msg_ref: ref_number(child, "MsgRef")?,
                cmd_ref: ref_number(child, "CmdRef")?,
                items: parse_items(child),
            }),
            _ => None,
        };

        match cmd {
            Some(cmd) => {
                if !seen_ids.insert(cmd.cmd_id()) {
                    return Err(DmError::Protocol(format!(
                        "duplicate CmdID {} in message {}",
                        cmd.cmd_id(),
                        msg.msg_id
                    )));
                }
                msg.commands.push(cmd);
            }
            None => {
                let cmd_id = child
                    .child_text("CmdID")
                    .and_then(|t| t.parse::<u32>().ok());
                if let Some(id) = cmd_id {
                    // Looks like a command we do not implement; Status 501.
                    msg.unrecognized.push(UnknownCommand {
                        name: child.tag.clone(),
                        cmd_id: Some(id),
                    });
                } else {
                    warn!(tag = %child.tag, "ignoring unknown body element");
                }
            }
        }
    }

    Ok(())
}

fn parse_status(elem: &Element) -> Result<Command> {
    let chal = elem.find("Chal").and_then(|chal| {
        chal.find("Meta")
            .and_then(|m| m.child_text("NextNonce"))
            .map(|nonce| Chal {
                next_nonce: nonce.to_string(),
            })
    });

    Ok(Command::Status {
        cmd_id: require_cmd_id(elem)?,
        msg_ref: ref_number(elem, "MsgRef")?,
        cmd_ref: ref_number(elem, "CmdRef")?,
        cmd: elem.child_text("Cmd").unwrap_or_default().to_string(),
        code: elem
            .child_text("Data")
            .map(|d| parse_number(d, "Status Data"))
            .transpose()?
            .unwrap_or(0),
        target_ref: elem.child_text("TargetRef").map(str::to_string),
        source_ref: elem.child_text("SourceRef").map(str::to_string),
        chal,
        items: parse_items(elem),
    })
}

fn parse_items(elem: &Element) -> Vec<Item> {
    elem.children
        .iter()
        .filter(|c| c.tag == "Item")
        .map(|item| Item {
            target: loc_uri(item.find("Target")),
            source: loc_uri(item.find("Source")),
            data: item.child_text("Data").map(str::to_string),
            meta: item.find("Meta").map(parse_meta).unwrap_or_default(),
        })
        .collect()
}

fn parse_meta(meta: &Element) -> Vec<(String, String)> {
    meta.children
        .iter()
        .filter_map(|c| c.text.as_ref().map(|t| (c.tag.clone(), t.clone())))
        .collect()
}

fn loc_uri(elem: Option<&Element>) -> Option<String> {
    elem.and_then(|e| e.child_text("LocURI")).map(str::to_string)
}

fn require_cmd_id(elem: &Element) -> Result<u32> {
    let text = elem
        .child_text("CmdID")
        .ok_or_else(|| DmError::Protocol(format!("<{}> has no CmdID", elem.tag)))?;
    parse_number(text, "CmdID")
}

fn ref_number(elem: &Element, tag: &str) -> Result<u32> {
    elem.child_text(tag)
        .map(|t| parse_number(t, tag))
        .transpose()
        .map(|v| v.unwrap_or(0))
}

fn parse_number(text: &str, what: &str) -> Result<u32> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| DmError::Protocol(format!("{what} is not a number: {text:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wbxml::Element;

    fn alert_message() -> Element {
        Element::new("SyncML")
            .child(
                Element::new("SyncHdr")
                    .child(Element::with_text("VerDTD", "1.2"))
                    .child(Element::with_text("VerProto", "DM/1.2"))
                    .child(Element::with_text("SessionID", "31"))
                    .child(Element::with_text("MsgID", "1"))
                    .child(
                        Element::new("Target")
                            .child(Element::with_text("LocURI", "https://dm.example.net")),
                    )
                    .child(
                        Element::new("Source").child(Element::with_text("LocURI", "IMEI:990017")),
                    ),
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
    fn test_parse_alert_message() {
        let msg = parse(alert_message()).unwrap();
        assert_eq!(msg.session_id, "31");
        assert_eq!(msg.msg_id, 1);
        assert_eq!(msg.source, "IMEI:990017");
        assert_eq!(msg.target, "https://dm.example.net");
        assert!(msg.is_final);
        assert_eq!(msg.commands.len(), 1);
        assert!(matches!(
            msg.commands[0],
            Command::Alert { code: 1201, .. }
        ));
    }

    #[test]
    fn test_parse_strips_namespaces() {
        let mut tree = alert_message();
        tree.tag = "{SYNCML:SYNCML1.2}SyncML".to_string();
        let msg = parse(tree).unwrap();
        assert_eq!(msg.session_id, "31");
    }

    #[test]
    fn test_parse_results_with_items() {
        let tree = Element::new("SyncML")
            .child(
                Element::new("SyncHdr")
                    .child(Element::with_text("SessionID", "31"))
                    .child(Element::with_text("MsgID", "2")),
            )
            .child(
                Element::new("SyncBody").child(
                    Element::new("Results")
                        .child(Element::with_text("CmdID", "1"))
                        .child(Element::with_text("MsgRef", "1"))
                        .child(Element::with_text("CmdRef", "2"))
                        .child(
                            Element::new("Item")
                                .child(
                                    Element::new("Source")
                                        .child(Element::with_text("LocURI", "./DevInfo/Mod")),
                                )
                                .child(Element::with_text("Data", "Topaz")),
                        ),
                ),
            );

        let msg = parse(tree).unwrap();
        match &msg.commands[0] {
            Command::Results {
                msg_ref,
                cmd_ref,
                items,
                ..
            } => {
                assert_eq!((*msg_ref, *cmd_ref), (1, 2));
                assert_eq!(items[0].source.as_deref(), Some("./DevInfo/Mod"));
                assert_eq!(items[0].data.as_deref(), Some("Topaz"));
            }
            other => panic!("expected Results, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_credential() {
        let tree = Element::new("SyncML")
            .child(
                Element::new("SyncHdr")
                    .child(Element::with_text("SessionID", "8"))
                    .child(Element::with_text("MsgID", "1"))
                    .child(
                        Element::new("Cred")
                            .child(
                                Element::new("Meta")
                                    .child(Element::with_text("Type", "syncml:auth-MAC"))
                                    .child(Element::with_text("Format", "b64")),
                            )
                            .child(Element::with_text("Data", "AAAA")),
                    ),
            )
            .child(Element::new("SyncBody"));

        let msg = parse(tree).unwrap();
        let cred = msg.credential.unwrap();
        assert_eq!(cred.auth_type, "syncml:auth-MAC");
        assert_eq!(cred.format.as_deref(), Some("b64"));
        assert_eq!(cred.data, "AAAA");
    }

    #[test]
    fn test_unknown_command_recorded_not_fatal() {
        let tree = Element::new("SyncML")
            .child(
                Element::new("SyncHdr")
                    .child(Element::with_text("SessionID", "8"))
                    .child(Element::with_text("MsgID", "1")),
            )
            .child(
                Element::new("SyncBody")
                    .child(
                        Element::new("Copy")
                            .child(Element::with_text("CmdID", "1"))
                            .child(Element::new("Item")),
                    )
                    .child(
                        Element::new("Alert")
                            .child(Element::with_text("CmdID", "2"))
                            .child(Element::with_text("Data", "1201")),
                    ),
            );

        let msg = parse(tree).unwrap();
        assert_eq!(msg.commands.len(), 1);
        assert_eq!(msg.unrecognized.len(), 1);
        assert_eq!(msg.unrecognized[0].name, "Copy");
        assert_eq!(msg.unrecognized[0].cmd_id, Some(1));
    }

    #[test]
    fn test_unknown_element_without_cmd_id_ignored() {
        let tree = Element::new("SyncML")
            .child(
                Element::new("SyncHdr")
                    .child(Element::with_text("SessionID", "8"))
                    .child(Element::with_text("MsgID", "1")),
            )
            .child(Element::new("SyncBody").child(Element::with_text("VendorHint", "x")));

        let msg = parse(tree).unwrap();
        assert!(msg.commands.is_empty());
        assert!(msg.unrecognized.is_empty());
    }

    #[test]
    fn test_duplicate_cmd_id_rejected() {
        let tree = Element::new("SyncML")
            .child(
                Element::new("SyncHdr")
                    .child(Element::with_text("SessionID", "8"))
                    .child(Element::with_text("MsgID", "1")),
            )
            .child(
                Element::new("SyncBody")
                    .child(
                        Element::new("Alert")
                            .child(Element::with_text("CmdID", "1"))
                            .child(Element::with_text("Data", "1201")),
                    )
                    .child(
                        Element::new("Get")
                            .child(Element::with_text("CmdID", "1"))
                            .child(Element::new("Item")),
                    ),
            );

        assert!(matches!(parse(tree), Err(DmError::Protocol(_))));
    }

    #[test]
    fn test_missing_header_rejected() {
        let tree = Element::new("SyncML").child(Element::new("SyncBody"));
        assert!(matches!(parse(tree), Err(DmError::Protocol(_))));

        let tree = Element::new("SyncML").child(
            Element::new("SyncHdr").child(Element::with_text("SessionID", "1")),
        );
        assert!(matches!(parse(tree), Err(DmError::Protocol(_))));
    }

    #[test]
    fn test_zero_msg_id_rejected() {
        let tree = Element::new("SyncML")
            .child(
                Element::new("SyncHdr")
                    .child(Element::with_text("SessionID", "8"))
                    .child(Element::with_text("MsgID", "0")),
            )
            .child(Element::new("SyncBody"));
        assert!(matches!(parse(tree), Err(DmError::Protocol(_))));
    }
}
