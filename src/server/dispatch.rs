//! Protocol dispatch: one inbound request to one outbound response.
//!
//! Control flow: authenticate the raw request, decode the body through the
//! codec, parse the tree into a message, validate ordering against session
//! state, dispatch commands, evaluate the update rules, and build, encode,
//! and sign the response. Every error the device can observe is surfaced
//! through the protocol's own Status mechanism.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, info, warn};

use super::state::AppState;
use crate::dm::{
    self, PackageDescriptor, DEVINFO_PATHS, DOWNLOAD_AND_INSTALL_URI, PKG_CHECKSUM_URI,
    PKG_DESC_URI, PKG_NAME_URI, PKG_SIZE_URI, PKG_URL_URI, PKG_VERSION_URI, SOFTWARE_PATHS,
};
use crate::error::{DmError, Result};
use crate::syncml::{
    build_response, parse, AuthResult, Authenticator, Chal, Command, HmacHeader, Item, Message,
    ResponseHeader, Session, SessionState, ALERT_CLIENT_INITIATED, ALERT_CONFIRM, ALERT_DISPLAY,
    ALERT_SERVER_INITIATED, STATUS_ACCEPTED, STATUS_AUTH_ACCEPTED, STATUS_COMMAND_FAILED,
    STATUS_CREDENTIALS_MISSING, STATUS_NOT_IMPLEMENTED, STATUS_OK, STATUS_UNAUTHORIZED,
};
use crate::wbxml::{self, Element};

/// Binary body content type.
pub const CONTENT_TYPE_WBXML: &str = "application/vnd.syncml.dm+wbxml";
/// Textual body content type.
pub const CONTENT_TYPE_XML: &str = "application/vnd.syncml.dm+xml";

/// A finished protocol response, ready for the transport layer.
#[derive(Debug)]
pub struct DmResponse {
    /// Encoded response body.
    pub body: Vec<u8>,
    /// Response content type (matches the request representation).
    pub content_type: &'static str,
    /// `x-syncml-hmac` header value, when the request carried one.
    pub hmac: Option<String>,
}

/// Handle one inbound protocol request end to end.
pub async fn handle_request(
    state: &AppState,
    content_type: Option<&str>,
    hmac_header: Option<&str>,
    body: &[u8],
) -> Result<DmResponse> {
    let binary = match content_type {
        Some(ct) if ct.contains("wbxml") => true,
        Some(ct) if ct.contains("xml") => false,
        _ => wbxml::looks_binary(body),
    };

    let tree = if binary {
        wbxml::decode(body, &state.table)?
    } else {
        let text = std::str::from_utf8(body)
            .map_err(|e| DmError::Decode(format!("body is not UTF-8: {e}")))?;
        Element::from_xml(text)?
    };
    let msg = parse(tree)?;

    info!(
        session = %msg.session_id,
        msg_id = msg.msg_id,
        source = %msg.source,
        commands = msg.commands.len(),
        "inbound message"
    );

    let entry = state
        .sessions
        .get_or_create(&msg.source, &msg.session_id)
        .await;
    let mut session = entry
        .try_lock()
        .map_err(|_| DmError::SessionBusy(msg.session_id.clone()))?;

    let header = hmac_header.and_then(HmacHeader::parse);
    let response_tree = process_message(state, &mut session, &msg, header.as_ref(), body);

    let out = if binary {
        wbxml::encode(&response_tree, &state.table)
    } else {
        response_tree.to_xml().into_bytes()
    };

    // Sign with the device's nonce when the device authenticated its side.
    let hmac = hmac_header.map(|_| state.auth.sign(&out, &session).format());

    let terminal = session.state.is_terminal();
    drop(session);
    if terminal {
        state.sessions.remove(&msg.source, &msg.session_id).await;
    }

    Ok(DmResponse {
        body: out,
        content_type: if binary {
            CONTENT_TYPE_WBXML
        } else {
            CONTENT_TYPE_XML
        },
        hmac,
    })
}

/// Process a parsed message against its session, producing a response tree.
fn process_message(
    state: &AppState,
    session: &mut Session,
    msg: &Message,
    header: Option<&HmacHeader>,
    raw_body: &[u8],
) -> Element {
    // Ordering gate: non-sequential ids and post-completion messages abort.
    if let Err(err) = session.accept_message(msg.msg_id) {
        warn!(session = %msg.session_id, %err, "message rejected");
        return error_response(state, session, msg, STATUS_COMMAND_FAILED);
    }

    // The device's nonce for signing our responses rides in the header meta.
    if let Some(nonce_b64) = msg.meta_value("NextNonce") {
        match BASE64.decode(nonce_b64) {
            Ok(nonce) => session.client_nonce = nonce,
            Err(err) => warn!(%err, "ignoring undecodable client NextNonce"),
        }
    }

    match state.auth.verify(header, raw_body, session) {
        AuthResult::Accepted => {
            if !session.authenticated {
                session.authenticated = true;
                session.username = header
                    .map(|h| h.username.clone())
                    .unwrap_or_else(|| state.config.device_username.clone());
                info!(session = %msg.session_id, user = %session.username, "session authenticated");
            }
        }
        AuthResult::Challenge => {
            let nonce = Authenticator::generate_nonce();
            session.server_nonce.clone_from(&nonce);
            debug!(session = %msg.session_id, "issuing authentication challenge");
            return challenge_response(state, session, msg, &nonce);
        }
        AuthResult::Rejected => {
            warn!(session = %msg.session_id, "credential failed against issued nonce");
            session.abort();
            return error_response(state, session, msg, STATUS_UNAUTHORIZED);
        }
    }

    let mut statuses = vec![header_status(msg, STATUS_AUTH_ACCEPTED, None)];
    let mut commands: Vec<Command> = Vec::new();
    let mut info_requested = false;

    for cmd in &msg.commands {
        match cmd {
            Command::Alert { cmd_id, code, .. } => {
                statuses.push(ack(msg, *cmd_id, "Alert", STATUS_OK));
                handle_alert(session, *code, &mut commands, &mut info_requested);
            }
            Command::Status {
                cmd_ref,
                cmd,
                code,
                target_ref,
                ..
            } => {
                // Acknowledgements need no response status.
                handle_device_status(session, *cmd_ref, cmd, *code, target_ref.as_deref());
            }
            Command::Results { cmd_id, items, .. } => {
                statuses.push(ack(msg, *cmd_id, "Results", STATUS_OK));
                handle_results(session, items);
            }
            Command::Replace { cmd_id, items } => {
                statuses.push(ack(msg, *cmd_id, "Replace", STATUS_OK));
                handle_replace(session, items);
            }
            Command::Get { cmd_id, items } => {
                statuses.push(ack(msg, *cmd_id, "Get", STATUS_OK));
                if let Some(results) = handle_get(state, session, msg, *cmd_id, items) {
                    commands.push(results);
                }
            }
            Command::Exec { cmd_id, .. } => {
                // Devices do not execute nodes on the server.
                statuses.push(ack(msg, *cmd_id, "Exec", STATUS_NOT_IMPLEMENTED));
            }
        }
    }

    for unknown in &msg.unrecognized {
        warn!(command = %unknown.name, "unrecognized command answered with 501");
        statuses.push(ack(
            msg,
            unknown.cmd_id.unwrap_or(0),
            &unknown.name,
            STATUS_NOT_IMPLEMENTED,
        ));
    }

    // Offer evaluation once identity and build are known.
    if session.state == SessionState::ReadyToOffer && session.pending_offer.is_empty() {
        offer_update(state, session, &mut commands);
    }

    let response_header = ResponseHeader {
        session_id: msg.session_id.clone(),
        msg_id: session.next_msg_id(),
        target: msg.source.clone(),
        source: state.config.server_id.clone(),
    };

    let mut all = statuses;
    all.extend(commands);
    let tree = build_response(&response_header, all, true);

    if info_requested {
        session.mark_info_requested();
    }

    tree
}

fn handle_alert(
    session: &mut Session,
    code: u32,
    commands: &mut Vec<Command>,
    info_requested: &mut bool,
) {
    match code {
        ALERT_CLIENT_INITIATED => {
            if session.state == SessionState::Init {
                info!(session = %session.session_id, "client-initiated session, querying device info");
                session.mark_session_started();
                let items = DEVINFO_PATHS
                    .iter()
                    .chain(SOFTWARE_PATHS)
                    .map(|uri| Item::target(*uri))
                    .collect();
                commands.push(Command::Get { cmd_id: 0, items });
                *info_requested = true;
            }
        }
        ALERT_SERVER_INITIATED => {
            debug!(session = %session.session_id, "server-initiated session alert");
        }
        ALERT_DISPLAY | ALERT_CONFIRM => {
            debug!(session = %session.session_id, code, "user notification alert");
        }
        other => {
            debug!(session = %session.session_id, code = other, "unhandled alert code");
        }
    }
}

fn handle_device_status(
    session: &mut Session,
    cmd_ref: u32,
    cmd: &str,
    code: u32,
    target_ref: Option<&str>,
) {
    debug!(
        session = %session.session_id,
        cmd_ref,
        cmd,
        code,
        "status from device"
    );

    let acks_install = cmd == "Exec"
        || target_ref.is_some_and(|t| t.contains("DownloadAndInstall") || t.contains("Download"));

    if acks_install && !session.pending_offer.is_empty() {
        if code == STATUS_OK || code == STATUS_ACCEPTED {
            info!(session = %session.session_id, "device accepted update offer");
        } else {
            warn!(session = %session.session_id, code, "device declined update offer");
        }
        session.pending_offer.clear();
        session.mark_completed();
    }
}

fn handle_results(session: &mut Session, items: &[Item]) {
    for item in items {
        let (Some(source), Some(data)) = (&item.source, &item.data) else {
            continue;
        };
        info!(uri = %source, value = %data, "device reported");
        session.device_info.record(source, data);
        session.tree.replace(source, data.clone());
    }
    session.mark_results_received();
}

fn handle_replace(session: &mut Session, items: &[Item]) {
    for item in items {
        let (Some(target), Some(data)) = (&item.target, &item.data) else {
            continue;
        };
        debug!(uri = %target, value = %data, "device replace");
        session.device_info.record(target, data);
        session.tree.replace(target, data.clone());
    }
}

fn handle_get(
    state: &AppState,
    session: &Session,
    msg: &Message,
    cmd_id: u32,
    items: &[Item],
) -> Option<Command> {
    let mut found = Vec::new();

    for item in items {
        let Some(target) = &item.target else {
            continue;
        };

        let value = match session.tree.get(target).filter(|v| !v.is_empty()) {
            Some(v) => Some(v.to_string()),
            None if target.ends_with("Build") => {
                session.device_info.build().map(str::to_string)
            }
            None if target.ends_with("PkgURL") => {
                let build = session.device_info.build().unwrap_or_default();
                dm::evaluate(build, state.registry.packages())
                    .first()
                    .map(|pkg| pkg.url.clone())
            }
            None => None,
        };

        if let Some(value) = value {
            found.push(Item::source_data(target.clone(), value));
        }
    }

    if found.is_empty() {
        return None;
    }
    Some(Command::Results {
        cmd_id: 0,
        msg_ref: msg.msg_id,
        cmd_ref: cmd_id,
        items: found,
    })
}

fn offer_update(state: &AppState, session: &mut Session, commands: &mut Vec<Command>) {
    let Some(build) = session.device_info.build().map(str::to_string) else {
        return;
    };

    let selected: Vec<PackageDescriptor> = dm::evaluate(&build, state.registry.packages())
        .into_iter()
        .cloned()
        .collect();

    if selected.is_empty() {
        info!(build = %build, "no update applicable, finishing session");
        session.mark_completed();
        return;
    }

    info!(
        build = %build,
        packages = selected.len(),
        "offering update"
    );

    for pkg in &selected {
        commands.push(Command::Replace {
            cmd_id: 0,
            items: package_items(pkg),
        });
        commands.push(Command::Exec {
            cmd_id: 0,
            items: vec![Item::target(DOWNLOAD_AND_INSTALL_URI)],
        });

        // Mirror the offer into the session tree so later Gets can read it.
        session.tree.replace(PKG_NAME_URI, pkg.name.clone());
        session.tree.replace(PKG_VERSION_URI, pkg.version.clone());
        session.tree.replace(PKG_URL_URI, pkg.url.clone());
        session.tree.replace(PKG_SIZE_URI, pkg.size.to_string());
        session.tree.replace(PKG_CHECKSUM_URI, pkg.md5.clone());
    }

    session.pending_offer = selected;
}

fn package_items(pkg: &PackageDescriptor) -> Vec<Item> {
    let mut items = vec![
        Item::target_data(PKG_NAME_URI, &pkg.name),
        Item::target_data(PKG_VERSION_URI, &pkg.version),
        Item::target_data(PKG_URL_URI, &pkg.url),
        Item::target_data(PKG_SIZE_URI, pkg.size.to_string()),
        Item::target_data(PKG_CHECKSUM_URI, &pkg.md5),
    ];
    if !pkg.description.is_empty() {
        items.push(Item::target_data(PKG_DESC_URI, &pkg.description));
    }
    items
}

fn header_status(msg: &Message, code: u32, chal: Option<Chal>) -> Command {
    Command::Status {
        cmd_id: 0,
        msg_ref: msg.msg_id,
        cmd_ref: 0,
        cmd: "SyncHdr".to_string(),
        code,
        target_ref: Some(msg.target.clone()),
        source_ref: Some(msg.source.clone()),
        chal,
        items: vec![],
    }
}

fn ack(msg: &Message, cmd_ref: u32, cmd: &str, code: u32) -> Command {
    Command::Status {
        cmd_id: 0,
        msg_ref: msg.msg_id,
        cmd_ref,
        cmd: cmd.to_string(),
        code,
        target_ref: None,
        source_ref: None,
        chal: None,
        items: vec![],
    }
}

fn challenge_response(
    state: &AppState,
    session: &mut Session,
    msg: &Message,
    nonce: &[u8],
) -> Element {
    let chal = Chal {
        next_nonce: BASE64.encode(nonce),
    };
    let response_header = ResponseHeader {
        session_id: msg.session_id.clone(),
        msg_id: session.next_msg_id(),
        target: msg.source.clone(),
        source: state.config.server_id.clone(),
    };
    build_response(
        &response_header,
        vec![header_status(msg, STATUS_CREDENTIALS_MISSING, Some(chal))],
        true,
    )
}

fn error_response(
    state: &AppState,
    session: &mut Session,
    msg: &Message,
    code: u32,
) -> Element {
    let response_header = ResponseHeader {
        session_id: msg.session_id.clone(),
        msg_id: session.next_msg_id(),
        target: msg.source.clone(),
        source: state.config.server_id.clone(),
    };
    build_response(&response_header, vec![header_status(msg, code, None)], true)
}
