//! Codec/parser equivalence tests.
//!
//! Trees the builder produces must survive encode → decode → parse with the
//! same message fields and command list, even when the surface tree shape
//! differs from what a device encoder would emit.

use omadm::syncml::{build_response, parse, Chal, Command, Item, ResponseHeader};
use omadm::wbxml::{self, Element, TokenTable};

fn table() -> TokenTable {
    TokenTable::syncml_dm()
}

fn header() -> ResponseHeader {
    ResponseHeader {
        session_id: "12".to_string(),
        msg_id: 2,
        target: "IMEI:353501042023000".to_string(),
        source: "https://update.example.net/palmcsext/swupdateserver".to_string(),
    }
}

fn status(cmd: &str, cmd_ref: u32, code: u32) -> Command {
    Command::Status {
        cmd_id: 0,
        msg_ref: 2,
        cmd_ref,
        cmd: cmd.to_string(),
        code,
        target_ref: None,
        source_ref: None,
        chal: None,
        items: vec![],
    }
}

fn roundtrip(tree: &Element) -> Element {
    let bytes = wbxml::encode(tree, &table());
    wbxml::decode(&bytes, &table()).unwrap()
}

#[test]
fn test_offer_response_parse_equivalent() {
    let commands = vec![
        status("SyncHdr", 0, 212),
        status("Results", 1, 200),
        Command::Replace {
            cmd_id: 0,
            items: vec![
                Item::target_data("./Software/Package/PkgName", "webos-doctor"),
                Item::target_data("./Software/Package/PkgVersion", "3.0.5"),
                Item::target_data(
                    "./Software/Package/PkgURL",
                    "https://update.example.net/packages/webos-doctor.ipk",
                ),
                Item::target_data("./Software/Package/PkgSize", "1048576"),
            ],
        },
        Command::Exec {
            cmd_id: 0,
            items: vec![Item::target("./Software/Operations/DownloadAndInstall")],
        },
    ];

    let tree = build_response(&header(), commands, true);
    let direct = parse(tree.clone()).unwrap();
    let decoded = parse(roundtrip(&tree)).unwrap();

    assert_eq!(direct, decoded);
    assert_eq!(decoded.session_id, "12");
    assert_eq!(decoded.msg_id, 2);
    assert_eq!(decoded.commands.len(), 4);
    assert!(decoded.is_final);
}

#[test]
fn test_challenge_response_parse_equivalent() {
    let commands = vec![Command::Status {
        cmd_id: 0,
        msg_ref: 1,
        cmd_ref: 0,
        cmd: "SyncHdr".to_string(),
        code: 407,
        target_ref: Some("https://update.example.net".to_string()),
        source_ref: Some("IMEI:353501042023000".to_string()),
        chal: Some(Chal {
            next_nonce: "q83vEjRWeJA=".to_string(),
        }),
        items: vec![],
    }];

    let tree = build_response(&header(), commands, true);
    let direct = parse(tree.clone()).unwrap();
    let decoded = parse(roundtrip(&tree)).unwrap();

    assert_eq!(direct, decoded);
    match &decoded.commands[0] {
        Command::Status { chal, .. } => {
            assert_eq!(
                chal.as_ref().map(|c| c.next_nonce.as_str()),
                Some("q83vEjRWeJA=")
            );
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[test]
fn test_results_with_meta_parse_equivalent() {
    let commands = vec![Command::Results {
        cmd_id: 0,
        msg_ref: 1,
        cmd_ref: 3,
        items: vec![Item {
            target: None,
            source: Some("./DevInfo/Mod".to_string()),
            data: Some("Topaz".to_string()),
            meta: vec![("Format".to_string(), "chr".to_string())],
        }],
    }];

    let tree = build_response(&header(), commands, false);
    let direct = parse(tree.clone()).unwrap();
    let decoded = parse(roundtrip(&tree)).unwrap();

    assert_eq!(direct, decoded);
    match &decoded.commands[0] {
        Command::Results { items, .. } => {
            assert_eq!(items[0].meta, vec![("Format".to_string(), "chr".to_string())]);
        }
        other => panic!("expected Results, got {other:?}"),
    }
}

#[test]
fn test_textual_and_binary_forms_parse_identically() {
    let commands = vec![
        status("SyncHdr", 0, 212),
        Command::Get {
            cmd_id: 0,
            items: vec![
                Item::target("./DevInfo/DevId"),
                Item::target("./Software/Build"),
            ],
        },
    ];
    let tree = build_response(&header(), commands, true);

    let from_binary = parse(roundtrip(&tree)).unwrap();
    let from_text = parse(Element::from_xml(&tree.to_xml()).unwrap()).unwrap();

    assert_eq!(from_binary, from_text);
}

#[test]
fn test_every_truncation_of_a_real_response_errors() {
    let commands = vec![
        status("SyncHdr", 0, 212),
        Command::Get {
            cmd_id: 0,
            items: vec![Item::target("./DevInfo/DevId")],
        },
    ];
    let tree = build_response(&header(), commands, true);
    let bytes = wbxml::encode(&tree, &table());

    for len in 0..bytes.len() {
        assert!(
            wbxml::decode(&bytes[..len], &table()).is_err(),
            "prefix of length {len} decoded"
        );
    }
}
