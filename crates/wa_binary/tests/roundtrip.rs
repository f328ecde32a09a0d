use proptest::prelude::*;
use wa_binary::token::{single_byte_index, NIBBLE_8};
use wa_binary::{decode, encode, encode_compressed, encoded_len, AttributeValue, Content, Jid, Node};

#[test]
fn iq_without_content_roundtrips() {
    let node = Node::new("iq").with_attr("id", "abc").with_attr("type", "get");
    let back = decode(&encode(&node).unwrap()).unwrap();

    assert_eq!(back.tag(), "iq");
    assert_eq!(back.attr_str("id"), Some("abc"));
    assert_eq!(back.attr_str("type"), Some("get"));
    assert!(!back.content().is_present());
    assert_eq!(back, node);
}

#[test]
fn digit_string_is_nibble_packed_and_roundtrips() {
    let node = Node::new("iq").with_attr("id", "12345");
    let bytes = encode(&node).unwrap();

    let iq = single_byte_index("iq").unwrap();
    let id = single_byte_index("id").unwrap();
    assert_eq!(bytes[1..5], [wa_binary::token::LIST_8, 3, iq, id]);
    assert_eq!(bytes[5..], [NIBBLE_8, 0x83, 0x12, 0x34, 0x5F]);

    assert_eq!(decode(&bytes).unwrap(), node);
}

#[test]
fn nested_tree_with_every_value_kind() {
    let node = Node::new("message")
        .with_attr("to", Jid::ad("15551234567", 0, 2))
        .with_attr("from", Jid::new("123-456", "g.us"))
        .with_attr("participant", Jid::server_only("s.whatsapp.net"))
        .with_attr("t", 1_700_000_000i64)
        .with_attr("offline", false)
        .with_attr("phash", vec![0x00, 0xff, 0x10])
        .with_attr("empty", "")
        .with_children(vec![
            Node::new("enc").with_attr("v", 2i64).with_content(vec![1u8, 2, 3, 4]),
            Node::new("hex").with_content("0123456789ABCDEF"),
            Node::new("addr").with_content(Jid::ad("42", 128, 99)),
            Node::new("list").with_children(Vec::new()),
        ]);

    let back = decode(&encode(&node).unwrap()).unwrap();
    assert_eq!(back, node);
    assert_eq!(back.child("addr").map(|n| n.content().clone()), Some(Content::Jid(Jid::ad("42", 128, 99))));
    assert_eq!(back.attr("t").and_then(AttributeValue::as_i64), Some(1_700_000_000));
}

// ── Properties ───────────────────────────────────────────────────────────────

fn arb_string() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[0-9]{1,40}",
        "[0-9.-]{1,20}",
        "[0-9A-F]{1,40}",
        "[0-9]{128,140}",
        prop::sample::select(vec!["iq", "type", "get", "deny", "read-self", "s.whatsapp.net"])
            .prop_map(str::to_string),
        "[a-z ]{0,40}",
        "\\PC{0,16}",
    ]
}

fn arb_jid() -> impl Strategy<Value = Jid> {
    prop_oneof![
        (arb_string(), arb_string()).prop_map(|(user, server)| Jid::new(user, server)),
        arb_string().prop_map(Jid::server_only),
        ("[0-9]{1,15}", any::<u8>(), any::<u8>()).prop_map(|(user, agent, device)| Jid::ad(user, agent, device)),
    ]
}

fn arb_attr() -> impl Strategy<Value = AttributeValue> {
    prop_oneof![
        arb_string().prop_map(AttributeValue::Text),
        any::<i64>().prop_map(AttributeValue::Int),
        any::<bool>().prop_map(AttributeValue::Bool),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(AttributeValue::Bytes),
        arb_jid().prop_map(AttributeValue::Jid),
    ]
}

fn arb_leaf_content() -> impl Strategy<Value = Content> {
    prop_oneof![
        Just(Content::None),
        arb_string().prop_map(Content::Text),
        prop::collection::vec(any::<u8>(), 0..300).prop_map(Content::Bytes),
        arb_jid().prop_map(Content::Jid),
    ]
}

fn build(tag: String, attrs: Vec<(String, AttributeValue)>, content: Content) -> Node {
    attrs
        .into_iter()
        .fold(Node::new(tag), |node, (key, value)| node.with_attr(key, value))
        .with_content(content)
}

fn arb_node() -> impl Strategy<Value = Node> {
    let attrs = || prop::collection::vec((arb_string(), arb_attr()), 0..4);
    let leaf = (arb_string(), attrs(), arb_leaf_content())
        .prop_map(|(tag, attrs, content)| build(tag, attrs, content));
    leaf.prop_recursive(3, 32, 4, move |inner| {
        (arb_string(), attrs(), prop::collection::vec(inner, 0..4))
            .prop_map(|(tag, attrs, children)| build(tag, attrs, Content::Nodes(children)))
    })
}

proptest! {
    #[test]
    fn decode_inverts_encode(node in arb_node()) {
        let bytes = encode(&node).unwrap();
        prop_assert_eq!(bytes.len(), encoded_len(&node).unwrap());
        prop_assert_eq!(decode(&bytes).unwrap(), node);
    }

    #[test]
    fn compressed_decode_inverts_encode(node in arb_node()) {
        let bytes = encode_compressed(&node).unwrap();
        prop_assert_eq!(decode(&bytes).unwrap(), node);
    }

    #[test]
    fn truncation_never_yields_a_node(node in arb_node(), cut in any::<prop::sample::Index>()) {
        let bytes = encode(&node).unwrap();
        let cut = cut.index(bytes.len());
        prop_assert!(decode(&bytes[..cut]).is_err());
    }
}
