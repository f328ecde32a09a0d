//! Wire tag bytes and the static token dictionaries.
//!
//! Index 0 of the single-byte table is reserved for the empty marker and is
//! never used for lookups. Single-byte indices stop below `DICTIONARY_0`, so
//! every byte in `1..DICTIONARY_0` that is not a token is a decode error.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Version of the tables below; carried in the handshake prologue.
pub const DICTIONARY_VERSION: u8 = 3;

pub const LIST_EMPTY: u8 = 0;
pub const DICTIONARY_0: u8 = 236;
pub const DICTIONARY_1: u8 = 237;
pub const DICTIONARY_2: u8 = 238;
pub const DICTIONARY_3: u8 = 239;
pub const AD_JID: u8 = 247;
pub const LIST_8: u8 = 248;
pub const LIST_16: u8 = 249;
pub const JID_PAIR: u8 = 250;
pub const HEX_8: u8 = 251;
pub const BINARY_8: u8 = 252;
pub const BINARY_20: u8 = 253;
pub const BINARY_32: u8 = 254;
pub const NIBBLE_8: u8 = 255;

/// Longest string (in bytes) eligible for nibble/hex packing.
pub const PACKED_MAX: usize = 127;

pub const SINGLE_BYTE_TOKENS: &[&str] = &[
    "", "xmlstreamstart", "xmlstreamend", "s.whatsapp.net", "type", "participant", "from",
    "receipt", "id", "notification", "disappearing_mode", "status", "jid", "broadcast", "user",
    "devices", "device_hash", "to", "offline", "message", "result", "class", "xmlns",
    "duration", "notify", "iq", "t", "ack", "g.us", "enc", "urn:xmpp:whatsapp:push",
    "presence", "config_value", "picture", "verified_name", "config_code", "key-index-list",
    "contact", "mediatype", "routing_info", "edge_routing", "get", "read", "urn:xmpp:ping",
    "fallback_hostname", "0", "chatstate", "business_hours_config", "unavailable",
    "download_buckets", "skmsg", "verified_level", "composing", "handshake", "device-list",
    "media", "text", "fallback_ip4", "media_conn", "device", "creation", "location", "config",
    "item", "fallback_ip6", "count", "w:profile:picture", "image", "business", "2", "hostname",
    "call-creator", "display_name", "relaylatency", "platform", "abprops", "success", "msg",
    "offline_preview", "prop", "key-index", "v", "day_of_week", "pkmsg", "version", "1",
    "ping", "w:p", "download", "video", "set", "specific_hours", "props", "primary", "unknown",
    "hash", "commerce_experience", "last", "subscribe", "max_buckets", "call", "profile",
    "member_since_text", "close_time", "call-id", "sticker", "mode", "participants", "value",
    "query", "profile_options", "open_time", "code", "list", "host", "ts", "contacts",
    "upload", "lid", "preview", "update", "usync", "w:stats", "delivery", "auth_ttl",
    "context", "fail", "cart_enabled", "appdata", "category", "atn", "direct_connection",
    "decrypt-fail", "relay_id", "mmg-fallback.whatsapp.net", "target", "available", "name",
    "last_id", "mmg.whatsapp.net", "categories", "401", "is_new", "index", "tctoken", "ip4",
    "token_id", "latency", "recipient", "edit", "ip6", "add", "thumbnail-document", "26",
    "paused", "true", "identity", "stream:error", "key", "sidelist", "background", "audio",
    "3", "thumbnail-image", "biz-cover-photo", "cat", "gcm", "thumbnail-video", "error",
    "auth", "deny", "serial", "in", "registration", "thumbnail-link", "remove", "00", "gif",
    "thumbnail-gif", "tag", "capability", "multicast", "item-not-found", "description",
    "business_hours", "config_expo_key", "md-app-state", "expiration", "fallback", "ttl",
    "300", "md-msg-hist", "device_orientation", "out", "w:m", "open_24h", "side_list", "token",
    "inactive", "01", "document", "te2", "played", "encrypt", "msgr", "hide", "direct_path",
    "12", "state", "not-authorized", "url", "terminate", "signature", "status-revoke-delay",
    "02", "te", "linked_accounts", "trusted_contact", "timezone", "ptt", "kyc-id",
    "privacy_token", "readreceipts", "appointment_only", "address", "expected_ts", "privacy",
    "7", "android", "interactive", "device-identity", "enabled", "attribute_padding", "1080",
    "03", "screen_height",
];

pub const DOUBLE_BYTE_TOKENS: [&[&str]; 4] = [
    &[
        "read-self", "active", "fbns", "protocol", "reaction", "screen_width", "heartbeat",
        "deviceid", "2:47DEQpj8", "uploadfieldstat", "voip_settings", "retry", "priority",
        "longitude", "conflict", "false", "ig_professional", "replaced", "preaccept",
        "cover_photo", "uncompressed", "encopt", "ppic", "04", "passive", "status-revoke-drop",
        "keygen", "540", "offer", "rate", "opus", "latitude", "w:gp2", "ver", "4",
        "business_profile", "medium", "sender", "prev_v_id", "email", "website", "invited",
        "sign_credential", "05", "transport", "skey", "reason", "peer_abtest_bucket",
        "America/Sao_Paulo", "appid", "refresh", "100", "06", "404", "101", "104", "107",
        "102", "109", "103", "member_add_mode", "105", "transaction-id", "110", "106",
        "outgoing", "108", "111", "tokens", "followers", "cell_size", "bucket", "mute",
        "admin", "ib", "server-error", "dirty", "bitrate", "newsletter", "web", "upgrade",
        "plaintext", "peer", "ack_reason", "features", "phone_id", "relay", "te_ttl",
        "group_jid", "dispatch", "enc_rekey", "hd", "video_duration", "call-offer",
        "call-accept", "call-reject", "call-terminate", "resume", "subject_owner", "subject_t",
        "creator", "s_t", "announcement", "restrict", "locked", "ephemeral", "not_ephemeral",
        "membership_approval_mode", "growth_locked", "invite", "expiration_ts", "link",
        "parent", "default_sub_group", "allow_non_admin_sub_group_creation", "incognito",
        "community_linked_group_id", "linked_parent", "unlink", "hidden_group", "deny", "w:g2",
        "group_create_feature", "subject_update", "description_update", "revoke", "kick",
        "leave", "promote", "demote", "linked_group_join", "suspended", "auto_add_disabled",
        "invite_link", "reset", "create", "add_request", "approval_mode",
        "pending_participants", "request_method", "participant_join", "past_participants",
        "invite_code", "full_jid", "phone_number", "lid_migration", "hosted_lid", "hosted",
        "pn", "username", "country_code", "premium_message", "member_link_mode", "bot_state",
        "ai_system", "label_jid", "trending",
    ],
    &[
        "privacy_mode_ts", "md-app-state-sync", "key-share", "app_state_sync_key_share",
        "app_state_sync_key_request", "app_state_sync_key", "app_state_sync_key_fingerprint",
        "history_sync_notification", "initial_status_v3", "push_name", "pushname",
        "contact_action", "mute_action", "pin_action", "star_action", "delete_message_for_me",
        "mark_chat_as_read", "clear_chat", "delete_chat", "archive_chat_action", "lock_chat",
        "locale", "favorites", "user_status_mute", "subscription_action",
        "android_unsupported_actions", "agent_action", "quick_reply", "label_edit",
        "label_association", "primary_feature", "nux_action", "time_format",
        "security_notification_setting", "unarchive_chats_setting", "key_expiration",
        "sync_action_value", "sync_action_data", "sync_action_index", "critical_block",
        "critical_unblock_low", "regular", "regular_high", "regular_low", "patch", "snapshot",
        "collection", "mutations", "index_mac", "value_mac", "snapshot_mac", "patch_mac",
        "key_id", "operation", "record", "server_sync_action", "device_index", "retry_count",
        "device-store", "fetch_state", "resync", "app_state_conflict", "sync_d", "sync_done",
        "messageless_poll", "poll_vote", "poll_creation", "poll_update", "enc_iv",
        "enc_payload", "event_response", "event_creation", "keep_in_chat", "pinned_message",
        "revoked", "comment_message", "encrypted_reaction", "reaction_text", "sticker_pack",
        "album", "lottie", "ptv", "view_once", "view_once_v2", "hq_thumb", "thumb_ts",
        "thumb_url", "media_key", "file_enc_sha256", "file_sha256", "file_length",
        "direct_path_v2", "mms4", "mms3", "mms-type", "upload_token", "auth_token", "media_id",
        "object_id", "origin_mime", "origin_ts", "mime_type", "seconds", "page_count",
        "waveform", "streaming_sidecar", "gif_playback", "caption", "file_name", "key_hash",
        "encrypted_hash", "enc_thumb", "thumbnail_sha256", "thumbnail_enc_sha256",
        "jpeg_thumbnail", "scans_sidecar", "scan_lengths", "mid_quality_file_sha256", "width",
        "height",
    ],
    &[
        "biz", "verified_name_cert", "vname_cert", "serial_number", "issuer", "smb_tier",
        "cert_level", "biz_account_type", "is_enterprise", "direct_connection_public_key",
        "privacy_mode_hosting", "host_storage", "actual_actors", "biz_profile",
        "profile_picture_id", "business_category", "business_description", "vertical",
        "commerce_manager", "catalog", "catalog_status", "catalog_not_created",
        "product_catalog", "product", "collection_id", "product_list", "retailer_id", "cart",
        "order", "order_status", "order_id", "price_amount_1000", "currency", "currency_code",
        "sale_price", "availability", "in_stock", "out_of_stock", "item_count",
        "total_amount_1000", "tax_amount", "shipping_amount", "subtotal", "discount",
        "invoice", "payment", "payment_method", "payment_status", "upi_id", "pix_key",
        "merchant", "merchant_name", "merchant_id", "transaction_amount", "transaction_status",
        "receiver_id", "amount_1000", "psp", "psp_routing", "routing_code", "bank_transfer",
        "card", "wallet", "charge", "settlement", "refund", "refund_status", "coupon_code",
        "checkout", "checkout_url", "quick_reply_id", "shortcut", "keywords",
        "greeting_message", "away_message", "business_message_forwarding", "automated_type",
        "welcome_message", "cta_url", "cta_call", "cta_copy", "native_flow",
        "interactive_response", "button_reply", "list_reply", "template", "template_id",
        "hydrated_template", "highly_structured_message", "namespace", "element_name",
        "language_code", "localizable_params", "hsm", "fallback_lc", "deterministic_lc",
        "request_welcome", "ads_context", "ctwa_context", "source_url", "source_id",
        "source_type", "conversion_source", "conversion_data", "entry_point_conversion_source",
        "tracking_token", "payload", "flow_id", "flow_token", "flow_action", "screen_id",
    ],
    &[
        "voip", "call_state", "relay_election", "relay_latency", "call_creator", "group_call",
        "joinable", "video_state", "audio_state", "mute_state", "camera_state", "screen_share",
        "screen_share_state", "transport_stats", "net_medium", "rte", "rte_ts", "encrypt_key",
        "enc_key_size", "srtp_mode", "capability_set", "voip_capability", "caps",
        "warp_protocol", "mcs", "peer_capability", "call_link", "call_link_token", "link_type",
        "device_orientation_v2", "orientation", "call_duration", "call_result", "call_ring",
        "ring_timeout", "preaccept_timeout", "offer_notice", "accept_receipt",
        "accept_timeout", "reject_reason", "busy", "not_connected", "timeout_reason",
        "voip_error", "batch", "participants_v2", "call_participants", "participant_update",
        "callee", "caller", "caller_pn", "caller_country_code", "is_video", "is_group",
        "is_lid_call", "notice", "relay_token", "token_v2", "hbh_key", "te2_token", "uuid",
        "udp_port", "tcp_port", "stun", "turn", "turn_port", "turn_host", "relay_candidate",
        "p2p_candidate", "candidate_type", "network_type", "cellular", "wifi", "ethernet",
        "bwe", "bwe_estimate", "ack_ts", "echo_ts", "rtt", "jitter", "packet_loss", "codec",
        "frame_rate", "resolution", "svc", "simulcast", "keyframe", "fec", "nack", "pli",
        "fir", "red", "ulpfec", "flexfec", "audio_level", "vad", "opus_dtx", "agc", "aec",
        "nsb", "hd_audio", "spatial_audio", "avatar_call", "avatar_id", "lobby",
        "waiting_room", "call_summary", "call_summary_v2",
    ],
];

static SINGLE_BYTE_INDEX: LazyLock<HashMap<&'static str, u8>> = LazyLock::new(|| {
    SINGLE_BYTE_TOKENS
        .iter()
        .enumerate()
        .skip(1)
        .map(|(index, token)| (*token, index as u8))
        .collect()
});

static DOUBLE_BYTE_INDEX: LazyLock<HashMap<&'static str, (u8, u8)>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for (dictionary, tokens) in DOUBLE_BYTE_TOKENS.iter().enumerate() {
        for (index, token) in tokens.iter().enumerate() {
            // first occurrence wins, matching a linear scan over the tables
            map.entry(*token).or_insert((dictionary as u8, index as u8));
        }
    }
    map
});

/// Single-byte code for `value`, if it is in the primary table.
pub fn single_byte_index(value: &str) -> Option<u8> {
    SINGLE_BYTE_INDEX.get(value).copied()
}

/// `(dictionary, index)` for `value`, if it is in one of the secondary tables.
pub fn double_byte_index(value: &str) -> Option<(u8, u8)> {
    DOUBLE_BYTE_INDEX.get(value).copied()
}

pub fn single_byte_token(index: u8) -> Option<&'static str> {
    if index == LIST_EMPTY {
        return None;
    }
    SINGLE_BYTE_TOKENS.get(index as usize).copied()
}

pub fn double_byte_token(dictionary: u8, index: u8) -> Option<&'static str> {
    DOUBLE_BYTE_TOKENS
        .get(dictionary as usize)
        .and_then(|tokens| tokens.get(index as usize))
        .copied()
}
