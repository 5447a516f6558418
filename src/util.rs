use std::time::{SystemTime, UNIX_EPOCH};

const HEX: &[u8; 16] = b"0123456789abcdef";

#[inline]
pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

#[inline]
pub(crate) fn format_request_seq_hex(prefix: &str, request_seq: u64) -> String {
    let mut out = String::with_capacity(prefix.len() + 16);
    out.push_str(prefix);
    push_u64_hex_16(&mut out, request_seq);
    out
}

#[inline]
fn push_u64_hex_16(out: &mut String, mut value: u64) {
    let mut buf = [b'0'; 16];
    let mut idx = 16;
    while idx > 0 {
        idx -= 1;
        let nibble = usize::try_from(value & 0x0f).unwrap_or(0);
        buf[idx] = HEX[nibble];
        value >>= 4;
    }
    for byte in buf {
        out.push(char::from(byte));
    }
}

/// Random (version 4) UUID in its hyphenated lowercase form.
#[must_use]
pub(crate) fn random_uuid() -> String {
    let bytes = fastrand::u128(..).to_le_bytes();
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string()
}

/// Byte offset of the longest common prefix of `a` and `b`, always on a char boundary.
#[must_use]
pub(crate) fn common_prefix_len(a: &str, b: &str) -> usize {
    let mut len = 0;
    for ((idx, left), right) in a.char_indices().zip(b.chars()) {
        if left != right {
            return idx;
        }
        len = idx + left.len_utf8();
    }
    len
}

#[cfg(test)]
mod tests {
    use super::{common_prefix_len, format_request_seq_hex, random_uuid};

    #[test]
    fn format_request_seq_hex_matches_formatter() {
        assert_eq!(
            format_request_seq_hex("chatcmpl-", 0x1234_abcd_u64),
            "chatcmpl-000000001234abcd"
        );
        assert_eq!(
            format_request_seq_hex("chatcmpl-", u64::MAX),
            "chatcmpl-ffffffffffffffff"
        );
    }

    #[test]
    fn random_uuid_is_v4_and_unique() {
        let first = random_uuid();
        let second = random_uuid();
        assert_ne!(first, second);
        let parsed = uuid::Uuid::parse_str(&first).expect("valid uuid");
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(first.len(), 36);
    }

    #[test]
    fn common_prefix_respects_char_boundaries() {
        assert_eq!(common_prefix_len("Hello", "Hello world"), 5);
        assert_eq!(common_prefix_len("Hello world", "Hello"), 5);
        assert_eq!(common_prefix_len("abc", "xyz"), 0);
        assert_eq!(common_prefix_len("", "abc"), 0);
        // 'é' and 'è' share their first UTF-8 byte.
        assert_eq!(common_prefix_len("caf\u{e9}", "caf\u{e8}"), 3);
        assert_eq!(common_prefix_len("日本語", "日本人"), "日本".len());
    }
}
