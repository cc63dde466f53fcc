use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;

// Create a type alias for the HMAC-SHA256 implementation.
type HmacSha256 = Hmac<Sha256>;

/// Computes an HMAC-SHA256 signature over a canonical string, hex encoded.
///
/// Both venues sign with HMAC-SHA256; only the canonical string differs.
pub fn hmac_sha256_hex(secret: &str, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Canonical string for venue A: `ts || METHOD || path[?query] || bodyJson`.
pub fn canonical_variant_a(
    timestamp_ms: i64,
    method: &str,
    path: &str,
    query: &BTreeMap<String, String>,
    body_json: Option<&str>,
) -> String {
    let mut canonical = format!("{}{}{}", timestamp_ms, method, path);
    if !query.is_empty() {
        canonical.push('?');
        canonical.push_str(&join_query(query));
    }
    if let Some(body) = body_json {
        canonical.push_str(body);
    }
    canonical
}

/// Canonical string for venue B: the sorted `validate-*` header pairs joined
/// with `&`, then `#METHOD#path[#sortedQuery][#body]`.
pub fn canonical_variant_b(
    api_key: &str,
    recv_window: u64,
    timestamp_ms: i64,
    method: &str,
    path: &str,
    query: &BTreeMap<String, String>,
    body_json: Option<&str>,
) -> String {
    // The validate-* headers happen to sort in this order alphabetically.
    let mut canonical = format!(
        "validate-algorithms=HmacSHA256&validate-appkey={}&validate-recvwindow={}&validate-timestamp={}",
        api_key, recv_window, timestamp_ms
    );
    canonical.push('#');
    canonical.push_str(method);
    canonical.push('#');
    canonical.push_str(path);
    if !query.is_empty() {
        canonical.push('#');
        canonical.push_str(&join_query(query));
    }
    if let Some(body) = body_json {
        canonical.push('#');
        canonical.push_str(body);
    }
    canonical
}

/// Joins query parameters as `k=v&k=v` in key order. Callers pass a
/// `BTreeMap`, so iteration is already sorted.
pub fn join_query(query: &BTreeMap<String, String>) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn variant_a_concatenates_ts_method_path_and_body() {
        let canonical = canonical_variant_a(
            1700000000000,
            "POST",
            "/sapi/v1/order",
            &BTreeMap::new(),
            Some(r#"{"symbol":"GCBUSDT"}"#),
        );
        assert_eq!(
            canonical,
            r#"1700000000000POST/sapi/v1/order{"symbol":"GCBUSDT"}"#
        );
    }

    #[test]
    fn variant_a_appends_query_to_path() {
        let canonical = canonical_variant_a(
            1700000000000,
            "GET",
            "/sapi/v1/open-orders",
            &query(&[("symbol", "GCBUSDT"), ("side", "SELL")]),
            None,
        );
        assert_eq!(
            canonical,
            "1700000000000GET/sapi/v1/open-orders?side=SELL&symbol=GCBUSDT"
        );
    }

    #[test]
    fn variant_b_joins_header_pairs_then_request_parts() {
        let canonical = canonical_variant_b(
            "app-key",
            5000,
            1700000000000,
            "DELETE",
            "/open/api/v2/order",
            &query(&[("orderId", "42")]),
            None,
        );
        assert_eq!(
            canonical,
            "validate-algorithms=HmacSHA256&validate-appkey=app-key&validate-recvwindow=5000&validate-timestamp=1700000000000#DELETE#/open/api/v2/order#orderId=42"
        );
    }

    #[test]
    fn hmac_is_stable_and_hex_encoded() {
        let sig = hmac_sha256_hex("secret", "payload");
        assert_eq!(sig.len(), 64);
        assert_eq!(sig, hmac_sha256_hex("secret", "payload"));
        assert_ne!(sig, hmac_sha256_hex("other", "payload"));
    }

    #[test]
    fn sorted_query_is_deterministic() {
        let q = query(&[("b", "2"), ("a", "1"), ("c", "3")]);
        assert_eq!(join_query(&q), "a=1&b=2&c=3");
    }
}
