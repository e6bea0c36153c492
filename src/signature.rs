//! Canonical signature strings, selector/topic derivation, and key normalization

use alloy_primitives::{keccak256, B256};

/// Build the canonical signature string `name(type1,type2,...)`.
///
/// Types must already be in selector-canonical form (tuples rendered as
/// `(t1,t2,...)`), which is what [`crate::model::Parameter::ty`] stores.
pub fn canonical_signature<'a, I>(name: &str, types: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut signature = String::with_capacity(name.len() + 2);
    signature.push_str(name);
    signature.push('(');
    for (idx, ty) in types.into_iter().enumerate() {
        if idx > 0 {
            signature.push(',');
        }
        signature.push_str(ty);
    }
    signature.push(')');
    signature
}

/// keccak256 digest of the canonical signature.
pub fn digest<'a, I>(name: &str, types: I) -> B256
where
    I: IntoIterator<Item = &'a str>,
{
    keccak256(canonical_signature(name, types).as_bytes())
}

/// 4-byte selector (functions and custom errors).
pub fn selector<'a, I>(name: &str, types: I) -> [u8; 4]
where
    I: IntoIterator<Item = &'a str>,
{
    let hash = digest(name, types);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Full 32-byte event topic hash. Never truncated.
pub fn topic_hash<'a, I>(name: &str, types: I) -> B256
where
    I: IntoIterator<Item = &'a str>,
{
    digest(name, types)
}

/// Normalize a signature hash string into its index-key form:
/// strip an optional `0x`/`0X` prefix and lowercase the rest.
///
/// Two signature strings refer to the same hash iff their normalized
/// keys are equal.
pub fn normalize_key(signature: &str) -> String {
    signature
        .strip_prefix("0x")
        .or_else(|| signature.strip_prefix("0X"))
        .unwrap_or(signature)
        .to_ascii_lowercase()
}

/// Compare two signature hash strings under key normalization.
pub fn same_signature(a: &str, b: &str) -> bool {
    normalize_key(a) == normalize_key(b)
}

/// Extract the 4-byte selector from raw call or revert bytes.
///
/// Returns `None` when the data is too short to be selector-prefixed.
pub fn selector_from_data(data: &[u8]) -> Option<[u8; 4]> {
    if data.len() < 4 {
        return None;
    }
    Some([data[0], data[1], data[2], data[3]])
}

/// Extract the 4-byte selector from a hex string (calldata, revert payload).
///
/// Accepts an optional `0x`/`0X` prefix, any hex case. Returns `None` for
/// anything that does not decode to at least 4 bytes; degenerate input is
/// a miss, never an error.
pub fn selector_from_hex(data: &str) -> Option<[u8; 4]> {
    let normalized = data
        .strip_prefix("0x")
        .or_else(|| data.strip_prefix("0X"))
        .unwrap_or(data);

    let bytes = hex::decode(normalized).ok()?;
    selector_from_data(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_signature() {
        assert_eq!(
            canonical_signature("transfer", ["address", "uint256"]),
            "transfer(address,uint256)"
        );
        assert_eq!(canonical_signature("deposit", []), "deposit()");
    }

    #[test]
    fn test_selector_well_known() {
        // transfer(address,uint256) -> 0xa9059cbb
        assert_eq!(
            selector("transfer", ["address", "uint256"]),
            [0xa9, 0x05, 0x9c, 0xbb]
        );

        // approve(address,uint256) -> 0x095ea7b3
        assert_eq!(
            selector("approve", ["address", "uint256"]),
            [0x09, 0x5e, 0xa7, 0xb3]
        );
    }

    #[test]
    fn test_topic_hash_well_known() {
        // Transfer(address,address,uint256)
        let topic = topic_hash("Transfer", ["address", "address", "uint256"]);
        assert_eq!(
            hex::encode(topic),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_selector_determinism() {
        let a = selector("transfer", ["address", "uint256"]);
        let b = selector("transfer", ["address", "uint256"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("0xA9059CBB"), "a9059cbb");
        assert_eq!(normalize_key("0XA9059cbb"), "a9059cbb");
        assert_eq!(normalize_key("a9059cbb"), "a9059cbb");
        assert!(same_signature("0xA9059CBB", "a9059cbb"));
        assert!(!same_signature("0xa9059cbb", "0x095ea7b3"));
    }

    #[test]
    fn test_selector_from_hex() {
        assert_eq!(
            selector_from_hex("0xa9059cbb"),
            Some([0xa9, 0x05, 0x9c, 0xbb])
        );
        assert_eq!(
            selector_from_hex("A9059CBB0000"),
            Some([0xa9, 0x05, 0x9c, 0xbb])
        );

        // Too short, empty, or not hex at all: a miss, never a panic.
        assert_eq!(selector_from_hex("0x"), None);
        assert_eq!(selector_from_hex("0x123456"), None);
        assert_eq!(selector_from_hex(""), None);
        assert_eq!(selector_from_hex("zzzz"), None);
    }

    #[test]
    fn test_selector_from_data() {
        assert_eq!(selector_from_data(&[0xa9, 0x05, 0x9c, 0xbb, 0x00]), Some([0xa9, 0x05, 0x9c, 0xbb]));
        assert_eq!(selector_from_data(&[0xa9, 0x05, 0x9c]), None);
        assert_eq!(selector_from_data(&[]), None);
    }
}
