//! Deterministic names and identifiers
//!
//! Everything is derived from a blake3 hash of the node identity, so repeated
//! previews of the same stack produce the same values.

use base64::{Engine, engine::general_purpose::STANDARD};

/// Hex digest of an identity, salted per attribute
pub fn digest(identity: &str, salt: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"\0");
    hasher.update(identity.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Provider-style auto-name: identity plus a 7-character hex suffix
pub fn autoname(identity: &str) -> String {
    format!("{identity}-{}", &digest(identity, "name")[..7])
}

/// UUID-shaped identifier
pub fn uuid(identity: &str, salt: &str) -> String {
    let hex = digest(identity, salt);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Opaque base64 token of roughly `len` characters
pub fn token(identity: &str, salt: &str, len: usize) -> String {
    let mut encoded = String::new();
    let mut round = 0usize;
    while encoded.len() < len {
        encoded.push_str(&STANDARD.encode(digest(identity, &format!("{salt}{round}"))));
        round += 1;
    }
    encoded.truncate(len);
    encoded
}

/// AWS-style access key id (`AKIA` + 16 uppercase characters)
pub fn access_key_id(identity: &str) -> String {
    format!("AKIA{}", digest(identity, "access-key")[..16].to_uppercase())
}

/// Private IPv4 address in 10.0.0.0/8
pub fn private_ip(identity: &str) -> String {
    let hash = blake3::hash(identity.as_bytes());
    let bytes = hash.as_bytes();
    format!("10.{}.{}.{}", bytes[0], bytes[1], bytes[2].max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autoname_is_stable_and_suffixed() {
        let name = autoname("chartmuseum-demo-bucket");
        assert_eq!(name, autoname("chartmuseum-demo-bucket"));
        assert_ne!(name, autoname("chartmuseum-other-bucket"));

        let suffix = name.strip_prefix("chartmuseum-demo-bucket-").unwrap();
        assert_eq!(suffix.len(), 7);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_identifier_shapes() {
        let key = access_key_id("user");
        assert_eq!(key.len(), 20);
        assert!(key.starts_with("AKIA"));

        assert_eq!(uuid("app", "application").len(), 36);
        assert_eq!(token("key", "secret", 40).len(), 40);
        assert_ne!(digest("a", "x"), digest("a", "y"));
        assert!(private_ip("cluster").starts_with("10."));
    }
}
