use crate::error::{Error, Result};

/// Hex lengths the tool accepts as an exact key reference: short and long
/// key ids, v4 fingerprints and v5 fingerprints.
const KEY_ID_LENGTHS: [usize; 4] = [8, 16, 40, 64];

/// Normalizes a key id or fingerprint to bare uppercase hex.
///
/// A `0x` prefix and the spaces of the grouped form the tool prints
/// (`ABCD EF01 ...`) are dropped first.
pub fn normalize_key_id(key_id: &str) -> Result<String> {
    let invalid = |reason: String| Error::InvalidKeyId {
        keyid: key_id.to_string(),
        reason,
    };

    let trimmed = key_id.trim();
    let bare = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let hex: String = bare
        .chars()
        .filter(|c| *c != ' ')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if hex.is_empty() {
        return Err(invalid("no key id given".to_string()));
    }
    if let Some(bad) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(invalid(format!("unexpected character {bad:?}")));
    }
    if !KEY_ID_LENGTHS.contains(&hex.len()) {
        return Err(invalid(format!(
            "{} hex digits is not a key id or fingerprint length",
            hex.len()
        )));
    }

    Ok(hex)
}

/// Validates a free-form key search term (name, email, fingerprint fragment).
///
/// The term must not be empty, must not look like an option and must not
/// contain control characters.
pub fn validate_identifier(identifier: &str) -> Result<&str> {
    if identifier.trim().is_empty() {
        return Err(Error::InvalidArguments(
            "key identifier cannot be empty".to_string(),
        ));
    }

    if identifier.starts_with('-') {
        return Err(Error::InvalidArguments(format!(
            "key identifier '{identifier}' must not start with '-'"
        )));
    }

    if identifier.chars().any(char::is_control) {
        return Err(Error::InvalidArguments(
            "key identifier must not contain control characters".to_string(),
        ));
    }

    Ok(identifier)
}

/// Validates a value written into a key-generation parameter file.
///
/// Line breaks would let the value inject further parameters.
pub fn validate_batch_field(field: &str, value: &str) -> Result<()> {
    if value.contains(['\n', '\r', '\0']) {
        return Err(Error::InvalidArguments(format!(
            "{field} must not contain line breaks"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key_id() {
        assert_eq!(normalize_key_id("0a1b2c3d").unwrap(), "0A1B2C3D");
        assert_eq!(normalize_key_id("0xFEDCBA9876543210").unwrap(), "FEDCBA9876543210");
        assert_eq!(
            normalize_key_id("ABCD EF01 2345 6789 ABCD  EF01 2345 6789 ABCD EF01").unwrap(),
            "ABCDEF0123456789ABCDEF0123456789ABCDEF01"
        );
        assert_eq!(normalize_key_id(&"a".repeat(64)).unwrap(), "A".repeat(64));
    }

    #[test]
    fn test_rejected_key_ids() {
        for key_id in ["", "0x", "0A1B2C3G", "0A1B2C", "--delete-key", "alice@example.com"] {
            let err = normalize_key_id(key_id).unwrap_err();
            assert!(matches!(err, Error::InvalidKeyId { .. }), "{key_id}");
        }
    }

    #[test]
    fn test_valid_identifiers() {
        assert_eq!(validate_identifier("alice").unwrap(), "alice");
        assert_eq!(
            validate_identifier("Alice <alice@example.com>").unwrap(),
            "Alice <alice@example.com>"
        );
        assert!(validate_identifier("0xDEADBEEF").is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        for identifier in ["", "   ", "--delete-secret-key", "-v", "alice\nbob", "a\tb"] {
            let err = validate_identifier(identifier).unwrap_err();
            assert!(matches!(err, Error::InvalidArguments(_)), "{identifier:?}");
        }
    }

    #[test]
    fn test_batch_field() {
        assert!(validate_batch_field("Name-Real", "Alice Example").is_ok());
        assert!(validate_batch_field("Passphrase", "p@ss: word").is_ok());

        let err = validate_batch_field("Name-Real", "Alice\nPassphrase: x").unwrap_err();
        assert!(err.to_string().contains("Name-Real"));
        assert!(validate_batch_field("Name-Email", "a\r@b").is_err());
    }
}
