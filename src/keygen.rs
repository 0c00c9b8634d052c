//! Unattended key generation parameters.
//!
//! Keys are generated from a parameter file passed to `--gen-key` in batch
//! mode. The file lives in a temporary location for the duration of one
//! invocation and may hold the passphrase, so it is never kept afterwards.

use std::io::Write;

use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::types::GenerateKeyParams;
use crate::validation::validate_batch_field;

const KEY_TYPE: &str = "eddsa";
const KEY_CURVE: &str = "ed25519";
const SUBKEY_TYPE: &str = "ecdh";
const SUBKEY_CURVE: &str = "cv25519";

static REVOCATION_CERT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"openpgp-revocs\.d[/\\]([0-9A-Fa-f]{40})\.rev").unwrap());
static ANY_FINGERPRINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9A-Fa-f]{40}\b").unwrap());

/// Builds `Name (comment) <email>`, leaving out the parts that are absent.
pub fn user_id_string(name: &str, comment: Option<&str>, email: Option<&str>) -> String {
    let mut uid = name.trim().to_string();
    if let Some(comment) = comment.map(str::trim).filter(|c| !c.is_empty()) {
        uid.push_str(&format!(" ({comment})"));
    }
    if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
        uid.push_str(&format!(" <{email}>"));
    }
    uid
}

/// Renders the parameter file for an ed25519 signing key with a cv25519
/// encryption subkey that never expires.
pub fn batch_parameters(params: &GenerateKeyParams) -> Result<String> {
    let name = params.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidArguments(
            "a name is required to generate a key".to_string(),
        ));
    }

    validate_batch_field("Name-Real", name)?;
    let mut lines = vec![
        format!("Key-Type: {KEY_TYPE}"),
        format!("Key-Curve: {KEY_CURVE}"),
        "Key-Usage: sign".to_string(),
        format!("Subkey-Type: {SUBKEY_TYPE}"),
        format!("Subkey-Curve: {SUBKEY_CURVE}"),
        "Subkey-Usage: encrypt".to_string(),
        "Expire-Date: 0".to_string(),
        format!("Name-Real: {name}"),
    ];

    if let Some(comment) = params.comment.as_deref().filter(|c| !c.trim().is_empty()) {
        validate_batch_field("Name-Comment", comment)?;
        lines.push(format!("Name-Comment: {}", comment.trim()));
    }

    if let Some(email) = params.email.as_deref().filter(|e| !e.trim().is_empty()) {
        validate_batch_field("Name-Email", email)?;
        lines.push(format!("Name-Email: {}", email.trim()));
    }

    match params.passphrase.as_deref().filter(|p| !p.is_empty()) {
        Some(passphrase) => {
            validate_batch_field("Passphrase", passphrase)?;
            lines.push(format!("Passphrase: {passphrase}"));
        }
        None => lines.push("%no-protection".to_string()),
    }

    lines.push("%commit".to_string());

    let mut rendered = lines.join("\n");
    rendered.push('\n');
    Ok(rendered)
}

/// Writes the parameter file to a fresh temporary file.
///
/// The file is removed when the returned handle is dropped.
pub fn write_batch_file(params: &GenerateKeyParams) -> Result<NamedTempFile> {
    let contents = batch_parameters(params)?;
    let mut file = tempfile::Builder::new()
        .prefix("gpg-keygen-")
        .suffix(".batch")
        .tempfile()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Extracts the new key's fingerprint from key-generation output.
///
/// The revocation certificate's file name is preferred; any other
/// 40-character hex token is the fallback.
pub fn fingerprint_from_output(text: &str) -> Option<String> {
    REVOCATION_CERT
        .captures(text)
        .map(|c| c[1].to_uppercase())
        .or_else(|| ANY_FINGERPRINT.find(text).map(|m| m.as_str().to_uppercase()))
}
