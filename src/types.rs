use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Stable categories of failure reported by this crate.
///
/// The external tool's error text differs between versions and operations;
/// the classifier maps the text it recognizes onto one of these kinds and
/// falls back to [`ErrorKind::Unknown`] for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A referenced input path does not exist.
    FileNotFound,
    /// The payload is not recognizable key or ciphertext material.
    NoPgpData,
    /// A secret-key operation found no matching secret key.
    NoSecretKey,
    /// No known pattern matched, but the output indicates failure.
    Unknown,
    /// Caller-supplied parameters failed a precondition check.
    InvalidArguments,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileNotFound => "file-not-found",
            Self::NoPgpData => "no-pgp-data",
            Self::NoSecretKey => "no-secret-key",
            Self::Unknown => "unknown",
            Self::InvalidArguments => "invalid-arguments",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw result of one subprocess invocation, collected after the process exited.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutcome {
    pub primary_text: String,
    pub secondary_text: String,
    /// Exit code of the process, or -1 when it was terminated by a signal.
    pub exit_code: i32,
}

impl ProcessOutcome {
    pub fn new(
        primary_text: impl Into<String>,
        secondary_text: impl Into<String>,
        exit_code: i32,
    ) -> Self {
        Self {
            primary_text: primary_text.into(),
            secondary_text: secondary_text.into(),
            exit_code,
        }
    }
}

/// The authoritative success/failure judgment for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedResult {
    pub ok: bool,
    /// Text the caller should treat as the operation's result.
    pub output: String,
    pub error_kind: Option<ErrorKind>,
    /// Raw secondary-channel text or the matched signature's message.
    pub detail: Option<String>,
    /// Advisory only; see [`Classifier`](crate::Classifier).
    pub exit_code: i32,
}

impl ClassifiedResult {
    /// Converts into a `Result`, yielding the output on success.
    pub fn into_result(self) -> Result<String> {
        if self.ok {
            return Ok(self.output);
        }

        Err(Error::Gpg {
            kind: self.error_kind.unwrap_or(ErrorKind::Unknown),
            exit_code: self.exit_code,
            message: self.detail.unwrap_or(self.output),
        })
    }
}

/// Whether a record describes a primary key or a subkey.
///
/// Records are subkeys when their anchoring line is a `sub`/`ssb` line,
/// which the default listing rules never anchor on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyKind {
    #[default]
    Primary,
    Sub,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Sub => "sub",
        }
    }
}

/// Which keyring a record was listed from, derived from the anchoring line's
/// prefix (`sec`/`ssb` are secret).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyClass {
    #[default]
    Public,
    Secret,
}

/// One listed key.
///
/// Text fields that were not present in the listing are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyRecord {
    pub kind: KeyKind,
    pub class: KeyClass,
    /// The line that anchored this record.
    pub start_line: String,
    /// 40-character hexadecimal fingerprint.
    pub fingerprint: String,
    pub user_id: String,
    pub subkey_line: String,
}

impl KeyRecord {
    /// Text fields in the order the matcher searches them.
    pub fn text_fields(&self) -> [&str; 4] {
        [
            &self.start_line,
            &self.fingerprint,
            &self.user_id,
            &self.subkey_line,
        ]
    }
}

/// Keys in the order the tool listed them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyListing(Vec<KeyRecord>);

impl KeyListing {
    pub fn new(records: Vec<KeyRecord>) -> Self {
        Self(records)
    }

    pub fn into_vec(self) -> Vec<KeyRecord> {
        self.0
    }
}

impl Deref for KeyListing {
    type Target = [KeyRecord];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<KeyRecord>> for KeyListing {
    fn from(records: Vec<KeyRecord>) -> Self {
        Self(records)
    }
}

impl FromIterator<KeyRecord> for KeyListing {
    fn from_iter<I: IntoIterator<Item = KeyRecord>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for KeyListing {
    type Item = KeyRecord;
    type IntoIter = std::vec::IntoIter<KeyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a KeyListing {
    type Item = &'a KeyRecord;
    type IntoIter = std::slice::Iter<'a, KeyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Public and secret listings returned by [`Keyring::list_keys`].
///
/// A listing that was not requested stays empty.
///
/// [`Keyring::list_keys`]: crate::Keyring::list_keys
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyListings {
    pub public: KeyListing,
    pub secret: KeyListing,
}

/// Selects the public keyring, the secret keyring, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeySelector {
    #[default]
    Public,
    Secret,
    All,
}

impl KeySelector {
    pub fn includes_public(&self) -> bool {
        matches!(self, Self::Public | Self::All)
    }

    pub fn includes_secret(&self) -> bool {
        matches!(self, Self::Secret | Self::All)
    }
}

/// A user id split into its conventional `Name (comment) <email>` parts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserId {
    pub name: String,
    pub comment: String,
    pub email: String,
}

/// Parameters for [`Keyring::generate_key`](crate::Keyring::generate_key).
#[derive(Debug, Clone, Default)]
pub struct GenerateKeyParams {
    pub name: String,
    pub comment: Option<String>,
    pub email: Option<String>,
    /// Without a passphrase the key is generated unprotected.
    pub passphrase: Option<String>,
}

/// Result of a key generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedKey {
    pub result: ClassifiedResult,
    /// Fingerprint of the new key, when the tool reported it.
    pub fingerprint: Option<String>,
}

/// Options for [`Keyring::encrypt`](crate::Keyring::encrypt).
#[derive(Debug, Clone, Default)]
pub struct EncryptOptions {
    /// Write the ciphertext to this file instead of returning it.
    pub destination: Option<PathBuf>,
    /// Use a passphrase instead of a recipient's public key.
    pub symmetric: bool,
    pub passphrase: Option<String>,
}

/// Settings for how the external tool is invoked.
#[derive(Debug, Clone)]
pub struct KeyringOptions {
    /// Program to execute.
    pub program: PathBuf,
    /// Passed as `--homedir`; the tool's default home directory when `None`.
    pub homedir: Option<PathBuf>,
    /// Timeout for each invocation, in seconds.
    /// If None, no timeout is applied.
    pub timeout_secs: Option<u64>,
}

impl Default for KeyringOptions {
    fn default() -> Self {
        Self {
            program: PathBuf::from(crate::keyring::DEFAULT_GPG_PROGRAM),
            homedir: None,
            timeout_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result_ok() {
        let result = ClassifiedResult {
            ok: true,
            output: "armored".to_string(),
            error_kind: None,
            detail: None,
            exit_code: 0,
        };
        assert_eq!(result.into_result().unwrap(), "armored");
    }

    #[test]
    fn test_into_result_prefers_detail() {
        let result = ClassifiedResult {
            ok: false,
            output: "partial".to_string(),
            error_kind: Some(ErrorKind::NoPgpData),
            detail: Some("gpg: no valid OpenPGP data found.".to_string()),
            exit_code: 2,
        };
        match result.into_result().unwrap_err() {
            Error::Gpg {
                kind,
                exit_code,
                message,
            } => {
                assert_eq!(kind, ErrorKind::NoPgpData);
                assert_eq!(exit_code, 2);
                assert!(message.contains("no valid OpenPGP data"));
            }
            other => panic!("expected Gpg error, got {other:?}"),
        }
    }

    #[test]
    fn test_into_result_missing_kind_is_unknown() {
        let result = ClassifiedResult {
            ok: false,
            output: String::new(),
            error_kind: None,
            detail: None,
            exit_code: 1,
        };
        assert_eq!(result.into_result().unwrap_err().kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_key_selector() {
        assert!(KeySelector::Public.includes_public());
        assert!(!KeySelector::Public.includes_secret());
        assert!(KeySelector::Secret.includes_secret());
        assert!(!KeySelector::Secret.includes_public());
        assert!(KeySelector::All.includes_public());
        assert!(KeySelector::All.includes_secret());
    }

    #[test]
    fn test_listing_preserves_order() {
        let listing: KeyListing = ["A", "B", "C"]
            .into_iter()
            .map(|fpr| KeyRecord {
                fingerprint: fpr.to_string(),
                ..Default::default()
            })
            .collect();
        let fingerprints: Vec<&str> = listing.iter().map(|k| k.fingerprint.as_str()).collect();
        assert_eq!(fingerprints, ["A", "B", "C"]);
    }

    #[test]
    fn test_default_options() {
        let options = KeyringOptions::default();
        assert_eq!(options.program, PathBuf::from("gpg"));
        assert!(options.homedir.is_none());
        assert!(options.timeout_secs.is_none());
    }
}
