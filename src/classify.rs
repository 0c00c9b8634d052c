//! Interpretation of the tool's two output channels.
//!
//! `gpg` has no single reliable failure signal: some successful operations
//! report only on stderr, some failures exit zero, and some error messages
//! end up on stdout. The [`Classifier`] applies a [`RuleSet`] of known text
//! patterns in a fixed order to reach one judgment per invocation.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::types::{ClassifiedResult, ErrorKind, ProcessOutcome};

static ENCRYPTED_WITH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"encrypted with.+created \d{4}-\d{2}-\d{2}").unwrap());

static VERSION_BANNER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"gpg \(GnuPG\) \d+\.\d+\.\d+; Copyright").unwrap());

static KEY_IMPORTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"key [0-9A-Fa-f]+: (?:public|secret) key .*imported").unwrap());

static KEY_NOT_CHANGED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"key [0-9A-Fa-f]+: .*not changed").unwrap());

static QUOTED_USER_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^\s+"[^"]*"\s*$"#).unwrap());

static IMPORT_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^gpg:\s{2,}[\w /-]+: \d+\s*$").unwrap());

static HOMEDIR_CREATED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:directory|keybox) '.+' created").unwrap());

/// A literal substring or a regular expression, matched case-sensitively.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Regex)
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Literal(literal) => text.contains(literal.as_str()),
            Self::Regex(re) => re.is_match(text),
        }
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Self::Regex(re)
    }
}

/// Output text that indicates an error of a known kind.
#[derive(Debug, Clone)]
pub struct ErrorSignature {
    pub pattern: Pattern,
    pub kind: ErrorKind,
    /// Human-readable message reported when this signature fires.
    pub message: String,
}

/// Known-pattern tables for one version family of the tool.
///
/// `stderr_benign` matches secondary-channel lines that are informational;
/// any other non-blank secondary line is an error. `error_signatures` lists
/// text that indicates failure on whichever channel carried the result.
/// Signatures are tried in order and the first match wins.
#[derive(Debug, Clone)]
pub struct RuleSet {
    version: String,
    stderr_benign: Vec<Pattern>,
    error_signatures: Vec<ErrorSignature>,
}

impl RuleSet {
    /// A rule set with no patterns at all.
    pub fn empty(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            stderr_benign: Vec::new(),
            error_signatures: Vec::new(),
        }
    }

    /// Patterns observed with GnuPG 2.2.
    pub fn gnupg_2_2() -> Self {
        Self::empty("gnupg-2.2")
            .with_benign(ENCRYPTED_WITH.clone())
            .with_benign(QUOTED_USER_ID.clone())
            .with_benign(VERSION_BANNER.clone())
            .with_benign(Pattern::literal(
                "This is free software: you are free to change and redistribute it.",
            ))
            .with_benign(Pattern::literal(
                "There is NO WARRANTY, to the extent permitted by law.",
            ))
            .with_benign(Pattern::literal("usage: gpg"))
            .with_benign(Pattern::literal("marked as ultimately trusted"))
            .with_benign(Pattern::literal("revocation certificate stored as"))
            .with_signature(
                Pattern::literal("No such file or directory"),
                ErrorKind::FileNotFound,
                "input file does not exist",
            )
            .with_signature(
                Pattern::literal("no valid OpenPGP data found"),
                ErrorKind::NoPgpData,
                "no valid OpenPGP data found",
            )
            .with_signature(
                Pattern::literal("No secret key"),
                ErrorKind::NoSecretKey,
                "no matching secret key",
            )
            .with_signature(
                Pattern::literal("[don't know]: invalid packet"),
                ErrorKind::NoPgpData,
                "input contains an invalid packet",
            )
    }

    /// Patterns observed with GnuPG 2.4, which reports import and
    /// keyring-creation progress on stderr.
    pub fn gnupg_2_4() -> Self {
        let mut rules = Self::gnupg_2_2()
            .with_benign(KEY_IMPORTED.clone())
            .with_benign(KEY_NOT_CHANGED.clone())
            .with_benign(Pattern::literal("Total number processed:"))
            .with_benign(IMPORT_COUNT.clone())
            .with_benign(HOMEDIR_CREATED.clone())
            .with_benign(Pattern::literal("trustdb created"));
        rules.version = "gnupg-2.4".to_string();
        rules
    }

    pub fn with_benign(mut self, pattern: impl Into<Pattern>) -> Self {
        self.stderr_benign.push(pattern.into());
        self
    }

    pub fn with_signature(
        mut self,
        pattern: impl Into<Pattern>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        self.error_signatures.push(ErrorSignature {
            pattern: pattern.into(),
            kind,
            message: message.into(),
        });
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether one line of secondary output is informational.
    pub fn is_benign(&self, line: &str) -> bool {
        self.stderr_benign.iter().any(|p| p.is_match(line))
    }

    /// The secondary-channel lines no benign pattern accounts for, or `None`
    /// when every line is blank or informational.
    pub fn unexplained_secondary(&self, secondary: &str) -> Option<String> {
        let lines: Vec<&str> = secondary
            .lines()
            .filter(|line| !line.trim().is_empty() && !self.is_benign(line))
            .collect();
        (!lines.is_empty()).then(|| lines.join("\n").trim().to_string())
    }

    pub fn signature_for(&self, text: &str) -> Option<&ErrorSignature> {
        self.error_signatures.iter().find(|s| s.pattern.is_match(text))
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::gnupg_2_4()
    }
}

/// Turns a [`ProcessOutcome`] into a [`ClassifiedResult`].
///
/// The exit code is advisory: the pattern-based judgment decides, except
/// when neither channel carries any text and the exit code is non-zero.
/// Classification is a pure function of the outcome and the rule set.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: RuleSet,
}

impl Classifier {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn classify(&self, outcome: &ProcessOutcome) -> ClassifiedResult {
        let primary = outcome.primary_text.as_str();
        let secondary = outcome.secondary_text.as_str();
        let primary_blank = primary.trim().is_empty();
        let secondary_blank = secondary.trim().is_empty();

        // Some operations (import, verification) report only on stderr.
        let output = if primary_blank && !secondary_blank {
            secondary
        } else {
            primary
        };

        let secondary_error = match self.rules.unexplained_secondary(secondary) {
            Some(remaining) => {
                let kind = self
                    .rules
                    .signature_for(&remaining)
                    .map(|s| s.kind)
                    .unwrap_or(ErrorKind::Unknown);
                Some((kind, remaining))
            }
            None => {
                if !secondary_blank {
                    debug!(
                        rules = self.rules.version(),
                        "secondary output is informational"
                    );
                }
                None
            }
        };

        let error = secondary_error
            .or_else(|| {
                self.rules
                    .signature_for(output)
                    .map(|s| (s.kind, s.message.clone()))
            })
            .or_else(|| {
                (primary_blank && secondary_blank && outcome.exit_code != 0).then(|| {
                    (
                        ErrorKind::Unknown,
                        format!("exited with status {} without output", outcome.exit_code),
                    )
                })
            });

        let result = match error {
            None => ClassifiedResult {
                ok: true,
                output: output.to_string(),
                error_kind: None,
                detail: None,
                exit_code: outcome.exit_code,
            },
            Some((kind, detail)) => ClassifiedResult {
                ok: false,
                output: if primary_blank && secondary_blank {
                    String::new()
                } else {
                    output.to_string()
                },
                error_kind: Some(kind),
                detail: Some(detail),
                exit_code: outcome.exit_code,
            },
        };

        debug!(
            ok = result.ok,
            error_kind = ?result.error_kind,
            exit_code = outcome.exit_code,
            "classified gpg output"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(primary: &str, secondary: &str, exit_code: i32) -> ClassifiedResult {
        Classifier::default().classify(&ProcessOutcome::new(primary, secondary, exit_code))
    }

    #[test]
    fn test_clean_success() {
        let result = classify("-----BEGIN PGP MESSAGE-----\n", "", 0);
        assert!(result.ok);
        assert_eq!(result.output, "-----BEGIN PGP MESSAGE-----\n");
        assert!(result.error_kind.is_none());
    }

    #[test]
    fn test_benign_secondary_suppressed() {
        let result = classify(
            "secret plaintext",
            "gpg: encrypted with 256-bit ECDH key, ID 1234ABCD, created 2024-01-01\n      \"Alice <alice@example.com>\"",
            0,
        );
        assert!(result.ok);
        assert_eq!(result.output, "secret plaintext");
    }

    #[test]
    fn test_keygen_noise_is_benign() {
        let stderr = "gpg: key 0123456789ABCDEF marked as ultimately trusted\n\
gpg: revocation certificate stored as '/home/u/.gnupg/openpgp-revocs.d/ABCDEF0123456789ABCDEF0123456789ABCDEF01.rev'";
        let result = classify("", stderr, 0);
        assert!(result.ok);
        assert_eq!(result.output, stderr);
    }

    #[test]
    fn test_redirected_import_output() {
        let stderr = "gpg: key 0123456789ABCDEF: public key \"Alice <alice@example.com>\" imported\n\
gpg: Total number processed: 1\n\
gpg:               imported: 1";
        let result = classify("", stderr, 0);
        assert!(result.ok);
        assert_eq!(result.output, stderr);
    }

    #[test]
    fn test_import_rules_absent_in_older_set() {
        let stderr = "gpg: key 0123456789ABCDEF: public key \"Alice\" imported";
        let result = Classifier::new(RuleSet::gnupg_2_2())
            .classify(&ProcessOutcome::new("", stderr, 0));
        assert!(!result.ok);
        assert_eq!(result.error_kind, Some(ErrorKind::Unknown));
    }

    #[test]
    fn test_secondary_error_recognized() {
        let result = classify("", "gpg: no valid OpenPGP data found.", 2);
        assert!(!result.ok);
        assert_eq!(result.error_kind, Some(ErrorKind::NoPgpData));
        assert_eq!(
            result.detail.as_deref(),
            Some("gpg: no valid OpenPGP data found.")
        );
    }

    #[test]
    fn test_unrecognized_secondary_is_unknown_with_raw_text() {
        let result = classify("", "gpg: something odd happened", 2);
        assert!(!result.ok);
        assert_eq!(result.error_kind, Some(ErrorKind::Unknown));
        assert_eq!(result.detail.as_deref(), Some("gpg: something odd happened"));
    }

    #[test]
    fn test_signature_in_primary_output() {
        let result = classify("gpg: decryption failed: No secret key", "", 0);
        assert!(!result.ok);
        assert_eq!(result.error_kind, Some(ErrorKind::NoSecretKey));
        assert_eq!(result.detail.as_deref(), Some("no matching secret key"));
    }

    #[test]
    fn test_signature_behind_benign_secondary() {
        let stderr = "gpg: encrypted with 256-bit ECDH key, ID 1234ABCD, created 2024-01-01\n\
gpg: decryption failed: No secret key";
        let result = classify("", stderr, 2);
        assert!(!result.ok);
        assert_eq!(result.error_kind, Some(ErrorKind::NoSecretKey));
    }

    #[test]
    fn test_benign_line_does_not_hide_failure() {
        let stderr = "gpg: keybox '/tmp/h/pubring.kbx' created\n\
gpg: bob@example.org: skipped: No public key\n\
gpg: [stdin]: encryption failed: No public key\n";
        let result = classify("", stderr, 2);
        assert!(!result.ok);
        assert_eq!(result.error_kind, Some(ErrorKind::Unknown));
        assert_eq!(result.output, stderr);
        assert_eq!(
            result.detail.as_deref(),
            Some(
                "gpg: bob@example.org: skipped: No public key\n\
gpg: [stdin]: encryption failed: No public key"
            )
        );
    }

    #[test]
    fn test_failed_import_behind_summary() {
        let stderr = "gpg: key 0123456789ABCDEF: no valid user IDs\n\
gpg: this may be caused by a missing self-signature\n\
gpg: Total number processed: 1\n\
gpg:           w/o user IDs: 1";
        let result = classify("", stderr, 2);
        assert!(!result.ok);
        assert_eq!(result.error_kind, Some(ErrorKind::Unknown));
        let detail = result.detail.unwrap();
        assert!(detail.starts_with("gpg: key 0123456789ABCDEF: no valid user IDs"));
        assert!(!detail.contains("Total number processed"));
    }

    #[test]
    fn test_benign_line_with_primary_output_and_error() {
        let result = classify(
            "-----BEGIN PGP MESSAGE-----\n",
            "gpg: directory '/tmp/h' created\ngpg: WARNING: unsafe permissions on homedir '/tmp/h'",
            0,
        );
        assert!(!result.ok);
        assert_eq!(result.output, "-----BEGIN PGP MESSAGE-----\n");
        assert_eq!(result.error_kind, Some(ErrorKind::Unknown));
        assert_eq!(
            result.detail.as_deref(),
            Some("gpg: WARNING: unsafe permissions on homedir '/tmp/h'")
        );
    }

    #[test]
    fn test_unexplained_secondary() {
        let rules = RuleSet::default();
        assert_eq!(rules.unexplained_secondary(""), None);
        assert_eq!(
            rules.unexplained_secondary("gpg: trustdb created\n\n  \n"),
            None
        );
        assert_eq!(
            rules
                .unexplained_secondary("gpg: trustdb created\ngpg: oops\n")
                .as_deref(),
            Some("gpg: oops")
        );
    }

    #[test]
    fn test_secondary_error_wins_over_signature() {
        let result = classify(
            "gpg: can't open 'missing.txt': No such file or directory",
            "gpg: signing failed: Inappropriate ioctl for device",
            2,
        );
        assert!(!result.ok);
        assert_eq!(result.error_kind, Some(ErrorKind::Unknown));
        assert!(result.detail.unwrap().contains("Inappropriate ioctl"));
    }

    #[test]
    fn test_exit_code_is_advisory() {
        let result = classify("key listing", "", 2);
        assert!(result.ok);
        assert_eq!(result.exit_code, 2);

        let result = classify("", "gpg: key 0123ABCD marked as ultimately trusted", 1);
        assert!(result.ok);
    }

    #[test]
    fn test_silent_failure_is_unknown() {
        let result = classify("", "", 2);
        assert!(!result.ok);
        assert_eq!(result.error_kind, Some(ErrorKind::Unknown));
        assert_eq!(result.output, "");
    }

    #[test]
    fn test_silent_success() {
        let result = classify("", "", 0);
        assert!(result.ok);
        assert_eq!(result.output, "");
    }

    #[test]
    fn test_classification_is_deterministic() {
        let outcome = ProcessOutcome::new("out", "gpg: weird", 1);
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(&outcome), classifier.classify(&outcome));
    }

    #[test]
    fn test_injected_rule_set() {
        let rules = RuleSet::empty("test")
            .with_benign(Pattern::literal("just chatting"))
            .with_signature(
                Pattern::regex(r"^E\d{3}").unwrap(),
                ErrorKind::NoPgpData,
                "coded failure",
            );
        let classifier = Classifier::new(rules);

        assert!(
            classifier
                .classify(&ProcessOutcome::new("", "just chatting", 0))
                .ok
        );

        let result = classifier.classify(&ProcessOutcome::new("E042 bad", "", 0));
        assert_eq!(result.error_kind, Some(ErrorKind::NoPgpData));
        assert_eq!(result.detail.as_deref(), Some("coded failure"));

        // Default signatures are not part of an injected set.
        assert!(
            classifier
                .classify(&ProcessOutcome::new("No secret key", "", 0))
                .ok
        );
    }

    #[test]
    fn test_rule_set_versions() {
        assert_eq!(RuleSet::gnupg_2_2().version(), "gnupg-2.2");
        assert_eq!(RuleSet::gnupg_2_4().version(), "gnupg-2.4");
        assert_eq!(RuleSet::default().version(), "gnupg-2.4");
    }

    #[test]
    fn test_literal_patterns_are_not_regexes() {
        let pattern = Pattern::literal("gpg (GnuPG)");
        assert!(pattern.is_match("gpg (GnuPG) 2.4.5"));
        assert!(!pattern.is_match("gpg GnuPG"));
    }
}
