use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::types::{KeyClass, KeyKind, KeyListing, KeyRecord, UserId};

/// Lines per key block in the tool's human-readable listing: start line,
/// fingerprint, user id, optional subkey.
pub const KEY_BLOCK_LINES: usize = 4;

static KEY_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:pub|sec)\b").unwrap());
static FINGERPRINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9A-Fa-f]{40}\b").unwrap());
static USER_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*uid\b").unwrap());
static SUBKEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:sub|ssb)\b").unwrap());

static LISTING_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap());
static EXPIRY_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[expire[sd]: (\d{4}-\d{2}-\d{2})\]").unwrap());

/// Turns one listing payload into key records.
///
/// Implementations never fail: text they cannot make sense of yields fewer
/// records or empty fields.
pub trait ListingParser: fmt::Debug + Send + Sync {
    /// Extra arguments that make the tool emit the format this parser reads.
    fn listing_args(&self) -> &'static [&'static str];

    fn parse(&self, raw: &str) -> KeyListing;
}

/// Line detectors for the human-readable listing.
#[derive(Debug, Clone)]
pub struct LineRules {
    pub key_start: Regex,
    pub fingerprint: Regex,
    pub user_id: Regex,
    pub subkey: Regex,
}

impl Default for LineRules {
    fn default() -> Self {
        Self {
            key_start: KEY_START.clone(),
            fingerprint: FINGERPRINT.clone(),
            user_id: USER_ID.clone(),
            subkey: SUBKEY.clone(),
        }
    }
}

/// Best-effort parser for the human-readable listing.
///
/// Every line matching the start rule opens a block of `window` lines, and
/// each field is the first match inside that block. Blocks may overlap the
/// next key's start line; that key is still picked up by its own block.
#[derive(Debug, Clone)]
pub struct WindowedListingParser {
    rules: LineRules,
    window: usize,
}

impl Default for WindowedListingParser {
    fn default() -> Self {
        Self::new(LineRules::default(), KEY_BLOCK_LINES)
    }
}

impl WindowedListingParser {
    pub fn new(rules: LineRules, window: usize) -> Self {
        Self {
            rules,
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    fn extract(&self, block: &[&str]) -> KeyRecord {
        let start_line = block.first().map(|l| l.trim()).unwrap_or_default();
        let first_line = |re: &Regex| {
            block
                .iter()
                .find(|l| re.is_match(l))
                .map(|l| l.trim().to_string())
                .unwrap_or_default()
        };

        KeyRecord {
            kind: kind_of(start_line),
            class: class_of(start_line),
            start_line: start_line.to_string(),
            fingerprint: block
                .iter()
                .find_map(|l| self.rules.fingerprint.find(l))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            user_id: first_line(&self.rules.user_id),
            subkey_line: first_line(&self.rules.subkey),
        }
    }
}

impl ListingParser for WindowedListingParser {
    fn listing_args(&self) -> &'static [&'static str] {
        &[]
    }

    fn parse(&self, raw: &str) -> KeyListing {
        if raw.trim().is_empty() {
            return KeyListing::default();
        }

        let lines: Vec<&str> = raw.lines().collect();
        let listing: KeyListing = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| self.rules.key_start.is_match(line))
            .map(|(start, _)| {
                let end = (start + self.window).min(lines.len());
                self.extract(&lines[start..end])
            })
            .collect();

        debug!(keys = listing.len(), "parsed human-readable key listing");
        listing
    }
}

/// Parser for the tool's machine-readable `--with-colons` listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColonListingParser;

impl ListingParser for ColonListingParser {
    fn listing_args(&self) -> &'static [&'static str] {
        &["--with-colons"]
    }

    fn parse(&self, raw: &str) -> KeyListing {
        let mut keys = Vec::new();
        let mut current: Option<KeyRecord> = None;
        // The primary fingerprint is the `fpr` record directly after `pub`/`sec`.
        let mut after_primary = false;

        for line in raw.lines() {
            let fields: Vec<&str> = line.split(':').collect();

            match fields[0] {
                "pub" | "sec" => {
                    if let Some(record) = current.take() {
                        keys.push(record);
                    }
                    current = Some(KeyRecord {
                        class: class_of(fields[0]),
                        start_line: line.trim().to_string(),
                        ..Default::default()
                    });
                }
                "fpr" => {
                    if after_primary
                        && let Some(ref mut record) = current
                        && fields.len() > 9
                    {
                        record.fingerprint = fields[9].to_string();
                    }
                }
                "uid" => {
                    if let Some(ref mut record) = current
                        && record.user_id.is_empty()
                        && fields.len() > 9
                    {
                        record.user_id = fields[9].to_string();
                    }
                }
                "sub" | "ssb" => {
                    if let Some(ref mut record) = current
                        && record.subkey_line.is_empty()
                    {
                        record.subkey_line = line.trim().to_string();
                    }
                }
                "uat" | "rev" | "tru" | "grp" | "sig" => {
                    debug!(
                        record_type = fields[0],
                        "skipping unhandled GPG record type"
                    );
                }
                _ if !fields[0].is_empty() => {
                    debug!(record_type = fields[0], "skipping unknown GPG record type");
                }
                _ => {}
            }

            after_primary = matches!(fields[0], "pub" | "sec");
        }

        if let Some(record) = current {
            keys.push(record);
        }

        debug!(keys = keys.len(), "parsed colon key listing");
        KeyListing::new(keys)
    }
}

/// Parses the tool's human-readable key listing.
pub fn parse_key_listing(raw: &str) -> KeyListing {
    WindowedListingParser::default().parse(raw)
}

impl KeyListing {
    /// Parses possibly absent listing text; `None` is an empty listing.
    pub fn parse_optional(raw: Option<&str>) -> Self {
        raw.map(parse_key_listing).unwrap_or_default()
    }
}

/// Splits a user id such as `uid [ultimate] Alice (work) <alice@example.com>`
/// into name, comment and email. Missing parts are empty.
pub fn parse_user_id(raw: &str) -> UserId {
    let rest = raw.trim();
    let rest = rest.strip_prefix("uid").unwrap_or(rest).trim_start();
    let rest = match rest.strip_prefix('[').and_then(|r| r.split_once(']')) {
        Some((_, after)) => after.trim_start(),
        None => rest,
    };

    let name_end = rest.find(['(', '<']).unwrap_or(rest.len());

    UserId {
        name: rest[..name_end].trim().to_string(),
        comment: between(rest, '(', ')'),
        email: between(rest, '<', '>'),
    }
}

fn between(s: &str, open: char, close: char) -> String {
    s.find(open)
        .map(|start| &s[start + open.len_utf8()..])
        .and_then(|tail| tail.find(close).map(|end| tail[..end].to_string()))
        .unwrap_or_default()
}

fn kind_of(start: &str) -> KeyKind {
    if start.starts_with("sub") || start.starts_with("ssb") {
        KeyKind::Sub
    } else {
        KeyKind::Primary
    }
}

fn class_of(start: &str) -> KeyClass {
    if start.starts_with("sec") || start.starts_with("ssb") {
        KeyClass::Secret
    } else {
        KeyClass::Public
    }
}

impl KeyRecord {
    /// Creation date from the start line, in either listing format.
    pub fn created(&self) -> Option<NaiveDate> {
        match colon_fields(&self.start_line) {
            Some(fields) => fields.get(5).and_then(|s| parse_timestamp(s)),
            None => LISTING_DATE
                .captures(&self.start_line)
                .and_then(|c| parse_date(&c[1])),
        }
    }

    /// Expiry date from the start line, in either listing format.
    pub fn expires(&self) -> Option<NaiveDate> {
        match colon_fields(&self.start_line) {
            Some(fields) => fields.get(6).and_then(|s| parse_timestamp(s)),
            None => EXPIRY_DATE
                .captures(&self.start_line)
                .and_then(|c| parse_date(&c[1])),
        }
    }

    pub fn parsed_user_id(&self) -> Option<UserId> {
        if self.user_id.is_empty() {
            return None;
        }
        Some(parse_user_id(&self.user_id))
    }
}

fn colon_fields(line: &str) -> Option<Vec<&str>> {
    let fields: Vec<&str> = line.split(':').collect();
    matches!(fields[0], "pub" | "sec").then_some(fields)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_timestamp(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    s.parse::<i64>()
        .ok()
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.date_naive())
}
