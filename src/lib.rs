//! Drive the `gpg` command-line tool and interpret what it prints.
//!
//! Every operation runs `gpg` once, collects both output channels and hands
//! them to a [`Classifier`], which decides from known text patterns whether
//! the invocation succeeded. The tool is inconsistent about which channel it
//! reports on, so its exit status alone is not trusted. Key listings are
//! parsed into [`KeyRecord`]s that can be searched with [`find_all`] and
//! [`find_first`].
//!
//! # Example
//!
//! ```no_run
//! use gpg_adapter::{EncryptOptions, KeySelector, Keyring};
//!
//! #[tokio::main]
//! async fn main() -> gpg_adapter::Result<()> {
//!     let keyring = Keyring::new();
//!
//!     if let Some(key) = keyring.first_key("alice@example.com", KeySelector::Public).await? {
//!         let result = keyring
//!             .encrypt(Some(key.fingerprint.as_str()), "hello", &EncryptOptions::default())
//!             .await?;
//!         println!("{}", result.into_result()?);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Requirements
//!
//! - GnuPG 2.2 or newer available as `gpg` (or configured via [`KeyringOptions`])
//! - Secret-key operations use loopback pinentry so passphrases can be passed in

mod classify;
mod error;
mod keygen;
mod keyring;
mod matcher;
mod parse;
mod process;
mod stream;
mod types;
mod validation;

pub use classify::{Classifier, ErrorSignature, Pattern, RuleSet};
pub use error::{Error, Result};
pub use keygen::user_id_string;
pub use keyring::Keyring;
pub use matcher::{find_all, find_all_in, find_first, find_first_in};
pub use parse::{
    ColonListingParser, KEY_BLOCK_LINES, LineRules, ListingParser, WindowedListingParser,
    parse_key_listing, parse_user_id,
};
pub use process::{Invocation, invoke};
pub use stream::{FILE_NAME_LENGTH_LIMIT, Source};
pub use types::{
    ClassifiedResult, EncryptOptions, ErrorKind, GenerateKeyParams, GeneratedKey, KeyClass,
    KeyKind, KeyListing, KeyListings, KeyRecord, KeySelector, KeyringOptions, ProcessOutcome,
    UserId,
};
