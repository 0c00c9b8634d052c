//! Example: List public and secret keys, optionally filtered by a search term
//!
//! Run with: cargo run --example list_keys -- [identifier]
//! Set RUST_LOG=gpg_adapter=debug to see the invocations and classifications.

use gpg_adapter::{KeyClass, KeyRecord, KeySelector, Keyring};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> gpg_adapter::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let keyring = match std::env::var_os("GNUPGHOME") {
        Some(home) => Keyring::with_homedir(home),
        None => Keyring::new(),
    };

    let keys: Vec<KeyRecord> = match std::env::args().nth(1) {
        Some(identifier) => keyring
            .find_keys(&identifier, KeySelector::All)
            .await?
            .into_vec(),
        None => {
            let listings = keyring.list_keys(None, KeySelector::All).await?;
            listings
                .public
                .into_iter()
                .chain(listings.secret)
                .collect()
        }
    };

    println!("Found {} keys\n", keys.len());

    for key in &keys {
        println!("{}", format_key_output(key));
    }

    Ok(())
}

fn format_key_output(key: &KeyRecord) -> String {
    let class_marker = match key.class {
        KeyClass::Public => "[pub]",
        KeyClass::Secret => "[sec]",
    };

    let uid = key
        .parsed_user_id()
        .map(|uid| match uid.email.as_str() {
            "" => uid.name,
            email => format!("{} <{}>", uid.name, email),
        })
        .unwrap_or_default();

    let created = key
        .created()
        .map(|d| format!(" created {}", d))
        .unwrap_or_default();

    let expires = key
        .expires()
        .map(|d| format!(" expires {}", d))
        .unwrap_or_default();

    format!(
        "{} {}{}{}\n    {}",
        class_marker, key.fingerprint, created, expires, uid
    )
}
