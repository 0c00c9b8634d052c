use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::classify::{Classifier, RuleSet};
use crate::error::{Error, Result};
use crate::keygen;
use crate::parse::{ListingParser, WindowedListingParser};
use crate::process::{Invocation, invoke};
use crate::stream::Source;
use crate::types::{
    ClassifiedResult, EncryptOptions, GenerateKeyParams, GeneratedKey, KeyListing, KeyListings,
    KeyRecord, KeySelector, KeyringOptions,
};
use crate::validation::{normalize_key_id, validate_identifier};

pub(crate) const DEFAULT_GPG_PROGRAM: &str = "gpg";

/// Interface for driving `gpg` against one keyring.
///
/// Every operation spawns the tool once per keyring it touches and returns
/// the [`ClassifiedResult`] of that invocation unchanged. Argument checks
/// happen before anything is spawned and fail with
/// [`Error::InvalidArguments`] or [`Error::InvalidKeyId`].
///
/// # Example
///
/// ```no_run
/// use gpg_adapter::{KeySelector, Keyring};
///
/// # async fn example() -> gpg_adapter::Result<()> {
/// let keyring = Keyring::new();
/// let listings = keyring.list_keys(None, KeySelector::Public).await?;
/// println!("Found {} keys", listings.public.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Keyring {
    options: KeyringOptions,
    classifier: Classifier,
    listing_parser: Arc<dyn ListingParser>,
}

impl Default for Keyring {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyring {
    /// Creates a Keyring using `gpg` from `PATH` and its default home directory.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(KeyringOptions::default())
    }

    /// Creates a Keyring for a custom GPG home directory.
    #[must_use]
    pub fn with_homedir(path: impl Into<PathBuf>) -> Self {
        Self::with_options(KeyringOptions {
            homedir: Some(path.into()),
            ..Default::default()
        })
    }

    #[must_use]
    pub fn with_options(options: KeyringOptions) -> Self {
        Self {
            options,
            classifier: Classifier::default(),
            listing_parser: Arc::new(WindowedListingParser::default()),
        }
    }

    /// Replaces the output-classification rules, e.g. for another tool version.
    #[must_use]
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.classifier = Classifier::new(rules);
        self
    }

    /// Replaces the key-listing parser and, with it, the listing format requested.
    #[must_use]
    pub fn with_listing_parser(mut self, parser: impl ListingParser + 'static) -> Self {
        self.listing_parser = Arc::new(parser);
        self
    }

    pub fn options(&self) -> &KeyringOptions {
        &self.options
    }

    async fn execute(
        &self,
        args: Vec<OsString>,
        input: Option<Source>,
    ) -> Result<ClassifiedResult> {
        let invocation = Invocation::new(self.options.program.clone(), args)
            .homedir(self.options.homedir.clone())
            .input(input)
            .timeout_secs(self.options.timeout_secs);

        let outcome = invoke(invocation).await?;
        Ok(self.classifier.classify(&outcome))
    }

    /// Generates an ed25519 key with a cv25519 encryption subkey.
    ///
    /// The fingerprint is taken from the tool's output, or looked up by user
    /// id when the output does not name it.
    pub async fn generate_key(&self, params: &GenerateKeyParams) -> Result<GeneratedKey> {
        let batch = keygen::write_batch_file(params)?;

        let mut args = flags(&["--batch", "--pinentry-mode", "loopback", "--gen-key"]);
        args.push(batch.path().as_os_str().to_owned());

        let result = self.execute(args, None).await?;
        drop(batch);

        let mut fingerprint = keygen::fingerprint_from_output(&result.output).or_else(|| {
            result
                .detail
                .as_deref()
                .and_then(keygen::fingerprint_from_output)
        });

        if result.ok && fingerprint.is_none() {
            let uid = keygen::user_id_string(
                &params.name,
                params.comment.as_deref(),
                params.email.as_deref(),
            );
            match self.first_key(&uid, KeySelector::Secret).await {
                Ok(key) => {
                    fingerprint = key.map(|k| k.fingerprint).filter(|f| !f.is_empty());
                }
                Err(e) => debug!(error = %e, "could not look up generated key"),
            }
        }

        Ok(GeneratedKey {
            result,
            fingerprint,
        })
    }

    /// Deletes a key.
    ///
    /// With [`KeySelector::All`] the secret key is deleted first, since the
    /// tool refuses to delete a public key whose secret key is present. A
    /// failed secret-key deletion is returned without touching the public key.
    pub async fn delete_keys(
        &self,
        fingerprint: &str,
        selector: KeySelector,
        passphrase: Option<&str>,
    ) -> Result<ClassifiedResult> {
        let fingerprint = normalize_key_id(fingerprint)?;

        if selector.includes_secret() {
            let mut args = flags(&["--batch", "--yes"]);
            if let Some(passphrase) = passphrase {
                push_passphrase(&mut args, passphrase);
            }
            args.push("--delete-secret-key".into());
            args.push(fingerprint.clone().into());

            let result = self.execute(args, None).await?;
            if !result.ok || !selector.includes_public() {
                if !result.ok {
                    warn!(
                        fingerprint = %fingerprint,
                        error_kind = ?result.error_kind,
                        "secret key deletion failed"
                    );
                }
                return Ok(result);
            }
        }

        let mut args = flags(&["--batch", "--yes", "--delete-key"]);
        args.push(fingerprint.into());
        self.execute(args, None).await
    }

    /// Imports a key given as armored text or as the path of a key file.
    ///
    /// Quote characters are stripped from `key` first. Only one of
    /// [`KeySelector::Public`] or [`KeySelector::Secret`] is accepted.
    pub async fn import_key(
        &self,
        key: &str,
        selector: KeySelector,
        passphrase: Option<&str>,
    ) -> Result<ClassifiedResult> {
        if selector == KeySelector::All {
            return Err(Error::InvalidArguments(
                "import requires either the public or the secret selector".to_string(),
            ));
        }

        let cleaned: String = key.chars().filter(|c| !matches!(c, '\'' | '"')).collect();
        if cleaned.trim().is_empty() {
            return Err(Error::InvalidArguments("no key to import".to_string()));
        }

        let mut args = flags(&["--batch"]);
        if selector == KeySelector::Secret
            && let Some(passphrase) = passphrase
        {
            push_passphrase(&mut args, passphrase);
        }
        args.push("--import".into());

        let source = Source::resolve(cleaned).await?;
        self.execute_with_source(args, source).await
    }

    /// Exports a key as ASCII armor, returned as output or written to `destination`.
    pub async fn export_key(
        &self,
        identifier: &str,
        selector: KeySelector,
        destination: Option<&Path>,
        passphrase: Option<&str>,
    ) -> Result<ClassifiedResult> {
        let identifier = validate_identifier(identifier)?;
        if selector == KeySelector::All {
            return Err(Error::InvalidArguments(
                "export requires either the public or the secret selector".to_string(),
            ));
        }

        let mut args = flags(&["--batch", "--yes"]);
        if let Some(path) = destination {
            args.push("--output".into());
            args.push(path.as_os_str().to_owned());
        }
        if let Some(passphrase) = passphrase {
            push_passphrase(&mut args, passphrase);
        }
        args.push(match selector {
            KeySelector::Secret => "--export-secret-keys".into(),
            _ => "--export".into(),
        });
        args.push("--armor".into());
        args.push(identifier.into());

        self.execute(args, None).await
    }

    /// Lists keys, optionally restricted to those the tool matches against
    /// `identifier`.
    ///
    /// The tool reports an error when nothing matches; whatever listing text
    /// it produced is still parsed, so that case yields an empty listing.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> gpg_adapter::Result<()> {
    /// use gpg_adapter::{KeySelector, Keyring};
    ///
    /// let keyring = Keyring::with_homedir("/tmp/gnupg");
    /// let listings = keyring.list_keys(Some("alice"), KeySelector::All).await?;
    /// for key in listings.secret.iter() {
    ///     println!("{} {}", key.fingerprint, key.user_id);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn list_keys(
        &self,
        identifier: Option<&str>,
        selector: KeySelector,
    ) -> Result<KeyListings> {
        if let Some(id) = identifier {
            validate_identifier(id)?;
        }

        let mut listings = KeyListings::default();
        if selector.includes_public() {
            listings.public = self.list_one("--list-keys", identifier).await?;
        }
        if selector.includes_secret() {
            listings.secret = self.list_one("--list-secret-keys", identifier).await?;
        }
        Ok(listings)
    }

    async fn list_one(&self, command: &str, identifier: Option<&str>) -> Result<KeyListing> {
        let mut args = flags(self.listing_parser.listing_args());
        args.push(command.into());
        if let Some(id) = identifier {
            args.push(id.into());
        }

        let result = self.execute(args, None).await?;
        if !result.ok {
            debug!(
                command,
                error_kind = ?result.error_kind,
                "listing reported an error, parsing available output"
            );
        }

        Ok(self.listing_parser.parse(&result.output))
    }

    /// All listed keys with any field containing `identifier`.
    pub async fn find_keys(&self, identifier: &str, selector: KeySelector) -> Result<KeyListing> {
        if identifier.is_empty() {
            return Err(Error::InvalidArguments(
                "search identifier cannot be empty".to_string(),
            ));
        }

        let listings = self.list_keys(None, selector).await?;
        Ok(listings
            .public
            .find_all(identifier)
            .into_iter()
            .chain(listings.secret.find_all(identifier))
            .collect())
    }

    /// The first listed key with any field containing `identifier`.
    pub async fn first_key(
        &self,
        identifier: &str,
        selector: KeySelector,
    ) -> Result<Option<KeyRecord>> {
        Ok(self
            .find_keys(identifier, selector)
            .await?
            .into_iter()
            .next())
    }

    pub async fn key_exists(&self, identifier: &str, selector: KeySelector) -> Result<bool> {
        Ok(self.first_key(identifier, selector).await?.is_some())
    }

    /// Encrypts text or the contents of a file.
    ///
    /// `input` is resolved with [`Source::resolve`]. Without a destination
    /// the armored ciphertext is the result's output.
    pub async fn encrypt(
        &self,
        recipient: Option<&str>,
        input: &str,
        options: &EncryptOptions,
    ) -> Result<ClassifiedResult> {
        if input.is_empty() {
            return Err(Error::InvalidArguments("nothing to encrypt".to_string()));
        }
        let source = Source::resolve(input).await?;
        self.encrypt_source(recipient, source, options).await
    }

    pub async fn encrypt_source(
        &self,
        recipient: Option<&str>,
        source: Source,
        options: &EncryptOptions,
    ) -> Result<ClassifiedResult> {
        let recipient = match (options.symmetric, recipient) {
            (true, _) => None,
            (false, Some(r)) => Some(validate_identifier(r)?),
            (false, None) => {
                return Err(Error::InvalidArguments(
                    "a recipient is required unless encrypting symmetrically".to_string(),
                ));
            }
        };

        let mut args = flags(&["--batch", "--yes", "--output"]);
        args.push(output_arg(options.destination.as_deref()));

        if options.symmetric {
            if let Some(passphrase) = options.passphrase.as_deref() {
                push_passphrase(&mut args, passphrase);
            }
            args.push("--symmetric".into());
        } else {
            args.push("--encrypt".into());
        }

        args.push("--armor".into());
        if let Some(recipient) = recipient {
            args.push("--recipient".into());
            args.push(recipient.into());
        }
        args.extend(flags(&["--trust-model", "always"]));

        self.execute_with_source(args, source).await
    }

    /// Decrypts text or the contents of a file.
    pub async fn decrypt(
        &self,
        input: &str,
        destination: Option<&Path>,
        passphrase: Option<&str>,
    ) -> Result<ClassifiedResult> {
        if input.is_empty() {
            return Err(Error::InvalidArguments("nothing to decrypt".to_string()));
        }
        let source = Source::resolve(input).await?;
        self.decrypt_source(source, destination, passphrase).await
    }

    pub async fn decrypt_source(
        &self,
        source: Source,
        destination: Option<&Path>,
        passphrase: Option<&str>,
    ) -> Result<ClassifiedResult> {
        let mut args = flags(&["--batch", "--pinentry-mode", "loopback"]);
        if let Some(passphrase) = passphrase {
            args.push("--passphrase".into());
            args.push(passphrase.into());
        }
        if let Some(path) = destination {
            args.push("--yes".into());
            args.push("--output".into());
            args.push(path.as_os_str().to_owned());
        }
        args.push("--decrypt".into());

        self.execute_with_source(args, source).await
    }

    /// Passes a file source as the last argument, anything else on stdin.
    async fn execute_with_source(
        &self,
        mut args: Vec<OsString>,
        source: Source,
    ) -> Result<ClassifiedResult> {
        match source {
            Source::Path(path) => {
                args.push(path.into_os_string());
                self.execute(args, None).await
            }
            other => self.execute(args, Some(other)).await,
        }
    }
}

fn flags(values: &[&str]) -> Vec<OsString> {
    values.iter().map(OsString::from).collect()
}

fn push_passphrase(args: &mut Vec<OsString>, passphrase: &str) {
    args.extend(flags(&["--pinentry-mode", "loopback", "--passphrase", passphrase]));
}

fn output_arg(destination: Option<&Path>) -> OsString {
    match destination {
        Some(path) => path.as_os_str().to_owned(),
        None => "-".into(),
    }
}
