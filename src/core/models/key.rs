use std::io::Write;
use std::sync::{LazyLock, OnceLock};

use regex::Regex;
use sequoia_openpgp::armor;
use sequoia_openpgp::policy::StandardPolicy;
use sequoia_openpgp::serialize::SerializeInto;
use sequoia_openpgp::Cert;

use crate::core::errors::{KeydropError, Result};
use crate::core::models::data::Payload;
use crate::core::models::features::FeaturesChecked;
use crate::core::models::private_key::PrivateKey;
use crate::core::models::public_key::PublicKey;

/// Shared behaviour of everything that can stand behind a fragment:
/// one public key, one private key, or a whole keyring.
pub trait Key {
    /// What the key can be used for.
    fn features(&self) -> &FeaturesChecked;

    /// One binary buffer per contained key.
    fn serialize(&self) -> Vec<Vec<u8>>;

    /// The public part, ASCII-armored and ready to download.
    fn armor(&self) -> Result<Payload>;
}

/// Name, email and raw text of a user ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserIdParts {
    pub full: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

static USER_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<name>[^<(]*?)\s*(?:\([^)]*\)\s*)?(?:<(?P<email>[^>]*)>)?\s*$")
        .expect("user ID pattern is always valid")
});

impl UserIdParts {
    pub fn parse(full: &str) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        match USER_ID.captures(full) {
            Some(caps) => Self {
                full: full.to_string(),
                name: caps.name("name").and_then(|m| non_empty(m.as_str())),
                email: caps.name("email").and_then(|m| non_empty(m.as_str())),
            },
            None => Self {
                full: full.to_string(),
                ..Self::default()
            },
        }
    }
}

/// The primary user ID of a certificate, falling back to the first one when
/// the certificate does not pass the standard policy.
pub fn primary_user_id(cert: &Cert) -> Option<String> {
    let policy = StandardPolicy::new();
    cert.with_policy(&policy, None)
        .ok()
        .and_then(|valid| valid.primary_userid().ok().map(|ua| ua.userid().clone()))
        .or_else(|| cert.userids().next().map(|ua| ua.userid().clone()))
        .map(|uid| String::from_utf8_lossy(uid.value()).into_owned())
}

/// Lower-case hex key ID of a certificate's primary key.
pub fn key_id_hex(cert: &Cert) -> String {
    cert.keyid().to_hex().to_lowercase()
}

/// Lower-case hex fingerprint of a certificate's primary key.
pub fn fingerprint_hex(cert: &Cert) -> String {
    cert.fingerprint().to_hex().to_lowercase()
}

/// Display string for a certificate: its primary user ID, else its key ID.
pub fn user_id_of(cert: &Cert) -> String {
    primary_user_id(cert).unwrap_or_else(|| key_id_hex(cert))
}

/// ASCII-armor the concatenation of `chunks`.
pub fn armor_chunks(kind: armor::Kind, chunks: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut writer = armor::Writer::new(Vec::new(), kind).map_err(KeydropError::provider)?;
    for chunk in chunks {
        writer.write_all(chunk)?;
    }
    writer.finalize().map_err(KeydropError::provider)
}

/// Binary transferable key, secret material included when present.
fn serialize_cert(cert: &Cert) -> Result<Vec<u8>> {
    cert.as_tsk().to_vec().map_err(KeydropError::provider)
}

/// State common to both single-key shapes.
///
/// Fingerprint and key ID are computed on first use and cached.
#[derive(Debug)]
pub(crate) struct KeyCore {
    pub(crate) cert: Cert,
    pub(crate) serialized: Vec<u8>,
    pub(crate) features: FeaturesChecked,
    pub(crate) primary_user: Option<UserIdParts>,
    fingerprint: OnceLock<String>,
    key_id: OnceLock<String>,
}

impl KeyCore {
    pub(crate) fn new(cert: Cert, features: FeaturesChecked) -> Result<Self> {
        let primary_user = primary_user_id(&cert).map(|uid| UserIdParts::parse(&uid));
        Ok(Self {
            serialized: serialize_cert(&cert)?,
            cert,
            features,
            primary_user,
            fingerprint: OnceLock::new(),
            key_id: OnceLock::new(),
        })
    }

    /// Same identity, different certificate material.
    pub(crate) fn with_cert(&self, cert: Cert) -> Result<Self> {
        Ok(Self {
            serialized: serialize_cert(&cert)?,
            cert,
            features: self.features.clone(),
            primary_user: self.primary_user.clone(),
            fingerprint: self.fingerprint.clone(),
            key_id: self.key_id.clone(),
        })
    }

    pub(crate) fn fingerprint(&self) -> &str {
        self.fingerprint.get_or_init(|| fingerprint_hex(&self.cert))
    }

    pub(crate) fn key_id(&self) -> &str {
        self.key_id.get_or_init(|| key_id_hex(&self.cert))
    }

    pub(crate) fn user_name(&self) -> String {
        self.primary_user
            .as_ref()
            .and_then(|u| u.name.clone())
            .unwrap_or_else(|| self.key_id().to_string())
    }

    pub(crate) fn email(&self) -> Option<String> {
        self.primary_user.as_ref().and_then(|u| u.email.clone())
    }

    pub(crate) fn user_id(&self) -> String {
        self.primary_user
            .as_ref()
            .map(|u| u.full.clone())
            .unwrap_or_else(|| self.key_id().to_string())
    }
}

/// Either shape of a single key.
#[derive(Debug, Clone, PartialEq)]
pub enum SingleKey {
    Public(PublicKey),
    Private(PrivateKey),
}

impl SingleKey {
    pub(crate) fn core(&self) -> &KeyCore {
        match self {
            SingleKey::Public(key) => key.core(),
            SingleKey::Private(key) => key.core(),
        }
    }

    /// The certificate that gets serialized: the public key, or the locked
    /// form of a private key.
    pub fn cert(&self) -> &Cert {
        &self.core().cert
    }

    pub fn fingerprint(&self) -> &str {
        self.core().fingerprint()
    }

    pub fn key_id(&self) -> &str {
        self.core().key_id()
    }

    pub fn user_name(&self) -> String {
        self.core().user_name()
    }

    pub fn email(&self) -> Option<String> {
        self.core().email()
    }

    pub fn user_id(&self) -> String {
        self.core().user_id()
    }
}

impl Key for SingleKey {
    fn features(&self) -> &FeaturesChecked {
        match self {
            SingleKey::Public(key) => key.features(),
            SingleKey::Private(key) => key.features(),
        }
    }

    fn serialize(&self) -> Vec<Vec<u8>> {
        match self {
            SingleKey::Public(key) => key.serialize(),
            SingleKey::Private(key) => key.serialize(),
        }
    }

    fn armor(&self) -> Result<Payload> {
        match self {
            SingleKey::Public(key) => key.armor(),
            SingleKey::Private(key) => key.armor(),
        }
    }
}

impl From<PublicKey> for SingleKey {
    fn from(key: PublicKey) -> Self {
        SingleKey::Public(key)
    }
}

impl From<PrivateKey> for SingleKey {
    fn from(key: PrivateKey) -> Self {
        SingleKey::Private(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_with_name_and_email() {
        let parts = UserIdParts::parse("Alice Example <alice@example.org>");
        assert_eq!(parts.name.as_deref(), Some("Alice Example"));
        assert_eq!(parts.email.as_deref(), Some("alice@example.org"));
        assert_eq!(parts.full, "Alice Example <alice@example.org>");
    }

    #[test]
    fn user_id_with_comment() {
        let parts = UserIdParts::parse("Bob (work) <bob@example.org>");
        assert_eq!(parts.name.as_deref(), Some("Bob"));
        assert_eq!(parts.email.as_deref(), Some("bob@example.org"));
    }

    #[test]
    fn user_id_email_only() {
        let parts = UserIdParts::parse("<carol@example.org>");
        assert_eq!(parts.name, None);
        assert_eq!(parts.email.as_deref(), Some("carol@example.org"));
    }

    #[test]
    fn user_id_free_text_is_a_name() {
        let parts = UserIdParts::parse("just a name");
        assert_eq!(parts.name.as_deref(), Some("just a name"));
        assert_eq!(parts.email, None);
    }

    #[test]
    fn armor_wraps_chunks_in_one_block() {
        let data = armor_chunks(armor::Kind::PublicKey, &[vec![1, 2], vec![3]]).unwrap();
        let text = String::from_utf8(data).unwrap();
        assert!(text.starts_with("-----BEGIN PGP PUBLIC KEY BLOCK-----"));
        assert!(text.trim_end().ends_with("-----END PGP PUBLIC KEY BLOCK-----"));
    }
}
