//! Values exchanged with a `CryptoProvider`.

use sequoia_openpgp::KeyID;

/// How the dropped bytes are being interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoded<'a> {
    /// ASCII-armored (or clear-signed) text.
    Armored(&'a str),
    /// Raw OpenPGP packets.
    Binary(&'a [u8]),
}

impl<'a> Encoded<'a> {
    pub fn is_text(&self) -> bool {
        matches!(self, Encoded::Armored(_))
    }

    pub fn bytes(&self) -> &'a [u8] {
        match self {
            Encoded::Armored(text) => text.as_bytes(),
            Encoded::Binary(bytes) => bytes,
        }
    }
}

/// A message that parsed as signed data and is ready for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    pub data: Vec<u8>,
    pub cleartext: bool,
}

/// A message that parsed as encrypted data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedMessage {
    pub data: Vec<u8>,
    /// Key IDs listed in the message's session key packets.
    pub recipients: Vec<KeyID>,
}

/// Outcome of checking one signature of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureCheck {
    pub issuer: Option<KeyID>,
    pub result: Result<(), String>,
}

/// Verified message content with one check per signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub content: Vec<u8>,
    pub signatures: Vec<SignatureCheck>,
}

/// Decrypted message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    pub content: Vec<u8>,
    pub filename: Option<String>,
}

/// Outcome of checking one certification on one user ID.
///
/// `valid` is `None` when the issuer is not among the verifying keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdCheck {
    pub user_id: String,
    pub issuer: KeyID,
    pub valid: Option<bool>,
}

/// Which kind of signature to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMode {
    /// Keep the text readable, signature appended.
    Cleartext,
    /// Binary message with the data inside a literal packet.
    Inline,
}

/// The new-key form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRequest {
    pub name: String,
    pub email: String,
    pub passphrase: String,
}
