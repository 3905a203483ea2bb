use async_trait::async_trait;
use sequoia_openpgp::packet::Signature;
use sequoia_openpgp::Cert;

use crate::core::errors::Result;
use crate::core::models::features::FeaturesChecked;
use crate::core::models::operations::{
    Decrypted, Encoded, EncryptedMessage, KeyRequest, SignMode, SignedMessage, UserIdCheck,
    Verification,
};

/// Port for the OpenPGP implementation.
///
/// The default implementation lives in `adapters::openpgp` (SequoiaProvider).
/// The core layer only depends on this trait and on the OpenPGP data types
/// it exchanges, never on a concrete backend. Failures are reported as
/// `KeydropError::Provider` with an opaque reason.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Parse one or more transferable keys.
    async fn read_keys(&self, input: Encoded<'_>) -> Result<Vec<Cert>>;

    /// Parse an armored public-key block made only of key revocation
    /// signatures.
    async fn read_revocations(&self, text: &str) -> Result<Vec<Signature>>;

    /// Parse a clear-signed text, or a binary message holding exactly one
    /// literal data packet.
    async fn read_signed_message(&self, input: Encoded<'_>) -> Result<SignedMessage>;

    /// Parse an encrypted message and list its recipients.
    async fn read_encrypted_message(&self, input: Encoded<'_>) -> Result<EncryptedMessage>;

    /// Probe validity and capabilities of a key. Never fails: problems end
    /// up in the diagnostic text.
    async fn check_key(&self, cert: &Cert) -> FeaturesChecked;

    /// Check every signature of a message against the given keys.
    async fn verify(&self, message: &SignedMessage, keys: &[Cert]) -> Result<Verification>;

    /// Check every certification on every user ID of `cert` against `keys`.
    async fn verify_user_ids(&self, cert: &Cert, keys: &[Cert]) -> Result<Vec<UserIdCheck>>;

    /// Encrypt `data` to every recipient.
    async fn encrypt(
        &self,
        data: &[u8],
        filename: &str,
        recipients: &[Cert],
        armor: bool,
    ) -> Result<Vec<u8>>;

    /// Decrypt a message with an unlocked private key.
    async fn decrypt(&self, message: &EncryptedMessage, key: &Cert) -> Result<Decrypted>;

    /// Sign `data` with an unlocked private key.
    async fn sign(&self, data: &[u8], filename: &str, key: &Cert, mode: SignMode)
    -> Result<Vec<u8>>;

    /// Certify the primary user ID of `target` with an unlocked private key.
    /// Returns the public certificate with the new certification merged in.
    async fn certify(&self, target: &Cert, signer: &Cert) -> Result<Cert>;

    /// Produce a key revocation signature with an unlocked private key.
    async fn revoke(&self, key: &Cert) -> Result<Signature>;

    /// Generate a new key pair, locked with the requested passphrase.
    async fn generate(&self, request: &KeyRequest) -> Result<Cert>;

    /// Decrypt all secret key material.
    async fn unlock(&self, key: &Cert, passphrase: &str) -> Result<Cert>;

    /// Encrypt all secret key material with a new passphrase.
    async fn lock(&self, key: &Cert, passphrase: &str) -> Result<Cert>;

    /// Human-readable name of this provider (e.g. "sequoia").
    fn name(&self) -> &str;
}
