use std::sync::{Arc, LazyLock};

use futures::future::{BoxFuture, FutureExt, Shared};
use regex::Regex;
use sequoia_openpgp::serialize::SerializeInto;
use sequoia_openpgp::{Cert, KeyID, Packet, armor};

use crate::core::errors::{KeydropError, Result};
use crate::core::models::data::{Info, Input, Payload, strip_openpgp_suffix};
use crate::core::models::features::FeaturesChecked;
use crate::core::models::key::{Key, KeyCore, SingleKey, armor_chunks, user_id_of};
use crate::core::models::messages;
use crate::core::models::operations::{Encoded, EncryptedMessage, KeyRequest, SignMode};
use crate::core::models::public_key::PublicKey;
use crate::core::models::task::{Outcome, Task, keyring_update};
use crate::core::traits::provider::CryptoProvider;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s<>()]+@[^@\s<>()]+$").expect("email pattern is always valid")
});

#[derive(Debug)]
struct Inner {
    /// Identity and the last known locked form.
    core: KeyCore,
    /// The same key, possibly with its secrets decrypted.
    key: Cert,
}

#[derive(Debug, Clone)]
struct Certification {
    user: String,
    signed: Cert,
}

type SharedCertification = Shared<BoxFuture<'static, std::result::Result<Certification, String>>>;

/// A private key with its unlock state.
///
/// Serializing or exporting always uses the locked form. Cloning shares;
/// equality is identity.
#[derive(Debug, Clone)]
pub struct PrivateKey(Arc<Inner>);

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PrivateKey {
    pub async fn from_cert(provider: &dyn CryptoProvider, cert: Cert) -> Result<Self> {
        let features = provider.check_key(&cert).await;
        Ok(Self(Arc::new(Inner {
            core: KeyCore::new(cert.clone(), features)?,
            key: cert,
        })))
    }

    /// Validate a new-key form without touching any key material.
    pub fn check_generate(request: &KeyRequest) -> Result<()> {
        let missing = [
            ("name", &request.name),
            ("email", &request.email),
            ("passphrase", &request.passphrase),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());
        if let Some((field, _)) = missing {
            return Err(KeydropError::InvalidKeyRequest {
                detail: format!("{field} is empty"),
            });
        }
        if !EMAIL.is_match(request.email.trim()) {
            return Err(KeydropError::InvalidKeyRequest {
                detail: format!("'{}' is not an email address", request.email),
            });
        }
        Ok(())
    }

    /// Generate a key pair locked with the requested passphrase.
    pub async fn generate(provider: &dyn CryptoProvider, request: &KeyRequest) -> Result<Self> {
        Self::check_generate(request)?;
        let cert = provider.generate(request).await?;
        tracing::info!(provider = provider.name(), "generated key pair");
        Self::from_cert(provider, cert).await
    }

    pub(crate) fn core(&self) -> &KeyCore {
        &self.0.core
    }

    pub fn fingerprint(&self) -> &str {
        self.0.core.fingerprint()
    }

    pub fn key_id(&self) -> &str {
        self.0.core.key_id()
    }

    pub fn user_name(&self) -> String {
        self.0.core.user_name()
    }

    pub fn email(&self) -> Option<String> {
        self.0.core.email()
    }

    pub fn user_id(&self) -> String {
        self.0.core.user_id()
    }

    /// True when every secret key is usable without a passphrase.
    pub fn is_unlocked(&self) -> bool {
        self.0
            .key
            .keys()
            .secret()
            .all(|ka| !ka.key().secret().is_encrypted())
    }

    /// Decrypt the secrets. The locked form is kept for export.
    pub async fn unlock(&self, provider: &dyn CryptoProvider, passphrase: &str) -> Result<Self> {
        let key = provider.unlock(&self.0.key, passphrase).await?;
        Ok(Self(Arc::new(Inner {
            core: self.0.core.with_cert(self.0.core.cert.clone())?,
            key,
        })))
    }

    /// Lock the secrets with a new passphrase. Both forms become the newly
    /// locked key.
    pub async fn lock(&self, provider: &dyn CryptoProvider, passphrase: &str) -> Result<Self> {
        if !self.is_unlocked() {
            return Err(KeydropError::KeyLocked);
        }
        let locked = provider.lock(&self.0.key, passphrase).await?;
        Ok(Self(Arc::new(Inner {
            core: self.0.core.with_cert(locked.clone())?,
            key: locked,
        })))
    }

    fn unlocked_key(&self) -> Result<&Cert> {
        if self.is_unlocked() {
            Ok(&self.0.key)
        } else {
            Err(KeydropError::KeyLocked)
        }
    }

    /// The locked transferable secret key, armored.
    pub fn armor_private(&self) -> Result<Payload> {
        let data = self
            .0
            .core
            .cert
            .as_tsk()
            .armored()
            .to_vec()
            .map_err(KeydropError::provider)?;
        let key_id = self.key_id();
        Ok(Payload {
            data,
            filename: Some(format!("{key_id}-private.asc")),
            content_type: None,
            title: Some(messages::private_key_file_containing(key_id)),
            kind: Some(messages::KIND_PRIVATE_KEY.into()),
        })
    }

    /// A revocation certificate for this key, to be published if the key is
    /// ever lost or compromised.
    pub async fn revocation_certificate(&self, provider: &dyn CryptoProvider) -> Result<Payload> {
        let signature = provider.revoke(self.unlocked_key()?).await?;
        let packet = Packet::from(signature)
            .to_vec()
            .map_err(KeydropError::provider)?;
        let data = armor_chunks(armor::Kind::PublicKey, &[packet])?;
        let key_id = self.key_id();
        Ok(Payload {
            data,
            filename: Some(format!("{key_id}-revoke.asc")),
            content_type: None,
            title: Some(messages::revocation_certificate_of(key_id)),
            kind: Some(messages::KIND_REVOKE_CERT.into()),
        })
    }

    /// Key IDs of the primary key and every subkey.
    fn key_ids(&self) -> Vec<KeyID> {
        self.0.key.keys().map(|ka| ka.key().keyid()).collect()
    }

    /// Decide what the dropped input means for this private key and return
    /// the resulting tasks.
    ///
    /// Keys get certified. Otherwise an encrypted message is decrypted when
    /// this key can decrypt, and anything else is signed when it can sign.
    pub async fn process(
        &self,
        provider: &Arc<dyn CryptoProvider>,
        input: Input,
    ) -> Result<Vec<Task>> {
        let filename = input.filename.clone().unwrap_or_else(|| "NoName".into());
        let features = self.0.core.features.clone();
        let mut last_error = None;

        if let Some(text) = input.text() {
            match provider.read_keys(Encoded::Armored(text)).await {
                Ok(certs) => return Ok(self.certificate(provider, certs, filename)),
                Err(e) => last_error = Some(e),
            }
            if features.encryption() {
                match provider.read_encrypted_message(Encoded::Armored(text)).await {
                    Ok(message) => return Ok(vec![self.decrypt(provider, message, filename)]),
                    Err(e) => last_error = Some(e),
                }
            }
            if features.signing() {
                let data = text.as_bytes().to_vec();
                return Ok(vec![self.sign(provider, data, filename, SignMode::Cleartext)]);
            }
        }

        match provider.read_keys(Encoded::Binary(&input.data)).await {
            Ok(certs) => return Ok(self.certificate(provider, certs, filename)),
            Err(e) => last_error = Some(e),
        }
        if features.encryption() {
            match provider.read_encrypted_message(Encoded::Binary(&input.data)).await {
                Ok(message) => {
                    let wildcard = KeyID::wildcard();
                    let ours = self.key_ids();
                    if message
                        .recipients
                        .iter()
                        .any(|id| *id == wildcard || ours.contains(id))
                    {
                        return Ok(vec![self.decrypt(provider, message, filename)]);
                    }
                }
                Err(e) => last_error = Some(e),
            }
        }
        if features.signing() {
            return Ok(vec![self.sign(provider, input.data, filename, SignMode::Inline)]);
        }

        Err(last_error.unwrap_or(KeydropError::NoInterpretation))
    }

    fn certificate(
        &self,
        provider: &Arc<dyn CryptoProvider>,
        certs: Vec<Cert>,
        filename: String,
    ) -> Vec<Task> {
        tracing::debug!(branch = "certificate", keys = certs.len(), "classified input");
        let signs: Vec<SharedCertification> = certs
            .into_iter()
            .map(|cert| {
                let provider = Arc::clone(provider);
                let signer = self.clone();
                async move {
                    let user = user_id_of(&cert);
                    let key = signer.unlocked_key().map_err(|e| e.to_string())?;
                    let signed = provider
                        .certify(&cert.strip_secret_key_material(), key)
                        .await
                        .map_err(|e| e.to_string())?;
                    Ok(Certification { user, signed })
                }
                .boxed()
                .shared()
            })
            .collect();

        let key_id = self.key_id().to_string();
        let mut tasks: Vec<Task> = signs
            .iter()
            .cloned()
            .map(|sign| {
                let key_id = key_id.clone();
                async move {
                    let done = sign.await.map_err(KeydropError::provider)?;
                    Ok(Outcome::Info(Info::ok(messages::sign_user_by_key(
                        &done.user, &key_id,
                    ))))
                }
                .boxed()
            })
            .collect();

        let all = futures::future::try_join_all(signs).shared();

        let bundle = all.clone();
        tasks.push(
            async move {
                let Ok(done) = bundle.await else {
                    return Ok(Outcome::Nothing);
                };
                let mut chunks = Vec::with_capacity(done.len());
                for certification in &done {
                    chunks.push(
                        certification
                            .signed
                            .to_vec()
                            .map_err(KeydropError::provider)?,
                    );
                }
                let users: Vec<String> = done.iter().map(|c| c.user.clone()).collect();
                Ok(Outcome::Artifact(Payload {
                    data: armor_chunks(armor::Kind::PublicKey, &chunks)?,
                    filename: Some(format!("{filename}.key.asc")),
                    content_type: None,
                    title: Some(messages::public_keys_signed_by_key(&key_id, &users)),
                    kind: Some(messages::KIND_CERTIFICATED.into()),
                }))
            }
            .boxed(),
        );

        let provider = Arc::clone(provider);
        tasks.push(
            async move {
                let Ok(done) = all.await else {
                    return Ok(Outcome::Nothing);
                };
                let signed: Vec<Cert> = done.into_iter().map(|c| c.signed).collect();
                Ok(keyring_update(move |old| async move {
                    old.import_keys(provider.as_ref(), signed).await
                }))
            }
            .boxed(),
        );
        tasks
    }

    fn decrypt(
        &self,
        provider: &Arc<dyn CryptoProvider>,
        message: EncryptedMessage,
        filename: String,
    ) -> Task {
        tracing::debug!(branch = "decrypt", recipients = message.recipients.len(), "classified input");
        let provider = Arc::clone(provider);
        let this = self.clone();
        async move {
            let decrypted = provider.decrypt(&message, this.unlocked_key()?).await?;
            let filename = decrypted
                .filename
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| strip_openpgp_suffix(&filename).to_string());
            Ok(Outcome::Artifact(Payload {
                data: decrypted.content,
                filename: Some(filename),
                content_type: None,
                title: Some(messages::decrypted_by(this.key_id())),
                kind: Some(messages::KIND_DECRYPTED.into()),
            }))
        }
        .boxed()
    }

    fn sign(
        &self,
        provider: &Arc<dyn CryptoProvider>,
        data: Vec<u8>,
        filename: String,
        mode: SignMode,
    ) -> Task {
        tracing::debug!(branch = "sign", ?mode, "classified input");
        let provider = Arc::clone(provider);
        let this = self.clone();
        async move {
            let signed = provider
                .sign(&data, &filename, this.unlocked_key()?, mode)
                .await?;
            let suffix = match mode {
                SignMode::Cleartext => "asc",
                SignMode::Inline => "pgp",
            };
            Ok(Outcome::Artifact(Payload {
                data: signed,
                filename: Some(format!("{filename}.{suffix}")),
                content_type: None,
                title: Some(messages::signed_by(this.key_id())),
                kind: Some(messages::KIND_SIGNED.into()),
            }))
        }
        .boxed()
    }
}

impl Key for PrivateKey {
    fn features(&self) -> &FeaturesChecked {
        &self.0.core.features
    }

    fn serialize(&self) -> Vec<Vec<u8>> {
        vec![self.0.core.serialized.clone()]
    }

    fn armor(&self) -> Result<Payload> {
        PublicKey::from_key(&SingleKey::Private(self.clone()))?.armor()
    }
}
