use std::io::{Read, Write};

use async_trait::async_trait;
use sequoia_openpgp as openpgp;
use openpgp::armor::ReaderMode;
use openpgp::cert::prelude::*;
use openpgp::cert::CertParser;
use openpgp::crypto::{Password, SessionKey};
use openpgp::packet::signature::SignatureBuilder;
use openpgp::packet::{PKESK, SKESK, Signature, UserID};
use openpgp::parse::stream::{
    DecryptionHelper, DecryptorBuilder, GoodChecksum, MessageLayer, MessageStructure,
    VerificationError, VerificationHelper, VerifierBuilder,
};
use openpgp::parse::{Dearmor, PacketParser, PacketParserBuilder, PacketParserResult, Parse};
use openpgp::policy::StandardPolicy;
use openpgp::serialize::stream::{Armorer, Encryptor2, LiteralWriter, Message, Recipient, Signer};
use openpgp::types::{HashAlgorithm, ReasonForRevocation, RevocationStatus, SignatureType, SymmetricAlgorithm};
use openpgp::{Cert, Fingerprint, KeyHandle, KeyID, Packet};

use crate::core::errors::{KeydropError, Result};
use crate::core::models::features::{Features, FeaturesChecked};
use crate::core::models::operations::{
    Decrypted, Encoded, EncryptedMessage, KeyRequest, SignMode, SignatureCheck, SignedMessage,
    UserIdCheck, Verification,
};
use crate::core::traits::provider::CryptoProvider;

/// Kind of the first armor block found in a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    PublicKey,
    PrivateKey,
    Message,
    SignedMessage,
    Signature,
}

fn armor_block(text: &str) -> Option<Block> {
    let header = text
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("-----BEGIN PGP "))?;
    let label = header
        .strip_prefix("-----BEGIN PGP ")?
        .strip_suffix("-----")?;
    match label {
        "PUBLIC KEY BLOCK" => Some(Block::PublicKey),
        "PRIVATE KEY BLOCK" => Some(Block::PrivateKey),
        "MESSAGE" => Some(Block::Message),
        "SIGNED MESSAGE" => Some(Block::SignedMessage),
        "SIGNATURE" => Some(Block::Signature),
        _ => None,
    }
}

fn invalid(reason: &str) -> openpgp::Error {
    openpgp::Error::InvalidOperation(reason.to_string())
}

/// Parser over `input`, dearmoring only text.
fn parser(input: Encoded<'_>) -> openpgp::Result<PacketParserResult<'_>> {
    let dearmor = if input.is_text() {
        Dearmor::Auto(ReaderMode::VeryTolerant)
    } else {
        Dearmor::Disabled
    };
    PacketParserBuilder::from_bytes(input.bytes())?
        .dearmor(dearmor)
        .build()
}

fn issuer_of(sig: &Signature) -> Option<KeyID> {
    sig.get_issuers().into_iter().next().map(KeyID::from)
}

/// OpenPGP provider backed by sequoia.
pub struct SequoiaProvider {
    policy: StandardPolicy<'static>,
}

impl SequoiaProvider {
    pub fn new() -> Self {
        Self {
            policy: StandardPolicy::new(),
        }
    }

    fn read_keys_sync(&self, input: Encoded<'_>) -> openpgp::Result<Vec<Cert>> {
        if let Encoded::Armored(text) = input
            && !matches!(
                armor_block(text),
                Some(Block::PublicKey | Block::PrivateKey)
            )
        {
            return Err(invalid("not an armored key").into());
        }
        let certs = CertParser::from(parser(input)?).collect::<openpgp::Result<Vec<_>>>()?;
        if certs.is_empty() {
            return Err(invalid("no key found").into());
        }
        Ok(certs)
    }

    fn read_revocations_sync(&self, text: &str) -> openpgp::Result<Vec<Signature>> {
        if armor_block(text) != Some(Block::PublicKey) {
            return Err(invalid("not an armored public key").into());
        }
        let mut signatures = Vec::new();
        let mut ppr = parser(Encoded::Armored(text))?;
        while let PacketParserResult::Some(pp) = ppr {
            let (packet, next) = pp.next()?;
            match packet {
                Packet::Signature(sig) if sig.typ() == SignatureType::KeyRevocation => {
                    signatures.push(sig)
                }
                Packet::Signature(_) => return Err(invalid("non-revocation signature found").into()),
                _ => return Err(invalid("not a revocation certificate").into()),
            }
            ppr = next;
        }
        if signatures.is_empty() {
            return Err(invalid("no signature found").into());
        }
        Ok(signatures)
    }

    fn read_signed_message_sync(&self, input: Encoded<'_>) -> openpgp::Result<SignedMessage> {
        if let Encoded::Armored(text) = input {
            if armor_block(text) != Some(Block::SignedMessage) {
                return Err(invalid("not a clear-signed message").into());
            }
            return Ok(SignedMessage {
                data: text.as_bytes().to_vec(),
                cleartext: true,
            });
        }

        let mut literals = 0;
        let mut ppr = parser(input)?;
        while let PacketParserResult::Some(pp) = ppr {
            match &pp.packet {
                Packet::Literal(_) => literals += 1,
                Packet::OnePassSig(_) | Packet::Signature(_) | Packet::CompressedData(_) => {}
                _ => return Err(invalid("not a signed message").into()),
            }
            ppr = pp.recurse()?.1;
        }
        if literals != 1 {
            return Err(invalid("message must contain exactly one literal data packet").into());
        }
        Ok(SignedMessage {
            data: input.bytes().to_vec(),
            cleartext: false,
        })
    }

    fn read_encrypted_message_sync(&self, input: Encoded<'_>) -> openpgp::Result<EncryptedMessage> {
        if let Encoded::Armored(text) = input
            && armor_block(text) != Some(Block::Message)
        {
            return Err(invalid("not an armored message").into());
        }
        let mut recipients = Vec::new();
        let mut ppr = parser(input)?;
        let mut encrypted = false;
        while let PacketParserResult::Some(pp) = ppr {
            match &pp.packet {
                Packet::PKESK(pkesk) => recipients.push(pkesk.recipient().clone()),
                Packet::SKESK(_) => {}
                Packet::SEIP(_) => {
                    encrypted = true;
                    break;
                }
                _ => return Err(invalid("not an encrypted message").into()),
            }
            ppr = pp.next()?.1;
        }
        if !encrypted {
            return Err(invalid("no encrypted data found").into());
        }
        Ok(EncryptedMessage {
            data: input.bytes().to_vec(),
            recipients,
        })
    }

    fn check_key_sync(&self, cert: &Cert) -> FeaturesChecked {
        let mut errors = Vec::new();
        let mut features = Features::default();
        match cert.with_policy(&self.policy, None) {
            Ok(valid) => {
                let alive = valid.alive().map_err(|e| errors.push(e.to_string())).is_ok();
                let revoked = matches!(valid.revocation_status(), RevocationStatus::Revoked(_));
                if revoked {
                    errors.push("key is revoked".to_string());
                }
                features.valid = alive && !revoked;
            }
            Err(e) => errors.push(e.to_string()),
        }
        if features.valid {
            let usable = || {
                cert.keys()
                    .with_policy(&self.policy, None)
                    .supported()
                    .alive()
                    .revoked(false)
            };
            features.signing = usable().for_signing().next().is_some();
            if !features.signing {
                errors.push("no valid signing key".to_string());
            }
            features.encryption = usable()
                .for_transport_encryption()
                .for_storage_encryption()
                .next()
                .is_some();
            if !features.encryption {
                errors.push("no valid encryption key".to_string());
            }
        }
        FeaturesChecked {
            features,
            error: (!errors.is_empty()).then(|| errors.join("\n")),
        }
    }

    fn verify_sync(&self, message: &SignedMessage, keys: &[Cert]) -> openpgp::Result<Verification> {
        let helper = VerifyHelper {
            certs: keys,
            checks: Vec::new(),
        };
        let mut verifier =
            VerifierBuilder::from_bytes(&message.data)?.with_policy(&self.policy, None, helper)?;
        let mut content = Vec::new();
        verifier.read_to_end(&mut content)?;
        Ok(Verification {
            content,
            signatures: verifier.into_helper().checks,
        })
    }

    fn verify_user_ids_sync(&self, cert: &Cert, keys: &[Cert]) -> Vec<UserIdCheck> {
        let mut checks = Vec::new();
        for uid in cert.userids() {
            let user_id = String::from_utf8_lossy(uid.userid().value()).into_owned();
            let before = checks.len();
            let sigs = uid
                .self_signatures()
                .into_iter()
                .chain(uid.certifications().into_iter());
            for sig in sigs {
                let issuers: Vec<KeyID> = sig.get_issuers().into_iter().map(KeyID::from).collect();
                let Some(issuer) = issuers.first().cloned() else {
                    continue;
                };
                let signer = keys
                    .iter()
                    .flat_map(|key| key.keys())
                    .find(|ka| issuers.contains(&ka.key().keyid()));
                let valid = signer.map(|ka| {
                    sig.verify_userid_binding(ka.key(), cert.primary_key().key(), uid.userid())
                        .is_ok()
                });
                checks.push(UserIdCheck {
                    user_id: user_id.clone(),
                    issuer,
                    valid,
                });
            }
            if checks.len() == before {
                checks.push(UserIdCheck {
                    user_id,
                    issuer: cert.keyid(),
                    valid: None,
                });
            }
        }
        checks
    }

    fn encrypt_sync(
        &self,
        data: &[u8],
        filename: &str,
        recipients: &[Cert],
        armor: bool,
    ) -> openpgp::Result<Vec<u8>> {
        let keys: Vec<Recipient> = recipients
            .iter()
            .flat_map(|cert| {
                cert.keys()
                    .with_policy(&self.policy, None)
                    .supported()
                    .alive()
                    .revoked(false)
                    .for_transport_encryption()
                    .for_storage_encryption()
            })
            .map(Recipient::from)
            .collect();
        if keys.is_empty() {
            return Err(invalid("no usable encryption key").into());
        }

        let mut sink = Vec::new();
        let message = Message::new(&mut sink);
        let message = if armor {
            Armorer::new(message).build()?
        } else {
            message
        };
        let message = Encryptor2::for_recipients(message, keys).build()?;
        let mut message = LiteralWriter::new(message).filename(filename)?.build()?;
        message.write_all(data)?;
        message.finalize()?;
        Ok(sink)
    }

    fn decrypt_sync(&self, message: &EncryptedMessage, key: &Cert) -> openpgp::Result<Decrypted> {
        let helper = DecryptHelper {
            policy: &self.policy,
            key,
            filename: None,
        };
        let mut decryptor =
            DecryptorBuilder::from_bytes(&message.data)?.with_policy(&self.policy, None, helper)?;
        let mut content = Vec::new();
        decryptor.read_to_end(&mut content)?;
        Ok(Decrypted {
            content,
            filename: decryptor.into_helper().filename,
        })
    }

    fn sign_sync(
        &self,
        data: &[u8],
        filename: &str,
        key: &Cert,
        mode: SignMode,
    ) -> openpgp::Result<Vec<u8>> {
        let keypair = key
            .keys()
            .with_policy(&self.policy, None)
            .supported()
            .alive()
            .revoked(false)
            .for_signing()
            .unencrypted_secret()
            .next()
            .ok_or_else(|| invalid("no unlocked signing key"))?
            .key()
            .clone()
            .into_keypair()?;

        let mut sink = Vec::new();
        let message = Message::new(&mut sink);
        match mode {
            SignMode::Cleartext => {
                let mut signer = Signer::new(message, keypair).cleartext().build()?;
                signer.write_all(data)?;
                signer.finalize()?;
            }
            SignMode::Inline => {
                let signer = Signer::new(message, keypair).build()?;
                let mut literal = LiteralWriter::new(signer).filename(filename)?.build()?;
                literal.write_all(data)?;
                literal.finalize()?;
            }
        }
        Ok(sink)
    }

    fn certify_sync(&self, target: &Cert, signer: &Cert) -> openpgp::Result<Cert> {
        let mut keypair = signer
            .keys()
            .with_policy(&self.policy, None)
            .supported()
            .alive()
            .revoked(false)
            .for_certification()
            .unencrypted_secret()
            .next()
            .ok_or_else(|| invalid("no unlocked certification key"))?
            .key()
            .clone()
            .into_keypair()?;
        let userid = target
            .with_policy(&self.policy, None)?
            .primary_userid()?
            .userid()
            .clone();
        let certification = userid.bind(
            &mut keypair,
            target,
            SignatureBuilder::new(SignatureType::GenericCertification),
        )?;
        target.clone().insert_packets(vec![Packet::from(certification)])
    }

    fn revoke_sync(&self, key: &Cert) -> openpgp::Result<Signature> {
        let mut keypair = key
            .primary_key()
            .key()
            .clone()
            .parts_into_secret()?
            .into_keypair()?;
        CertRevocationBuilder::new()
            .set_reason_for_revocation(ReasonForRevocation::Unspecified, b"")?
            .build(&mut keypair, key, None::<HashAlgorithm>)
    }

    fn generate_sync(&self, request: &KeyRequest) -> openpgp::Result<Cert> {
        let userid = UserID::from(format!("{} <{}>", request.name.trim(), request.email.trim()));
        let (cert, _revocation) = CertBuilder::general_purpose(CipherSuite::Cv25519, Some(userid))
            .set_password(Some(Password::from(request.passphrase.as_str())))
            .generate()?;
        Ok(cert)
    }

    fn unlock_sync(&self, key: &Cert, passphrase: &str) -> openpgp::Result<Cert> {
        let password = Password::from(passphrase);
        let mut packets: Vec<Packet> = Vec::new();
        for ka in key.keys().secret() {
            let secret = ka.key().clone();
            if !secret.secret().is_encrypted() {
                continue;
            }
            let secret = secret.decrypt_secret(&password)?;
            packets.push(if ka.primary() {
                secret.role_into_primary().into()
            } else {
                secret.role_into_subordinate().into()
            });
        }
        key.clone().insert_packets(packets)
    }

    fn lock_sync(&self, key: &Cert, passphrase: &str) -> openpgp::Result<Cert> {
        let password = Password::from(passphrase);
        let mut packets: Vec<Packet> = Vec::new();
        for ka in key.keys().secret() {
            let secret = ka.key().clone();
            if secret.secret().is_encrypted() {
                return Err(invalid("key is locked").into());
            }
            let secret = secret.encrypt_secret(&password)?;
            packets.push(if ka.primary() {
                secret.role_into_primary().into()
            } else {
                secret.role_into_subordinate().into()
            });
        }
        key.clone().insert_packets(packets)
    }
}

impl Default for SequoiaProvider {
    fn default() -> Self {
        Self::new()
    }
}

struct VerifyHelper<'a> {
    certs: &'a [Cert],
    checks: Vec<SignatureCheck>,
}

impl VerificationHelper for VerifyHelper<'_> {
    fn get_certs(&mut self, _ids: &[KeyHandle]) -> openpgp::Result<Vec<Cert>> {
        Ok(self.certs.to_vec())
    }

    fn check(&mut self, structure: MessageStructure) -> openpgp::Result<()> {
        for layer in structure {
            let MessageLayer::SignatureGroup { results } = layer else {
                continue;
            };
            for result in results {
                self.checks.push(match result {
                    Ok(GoodChecksum { sig, .. }) => SignatureCheck {
                        issuer: issuer_of(sig),
                        result: Ok(()),
                    },
                    Err(error) => SignatureCheck {
                        issuer: failed_issuer(&error),
                        result: Err(error.to_string()),
                    },
                });
            }
        }
        Ok(())
    }
}

fn failed_issuer(error: &VerificationError<'_>) -> Option<KeyID> {
    match error {
        VerificationError::MalformedSignature { sig, .. }
        | VerificationError::MissingKey { sig }
        | VerificationError::UnboundKey { sig, .. }
        | VerificationError::BadKey { sig, .. }
        | VerificationError::BadSignature { sig, .. } => issuer_of(sig),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

struct DecryptHelper<'a> {
    policy: &'a StandardPolicy<'static>,
    key: &'a Cert,
    filename: Option<String>,
}

impl VerificationHelper for DecryptHelper<'_> {
    fn get_certs(&mut self, _ids: &[KeyHandle]) -> openpgp::Result<Vec<Cert>> {
        Ok(Vec::new())
    }

    fn check(&mut self, _structure: MessageStructure) -> openpgp::Result<()> {
        Ok(())
    }

    fn inspect(&mut self, pp: &PacketParser<'_>) -> openpgp::Result<()> {
        if let Packet::Literal(literal) = &pp.packet {
            self.filename = literal
                .filename()
                .map(|name| String::from_utf8_lossy(name).into_owned());
        }
        Ok(())
    }
}

impl DecryptionHelper for DecryptHelper<'_> {
    fn decrypt<D>(
        &mut self,
        pkesks: &[PKESK],
        _skesks: &[SKESK],
        sym_algo: Option<SymmetricAlgorithm>,
        mut decrypt: D,
    ) -> openpgp::Result<Option<Fingerprint>>
    where
        D: FnMut(SymmetricAlgorithm, &SessionKey) -> bool,
    {
        let keys: Vec<_> = self
            .key
            .keys()
            .with_policy(self.policy, None)
            .supported()
            .unencrypted_secret()
            .for_transport_encryption()
            .for_storage_encryption()
            .collect();
        for pkesk in pkesks {
            for ka in &keys {
                let recipient = pkesk.recipient();
                if !recipient.is_wildcard() && *recipient != ka.key().keyid() {
                    continue;
                }
                let mut pair = ka.key().clone().into_keypair()?;
                if pkesk
                    .decrypt(&mut pair, sym_algo)
                    .is_some_and(|(algo, session_key)| decrypt(algo, &session_key))
                {
                    return Ok(Some(ka.key().fingerprint()));
                }
            }
        }
        Err(invalid("no key to decrypt this message").into())
    }
}

#[async_trait]
impl CryptoProvider for SequoiaProvider {
    async fn read_keys(&self, input: Encoded<'_>) -> Result<Vec<Cert>> {
        self.read_keys_sync(input).map_err(KeydropError::parse)
    }

    async fn read_revocations(&self, text: &str) -> Result<Vec<Signature>> {
        self.read_revocations_sync(text).map_err(KeydropError::parse)
    }

    async fn read_signed_message(&self, input: Encoded<'_>) -> Result<SignedMessage> {
        self.read_signed_message_sync(input).map_err(KeydropError::parse)
    }

    async fn read_encrypted_message(&self, input: Encoded<'_>) -> Result<EncryptedMessage> {
        self.read_encrypted_message_sync(input)
            .map_err(KeydropError::parse)
    }

    async fn check_key(&self, cert: &Cert) -> FeaturesChecked {
        self.check_key_sync(cert)
    }

    async fn verify(&self, message: &SignedMessage, keys: &[Cert]) -> Result<Verification> {
        self.verify_sync(message, keys)
            .map_err(|e| KeydropError::Verification {
                reason: e.to_string(),
            })
    }

    async fn verify_user_ids(&self, cert: &Cert, keys: &[Cert]) -> Result<Vec<UserIdCheck>> {
        Ok(self.verify_user_ids_sync(cert, keys))
    }

    async fn encrypt(
        &self,
        data: &[u8],
        filename: &str,
        recipients: &[Cert],
        armor: bool,
    ) -> Result<Vec<u8>> {
        self.encrypt_sync(data, filename, recipients, armor)
            .map_err(KeydropError::provider)
    }

    async fn decrypt(&self, message: &EncryptedMessage, key: &Cert) -> Result<Decrypted> {
        self.decrypt_sync(message, key).map_err(KeydropError::provider)
    }

    async fn sign(
        &self,
        data: &[u8],
        filename: &str,
        key: &Cert,
        mode: SignMode,
    ) -> Result<Vec<u8>> {
        self.sign_sync(data, filename, key, mode)
            .map_err(KeydropError::provider)
    }

    async fn certify(&self, target: &Cert, signer: &Cert) -> Result<Cert> {
        self.certify_sync(target, signer)
            .map_err(KeydropError::provider)
    }

    async fn revoke(&self, key: &Cert) -> Result<Signature> {
        self.revoke_sync(key).map_err(KeydropError::provider)
    }

    async fn generate(&self, request: &KeyRequest) -> Result<Cert> {
        self.generate_sync(request).map_err(KeydropError::provider)
    }

    async fn unlock(&self, key: &Cert, passphrase: &str) -> Result<Cert> {
        self.unlock_sync(key, passphrase)
            .map_err(KeydropError::provider)
    }

    async fn lock(&self, key: &Cert, passphrase: &str) -> Result<Cert> {
        self.lock_sync(key, passphrase).map_err(KeydropError::provider)
    }

    fn name(&self) -> &str {
        "sequoia"
    }
}
