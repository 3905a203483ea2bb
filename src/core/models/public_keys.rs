use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock, OnceLock};

use futures::future::{BoxFuture, FutureExt, Shared};
use sequoia_openpgp::armor;
use sequoia_openpgp::packet::Signature;
use sequoia_openpgp::parse::Parse;
use sequoia_openpgp::serialize::SerializeInto;
use sequoia_openpgp::{Cert, KeyID, Packet, PacketPile};

use crate::core::errors::{KeydropError, Result};
use crate::core::models::data::{Info, Input, Payload, strip_openpgp_suffix};
use crate::core::models::features::FeaturesChecked;
use crate::core::models::key::{Key, SingleKey, armor_chunks, fingerprint_hex, user_id_of};
use crate::core::models::messages;
use crate::core::models::operations::{Encoded, SignedMessage, UserIdCheck};
use crate::core::models::private_key::PrivateKey;
use crate::core::models::public_key::PublicKey;
use crate::core::models::task::{Outcome, Task, failed, keyring_update, ready};
use crate::core::traits::provider::CryptoProvider;

/// Anything that can be imported into a keyring.
#[derive(Debug, Clone)]
pub enum Importable {
    Cert(Cert),
    Key(SingleKey),
}

impl From<Cert> for Importable {
    fn from(cert: Cert) -> Self {
        Importable::Cert(cert)
    }
}

impl From<SingleKey> for Importable {
    fn from(key: SingleKey) -> Self {
        Importable::Key(key)
    }
}

impl From<PublicKey> for Importable {
    fn from(key: PublicKey) -> Self {
        Importable::Key(SingleKey::Public(key))
    }
}

impl From<PrivateKey> for Importable {
    fn from(key: PrivateKey) -> Self {
        Importable::Key(SingleKey::Private(key))
    }
}

/// Public packets of a certificate, in canonical order.
fn public_packets(cert: &Cert) -> Result<Vec<Packet>> {
    let bytes = cert.to_vec().map_err(KeydropError::provider)?;
    let pile = PacketPile::from_bytes(&bytes).map_err(KeydropError::parse)?;
    Ok(pile.into_children().collect())
}

fn hex(id: &KeyID) -> String {
    id.to_hex().to_lowercase()
}

/// Key ID of whoever issued a signature, as lower-case hex.
fn issuer_key_id(sig: &Signature) -> String {
    sig.get_issuers()
        .into_iter()
        .next()
        .map(|handle| hex(&KeyID::from(handle)))
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
struct CertifyReport {
    info: Info,
    cert: Cert,
}

type SharedReport = Shared<BoxFuture<'static, std::result::Result<CertifyReport, String>>>;

#[derive(Debug, Default)]
struct Keyring {
    members: BTreeMap<String, PublicKey>,
    features: OnceLock<FeaturesChecked>,
    owners: OnceLock<HashMap<KeyID, Option<PublicKey>>>,
}

/// The keyring: an immutable set of public keys indexed by fingerprint.
///
/// Every update returns a new keyring, or the very same one when nothing
/// changed. Cloning shares; equality is identity.
#[derive(Debug, Clone)]
pub struct PublicKeys(Arc<Keyring>);

impl PartialEq for PublicKeys {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

static EMPTY: LazyLock<PublicKeys> = LazyLock::new(|| PublicKeys(Arc::default()));

impl PublicKeys {
    /// The shared empty keyring.
    pub fn empty() -> Self {
        EMPTY.clone()
    }

    fn with_members(members: BTreeMap<String, PublicKey>) -> Self {
        Self(Arc::new(Keyring {
            members,
            ..Keyring::default()
        }))
    }

    /// Build a keyring, merging certificates that share a fingerprint.
    pub async fn from_certs(provider: &dyn CryptoProvider, certs: Vec<Cert>) -> Result<Self> {
        let mut members: BTreeMap<String, PublicKey> = BTreeMap::new();
        for cert in certs {
            let fingerprint = fingerprint_hex(&cert);
            let key = match members.get(&fingerprint) {
                Some(old) => old.merge(provider, public_packets(&cert)?).await?,
                None => PublicKey::from_cert(provider, cert).await?,
            };
            members.insert(fingerprint, key);
        }
        Ok(Self::with_members(members))
    }

    pub fn len(&self) -> usize {
        self.0.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.members.is_empty()
    }

    /// Members in fingerprint order.
    pub fn iter(&self) -> impl Iterator<Item = &PublicKey> {
        self.0.members.values()
    }

    pub fn get(&self, fingerprint: &str) -> Option<&PublicKey> {
        self.0.members.get(fingerprint)
    }

    fn certs(&self) -> Vec<Cert> {
        self.iter().map(|key| key.cert().clone()).collect()
    }

    /// User IDs of every member.
    pub fn users(&self) -> Vec<String> {
        self.iter().map(PublicKey::user_id).collect()
    }

    /// Display name for whoever owns `key_id`.
    ///
    /// Primary and subkey IDs are indexed. An ID owned by more than one
    /// member is ambiguous and falls back to its hex form.
    pub fn user_of(&self, key_id: &KeyID) -> String {
        let owners = self.0.owners.get_or_init(|| {
            let mut owners: HashMap<KeyID, Option<PublicKey>> = HashMap::new();
            for member in self.iter() {
                for ka in member.cert().keys() {
                    owners
                        .entry(ka.key().keyid())
                        .and_modify(|owner| {
                            if owner.as_ref() != Some(member) {
                                *owner = None;
                            }
                        })
                        .or_insert_with(|| Some(member.clone()));
                }
            }
            owners
        });
        match owners.get(key_id) {
            Some(Some(owner)) => owner.user_id(),
            _ => hex(key_id),
        }
    }

    /// Drop the given fingerprints.
    pub fn delete<'a>(&self, fingerprints: impl IntoIterator<Item = &'a str>) -> Self {
        let mut members = self.0.members.clone();
        for fingerprint in fingerprints {
            members.remove(fingerprint);
        }
        if members.len() == self.len() {
            self.clone()
        } else {
            Self::with_members(members)
        }
    }

    /// Only the members whose features are valid.
    pub fn valid_keys(&self) -> Self {
        let members: BTreeMap<_, _> = self
            .0
            .members
            .iter()
            .filter(|(_, key)| key.features().valid())
            .map(|(fingerprint, key)| (fingerprint.clone(), key.clone()))
            .collect();
        if members.len() == self.len() {
            self.clone()
        } else {
            Self::with_members(members)
        }
    }

    /// Add or merge keys. Returns the same keyring when nothing changed.
    pub async fn import_keys<I>(&self, provider: &dyn CryptoProvider, keys: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Importable>,
    {
        let mut members = self.0.members.clone();
        let mut modified = false;
        for key in keys {
            let (fingerprint, key) = match key.into() {
                Importable::Cert(cert) => (fingerprint_hex(&cert), Importable::Cert(cert)),
                Importable::Key(key) => (key.fingerprint().to_string(), Importable::Key(key)),
            };
            let old = members.get(&fingerprint).cloned();
            let new = match (&old, key) {
                (Some(old), Importable::Cert(cert)) => old.merge(provider, public_packets(&cert)?).await?,
                (Some(old), Importable::Key(key)) => {
                    old.merge(provider, public_packets(key.cert())?).await?
                }
                (None, Importable::Key(SingleKey::Public(key))) => key,
                (None, Importable::Key(key)) => PublicKey::from_key(&key)?,
                (None, Importable::Cert(cert)) => PublicKey::from_cert(provider, cert).await?,
            };
            modified |= old.as_ref() != Some(&new);
            members.insert(fingerprint, new);
        }
        Ok(if modified {
            Self::with_members(members)
        } else {
            self.clone()
        })
    }

    async fn merge_revocations(
        &self,
        provider: &dyn CryptoProvider,
        signatures: Vec<Signature>,
    ) -> Result<Self> {
        let mut members = self.0.members.clone();
        let mut modified = false;
        for sig in signatures {
            let Some(fingerprint) = sig
                .issuer_fingerprints()
                .next()
                .map(|fp| fp.to_hex().to_lowercase())
            else {
                continue;
            };
            let Some(old) = members.get(&fingerprint).cloned() else {
                continue;
            };
            let new = old.merge(provider, vec![Packet::from(sig)]).await?;
            modified |= new != old;
            members.insert(fingerprint, new);
        }
        Ok(if modified {
            Self::with_members(members)
        } else {
            self.clone()
        })
    }

    /// Decide what the dropped input means for this keyring and return the
    /// resulting tasks.
    ///
    /// The first interpretation that parses wins: keys, then (text only)
    /// revocation certificates, then signed messages when every member can
    /// verify, then encryption when every member can receive. Text is tried
    /// before binary.
    pub async fn process(
        &self,
        provider: &Arc<dyn CryptoProvider>,
        input: Input,
    ) -> Result<Vec<Task>> {
        let filename = input.filename.clone().unwrap_or_else(|| "data".into());
        let features = self.features().clone();
        let mut last_error = None;

        if let Some(text) = input.text() {
            match provider.read_keys(Encoded::Armored(text)).await {
                Ok(certs) => return Ok(self.certify(provider, certs)),
                Err(e) => last_error = Some(e),
            }
            match provider.read_revocations(text).await {
                Ok(signatures) => return Ok(self.revoke(provider, signatures)),
                Err(e) => last_error = Some(e),
            }
            if features.signing() {
                match provider.read_signed_message(Encoded::Armored(text)).await {
                    Ok(message) => return Ok(self.verify(provider, message, filename).await),
                    Err(e) => last_error = Some(e),
                }
            }
            if features.encryption() {
                tracing::debug!(branch = "encrypt", armor = true, "classified input");
                return Ok(vec![self.encrypt(provider, input.data, filename, true)]);
            }
        }

        match provider.read_keys(Encoded::Binary(&input.data)).await {
            Ok(certs) => return Ok(self.certify(provider, certs)),
            Err(e) => last_error = Some(e),
        }
        if features.signing() {
            match provider.read_signed_message(Encoded::Binary(&input.data)).await {
                Ok(message) => return Ok(self.verify(provider, message, filename).await),
                Err(e) => last_error = Some(e),
            }
        }
        if features.encryption() {
            tracing::debug!(branch = "encrypt", armor = false, "classified input");
            return Ok(vec![self.encrypt(provider, input.data, filename, false)]);
        }

        Err(last_error.unwrap_or(KeydropError::NoInterpretation))
    }

    fn certify(&self, provider: &Arc<dyn CryptoProvider>, certs: Vec<Cert>) -> Vec<Task> {
        tracing::debug!(branch = "certify", keys = certs.len(), "classified input");
        let private = match certs.as_slice() {
            [only] if only.is_tsk() => Some(only.clone()),
            _ => None,
        };
        let private_task = private.map(|cert| {
            let provider = Arc::clone(provider);
            async move {
                let key = PrivateKey::from_cert(provider.as_ref(), cert).await?;
                Ok(Outcome::PrivateKey(key))
            }
            .boxed()
        });

        if self.is_empty() {
            if let Some(task) = private_task {
                return vec![task];
            }
            let mut tasks: Vec<Task> = certs
                .iter()
                .map(|cert| ready(Outcome::Info(Info::ok(messages::key_imported(&user_id_of(cert))))))
                .collect();
            let provider = Arc::clone(provider);
            tasks.push(ready(keyring_update(move |_| async move {
                PublicKeys::from_certs(provider.as_ref(), certs).await
            })));
            return tasks;
        }

        let verification_keys = self.certs();
        let reports: Vec<SharedReport> = certs
            .into_iter()
            .map(|cert| {
                let provider = Arc::clone(provider);
                let keyring = self.clone();
                let keys = verification_keys.clone();
                async move {
                    let checks = provider
                        .verify_user_ids(&cert, &keys)
                        .await
                        .map_err(|e| e.to_string())?;
                    Ok(keyring.certify_report(cert, &checks))
                }
                .boxed()
                .shared()
            })
            .collect();

        let mut tasks: Vec<Task> = reports
            .iter()
            .cloned()
            .map(|report| {
                async move {
                    let report = report
                        .await
                        .map_err(|reason| KeydropError::Verification { reason })?;
                    Ok(Outcome::Info(report.info))
                }
                .boxed()
            })
            .collect();

        tasks.push(private_task.unwrap_or_else(|| {
            let provider = Arc::clone(provider);
            async move {
                // A rejected verification imports nothing at all.
                let all = futures::future::try_join_all(reports)
                    .await
                    .unwrap_or_default();
                let keys: Vec<Cert> = all
                    .into_iter()
                    .filter(|report| !report.info.error)
                    .map(|report| report.cert)
                    .collect();
                Ok(keyring_update(move |old| async move {
                    old.import_keys(provider.as_ref(), keys).await
                }))
            }
            .boxed()
        }));
        tasks
    }

    fn certify_report(&self, cert: Cert, checks: &[UserIdCheck]) -> CertifyReport {
        let mut error = false;
        let lines: Vec<String> = checks
            .iter()
            .map(|check| match check.valid {
                None => messages::key_is_not_signed_by_any_given_key(&check.user_id),
                Some(true) => messages::key_is_signed_by(&check.user_id, &self.user_of(&check.issuer)),
                Some(false) => {
                    error = true;
                    messages::key_has_bad_signature_of(&check.user_id, &self.user_of(&check.issuer))
                }
            })
            .collect();
        let info = lines.join("\n");
        CertifyReport {
            info: if error { Info::error(info) } else { Info::ok(info) },
            cert,
        }
    }

    fn revoke(&self, provider: &Arc<dyn CryptoProvider>, signatures: Vec<Signature>) -> Vec<Task> {
        tracing::debug!(branch = "revoke", signatures = signatures.len(), "classified input");
        let mut tasks: Vec<Task> = signatures
            .iter()
            .map(|sig| {
                let info = messages::merge_revocation_certificate_of(&issuer_key_id(sig));
                ready(Outcome::Info(Info::ok(info)))
            })
            .collect();
        let provider = Arc::clone(provider);
        tasks.push(ready(keyring_update(move |old| async move {
            old.merge_revocations(provider.as_ref(), signatures).await
        })));
        tasks
    }

    async fn verify(
        &self,
        provider: &Arc<dyn CryptoProvider>,
        message: SignedMessage,
        filename: String,
    ) -> Vec<Task> {
        tracing::debug!(branch = "verify", cleartext = message.cleartext, "classified input");
        let verification = match provider.verify(&message, &self.certs()).await {
            Ok(verification) => verification,
            Err(e) => return vec![failed(e)],
        };
        let mut tasks: Vec<Task> = verification
            .signatures
            .iter()
            .map(|check| {
                let signer = check
                    .issuer
                    .as_ref()
                    .map(|id| self.user_of(id))
                    .unwrap_or_else(|| "unknown".into());
                let info = match &check.result {
                    Ok(()) => Info::ok(messages::good_signature_by(&signer)),
                    Err(reason) => Info::error(messages::bad_signature_by(&signer, reason)),
                };
                ready(Outcome::Info(info))
            })
            .collect();
        tasks.push(ready(Outcome::Artifact(Payload {
            data: verification.content,
            filename: Some(strip_openpgp_suffix(&filename).to_string()),
            content_type: None,
            title: Some(messages::verified_content_of(&filename)),
            kind: Some(messages::KIND_VERIFIED.into()),
        })));
        tasks
    }

    fn encrypt(
        &self,
        provider: &Arc<dyn CryptoProvider>,
        data: Vec<u8>,
        filename: String,
        armor: bool,
    ) -> Task {
        let provider = Arc::clone(provider);
        let recipients = self.certs();
        let users = self.users();
        async move {
            let data = provider.encrypt(&data, &filename, &recipients, armor).await?;
            let suffix = if armor { "asc" } else { "pgp" };
            Ok(Outcome::Artifact(Payload {
                data,
                filename: Some(format!("{filename}.{suffix}")),
                content_type: None,
                title: Some(messages::encrypted_for(&users)),
                kind: Some(messages::KIND_ENCRYPTED.into()),
            }))
        }
        .boxed()
    }
}

impl Key for PublicKeys {
    fn features(&self) -> &FeaturesChecked {
        self.0
            .features
            .get_or_init(|| FeaturesChecked::aggregate(self.iter().map(|key| key.features())))
    }

    fn serialize(&self) -> Vec<Vec<u8>> {
        self.iter().flat_map(|key| key.serialize()).collect()
    }

    fn armor(&self) -> Result<Payload> {
        if let [only] = self.iter().collect::<Vec<_>>().as_slice() {
            return only.armor();
        }
        let data = armor_chunks(armor::Kind::PublicKey, &self.serialize())?;
        let key_ids: Vec<String> = self.iter().map(|key| key.key_id().to_string()).collect();
        Ok(Payload {
            data,
            filename: Some("keys-public.asc".into()),
            content_type: None,
            title: Some(messages::public_key_file_containing(&key_ids)),
            kind: Some(messages::KIND_PUBLIC_KEY.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use sequoia_openpgp::packet::signature::SignatureBuilder;
    use sequoia_openpgp::types::{KeyFlags, SignatureType};

    use super::*;
    use crate::core::test_support::{provider, run_tasks, unlocked_cert, unlocked_key};

    /// The artifact a private key produces for `input`.
    async fn produced_by(
        provider: &Arc<dyn CryptoProvider>,
        key: &PrivateKey,
        input: Input,
    ) -> Payload {
        let tasks = key.process(provider, input).await.unwrap();
        let mut settled = run_tasks(PublicKeys::empty(), tasks).await;
        settled.payloads.remove(0)
    }

    async fn keyring_with(provider: &Arc<dyn CryptoProvider>, key: &PrivateKey) -> PublicKeys {
        PublicKeys::empty()
            .import_keys(provider.as_ref(), vec![key.clone()])
            .await
            .unwrap()
    }

    async fn keyring_of(names: &[&str]) -> (Arc<dyn CryptoProvider>, PublicKeys) {
        let provider = provider();
        let mut keys = Vec::new();
        for name in names {
            keys.push(unlocked_key(provider.as_ref(), name).await);
        }
        let keyring = PublicKeys::empty()
            .import_keys(provider.as_ref(), keys)
            .await
            .unwrap();
        (provider, keyring)
    }

    #[tokio::test]
    async fn import_is_idempotent() {
        let (provider, keyring) = keyring_of(&["Alice"]).await;
        assert_eq!(keyring.len(), 1);

        let again = keyring
            .import_keys(provider.as_ref(), keyring.certs())
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&again.0, &keyring.0));

        let member = keyring.iter().next().unwrap().clone();
        let merged = member
            .merge(provider.as_ref(), public_packets(member.cert()).unwrap())
            .await
            .unwrap();
        assert_eq!(merged, member);
    }

    #[tokio::test]
    async fn armor_round_trip_keeps_fingerprints_and_features() {
        let (provider, keyring) = keyring_of(&["Alice", "Bob"]).await;
        let payload = keyring.armor().unwrap();
        assert_eq!(payload.filename.as_deref(), Some("keys-public.asc"));

        let text = String::from_utf8(payload.data).unwrap();
        let certs = provider.read_keys(Encoded::Armored(&text)).await.unwrap();
        let restored = PublicKeys::from_certs(provider.as_ref(), certs).await.unwrap();

        let fingerprints = |k: &PublicKeys| -> Vec<String> {
            k.iter().map(|key| key.fingerprint().to_string()).collect()
        };
        assert_eq!(fingerprints(&restored), fingerprints(&keyring));
        assert_eq!(restored.features(), keyring.features());
        assert!(restored.features().encryption() && restored.features().signing());
    }

    #[tokio::test]
    async fn owners_resolve_by_primary_and_subkey_ids() {
        let (_, keyring) = keyring_of(&["Alice"]).await;
        let member = keyring.iter().next().unwrap();
        for ka in member.cert().keys() {
            assert_eq!(keyring.user_of(&ka.key().keyid()), member.user_id());
        }
        let stranger = KeyID::from(0x0123_4567_89ab_cdef_u64);
        assert_eq!(keyring.user_of(&stranger), "0123456789abcdef");
    }

    #[tokio::test]
    async fn armored_keyring_restores_through_the_key_branch() {
        let (provider, keyring) = keyring_of(&["Alice", "Bob"]).await;
        let input = Input::new(keyring.armor().unwrap().data).with_filename("keys-public.asc");

        let tasks = PublicKeys::empty().process(&provider, input).await.unwrap();
        let settled = run_tasks(PublicKeys::empty(), tasks).await;

        assert!(settled.payloads.is_empty());
        assert_eq!(settled.infos.len(), 2);
        assert!(settled.infos.iter().all(|info| !info.error));
        let restored = settled.keyring;
        let fingerprints = |k: &PublicKeys| -> Vec<String> {
            k.iter().map(|key| key.fingerprint().to_string()).collect()
        };
        assert_eq!(fingerprints(&restored), fingerprints(&keyring));
        assert_eq!(restored.features(), keyring.features());
    }

    #[tokio::test]
    async fn revocation_certificate_invalidates_its_member() {
        let provider = provider();
        let alice = unlocked_key(provider.as_ref(), "Alice").await;
        let keyring = keyring_with(&provider, &alice).await;
        assert!(keyring.features().valid());

        let certificate = alice.revocation_certificate(provider.as_ref()).await.unwrap();
        let input = Input::new(certificate.data).with_filename("alice-revoke.asc");
        let tasks = keyring.process(&provider, input).await.unwrap();
        let settled = run_tasks(keyring.clone(), tasks).await;

        assert_eq!(
            settled.infos,
            vec![Info::ok(messages::merge_revocation_certificate_of(alice.key_id()))]
        );
        assert_ne!(settled.keyring, keyring);
        let member = settled.keyring.get(alice.fingerprint()).unwrap();
        assert!(!member.features().valid());
    }

    #[tokio::test]
    async fn revocation_by_a_stranger_changes_nothing() {
        let provider = provider();
        let alice = unlocked_key(provider.as_ref(), "Alice").await;
        let mallory = unlocked_key(provider.as_ref(), "Mallory").await;
        let keyring = keyring_with(&provider, &alice).await;

        let certificate = mallory.revocation_certificate(provider.as_ref()).await.unwrap();
        let input = Input::new(certificate.data);
        let tasks = keyring.process(&provider, input).await.unwrap();
        let settled = run_tasks(keyring.clone(), tasks).await;

        assert_eq!(settled.keyring, keyring);
    }

    #[tokio::test]
    async fn clear_signed_text_is_verified() {
        let provider = provider();
        let alice = unlocked_key(provider.as_ref(), "Alice").await;
        let keyring = keyring_with(&provider, &alice).await;
        let note = Input::new("I agree.\n").with_filename("note.txt");
        let signed = produced_by(&provider, &alice, note).await;
        assert_eq!(signed.filename.as_deref(), Some("note.txt.asc"));

        let input = Input::new(signed.data).with_filename("note.txt.asc");
        let tasks = keyring.process(&provider, input).await.unwrap();
        let settled = run_tasks(keyring.clone(), tasks).await;

        assert_eq!(
            settled.infos,
            vec![Info::ok(messages::good_signature_by(&alice.user_id()))]
        );
        let [content] = settled.payloads.as_slice() else {
            panic!("expected one verified artifact");
        };
        assert_eq!(content.filename.as_deref(), Some("note.txt"));
        assert_eq!(content.kind.as_deref(), Some(messages::KIND_VERIFIED));
        assert!(content.data.starts_with(b"I agree."));
        assert_eq!(settled.keyring, keyring);
    }

    #[tokio::test]
    async fn inline_signed_binary_is_verified() {
        let provider = provider();
        let alice = unlocked_key(provider.as_ref(), "Alice").await;
        let keyring = keyring_with(&provider, &alice).await;
        let blob = vec![0xff, 0xfe, 0x00, 0x01, 0x80];
        let input = Input::new(blob.clone()).with_filename("blob.bin");
        let signed = produced_by(&provider, &alice, input).await;
        assert_eq!(signed.filename.as_deref(), Some("blob.bin.pgp"));

        let input = Input::new(signed.data).with_filename("blob.bin.pgp");
        let tasks = keyring.process(&provider, input).await.unwrap();
        let settled = run_tasks(keyring, tasks).await;

        assert_eq!(
            settled.infos,
            vec![Info::ok(messages::good_signature_by(&alice.user_id()))]
        );
        let [content] = settled.payloads.as_slice() else {
            panic!("expected one verified artifact");
        };
        assert_eq!(content.filename.as_deref(), Some("blob.bin"));
        assert_eq!(content.kind.as_deref(), Some(messages::KIND_VERIFIED));
        assert_eq!(content.data, blob);
    }

    #[tokio::test]
    async fn incoming_keys_are_checked_against_the_keyring() {
        let provider = provider();
        let alice = unlocked_key(provider.as_ref(), "Alice").await;
        let bob = unlocked_key(provider.as_ref(), "Bob").await;
        let keyring = keyring_with(&provider, &alice).await;
        let bob_public = Input::new(bob.armor().unwrap().data).with_filename("bob.asc");
        let certified = produced_by(&provider, &alice, bob_public).await;

        let input = Input::new(certified.data).with_filename("bob.asc.key.asc");
        let tasks = keyring.process(&provider, input).await.unwrap();
        let settled = run_tasks(keyring, tasks).await;

        let [report] = settled.infos.as_slice() else {
            panic!("expected one report per incoming key");
        };
        assert!(!report.error);
        assert!(
            report
                .info
                .contains(&messages::key_is_signed_by(&bob.user_id(), &alice.user_id())),
            "{}",
            report.info
        );
        assert!(settled.payloads.is_empty());
        assert_eq!(settled.keyring.len(), 2);
        assert!(settled.keyring.get(bob.fingerprint()).is_some());
    }

    #[tokio::test]
    async fn shared_key_id_falls_back_to_hex() {
        let provider = provider();
        let alice = unlocked_cert(provider.as_ref(), "Alice").await;
        let bob = unlocked_cert(provider.as_ref(), "Bob").await;

        // Bob binds Alice's primary key as one of his own subkeys.
        let mut signer = bob
            .primary_key()
            .key()
            .clone()
            .parts_into_secret()
            .unwrap()
            .into_keypair()
            .unwrap();
        let borrowed = alice
            .primary_key()
            .key()
            .clone()
            .role_into_subordinate();
        let binding = SignatureBuilder::new(SignatureType::SubkeyBinding)
            .set_key_flags(KeyFlags::empty().set_storage_encryption())
            .unwrap()
            .sign_subkey_binding(&mut signer, bob.primary_key().key(), &borrowed)
            .unwrap();
        let bob = bob
            .insert_packets(vec![Packet::from(borrowed), Packet::from(binding)])
            .unwrap();

        let keyring = PublicKeys::from_certs(provider.as_ref(), vec![alice.clone(), bob.clone()])
            .await
            .unwrap();
        assert_eq!(keyring.len(), 2);
        assert_eq!(keyring.user_of(&alice.keyid()), hex(&alice.keyid()));
        assert_eq!(keyring.user_of(&bob.keyid()), user_id_of(&bob));
    }

    #[test]
    fn empty_keyring_has_no_features() {
        let empty = PublicKeys::empty();
        assert!(empty.is_empty());
        assert!(empty.features().valid());
        assert!(!empty.features().signing());
        assert!(!empty.features().encryption());
        assert_eq!(PublicKeys::empty(), empty);
    }

    #[test]
    fn delete_unknown_keeps_reference() {
        let empty = PublicKeys::empty();
        assert!(Arc::ptr_eq(&empty.delete(["nope"]).0, &empty.0));
    }
}
