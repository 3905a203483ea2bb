use std::collections::HashSet;
use std::sync::Arc;

use sequoia_openpgp::parse::Parse;
use sequoia_openpgp::serialize::SerializeInto;
use sequoia_openpgp::{Cert, Packet, PacketPile};

use crate::core::errors::{KeydropError, Result};
use crate::core::models::data::Payload;
use crate::core::models::features::FeaturesChecked;
use crate::core::models::key::{Key, KeyCore, SingleKey};
use crate::core::models::messages;
use crate::core::traits::provider::CryptoProvider;

/// One public certificate together with its checked features.
///
/// Cloning shares the same key; equality is identity.
#[derive(Debug, Clone)]
pub struct PublicKey(Arc<KeyCore>);

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

fn packet_bytes(packet: &Packet) -> Result<Vec<u8>> {
    packet.to_vec().map_err(KeydropError::provider)
}

impl PublicKey {
    /// Wrap a certificate, dropping any secret key material.
    pub async fn from_cert(provider: &dyn CryptoProvider, cert: Cert) -> Result<Self> {
        let cert = cert.strip_secret_key_material();
        let features = provider.check_key(&cert).await;
        Ok(Self(Arc::new(KeyCore::new(cert, features)?)))
    }

    /// The public half of a single key, reusing its features.
    pub fn from_key(key: &SingleKey) -> Result<Self> {
        match key {
            SingleKey::Public(public) => Ok(public.clone()),
            SingleKey::Private(private) => {
                let cert = private.core().cert.clone().strip_secret_key_material();
                Ok(Self(Arc::new(private.core().with_cert(cert)?)))
            }
        }
    }

    pub(crate) fn core(&self) -> &KeyCore {
        &self.0
    }

    pub fn cert(&self) -> &Cert {
        &self.0.cert
    }

    pub fn fingerprint(&self) -> &str {
        self.0.fingerprint()
    }

    pub fn key_id(&self) -> &str {
        self.0.key_id()
    }

    pub fn user_name(&self) -> String {
        self.0.user_name()
    }

    pub fn email(&self) -> Option<String> {
        self.0.email()
    }

    pub fn user_id(&self) -> String {
        self.0.user_id()
    }

    /// Append the packets that are not already part of this key.
    ///
    /// Packets are compared by their serialized bytes. When nothing is new
    /// the same key is returned; otherwise features are checked again.
    pub async fn merge(&self, provider: &dyn CryptoProvider, packets: Vec<Packet>) -> Result<Self> {
        let pile = PacketPile::from_bytes(&self.0.serialized).map_err(KeydropError::parse)?;
        let mut seen = HashSet::new();
        for packet in pile.into_children() {
            seen.insert(packet_bytes(&packet)?);
        }

        let mut added = Vec::new();
        for packet in packets {
            if seen.insert(packet_bytes(&packet)?) {
                added.push(packet);
            }
        }
        if added.is_empty() {
            return Ok(self.clone());
        }

        tracing::debug!(key = self.key_id(), packets = added.len(), "merging packets");
        let merged = self
            .0
            .cert
            .clone()
            .insert_packets(added)
            .map_err(KeydropError::provider)?;
        Self::from_cert(provider, merged).await
    }
}

impl Key for PublicKey {
    fn features(&self) -> &FeaturesChecked {
        &self.0.features
    }

    fn serialize(&self) -> Vec<Vec<u8>> {
        vec![self.0.serialized.clone()]
    }

    fn armor(&self) -> Result<Payload> {
        let data = self
            .0
            .cert
            .armored()
            .to_vec()
            .map_err(KeydropError::provider)?;
        let key_id = self.key_id().to_string();
        Ok(Payload {
            data,
            filename: Some(format!("{key_id}-public.asc")),
            content_type: None,
            title: Some(messages::public_key_file_containing(&[key_id])),
            kind: Some(messages::KIND_PUBLIC_KEY.into()),
        })
    }
}
