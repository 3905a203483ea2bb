//! Shared fixtures for core tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use sequoia_openpgp::Cert;

use crate::adapters::openpgp::sequoia_provider::SequoiaProvider;
use crate::core::errors::{KeydropError, Result};
use crate::core::models::data::{Info, Input, InputBatch, Payload};
use crate::core::models::items::Items;
use crate::core::models::operations::KeyRequest;
use crate::core::models::private_key::PrivateKey;
use crate::core::models::public_keys::PublicKeys;
use crate::core::models::task::{Outcome, Slot, SlotResult, Task};
use crate::core::services::state::State;
use crate::core::traits::fetcher::Fetcher;
use crate::core::traits::provider::CryptoProvider;

pub const PASSPHRASE: &str = "correct horse";

/// Serves a fixed set of paths.
#[derive(Default)]
pub struct StaticFetcher(pub HashMap<String, Input>);

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, path: &str) -> Result<Input> {
        self.0.get(path).cloned().ok_or_else(|| KeydropError::Fetch {
            url: path.to_string(),
            reason: "server response status 404".into(),
        })
    }
}

pub fn provider() -> Arc<dyn CryptoProvider> {
    Arc::new(SequoiaProvider::new())
}

pub fn state() -> State {
    State::new(provider(), Arc::new(StaticFetcher::default()))
}

pub fn request(name: &str) -> KeyRequest {
    KeyRequest {
        name: name.into(),
        email: format!("{}@example.org", name.to_lowercase()),
        passphrase: PASSPHRASE.into(),
    }
}

/// A freshly generated, unlocked key.
pub async fn unlocked_key(provider: &dyn CryptoProvider, name: &str) -> PrivateKey {
    PrivateKey::generate(provider, &request(name))
        .await
        .unwrap()
        .unlock(provider, PASSPHRASE)
        .await
        .unwrap()
}

/// A freshly generated certificate with its secrets decrypted.
pub async fn unlocked_cert(provider: &dyn CryptoProvider, name: &str) -> Cert {
    let locked = provider.generate(&request(name)).await.unwrap();
    provider.unlock(&locked, PASSPHRASE).await.unwrap()
}

/// What a list of tasks amounts to once awaited in order.
#[derive(Debug)]
pub struct Settled {
    pub keyring: PublicKeys,
    pub infos: Vec<Info>,
    pub payloads: Vec<Payload>,
}

/// Await every task in order, applying keyring updates to `keyring`.
pub async fn run_tasks(keyring: PublicKeys, tasks: Vec<Task>) -> Settled {
    let mut settled = Settled {
        keyring,
        infos: Vec::new(),
        payloads: Vec::new(),
    };
    for task in tasks {
        match task.await.unwrap() {
            Outcome::Info(info) => settled.infos.push(info),
            Outcome::Artifact(payload) => settled.payloads.push(payload),
            Outcome::Keyring(update) => {
                settled.keyring = update(settled.keyring).await.unwrap();
            }
            Outcome::PrivateKey(_) | Outcome::Nothing => {}
        }
    }
    settled
}

/// One batch holding the given inputs.
pub fn batch(inputs: Vec<Input>) -> InputBatch {
    async move {
        Ok(inputs
            .into_iter()
            .map(|input| async move { Ok(input) }.boxed())
            .collect())
    }
    .boxed()
}

/// `(error, text)` of every info slot.
pub fn infos(results: &Items<Slot>) -> Vec<(bool, String)> {
    results
        .iter()
        .filter_map(|slot| match &slot.result {
            SlotResult::Info(info) => Some((info.error, info.info.clone())),
            _ => None,
        })
        .collect()
}

pub fn artifacts(results: &Items<Slot>) -> Vec<crate::core::models::task::Artifact> {
    results
        .iter()
        .filter_map(|slot| match &slot.result {
            SlotResult::Artifact(artifact) => Some(artifact.clone()),
            _ => None,
        })
        .collect()
}
