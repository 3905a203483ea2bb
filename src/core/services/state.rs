use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::sync::watch;

use crate::core::errors::{KeydropError, Result};
use crate::core::models::data::{Info, Input, InputBatch};
use crate::core::models::items::Items;
use crate::core::models::key::Key;
use crate::core::models::operations::KeyRequest;
use crate::core::models::private_key::PrivateKey;
use crate::core::models::public_keys::PublicKeys;
use crate::core::models::task::{
    KeyringUpdate, Outcome, RunOptions, Slot, SlotId, SlotResult, Task, failed, keyring_update,
    ready,
};
use crate::core::services::keyring_queue::KeyringQueue;
use crate::core::services::notifier::Notifier;
use crate::core::services::routing::{self, NEW_KEY, Route};
use crate::core::traits::fetcher::Fetcher;
use crate::core::traits::provider::CryptoProvider;

/// Which view is active.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Keyring,
    NewKey,
    PrivateKey(PrivateKey),
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Keyring => "keyring",
            Mode::NewKey => "new-key",
            Mode::PrivateKey(_) => "private-key",
        }
    }
}

/// What dropped files are classified against.
#[derive(Debug, Clone, PartialEq)]
pub enum Handler {
    Keyring(PublicKeys),
    PrivateKey(PrivateKey),
}

impl Handler {
    pub async fn process(
        &self,
        provider: &Arc<dyn CryptoProvider>,
        input: Input,
    ) -> Result<Vec<Task>> {
        match self {
            Handler::Keyring(keyring) => keyring.process(provider, input).await,
            Handler::PrivateKey(key) => key.process(provider, input).await,
        }
    }
}

struct Inner {
    hash: Notifier<String>,
    keyring: Notifier<PublicKeys>,
    mode: Notifier<Mode>,
    handler: Notifier<Option<Handler>>,
    results: Notifier<Items<Slot>>,
    history: Notifier<Vec<String>>,
    provider: Arc<dyn CryptoProvider>,
    fetcher: Arc<dyn Fetcher>,
    queue: KeyringQueue,
    next_slot: AtomicU64,
}

/// The application state: current view, keyring and result list.
///
/// Cheap to clone; every clone drives the same state. Only `State` writes
/// the keyring (through its queue) and the result list. Must be created
/// inside a tokio runtime.
#[derive(Clone)]
pub struct State(Arc<Inner>);

impl State {
    pub fn new(provider: Arc<dyn CryptoProvider>, fetcher: Arc<dyn Fetcher>) -> Self {
        let keyring = Notifier::new(PublicKeys::empty());
        let queue = KeyringQueue::spawn(keyring.clone());
        Self(Arc::new(Inner {
            hash: Notifier::new(String::new()),
            keyring,
            mode: Notifier::new(Mode::Keyring),
            handler: Notifier::new(None),
            results: Notifier::new(Items::default()),
            history: Notifier::new(Vec::new()),
            provider,
            fetcher,
            queue,
            next_slot: AtomicU64::new(1),
        }))
    }

    pub fn provider(&self) -> &Arc<dyn CryptoProvider> {
        &self.0.provider
    }

    pub fn hash(&self) -> String {
        self.0.hash.get()
    }

    pub fn keyring(&self) -> PublicKeys {
        self.0.keyring.get()
    }

    pub fn mode(&self) -> Mode {
        self.0.mode.get()
    }

    pub fn handler(&self) -> Option<Handler> {
        self.0.handler.get()
    }

    pub fn results(&self) -> Items<Slot> {
        self.0.results.get()
    }

    pub fn history(&self) -> Vec<String> {
        self.0.history.get()
    }

    pub fn subscribe_results(&self) -> watch::Receiver<Items<Slot>> {
        self.0.results.subscribe()
    }

    /// Record a fragment in the history and make it current.
    fn save(&self, fragment: String, replace: bool) {
        self.0.history.update(|history| {
            let mut history = history.clone();
            match history.last_mut() {
                Some(top) if replace => {
                    if *top != fragment {
                        top.clone_from(&fragment);
                    }
                }
                _ => history.push(fragment.clone()),
            }
            history
        });
        self.0.hash.set(fragment);
    }

    fn goto_new_key(&self, replace: bool) {
        self.save(NEW_KEY.to_string(), replace);
        self.0.mode.set(Mode::NewKey);
        self.0.handler.set(None);
    }

    async fn goto_keyring(&self, update: KeyringUpdate, replace: bool) -> Result<()> {
        self.0.mode.set(Mode::Keyring);
        self.0.handler.set(None);
        let state = self.clone();
        self.0
            .queue
            .submit(Box::new(move |old| {
                async move {
                    let next = update(old).await?;
                    state.save(routing::fragment_of(&next), replace);
                    state.0.handler.set(Some(Handler::Keyring(next.clone())));
                    Ok(next)
                }
                .boxed()
            }))
            .await
            .map(|_| ())
    }

    async fn goto_private_key(&self, key: PrivateKey, replace: bool) -> Result<()> {
        self.save(routing::fragment_of(&key), replace);
        self.0.mode.set(Mode::PrivateKey(key.clone()));
        self.0.handler.set(Some(Handler::PrivateKey(key.clone())));
        let provider = Arc::clone(&self.0.provider);
        self.0
            .queue
            .submit(Box::new(move |old| {
                async move { old.import_keys(provider.as_ref(), [key]).await }.boxed()
            }))
            .await
            .map(|_| ())
    }

    /// Route a fragment.
    pub fn process_hash(&self, fragment: &str) {
        let options = RunOptions {
            scroll: false,
            replace: true,
        };
        self.0.hash.set(fragment.to_string());
        tracing::debug!(fragment_len = fragment.len(), "processing fragment");
        match Route::parse(fragment) {
            Ok(Route::Empty) => {
                let reset = keyring_update(|_| async { Ok(PublicKeys::empty()) });
                self.run(vec![ready(reset)], options);
            }
            Ok(Route::NewKey) => self.goto_new_key(true),
            Ok(Route::Fetch(path)) => {
                let state = self.clone();
                let task = async move {
                    let input = state.0.fetcher.fetch(&path).await?;
                    let tasks = PublicKeys::empty().process(&state.0.provider, input).await?;
                    state.run(tasks, options);
                    Ok(Outcome::Nothing)
                };
                self.run(vec![task.boxed()], options);
            }
            Ok(Route::Inline(data)) => {
                let state = self.clone();
                let task = async move {
                    let tasks = PublicKeys::empty()
                        .process(&state.0.provider, Input::new(data))
                        .await?;
                    state.run(tasks, options);
                    Ok(Outcome::Nothing)
                };
                self.run(vec![task.boxed()], options);
            }
            Err(e) => self.fail(e),
        }
    }

    fn next_id(&self) -> SlotId {
        SlotId(self.0.next_slot.fetch_add(1, Ordering::Relaxed))
    }

    /// Publish one working slot per task, in order, and start every task.
    pub fn run(&self, tasks: Vec<Task>, options: RunOptions) -> Vec<SlotId> {
        let slots: Vec<Arc<Slot>> = tasks
            .iter()
            .map(|_| Arc::new(Slot::working(self.next_id(), options)))
            .collect();
        self.0.results.update(|items| items.add(slots.iter().cloned()));

        for (slot, task) in slots.iter().zip(tasks) {
            tracing::debug!(slot = %slot.id, "slot published");
            let state = self.clone();
            let slot = Arc::clone(slot);
            tokio::spawn(async move { state.run_task(slot, task).await });
        }
        slots.iter().map(|slot| slot.id).collect()
    }

    async fn run_task(&self, slot: Arc<Slot>, task: Task) {
        let resolved = match task.await {
            Ok(Outcome::Keyring(update)) => self
                .goto_keyring(update, slot.options.replace)
                .await
                .map(|()| None),
            Ok(Outcome::PrivateKey(key)) => self
                .goto_private_key(key, slot.options.replace)
                .await
                .map(|()| None),
            Ok(Outcome::Artifact(payload)) => Ok(Some(SlotResult::Artifact(payload.into()))),
            Ok(Outcome::Info(info)) => Ok(Some(SlotResult::Info(info))),
            Ok(Outcome::Nothing) => Ok(None),
            Err(e) => Err(e),
        };
        let resolved = resolved.unwrap_or_else(|e| {
            tracing::error!(slot = %slot.id, error = %e, "task failed");
            Some(SlotResult::Info(Info::error(e.to_string())))
        });
        tracing::debug!(slot = %slot.id, hidden = resolved.is_none(), "slot resolved");
        self.0.results.update(|items| match resolved {
            Some(result) => items.replace(&slot, Arc::new(slot.resolved(result))),
            None => items.delete(&slot),
        });
    }

    /// Show an error as its own slot.
    pub fn fail(&self, error: KeydropError) {
        self.run(vec![failed(error)], RunOptions::default());
    }

    /// Hide a slot.
    pub fn delete(&self, id: SlotId) {
        self.0.results.update(|items| match items.find(|slot| slot.id == id) {
            Some(slot) => items.delete(&Arc::clone(slot)),
            None => items.clone(),
        });
    }

    /// Wait until no slot is working.
    pub async fn settled(&self) {
        let mut results = self.subscribe_results();
        loop {
            let busy = results.borrow_and_update().iter().any(|slot| slot.is_working());
            if !busy || results.changed().await.is_err() {
                return;
            }
        }
    }

    /// Classify dropped inputs against the current handler.
    ///
    /// Batches and the inputs inside them are read in order. A failure on
    /// one input becomes an error slot and the walk goes on.
    pub fn open_files(&self, batches: Vec<InputBatch>) -> Result<()> {
        let handler = self.handler().ok_or(KeydropError::NoHandler)?;
        let state = self.clone();
        let task = async move {
            for batch in batches {
                let inputs = match batch.await {
                    Ok(inputs) => inputs,
                    Err(e) => {
                        state.fail(e);
                        continue;
                    }
                };
                for input in inputs {
                    let classified = match input.await {
                        Ok(input) => handler.process(&state.0.provider, input).await,
                        Err(e) => Err(e),
                    };
                    match classified {
                        Ok(tasks) => {
                            state.run(tasks, RunOptions::default());
                        }
                        Err(e) => state.fail(e),
                    }
                }
            }
            Ok(Outcome::Nothing)
        };
        self.run(vec![task.boxed()], RunOptions::default());
        Ok(())
    }

    /// Validate the form, then generate and unlock a key pair.
    pub fn generate_key(&self, request: KeyRequest) -> Result<()> {
        PrivateKey::check_generate(&request)?;
        let provider = Arc::clone(&self.0.provider);
        let task = async move {
            let key = PrivateKey::generate(provider.as_ref(), &request).await?;
            let key = key.unlock(provider.as_ref(), &request.passphrase).await?;
            Ok(Outcome::PrivateKey(key))
        };
        self.run(vec![task.boxed()], RunOptions::default());
        Ok(())
    }

    fn private_key(&self) -> Result<PrivateKey> {
        match self.mode() {
            Mode::PrivateKey(key) => Ok(key),
            _ => Err(KeydropError::NoPrivateKey),
        }
    }

    /// Unlock the current private key.
    pub fn unlock(&self, passphrase: String) -> Result<()> {
        let key = self.private_key()?;
        let provider = Arc::clone(&self.0.provider);
        let task = async move {
            let key = key.unlock(provider.as_ref(), &passphrase).await?;
            Ok(Outcome::PrivateKey(key))
        };
        self.run_replacing(task.boxed());
        Ok(())
    }

    /// Lock the current (unlocked) private key with a new passphrase.
    pub fn change_passphrase(&self, passphrase: String) -> Result<()> {
        let key = self.private_key()?;
        let provider = Arc::clone(&self.0.provider);
        let task = async move {
            let key = key.lock(provider.as_ref(), &passphrase).await?;
            Ok(Outcome::PrivateKey(key))
        };
        self.run_replacing(task.boxed());
        Ok(())
    }

    pub fn export_private(&self) -> Result<()> {
        let payload = self.private_key()?.armor_private();
        self.run(
            vec![async move { payload.map(Outcome::Artifact) }.boxed()],
            RunOptions::default(),
        );
        Ok(())
    }

    pub fn export_public(&self) -> Result<()> {
        let payload = self.private_key()?.armor();
        self.run(
            vec![async move { payload.map(Outcome::Artifact) }.boxed()],
            RunOptions::default(),
        );
        Ok(())
    }

    pub fn revoke(&self) -> Result<()> {
        let key = self.private_key()?;
        let provider = Arc::clone(&self.0.provider);
        let task = async move {
            let payload = key.revocation_certificate(provider.as_ref()).await?;
            Ok(Outcome::Artifact(payload))
        };
        self.run(vec![task.boxed()], RunOptions::default());
        Ok(())
    }

    fn run_replacing(&self, task: Task) {
        self.run(
            vec![task],
            RunOptions {
                scroll: false,
                replace: true,
            },
        );
    }
}
