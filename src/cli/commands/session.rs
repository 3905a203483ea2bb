use std::sync::Arc;

use crate::adapters::fetch::http_fetcher::HttpFetcher;
use crate::adapters::openpgp::sequoia_provider::SequoiaProvider;
use crate::cli::output;
use crate::config::app_config::AppConfig;
use crate::core::errors::Result;
use crate::core::models::private_key::PrivateKey;
use crate::core::services::state::{Mode, State};
use crate::core::traits::fetcher::Fetcher;
use crate::core::traits::provider::CryptoProvider;

/// Wire the adapters into a fresh state. Must run inside the runtime.
pub fn start(config: &AppConfig) -> Result<State> {
    let provider: Arc<dyn CryptoProvider> = Arc::new(SequoiaProvider::new());
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.fetch.base_url)?);
    tracing::debug!(provider = provider.name(), base_url = %config.fetch.base_url, "session started");
    Ok(State::new(provider, fetcher))
}

/// Wait for every task, with a spinner.
pub async fn settle(state: &State, msg: &str) {
    let bar = output::spinner(msg);
    state.settled().await;
    bar.finish_and_clear();
}

/// Route a fragment and wait for it.
pub async fn route(state: &State, fragment: &str) {
    state.process_hash(fragment);
    settle(state, "Opening fragment").await;
}

/// The private key currently open, if any.
pub fn private_key(state: &State) -> Option<PrivateKey> {
    match state.mode() {
        Mode::PrivateKey(key) => Some(key),
        _ => None,
    }
}

/// Unlock the open private key. A wrong passphrase leaves an error slot.
pub async fn unlock(state: &State, passphrase: &str) -> Result<bool> {
    state.unlock(passphrase.to_string())?;
    settle(state, "Unlocking key").await;
    Ok(private_key(state).is_some_and(|key| key.is_unlocked()))
}
