use tokio::sync::{mpsc, oneshot};

use crate::core::errors::{KeydropError, Result};
use crate::core::models::public_keys::PublicKeys;
use crate::core::models::task::KeyringUpdate;
use crate::core::services::notifier::Notifier;

type Step = (KeyringUpdate, oneshot::Sender<Result<PublicKeys>>);

/// Serializes every keyring mutation.
///
/// A single spawned task owns the write side of the keyring. Steps run one
/// at a time in submission order; each submitter gets its own result, and a
/// failed step leaves the keyring as it was.
#[derive(Debug, Clone)]
pub struct KeyringQueue {
    steps: mpsc::UnboundedSender<Step>,
}

impl KeyringQueue {
    /// Start the queue on the current runtime.
    pub fn spawn(keyring: Notifier<PublicKeys>) -> Self {
        let (steps, mut rx) = mpsc::unbounded_channel::<Step>();
        tokio::spawn(async move {
            while let Some((update, reply)) = rx.recv().await {
                let result = update(keyring.get()).await;
                match &result {
                    Ok(next) => {
                        tracing::debug!(members = next.len(), "keyring step applied");
                        keyring.set(next.clone());
                    }
                    Err(e) => tracing::warn!(error = %e, "keyring step failed"),
                }
                // The submitter may have stopped waiting.
                let _ = reply.send(result);
            }
        });
        Self { steps }
    }

    /// Enqueue a step and wait for its own result.
    pub async fn submit(&self, update: KeyringUpdate) -> Result<PublicKeys> {
        let (reply, result) = oneshot::channel();
        self.steps
            .send((update, reply))
            .map_err(|_| KeydropError::QueueClosed)?;
        result.await.map_err(|_| KeydropError::QueueClosed)?
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::FutureExt;

    use super::*;
    use crate::core::models::task::Outcome;
    use crate::core::models::task::keyring_update;
    use crate::core::test_support::{provider, unlocked_key};

    fn update(
        f: impl FnOnce(PublicKeys) -> futures::future::BoxFuture<'static, Result<PublicKeys>>
        + Send
        + 'static,
    ) -> KeyringUpdate {
        Box::new(f)
    }

    #[tokio::test]
    async fn steps_run_in_submission_order() {
        let keyring = Notifier::new(PublicKeys::empty());
        let queue = KeyringQueue::spawn(keyring.clone());
        let (log_tx, mut log_rx) = mpsc::unbounded_channel();

        let slow_log = log_tx.clone();
        let slow = queue.submit(update(move |k| {
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                slow_log.send("slow").ok();
                Ok(k)
            }
            .boxed()
        }));
        let fast = queue.submit(update(move |k| {
            async move {
                log_tx.send("fast").ok();
                Ok(k)
            }
            .boxed()
        }));
        let (a, b) = tokio::join!(slow, fast);
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(log_rx.recv().await, Some("slow"));
        assert_eq!(log_rx.recv().await, Some("fast"));
    }

    #[tokio::test]
    async fn final_keyring_reflects_submission_order() {
        let provider = provider();
        let alice = unlocked_key(provider.as_ref(), "Alice").await;
        let bob = unlocked_key(provider.as_ref(), "Bob").await;
        let alice_fingerprint = alice.fingerprint().to_string();
        let bob_fingerprint = bob.fingerprint().to_string();
        let keyring = Notifier::new(PublicKeys::empty());
        let queue = KeyringQueue::spawn(keyring.clone());

        // The first step settles last; the second removes what the first adds.
        let first_provider = std::sync::Arc::clone(&provider);
        let first = queue.submit(update(move |k| {
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                k.import_keys(first_provider.as_ref(), vec![alice]).await
            }
            .boxed()
        }));
        let second = queue.submit(update(move |k| {
            async move {
                let k = k.delete([alice_fingerprint.as_str()]);
                k.import_keys(provider.as_ref(), vec![bob]).await
            }
            .boxed()
        }));
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap().len(), 1);
        let last = second.unwrap();
        assert_eq!(last, keyring.get());
        let members: Vec<String> = last.iter().map(|k| k.fingerprint().to_string()).collect();
        assert_eq!(members, vec![bob_fingerprint]);
    }

    #[tokio::test]
    async fn failed_step_does_not_block_later_steps() {
        let keyring = Notifier::new(PublicKeys::empty());
        let queue = KeyringQueue::spawn(keyring.clone());

        let err = queue
            .submit(update(|_| async { Err(KeydropError::NoInterpretation) }.boxed()))
            .await
            .unwrap_err();
        assert!(matches!(err, KeydropError::NoInterpretation));

        let ok = queue.submit(update(|k| async move { Ok(k) }.boxed())).await;
        assert!(ok.is_ok_and(|k| k == PublicKeys::empty()));
    }

    #[tokio::test]
    async fn keyring_update_outcome_is_submittable() {
        let keyring = Notifier::new(PublicKeys::empty());
        let queue = KeyringQueue::spawn(keyring.clone());
        let Outcome::Keyring(step) = keyring_update(|k| async move { Ok(k) }) else {
            panic!("expected a keyring outcome");
        };
        let result = queue.submit(step).await.unwrap();
        assert_eq!(result, keyring.get());
    }
}
