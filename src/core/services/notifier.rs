use std::sync::Arc;

use tokio::sync::watch;

/// An observable value.
///
/// Every `set` publishes a snapshot to all current subscribers; a subscriber
/// goes away when its receiver is dropped. Clones share the same value.
#[derive(Debug)]
pub struct Notifier<T>(Arc<watch::Sender<T>>);

impl<T> Clone for Notifier<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Clone> Notifier<T> {
    pub fn new(value: T) -> Self {
        let (sender, _) = watch::channel(value);
        Self(Arc::new(sender))
    }

    /// Current snapshot.
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        self.0.send_replace(value);
    }

    /// Derive the next value from the current one, atomically with respect
    /// to other writers.
    pub fn update(&self, next: impl FnOnce(&T) -> T) {
        self.0.send_modify(|value| *value = next(value));
    }

    /// A receiver that sees the current value and every later one.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.0.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set() {
        let n = Notifier::new(1);
        assert_eq!(n.get(), 1);
        n.set(2);
        assert_eq!(n.get(), 2);
        n.update(|v| v * 10);
        assert_eq!(n.get(), 20);
    }

    #[tokio::test]
    async fn subscribers_see_updates_and_clones_share() {
        let n = Notifier::new("a".to_string());
        let mut rx = n.subscribe();
        assert_eq!(*rx.borrow(), "a");

        let other = n.clone();
        other.set("b".into());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), "b");
        assert_eq!(n.get(), "b");
    }

    #[test]
    fn set_without_subscribers_still_stores() {
        let n = Notifier::new(0);
        drop(n.subscribe());
        n.set(5);
        assert_eq!(n.get(), 5);
    }
}
