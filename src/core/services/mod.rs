pub mod keyring_queue;
pub mod notifier;
pub mod routing;
pub mod state;
