use std::fmt;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;

use crate::core::errors::Result;
use crate::core::models::data::{Info, Payload};
use crate::core::models::private_key::PrivateKey;
use crate::core::models::public_keys::PublicKeys;

/// A step applied to the keyring by the keyring queue.
pub type KeyringUpdate =
    Box<dyn FnOnce(PublicKeys) -> BoxFuture<'static, Result<PublicKeys>> + Send>;

/// What a finished task asks the scheduler to do.
pub enum Outcome {
    /// Show a line of information.
    Info(Info),
    /// Offer a file for download.
    Artifact(Payload),
    /// Switch to the keyring view after applying the update.
    Keyring(KeyringUpdate),
    /// Switch to the view of one private key.
    PrivateKey(PrivateKey),
    /// Nothing to show.
    Nothing,
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Info(info) => f.debug_tuple("Info").field(info).finish(),
            Outcome::Artifact(payload) => f.debug_tuple("Artifact").field(payload).finish(),
            Outcome::Keyring(_) => f.write_str("Keyring(..)"),
            Outcome::PrivateKey(key) => f.debug_tuple("PrivateKey").field(&key.key_id()).finish(),
            Outcome::Nothing => f.write_str("Nothing"),
        }
    }
}

/// A unit of work produced by the dispatcher.
pub type Task = BoxFuture<'static, Result<Outcome>>;

/// Wrap an already known outcome as a task.
pub fn ready(outcome: Outcome) -> Task {
    futures::future::ready(Ok(outcome)).boxed()
}

/// Wrap an already known failure as a task.
pub fn failed(error: crate::core::errors::KeydropError) -> Task {
    futures::future::ready(Err(error)).boxed()
}

/// Wrap a keyring update closure.
pub fn keyring_update<F, Fut>(update: F) -> Outcome
where
    F: FnOnce(PublicKeys) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<PublicKeys>> + Send + 'static,
{
    Outcome::Keyring(Box::new(move |keyring| update(keyring).boxed()))
}

/// Identity of a result slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SlotId(pub u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-run display options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Bring the slot into view when it resolves.
    pub scroll: bool,
    /// Replace the current history entry instead of pushing a new one.
    pub replace: bool,
}

/// A downloadable result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub len: usize,
    pub title: String,
    pub filename: String,
    pub content_type: String,
    pub kind: Option<String>,
}

impl From<Payload> for Artifact {
    fn from(payload: Payload) -> Self {
        let len = payload.data.len();
        let title = match payload.title {
            Some(title) => format!("{len} bytes.\n{title}"),
            None => format!("{len} bytes."),
        };
        Self {
            data: payload.data,
            len,
            title,
            filename: payload.filename.unwrap_or_else(|| "unnamed".into()),
            content_type: payload
                .content_type
                .unwrap_or_else(|| "application/octet-stream".into()),
            kind: payload.kind,
        }
    }
}

/// Where a slot stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotResult {
    Working,
    Info(Info),
    Artifact(Artifact),
}

/// One entry of the result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub id: SlotId,
    #[serde(skip)]
    pub options: RunOptions,
    pub scroll: bool,
    #[serde(flatten)]
    pub result: SlotResult,
}

impl Slot {
    pub fn working(id: SlotId, options: RunOptions) -> Self {
        Self {
            id,
            options,
            scroll: options.scroll,
            result: SlotResult::Working,
        }
    }

    pub fn is_working(&self) -> bool {
        matches!(self.result, SlotResult::Working)
    }

    pub fn is_error(&self) -> bool {
        matches!(&self.result, SlotResult::Info(info) if info.error)
    }

    /// The resolved slot. Errors always scroll into view.
    pub fn resolved(&self, result: SlotResult) -> Self {
        let error = matches!(&result, SlotResult::Info(info) if info.error);
        Self {
            id: self.id,
            options: self.options,
            scroll: error || self.options.scroll,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_defaults_and_title() {
        let artifact = Artifact::from(Payload {
            data: vec![0; 12],
            title: Some("Signed by abcd".into()),
            ..Payload::default()
        });
        assert_eq!(artifact.len, 12);
        assert_eq!(artifact.title, "12 bytes.\nSigned by abcd");
        assert_eq!(artifact.filename, "unnamed");
        assert_eq!(artifact.content_type, "application/octet-stream");
    }

    #[test]
    fn artifact_without_title() {
        let artifact = Artifact::from(Payload {
            data: b"hi".to_vec(),
            filename: Some("hi.txt".into()),
            content_type: Some("text/plain".into()),
            ..Payload::default()
        });
        assert_eq!(artifact.title, "2 bytes.");
        assert_eq!(artifact.filename, "hi.txt");
        assert_eq!(artifact.content_type, "text/plain");
    }

    #[test]
    fn errors_always_scroll() {
        let slot = Slot::working(SlotId(1), RunOptions::default());
        let done = slot.resolved(SlotResult::Info(Info::error("boom")));
        assert!(done.scroll);
        assert!(done.is_error());
        let done = slot.resolved(SlotResult::Info(Info::ok("fine")));
        assert!(!done.scroll);
        assert!(!done.is_error());
    }
}
