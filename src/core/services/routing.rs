use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::core::errors::{KeydropError, Result};
use crate::core::models::key::Key;

/// Fragment of the new-key form.
pub const NEW_KEY: &str = "#.";

/// Where a fragment leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `""` or `#`: the empty keyring.
    Empty,
    /// `#.`: the new-key form.
    NewKey,
    /// `#/<path>`: bytes fetched from the given path.
    Fetch(String),
    /// `#<base64url>`: serialized keys carried in the fragment itself.
    Inline(Vec<u8>),
}

fn routing_error(fragment: &str, reason: impl Into<String>) -> KeydropError {
    KeydropError::Routing {
        fragment: fragment.to_string(),
        reason: reason.into(),
    }
}

impl Route {
    pub fn parse(fragment: &str) -> Result<Self> {
        if fragment.is_empty() || fragment == "#" {
            return Ok(Route::Empty);
        }
        if fragment == NEW_KEY {
            return Ok(Route::NewKey);
        }
        let Some(rest) = fragment.strip_prefix('#') else {
            return Err(routing_error(fragment, "fragment does not start with '#'"));
        };
        if rest.starts_with('/') {
            return Ok(Route::Fetch(rest.to_string()));
        }
        decode(rest)
            .map(Route::Inline)
            .map_err(|e| routing_error(fragment, e.to_string()))
    }
}

/// Decode base64url, tolerating padding and the standard alphabet.
pub fn decode(text: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let normalized: String = text
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();
    URL_SAFE_NO_PAD.decode(normalized)
}

/// The fragment that brings back `key`.
pub fn fragment_of(key: &impl Key) -> String {
    format!("#{}", URL_SAFE_NO_PAD.encode(key.serialize().concat()))
}

/// Prefix `#` unless already present.
pub fn with_hash(fragment: &str) -> String {
    if fragment.starts_with('#') {
        fragment.to_string()
    } else {
        format!("#{fragment}")
    }
}
