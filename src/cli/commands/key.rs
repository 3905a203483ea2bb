use crate::cli::KeyAction;
use crate::cli::commands::session;
use crate::cli::output;
use crate::core::errors::{KeydropError, Result};
use crate::core::services::routing;
use crate::core::services::state::State;

/// Execute the `keydrop key` command.
///
/// Opens the private key carried by the fragment and runs one action on
/// it. Actions that need the secret material unlock it first.
pub async fn execute(state: &State, fragment: &str, action: &KeyAction) -> Result<()> {
    session::route(state, &routing::with_hash(fragment)).await;
    if session::private_key(state).is_none() {
        return Err(KeydropError::NoPrivateKey);
    }

    match action {
        KeyAction::Unlock { passphrase } => {
            if session::unlock(state, passphrase).await? {
                output::success("Key unlocked");
            }
        }
        KeyAction::Passwd {
            passphrase,
            new_passphrase,
        } => {
            if session::unlock(state, passphrase).await? {
                state.change_passphrase(new_passphrase.clone())?;
                session::settle(state, "Changing passphrase").await;
                if session::private_key(state).is_some_and(|key| !key.is_unlocked()) {
                    output::success("Passphrase changed");
                }
            }
        }
        KeyAction::ExportPrivate => {
            state.export_private()?;
            session::settle(state, "Exporting private key").await;
        }
        KeyAction::ExportPublic => {
            state.export_public()?;
            session::settle(state, "Exporting public key").await;
        }
        KeyAction::Revoke { passphrase } => {
            if session::unlock(state, passphrase).await? {
                state.revoke()?;
                session::settle(state, "Creating revocation certificate").await;
            }
        }
    }
    Ok(())
}
