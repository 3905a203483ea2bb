use std::path::PathBuf;

use crate::adapters::ingest::file_source;
use crate::cli::commands::session;
use crate::cli::output;
use crate::core::errors::Result;
use crate::core::services::routing;
use crate::core::services::state::State;

/// Execute the `keydrop open` command.
///
/// Routes the fragment, unlocks the private key it carries when a
/// passphrase is given, then drops every path on the resulting view.
pub async fn execute(
    state: &State,
    fragment: Option<&str>,
    paths: &[PathBuf],
    passphrase: Option<&str>,
) -> Result<()> {
    // Shells treat a leading '#' as a comment, so it may be left out.
    let fragment = fragment.map(routing::with_hash).unwrap_or_default();
    session::route(state, &fragment).await;

    if let Some(passphrase) = passphrase {
        match session::private_key(state) {
            Some(key) if !key.is_unlocked() => {
                if session::unlock(state, passphrase).await? {
                    output::success(&format!("Unlocked {}", key.user_id()));
                }
            }
            Some(_) => {}
            None => output::warning("--passphrase ignored: the fragment holds no private key"),
        }
    }

    if !paths.is_empty() {
        state.open_files(file_source::batches(paths))?;
        session::settle(state, "Processing files").await;
    }
    Ok(())
}
