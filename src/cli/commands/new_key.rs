use crate::cli::commands::session;
use crate::cli::output;
use crate::core::errors::Result;
use crate::core::models::key::Key;
use crate::core::models::operations::KeyRequest;
use crate::core::services::routing::NEW_KEY;
use crate::core::services::state::State;

/// Execute the `keydrop new` command.
pub async fn execute(
    state: &State,
    name: &str,
    email: &str,
    passphrase: Option<&str>,
) -> Result<()> {
    state.process_hash(NEW_KEY);
    state.generate_key(KeyRequest {
        name: name.to_string(),
        email: email.to_string(),
        passphrase: passphrase.unwrap_or_default().to_string(),
    })?;
    session::settle(state, "Generating key pair").await;

    if let Some(key) = session::private_key(state) {
        output::success(&format!("Generated {} ({})", key.user_id(), key.key_id()));
        output::detail(&format!("Usable {}", key.features().explain()));
    }
    Ok(())
}
