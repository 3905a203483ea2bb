//! User-facing strings for result slots and artifact titles.

pub const KIND_CERTIFICATED: &str = "Certificated";
pub const KIND_DECRYPTED: &str = "Decrypted";
pub const KIND_ENCRYPTED: &str = "Encrypted";
pub const KIND_VERIFIED: &str = "Verified";
pub const KIND_PRIVATE_KEY: &str = "Private key";
pub const KIND_PUBLIC_KEY: &str = "Public key";
pub const KIND_REVOKE_CERT: &str = "Revocation Certificate";
pub const KIND_SIGNED: &str = "Signed";

fn listed(header: &str, items: &[String]) -> String {
    items.iter().fold(header.to_string(), |mut acc, item| {
        acc.push('\n');
        acc.push_str(item);
        acc
    })
}

pub fn good_signature_by(user: &str) -> String {
    format!("good signature by {user}")
}

pub fn bad_signature_by(user: &str, error: &str) -> String {
    format!("bad signature by {user}: {error}")
}

pub fn key_is_signed_by(key: &str, signer: &str) -> String {
    format!("{key} is signed by {signer}")
}

pub fn key_is_not_signed_by_any_given_key(key: &str) -> String {
    format!("{key} is not signed by any given key")
}

pub fn key_has_bad_signature_of(key: &str, signer: &str) -> String {
    format!("{key} has bad signature of {signer}")
}

pub fn key_imported(key: &str) -> String {
    format!("{key} imported")
}

pub fn merge_revocation_certificate_of(key: &str) -> String {
    format!("merge revocation certificate of {key}")
}

pub fn encrypted_for(users: &[String]) -> String {
    listed("Encrypted for:", users)
}

pub fn verified_content_of(filename: &str) -> String {
    format!("verified content of {filename}")
}

pub fn decrypted_by(key: &str) -> String {
    format!("Decrypted by {key}")
}

pub fn signed_by(key: &str) -> String {
    format!("Signed by {key}")
}

pub fn sign_user_by_key(user: &str, key: &str) -> String {
    format!("sign {user} by {key}")
}

pub fn public_keys_signed_by_key(signer: &str, keys: &[String]) -> String {
    listed(&format!("Public keys signed by {signer}:"), keys)
}

pub fn public_key_file_containing(keys: &[String]) -> String {
    listed("Public key file containing:", keys)
}

pub fn private_key_file_containing(key: &str) -> String {
    format!("Private key file containing:\n{key}")
}

pub fn revocation_certificate_of(key: &str) -> String {
    format!("Revocation certificate of {key}")
}
