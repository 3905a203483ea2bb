use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;

const PASSPHRASE: &str = "correct horse battery";

/// Run keydrop inside `dir` with JSON output and artifacts under `out/`.
fn keydrop(dir: &assert_fs::TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("keydrop");
    cmd.current_dir(dir.path())
        .env_remove("KEYDROP_PASSPHRASE")
        .env_remove("KEYDROP_NEW_PASSPHRASE")
        .env_remove("RUST_LOG");
    cmd
}

/// Fresh working directory with an empty config so no user config leaks in.
fn workspace() -> assert_fs::TempDir {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("keydrop.toml").write_str("").unwrap();
    dir
}

/// Run with `--json` and parse the report, whatever the exit status.
fn report(dir: &assert_fs::TempDir, args: &[&str]) -> (bool, Value) {
    let output = keydrop(dir)
        .args(["--json", "--out", "out"])
        .args(args)
        .output()
        .unwrap();
    let value = serde_json::from_slice(&output.stdout).unwrap_or(Value::Null);
    (output.status.success(), value)
}

fn fragment(report: &Value) -> String {
    report["fragment"].as_str().unwrap().to_string()
}

/// Paths of every artifact written.
fn artifact_paths(dir: &assert_fs::TempDir, report: &Value) -> Vec<std::path::PathBuf> {
    report["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|slot| slot["status"] == "artifact")
        .map(|slot| dir.path().join(slot["path"].as_str().unwrap()))
        .collect()
}

fn new_key(dir: &assert_fs::TempDir, name: &str) -> String {
    let email = format!("{}@example.org", name.to_lowercase());
    let (ok, value) = report(
        dir,
        &["new", "--name", name, "--email", &email, "--passphrase", PASSPHRASE],
    );
    assert!(ok, "key generation failed: {value}");
    assert_eq!(value["mode"], "private-key");
    fragment(&value)
}

#[test]
fn new_key_prints_fragment() {
    let dir = workspace();
    keydrop(&dir)
        .args([
            "new",
            "--name",
            "Alice",
            "--email",
            "alice@example.org",
            "--passphrase",
            PASSPHRASE,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated Alice <alice@example.org>"))
        .stdout(predicate::str::contains("Usable for encryption and signing"))
        .stdout(predicate::str::contains("Fragment"));
}

#[test]
fn new_key_rejects_bad_email() {
    let dir = workspace();
    keydrop(&dir)
        .args(["new", "--name", "Alice", "--email", "alice", "--passphrase", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not an email address"));
}

#[test]
fn new_key_requires_passphrase() {
    let dir = workspace();
    keydrop(&dir)
        .args(["new", "--name", "Alice", "--email", "alice@example.org"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid key request"));
}

#[test]
fn encrypt_for_keyring_then_decrypt_with_private_key() {
    let dir = workspace();
    let private = new_key(&dir, "Alice");

    let (ok, exported) = report(&dir, &["key", &private, "export-public"]);
    assert!(ok, "{exported}");
    let public_path = artifact_paths(&dir, &exported).remove(0);
    let public = std::fs::read_to_string(&public_path).unwrap();
    assert!(public.starts_with("-----BEGIN PGP PUBLIC KEY BLOCK-----"));

    let (ok, imported) = report(&dir, &["open", "#", public_path.to_str().unwrap()]);
    assert!(ok, "{imported}");
    assert_eq!(imported["mode"], "keyring");
    assert_eq!(imported["keyring"].as_array().unwrap().len(), 1);
    assert_eq!(imported["usable"], "for encryption and signing");
    let keyring = fragment(&imported);

    dir.child("note.txt").write_str("meet at noon\n").unwrap();
    let (ok, encrypted) = report(&dir, &["open", &keyring, "note.txt"]);
    assert!(ok, "{encrypted}");
    let sealed = artifact_paths(&dir, &encrypted).remove(0);
    assert!(sealed.ends_with("note.txt.asc"));
    assert!(
        std::fs::read_to_string(&sealed)
            .unwrap()
            .starts_with("-----BEGIN PGP MESSAGE-----")
    );

    let (ok, decrypted) = report(
        &dir,
        &[
            "open",
            &private,
            sealed.to_str().unwrap(),
            "--passphrase",
            PASSPHRASE,
        ],
    );
    assert!(ok, "{decrypted}");
    let opened = artifact_paths(&dir, &decrypted).remove(0);
    assert_eq!(std::fs::read_to_string(opened).unwrap(), "meet at noon\n");
}

#[test]
fn decrypt_needs_unlocked_key() {
    let dir = workspace();
    let private = new_key(&dir, "Alice");

    let (_, exported) = report(&dir, &["key", &private, "export-public"]);
    let public_path = artifact_paths(&dir, &exported).remove(0);
    let (_, imported) = report(&dir, &["open", "#", public_path.to_str().unwrap()]);
    dir.child("note.txt").write_str("secret").unwrap();
    let (_, encrypted) = report(&dir, &["open", &fragment(&imported), "note.txt"]);
    let sealed = artifact_paths(&dir, &encrypted).remove(0);

    let (ok, locked) = report(&dir, &["open", &private, sealed.to_str().unwrap()]);
    assert!(!ok);
    let errors: Vec<_> = locked["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|slot| slot["error"] == true)
        .collect();
    assert_eq!(errors.len(), 1);
}

#[test]
fn wrong_passphrase_is_reported() {
    let dir = workspace();
    let private = new_key(&dir, "Alice");
    let (ok, value) = report(&dir, &["key", &private, "unlock", "--passphrase", "wrong"]);
    assert!(!ok);
    assert!(
        value["results"]
            .as_array()
            .unwrap()
            .iter()
            .any(|slot| slot["error"] == true)
    );
}

#[test]
fn passwd_changes_fragment() {
    let dir = workspace();
    let private = new_key(&dir, "Alice");
    let (ok, changed) = report(
        &dir,
        &[
            "key",
            &private,
            "passwd",
            "--passphrase",
            PASSPHRASE,
            "--new-passphrase",
            "new secret",
        ],
    );
    assert!(ok, "{changed}");
    let relocked = fragment(&changed);
    assert_ne!(relocked, private);

    let (ok, _) = report(&dir, &["key", &relocked, "unlock", "--passphrase", "new secret"]);
    assert!(ok);
}

#[test]
fn revoke_writes_certificate() {
    let dir = workspace();
    let private = new_key(&dir, "Alice");
    let (ok, value) = report(
        &dir,
        &["key", &private, "revoke", "--passphrase", PASSPHRASE],
    );
    assert!(ok, "{value}");
    let path = artifact_paths(&dir, &value).remove(0);
    assert!(path.to_str().unwrap().ends_with("-revoke.asc"));
}

#[test]
fn text_on_empty_keyring_fails() {
    let dir = workspace();
    dir.child("note.txt").write_str("hello").unwrap();
    keydrop(&dir)
        .args(["open", "#", "note.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Parse error"));
}

#[test]
fn bad_fragment_fails() {
    let dir = workspace();
    keydrop(&dir)
        .args(["open", "#!!not base64!!"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid fragment"));
}

#[test]
fn key_command_needs_private_key() {
    let dir = workspace();
    keydrop(&dir)
        .args(["key", "#", "export-public"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No private key is open"));
}

#[test]
fn missing_file_fails() {
    let dir = workspace();
    keydrop(&dir)
        .args(["open", "#", "nope.asc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn invalid_config_fails() {
    let dir = workspace();
    dir.child("keydrop.toml").write_str("format_version = 99\n").unwrap();
    keydrop(&dir)
        .args(["open", "#"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}
