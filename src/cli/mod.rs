pub mod commands;
pub mod context;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Drop a file on your OpenPGP keyring. Keydrop figures out the rest.
///
/// The whole state lives in a fragment: `#` is the empty keyring, `#.` the
/// new-key form, `#/path` fetches keys from the configured server and any
/// other `#...` carries the keys themselves.
#[derive(Parser, Debug)]
#[command(name = "keydrop", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to alternative config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory artifacts are written to
    #[arg(long, global = true)]
    pub out: Option<PathBuf>,

    /// Print a JSON report instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode: only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a fragment and drop files on it
    Open {
        /// Fragment to open (default: the empty keyring)
        fragment: Option<String>,

        /// Files or directories to drop; `-` reads standard input
        paths: Vec<PathBuf>,

        /// Unlock the opened private key first
        #[arg(long, env = "KEYDROP_PASSPHRASE", hide_env_values = true)]
        passphrase: Option<String>,
    },

    /// Generate a new key pair
    New {
        /// Real name for the user ID
        #[arg(long)]
        name: String,

        /// Email address for the user ID
        #[arg(long)]
        email: String,

        /// Passphrase protecting the secret key
        #[arg(long, env = "KEYDROP_PASSPHRASE", hide_env_values = true)]
        passphrase: Option<String>,
    },

    /// Act on the private key carried by a fragment
    Key {
        /// Fragment of the private key
        fragment: String,

        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum KeyAction {
    /// Unlock the key and print its fragment
    Unlock {
        #[arg(long, env = "KEYDROP_PASSPHRASE", hide_env_values = true)]
        passphrase: String,
    },
    /// Change the passphrase
    Passwd {
        #[arg(long, env = "KEYDROP_PASSPHRASE", hide_env_values = true)]
        passphrase: String,
        #[arg(long, env = "KEYDROP_NEW_PASSPHRASE", hide_env_values = true)]
        new_passphrase: String,
    },
    /// Write the (locked) private key
    ExportPrivate,
    /// Write the public key
    ExportPublic,
    /// Write a revocation certificate
    Revoke {
        #[arg(long, env = "KEYDROP_PASSPHRASE", hide_env_values = true)]
        passphrase: String,
    },
}
