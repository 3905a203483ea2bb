mod adapters;
mod cli;
mod config;
mod core;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::cli::context::{self, OutputContext};
use crate::cli::{Cli, Commands, commands, output};
use crate::config::app_config::AppConfig;
use crate::core::errors::Result;

/// Logs go to stderr so stdout stays clean for reports and fragments.
///
/// `-v` wins, then `RUST_LOG`, then the `[log] filter` of the config file,
/// then `warn`.
fn init_logging(verbose: bool, configured: Option<&str>) {
    let env_filter = if verbose {
        EnvFilter::new("keydrop=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or("warn")))
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);
    tracing_subscriber::registry().with(stderr_layer).init();
}

/// Run the command and report. Returns the number of error slots left.
fn run(args: Cli, config: &AppConfig) -> Result<usize> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let state = commands::session::start(config)?;
        let result = match &args.command {
            Commands::Open {
                fragment,
                paths,
                passphrase,
            } => {
                commands::open::execute(&state, fragment.as_deref(), paths, passphrase.as_deref())
                    .await
            }
            Commands::New {
                name,
                email,
                passphrase,
            } => commands::new_key::execute(&state, name, email, passphrase.as_deref()).await,
            Commands::Key { fragment, action } => {
                commands::key::execute(&state, fragment, action).await
            }
        };
        // Slots are shown even when the command itself failed.
        let errors = commands::report::print(&state)?;
        result.map(|()| errors)
    })
}

fn main() {
    let args = Cli::parse();

    let config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            output::error(&format!("Error: {e}"));
            std::process::exit(1);
        }
    };
    init_logging(args.verbose, config.log.filter.as_deref());
    tracing::debug!(
        base_url = %config.fetch.base_url,
        out_dir = %config.output.dir.display(),
        "configuration loaded"
    );
    context::init(OutputContext {
        out_dir: args.out.clone().unwrap_or_else(|| config.output.dir.clone()),
        json: args.json,
        quiet: args.quiet,
    });

    match run(args, &config) {
        Ok(0) => {}
        Ok(_) => std::process::exit(1),
        Err(e) => {
            output::error(&format!("Error: {e}"));
            std::process::exit(1);
        }
    }
}
